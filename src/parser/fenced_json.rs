//! Parser for replies carrying a JSON object in a ```` ```json ```` fence.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{PlantIdError, Result};
use crate::parser::ResponseParser;
use crate::plant::{InfoDetail, PlantField, PlantInfo, NO_SPECIFIC_PROPAGATION_METHODS};

static FENCE_OPEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```json\b").expect("Invalid fence open regex"));

static FENCED_BLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```json\b[ \t]*\r?\n?(.*?)```").expect("Invalid fenced block regex")
});

pub(crate) fn has_json_fence(raw: &str) -> bool {
    FENCE_OPEN_REGEX.is_match(raw)
}

/// Parses replies whose payload is a JSON object inside a `json` fence.
///
/// Keys are the human-readable labels ("Scientific Name", "Common Name",
/// ...). Each value is either a plain string or an object with `short` and
/// `detailed` members. A missing, unterminated, or malformed fence is an
/// error; there is no partial recovery.
#[derive(Debug, Default, Clone, Copy)]
pub struct FencedJsonParser;

impl ResponseParser for FencedJsonParser {
    fn parse(&self, raw: &str) -> Result<PlantInfo> {
        let body = FENCED_BLOCK_REGEX
            .captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| PlantIdError::Parse("no fenced json block in response".into()))?;

        let value: Value = serde_json::from_str(body)
            .map_err(|e| PlantIdError::Parse(format!("invalid JSON in fenced block: {e}")))?;
        let Value::Object(object) = value else {
            return Err(PlantIdError::Parse(
                "fenced json block is not an object".into(),
            ));
        };

        let propagation = propagation_methods(lookup(&object, PlantField::PropagationMethods));
        Ok(PlantInfo::from_fields(
            |field| detail(lookup(&object, field), field.fallback()),
            propagation,
        ))
    }
}

/// Finds the value for `field`, trying each accepted key exactly and then
/// ignoring case. Nulls count as absent.
fn lookup(object: &Map<String, Value>, field: PlantField) -> Option<&Value> {
    let keys = field.json_keys();
    keys.iter()
        .find_map(|k| object.get(*k))
        .or_else(|| {
            object
                .iter()
                .find(|(name, _)| keys.iter().any(|k| name.eq_ignore_ascii_case(k)))
                .map(|(_, v)| v)
        })
        .filter(|v| !v.is_null())
}

fn detail(value: Option<&Value>, fallback: &str) -> InfoDetail {
    match value {
        Some(Value::Object(obj)) => InfoDetail::new(
            obj.get("short").and_then(text),
            obj.get("detailed").and_then(text),
            fallback,
        ),
        Some(other) => InfoDetail::new(text(other), None, fallback),
        None => InfoDetail::same(fallback),
    }
}

fn propagation_methods(value: Option<&Value>) -> Vec<InfoDetail> {
    let fallback = PlantField::PropagationMethods.fallback();
    match value {
        Some(Value::Array(items)) => {
            let methods: Vec<InfoDetail> = items
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| detail(Some(v), NO_SPECIFIC_PROPAGATION_METHODS))
                .collect();
            if methods.is_empty() {
                vec![InfoDetail::same(NO_SPECIFIC_PROPAGATION_METHODS)]
            } else {
                methods
            }
        }
        other => vec![detail(other, fallback)],
    }
}

/// Renders scalar-ish JSON as text. Arrays are joined with `, `.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(text).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Object(_) | Value::Null => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plant::{NOT_SPECIFIED, NO_PROPAGATION_METHODS, UNABLE_TO_DETERMINE};

    fn fenced(json: &str) -> String {
        format!("Here is what I found:\n```json\n{json}\n```\nHope this helps!")
    }

    fn parse(raw: &str) -> Result<PlantInfo> {
        FencedJsonParser.parse(raw)
    }

    #[test]
    fn test_object_value() {
        let info = parse(&fenced(
            r#"{"Scientific Name": {"short": "Rosa", "detailed": "Rosa genus"}}"#,
        ))
        .unwrap();
        assert_eq!(info.scientific_name.short, "Rosa");
        assert_eq!(info.scientific_name.detailed, "Rosa genus");
        assert_eq!(info.name, "Rosa");
    }

    #[test]
    fn test_string_value() {
        let info = parse(&fenced(r#"{"Common Name": "Rose"}"#)).unwrap();
        assert_eq!(info.common_name.short, "Rose");
        assert_eq!(info.common_name.detailed, "Rose");
    }

    #[test]
    fn test_object_sides_default_to_each_other() {
        let info = parse(&fenced(
            r#"{
                "Sunlight Requirements": {"short": "Full sun"},
                "Water Needs": {"detailed": "Keep soil evenly moist"},
                "Soil Preference": {}
            }"#,
        ))
        .unwrap();
        assert_eq!(info.sunlight_requirements.detailed, "Full sun");
        assert_eq!(info.water_needs.short, "Keep soil evenly moist");
        assert_eq!(info.soil_preference, InfoDetail::same(NOT_SPECIFIED));
    }

    #[test]
    fn test_absent_keys_use_fallbacks() {
        let info = parse(&fenced("{}")).unwrap();
        assert_eq!(info.scientific_name.short, UNABLE_TO_DETERMINE);
        assert_eq!(info.family.short, "Unclassified");
        assert_eq!(info.location.short, NOT_SPECIFIED);
        assert_eq!(
            info.propagation_methods,
            vec![InfoDetail::same(NO_PROPAGATION_METHODS)]
        );
    }

    #[test]
    fn test_aliases_and_case() {
        let info = parse(&fenced(
            r#"{"family": "Rosaceae", "Bloom Season": "Late spring", "health benefits": null}"#,
        ))
        .unwrap();
        assert_eq!(info.family.short, "Rosaceae");
        assert_eq!(info.bloom_season.short, "Late spring");
        assert_eq!(info.health_benefits.short, NOT_SPECIFIED);
    }

    #[test]
    fn test_propagation_array() {
        let info = parse(&fenced(
            r#"{"Propagation Methods": [
                "Hardwood cuttings in winter",
                {"short": "Layering", "detailed": "Pin a low stem to the soil until it roots"}
            ]}"#,
        ))
        .unwrap();
        assert_eq!(info.propagation_methods.len(), 2);
        assert_eq!(info.propagation_methods[0].short, "Hardwood cuttings in winter");
        assert_eq!(
            info.propagation_methods[1].detailed,
            "Pin a low stem to the soil until it roots"
        );
    }

    #[test]
    fn test_scalar_values_become_text() {
        let info = parse(&fenced(
            r#"{"Temperature Requirements": 21, "Native Region": ["Europe", "West Asia"]}"#,
        ))
        .unwrap();
        assert_eq!(info.temperature_requirements.short, "21");
        assert_eq!(info.native_region.short, "Europe, West Asia");
    }

    #[test]
    fn test_missing_fence_is_error() {
        let err = parse("Scientific Name: Rosa").unwrap_err();
        assert!(matches!(err, PlantIdError::Parse(_)));
    }

    #[test]
    fn test_dialect_fence_is_not_json_fence() {
        assert!(!has_json_fence("```jsonc\n{}\n```"));
        assert!(has_json_fence("```JSON\n{}\n```"));
        assert!(matches!(
            parse("```jsonc\n{\"Scientific Name\": \"Rosa\"}\n```"),
            Err(PlantIdError::Parse(_))
        ));
    }

    #[test]
    fn test_unterminated_fence_is_error() {
        let err = parse("```json\n{\"Common Name\": \"Rose\"}").unwrap_err();
        assert!(matches!(err, PlantIdError::Parse(_)));
    }

    #[test]
    fn test_malformed_json_is_error() {
        let err = parse(&fenced(r#"{"Common Name": "Rose",}"#)).unwrap_err();
        assert!(matches!(err, PlantIdError::Parse(_)));
    }

    #[test]
    fn test_non_object_is_error() {
        let err = parse(&fenced(r#"["Rose"]"#)).unwrap_err();
        assert!(matches!(err, PlantIdError::Parse(_)));
    }
}
