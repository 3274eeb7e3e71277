//! Parser for `Label: value` replies.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::parser::ResponseParser;
use crate::plant::{
    InfoDetail, PlantField, PlantInfo, NO_PROPAGATION_METHODS, NO_SPECIFIC_PROPAGATION_METHODS,
};

/// Characters of the whole reply used as a description when none is labeled.
const DESCRIPTION_PREFIX_CHARS: usize = 300;

/// Propagation items shorter than this are list noise, not methods.
const MIN_PROPAGATION_ITEM_CHARS: usize = 10;

/// One `Label:` regex per single-line field. The value is the rest of that
/// line only.
static VALUE_REGEXES: LazyLock<Vec<(PlantField, Regex)>> = LazyLock::new(|| {
    PlantField::ALL
        .iter()
        .filter(|f| !matches!(f, PlantField::Description | PlantField::PropagationMethods))
        .map(|&f| {
            let pattern = format!(r"(?im){}:[ \t]*(.*)$", regex::escape(f.label()));
            (f, Regex::new(&pattern).expect("Invalid field label regex"))
        })
        .collect()
});

static DESCRIPTION_REGEX: LazyLock<Regex> = LazyLock::new(|| block_regex(PlantField::Description));

static PROPAGATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| block_regex(PlantField::PropagationMethods));

/// A line with nothing but whitespace ends a block.
static BLANK_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n[ \t]*\r?\n").expect("Invalid blank line regex"));

/// Numbered-list markers, asterisks, and hyphens separate propagation items.
static LIST_SPLIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.|\*|-").expect("Invalid list split regex"));

fn block_regex(field: PlantField) -> Regex {
    Regex::new(&format!(r"(?i){}:?", regex::escape(field.label())))
        .expect("Invalid block label regex")
}

/// Parses replies where each attribute sits on its own `Label: value` line.
///
/// Missing labels fall back to each field's sentinel. The description and
/// propagation methods are multi-line blocks that run to the next blank line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LabeledTextParser;

impl ResponseParser for LabeledTextParser {
    fn parse(&self, raw: &str) -> Result<PlantInfo> {
        let description = InfoDetail::same(extract_description(raw));
        let propagation = extract_propagation_methods(raw)
            .into_iter()
            .map(InfoDetail::same)
            .collect();

        Ok(PlantInfo::from_fields(
            |field| match field {
                PlantField::Description => description.clone(),
                other => InfoDetail::same(
                    extract_value(raw, other).unwrap_or_else(|| other.fallback().to_string()),
                ),
            },
            propagation,
        ))
    }
}

/// First `Label: value` for `field`, trimmed. Blank values count as missing.
fn extract_value(text: &str, field: PlantField) -> Option<String> {
    let (_, regex) = VALUE_REGEXES.iter().find(|(f, _)| *f == field)?;
    let value = clean(regex.captures(text)?.get(1)?.as_str());
    (!value.is_empty()).then(|| value.to_string())
}

/// Text after `field`'s label up to the next blank line.
fn extract_block<'a>(text: &'a str, label: &Regex) -> Option<&'a str> {
    let start = label.find(text)?.end();
    let rest = &text[start..];
    let end = BLANK_LINE_REGEX
        .find(rest.trim_start())
        .map(|m| m.start() + (rest.len() - rest.trim_start().len()))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn extract_description(text: &str) -> String {
    if let Some(block) = extract_block(text, &DESCRIPTION_REGEX) {
        let block = clean(block);
        if !block.is_empty() {
            return block.to_string();
        }
    }

    if text.chars().count() > DESCRIPTION_PREFIX_CHARS {
        let prefix: String = text.chars().take(DESCRIPTION_PREFIX_CHARS).collect();
        format!("{prefix}...")
    } else {
        text.to_string()
    }
}

fn extract_propagation_methods(text: &str) -> Vec<String> {
    let Some(block) = extract_block(text, &PROPAGATION_REGEX) else {
        return vec![NO_PROPAGATION_METHODS.to_string()];
    };

    let methods: Vec<String> = LIST_SPLIT_REGEX
        .split(block)
        .map(str::trim)
        .filter(|item| item.chars().count() >= MIN_PROPAGATION_ITEM_CHARS)
        .map(str::to_string)
        .collect();

    if methods.is_empty() {
        vec![NO_SPECIFIC_PROPAGATION_METHODS.to_string()]
    } else {
        methods
    }
}

/// Trims whitespace and the markdown emphasis models like to wrap values in.
fn clean(value: &str) -> &str {
    value.trim_matches(|c: char| c.is_whitespace() || c == '*' || c == '_')
}
