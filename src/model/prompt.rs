//! The fixed identification prompt.

use std::sync::LazyLock;

use crate::plant::PlantField;

const PROMPT_HEADER: &str = "Identify this plant in detail. Provide comprehensive information:";

const PROMPT_FOOTER: &str = "Provide the most accurate and detailed information possible.";

/// Attributes listed in the prompt, with the hints the model gets for some.
const PROMPT_FIELDS: &[(PlantField, Option<&str>)] = &[
    (PlantField::ScientificName, None),
    (PlantField::CommonName, None),
    (PlantField::Family, None),
    (PlantField::Description, None),
    (PlantField::NativeRegion, None),
    (PlantField::GrowthType, Some("(tree, shrub, herb)")),
    (PlantField::SunlightRequirements, None),
    (PlantField::TemperatureRequirements, None),
    (PlantField::SoilPreference, None),
    (PlantField::WaterNeeds, None),
    (PlantField::BloomSeason, None),
    (
        PlantField::PropagationMethods,
        Some("(at least 2-3 methods if possible)"),
    ),
];

static IDENTIFY_PROMPT: LazyLock<String> = LazyLock::new(|| {
    let mut prompt = String::from(PROMPT_HEADER);
    for (field, hint) in PROMPT_FIELDS {
        prompt.push_str("\n- ");
        prompt.push_str(field.label());
        if let Some(hint) = hint {
            prompt.push(' ');
            prompt.push_str(hint);
        }
    }
    prompt.push_str("\n\n");
    prompt.push_str(PROMPT_FOOTER);
    prompt
});

/// The instruction sent with every image.
pub fn identify_prompt() -> &'static str {
    &IDENTIFY_PROMPT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_text() {
        let expected = "Identify this plant in detail. Provide comprehensive information:\
            \n- Scientific Name\
            \n- Common Name\
            \n- Plant Family\
            \n- Detailed Description\
            \n- Native Region\
            \n- Growth Type (tree, shrub, herb)\
            \n- Sunlight Requirements\
            \n- Temperature Requirements\
            \n- Soil Preference\
            \n- Water Needs\
            \n- Typical Bloom Season\
            \n- Detailed Propagation Methods (at least 2-3 methods if possible)\
            \n\nProvide the most accurate and detailed information possible.";
        assert_eq!(identify_prompt(), expected);
    }
}
