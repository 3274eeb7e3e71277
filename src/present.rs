//! Display-side decisions about a finished [`PlantInfo`].
//!
//! Nothing here mutates the record; the parser hands over a complete value
//! and these functions only read it.

use std::fmt::Write;

use crate::plant::{PlantField, PlantInfo, UNABLE_TO_DETERMINE};

/// Descriptions shorter than this are not worth showing as context.
const MIN_CONTEXT_DESCRIPTION_CHARS: usize = 50;

/// True when the model could not name the plant and gave too little text to
/// be useful on its own.
pub fn is_unidentified(info: &PlantInfo) -> bool {
    info.scientific_name.short == UNABLE_TO_DETERMINE
        && info.description.short.trim().chars().count() < MIN_CONTEXT_DESCRIPTION_CHARS
}

/// Characteristics shown in the summary table, in display order.
const CHARACTERISTICS: &[PlantField] = &[
    PlantField::NativeRegion,
    PlantField::GrowthType,
    PlantField::SunlightRequirements,
    PlantField::TemperatureRequirements,
    PlantField::SoilPreference,
    PlantField::WaterNeeds,
    PlantField::BloomSeason,
    PlantField::HealthBenefits,
    PlantField::Location,
];

/// Formats a record for a terminal.
pub fn render_summary(info: &PlantInfo) -> String {
    let mut out = String::new();

    if is_unidentified(info) {
        out.push_str("Plant identification unsuccessful.\n");
        if !info.description.short.trim().is_empty() {
            let _ = writeln!(out, "Additional context from AI: {}", info.description.short);
        }
        out.push_str("Try a clearer, well-lit photo with the whole plant in frame.\n");
        return out;
    }

    let _ = writeln!(out, "{}", info.scientific_name.short);
    let _ = writeln!(out, "  Common name: {}", info.common_name.short);
    let _ = writeln!(out, "  Family:      {}", info.family.short);
    let _ = writeln!(out, "\n{}\n", info.description.detailed);

    let width = CHARACTERISTICS
        .iter()
        .map(|f| f.label().len())
        .max()
        .unwrap_or(0);
    for field in CHARACTERISTICS {
        if let Some(detail) = info.field(*field) {
            let _ = writeln!(out, "  {:<width$}  {}", field.label(), detail.short);
        }
    }

    out.push_str("\nPropagation methods:\n");
    for (i, method) in info.propagation_methods.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, method.detailed);
    }

    out
}
