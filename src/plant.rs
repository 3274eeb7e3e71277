//! The typed plant record produced by a successful identification.

use serde::{Deserialize, Serialize};

/// Sentinel for attributes the model did not mention.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Sentinel for a scientific name the model could not determine.
pub const UNABLE_TO_DETERMINE: &str = "Unable to determine";

/// Propagation entry used when the response has no propagation block.
pub const NO_PROPAGATION_METHODS: &str = "No propagation methods available.";

/// Propagation entry used when the block exists but nothing usable was in it.
pub const NO_SPECIFIC_PROPAGATION_METHODS: &str = "No specific propagation methods found.";

/// Description used when a structured reply has no description at all.
pub const NO_DESCRIPTION: &str = "No additional information available";

/// One plant attribute at two levels of detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoDetail {
    /// A few words, e.g. "Full sun".
    pub short: String,
    /// A sentence or two, e.g. "6+ hours of direct sun daily".
    pub detailed: String,
}

impl InfoDetail {
    /// Builds a detail pair, letting each side stand in for the other and
    /// falling back to `fallback` when both are missing or blank.
    pub fn new(short: Option<String>, detailed: Option<String>, fallback: &str) -> Self {
        let short = short.filter(|s| !s.trim().is_empty());
        let detailed = detailed.filter(|s| !s.trim().is_empty());
        match (short, detailed) {
            (Some(short), Some(detailed)) => Self { short, detailed },
            (Some(short), None) => Self::same(short),
            (None, Some(detailed)) => Self::same(detailed),
            (None, None) => Self::same(fallback),
        }
    }

    /// Uses the same text for both levels.
    pub fn same(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            short: text.clone(),
            detailed: text,
        }
    }
}

impl Default for InfoDetail {
    fn default() -> Self {
        Self::same(NOT_SPECIFIED)
    }
}

/// Attributes the model is asked to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlantField {
    /// Binomial name.
    ScientificName,
    /// Everyday name.
    CommonName,
    /// Botanical family.
    Family,
    /// Free-form description.
    Description,
    /// Where the plant originates.
    NativeRegion,
    /// Tree, shrub, herb, ...
    GrowthType,
    /// Light needs.
    SunlightRequirements,
    /// Temperature range.
    TemperatureRequirements,
    /// Preferred soil.
    SoilPreference,
    /// Watering needs.
    WaterNeeds,
    /// When it flowers.
    BloomSeason,
    /// How to propagate it.
    PropagationMethods,
    /// Medicinal or dietary benefits.
    HealthBenefits,
    /// Indoor/outdoor placement.
    Location,
}

impl PlantField {
    /// Every field, in prompt order.
    pub const ALL: [PlantField; 14] = [
        Self::ScientificName,
        Self::CommonName,
        Self::Family,
        Self::Description,
        Self::NativeRegion,
        Self::GrowthType,
        Self::SunlightRequirements,
        Self::TemperatureRequirements,
        Self::SoilPreference,
        Self::WaterNeeds,
        Self::BloomSeason,
        Self::PropagationMethods,
        Self::HealthBenefits,
        Self::Location,
    ];

    /// The label used in the prompt and in labeled replies.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ScientificName => "Scientific Name",
            Self::CommonName => "Common Name",
            Self::Family => "Plant Family",
            Self::Description => "Detailed Description",
            Self::NativeRegion => "Native Region",
            Self::GrowthType => "Growth Type",
            Self::SunlightRequirements => "Sunlight Requirements",
            Self::TemperatureRequirements => "Temperature Requirements",
            Self::SoilPreference => "Soil Preference",
            Self::WaterNeeds => "Water Needs",
            Self::BloomSeason => "Typical Bloom Season",
            Self::PropagationMethods => "Detailed Propagation Methods",
            Self::HealthBenefits => "Health Benefits",
            Self::Location => "Location",
        }
    }

    /// Keys accepted in structured replies, preferred key first.
    pub fn json_keys(&self) -> &'static [&'static str] {
        match self {
            Self::ScientificName => &["Scientific Name"],
            Self::CommonName => &["Common Name"],
            Self::Family => &["Plant Family", "Family"],
            Self::Description => &["Detailed Description", "Description"],
            Self::NativeRegion => &["Native Region"],
            Self::GrowthType => &["Growth Type"],
            Self::SunlightRequirements => &["Sunlight Requirements", "Sunlight"],
            Self::TemperatureRequirements => &["Temperature Requirements", "Temperature"],
            Self::SoilPreference => &["Soil Preference"],
            Self::WaterNeeds => &["Water Needs"],
            Self::BloomSeason => &["Typical Bloom Season", "Bloom Season"],
            Self::PropagationMethods => &["Detailed Propagation Methods", "Propagation Methods"],
            Self::HealthBenefits => &["Health Benefits"],
            Self::Location => &["Location"],
        }
    }

    /// Text used when the reply says nothing about this field.
    pub fn fallback(&self) -> &'static str {
        match self {
            Self::ScientificName => UNABLE_TO_DETERMINE,
            Self::CommonName | Self::GrowthType => "Unknown",
            Self::Family => "Unclassified",
            Self::Description => NO_DESCRIPTION,
            Self::PropagationMethods => NO_PROPAGATION_METHODS,
            _ => NOT_SPECIFIED,
        }
    }
}

/// Everything the model told us about one plant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantInfo {
    /// Binomial name.
    pub scientific_name: InfoDetail,
    /// Everyday name.
    pub common_name: InfoDetail,
    /// Botanical family.
    pub family: InfoDetail,
    /// Free-form description.
    pub description: InfoDetail,
    /// Where the plant originates.
    pub native_region: InfoDetail,
    /// Tree, shrub, herb, ...
    pub growth_type: InfoDetail,
    /// Light needs.
    pub sunlight_requirements: InfoDetail,
    /// Temperature range.
    pub temperature_requirements: InfoDetail,
    /// Preferred soil.
    pub soil_preference: InfoDetail,
    /// Watering needs.
    pub water_needs: InfoDetail,
    /// When it flowers.
    pub bloom_season: InfoDetail,
    /// One entry per method.
    pub propagation_methods: Vec<InfoDetail>,
    /// Medicinal or dietary benefits.
    pub health_benefits: InfoDetail,
    /// Indoor/outdoor placement.
    pub location: InfoDetail,
    /// Always `scientific_name.short`.
    pub name: String,
    /// Where the identified image can be displayed from; empty until the
    /// pipeline attaches one.
    pub image_url: String,
}

impl PlantInfo {
    /// Builds a record from a per-field lookup. `name` is derived from the
    /// scientific name.
    pub(crate) fn from_fields(
        mut detail: impl FnMut(PlantField) -> InfoDetail,
        propagation_methods: Vec<InfoDetail>,
    ) -> Self {
        let scientific_name = detail(PlantField::ScientificName);
        Self {
            name: scientific_name.short.clone(),
            scientific_name,
            common_name: detail(PlantField::CommonName),
            family: detail(PlantField::Family),
            description: detail(PlantField::Description),
            native_region: detail(PlantField::NativeRegion),
            growth_type: detail(PlantField::GrowthType),
            sunlight_requirements: detail(PlantField::SunlightRequirements),
            temperature_requirements: detail(PlantField::TemperatureRequirements),
            soil_preference: detail(PlantField::SoilPreference),
            water_needs: detail(PlantField::WaterNeeds),
            bloom_season: detail(PlantField::BloomSeason),
            propagation_methods,
            health_benefits: detail(PlantField::HealthBenefits),
            location: detail(PlantField::Location),
            image_url: String::new(),
        }
    }

    /// Attaches the displayable image location.
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = url.into();
        self
    }

    /// Looks up a single-valued field. Propagation methods return the first
    /// entry.
    pub fn field(&self, field: PlantField) -> Option<&InfoDetail> {
        Some(match field {
            PlantField::ScientificName => &self.scientific_name,
            PlantField::CommonName => &self.common_name,
            PlantField::Family => &self.family,
            PlantField::Description => &self.description,
            PlantField::NativeRegion => &self.native_region,
            PlantField::GrowthType => &self.growth_type,
            PlantField::SunlightRequirements => &self.sunlight_requirements,
            PlantField::TemperatureRequirements => &self.temperature_requirements,
            PlantField::SoilPreference => &self.soil_preference,
            PlantField::WaterNeeds => &self.water_needs,
            PlantField::BloomSeason => &self.bloom_season,
            PlantField::PropagationMethods => return self.propagation_methods.first(),
            PlantField::HealthBenefits => &self.health_benefits,
            PlantField::Location => &self.location,
        })
    }
}
