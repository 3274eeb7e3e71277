//! Turning the model's free text into a [`PlantInfo`].
//!
//! Replies come in two shapes, depending on how the prompt was phrased when
//! the model answered:
//!
//! - labeled lines (`Scientific Name: Rosa canina`), handled by
//!   [`LabeledTextParser`];
//! - a JSON object inside a ```` ```json ```` fence, handled by
//!   [`FencedJsonParser`].
//!
//! [`AutoParser`] (and [`parse_response`]) picks the strategy by looking for
//! the fence. Neither strategy applies display policy; see
//! [`crate::present`] for that.
//!
//! ```
//! use plant_helpline::parser::parse_response;
//!
//! let info = parse_response("Scientific Name: Rosa canina\nCommon Name: Dog rose").unwrap();
//! assert_eq!(info.scientific_name.short, "Rosa canina");
//! assert_eq!(info.common_name.short, "Dog rose");
//! ```

mod fenced_json;
mod labeled;

pub use fenced_json::FencedJsonParser;
pub use labeled::LabeledTextParser;

use crate::error::Result;
use crate::plant::PlantInfo;
use std::fmt;

/// Strategy for turning a raw model reply into a record.
pub trait ResponseParser: Send + Sync {
    /// Parses one reply.
    fn parse(&self, raw: &str) -> Result<PlantInfo>;
}

/// Known reply shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `Label: value` lines.
    LabeledText,
    /// JSON object in a fenced ```` ```json ```` block.
    FencedJson,
}

impl ResponseShape {
    /// Picks the shape by content: a `json` fence anywhere means structured.
    pub fn sniff(raw: &str) -> Self {
        if fenced_json::has_json_fence(raw) {
            Self::FencedJson
        } else {
            Self::LabeledText
        }
    }
}

impl fmt::Display for ResponseShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LabeledText => write!(f, "labeled-text"),
            Self::FencedJson => write!(f, "fenced-json"),
        }
    }
}

/// Parser that sniffs each reply and delegates to the matching strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoParser {
    labeled: LabeledTextParser,
    fenced: FencedJsonParser,
}

impl AutoParser {
    /// Creates the sniffing parser.
    pub fn new() -> Self {
        Self::default()
    }

    fn strategy(&self, shape: ResponseShape) -> &dyn ResponseParser {
        match shape {
            ResponseShape::LabeledText => &self.labeled,
            ResponseShape::FencedJson => &self.fenced,
        }
    }
}

impl ResponseParser for AutoParser {
    fn parse(&self, raw: &str) -> Result<PlantInfo> {
        let shape = ResponseShape::sniff(raw);
        tracing::debug!(%shape, chars = raw.chars().count(), "parsing model response");
        self.strategy(shape).parse(raw)
    }
}

/// Parses a reply with [`AutoParser`].
pub fn parse_response(raw: &str) -> Result<PlantInfo> {
    AutoParser::new().parse(raw)
}
