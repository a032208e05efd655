use serde::Serialize;
use strum_macros::{Display, EnumString};

/// Compression tier picked on the "compression level" grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Extreme,
    Recommended,
    Low,
}

/// Scale and quality applied to an image payload, both in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompressionFactors {
    pub scale: f64,
    pub quality: f64,
}

impl CompressionFactors {
    /// Used when no tier resolves: keep dimensions, moderate quality.
    pub const FALLBACK: Self = Self {
        scale: 1.0,
        quality: 0.8,
    };

    pub fn for_level(level: Option<CompressionLevel>) -> Self {
        level.map(CompressionLevel::factors).unwrap_or(Self::FALLBACK)
    }
}

impl CompressionLevel {
    pub const ALL: [CompressionLevel; 3] = [
        CompressionLevel::Extreme,
        CompressionLevel::Recommended,
        CompressionLevel::Low,
    ];

    pub fn factors(self) -> CompressionFactors {
        let (scale, quality) = match self {
            CompressionLevel::Extreme => (0.6, 0.5),
            CompressionLevel::Recommended => (0.85, 0.75),
            CompressionLevel::Low => (0.95, 0.92),
        };
        CompressionFactors { scale, quality }
    }
}
