use serde::{Deserialize, Serialize};

/// Caller-supplied sizing parameters.
///
/// Precedence between the fields is decided by the preview generator: bounding
/// box first, then explicit width and height, then a single side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bounding_box: Option<u32>,
    /// Output format extension (e.g. "png"); the configured default when absent
    pub format: Option<String>,
}

/// Process-wide fallbacks consulted when a request carries no sizing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingDefaults {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bounding_box: Option<u32>,
    pub format: String,
}
