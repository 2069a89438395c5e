use serde::{Deserialize, Serialize};

use super::SizingSpec;

/// Remote file a job was started for. Never mutated after job start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    pub url: String,
    /// Caller-supplied output name, used for naming only
    pub declared_name: String,
}

impl SourceReference {
    pub fn new(url: impl Into<String>, declared_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            declared_name: declared_name.into(),
        }
    }
}

/// Outcome of a successful availability and size check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Declared content length, 0 when the server did not send one
    pub size_bytes: u64,
    pub final_url: String,
}

/// Input of one pipeline execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRequest {
    #[serde(default, alias = "file_url")]
    pub url: String,
    #[serde(default, alias = "file_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, alias = "resize", skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, alias = "postback_url", skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl PreviewRequest {
    pub fn source(&self) -> SourceReference {
        SourceReference::new(self.url.trim(), self.name.clone())
    }

    pub fn sizing(&self) -> SizingSpec {
        SizingSpec {
            width: self.width.filter(|&w| w > 0),
            height: self.height.filter(|&h| h > 0),
            bounding_box: self.bounding_box.filter(|&b| b > 0),
            format: self
                .format
                .as_ref()
                .map(|f| f.trim().to_lowercase())
                .filter(|f| !f.is_empty()),
        }
    }

    /// Callback URL, ignoring blank values
    pub fn callback(&self) -> Option<&str> {
        self.callback_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}
