use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A file held in transient local storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAsset {
    pub path: PathBuf,
    pub content_hash: String,
}

impl LocalAsset {
    /// Lower-cased extension of the stored file
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }
}

/// A generated preview image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewAsset {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub format: String,
}

impl PreviewAsset {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Intrinsic properties and embedded tags of an original image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub content_hash: String,
    pub exif: BTreeMap<String, String>,
    pub xmp: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

/// Lower-cased extension of a path, if it has one
pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| !e.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_lowercased() {
        let asset = LocalAsset {
            path: PathBuf::from("temp/0f3a_COVER.JPG"),
            content_hash: String::new(),
        };
        assert_eq!(asset.extension().as_deref(), Some("jpg"));
    }

    #[test]
    fn test_missing_extension() {
        let asset = LocalAsset {
            path: PathBuf::from("temp/0f3a_README"),
            content_hash: String::new(),
        };
        assert_eq!(asset.extension(), None);
    }

    #[test]
    fn test_image_metadata_omits_absent_timestamps() {
        let metadata = ImageMetadata {
            width: 10,
            height: 20,
            content_hash: "00".repeat(16),
            ..ImageMetadata::default()
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert!(json.get("created").is_none());
        assert!(json.get("modified").is_none());
        assert_eq!(json["width"], 10);
        assert!(json["exif"].as_object().unwrap().is_empty());
    }
}
