//! Search settings.

use std::time::{Duration, SystemTime};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// How the name pattern is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameMode {
    /// Shell glob over the file name (`*.rs`, `report-??.pdf`).
    #[default]
    Glob,
    /// Regular expression, unanchored.
    Regex,
}

/// How the content pattern is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    /// Literal byte substring.
    #[default]
    Exact,
    /// Regular expression over bytes.
    Regex,
}

/// What a [`FileSearchJob`](crate::FileSearchJob) looks for.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into, strip_option), default, build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct SearchSettings {
    /// Pattern matched against file names.
    pub name_pattern: Option<String>,
    pub name_mode: NameMode,
    pub name_case_sensitive: bool,

    /// Pattern searched for inside regular files.
    pub content_pattern: Option<String>,
    pub content_mode: ContentMode,
    pub content_case_sensitive: bool,

    /// Descend into subdirectories.
    pub recursive: bool,
    /// Report and descend into entries whose name starts with a dot.
    pub show_hidden: bool,

    /// Mime types to accept: exact (`text/plain`) or by prefix (`image/*`).
    pub mime_types: Vec<String>,

    /// Size bounds in bytes, inclusive.
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,

    /// Modification time window, inclusive.
    pub modified_after: Option<SystemTime>,
    pub modified_before: Option<SystemTime>,

    /// Bytes read per step of a content search.
    pub chunk_size: usize,

    /// Minimum time between two `files_added` batches, in milliseconds.
    pub batch_interval_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            name_pattern: None,
            name_mode: NameMode::Glob,
            name_case_sensitive: false,
            content_pattern: None,
            content_mode: ContentMode::Exact,
            content_case_sensitive: false,
            recursive: true,
            show_hidden: false,
            mime_types: Vec::new(),
            min_size: None,
            max_size: None,
            modified_after: None,
            modified_before: None,
            chunk_size: crate::content::DEFAULT_CHUNK_SIZE,
            batch_interval_ms: 200,
        }
    }
}

impl SearchSettingsBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.chunk_size == Some(0) {
            return Err("chunk_size must be at least 1".to_string());
        }
        if let (Some(Some(min)), Some(Some(max))) = (self.min_size, self.max_size) {
            if min > max {
                return Err(format!("min_size {min} is larger than max_size {max}"));
            }
        }
        Ok(())
    }
}

impl SearchSettings {
    /// Create a new settings builder.
    pub fn builder() -> SearchSettingsBuilder {
        SearchSettingsBuilder::default()
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let settings = SearchSettings::builder()
            .name_pattern("*.rs")
            .build()
            .unwrap();

        assert_eq!(settings.name_pattern.as_deref(), Some("*.rs"));
        assert_eq!(settings.name_mode, NameMode::Glob);
        assert!(settings.recursive);
        assert!(!settings.show_hidden);
        assert_eq!(settings.batch_interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_builder_rejects_inverted_size_range() {
        let result = SearchSettings::builder()
            .min_size(100u64)
            .max_size(10u64)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: SearchSettings =
            serde_json::from_str(r#"{"name_mode": "regex", "show_hidden": true}"#).unwrap();
        assert_eq!(settings.name_mode, NameMode::Regex);
        assert!(settings.show_hidden);
        assert!(settings.recursive);
    }
}
