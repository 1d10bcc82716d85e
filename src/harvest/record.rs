// src/harvest/record.rs
// =============================================================================
// The unit of output: one URL plus the tag saying how it was found.
//
// - `wayback`         the URL came straight from the archive index
// - `wayback:robots`  found inside an archived robots.txt
// - `wayback:source`  found inside an archived page body
//
// Records serialize as flat JSON objects: {"source": ..., "value": ...}
// =============================================================================

use serde::{Deserialize, Serialize};

pub const SOURCE_NAME: &str = "wayback";

/// One discovered URL and where it came from.
///
/// `source` is `wayback` for URLs straight from the index, or
/// `wayback:robots` / `wayback:source` for URLs found by expansion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UrlRecord {
    pub source: String,
    pub value: String,
}

/// Which expander produced a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    Robots,
    Source,
}

impl Expansion {
    pub fn source_tag(self) -> String {
        match self {
            Expansion::Robots => format!("{}:robots", SOURCE_NAME),
            Expansion::Source => format!("{}:source", SOURCE_NAME),
        }
    }
}

impl UrlRecord {
    pub fn indexed(value: String) -> Self {
        Self {
            source: SOURCE_NAME.to_string(),
            value,
        }
    }

    pub fn expanded(expansion: Expansion, value: String) -> Self {
        Self {
            source: expansion.source_tag(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_tags() {
        assert_eq!(UrlRecord::indexed("u".to_string()).source, "wayback");
        assert_eq!(
            UrlRecord::expanded(Expansion::Robots, "u".to_string()).source,
            "wayback:robots"
        );
        assert_eq!(
            UrlRecord::expanded(Expansion::Source, "u".to_string()).source,
            "wayback:source"
        );
    }

    #[test]
    fn test_serializes_as_flat_json() {
        let record = UrlRecord::indexed("http://example.com/a".to_string());
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"source":"wayback","value":"http://example.com/a"}"#
        );
    }
}
