//! Render configuration.

use serde::Deserialize;

use crate::error::ViewResult;

/// Settings shared by every render a [`Renderer`](crate::Renderer) performs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    /// Model path under which each component's private data lives.
    pub components_path: String,
    /// Also compare attribute values when attaching to existing markup.
    pub strict_attach_attributes: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            components_path: "_components".to_string(),
            strict_attach_attributes: false,
        }
    }
}

impl RenderConfig {
    /// Load a config from JSON. Missing fields take their defaults.
    pub fn from_json(source: &str) -> ViewResult<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.components_path, "_components");
        assert!(!config.strict_attach_attributes);
    }

    #[test]
    fn test_from_json_partial() {
        let config = RenderConfig::from_json(r#"{"strictAttachAttributes": true}"#).unwrap();
        assert!(config.strict_attach_attributes);
        assert_eq!(config.components_path, "_components");
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(RenderConfig::from_json("{not json").is_err());
    }
}
