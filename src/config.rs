use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::graph::{EdgeStyle, MarkerEnd};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub node_width: f32,
    pub node_height: f32,
    /// Height of condition nodes flagged large.
    pub large_node_height: f32,
    pub node_spacing: f32,
    pub rank_spacing: f32,
    pub order_passes: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 274.0,
            node_height: 100.0,
            large_node_height: 260.0,
            node_spacing: 50.0,
            rank_spacing: 50.0,
            order_passes: 4,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub layout: LayoutConfig,
    pub edge_style: EdgeStyle,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    node_width: Option<f32>,
    node_height: Option<f32>,
    large_node_height: Option<f32>,
    node_spacing: Option<f32>,
    rank_spacing: Option<f32>,
    order_passes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct EdgeStyleFile {
    animated: Option<bool>,
    stroke: Option<String>,
    stroke_width: Option<f32>,
    marker_end: Option<MarkerEnd>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<LayoutConfigFile>,
    edge_style: Option<EdgeStyleFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Applies a JSON config document on top of the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = serde_json::from_str(contents)?;

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.node_width {
            config.layout.node_width = v;
        }
        if let Some(v) = layout.node_height {
            config.layout.node_height = v;
        }
        if let Some(v) = layout.large_node_height {
            config.layout.large_node_height = v;
        }
        if let Some(v) = layout.node_spacing {
            config.layout.node_spacing = v;
        }
        if let Some(v) = layout.rank_spacing {
            config.layout.rank_spacing = v;
        }
        if let Some(v) = layout.order_passes {
            config.layout.order_passes = v;
        }
    }

    if let Some(style) = parsed.edge_style {
        if let Some(v) = style.animated {
            config.edge_style.animated = v;
        }
        if let Some(v) = style.stroke {
            config.edge_style.stroke = v;
        }
        if let Some(v) = style.stroke_width {
            config.edge_style.stroke_width = v;
        }
        if style.marker_end.is_some() {
            config.edge_style.marker_end = style.marker_end;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.layout.node_width, 274.0);
        assert_eq!(config.layout.large_node_height, 260.0);
        assert_eq!(config.edge_style.stroke, "#8e8e8e");
    }

    #[test]
    fn file_fields_override_defaults() {
        let config = parse_config(
            r#"{"layout": {"rankSpacing": 80, "orderPasses": 2},
                "edgeStyle": {"animated": false, "markerEnd": "arrow"}}"#,
        )
        .unwrap();
        assert_eq!(config.layout.rank_spacing, 80.0);
        assert_eq!(config.layout.order_passes, 2);
        assert_eq!(config.layout.node_spacing, 50.0);
        assert!(!config.edge_style.animated);
        assert_eq!(config.edge_style.marker_end, Some(MarkerEnd::Arrow));
        assert_eq!(config.edge_style.stroke_width, 1.0);
    }

    #[test]
    fn invalid_document_is_rejected() {
        assert!(parse_config("{\"layout\": 3}").is_err());
        assert!(parse_config("not json").is_err());
    }
}
