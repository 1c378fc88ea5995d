use serde::Deserialize;
use stepflow_graph::dump::GraphDump;
use stepflow_graph::graph::{compile_legacy_with_style, compile_with_style};
use stepflow_graph::parser::{parse_legacy_workflow, parse_step_flow};
use stepflow_graph::{Config, compute_layout, find_nested_flow};
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepFlowRenderOptions {
    node_width: Option<f32>,
    node_height: Option<f32>,
    large_node_height: Option<f32>,
    node_spacing: Option<f32>,
    rank_spacing: Option<f32>,
    animated_edges: Option<bool>,
    /// Nested workflow path to drill into, e.g. `outer/inner`.
    drill: Option<String>,
}

fn build_config(options: &StepFlowRenderOptions) -> Config {
    let mut config = Config::default();
    if let Some(v) = options.node_width {
        config.layout.node_width = v;
    }
    if let Some(v) = options.node_height {
        config.layout.node_height = v;
    }
    if let Some(v) = options.large_node_height {
        config.layout.large_node_height = v;
    }
    if let Some(v) = options.node_spacing {
        config.layout.node_spacing = v;
    }
    if let Some(v) = options.rank_spacing {
        config.layout.rank_spacing = v;
    }
    if let Some(v) = options.animated_edges {
        config.edge_style.animated = v;
    }
    config
}

fn parse_options(options_json: Option<String>) -> Result<StepFlowRenderOptions, String> {
    match options_json {
        Some(raw_options) => {
            serde_json::from_str(&raw_options).map_err(|error| error.to_string())
        }
        None => Ok(StepFlowRenderOptions::default()),
    }
}

fn step_flow_json(code: &str, options: StepFlowRenderOptions) -> Result<String, String> {
    let config = build_config(&options);
    let entries = parse_step_flow(code).map_err(|error| error.to_string())?;
    let (entries, label) = match options.drill.as_deref() {
        Some(path) => {
            let nested = find_nested_flow(&entries, path).map_err(|error| error.to_string())?;
            (nested.entries, Some(nested.label))
        }
        None => (entries.as_slice(), None),
    };
    let graph = compile_with_style(entries, &config.edge_style).map_err(|error| error.to_string())?;
    let dump = GraphDump::from_layout(compute_layout(graph, &config.layout)).with_label(label);
    serde_json::to_string(&dump).map_err(|error| error.to_string())
}

fn legacy_workflow_json(code: &str, options: StepFlowRenderOptions) -> Result<String, String> {
    let config = build_config(&options);
    let workflow = parse_legacy_workflow(code).map_err(|error| error.to_string())?;
    let graph =
        compile_legacy_with_style(&workflow, &config.edge_style).map_err(|error| error.to_string())?;
    let dump = GraphDump::from_layout(compute_layout(graph, &config.layout));
    serde_json::to_string(&dump).map_err(|error| error.to_string())
}

#[wasm_bindgen]
pub fn compile_step_flow(code: &str, options_json: Option<String>) -> Result<String, JsValue> {
    parse_options(options_json)
        .and_then(|options| step_flow_json(code, options))
        .map_err(|error| JsValue::from_str(&error))
}

#[wasm_bindgen]
pub fn compile_legacy_workflow(code: &str, options_json: Option<String>) -> Result<String, JsValue> {
    parse_options(options_json)
        .and_then(|options| legacy_workflow_json(code, options))
        .map_err(|error| JsValue::from_str(&error))
}
