#[cfg(feature = "cli")]
pub mod cli;
pub mod condition;
pub mod config;
pub mod dump;
pub mod error;
pub mod graph;
pub mod ir;
pub mod layout;
pub mod parser;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, load_config};
pub use error::{Error, Result};
pub use graph::{StepGraph, compile, compile_legacy};
pub use ir::{StepFlowEntry, find_nested_flow};
pub use layout::{Layout, compute_layout};

/// Parses, compiles and lays out a step-flow document.
pub fn layout_step_flow(input: &str, config: &Config) -> Result<Layout> {
    let entries = parser::parse_step_flow(input)?;
    let graph = graph::compile_with_style(&entries, &config.edge_style)?;
    Ok(compute_layout(graph, &config.layout))
}

/// Parses, compiles and lays out a legacy workflow document.
pub fn layout_legacy_workflow(input: &str, config: &Config) -> Result<Layout> {
    let workflow = parser::parse_legacy_workflow(input)?;
    let graph = graph::compile_legacy_with_style(&workflow, &config.edge_style)?;
    Ok(compute_layout(graph, &config.layout))
}
