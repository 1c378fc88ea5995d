use crate::config::load_config;
use crate::dump::{GraphDump, write_graph_dump};
use crate::graph::{StepGraph, compile_legacy_with_style, compile_with_style};
use crate::ir::find_nested_flow;
use crate::layout::compute_layout;
use crate::parser::{parse_legacy_workflow, parse_step_flow};
use anyhow::Result;
use clap::Parser;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "sfg",
    version,
    about = "Compile workflow step flows into positioned node/edge graphs"
)]
pub struct Args {
    /// Input file (.json/.json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Input is a legacy workflow (stepGraph + stepSubscriberGraph)
    #[arg(long = "legacy", conflicts_with = "drill")]
    pub legacy: bool,

    /// Compile the nested workflow at this path instead, e.g. 'outer/inner'
    #[arg(long = "drill", value_name = "PATH")]
    pub drill: Option<String>,

    /// Config JSON file (layout sizes and edge style)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Skip the layout pass; every node stays at the origin
    #[arg(long = "no-layout")]
    pub no_layout: bool,

    /// Write compact JSON instead of pretty-printed
    #[arg(long = "compact")]
    pub compact: bool,

    /// Log compilation details to stderr
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let config = load_config(args.config.as_deref())?;
    let input = read_input(args.input.as_deref())?;

    let (graph, label) = compile_input(&input, &args, &config.edge_style)?;
    info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "compiled input"
    );

    let dump = if args.no_layout {
        GraphDump::from_graph(graph, &config.layout)
    } else {
        GraphDump::from_layout(compute_layout(graph, &config.layout))
    };
    write_graph_dump(
        &dump.with_label(label),
        args.output.as_deref(),
        !args.compact,
    )
}

fn compile_input(
    input: &str,
    args: &Args,
    edge_style: &crate::graph::EdgeStyle,
) -> Result<(StepGraph, Option<String>)> {
    if args.legacy {
        let workflow = parse_legacy_workflow(input)?;
        return Ok((compile_legacy_with_style(&workflow, edge_style)?, None));
    }

    let entries = parse_step_flow(input)?;
    match args.drill.as_deref() {
        Some(path) => {
            let nested = find_nested_flow(&entries, path)?;
            let graph = compile_with_style(nested.entries, edge_style)?;
            Ok((graph, Some(nested.label)))
        }
        None => Ok((compile_with_style(&entries, edge_style)?, None)),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
