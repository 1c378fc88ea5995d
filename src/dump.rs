use crate::config::LayoutConfig;
use crate::graph::{NodeKind, NodePayload, Position, StepGraph, VisualEdge};
use crate::layout::{Layout, node_size};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Positioned graph as handed to the rendering surface.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDump {
    /// Breadcrumb of the nested flow this graph was drilled into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<VisualEdge>,
    pub full_width: f32,
    pub full_height: f32,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub position: Position,
    pub width: f32,
    pub height: f32,
    pub data: NodePayload,
}

impl GraphDump {
    pub fn from_layout(layout: Layout) -> Self {
        let nodes = layout
            .nodes
            .into_iter()
            .map(|layout| NodeDump {
                id: layout.node.id,
                kind: layout.node.kind,
                position: layout.node.position,
                width: layout.width,
                height: layout.height,
                data: layout.node.payload,
            })
            .collect();

        GraphDump {
            label: None,
            nodes,
            edges: layout.edges,
            full_width: layout.full_width,
            full_height: layout.full_height,
        }
    }

    /// Dump of a graph that was not laid out: every node at the origin, sized
    /// the way the layout engine would size it.
    pub fn from_graph(graph: StepGraph, config: &LayoutConfig) -> Self {
        let nodes = graph
            .nodes
            .into_iter()
            .map(|node| {
                let (width, height) = node_size(&node, config);
                NodeDump {
                    id: node.id,
                    kind: node.kind,
                    position: node.position,
                    width,
                    height,
                    data: node.payload,
                }
            })
            .collect();

        GraphDump {
            label: None,
            nodes,
            edges: graph.edges,
            full_width: 0.0,
            full_height: 0.0,
        }
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }
}

/// Writes the dump as JSON to `path`, or stdout when no path is given.
pub fn write_graph_dump(dump: &GraphDump, path: Option<&Path>, pretty: bool) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            write_json(writer, dump, pretty)
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_json(&mut writer, dump, pretty)?;
            writeln!(writer)?;
            Ok(())
        }
    }
}

fn write_json<W: Write>(writer: W, dump: &GraphDump, pretty: bool) -> anyhow::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(writer, dump)?;
    } else {
        serde_json::to_writer(writer, dump)?;
    }
    Ok(())
}
