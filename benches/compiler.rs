use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use stepflow_graph::config::LayoutConfig;
use stepflow_graph::graph::compile;
use stepflow_graph::ir::{Condition, ConditionKind, ExitCondition, LoopKind, StepFlowEntry, StepRef};
use stepflow_graph::layout::compute_layout;
use stepflow_graph::parser::parse_step_flow;
use std::hint::black_box;

/// `blocks` repetitions of step, 3-way parallel, if/else conditional and loop.
/// Step ids repeat across blocks to exercise collision renaming.
fn synthetic_flow(blocks: usize) -> Vec<StepFlowEntry> {
    let mut entries = Vec::with_capacity(blocks * 4);
    for block in 0..blocks {
        entries.push(StepFlowEntry::step("fetch"));
        entries.push(StepFlowEntry::Parallel {
            branches: (0..3)
                .map(|lane| {
                    vec![
                        StepFlowEntry::step(&format!("lane{lane}")),
                        StepFlowEntry::step(&format!("lane{lane}-post")),
                    ]
                })
                .collect(),
        });
        entries.push(StepFlowEntry::Conditional {
            branches: vec![
                vec![StepFlowEntry::step("approve")],
                vec![StepFlowEntry::step("reject")],
            ],
            branch_conditions: vec![
                Condition::raw(ConditionKind::If, "ctx.score > 10"),
                Condition::bare(ConditionKind::Else),
            ],
        });
        entries.push(StepFlowEntry::Loop {
            step: StepRef::new("retry"),
            exit_condition: ExitCondition {
                id: format!("retry-done-{block}"),
                expr: "ctx.attempts > 3".to_string(),
            },
            loop_kind: LoopKind::Until,
        });
    }
    entries
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for blocks in [4usize, 32, 128] {
        let input = serde_json::to_string(&synthetic_flow(blocks)).expect("serialize failed");
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &input, |b, data| {
            b.iter(|| {
                let entries = parse_step_flow(black_box(data)).expect("parse failed");
                black_box(entries.len());
            });
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for blocks in [4usize, 32, 128] {
        let entries = synthetic_flow(blocks);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &entries, |b, entries| {
            b.iter(|| {
                let graph = compile(black_box(entries)).expect("compile failed");
                black_box(graph.nodes.len());
            });
        });
    }
    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = LayoutConfig::default();
    for blocks in [4usize, 32, 128] {
        let graph = compile(&synthetic_flow(blocks)).expect("compile failed");
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &graph, |b, graph| {
            b.iter(|| {
                let layout = compute_layout(black_box(graph.clone()), &config);
                black_box(layout.full_height);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_compile, bench_layout);
criterion_main!(benches);
