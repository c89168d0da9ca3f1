//! Benchmarks for Tempo scheduling and routing
//!
//! Run with: cargo bench -p tempo-compile

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tempo_compile::mapper::{MapperConfig, MapperKind};
use tempo_compile::scheduler::{Direction, SchedulerConfig};
use tempo_compile::{Compiler, CompilerConfig, DependencyGraph, ListScheduler, Mapper, Platform};
use tempo_ir::{CregId, Kernel, Program, QubitId};

/// Layers of Hadamards followed by a ladder of CNOTs, then readout.
fn layered_kernel(name: &str, n: u32, layers: u32) -> Kernel {
    let mut kernel = Kernel::new(name, n, n);
    for layer in 0..layers {
        for q in 0..n {
            kernel.gate("h", QubitId(q)).unwrap();
        }
        for q in 0..n - 1 {
            let target = (q + 1 + layer) % n;
            if target != q {
                kernel.cnot(QubitId(q), QubitId(target)).unwrap();
            }
        }
    }
    for q in 0..n {
        kernel.measure(QubitId(q), CregId(q)).unwrap();
    }
    kernel
}

fn bench_dependency_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependency_graph");
    let platform = Platform::grid(4, 4).unwrap();

    for layers in &[5, 20, 50] {
        let kernel = layered_kernel("bench", 16, *layers);
        group.bench_with_input(BenchmarkId::new("build", layers), &kernel, |b, kernel| {
            b.iter(|| DependencyGraph::build(black_box(kernel), &platform, true).unwrap());
        });
    }

    group.finish();
}

fn bench_scheduler(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler");
    let platform = Arc::new(Platform::grid(4, 4).unwrap());
    let kernel = layered_kernel("bench", 16, 20);

    for direction in [Direction::Asap, Direction::Alap, Direction::Uniform] {
        let config = SchedulerConfig {
            direction,
            ..SchedulerConfig::default()
        };
        group.bench_function(format!("{direction:?}").to_lowercase(), |b| {
            b.iter(|| {
                ListScheduler::new(Arc::clone(&platform), config)
                    .schedule(black_box(&kernel))
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_mapper(c: &mut Criterion) {
    let mut group = c.benchmark_group("mapper");
    let platform = Arc::new(Platform::grid(4, 4).unwrap());
    let kernel = layered_kernel("bench", 16, 10);

    for kind in [MapperKind::Base, MapperKind::MinExtend, MapperKind::MinExtendRc] {
        let config = MapperConfig {
            kind,
            ..MapperConfig::default()
        };
        group.bench_function(format!("{kind:?}").to_lowercase(), |b| {
            b.iter(|| {
                Mapper::new(Arc::clone(&platform), config)
                    .map(black_box(&kernel))
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_program(c: &mut Criterion) {
    let mut group = c.benchmark_group("program");
    let compiler = Compiler::new(Arc::new(Platform::grid(3, 3).unwrap()), CompilerConfig::default()).unwrap();

    for kernels in &[1, 4, 16] {
        let mut program = Program::new("bench");
        for i in 0..*kernels {
            program.add_kernel(layered_kernel(&format!("k{i}"), 9, 5));
        }
        group.bench_with_input(BenchmarkId::new("compile", kernels), &program, |b, program| {
            b.iter(|| compiler.compile_program(black_box(program)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_dependency_graph,
    bench_scheduler,
    bench_mapper,
    bench_program
);
criterion_main!(benches);
