//! Property-based tests for scheduling and routing invariants.

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use tempo_compile::mapper::{MapperConfig, MapperKind, SelectSwaps};
use tempo_compile::platform::{ResourceClass, ResourcesConfig, UnitConfig};
use tempo_compile::scheduler::{Direction, SchedulerConfig};
use tempo_compile::{DependencyGraph, ListScheduler, Mapper, Platform, PlatformConfig, ResourceModel};
use tempo_ir::{ClassicalCondition, CregId, Instruction, Kernel, QubitId};

const QUBITS: u32 = 4;
const CREGS: u32 = 2;

/// Linear chain with two drive units and one shared readout unit.
fn constrained_platform() -> Arc<Platform> {
    let resources = ResourcesConfig {
        drive_units: Some(UnitConfig::new(2, BTreeMap::from([(0, vec![0, 1]), (1, vec![2, 3])]))),
        readout_units: Some(UnitConfig::new(1, BTreeMap::from([(0, vec![0, 1, 2, 3])])).with_capacity(2)),
        ..ResourcesConfig::default()
    };
    Arc::new(Platform::new(PlatformConfig::linear(QUBITS).with_resources(resources)).unwrap())
}

/// Linear chain whose drive and readout units are shared, with flux pulses
/// detuning neighbors and, optionally, buffers between classes.
fn sharing_platform(buffers: bool) -> Arc<Platform> {
    let resources = ResourcesConfig {
        drive_units: Some(UnitConfig::new(1, BTreeMap::from([(0, vec![0, 1, 2, 3])])).shared()),
        readout_units: Some(UnitConfig::new(2, BTreeMap::from([(0, vec![0, 1]), (1, vec![2, 3])])).shared()),
        detuned_qubits: Some(BTreeMap::from([(0, vec![2]), (2, vec![1])])),
        ..ResourcesConfig::default()
    };
    let mut config = PlatformConfig::linear(QUBITS).with_resources(resources);
    if buffers {
        config = config
            .with_buffer(ResourceClass::Drive, ResourceClass::Flux, 20)
            .with_buffer(ResourceClass::Flux, ResourceClass::Readout, 40)
            .with_buffer(ResourceClass::Readout, ResourceClass::Drive, 20);
    }
    Arc::new(Platform::new(config).unwrap())
}

fn arb_platform() -> impl Strategy<Value = Arc<Platform>> {
    prop_oneof![
        Just(()).prop_map(|_| constrained_platform()),
        any::<bool>().prop_map(sharing_platform),
    ]
}

/// A platform on which Uniform keeps the ASAP makespan: no buffers.
fn arb_unbuffered_platform() -> impl Strategy<Value = Arc<Platform>> {
    prop_oneof![
        Just(()).prop_map(|_| constrained_platform()),
        Just(()).prop_map(|_| sharing_platform(false)),
    ]
}

fn arb_gate(num_qubits: u32) -> impl Strategy<Value = Instruction> {
    let pair = (0..num_qubits, 1..num_qubits)
        .prop_map(move |(a, d)| (QubitId(a), QubitId((a + d) % num_qubits)));
    prop_oneof![
        3 => (prop::sample::select(vec!["x", "y", "h", "z"]), 0..num_qubits)
            .prop_map(|(name, q)| Instruction::single(name, QubitId(q))),
        3 => (prop::sample::select(vec!["cnot", "cz"]), pair)
            .prop_map(|(name, (a, b))| Instruction::two(name, a, b)),
        1 => (0..num_qubits, 0..CREGS)
            .prop_map(|(q, c)| Instruction::measure(QubitId(q), CregId(c))),
    ]
}

/// Fenced qubits; empty fences everything.
fn arb_fenced(num_qubits: u32) -> impl Strategy<Value = Vec<QubitId>> {
    prop::collection::btree_set(0..num_qubits, 0..=2).prop_map(|set| set.into_iter().map(QubitId).collect())
}

fn arb_instruction(num_qubits: u32) -> impl Strategy<Value = Instruction> {
    prop_oneof![
        8 => arb_gate(num_qubits),
        1 => (arb_gate(num_qubits), 0..CREGS)
            .prop_map(|(gate, c)| gate.with_condition(ClassicalCondition::Unary(CregId(c)))),
        1 => (arb_gate(num_qubits), 0..3_u64).prop_map(|(gate, cycles)| gate.with_duration(cycles)),
        1 => arb_fenced(num_qubits).prop_map(Instruction::barrier),
        1 => (arb_fenced(num_qubits), 0..3_u64).prop_map(|(qubits, cycles)| Instruction::wait(qubits, cycles)),
    ]
}

fn arb_kernel(num_qubits: u32) -> impl Strategy<Value = Kernel> {
    prop::collection::vec(arb_instruction(num_qubits), 0..=24)
        .prop_map(move |instructions| Kernel::from_instructions("k", num_qubits, CREGS, instructions))
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Asap), Just(Direction::Alap), Just(Direction::Uniform)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn schedules_respect_dependencies(
        kernel in arb_kernel(QUBITS),
        platform in arb_platform(),
        direction in arb_direction(),
        commute in any::<bool>(),
    ) {
        let config = SchedulerConfig { direction, commute, ..SchedulerConfig::default() };
        let schedule = ListScheduler::new(Arc::clone(&platform), config).schedule(&kernel).unwrap();
        prop_assert_eq!(schedule.len(), kernel.len());

        let start = schedule.start_cycles();
        let graph = DependencyGraph::build(&kernel, &platform, commute).unwrap();
        for (from, to, dep) in graph.edges() {
            prop_assert!(
                start[to] >= start[from] + dep.weight,
                "{} -> {} ({:?}) starts {} < {} + {}",
                from, to, dep.kind, start[to], start[from], dep.weight
            );
        }
    }

    #[test]
    fn schedules_never_overbook_resources(
        kernel in arb_kernel(QUBITS),
        platform in arb_platform(),
        direction in arb_direction(),
    ) {
        let config = SchedulerConfig { direction, ..SchedulerConfig::default() };
        let schedule = ListScheduler::new(Arc::clone(&platform), config).schedule(&kernel).unwrap();

        let mut model = ResourceModel::new(platform);
        for entry in schedule.iter() {
            let request = model.request(&entry.instruction, entry.duration).unwrap();
            prop_assert!(
                model.commit(entry.index, &request, entry.cycle).is_ok(),
                "{} at {} overbooks", entry.instruction, entry.cycle
            );
        }
    }

    #[test]
    fn uniform_keeps_asap_makespan(kernel in arb_kernel(QUBITS), platform in arb_unbuffered_platform()) {
        let asap = ListScheduler::new(Arc::clone(&platform), SchedulerConfig::default())
            .schedule(&kernel)
            .unwrap();
        let uniform = SchedulerConfig { direction: Direction::Uniform, ..SchedulerConfig::default() };
        let uniform = ListScheduler::new(platform, uniform).schedule(&kernel).unwrap();

        prop_assert_eq!(uniform.makespan(), asap.makespan());
    }

    #[test]
    fn alap_matches_asap_makespan_without_resources(kernel in arb_kernel(QUBITS)) {
        let platform = Arc::new(Platform::linear(QUBITS).unwrap());
        let unconstrained = |direction| SchedulerConfig {
            direction,
            resource_constrained: false,
            ..SchedulerConfig::default()
        };
        let asap = ListScheduler::new(Arc::clone(&platform), unconstrained(Direction::Asap))
            .schedule(&kernel)
            .unwrap();
        let alap = ListScheduler::new(platform, unconstrained(Direction::Alap)).schedule(&kernel).unwrap();

        prop_assert_eq!(alap.makespan(), asap.makespan());
    }

    #[test]
    fn routed_gates_are_adjacent(
        kernel in arb_kernel(6),
        kind in prop_oneof![
            Just(MapperKind::Base),
            Just(MapperKind::BaseRc),
            Just(MapperKind::MinExtend),
            Just(MapperKind::MinExtendRc),
        ],
        select_swaps in prop_oneof![Just(SelectSwaps::All), Just(SelectSwaps::One), Just(SelectSwaps::Earliest)],
    ) {
        let platform = Arc::new(Platform::grid(3, 3).unwrap());
        let config = MapperConfig { kind, select_swaps, ..MapperConfig::default() };
        let mapped = Mapper::new(Arc::clone(&platform), config).map(&kernel).unwrap();

        prop_assert!(mapped.initial.is_bijective());
        prop_assert!(mapped.final_layout.is_bijective());
        for instruction in mapped.kernel.instructions().iter().filter(|i| i.is_two_qubit()) {
            if let [a, b] = instruction.qubits() {
                prop_assert!(platform.is_adjacent(a.0, b.0), "{} not adjacent", instruction);
            }
        }

        let gates = mapped.kernel.len() - mapped.swaps - mapped.moves;
        prop_assert_eq!(gates, kernel.len());
    }

    #[test]
    fn swaps_bounded_by_distance(kernel in arb_kernel(5)) {
        let platform = Arc::new(Platform::linear(5).unwrap());
        let mapped = Mapper::new(Arc::clone(&platform), MapperConfig::default()).map(&kernel).unwrap();

        let two_qubit = kernel.instructions().iter().filter(|i| i.is_two_qubit()).count();
        let per_gate = (platform.diameter() - 1) as usize;
        prop_assert!(mapped.swaps <= two_qubit * per_gate);
    }

    #[test]
    fn mapping_is_deterministic(kernel in arb_kernel(6)) {
        let platform = Arc::new(Platform::grid(3, 2).unwrap());
        let first = Mapper::new(Arc::clone(&platform), MapperConfig::default()).map(&kernel).unwrap();
        let second = Mapper::new(platform, MapperConfig::default()).map(&kernel).unwrap();
        prop_assert_eq!(first, second);
    }
}
