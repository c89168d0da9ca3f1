//! Property-based tests for kernel operand validation.

use proptest::prelude::*;
use tempo_ir::{Instruction, Kernel, QubitId};

/// Generate a raw instruction whose qubit operands may exceed `bound`.
fn arb_instruction(bound: u32) -> impl Strategy<Value = Instruction> {
    prop_oneof![
        (0..bound).prop_map(|q| Instruction::single("x", QubitId(q))),
        (0..bound, 0..bound).prop_map(|(a, b)| Instruction::two("cz", QubitId(a), QubitId(b))),
    ]
}

proptest! {
    #[test]
    fn validate_accepts_exactly_in_range_operands(
        num_qubits in 1_u32..=6,
        instructions in prop::collection::vec(arb_instruction(8), 0..=12),
    ) {
        let expected_ok = instructions.iter().all(|inst| {
            let qubits = inst.qubits();
            qubits.iter().all(|q| q.0 < num_qubits)
                && !(qubits.len() == 2 && qubits[0] == qubits[1])
        });

        let kernel = Kernel::from_instructions("k", num_qubits, 0, instructions.clone());
        prop_assert_eq!(kernel.validate().is_ok(), expected_ok);

        let mut built = Kernel::new("k", num_qubits, 0);
        let all_applied = instructions.into_iter().all(|inst| built.apply(inst).is_ok());
        prop_assert_eq!(all_applied, expected_ok);
    }
}
