//! Integration tests for kernels handed over by an external front end.

use tempo_ir::{CircuitLevel, ClassicalCondition, CregId, InstructionKind, Kernel, QubitId};

// ============================================================================
// Serialized kernel input
// ============================================================================

#[test]
fn test_kernel_from_json() {
    let json = r#"{
        "name": "feedback",
        "num_qubits": 3,
        "num_cregs": 1,
        "instructions": [
            { "name": "h", "kind": { "single_qubit": { "qubit": 0 } } },
            { "name": "cnot", "kind": { "two_qubit": { "qubits": [0, 2] } } },
            { "name": "measure", "kind": { "measure": { "qubit": 2, "creg": 0 } } },
            { "name": "x", "kind": { "single_qubit": { "qubit": 1 } },
              "condition": { "unary": 0 } },
            { "name": "barrier", "kind": { "wait": { "qubits": [], "cycles": 0 } } }
        ]
    }"#;

    let kernel: Kernel = serde_json::from_str(json).unwrap();

    assert_eq!(kernel.name(), "feedback");
    assert_eq!(kernel.level(), CircuitLevel::Logical);
    assert_eq!(kernel.len(), 5);
    assert!(kernel.validate().is_ok());

    let cnot = &kernel.instructions()[1];
    assert_eq!(
        cnot.kind,
        InstructionKind::TwoQubit {
            qubits: [QubitId(0), QubitId(2)]
        }
    );
    assert_eq!(
        kernel.instructions()[3].condition,
        Some(ClassicalCondition::Unary(CregId(0)))
    );
    assert!(kernel.instructions()[4].is_global_fence());
}

#[test]
fn test_json_kernel_with_bad_operand_fails_validation() {
    let json = r#"{
        "name": "bad",
        "num_qubits": 2,
        "instructions": [
            { "name": "cz", "kind": { "two_qubit": { "qubits": [0, 7] } } }
        ]
    }"#;

    let kernel: Kernel = serde_json::from_str(json).unwrap();
    assert!(kernel.validate().is_err());
}

// ============================================================================
// Remapping preserves everything but qubit operands
// ============================================================================

#[test]
fn test_remapped_kernel_is_physical() {
    let mut kernel = Kernel::new("k", 2, 1);
    kernel.cnot(QubitId(0), QubitId(1)).unwrap();
    kernel.measure(QubitId(1), CregId(0)).unwrap();

    let remapped: Vec<_> = kernel
        .instructions()
        .iter()
        .map(|inst| inst.try_remap::<()>(|q| Ok(QubitId(4 - q.0))).unwrap())
        .collect();
    let physical = Kernel::from_instructions("k", 5, 1, remapped).with_level(CircuitLevel::Physical);

    assert_eq!(physical.level(), CircuitLevel::Physical);
    assert_eq!(physical.instructions()[0].qubits(), &[QubitId(4), QubitId(3)]);
    assert_eq!(physical.instructions()[1].written_cregs(), &[CregId(0)]);
    assert!(physical.validate().is_ok());
}
