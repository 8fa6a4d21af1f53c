// Full-adder and malformed-circuit flows over assembled fixtures.

use encrypted_circuit_evaluator::{Circuit, CircuitError, MockOracle};

const FULL_ADDER: &str = "testdata/full_adder.out";
const CYCLIC: &str = "testdata/cyclic.out";

fn run(circ: &mut Circuit<MockOracle>, a: bool, b: bool, cin: bool) -> Vec<bool> {
    circ.reset();
    circ.set_verify(true);
    circ.set_input(&vec![vec![a, b], vec![cin]]).unwrap();
    circ.clock().unwrap()[0].clone()
}

#[test]
fn full_adder_exhaustive() {
    let mut circ = Circuit::load(FULL_ADDER, MockOracle::new()).unwrap();
    for n in 0..8u32 {
        let (a, b, cin) = (n & 1 == 1, n & 2 == 2, n & 4 == 4);
        let total = a as u32 + b as u32 + cin as u32;
        let out = run(&mut circ, a, b, cin);
        assert_eq!(out, vec![total & 1 == 1, total >= 2], "a={a} b={b} cin={cin}");
    }
}

#[test]
fn queues_conserve_and_drain() {
    let mut circ = Circuit::load(FULL_ADDER, MockOracle::new()).unwrap();
    run(&mut circ, true, false, true);
    assert!(circ.is_done());
    assert_eq!(
        circ.done_gate_count(),
        circ.input_gate_count() + circ.gate_count()
    );
    assert_eq!(circ.active_wire_count(), 0);
    assert_eq!(circ.waiting_wire_count(), 0);
}

#[test]
fn repeated_runs_are_identical() {
    let mut circ = Circuit::load(FULL_ADDER, MockOracle::new()).unwrap();
    let first = run(&mut circ, true, true, false);
    let second = run(&mut circ, true, true, false);
    assert_eq!(first, second);
}

#[test]
fn gate_counts_after_run() {
    let mut circ = Circuit::load(FULL_ADDER, MockOracle::new()).unwrap();
    run(&mut circ, false, true, true);
    let counts = circ.gate_counts();
    assert_eq!(counts.input, 3);
    assert_eq!(counts.xor, 2);
    assert_eq!(counts.and, 2);
    assert_eq!(counts.or, 1);
    assert_eq!(counts.output, 2);
    assert_eq!(counts.total(), 10);
}

#[test]
fn cyclic_circuit_reports_stall() {
    let mut circ = Circuit::load(CYCLIC, MockOracle::new()).unwrap();
    circ.reset();
    circ.set_plaintext(true);
    circ.set_input(&vec![vec![true]]).unwrap();
    match circ.clock() {
        Err(CircuitError::Stalled { remaining }) => assert_eq!(remaining, 3),
        other => panic!("expected stall, got {other:?}"),
    }
}

#[test]
fn missing_file_is_a_load_error() {
    let err = Circuit::load("testdata/no_such_circuit.out", MockOracle::new());
    assert!(matches!(err, Err(CircuitError::Load(_))));
}
