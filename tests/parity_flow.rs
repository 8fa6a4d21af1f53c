// End-to-end parity runs over the assembled parity circuit, mock oracle.

use std::path::Path;

use encrypted_circuit_evaluator::{
    Circuit, MockOracle,
    bench::{BenchArgs, parity::test_parity},
    fhe::{Method, ParamSet},
    read_program_stats,
};

const PARITY: &str = "testdata/parity.out";

fn bits9(data: u16, parity_bit: bool) -> Vec<bool> {
    let mut v: Vec<bool> = (0..8).map(|ix| (data >> ix) & 1 == 1).collect();
    v.push(parity_bit);
    v
}

fn mock_args(num_test_loops: usize) -> BenchArgs {
    BenchArgs {
        assemble: false,
        analyze: false,
        gen_fan: false,
        n_cases: None,
        num_test_loops,
        set: ParamSet::Toy,
        method: Method::Ginx,
        verbose: false,
        repair: false,
        no_lower_xor: false,
    }
}

#[test]
fn stats_header_reports_io_widths() {
    let stats = read_program_stats(Path::new(PARITY)).unwrap();
    assert_eq!(stats.n_registers, 18);
    assert_eq!(stats.in1_bits, 9);
    assert_eq!(stats.in2_bits, 0);
    assert_eq!(stats.out1_bits, 2);
}

#[test]
fn parity_generation() {
    // 0b10110100 has an even number of ones and the parity bit is clear
    let mut circ = Circuit::load(PARITY, MockOracle::new()).unwrap();
    circ.reset();
    circ.set_verify(true);
    circ.set_input(&vec![bits9(0b1011_0100, false)]).unwrap();
    let out = circ.clock().unwrap();
    assert_eq!(out[0], vec![false, true]);
}

#[test]
fn parity_cascade_detects_odd_total() {
    // feeding the generated parity bit back makes the total odd
    let mut circ = Circuit::load(PARITY, MockOracle::new()).unwrap();
    circ.reset();
    circ.set_verify(true);
    circ.set_input(&vec![bits9(0b1011_0100, true)]).unwrap();
    let out = circ.clock().unwrap();
    assert_eq!(out[0], vec![true, false]);
}

#[test]
fn bench_driver_passes_with_mock_oracle() {
    let passed = test_parity(Path::new(PARITY), &mock_args(3), MockOracle::new()).unwrap();
    assert!(passed);
}

#[test]
fn plaintext_only_run_matches_encrypted_run() {
    let mut circ = Circuit::load(PARITY, MockOracle::new()).unwrap();
    for data in [0u16, 1, 0b1111_1111, 0b0101_0101, 0b1000_0001] {
        let inputs = vec![bits9(data, false)];

        circ.reset();
        circ.set_plaintext(true);
        circ.set_encrypted(false);
        circ.set_input(&inputs).unwrap();
        let plain = circ.clock().unwrap();

        circ.reset();
        circ.set_plaintext(false);
        circ.set_encrypted(true);
        circ.set_input(&inputs).unwrap();
        let enc = circ.clock().unwrap();

        assert_eq!(plain, enc, "data={data:#010b}");
    }
}
