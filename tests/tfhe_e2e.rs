// Real-crypto smoke test. Key generation plus per-gate bootstrapping make
// this slow, so it is opt-in: `cargo test -- --ignored`.

use encrypted_circuit_evaluator::{
    Circuit,
    fhe::{Method, ParamSet, TfheOracle},
};
use serial_test::serial;

const FULL_ADDER: &str = "testdata/full_adder.out";

#[test]
#[serial]
#[ignore]
fn full_adder_over_tfhe() {
    let oracle = TfheOracle::setup(ParamSet::Toy, Method::Ginx);
    let mut circ = Circuit::load(FULL_ADDER, oracle).unwrap();
    for (a, b, cin) in [(true, false, false), (true, true, true)] {
        circ.reset();
        circ.set_verify(true);
        circ.set_input(&vec![vec![a, b], vec![cin]]).unwrap();
        let out = circ.clock().unwrap();
        let total = a as u32 + b as u32 + cin as u32;
        assert_eq!(out[0], vec![total & 1 == 1, total >= 2]);
    }
}
