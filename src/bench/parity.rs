//! Parity generator/checker bench.
//!
//! The circuit XORs 8 data bits with a cascade bit, driving Out0 with the
//! check bit and Out1 with its complement. Each loop runs random data with
//! the cascade bit clear, then feeds the complement back as the cascade
//! bit, after which the check bit must read 1. Cascading this way is how
//! wider words get parity-protected.

use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::info;

use super::{BenchArgs, BenchError, Summary, run_case};
use crate::{
    circuit::{Circuit, loader},
    fhe::BinFheOracle,
};

pub fn test_parity<O: BinFheOracle>(
    path: &Path,
    args: &BenchArgs,
    oracle: O,
) -> Result<bool, BenchError> {
    info!("test_parity: opening {} for parameters", path.display());
    let stats = loader::read_program_stats(path)?;
    let n_in = stats.in1_bits;
    let n_out = stats.out1_bits;
    println!("using {n_in} bits for input 1");
    println!("using {n_out} bits for output 1");

    let mut circ = Circuit::load(path, oracle)?;
    circ.set_repair(args.repair);
    circ.set_lower_xor(!args.no_lower_xor);

    let mut summary = Summary::default();
    let mut passed = true;
    println!("testing {} iterations", args.num_test_loops);
    for test_ix in 0..args.num_test_loops {
        println!("test {test_ix}");
        let mut rng = ChaCha20Rng::seed_from_u64(test_ix as u64);
        // last bit is the cascade input, clear on the first pass
        let mut data: Vec<bool> = (0..n_in).map(|ix| ix != n_in - 1 && rng.random()).collect();
        // the circuit drives Out0 with the XOR over all inputs and Out1
        // with its complement
        let check = data.iter().filter(|b| **b).count() % 2 == 1;

        let mut expected = vec![false; n_out];
        expected[0] = check;
        expected[1] = !check;
        passed &= run_case(&mut circ, &vec![data.clone()], &expected, &mut summary)?;
        if test_ix == 0 {
            circ.dump_gate_counts();
        }

        // cascade the complement back in; the checker must now flag odd
        // parity over data plus parity bit
        data[n_in - 1] = !check;
        let mut expected = vec![false; n_out];
        expected[0] = true;
        passed &= run_case(&mut circ, &vec![data], &expected, &mut summary)?;

        summary.tests += 1;
    }
    summary.report();
    println!("note the passed counts above max at 2x # tests");
    Ok(passed)
}
