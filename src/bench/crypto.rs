//! MD5 and SHA-256 circuit benches.
//!
//! These are the two crypto circuits with trusted known-answer vectors.
//! The published vectors are bit-reversed relative to the circuit wire
//! numbering, so both input and output are reversed before use.

use std::path::Path;

use tracing::info;

use super::{BenchArgs, BenchError, Summary, run_case};
use crate::{
    circuit::{Circuit, loader},
    fhe::BinFheOracle,
    utils::hex_to_bits,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Digest {
    Md5,
    Sha256,
}

// 512-bit single-block messages and their digests
const MD5_VECTORS: [(&str, &str); 4] = [
    (
        "00000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000",
        "ac1d1f03d08ea56eb767ab1f91773174",
    ),
    (
        "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f202122232425262728292a2b2c2d2e2f303132333435363738393a3b3c3d3e3f",
        "cad94491c9e401d9385bfc721ef55f62",
    ),
    (
        "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        "b487195651913e494b55c6bddf405c01",
    ),
    (
        "243f6a8885a308d313198a2e03707344a4093822299f31d0082efa98ec4e6c89452821e638d01377be5466cf34e90c6cc0ac29b7c97c50dd3f84d5b5b5470917",
        "3715f568f422db75cc8d65e11764ff01",
    ),
];

const SHA256_VECTORS: [(&str, &str); 4] = [
    (
        "00000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000",
        "da5698be17b9b46962335799779fbeca8ce5d491c0d26243bafef9ea1837a9d8",
    ),
    (
        "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f202122232425262728292a2b2c2d2e2f303132333435363738393a3b3c3d3e3f",
        "fc99a2df88f42a7a7bb9d18033cdc6a20256755f9d5b9a5044a9cc315abe84a7",
    ),
    (
        "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        "ef0c748df4da50a8d6c43c013edc3ce76c9d9fa9a1458ade56eb86c0a64492d2",
    ),
    (
        "243f6a8885a308d313198a2e03707344a4093822299f31d0082efa98ec4e6c89452821e638d01377be5466cf34e90c6cc0ac29b7c97c50dd3f84d5b5b5470917",
        "cf0ae4eb67d38ffeb94068984b22abde4e92bc548d14585e48dca8882d7b09ce",
    ),
];

pub fn test_crypto<O: BinFheOracle>(
    path: &Path,
    digest: Digest,
    args: &BenchArgs,
    oracle: O,
) -> Result<bool, BenchError> {
    info!("test_crypto: opening {} for parameters", path.display());
    let stats = loader::read_program_stats(path)?;
    println!("using {} registers", stats.n_registers);
    println!("using {} bits for input 1", stats.in1_bits);
    println!("using {} bits for output 1", stats.out1_bits);

    let mut circ = Circuit::load(path, oracle)?;
    circ.set_repair(args.repair);
    circ.set_lower_xor(!args.no_lower_xor);

    let (which, vectors) = match digest {
        Digest::Md5 => ("md5", &MD5_VECTORS),
        Digest::Sha256 => ("sha-256", &SHA256_VECTORS),
    };

    let mut summary = Summary::default();
    let mut passed = true;
    for test_ix in 0..args.num_test_loops {
        println!("test {test_ix}: {which}");
        for (sub_ix, (inhex, outhex)) in vectors.iter().enumerate() {
            println!("subtest {sub_ix}");
            let mut in_bits = hex_to_bits(inhex)?;
            if in_bits.len() != stats.in1_bits {
                return Err(BenchError::BadVector {
                    which,
                    reason: format!(
                        "input length {} does not match circuit input {}",
                        in_bits.len(),
                        stats.in1_bits
                    ),
                });
            }
            let mut out_bits = hex_to_bits(outhex)?;
            if out_bits.len() != stats.out1_bits {
                return Err(BenchError::BadVector {
                    which,
                    reason: format!(
                        "output length {} does not match circuit output {}",
                        out_bits.len(),
                        stats.out1_bits
                    ),
                });
            }
            // published vectors are bit-reversed relative to the wiring
            in_bits.reverse();
            out_bits.reverse();

            passed &= run_case(&mut circ, &vec![in_bits], &out_bits, &mut summary)?;
            if test_ix == 0 && sub_ix == 0 {
                circ.dump_gate_counts();
            }
        }
        summary.tests += 1;
    }
    summary.report();
    Ok(passed)
}
