//! AES circuit bench.
//!
//! The available plaintext/ciphertext pairs for these circuit files were
//! never validated against a trusted implementation, so a difference from
//! the reference output is reported but does not fail the bench. What is
//! asserted is plaintext/encrypted agreement: both evaluation modes must
//! produce the same bits. Unlike the hash circuits, AES vectors are NOT
//! bit-reversed.

use std::path::Path;

use tracing::{info, warn};

use super::{BenchArgs, BenchError, Summary};
use crate::{
    circuit::{Circuit, loader},
    fhe::BinFheOracle,
    utils::{bin_to_bits, bits_to_string, hex_to_bits},
};

struct AesVector {
    inhex1: &'static str,
    inhex2: String,
    outbin: &'static str,
}

fn vectors(expanded: bool) -> Vec<AesVector> {
    if expanded {
        // 128-bit key, 1408-bit expanded schedule
        vec![
            AesVector {
                inhex1: "00000000000000000000000000000000",
                inhex2: "0".repeat(352),
                outbin: "01101100011011000110110001101100011011000110110001101100011011000110110001101100011011000110110001101100011011000110110001101100",
            },
            AesVector {
                inhex1: "ffffffffffffffffffffffffffffffff",
                inhex2: "f".repeat(352),
                outbin: "00110010001100100011001000110010001100100011001000110010001100100011001000110010001100100011001000110010001100100011001000110010",
            },
        ]
    } else {
        vec![
            AesVector {
                inhex1: "00000000000000000000000000000000",
                inhex2: "0".repeat(32),
                outbin: "01110100110101000010110001010011100110100101111100110010000100011101110000110100010100011111011100101011110100101001011101100110",
            },
            AesVector {
                inhex1: "ffffffffffffffffffffffffffffffff",
                inhex2: "f".repeat(32),
                outbin: "10011110100111010101110010011000010010100000111010001010010011010000110011110011000000010100110100111110100001001111110100111101",
            },
        ]
    }
}

pub fn test_aes<O: BinFheOracle>(
    path: &Path,
    expanded: bool,
    args: &BenchArgs,
    oracle: O,
) -> Result<bool, BenchError> {
    info!("test_aes: opening {} for parameters", path.display());
    let stats = loader::read_program_stats(path)?;
    println!("using {} registers", stats.n_registers);
    println!("using {} bits for input 1", stats.in1_bits);
    println!("using {} bits for input 2", stats.in2_bits);
    println!("using {} bits for output 1", stats.out1_bits);

    let mut circ = Circuit::load(path, oracle)?;
    circ.set_repair(args.repair);
    circ.set_lower_xor(!args.no_lower_xor);

    let mut summary = Summary::default();
    let mut passed = true;
    for test_ix in 0..args.num_test_loops {
        println!("test {test_ix}");
        for (sub_ix, vector) in vectors(expanded).iter().enumerate() {
            println!("subtest {sub_ix}");
            let in1 = hex_to_bits(vector.inhex1)?;
            let in2 = hex_to_bits(&vector.inhex2)?;
            if in1.len() != stats.in1_bits || in2.len() != stats.in2_bits {
                return Err(BenchError::BadVector {
                    which: "aes",
                    reason: format!(
                        "input lengths {}/{} do not match circuit inputs {}/{}",
                        in1.len(),
                        in2.len(),
                        stats.in1_bits,
                        stats.in2_bits
                    ),
                });
            }
            let reference = bin_to_bits(vector.outbin)?;
            let inputs = vec![in1, in2];

            circ.reset();
            circ.set_plaintext(true);
            circ.set_encrypted(false);
            circ.set_input(&inputs)?;
            let plain_out = circ.clock()?;
            if test_ix == 0 && sub_ix == 0 {
                circ.dump_gate_counts();
            }
            summary.passed_plain += 1;

            circ.reset();
            circ.set_verify(true);
            circ.set_input(&inputs)?;
            let enc_out = circ.clock()?;

            // the hard assertion: both modes agree
            if plain_out != enc_out {
                println!("plain out: {}", bits_to_string(&plain_out[0]));
                println!("enc out:   {}", bits_to_string(&enc_out[0]));
                println!("plaintext and encrypted outputs disagree");
                passed = false;
            } else {
                summary.passed_encrypted += 1;
            }

            // the reference pairs are not validated; report only
            if plain_out[0] != reference {
                warn!("output differs from the unvalidated reference vector");
                println!("circuit output: {}", bits_to_string(&plain_out[0]));
                println!("reference:      {}", bits_to_string(&reference));
            } else {
                println!("output matches unvalidated reference");
            }
        }
        summary.tests += 1;
    }
    summary.report();
    Ok(passed)
}
