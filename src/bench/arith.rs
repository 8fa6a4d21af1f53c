//! Arithmetic circuit benches: adders, multipliers and comparators share
//! one driver parameterized by the reference operation.

use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::info;

use super::{BenchArgs, BenchError, Summary, run_case};
use crate::{
    circuit::{Circuit, loader},
    fhe::BinFheOracle,
    utils::{bits_to_u128, u128_to_bits},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Mul,
    Less,
    LessEq,
    SignedLess,
    SignedLessEq,
}

impl ArithOp {
    fn reference(self, a: u128, b: u128, width: usize) -> u128 {
        match self {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Less => (a < b) as u128,
            ArithOp::LessEq => (a <= b) as u128,
            ArithOp::SignedLess => (sign_extend(a, width) < sign_extend(b, width)) as u128,
            ArithOp::SignedLessEq => (sign_extend(a, width) <= sign_extend(b, width)) as u128,
        }
    }

    fn is_compare(self) -> bool {
        !matches!(self, ArithOp::Add | ArithOp::Mul)
    }

    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Mul => "*",
            ArithOp::Less | ArithOp::SignedLess => "<",
            ArithOp::LessEq | ArithOp::SignedLessEq => "<=",
        }
    }
}

fn sign_extend(v: u128, width: usize) -> i128 {
    if width > 0 && width < 128 && (v >> (width - 1)) & 1 == 1 {
        v as i128 - (1i128 << width)
    } else {
        v as i128
    }
}

pub fn test_arith<O: BinFheOracle>(
    path: &Path,
    op: ArithOp,
    args: &BenchArgs,
    oracle: O,
) -> Result<bool, BenchError> {
    info!("opening {} for parameters", path.display());
    let stats = loader::read_program_stats(path)?;
    println!("using {} registers", stats.n_registers);
    println!("using {} bits for input 1", stats.in1_bits);
    println!("using {} bits for input 2", stats.in2_bits);
    println!("using {} bits for output 1", stats.out1_bits);
    if op == ArithOp::Mul && stats.in1_bits != stats.in2_bits {
        return Err(BenchError::InputWidthMismatch);
    }

    let mut circ = Circuit::load(path, oracle)?;
    circ.set_repair(args.repair);
    circ.set_lower_xor(!args.no_lower_xor);

    let mut summary = Summary::default();
    let mut passed = true;
    println!("testing {} iterations", args.num_test_loops);
    for test_ix in 0..args.num_test_loops {
        let mut rng = ChaCha20Rng::seed_from_u64(test_ix as u64);
        let in1: Vec<bool> = (0..stats.in1_bits).map(|_| rng.random()).collect();
        let mut in2: Vec<bool> = (0..stats.in2_bits).map(|_| rng.random()).collect();
        if op.is_compare() && test_ix == 0 {
            // equality is the interesting boundary for comparators
            in2 = in1.clone();
        }
        let a = bits_to_u128(&in1);
        let b = bits_to_u128(&in2);
        let c = op.reference(a, b, stats.in1_bits);
        println!("test {test_ix}: {a} {} {b} = {c}", op.symbol());
        let expected = u128_to_bits(c, stats.out1_bits);

        passed &= run_case(&mut circ, &vec![in1, in2], &expected, &mut summary)?;
        if test_ix == 0 {
            circ.dump_gate_counts();
        }
        summary.tests += 1;
    }
    summary.report();
    Ok(passed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references() {
        assert_eq!(ArithOp::Add.reference(3, 5, 32), 8);
        assert_eq!(ArithOp::Mul.reference(3, 5, 32), 15);
        assert_eq!(
            ArithOp::Mul.reference(0xFFFF_FFFF, 0xFFFF_FFFF, 32),
            0xFFFF_FFFE_0000_0001
        );
        assert_eq!(ArithOp::Less.reference(4, 4, 32), 0);
        assert_eq!(ArithOp::LessEq.reference(4, 4, 32), 1);
    }

    #[test]
    fn signed_compare_sign_extends_at_width() {
        // 0xFFFFFFFF is -1 as a signed 32-bit value
        assert_eq!(ArithOp::Less.reference(0xFFFF_FFFF, 1, 32), 0);
        assert_eq!(ArithOp::SignedLess.reference(0xFFFF_FFFF, 1, 32), 1);
        assert_eq!(
            ArithOp::SignedLessEq.reference(0xFFFF_FFFF, 0xFFFF_FFFF, 32),
            1
        );
        assert_eq!(sign_extend(0x8000_0000, 32), i32::MIN as i128);
        assert_eq!(sign_extend(0x7FFF_FFFF, 32), i32::MAX as i128);
    }
}
