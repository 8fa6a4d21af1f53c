//! Binary-FHE oracle seam.
//!
//! The evaluator treats the cryptography as an opaque oracle with a small
//! surface: context setup, key generation, bit encryption/decryption, a
//! two-input gate evaluation and NOT. [`TfheOracle`] is the production
//! implementation on `tfhe::boolean`; [`MockOracle`] is a deterministic
//! stand-in used by the test suite.

mod mock;
mod tfhe_backend;

pub use mock::{MockCiphertext, MockOracle};
pub use tfhe_backend::TfheOracle;

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The gate evaluation exhausted its noise budget. Callers may
    /// re-encrypt the operands and retry once.
    #[error("noise failure evaluating {op} gate")]
    NoiseFailure { op: BinGate },
}
pub type FheError = Error;

/// Security parameter preset selected at context setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ParamSet {
    /// Reduced parameters for fast experiments. Not secure.
    #[value(name = "TOY")]
    Toy,
    /// 128-bit security, optimized variant.
    #[value(name = "STD128_OPT")]
    Std128Opt,
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSet::Toy => write!(f, "TOY"),
            ParamSet::Std128Opt => write!(f, "STD128_OPT"),
        }
    }
}

/// Bootstrapping method tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Method {
    #[value(name = "AP")]
    Ap,
    #[value(name = "GINX")]
    Ginx,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Ap => write!(f, "AP"),
            Method::Ginx => write!(f, "GINX"),
        }
    }
}

/// Two-input gate selector for [`BinFheOracle::eval_bin`].
///
/// `Xor` is only requested when XOR lowering is disabled; the default
/// evaluation path rewrites XOR into AND/OR/NOT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinGate {
    And,
    Or,
    Xor,
}

impl fmt::Display for BinGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinGate::And => write!(f, "AND"),
            BinGate::Or => write!(f, "OR"),
            BinGate::Xor => write!(f, "XOR"),
        }
    }
}

/// A binary-FHE context together with its secret key.
///
/// Implementations must be safe for concurrent use: the executor calls
/// `eval_bin`/`eval_not` (and, in verify mode, `encrypt`/`decrypt`) from one
/// worker per gate in a batch.
pub trait BinFheOracle: Sync {
    type Ciphertext: Clone + Send;

    fn encrypt(&self, bit: bool) -> Self::Ciphertext;

    fn decrypt(&self, ct: &Self::Ciphertext) -> bool;

    /// Evaluate a two-input gate. May fail with a noise accident.
    fn eval_bin(
        &self,
        op: BinGate,
        a: &Self::Ciphertext,
        b: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext, FheError>;

    fn eval_not(&self, ct: &Self::Ciphertext) -> Self::Ciphertext;
}
