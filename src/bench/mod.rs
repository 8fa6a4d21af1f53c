//! Shared test-bench plumbing: the command-line surface, the
//! plaintext/encrypted case runner and the pass/fail summary.

pub mod aes;
pub mod arith;
pub mod crypto;
pub mod parity;

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    analyze::AnalyzeError,
    circuit::{Circuit, CircuitError, Inputs, loader::LoadError},
    fhe::{BinFheOracle, Method, ParamSet},
    utils::{self, UtilError},
};

/// Command-line options shared by every test bench.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct BenchArgs {
    /// Assemble the analyzed circuit (requires -z). The assembler is not
    /// bundled; the flag is accepted for compatibility only.
    #[arg(short = 'a')]
    pub assemble: bool,
    /// Analyze the Bristol circuit before running.
    #[arg(short = 'z')]
    pub analyze: bool,
    /// Generate fan-in/fan-out statistics during analysis.
    #[arg(short = 'f')]
    pub gen_fan: bool,
    /// Number of circuit cases to run (bench-specific default).
    #[arg(short = 'c')]
    pub n_cases: Option<usize>,
    /// Number of test loops per case.
    #[arg(short = 'n', default_value_t = 10)]
    pub num_test_loops: usize,
    /// Security parameter set.
    #[arg(short = 's', value_enum, default_value_t = ParamSet::Std128Opt)]
    pub set: ParamSet,
    /// Bootstrapping method.
    #[arg(short = 'm', value_enum, default_value_t = Method::Ginx)]
    pub method: Method,
    /// Verbose output.
    #[arg(short = 'v')]
    pub verbose: bool,
    /// Repair mismatched ciphertexts in verify mode instead of failing.
    #[arg(long)]
    pub repair: bool,
    /// Evaluate XOR directly instead of lowering it to AND/OR/NOT.
    #[arg(long)]
    pub no_lower_xor: bool,
}

impl BenchArgs {
    /// Parse argv, install the tracing subscriber and normalize the flags.
    pub fn init() -> Self {
        let mut args = Self::parse();
        let default = if args.verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        tracing_subscriber::fmt().with_env_filter(filter).init();
        if args.assemble && !args.analyze {
            warn!("assemble requires analyze; ignoring -a");
            args.assemble = false;
        }
        if args.assemble {
            info!("assembly is produced by the external assembler; -a has no effect here");
        }
        args
    }

    pub fn cases(&self, default: usize) -> usize {
        self.n_cases.unwrap_or(default).max(1)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error(
        "[ERROR] The file {path} doesn't exist, and is required!\n\t*** To correct this use the \"-z\" parameter ***"
    )]
    MissingInputFile { path: PathBuf },
    #[error("bad {which} test vector: {reason}")]
    BadVector { which: &'static str, reason: String },
    #[error("two inputs are not the same length")]
    InputWidthMismatch,
    #[error(transparent)]
    Circuit(#[from] CircuitError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),
    #[error(transparent)]
    Util(#[from] UtilError),
}

/// Abort with the run-with-`-z` hint if the assembled file is absent.
pub fn ensure_file_exists(path: &Path) -> Result<(), BenchError> {
    if path.exists() {
        Ok(())
    } else {
        Err(BenchError::MissingInputFile {
            path: path.to_owned(),
        })
    }
}

/// Pass tally across one bench run. `tests` counts loops; each loop may run
/// several plaintext/encrypted case pairs.
#[derive(Debug, Default, Clone, Copy)]
pub struct Summary {
    pub tests: usize,
    pub passed_plain: usize,
    pub passed_encrypted: usize,
}

impl Summary {
    pub fn report(&self) {
        println!("# tests total: {}", self.tests);
        println!("# passed plaintext: {}", self.passed_plain);
        println!("# passed encrypted: {}", self.passed_encrypted);
    }
}

/// Run `inputs` through the circuit twice — plaintext only, then encrypted
/// with the cross-check on — and compare the output bus against `expected`
/// both times.
pub fn run_case<O: BinFheOracle>(
    circ: &mut Circuit<O>,
    inputs: &Inputs,
    expected: &[bool],
    summary: &mut Summary,
) -> Result<bool, BenchError> {
    circ.reset();
    circ.set_plaintext(true);
    circ.set_encrypted(false);
    circ.set_input(inputs)?;
    let outputs = circ.clock()?;
    let plain_ok = outputs[0] == expected;
    if plain_ok {
        summary.passed_plain += 1;
    } else {
        println!("plain computed out: {}", utils::bits_to_string(&outputs[0]));
        println!("output does not match");
    }

    circ.reset();
    circ.set_verify(true);
    circ.set_input(inputs)?;
    let outputs = circ.clock()?;
    let enc_ok = outputs[0] == expected;
    if enc_ok {
        summary.passed_encrypted += 1;
    } else {
        println!("enc computed out: {}", utils::bits_to_string(&outputs[0]));
        println!("output does not match");
    }
    Ok(plain_ok && enc_ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_assembled_file_carries_the_analyze_hint() {
        let err = ensure_file_exists(Path::new("circuits/nope/missing.out")).unwrap_err();
        assert!(matches!(err, BenchError::MissingInputFile { .. }));
        assert!(err.to_string().contains("-z"));
    }

    #[test]
    fn existing_file_passes_the_check() {
        assert!(ensure_file_exists(Path::new("testdata/parity.out")).is_ok());
    }
}
