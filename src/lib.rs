//! Homomorphic evaluation of boolean circuits.
//!
//! Every wire carries a single-bit ciphertext and every gate is one call
//! into a binary-FHE oracle. The input is an assembled program of
//! `LOAD`/`STORE`/`NOT`/`AND`/`OR`/`XOR` register statements; evaluation is
//! driven by a wire-centric scheduler that releases ready gates in batches
//! to a parallel executor, since each gate call costs tens to hundreds of
//! milliseconds. A Bristol-circuit analyzer produces the statistics the
//! (external) assembler needs to emit those programs.

pub mod analyze;
pub mod bench;
pub mod circuit;
pub mod fhe;
pub mod utils;

pub use analyze::{Analysis, AnalyzeError, BristolOp, analyze_bristol};
pub use circuit::{
    Circuit, CircuitError, Inputs, Outputs,
    gate::{GateCounts, GateOp},
    loader::{ProgramStats, read_program_stats},
    wire::{GateId, WireId},
};
pub use fhe::{BinFheOracle, BinGate, FheError, Method, MockOracle, ParamSet, TfheOracle};
