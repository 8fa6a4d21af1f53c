//! Test bench for the hand-written 8-bit parity generator/checker. No
//! analysis or assembly step: the circuit ships as an assembled program.

use std::{path::Path, process::ExitCode};

use encrypted_circuit_evaluator::{
    bench::{self, BenchArgs, parity},
    fhe::TfheOracle,
};

fn main() -> ExitCode {
    let args = BenchArgs::init();
    println!("Test bench for simple parity circuit");

    let path = Path::new("circuits/simple_ckts/parity/parity.out");
    if let Err(e) = bench::ensure_file_exists(path) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let oracle = TfheOracle::setup(args.set, args.method);
    match parity::test_parity(path, &args, oracle) {
        Ok(passed) => {
            println!("===========================");
            println!(
                "{} {}",
                path.display(),
                if passed { "passes" } else { "fails" }
            );
            if passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
