//! Test bench for multiplier circuits.

use std::{path::PathBuf, process::ExitCode};

use encrypted_circuit_evaluator::{
    analyze_bristol,
    bench::{
        self, BenchArgs,
        arith::{ArithOp, test_arith},
    },
    fhe::TfheOracle,
};

const CASES: [&str; 2] = ["mult_32x32", "multiplier_64bit"];

fn main() -> ExitCode {
    let args = BenchArgs::init();
    println!("Test bench for multipliers");

    let dir = PathBuf::from("circuits/old_bristol_ckts/arith");
    let mut all_passed = true;
    for case in CASES.iter().take(args.cases(CASES.len())) {
        let input = dir.join(format!("{case}.txt"));
        let output = dir.join(format!("{case}_FHE.out"));

        if args.analyze {
            println!("analyzing {}", input.display());
            if let Err(e) = analyze_bristol(&input, args.gen_fan, false) {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        }
        if let Err(e) = bench::ensure_file_exists(&output) {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }

        let oracle = TfheOracle::setup(args.set, args.method);
        match test_arith(&output, ArithOp::Mul, &args, oracle) {
            Ok(passed) => {
                println!("===========================");
                println!(
                    "{} {}",
                    output.display(),
                    if passed { "passes" } else { "fails" }
                );
                all_passed &= passed;
            }
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        }
    }
    println!("===========================");
    if all_passed {
        println!("All Multiplier cases passed");
        ExitCode::SUCCESS
    } else {
        println!("Some Multiplier cases failed");
        ExitCode::FAILURE
    }
}
