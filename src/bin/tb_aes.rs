//! Test bench for the AES circuits (expanded and non-expanded key
//! schedule). The available reference vectors are unvalidated, so only
//! plaintext/encrypted agreement is asserted.

use std::{path::PathBuf, process::ExitCode};

use encrypted_circuit_evaluator::{
    analyze_bristol,
    bench::{self, BenchArgs, aes::test_aes},
    fhe::TfheOracle,
};

const CASES: [(&str, bool); 2] = [("AES-expanded", true), ("AES-non-expanded", false)];

fn main() -> ExitCode {
    let args = BenchArgs::init();
    println!("Test bench for AES");

    let dir = PathBuf::from("circuits/old_bristol_ckts/crypto");
    let mut all_passed = true;
    for (case, expanded) in CASES.iter().take(args.cases(CASES.len())) {
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
        match test_aes(&output, *expanded, &args, oracle) {
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
        println!("All AES cases passed");
        ExitCode::SUCCESS
    } else {
        println!("Some AES cases failed");
        ExitCode::FAILURE
    }
}
