//! Test bench for the crypto hash circuits with trusted known-answer
//! vectors: MD5 and SHA-256.

use std::{path::PathBuf, process::ExitCode};

use encrypted_circuit_evaluator::{
    analyze_bristol,
    bench::{
        self, BenchArgs,
        crypto::{Digest, test_crypto},
    },
    fhe::TfheOracle,
};

const CASES: [(&str, Digest); 2] = [("md5", Digest::Md5), ("sha-256", Digest::Sha256)];

fn main() -> ExitCode {
    let args = BenchArgs::init();
    println!("Test bench for cryptos");

    let dir = PathBuf::from("circuits/old_bristol_ckts/crypto");
    let mut all_passed = true;
    for (case, digest) in CASES.iter().take(args.cases(CASES.len())) {
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
        match test_crypto(&output, *digest, &args, oracle) {
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
        println!("All Crypto cases passed");
        ExitCode::SUCCESS
    } else {
        println!("Some Crypto cases failed");
        ExitCode::FAILURE
    }
}
