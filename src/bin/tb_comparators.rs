//! Test bench for comparator circuits. A file name containing `lteq`
//! selects the less-or-equal reference, anything else plain less-than.

use std::{path::PathBuf, process::ExitCode};

use encrypted_circuit_evaluator::{
    analyze_bristol,
    bench::{
        self, BenchArgs,
        arith::{ArithOp, test_arith},
    },
    fhe::TfheOracle,
};

const CASES: [&str; 4] = [
    "comparator_32bit_signed_lt",
    "comparator_32bit_signed_lteq",
    "comparator_32bit_unsigned_lt",
    "comparator_32bit_unsigned_lteq",
];

fn main() -> ExitCode {
    let args = BenchArgs::init();
    println!("Test bench for comparators");

    let dir = PathBuf::from("circuits/old_bristol_ckts/arith");
    let mut all_passed = true;
    for case in CASES.iter().take(args.cases(CASES.len())) {
        let input = dir.join(format!("{case}.txt"));
        let output = dir.join(format!("{case}_FHE.out"));
        let op = match (case.contains("unsigned"), case.contains("lteq")) {
            (true, true) => ArithOp::LessEq,
            (true, false) => ArithOp::Less,
            (false, true) => ArithOp::SignedLessEq,
            (false, false) => ArithOp::SignedLess,
        };

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
        match test_arith(&output, op, &args, oracle) {
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
        println!("All Comparator cases passed");
        ExitCode::SUCCESS
    } else {
        println!("Some Comparator cases failed");
        ExitCode::FAILURE
    }
}
