//! Deterministic oracle for tests.
//!
//! Ciphertexts carry the plaintext bit plus a gate-depth counter standing in
//! for accumulated noise. Faults are scripted by `eval_bin` call index, which
//! makes the noise-retry and verify-repair paths testable without any real
//! cryptography.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::{BinFheOracle, BinGate, FheError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCiphertext {
    pub bit: bool,
    /// Gates traversed since the last fresh encryption.
    pub depth: u32,
}

#[derive(Debug, Default)]
pub struct MockOracle {
    calls: AtomicUsize,
    fail_on: Vec<usize>,
    corrupt_on: Vec<usize>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `eval_bin` with a noise accident on the given zero-based call
    /// indices.
    pub fn failing_on(calls: Vec<usize>) -> Self {
        Self {
            fail_on: calls,
            ..Self::default()
        }
    }

    /// Flip the result bit of the given zero-based `eval_bin` calls, as a
    /// silent noise corruption would.
    pub fn corrupting_on(calls: Vec<usize>) -> Self {
        Self {
            corrupt_on: calls,
            ..Self::default()
        }
    }

    /// Number of `eval_bin` invocations so far.
    pub fn bin_calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl BinFheOracle for MockOracle {
    type Ciphertext = MockCiphertext;

    fn encrypt(&self, bit: bool) -> MockCiphertext {
        MockCiphertext { bit, depth: 0 }
    }

    fn decrypt(&self, ct: &MockCiphertext) -> bool {
        ct.bit
    }

    fn eval_bin(
        &self,
        op: BinGate,
        a: &MockCiphertext,
        b: &MockCiphertext,
    ) -> Result<MockCiphertext, FheError> {
        let ix = self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_on.contains(&ix) {
            return Err(FheError::NoiseFailure { op });
        }
        let bit = match op {
            BinGate::And => a.bit && b.bit,
            BinGate::Or => a.bit || b.bit,
            BinGate::Xor => a.bit ^ b.bit,
        };
        let bit = if self.corrupt_on.contains(&ix) {
            !bit
        } else {
            bit
        };
        Ok(MockCiphertext {
            bit,
            depth: a.depth.max(b.depth) + 1,
        })
    }

    fn eval_not(&self, ct: &MockCiphertext) -> MockCiphertext {
        MockCiphertext {
            bit: !ct.bit,
            depth: ct.depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_noise_failure_then_success() {
        let oracle = MockOracle::failing_on(vec![0]);
        let a = oracle.encrypt(true);
        let b = oracle.encrypt(false);
        assert_eq!(
            oracle.eval_bin(BinGate::And, &a, &b),
            Err(FheError::NoiseFailure { op: BinGate::And })
        );
        let ct = oracle.eval_bin(BinGate::Or, &a, &b).unwrap();
        assert!(ct.bit);
        assert_eq!(ct.depth, 1);
        assert_eq!(oracle.bin_calls(), 2);
    }

    #[test]
    fn corruption_flips_result() {
        let oracle = MockOracle::corrupting_on(vec![0]);
        let a = oracle.encrypt(true);
        let b = oracle.encrypt(true);
        let ct = oracle.eval_bin(BinGate::And, &a, &b).unwrap();
        assert!(!ct.bit);
    }
}
