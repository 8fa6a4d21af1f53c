//! Gate nodes and per-gate evaluation.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use super::wire::{GateId, Wire, WireId};
use crate::fhe::{BinFheOracle, BinGate, FheError};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("executing gate {gate} but inputs not ready")]
    InputsNotReady { gate: String },
    /// Ready flag set but the captured value is absent for the active mode.
    #[error("gate {gate} input {slot} has no captured value")]
    MissingInput { gate: String, slot: usize },
    #[error("gate {gate}: encrypted result disagrees with plaintext result")]
    VerifyMismatch { gate: String },
    #[error("gate {gate}: retry after noise failure failed again")]
    NoiseRetryExhausted {
        gate: String,
        #[source]
        source: FheError,
    },
    #[error(transparent)]
    Fhe(#[from] FheError),
    #[error("INPUT gate {gate} reached the executor")]
    InputGateExecuted { gate: String },
}
pub type GateError = Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GateOp {
    Input,
    Output,
    Not,
    And,
    Or,
    Xor,
}

impl GateOp {
    /// Number of input wires. INPUT gates are driven by `set_input` and
    /// carry a bus descriptor instead of wires.
    pub fn arity(self) -> usize {
        match self {
            GateOp::Input => 0,
            GateOp::Output | GateOp::Not => 1,
            GateOp::And | GateOp::Or | GateOp::Xor => 2,
        }
    }
}

impl fmt::Display for GateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            GateOp::Input => "INPUT",
            GateOp::Output => "OUTPUT",
            GateOp::Not => "NOT",
            GateOp::And => "AND",
            GateOp::Or => "OR",
            GateOp::Xor => "XOR",
        };
        write!(f, "{token}")
    }
}

/// Bus + bit position: the source of an INPUT gate or the sink of an
/// OUTPUT gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusBit {
    pub bus: usize,
    pub bit: usize,
}

/// Evaluation switches shared by every gate in a batch.
#[derive(Debug, Clone, Copy)]
pub struct EvalFlags {
    pub plaintext: bool,
    pub encrypted: bool,
    pub verify: bool,
    /// Verify-mode mismatches overwrite the ciphertext with a fresh
    /// encryption instead of failing. Test-harness aid only.
    pub repair: bool,
    /// Rewrite XOR into `(a∧¬b)∨(¬a∧b)`; the direct XOR primitive has a
    /// higher measured noise-failure rate.
    pub lower_xor: bool,
}

impl Default for EvalFlags {
    fn default() -> Self {
        Self {
            plaintext: false,
            encrypted: false,
            verify: false,
            repair: false,
            lower_xor: true,
        }
    }
}

/// Borrowed view handed to each executor worker.
pub struct EvalParams<'a, O: BinFheOracle> {
    pub flags: EvalFlags,
    pub oracle: &'a O,
}

/// A circuit node. The diagnostic name `<OP>:<seq>` is derived from the op
/// and the load-order id.
#[derive(Debug, Clone)]
pub struct Gate<Ct> {
    pub id: GateId,
    pub op: GateOp,
    pub inputs: Vec<WireId>,
    pub ready: Vec<bool>,
    pub plain_in: Vec<Option<bool>>,
    pub enc_in: Vec<Option<Ct>>,
    /// Output wire of INPUT and compute gates; OUTPUT gates have none.
    pub output: Option<WireId>,
    /// INPUT source or OUTPUT sink position.
    pub io: Option<BusBit>,
    pub plain_out: Option<bool>,
    pub enc_out: Option<Ct>,
}

impl<Ct: Clone> Gate<Ct> {
    pub fn new(
        id: GateId,
        op: GateOp,
        inputs: Vec<WireId>,
        output: Option<WireId>,
        io: Option<BusBit>,
    ) -> Self {
        let n = inputs.len();
        debug_assert_eq!(n, op.arity());
        Self {
            id,
            op,
            inputs,
            ready: vec![false; n],
            plain_in: vec![None; n],
            enc_in: vec![None; n],
            output,
            io,
            plain_out: None,
            enc_out: None,
        }
    }

    pub fn name(&self) -> String {
        format!("{}:{}", self.op, self.id)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.iter().all(|r| *r)
    }

    /// Capture `wire`'s value on every input slot it feeds and mark those
    /// slots ready.
    pub fn capture(&mut self, wire: &Wire<Ct>) {
        for ix in 0..self.inputs.len() {
            if self.inputs[ix] == wire.id {
                self.ready[ix] = true;
                self.plain_in[ix] = wire.value;
                self.enc_in[ix] = wire.ct.clone();
            }
        }
    }

    fn plain(&self, ix: usize) -> Result<bool, Error> {
        self.plain_in[ix].ok_or_else(|| Error::MissingInput {
            gate: self.name(),
            slot: ix,
        })
    }

    fn enc(&self, ix: usize) -> Result<&Ct, Error> {
        self.enc_in[ix].as_ref().ok_or_else(|| Error::MissingInput {
            gate: self.name(),
            slot: ix,
        })
    }

    /// Evaluate this gate under the active modes, filling `plain_out` /
    /// `enc_out`. Safe to call from one worker per gate: only the gate
    /// itself and the shared oracle are touched.
    pub fn evaluate<O>(&mut self, p: &EvalParams<'_, O>) -> Result<(), Error>
    where
        O: BinFheOracle<Ciphertext = Ct>,
    {
        if !self.is_ready() {
            return Err(Error::InputsNotReady { gate: self.name() });
        }
        let flags = p.flags;
        match self.op {
            GateOp::Input => return Err(Error::InputGateExecuted { gate: self.name() }),
            GateOp::Output => {
                if flags.plaintext {
                    self.plain_out = Some(self.plain(0)?);
                }
                if flags.encrypted {
                    self.enc_out = Some(self.enc(0)?.clone());
                }
            }
            GateOp::Not => {
                if flags.plaintext {
                    self.plain_out = Some(!self.plain(0)?);
                }
                if flags.encrypted {
                    self.enc_out = Some(p.oracle.eval_not(self.enc(0)?));
                }
            }
            GateOp::And => {
                if flags.plaintext {
                    self.plain_out = Some(self.plain(0)? && self.plain(1)?);
                }
                if flags.encrypted {
                    self.enc_out = Some(self.eval_and_with_retry(p.oracle)?);
                }
            }
            GateOp::Or => {
                if flags.plaintext {
                    self.plain_out = Some(self.plain(0)? || self.plain(1)?);
                }
                if flags.encrypted {
                    self.enc_out = Some(p.oracle.eval_bin(BinGate::Or, self.enc(0)?, self.enc(1)?)?);
                }
            }
            GateOp::Xor => {
                if flags.plaintext {
                    self.plain_out = Some(self.plain(0)? ^ self.plain(1)?);
                }
                if flags.encrypted {
                    let a = self.enc(0)?;
                    let b = self.enc(1)?;
                    let out = if flags.lower_xor {
                        // a⊕b = (a∧¬b) ∨ (¬a∧b)
                        let not_a = p.oracle.eval_not(a);
                        let not_b = p.oracle.eval_not(b);
                        let t1 = p.oracle.eval_bin(BinGate::And, a, &not_b)?;
                        let t2 = p.oracle.eval_bin(BinGate::And, &not_a, b)?;
                        p.oracle.eval_bin(BinGate::Or, &t1, &t2)?
                    } else {
                        p.oracle.eval_bin(BinGate::Xor, a, b)?
                    };
                    self.enc_out = Some(out);
                }
            }
        }
        self.verify_result(p)
    }

    /// AND is the one gate observed to hit noise accidents in practice:
    /// on failure re-encrypt the decrypted operands and retry once.
    fn eval_and_with_retry<O>(&mut self, oracle: &O) -> Result<Ct, Error>
    where
        O: BinFheOracle<Ciphertext = Ct>,
    {
        match oracle.eval_bin(BinGate::And, self.enc(0)?, self.enc(1)?) {
            Ok(ct) => Ok(ct),
            Err(e) => {
                warn!(gate = %self.name(), error = %e, "noise failure, re-encrypting inputs and retrying");
                for ix in 0..2 {
                    let bit = oracle.decrypt(self.enc(ix)?);
                    self.enc_in[ix] = Some(oracle.encrypt(bit));
                }
                oracle
                    .eval_bin(BinGate::And, self.enc(0)?, self.enc(1)?)
                    .map_err(|e| Error::NoiseRetryExhausted {
                        gate: self.name(),
                        source: e,
                    })
            }
        }
    }

    /// Cross-check the encrypted result against the plaintext one. With
    /// `repair` the ciphertext is silently replaced by a fresh encryption
    /// of the plaintext bit; otherwise a mismatch is fatal.
    fn verify_result<O>(&mut self, p: &EvalParams<'_, O>) -> Result<(), Error>
    where
        O: BinFheOracle<Ciphertext = Ct>,
    {
        if !(p.flags.verify && p.flags.plaintext && p.flags.encrypted) {
            return Ok(());
        }
        let (Some(expected), Some(ct)) = (self.plain_out, self.enc_out.as_ref()) else {
            return Ok(());
        };
        if p.oracle.decrypt(ct) == expected {
            return Ok(());
        }
        if p.flags.repair {
            warn!(gate = %self.name(), "bad {} result, repairing ciphertext", self.op);
            self.enc_out = Some(p.oracle.encrypt(expected));
            Ok(())
        } else {
            Err(Error::VerifyMismatch { gate: self.name() })
        }
    }
}

/// Per-op totals accumulated as gates retire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateCounts {
    pub input: usize,
    pub output: usize,
    pub not: usize,
    pub and: usize,
    pub or: usize,
    pub xor: usize,
}

impl GateCounts {
    pub fn record(&mut self, op: GateOp) {
        match op {
            GateOp::Input => self.input += 1,
            GateOp::Output => self.output += 1,
            GateOp::Not => self.not += 1,
            GateOp::And => self.and += 1,
            GateOp::Or => self.or += 1,
            GateOp::Xor => self.xor += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.input + self.output + self.not + self.and + self.or + self.xor
    }
}

impl fmt::Display for GateCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of input gates {}", self.input)?;
        writeln!(f, "Number of output gates {}", self.output)?;
        writeln!(f, "Number of not gates {}", self.not)?;
        writeln!(f, "Number of and gates {}", self.and)?;
        writeln!(f, "Number of or gates {}", self.or)?;
        write!(f, "Number of xor gates {}", self.xor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhe::MockOracle;

    fn two_input_gate(op: GateOp) -> Gate<crate::fhe::MockCiphertext> {
        Gate::new(
            GateId(0),
            op,
            vec![WireId(0), WireId(1)],
            Some(WireId(2)),
            None,
        )
    }

    fn feed(gate: &mut Gate<crate::fhe::MockCiphertext>, oracle: &MockOracle, a: bool, b: bool) {
        let mut wa = Wire::new(WireId(0), vec![GateId(0)]);
        wa.value = Some(a);
        wa.ct = Some(oracle.encrypt(a));
        let mut wb = Wire::new(WireId(1), vec![GateId(0)]);
        wb.value = Some(b);
        wb.ct = Some(oracle.encrypt(b));
        gate.capture(&wa);
        gate.capture(&wb);
    }

    fn flags_both() -> EvalFlags {
        EvalFlags {
            plaintext: true,
            encrypted: true,
            verify: false,
            repair: false,
            lower_xor: true,
        }
    }

    #[test]
    fn truth_tables_match_in_both_modes() {
        for op in [GateOp::And, GateOp::Or, GateOp::Xor] {
            for a in [false, true] {
                for b in [false, true] {
                    let oracle = MockOracle::new();
                    let mut gate = two_input_gate(op);
                    feed(&mut gate, &oracle, a, b);
                    let params = EvalParams {
                        flags: flags_both(),
                        oracle: &oracle,
                    };
                    gate.evaluate(&params).unwrap();
                    let expected = match op {
                        GateOp::And => a && b,
                        GateOp::Or => a || b,
                        GateOp::Xor => a ^ b,
                        _ => unreachable!(),
                    };
                    assert_eq!(gate.plain_out, Some(expected), "{op} {a} {b} plain");
                    assert_eq!(
                        oracle.decrypt(gate.enc_out.as_ref().unwrap()),
                        expected,
                        "{op} {a} {b} encrypted"
                    );
                }
            }
        }
    }

    #[test]
    fn xor_lowering_agrees_with_direct_xor() {
        for a in [false, true] {
            for b in [false, true] {
                for lower in [false, true] {
                    let oracle = MockOracle::new();
                    let mut gate = two_input_gate(GateOp::Xor);
                    feed(&mut gate, &oracle, a, b);
                    let mut flags = flags_both();
                    flags.lower_xor = lower;
                    let params = EvalParams {
                        flags,
                        oracle: &oracle,
                    };
                    gate.evaluate(&params).unwrap();
                    assert_eq!(oracle.decrypt(gate.enc_out.as_ref().unwrap()), a ^ b);
                }
            }
        }
    }

    #[test]
    fn lowered_xor_spends_three_bin_gates() {
        let oracle = MockOracle::new();
        let mut gate = two_input_gate(GateOp::Xor);
        feed(&mut gate, &oracle, true, false);
        let params = EvalParams {
            flags: flags_both(),
            oracle: &oracle,
        };
        gate.evaluate(&params).unwrap();
        assert_eq!(oracle.bin_calls(), 3);
    }

    #[test]
    fn and_retries_once_after_noise_failure() {
        let oracle = MockOracle::failing_on(vec![0]);
        let mut gate = two_input_gate(GateOp::And);
        feed(&mut gate, &oracle, true, true);
        let params = EvalParams {
            flags: flags_both(),
            oracle: &oracle,
        };
        gate.evaluate(&params).unwrap();
        assert_eq!(oracle.decrypt(gate.enc_out.as_ref().unwrap()), true);
        assert_eq!(oracle.bin_calls(), 2);
    }

    #[test]
    fn and_second_noise_failure_is_fatal() {
        let oracle = MockOracle::failing_on(vec![0, 1]);
        let mut gate = two_input_gate(GateOp::And);
        feed(&mut gate, &oracle, true, true);
        let params = EvalParams {
            flags: flags_both(),
            oracle: &oracle,
        };
        assert!(matches!(
            gate.evaluate(&params),
            Err(Error::NoiseRetryExhausted { .. })
        ));
    }

    #[test]
    fn verify_mismatch_is_fatal_without_repair() {
        let oracle = MockOracle::corrupting_on(vec![0]);
        let mut gate = two_input_gate(GateOp::And);
        feed(&mut gate, &oracle, true, true);
        let mut flags = flags_both();
        flags.verify = true;
        let params = EvalParams {
            flags,
            oracle: &oracle,
        };
        assert!(matches!(
            gate.evaluate(&params),
            Err(Error::VerifyMismatch { .. })
        ));
    }

    #[test]
    fn verify_repair_overwrites_ciphertext() {
        let oracle = MockOracle::corrupting_on(vec![0]);
        let mut gate = two_input_gate(GateOp::And);
        feed(&mut gate, &oracle, true, true);
        let mut flags = flags_both();
        flags.verify = true;
        flags.repair = true;
        let params = EvalParams {
            flags,
            oracle: &oracle,
        };
        gate.evaluate(&params).unwrap();
        assert_eq!(oracle.decrypt(gate.enc_out.as_ref().unwrap()), true);
    }

    #[test]
    fn not_gate_single_input() {
        let oracle = MockOracle::new();
        let mut gate: Gate<crate::fhe::MockCiphertext> =
            Gate::new(GateId(7), GateOp::Not, vec![WireId(3)], Some(WireId(4)), None);
        let mut w = Wire::new(WireId(3), vec![GateId(7)]);
        w.value = Some(true);
        w.ct = Some(oracle.encrypt(true));
        gate.capture(&w);
        let params = EvalParams {
            flags: flags_both(),
            oracle: &oracle,
        };
        gate.evaluate(&params).unwrap();
        assert_eq!(gate.plain_out, Some(false));
        assert!(!oracle.decrypt(gate.enc_out.as_ref().unwrap()));
        assert_eq!(gate.name(), "NOT:7");
    }

    #[test]
    fn unready_gate_refuses_to_run() {
        let oracle = MockOracle::new();
        let mut gate = two_input_gate(GateOp::Or);
        let params = EvalParams {
            flags: flags_both(),
            oracle: &oracle,
        };
        assert!(matches!(
            gate.evaluate(&params),
            Err(Error::InputsNotReady { .. })
        ));
    }
}
