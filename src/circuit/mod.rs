//! Encrypted circuit evaluation.
//!
//! A [`Circuit`] wraps the immutable load result (input gates, all other
//! gates, net list) with the mutable scheduler state. Evaluation proceeds in
//! macro-cycles: a single-threaded **manage** phase propagates wire values
//! into gate input slots and collects the gates that became ready, then an
//! **execute** phase evaluates that batch in parallel against the FHE
//! oracle. The cycle repeats until every gate has retired.

mod executor;
pub mod gate;
pub mod loader;
pub mod wire;

use std::{
    collections::{HashSet, VecDeque},
    path::Path,
    time::{Duration, Instant},
};

use tracing::{debug, debug_span, info};

use itertools::Itertools;

use self::gate::{EvalFlags, EvalParams, Gate, GateCounts, GateError, GateOp};
use self::loader::{CircuitGraph, LoadError};
use self::wire::{Wire, WireId};
use crate::fhe::BinFheOracle;

/// Input buses: `inputs[bus][bit]`.
pub type Inputs = Vec<Vec<bool>>;
/// Output buses: `outputs[bus][bit]`.
pub type Outputs = Vec<Vec<bool>>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Gate(#[from] GateError),
    /// A wire still carries fanout but no gate is waiting to consume it.
    #[error("waiting-gate queue empty while wire {wire} still active")]
    EmptyWaitingGates { wire: String },
    #[error("wire {wire} missing from waiting list")]
    UnknownWire { wire: String },
    #[error("gate {gate} has no I/O descriptor")]
    MissingDescriptor { gate: String },
    #[error("gate {gate} finished without a result in the active mode")]
    MissingResult { gate: String },
    #[error("input bus {bus} bit {bit} not supplied")]
    InputOutOfRange { bus: usize, bit: usize },
    #[error("output bus {bus} bit {bit} out of range")]
    OutputOutOfRange { bus: usize, bit: usize },
    #[error("{supplied} input bits supplied but {consumed} consumed")]
    InputSizeMismatch { supplied: usize, consumed: usize },
    #[error("either plaintext or encrypted mode must be set")]
    ModeUnset,
    /// The active-wire queue drained with gates never becoming ready. The
    /// wiring is cyclic or disconnected.
    #[error("circuit stalled with {remaining} gates never ready (cyclic or disconnected wiring)")]
    Stalled { remaining: usize },
    #[error("done circuit clocked; reset first")]
    AlreadyDone,
}
pub type CircuitError = Error;

pub struct Circuit<O: BinFheOracle> {
    oracle: O,
    graph: CircuitGraph<O::Ciphertext>,
    flags: EvalFlags,
    done: bool,

    active_wires: VecDeque<Wire<O::Ciphertext>>,
    waiting_wires: HashSet<WireId>,
    waiting_gates: VecDeque<Gate<O::Ciphertext>>,
    examined_gates: VecDeque<Gate<O::Ciphertext>>,
    executing_gates: Vec<Gate<O::Ciphertext>>,
    done_gates: Vec<Gate<O::Ciphertext>>,

    counts: GateCounts,
    outputs: Outputs,
}

impl<O: BinFheOracle> Circuit<O> {
    /// Load an assembled program and attach the oracle.
    pub fn load(path: impl AsRef<Path>, oracle: O) -> Result<Self, Error> {
        let graph = loader::load_program(path.as_ref())?;
        Ok(Self::new(graph, oracle))
    }

    /// Wrap an already-parsed graph. The circuit starts in reset state with
    /// every mode flag off.
    pub fn new(graph: CircuitGraph<O::Ciphertext>, oracle: O) -> Self {
        let mut circuit = Self {
            oracle,
            graph,
            flags: EvalFlags::default(),
            done: false,
            active_wires: VecDeque::new(),
            waiting_wires: HashSet::new(),
            waiting_gates: VecDeque::new(),
            examined_gates: VecDeque::new(),
            executing_gates: Vec::new(),
            done_gates: Vec::new(),
            counts: GateCounts::default(),
            outputs: Vec::new(),
        };
        circuit.reset();
        circuit
    }

    pub fn set_plaintext(&mut self, on: bool) {
        self.flags.plaintext = on;
    }

    pub fn plaintext(&self) -> bool {
        self.flags.plaintext
    }

    pub fn set_encrypted(&mut self, on: bool) {
        self.flags.encrypted = on;
    }

    pub fn encrypted(&self) -> bool {
        self.flags.encrypted
    }

    /// Verify implies running both modes side by side.
    pub fn set_verify(&mut self, on: bool) {
        self.flags.verify = on;
        if on {
            self.set_plaintext(true);
            self.set_encrypted(true);
        }
    }

    pub fn verify(&self) -> bool {
        self.flags.verify
    }

    /// Legacy verify behavior: overwrite a mismatched ciphertext with a
    /// fresh encryption instead of failing. Survives [`Self::reset`].
    pub fn set_repair(&mut self, on: bool) {
        self.flags.repair = on;
    }

    pub fn repair(&self) -> bool {
        self.flags.repair
    }

    /// Toggle XOR lowering. Survives [`Self::reset`].
    pub fn set_lower_xor(&mut self, on: bool) {
        self.flags.lower_xor = on;
    }

    pub fn lower_xor(&self) -> bool {
        self.flags.lower_xor
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn gate_counts(&self) -> GateCounts {
        self.counts
    }

    pub fn input_gate_count(&self) -> usize {
        self.graph.input_gates.len()
    }

    pub fn gate_count(&self) -> usize {
        self.graph.all_gates.len()
    }

    pub fn done_gate_count(&self) -> usize {
        self.done_gates.len()
    }

    pub fn active_wire_count(&self) -> usize {
        self.active_wires.len()
    }

    pub fn waiting_wire_count(&self) -> usize {
        self.waiting_wires.len()
    }

    pub fn output_bits(&self) -> &[usize] {
        &self.graph.n_output_bits
    }

    /// Restore pre-run state without re-parsing. Mode flags are cleared
    /// like the queues; `repair` and `lower_xor` are configuration and
    /// survive.
    pub fn reset(&mut self) {
        self.counts = GateCounts::default();
        self.flags.plaintext = false;
        self.flags.encrypted = false;
        self.flags.verify = false;
        self.done = false;

        self.active_wires.clear();
        self.examined_gates.clear();
        self.executing_gates.clear();
        self.done_gates.clear();

        self.waiting_gates = self.graph.all_gates.iter().cloned().collect();
        self.waiting_wires = self.graph.wires.ids().collect();
        self.outputs = self
            .graph
            .n_output_bits
            .iter()
            .map(|n| vec![false; *n])
            .collect();
        debug!(
            waiting_gates = self.waiting_gates.len(),
            waiting_wires = self.waiting_wires.len(),
            "reset"
        );
    }

    /// Bind concrete input bits: every INPUT gate reads its `(bus, bit)`
    /// source, produces a live wire (encrypted when encrypted mode is on)
    /// and retires. Fails if the supplied bit count does not match what the
    /// circuit consumes.
    pub fn set_input(&mut self, inputs: &Inputs) -> Result<(), Error> {
        let supplied: usize = inputs.iter().map(Vec::len).sum();
        let mut consumed = 0usize;
        // retire into done as each gate binds so the done tally covers
        // input gates too
        let input_gates = self.graph.input_gates.clone();
        for g in input_gates {
            let src = g.io.ok_or_else(|| Error::MissingDescriptor { gate: g.name() })?;
            let out = g
                .output
                .ok_or_else(|| Error::MissingDescriptor { gate: g.name() })?;
            let value = *inputs
                .get(src.bus)
                .and_then(|bus| bus.get(src.bit))
                .ok_or(Error::InputOutOfRange {
                    bus: src.bus,
                    bit: src.bit,
                })?;
            let mut w = Wire::new(out, self.graph.netlist.fanout(out).to_vec());
            w.value = Some(value);
            if self.flags.encrypted {
                w.ct = Some(self.oracle.encrypt(value));
            }
            debug!(wire = %self.graph.wires.name(out), value, "set_input");
            if !self.waiting_wires.remove(&out) {
                return Err(Error::UnknownWire {
                    wire: self.graph.wires.name(out).to_string(),
                });
            }
            self.active_wires.push_back(w);
            self.counts.record(GateOp::Input);
            self.done_gates.push(g);
            consumed += 1;
        }
        if consumed != supplied {
            return Err(Error::InputSizeMismatch { supplied, consumed });
        }
        Ok(())
    }

    /// Run macro-cycles until every gate has retired, then return the
    /// output bus. Reports the wall time and the share spent in parallel
    /// gate execution.
    pub fn clock(&mut self) -> Result<Outputs, Error> {
        if self.done {
            return Err(Error::AlreadyDone);
        }
        let t_total = Instant::now();
        let mut manage_time = Duration::ZERO;
        let mut execute_time = Duration::ZERO;
        let total_gates = self.graph.gate_total();

        while !self.active_wires.is_empty() && !self.done {
            let t = Instant::now();
            self.manage()?;
            manage_time += t.elapsed();

            let t = Instant::now();
            self.execute()?;
            execute_time += t.elapsed();

            if self.done_gates.len() == total_gates {
                self.done = true;
            }
        }
        if !self.done {
            return Err(Error::Stalled {
                remaining: total_gates - self.done_gates.len(),
            });
        }

        let total_time = t_total.elapsed().max(Duration::from_millis(1));
        let execute_time = execute_time.max(Duration::from_millis(1));
        info!(
            total_ms = total_time.as_millis() as u64,
            manage_ms = manage_time.as_millis() as u64,
            execute_ms = execute_time.as_millis() as u64,
            "clock done, efficiency {:.1}%",
            execute_time.as_secs_f64() / total_time.as_secs_f64() * 100.0
        );
        Ok(self.outputs.clone())
    }

    /// Manage phase: drain the active wires, marking gate input slots ready
    /// and moving fully-ready gates onto the executing batch.
    ///
    /// Order is load-bearing: gates are swept in waiting order, examined
    /// gates return to the queue front in their original relative order,
    /// and an undrained wire goes back to the queue front so it keeps
    /// draining against the refreshed gate order.
    fn manage(&mut self) -> Result<(), Error> {
        let span = debug_span!("manage");
        let _enter = span.enter();
        while let Some(mut inw) = self.active_wires.pop_front() {
            if inw.is_drained() {
                // nothing consumes this wire; retire it immediately
                continue;
            }
            if self.waiting_gates.is_empty() {
                return Err(Error::EmptyWaitingGates {
                    wire: self.graph.wires.name(inw.id).to_string(),
                });
            }
            self.examined_gates.clear();
            let mut wire_done = false;
            while !wire_done && !self.waiting_gates.is_empty() {
                let Some(mut g) = self.waiting_gates.pop_front() else {
                    break;
                };
                if inw.fanout.contains(&g.id) {
                    let gid = g.id;
                    g.capture(&inw);
                    if g.is_ready() {
                        debug!(gate = %g.name(), "-> execute");
                        self.executing_gates.push(g);
                    } else {
                        self.examined_gates.push_back(g);
                    }
                    inw.remove_fanout(gid);
                    if inw.is_drained() {
                        wire_done = true;
                    }
                } else {
                    self.examined_gates.push_back(g);
                }
            }
            // restore examined gates to the front, preserving their order
            while let Some(g) = self.examined_gates.pop_back() {
                self.waiting_gates.push_front(g);
            }
            if !wire_done {
                self.active_wires.push_front(inw);
            }
        }
        debug!(batch = self.executing_gates.len(), "manage done");
        Ok(())
    }

    /// Execute phase: evaluate the ready batch in parallel, then retire
    /// each gate in batch order, creating its output wire or writing its
    /// output bit.
    fn execute(&mut self) -> Result<(), Error> {
        let span = debug_span!("execute", batch = self.executing_gates.len());
        let _enter = span.enter();

        let params = EvalParams {
            flags: self.flags,
            oracle: &self.oracle,
        };
        executor::execute_batch(&mut self.executing_gates, &params)?;

        let batch = std::mem::take(&mut self.executing_gates);
        for g in batch {
            self.counts.record(g.op);
            if g.op == GateOp::Output {
                let sink = g.io.ok_or_else(|| Error::MissingDescriptor { gate: g.name() })?;
                let bit = if self.flags.encrypted {
                    let ct = g
                        .enc_out
                        .as_ref()
                        .ok_or_else(|| Error::MissingResult { gate: g.name() })?;
                    self.oracle.decrypt(ct)
                } else {
                    if !self.flags.plaintext {
                        return Err(Error::ModeUnset);
                    }
                    g.plain_out
                        .ok_or_else(|| Error::MissingResult { gate: g.name() })?
                };
                let slot = self
                    .outputs
                    .get_mut(sink.bus)
                    .and_then(|bus| bus.get_mut(sink.bit))
                    .ok_or(Error::OutputOutOfRange {
                        bus: sink.bus,
                        bit: sink.bit,
                    })?;
                *slot = bit;
            } else {
                let out = g
                    .output
                    .ok_or_else(|| Error::MissingDescriptor { gate: g.name() })?;
                let mut w = Wire::new(out, self.graph.netlist.fanout(out).to_vec());
                if self.flags.plaintext {
                    w.value = g.plain_out;
                }
                if self.flags.encrypted {
                    w.ct = g.enc_out.clone();
                }
                if !self.waiting_wires.remove(&out) {
                    return Err(Error::UnknownWire {
                        wire: self.graph.wires.name(out).to_string(),
                    });
                }
                self.active_wires.push_back(w);
            }
            self.done_gates.push(g);
        }
        debug!(
            done = self.done_gates.len(),
            total = self.graph.gate_total(),
            "processed"
        );
        Ok(())
    }

    pub fn dump_netlist(&self) {
        info!("Netlist");
        for id in self.graph.wires.ids() {
            let consumers = self.graph.netlist.fanout(id).iter().join(" ");
            info!("{} {}", self.graph.wires.name(id), consumers);
        }
    }

    pub fn dump_gates(&self) {
        info!("Inputlist");
        for g in &self.graph.input_gates {
            info!("{}", g.name());
        }
        info!("Alllist");
        for g in &self.graph.all_gates {
            info!("{}", g.name());
        }
    }

    pub fn dump_gate_counts(&self) {
        info!("{}", self.counts);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use test_log::test;

    use super::*;
    use crate::fhe::{MockCiphertext, MockOracle};
    use super::loader::parse_program;

    // half adder: sum = a^b, carry = a&b
    const HALF_ADDER: &str = "\
R1 = LOAD(In1, 0)
R2 = LOAD(In2, 0)
R3 = XOR(R1, R2)
R4 = AND(R1, R2)
Out0 = STORE(R3)
Out1 = STORE(R4)
";

    // R2 and R3 feed each other; nothing can ever become ready
    const CYCLIC: &str = "\
R1 = LOAD(In1, 0)
R2 = AND(R1, R3)
R3 = NOT(R2)
Out0 = STORE(R3)
";

    fn circuit(src: &str, oracle: MockOracle) -> Circuit<MockOracle> {
        let graph = parse_program::<MockCiphertext, _>(Cursor::new(src)).unwrap();
        Circuit::new(graph, oracle)
    }

    fn run_plain(circ: &mut Circuit<MockOracle>, inputs: &Inputs) -> Outputs {
        circ.reset();
        circ.set_plaintext(true);
        circ.set_encrypted(false);
        circ.set_input(inputs).unwrap();
        circ.clock().unwrap()
    }

    fn run_encrypted(circ: &mut Circuit<MockOracle>, inputs: &Inputs) -> Outputs {
        circ.reset();
        circ.set_plaintext(false);
        circ.set_encrypted(true);
        circ.set_input(inputs).unwrap();
        circ.clock().unwrap()
    }

    #[test]
    fn half_adder_truth_table() {
        let mut circ = circuit(HALF_ADDER, MockOracle::new());
        for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
            let out = run_plain(&mut circ, &vec![vec![a], vec![b]]);
            assert_eq!(out[0], vec![a ^ b, a && b], "a={a} b={b}");
        }
    }

    #[test]
    fn plaintext_and_encrypted_agree() {
        let mut circ = circuit(HALF_ADDER, MockOracle::new());
        for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
            let inputs = vec![vec![a], vec![b]];
            let plain = run_plain(&mut circ, &inputs);
            let enc = run_encrypted(&mut circ, &inputs);
            assert_eq!(plain, enc);
        }
    }

    #[test]
    fn conservation_and_drain_at_termination() {
        let mut circ = circuit(HALF_ADDER, MockOracle::new());
        run_plain(&mut circ, &vec![vec![true], vec![true]]);
        assert!(circ.is_done());
        assert_eq!(
            circ.done_gate_count(),
            circ.input_gate_count() + circ.gate_count()
        );
        assert_eq!(circ.active_wire_count(), 0);
        assert_eq!(circ.waiting_wire_count(), 0);
    }

    #[test]
    fn reset_makes_runs_idempotent() {
        let mut circ = circuit(HALF_ADDER, MockOracle::new());
        let inputs = vec![vec![true], vec![false]];
        let first = run_plain(&mut circ, &inputs);
        let second = run_plain(&mut circ, &inputs);
        assert_eq!(first, second);
    }

    #[test]
    fn cyclic_circuit_stalls_instead_of_looping() {
        let mut circ = circuit(CYCLIC, MockOracle::new());
        circ.reset();
        circ.set_plaintext(true);
        circ.set_input(&vec![vec![true]]).unwrap();
        assert!(matches!(circ.clock(), Err(Error::Stalled { remaining: 3 })));
    }

    #[test]
    fn clocking_a_done_circuit_fails() {
        let mut circ = circuit(HALF_ADDER, MockOracle::new());
        run_plain(&mut circ, &vec![vec![true], vec![true]]);
        assert!(matches!(circ.clock(), Err(Error::AlreadyDone)));
    }

    #[test]
    fn input_bit_count_mismatch_is_fatal() {
        let mut circ = circuit(HALF_ADDER, MockOracle::new());
        circ.reset();
        circ.set_plaintext(true);
        let err = circ
            .set_input(&vec![vec![true, false], vec![true]])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InputSizeMismatch {
                supplied: 3,
                consumed: 2
            }
        ));
    }

    #[test]
    fn missing_input_bus_is_fatal() {
        let mut circ = circuit(HALF_ADDER, MockOracle::new());
        circ.reset();
        circ.set_plaintext(true);
        let err = circ.set_input(&vec![vec![true]]).unwrap_err();
        assert!(matches!(err, Error::InputOutOfRange { bus: 1, bit: 0 }));
    }

    #[test]
    fn verify_mismatch_fails_hard_by_default() {
        // corrupt the AND gate's only bin-gate call: XOR lowers to calls
        // 0..=2, the AND gate lands on call 3 or earlier depending on batch
        // order, so corrupt every call and expect some mismatch
        let oracle = MockOracle::corrupting_on(vec![0, 1, 2, 3]);
        let mut circ = circuit(HALF_ADDER, oracle);
        circ.reset();
        circ.set_verify(true);
        circ.set_input(&vec![vec![true], vec![true]]).unwrap();
        assert!(matches!(
            circ.clock(),
            Err(Error::Gate(GateError::VerifyMismatch { .. }))
        ));
    }

    #[test]
    fn verify_repair_recovers_and_warns() {
        let oracle = MockOracle::corrupting_on(vec![0, 1, 2, 3]);
        let mut circ = circuit(HALF_ADDER, oracle);
        circ.set_repair(true);
        circ.reset();
        circ.set_verify(true);
        circ.set_input(&vec![vec![true], vec![true]]).unwrap();
        let out = circ.clock().unwrap();
        assert_eq!(out[0], vec![false, true]);
    }

    #[test]
    fn same_register_on_both_gate_inputs_drains() {
        let src = "\
R1 = LOAD(In1, 0)
R2 = AND(R1, R1)
Out0 = STORE(R2)
";
        let mut circ = circuit(src, MockOracle::new());
        let out = run_plain(&mut circ, &vec![vec![true]]);
        assert_eq!(out[0], vec![true]);
        assert_eq!(circ.waiting_wire_count(), 0);
    }

    #[test]
    fn encrypted_only_mode_produces_outputs() {
        let mut circ = circuit(HALF_ADDER, MockOracle::new());
        let out = run_encrypted(&mut circ, &vec![vec![true], vec![false]]);
        assert_eq!(out[0], vec![true, false]);
    }
}
