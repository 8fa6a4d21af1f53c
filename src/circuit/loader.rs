//! Assembled-program parsing.
//!
//! The input is the line-oriented text emitted by the assembler: `LOAD`,
//! `STORE`, `NOT`, `AND`, `OR`, `XOR` statements over numbered registers,
//! with `#` comment lines and `BOOT` markers. Parsing produces the immutable
//! graph the scheduler runs against: input gates, all other gates in source
//! order, and the net list mapping every wire to its consumers.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::{debug, info};

use super::{
    gate::{BusBit, Gate, GateOp},
    wire::{GateId, NetList, WireTable},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("read error at line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("{stmt} parse error line {line}")]
    Scan { stmt: &'static str, line: usize },
    #[error("missing assembler statistics header in {path}")]
    MissingStats { path: PathBuf },
}
pub type LoadError = Error;

/// Immutable result of loading an assembled program.
#[derive(Debug, Clone)]
pub struct CircuitGraph<Ct> {
    pub input_gates: Vec<Gate<Ct>>,
    pub all_gates: Vec<Gate<Ct>>,
    pub netlist: NetList,
    pub wires: WireTable,
    /// Bits per output bus. A single bus for now, sized by the highest
    /// STORE target plus one.
    pub n_output_bits: Vec<usize>,
}

impl<Ct> CircuitGraph<Ct> {
    pub fn gate_total(&self) -> usize {
        self.input_gates.len() + self.all_gates.len()
    }
}

pub fn load_program<Ct: Clone>(path: &Path) -> Result<CircuitGraph<Ct>, Error> {
    info!("loading circuit description {}", path.display());
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;
    parse_program(BufReader::new(file))
}

/// Parse an assembled program from any line source. Lines matching no
/// statement keyword are ignored, like the comment and `BOOT` lines; a line
/// that names a statement but fails to scan its integer fields is fatal.
pub fn parse_program<Ct: Clone, R: BufRead>(reader: R) -> Result<CircuitGraph<Ct>, Error> {
    let mut wires = WireTable::default();
    let mut input_gates = Vec::new();
    let mut all_gates = Vec::new();
    let mut gate_no = 0usize;
    let mut max_output_bit = 0usize;

    for (ix, line) in reader.lines().enumerate() {
        let line_no = ix + 1;
        let line = line.map_err(|source| Error::Read {
            line: line_no,
            source,
        })?;
        let t = line.trim();
        if t.is_empty() || t.starts_with('#') {
            continue;
        }
        // STORE before OR and XOR before OR: both contain the OR token.
        if t.contains("LOAD") {
            let (a, b, c) = scan_load(t).ok_or(Error::Scan {
                stmt: "LOAD",
                line: line_no,
            })?;
            // input buses are 1-based in the source text
            if b == 0 {
                return Err(Error::Scan {
                    stmt: "LOAD",
                    line: line_no,
                });
            }
            let out = wires.intern(&format!("R:{a}"));
            input_gates.push(Gate::new(
                GateId(gate_no),
                GateOp::Input,
                vec![],
                Some(out),
                Some(BusBit {
                    bus: (b - 1) as usize,
                    bit: c as usize,
                }),
            ));
            gate_no += 1;
        } else if t.contains("STORE") {
            let (a, b) = scan_store(t).ok_or(Error::Scan {
                stmt: "STORE",
                line: line_no,
            })?;
            let input = wires.intern(&format!("R:{b}"));
            all_gates.push(Gate::new(
                GateId(gate_no),
                GateOp::Output,
                vec![input],
                None,
                Some(BusBit {
                    bus: 0,
                    bit: a as usize,
                }),
            ));
            gate_no += 1;
            max_output_bit = max_output_bit.max(a as usize);
        } else if t.contains("NOT") {
            let (a, b) = scan_unary(t, "NOT").ok_or(Error::Scan {
                stmt: "NOT",
                line: line_no,
            })?;
            let input = wires.intern(&format!("R:{b}"));
            let out = wires.intern(&format!("R:{a}"));
            all_gates.push(Gate::new(
                GateId(gate_no),
                GateOp::Not,
                vec![input],
                Some(out),
                None,
            ));
            gate_no += 1;
        } else if t.contains("AND") {
            push_binary(&mut all_gates, &mut wires, &mut gate_no, t, "AND", GateOp::And, line_no)?;
        } else if t.contains("XOR") {
            push_binary(&mut all_gates, &mut wires, &mut gate_no, t, "XOR", GateOp::Xor, line_no)?;
        } else if t.contains("OR") {
            push_binary(&mut all_gates, &mut wires, &mut gate_no, t, "OR", GateOp::Or, line_no)?;
        } else if t.contains("BOOT") {
            // bootstrap marker, no gate
            continue;
        }
    }

    let n_output_bits = max_output_bit + 1;
    debug!(
        "generating output nbits {} over {} bus(es)",
        n_output_bits, 1
    );

    // net list by inverted scan: every gate registers as a consumer of each
    // of its input wires
    let mut netlist = NetList::new(wires.len());
    for g in input_gates.iter().chain(all_gates.iter()) {
        for w in &g.inputs {
            netlist.add_consumer(*w, g.id);
        }
    }

    info!(
        "loaded {} input gates, {} gates, {} wires",
        input_gates.len(),
        all_gates.len(),
        wires.len()
    );
    Ok(CircuitGraph {
        input_gates,
        all_gates,
        netlist,
        wires,
        n_output_bits: vec![n_output_bits],
    })
}

/// I/O widths parsed from the `# Assembler statistics` comment block the
/// assembler writes at the top of every `.out` file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgramStats {
    pub n_registers: usize,
    pub in1_bits: usize,
    pub in2_bits: usize,
    pub out1_bits: usize,
}

pub fn read_program_stats(path: &Path) -> Result<ProgramStats, Error> {
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;
    let mut stats = ProgramStats::default();
    let mut found_io = false;
    let mut lines = BufReader::new(file).lines();
    while let Some(line) = lines.next() {
        let Ok(line) = line else { break };
        if line.contains("# Assembler statistics") {
            for _ in 0..3 {
                let _ = lines.next();
            }
            if let Some(Ok(l)) = lines.next() {
                stats.n_registers = trailing_uint(&l).unwrap_or(0);
            }
        } else if line.contains("# number input") {
            stats.in1_bits = trailing_uint(&line).unwrap_or(0);
            if let Some(Ok(l2)) = lines.next() {
                stats.in2_bits = trailing_uint(&l2).unwrap_or(0);
            }
            found_io = true;
        } else if line.contains("# number output") {
            stats.out1_bits = trailing_uint(&line).unwrap_or(0);
        }
    }
    if !found_io {
        return Err(Error::MissingStats {
            path: path.to_owned(),
        });
    }
    Ok(stats)
}

fn trailing_uint(line: &str) -> Option<usize> {
    line.split_whitespace().rev().find_map(|t| t.parse().ok())
}

struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }

    fn lit(&mut self, tok: &str) -> Option<()> {
        self.rest = self.rest.trim_start().strip_prefix(tok)?;
        Some(())
    }

    fn uint(&mut self) -> Option<u32> {
        self.rest = self.rest.trim_start();
        let end = self
            .rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(self.rest.len());
        let (digits, rest) = self.rest.split_at(end);
        self.rest = rest;
        digits.parse().ok()
    }
}

// R<a> = LOAD(In<b>, <c>)
fn scan_load(line: &str) -> Option<(u32, u32, u32)> {
    let mut s = Scanner::new(line);
    s.lit("R")?;
    let a = s.uint()?;
    s.lit("=")?;
    s.lit("LOAD")?;
    s.lit("(")?;
    s.lit("In")?;
    let b = s.uint()?;
    s.lit(",")?;
    let c = s.uint()?;
    s.lit(")")?;
    Some((a, b, c))
}

// Out<a> = STORE(R<b>)
fn scan_store(line: &str) -> Option<(u32, u32)> {
    let mut s = Scanner::new(line);
    s.lit("Out")?;
    let a = s.uint()?;
    s.lit("=")?;
    s.lit("STORE")?;
    s.lit("(")?;
    s.lit("R")?;
    let b = s.uint()?;
    s.lit(")")?;
    Some((a, b))
}

// R<a> = <OP>(R<b>)
fn scan_unary(line: &str, op: &str) -> Option<(u32, u32)> {
    let mut s = Scanner::new(line);
    s.lit("R")?;
    let a = s.uint()?;
    s.lit("=")?;
    s.lit(op)?;
    s.lit("(")?;
    s.lit("R")?;
    let b = s.uint()?;
    s.lit(")")?;
    Some((a, b))
}

// R<a> = <OP>(R<b>, R<c>)
fn scan_binary(line: &str, op: &str) -> Option<(u32, u32, u32)> {
    let mut s = Scanner::new(line);
    s.lit("R")?;
    let a = s.uint()?;
    s.lit("=")?;
    s.lit(op)?;
    s.lit("(")?;
    s.lit("R")?;
    let b = s.uint()?;
    s.lit(",")?;
    s.lit("R")?;
    let c = s.uint()?;
    s.lit(")")?;
    Some((a, b, c))
}

#[allow(clippy::too_many_arguments)]
fn push_binary<Ct: Clone>(
    all_gates: &mut Vec<Gate<Ct>>,
    wires: &mut WireTable,
    gate_no: &mut usize,
    line: &str,
    token: &'static str,
    op: GateOp,
    line_no: usize,
) -> Result<(), Error> {
    let (a, b, c) = scan_binary(line, token).ok_or(Error::Scan {
        stmt: token,
        line: line_no,
    })?;
    let in1 = wires.intern(&format!("R:{b}"));
    let in2 = wires.intern(&format!("R:{c}"));
    let out = wires.intern(&format!("R:{a}"));
    all_gates.push(Gate::new(GateId(*gate_no), op, vec![in1, in2], Some(out), None));
    *gate_no += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::fhe::MockCiphertext;

    const SMALL: &str = "\
# Assembler statistics
# source file small.txt
# 5 gates
# depth 2
# 4 registers used
# number input1 bits 2
# number input2 bits 0
# number output1 bits 1
R1 = LOAD(In1, 0)
R2 = LOAD(In1, 1)
BOOT
R3 = AND(R1, R2)
Out0 = STORE(R3)
";

    fn parse(src: &str) -> CircuitGraph<MockCiphertext> {
        parse_program(Cursor::new(src)).unwrap()
    }

    #[test]
    fn small_program_shapes() {
        let g = parse(SMALL);
        assert_eq!(g.input_gates.len(), 2);
        assert_eq!(g.all_gates.len(), 2);
        assert_eq!(g.wires.len(), 3);
        assert_eq!(g.n_output_bits, vec![1]);
        // R:3 feeds only the STORE gate
        let r3 = g.wires.get("R:3").unwrap();
        assert_eq!(g.netlist.fanout(r3), &[g.all_gates[1].id]);
        // both loads fan out into the AND gate
        let r1 = g.wires.get("R:1").unwrap();
        assert_eq!(g.netlist.fanout(r1), &[g.all_gates[0].id]);
    }

    #[test]
    fn input_descriptor_is_zero_based_bus() {
        let g = parse("R1 = LOAD(In2, 7)\n");
        let io = g.input_gates[0].io.unwrap();
        assert_eq!((io.bus, io.bit), (1, 7));
    }

    #[test]
    fn store_sizes_output_bus() {
        let g = parse("R1 = LOAD(In1, 0)\nOut5 = STORE(R1)\nOut2 = STORE(R1)\n");
        assert_eq!(g.n_output_bits, vec![6]);
    }

    #[test]
    fn xor_is_not_mistaken_for_or() {
        let g = parse("R1 = LOAD(In1, 0)\nR2 = LOAD(In1, 1)\nR3 = XOR(R1, R2)\nR4 = OR(R1, R2)\n");
        assert_eq!(g.all_gates[0].op, GateOp::Xor);
        assert_eq!(g.all_gates[1].op, GateOp::Or);
    }

    #[test]
    fn keyword_with_bad_fields_is_fatal() {
        let err = parse_program::<MockCiphertext, _>(Cursor::new("R1 = AND(R2)\n")).unwrap_err();
        assert!(matches!(err, Error::Scan { stmt: "AND", line: 1 }));
    }

    #[test]
    fn comments_and_unknown_lines_are_skipped() {
        let g = parse("# a comment\n\nsomething else entirely\nR1 = LOAD(In1, 0)\n");
        assert_eq!(g.gate_total(), 1);
    }

    #[test]
    fn same_wire_on_both_inputs_appears_twice_in_fanout() {
        let g = parse("R1 = LOAD(In1, 0)\nR2 = AND(R1, R1)\n");
        let r1 = g.wires.get("R:1").unwrap();
        assert_eq!(g.netlist.fanout(r1).len(), 2);
    }
}
