//! Bristol-circuit analysis.
//!
//! Preprocesses a Bristol-format gate list into per-node and per-gate
//! statistics: low/high-water marks (first and last gate touching a node),
//! node lifetimes, optional fan-in/out counts, and the tokenized call list.
//! The assembler consumes this record to allocate registers and emit the
//! evaluator's input program.
//!
//! Two header layouts exist. Old style:
//! `<n_gates> <n_nodes>` / `<n_in1> <n_in2> <n_out>` / blank. New
//! "Bristol fashion" style: `<n_gates> <n_nodes>` /
//! `<n_inputs> <n_in1> <n_in2>` / `<n_outputs> <n_out>` / blank.
//!
//! `INV` is recorded as NOT. `EQW a → b` is a zero-cost wire alias
//! (`b := a`) and passes through; `EQ` is rejected.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed header at line {line}")]
    Header { line: usize },
    #[error("truncated file: expected {expected} gate lines, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("malformed gate line {line}")]
    GateLine { line: usize },
    #[error("node {node} out of range on line {line}")]
    NodeOutOfRange { node: usize, line: usize },
    #[error("EQ gates are not supported (line {line})")]
    UnsupportedEq { line: usize },
    #[error("node {node} driven by more than one gate (line {line})")]
    MultipleDrivers { node: usize, line: usize },
}
pub type AnalyzeError = Error;

/// Gate opcode recorded in the call list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BristolOp {
    Xor,
    And,
    Not,
    /// Wire alias, no evaluation cost.
    Eqw,
}

/// Per-node statistics.
///
/// A node's low-water mark stays 0 until the node is first touched and
/// never regresses afterwards; together with the high-water mark it bounds
/// the gate range over which the node must stay allocated.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Variables {
    pub in_fname: String,
    pub new_style: bool,
    pub n_tot: usize,
    pub n_inputs: usize,
    pub n_in1_bits: usize,
    pub n_in2_bits: usize,
    pub n_out1_bits: usize,
    pub high_water: Vec<usize>,
    pub low_water: Vec<usize>,
    pub life: Vec<usize>,
    /// Producer count per node; present only when fan generation is on.
    pub fan_in: Vec<usize>,
    /// Consumer count per node; present only when fan generation is on.
    pub fan_out: Vec<usize>,
}

/// Per-gate records plus per-op totals.
///
/// The three lists run in file order and stay index-aligned with the gate
/// indices the node water marks refer to. A line with an unrecognized op
/// token keeps its slot with a `None` call entry.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Functions {
    pub in_fname: String,
    pub n_tot: usize,
    pub call_list: Vec<Option<BristolOp>>,
    pub in_list: Vec<Vec<usize>>,
    pub out_list: Vec<Vec<usize>>,
    pub n_and: usize,
    pub n_xor: usize,
    pub n_not: usize,
    pub n_eqw: usize,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct Analysis {
    pub variables: Variables,
    pub functions: Functions,
}

pub fn analyze_bristol(
    path: impl AsRef<Path>,
    gen_fan: bool,
    new_style: bool,
) -> Result<Analysis, Error> {
    let path = path.as_ref();
    info!("analyzing file {}", path.display());
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;
    let mut analysis = parse_bristol(BufReader::new(file), gen_fan, new_style)?;
    analysis.variables.in_fname = path.display().to_string();
    analysis.functions.in_fname = path.display().to_string();
    report(&analysis, gen_fan);
    Ok(analysis)
}

fn parse_bristol<R: BufRead>(reader: R, gen_fan: bool, new_style: bool) -> Result<Analysis, Error> {
    let mut lines = reader.lines().enumerate();
    let mut next_line = |expect: usize| -> Result<(usize, String), Error> {
        match lines.next() {
            Some((ix, Ok(line))) => Ok((ix + 1, line)),
            _ => Err(Error::Header { line: expect }),
        }
    };

    // line 1: gate and node totals
    let (line_no, header) = next_line(1)?;
    let mut it = header.split_whitespace();
    let n_tot_func: usize = parse_field(&mut it, line_no)?;
    let n_tot_var: usize = parse_field(&mut it, line_no)?;

    let mut variables = Variables {
        new_style,
        n_tot: n_tot_var,
        ..Variables::default()
    };

    if new_style {
        let (line_no, l) = next_line(2)?;
        let mut it = l.split_whitespace();
        variables.n_inputs = parse_field(&mut it, line_no)?;
        variables.n_in1_bits = parse_field(&mut it, line_no)?;
        variables.n_in2_bits = parse_field(&mut it, line_no)?;
        let (line_no, l) = next_line(3)?;
        let mut it = l.split_whitespace();
        let _n_outputs: usize = parse_field(&mut it, line_no)?;
        variables.n_out1_bits = parse_field(&mut it, line_no)?;
        let _blank = next_line(4)?;
    } else {
        variables.n_inputs = 2;
        let (line_no, l) = next_line(2)?;
        let mut it = l.split_whitespace();
        variables.n_in1_bits = parse_field(&mut it, line_no)?;
        variables.n_in2_bits = parse_field(&mut it, line_no)?;
        variables.n_out1_bits = parse_field(&mut it, line_no)?;
        let _blank = next_line(3)?;
    }

    let mut high_water = vec![0usize; n_tot_var];
    let mut low_water = vec![0usize; n_tot_var];
    let mut fan_in = vec![0usize; n_tot_var];
    let mut fan_out = vec![0usize; n_tot_var];
    let mut produced = vec![false; n_tot_var];

    let mut functions = Functions {
        n_tot: n_tot_func,
        ..Functions::default()
    };

    for gate_ix in 0..n_tot_func {
        let Some((ix, line)) = lines.next() else {
            return Err(Error::Truncated {
                expected: n_tot_func,
                found: gate_ix,
            });
        };
        let line_no = ix + 1;
        let line = line.map_err(|_| Error::GateLine { line: line_no })?;
        let mut it = line.split_whitespace();
        let nin: usize = parse_field(&mut it, line_no)?;
        let nout: usize = parse_field(&mut it, line_no)?;
        let mut inlist = Vec::with_capacity(nin);
        for _ in 0..nin {
            inlist.push(parse_field(&mut it, line_no)?);
        }
        let mut outlist = Vec::with_capacity(nout);
        for _ in 0..nout {
            outlist.push(parse_field(&mut it, line_no)?);
        }
        let token = it
            .next()
            .ok_or(Error::GateLine { line: line_no })?
            .to_ascii_uppercase();

        let op = match token.as_str() {
            "XOR" => {
                functions.n_xor += 1;
                Some(BristolOp::Xor)
            }
            "AND" => {
                functions.n_and += 1;
                Some(BristolOp::And)
            }
            "INV" => {
                functions.n_not += 1;
                Some(BristolOp::Not)
            }
            "EQ" => return Err(Error::UnsupportedEq { line: line_no }),
            "EQW" => {
                functions.n_eqw += 1;
                Some(BristolOp::Eqw)
            }
            other => {
                // the line keeps its gate slot; only the op totals skip it
                warn!("bad parse of function {other:?} on line {line_no}");
                None
            }
        };

        for node in inlist.iter().chain(outlist.iter()) {
            let node = *node;
            if node >= n_tot_var {
                return Err(Error::NodeOutOfRange {
                    node,
                    line: line_no,
                });
            }
            if low_water[node] == 0 {
                low_water[node] = gate_ix;
            }
            high_water[node] = gate_ix;
        }
        for node in &outlist {
            if produced[*node] {
                return Err(Error::MultipleDrivers {
                    node: *node,
                    line: line_no,
                });
            }
            produced[*node] = true;
        }
        if gen_fan {
            for node in &inlist {
                fan_out[*node] += 1;
            }
            for node in &outlist {
                fan_in[*node] += 1;
            }
        }

        functions.call_list.push(op);
        functions.in_list.push(inlist);
        functions.out_list.push(outlist);
    }

    let life = high_water
        .iter()
        .zip(low_water.iter())
        .map(|(h, l)| h.saturating_sub(*l))
        .collect();

    variables.high_water = high_water;
    variables.low_water = low_water;
    variables.life = life;
    if gen_fan {
        variables.fan_in = fan_in;
        variables.fan_out = fan_out;
    }

    Ok(Analysis {
        variables,
        functions,
    })
}

fn parse_field<'a, I: Iterator<Item = &'a str>>(it: &mut I, line: usize) -> Result<usize, Error> {
    it.next()
        .and_then(|t| t.parse().ok())
        .ok_or(Error::GateLine { line })
}

fn report(analysis: &Analysis, gen_fan: bool) {
    let v = &analysis.variables;
    let f = &analysis.functions;
    info!("total number of nodes: {}", v.n_tot);
    info!("number bits input 1 = {}", v.n_in1_bits);
    if v.n_inputs == 2 {
        info!("number bits input 2 = {}", v.n_in2_bits);
    }
    info!("number bits output 1 = {}", v.n_out1_bits);
    info!("total number of function calls {}", f.n_tot);
    info!("number of and {}", f.n_and);
    info!("number of xor {}", f.n_xor);
    info!("number of inv {}", f.n_not);
    info!("number of eqw {}", f.n_eqw);
    if let Some(max_life) = v.life.iter().max() {
        info!("max variable life = {max_life}");
    }
    if gen_fan {
        if let Some(max_fan_in) = v.fan_in.iter().max() {
            info!("max fan in (should be 1) = {max_fan_in}");
        }
        if let Some(max_fan_out) = v.fan_out.iter().max() {
            info!("max fan out = {max_fan_out}");
        }
    } else {
        info!("not parsing fan in, fan out");
    }
}
