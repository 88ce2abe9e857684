//! Readers and writers for the cdd text formats.
//!
//! `.ine` holds an H-representation: rows `b a₁ … aₙ` meaning
//! `b + a·x ≥ 0`, stored here as the facet `−a·x ≤ b`. A `linearity k i₁ … iₖ`
//! line marks rows (1-based) as equalities. `.ext` holds a V-representation:
//! rows `1 x₁ … xₙ`; rays (leading `0`) are rejected.
//!
//! Numbers are decimal or rational (`p/q`). Lines starting with `*` are
//! comments; anything else outside `begin … end` is ignored.

use std::fmt::Write as _;
use std::path::Path;

use thiserror::Error;

use crate::facet::{CollectFacets, DuplicateAction, Insertion};
use crate::interval::IntervalVector;
use crate::Vector;

#[derive(Debug, Error)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("no `begin` line")]
    MissingBegin,
    #[error("line {line}: expected `rows columns numbertype`")]
    Header { line: usize },
    #[error("line {line}: cannot read `{token}` as a number")]
    Number { line: usize, token: String },
    #[error("input ends before `end` or before the announced rows")]
    Truncated,
    #[error("line {line}: ray rows are not supported")]
    NonVertex { line: usize },
}

/// Rows of the `begin … end` block, with the 1-based equality indices.
struct Block {
    cols: usize,
    rows: Vec<(usize, Vec<f64>)>,
    linearity: Vec<usize>,
}

fn number(line: usize, token: &str) -> Result<f64, IoError> {
    let bad = || IoError::Number { line, token: token.to_string() };
    match token.split_once('/') {
        Some((p, q)) => {
            let p: f64 = p.parse().map_err(|_| bad())?;
            let q: f64 = q.parse().map_err(|_| bad())?;
            if q == 0.0 {
                return Err(bad());
            }
            Ok(p / q)
        }
        None => token.parse().map_err(|_| bad()),
    }
}

fn parse_linearity(line: usize, rest: &str, out: &mut Vec<usize>) -> Result<(), IoError> {
    let mut tokens = rest.split_whitespace();
    let count = tokens.next().map(|t| number(line, t)).transpose()?.unwrap_or(0.0) as usize;
    for t in tokens.take(count) {
        let i = number(line, t)?;
        if i < 1.0 || i.fract() != 0.0 {
            return Err(IoError::Number { line, token: t.to_string() });
        }
        out.push(i as usize);
    }
    Ok(())
}

fn parse_block(text: &str) -> Result<Block, IoError> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));
    let mut linearity = Vec::new();
    loop {
        let (no, l) = lines.next().ok_or(IoError::MissingBegin)?;
        if let Some(rest) = l.strip_prefix("linearity") {
            parse_linearity(no, rest, &mut linearity)?;
        } else if l == "begin" {
            break;
        }
    }
    let (no, header) = lines
        .by_ref()
        .find(|(_, l)| !l.is_empty() && !l.starts_with('*'))
        .ok_or(IoError::Truncated)?;
    let head: Vec<&str> = header.split_whitespace().collect();
    let (m, cols) = match head.as_slice() {
        [m, n, ..] => match (m.parse::<usize>(), n.parse::<usize>()) {
            (Ok(m), Ok(n)) if n >= 1 => (m, n),
            _ => return Err(IoError::Header { line: no }),
        },
        _ => return Err(IoError::Header { line: no }),
    };
    let mut rows = Vec::with_capacity(m);
    let mut closed = false;
    for (no, l) in lines.by_ref() {
        if l.is_empty() || l.starts_with('*') {
            continue;
        }
        if l == "end" {
            closed = true;
            break;
        }
        let values = l
            .split_whitespace()
            .map(|t| number(no, t))
            .collect::<Result<Vec<f64>, _>>()?;
        if values.len() != cols {
            return Err(IoError::Truncated);
        }
        rows.push((no, values));
    }
    if !closed || rows.len() != m {
        return Err(IoError::Truncated);
    }
    for (no, l) in lines {
        if let Some(rest) = l.strip_prefix("linearity") {
            parse_linearity(no, rest, &mut linearity)?;
        }
    }
    Ok(Block { cols, rows, linearity })
}

/// Parse an H-representation.
pub fn parse_ine(text: &str) -> Result<CollectFacets, IoError> {
    let block = parse_block(text)?;
    let dim = block.cols - 1;
    let mut facets = CollectFacets::new(dim);
    for (k, (_, values)) in block.rows.iter().enumerate() {
        let row = -Vector::from_column_slice(&values[1..]);
        let eq = block.linearity.contains(&(k + 1));
        if facets.insert(row, values[0], eq, DuplicateAction::MinRhs) == Insertion::Empty {
            // contradictory duplicates: keep an infeasible null row
            facets.insert(Vector::zeros(dim), -1.0, false, DuplicateAction::MinRhs);
        }
    }
    tracing::debug!(dim, rows = block.rows.len(), eqs = block.linearity.len(), "ine parsed");
    Ok(facets)
}

pub fn read_ine(path: impl AsRef<Path>) -> Result<CollectFacets, IoError> {
    parse_ine(&std::fs::read_to_string(path)?)
}

/// Parse a V-representation; returns the dimension and the vertices.
pub fn parse_ext(text: &str) -> Result<(usize, Vec<Vector>), IoError> {
    let block = parse_block(text)?;
    let dim = block.cols - 1;
    let vertices = block
        .rows
        .into_iter()
        .map(|(line, values)| {
            if values[0] == 0.0 {
                return Err(IoError::NonVertex { line });
            }
            Ok(Vector::from_column_slice(&values[1..]) / values[0])
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((dim, vertices))
}

pub fn read_ext(path: impl AsRef<Path>) -> Result<(usize, Vec<Vector>), IoError> {
    parse_ext(&std::fs::read_to_string(path)?)
}

fn push_row(out: &mut String, b: f64, a: impl IntoIterator<Item = f64>) {
    let _ = write!(out, " {b}");
    for x in a {
        let _ = write!(out, " {x}");
    }
    out.push('\n');
}

/// H-representation of `bbox ∩ facets`; finite box bounds are written as
/// axis facets, degenerate components as equalities.
pub fn write_ine(facets: &CollectFacets, bbox: &IntervalVector) -> String {
    let dim = facets.dim();
    assert_eq!(bbox.size(), dim, "box dimension mismatch");
    let axis = |i: usize, s: f64| (0..dim).map(move |j| if j == i { s } else { 0.0 });
    let mut body = String::new();
    let mut eqs = Vec::new();
    let mut m = 0;
    for i in 0..dim {
        let b = bbox[i];
        if b.is_degenerated() {
            push_row(&mut body, b.lb(), axis(i, -1.0));
            m += 1;
            eqs.push(m);
            continue;
        }
        if b.ub() < f64::INFINITY {
            push_row(&mut body, b.ub(), axis(i, -1.0));
            m += 1;
        }
        if b.lb() > f64::NEG_INFINITY {
            push_row(&mut body, -b.lb(), axis(i, 1.0));
            m += 1;
        }
    }
    for f in facets.iter() {
        push_row(&mut body, f.rhs(), f.row().iter().map(|x| -x));
        m += 1;
        if f.is_eq() {
            eqs.push(m);
        }
    }
    let mut out = String::from("H-representation\n");
    if !eqs.is_empty() {
        let list: Vec<String> = eqs.iter().map(usize::to_string).collect();
        let _ = writeln!(out, "linearity {} {}", eqs.len(), list.join(" "));
    }
    let _ = writeln!(out, "begin\n {m} {} real", dim + 1);
    out.push_str(&body);
    out.push_str("end\n");
    out
}

/// V-representation of a vertex list.
pub fn write_ext(dim: usize, vertices: &[Vector]) -> String {
    let mut out = String::from("V-representation\nbegin\n");
    let _ = writeln!(out, " {} {} real", vertices.len(), dim + 1);
    for v in vertices {
        assert_eq!(v.len(), dim, "vertex dimension mismatch");
        push_row(&mut out, 1.0, v.iter().copied());
    }
    out.push_str("end\n");
    out
}
