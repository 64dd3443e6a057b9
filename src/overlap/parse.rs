use clap::ValueEnum;
use serde::Serialize;
use std::path::Path;

use crate::seq::{NameTable, Strand};
use super::{Area, Overlap};

/// On-disk overlap record layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum OverlapFormat {
    /// minimap2 PAF: `qname qlen qstart qend strand tname tlen tstart tend matches block_len mapq ...`
    Paf,
    /// BLASR-style M4: `qname tname score identity qstrand qstart qend qlen tstrand tstart tend tlen ...`
    M4,
}

impl OverlapFormat {
    /// Guess the format from the file name, ignoring a trailing `.gz`.
    pub fn detect(path: &Path) -> Self {
        let name = path.file_name().map(|n| n.to_string_lossy().to_lowercase()).unwrap_or_default();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        if name.ends_with(".m4") || name.ends_with(".m4a") {
            OverlapFormat::M4
        } else {
            OverlapFormat::Paf
        }
    }

    /// Parse one line. Returns `Ok(None)` for blank and comment lines.
    pub fn parse_line(self, line: &str, names: &mut NameTable) -> Result<Option<Overlap>, String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        match self {
            OverlapFormat::Paf => parse_paf(&fields, names).map(Some),
            OverlapFormat::M4 => parse_m4(&fields, names).map(Some),
        }
    }
}

fn field<T: std::str::FromStr>(fields: &[&str], index: usize, what: &str) -> Result<T, String> {
    fields
        .get(index)
        .ok_or_else(|| format!("missing column {} ({})", index + 1, what))?
        .parse::<T>()
        .map_err(|_| format!("invalid {} '{}'", what, fields[index]))
}

fn checked_area(names: &mut NameTable, name: &str, start: u32, end: u32, len: u32) -> Result<Area, String> {
    if start > end || end > len {
        return Err(format!("interval {}..{} out of bounds for {} (length {})", start, end, name, len));
    }
    Ok(Area::new(names.intern(name), start, end, len))
}

fn parse_paf(fields: &[&str], names: &mut NameTable) -> Result<Overlap, String> {
    if fields.len() < 12 {
        return Err(format!("PAF record has {} columns, expected at least 12", fields.len()));
    }
    let strand = match fields[4] {
        "+" => Strand::Forward,
        "-" => Strand::Reverse,
        other => return Err(format!("invalid strand '{}'", other)),
    };
    let a = checked_area(
        names,
        fields[0],
        field(fields, 2, "query start")?,
        field(fields, 3, "query end")?,
        field(fields, 1, "query length")?,
    )?;
    let b = checked_area(
        names,
        fields[5],
        field(fields, 7, "target start")?,
        field(fields, 8, "target end")?,
        field(fields, 6, "target length")?,
    )?;
    let matches: f64 = field(fields, 9, "residue matches")?;
    let block: f64 = field(fields, 10, "alignment block length")?;
    let identity = if block > 0.0 { 100.0 * matches / block } else { 0.0 };
    Ok(Overlap::new(a, b, strand, identity))
}

fn m4_strand(value: &str) -> Result<Strand, String> {
    match value {
        "0" => Ok(Strand::Forward),
        "1" => Ok(Strand::Reverse),
        other => Err(format!("invalid M4 strand '{}'", other)),
    }
}

/// M4 coordinates on a reverse strand are measured on the reverse complement.
fn m4_forward(strand: Strand, start: u32, end: u32, len: u32) -> Result<(u32, u32), String> {
    if start > end || end > len {
        return Err(format!("interval {}..{} out of bounds (length {})", start, end, len));
    }
    Ok(match strand {
        Strand::Forward => (start, end),
        Strand::Reverse => (len - end, len - start),
    })
}

fn parse_m4(fields: &[&str], names: &mut NameTable) -> Result<Overlap, String> {
    if fields.len() < 12 {
        return Err(format!("M4 record has {} columns, expected at least 12", fields.len()));
    }
    let identity: f64 = field(fields, 3, "identity")?;
    let q_strand = m4_strand(fields[4])?;
    let t_strand = m4_strand(fields[8])?;
    let q_len: u32 = field(fields, 7, "query length")?;
    let t_len: u32 = field(fields, 11, "target length")?;
    let (qs, qe) = m4_forward(q_strand, field(fields, 5, "query start")?, field(fields, 6, "query end")?, q_len)?;
    let (ts, te) = m4_forward(t_strand, field(fields, 9, "target start")?, field(fields, 10, "target end")?, t_len)?;

    let a = checked_area(names, fields[0], qs, qe, q_len)?;
    let b = checked_area(names, fields[1], ts, te, t_len)?;
    Ok(Overlap::new(a, b, q_strand.compose(t_strand), identity))
}
