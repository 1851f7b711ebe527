use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, bail};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Load,
    Store,
    /// Load followed by a store to the same address.
    Modify,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::Load => write!(f, "L"),
            AccessKind::Store => write!(f, "S"),
            AccessKind::Modify => write!(f, "M"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceAccess {
    pub kind: AccessKind,
    pub address: u64,
    /// Bytes touched. Carried for display only.
    pub size: u32,
    /// Hex digits of the address as written in the trace, leading zeros
    /// included.
    pub digits: usize,
}

impl fmt::Display for TraceAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:0width$x},{}",
            self.kind,
            self.address,
            self.size,
            width = self.digits
        )
    }
}

#[derive(Debug, Clone)]
pub struct TraceFile {
    pub name: String,
    pub entries: Vec<TraceAccess>,
}

impl TraceFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Unable to open trace file {}", path.display()))?;
        let name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::parse(name, BufReader::new(file))
    }

    /// Parses a trace in `" K ADDR,SIZE"` format.
    ///
    /// Only lines starting with a space are data accesses. Instruction
    /// fetches and anything else are skipped.
    pub fn parse(name: impl Into<String>, reader: impl BufRead) -> Result<Self> {
        let name = name.into();
        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for (idx, line) in reader.lines().enumerate() {
            let line = line.context("Failed to read line from trace")?;
            if !line.starts_with(' ') {
                skipped += 1;
                continue;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                skipped += 1;
                continue;
            }
            let entry = parse_access(trimmed)
                .with_context(|| format!("Trace {name} line {}: '{trimmed}'", idx + 1))?;
            entries.push(entry);
        }
        debug!(
            "trace {name}: {} data accesses, {skipped} lines skipped",
            entries.len()
        );
        Ok(Self { name, entries })
    }
}

fn parse_access(record: &str) -> Result<TraceAccess> {
    let (op, operand) = record
        .split_once(char::is_whitespace)
        .context("missing address")?;
    let kind = match op {
        "L" => AccessKind::Load,
        "S" => AccessKind::Store,
        "M" => AccessKind::Modify,
        _ => bail!("invalid op '{op}'"),
    };
    let operand = operand.trim();
    let (addr, size) = operand.split_once(',').unwrap_or((operand, "1"));
    let addr = addr.trim();
    let address = u64::from_str_radix(addr, 16)
        .with_context(|| format!("invalid address literal '{addr}'"))?;
    let size = size
        .trim()
        .parse()
        .with_context(|| format!("invalid access size '{size}'"))?;
    Ok(TraceAccess {
        kind,
        address,
        size,
        digits: addr.len(),
    })
}
