//! Record Parser: turns `nvidia-smi` CSV output into typed records.
//!
//! Line shape (no header, anchored at both ends):
//! `<index>, <name>, <gpu%>, <mem%>, <total>, <free>, <used>, <temp>`
//!
//! The name is the only free-text field and may not contain commas, so a
//! line is valid only if it splits into exactly 8 fields. Numeric fields may
//! carry leading blanks (`, 40`) but nothing else. A bad line is skipped and
//! never affects its neighbours.

use std::fmt;

use crate::gpu::record::{GpuRecord, Snapshot};

pub const FIELD_COUNT: usize = 8;

const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "index",
    "name",
    "utilization.gpu",
    "utilization.memory",
    "memory.total",
    "memory.free",
    "memory.used",
    "temperature.gpu",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    /// Wrong number of comma-separated fields.
    FieldCount(usize),
    /// Field does not have the expected shape (e.g. `[N/A]` in a numeric slot).
    Shape(&'static str),
    /// Digits that do not fit the target integer type.
    Number(&'static str),
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::FieldCount(n) => write!(f, "expected {} fields, found {}", FIELD_COUNT, n),
            LineError::Shape(field) => write!(f, "malformed field '{}'", field),
            LineError::Number(field) => write!(f, "field '{}' out of range", field),
        }
    }
}

impl std::error::Error for LineError {}

/// Parse a whole batch. Never fails: malformed lines are dropped.
pub fn parse(raw: &str) -> Snapshot {
    raw.lines()
        .map(|line| line.trim_end_matches(['\r', '\n', '\t', ' ']))
        .filter(|line| !line.is_empty())
        .filter_map(|line| match parse_line(line) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::trace!("Skipping line {:?}: {}", line, err);
                None
            }
        })
        .collect()
}

/// Parse a single line that has already had its trailing whitespace removed.
pub fn parse_line(line: &str) -> Result<GpuRecord, LineError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != FIELD_COUNT {
        return Err(LineError::FieldCount(fields.len()));
    }

    // The index is anchored at line start: no leading padding.
    let index = unsigned(fields[0], 0)?;

    if fields[1].is_empty() {
        return Err(LineError::Shape(FIELD_NAMES[1]));
    }
    let name = fields[1].trim().to_string();

    Ok(GpuRecord {
        index,
        name,
        utilization_gpu_pct: unsigned(padded(fields[2]), 2)?,
        utilization_mem_pct: unsigned(padded(fields[3]), 3)?,
        memory_total_mib: unsigned(padded(fields[4]), 4)?,
        memory_free_mib: unsigned(padded(fields[5]), 5)?,
        memory_used_mib: unsigned(padded(fields[6]), 6)?,
        temperature_c: signed(padded(fields[7]), 7)?,
    })
}

// --- HELPERS ---

fn padded(field: &str) -> &str {
    field.trim_start()
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn unsigned<T: std::str::FromStr>(field: &str, pos: usize) -> Result<T, LineError> {
    if !is_digits(field) {
        return Err(LineError::Shape(FIELD_NAMES[pos]));
    }
    field.parse().map_err(|_| LineError::Number(FIELD_NAMES[pos]))
}

// Some sensors report below-zero readings, so the temperature alone may carry a sign.
fn signed(field: &str, pos: usize) -> Result<i32, LineError> {
    let digits = field.strip_prefix('-').unwrap_or(field);
    if !is_digits(digits) {
        return Err(LineError::Shape(FIELD_NAMES[pos]));
    }
    field.parse().map_err(|_| LineError::Number(FIELD_NAMES[pos]))
}
