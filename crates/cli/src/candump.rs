//! Reader for candump log files.
//!
//! One frame per line, in the format written by `candump -l`:
//!
//! ```text
//! (1436509052.249713) can0 126#0011223344556677
//! (1436509052.250000) can0 126#0011223344556677 T
//! ```
//!
//! The bus index is the trailing number of the interface name. A trailing
//! `T` marks a frame the gateway wants to transmit; `R` or nothing marks a
//! received frame. Blank lines and lines starting with `#` are skipped.

use cangate_safety::{CanFrame, MAX_PAYLOAD_LEN, Tick};
use serde::Serialize;

use crate::error::CliError;

/// Which way a logged frame travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Rx,
    Tx,
}

/// One parsed log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub line: usize,
    /// Timestamp in microseconds.
    pub timestamp: Tick,
    pub direction: Direction,
    pub frame: CanFrame,
}

/// Parse a whole log. Stops at the first malformed line.
pub fn parse_log(text: &str) -> Result<Vec<LogRecord>, CliError> {
    let mut records = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index.saturating_add(1);
        if let Some(record) = parse_line(line, raw)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Parse a single line; `Ok(None)` for blank and comment lines.
pub fn parse_line(line: usize, raw: &str) -> Result<Option<LogRecord>, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let mut fields = trimmed.split_whitespace();
    let (Some(stamp), Some(interface), Some(body)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(CliError::log_parse(line, "expected '(timestamp) interface id#data'"));
    };
    let direction = match fields.next() {
        None | Some("R") => Direction::Rx,
        Some("T") => Direction::Tx,
        Some(other) => {
            return Err(CliError::log_parse(line, format!("unknown direction '{other}'")));
        }
    };
    if fields.next().is_some() {
        return Err(CliError::log_parse(line, "trailing fields"));
    }

    let timestamp = parse_timestamp(stamp).ok_or_else(|| CliError::log_parse(line, "bad timestamp"))?;
    let bus = parse_bus(interface).ok_or_else(|| CliError::log_parse(line, "interface has no bus number"))?;
    let (id, data) = parse_body(body).map_err(|reason| CliError::log_parse(line, reason))?;
    let frame = CanFrame::new(bus, id, &data)
        .map_err(|err| CliError::log_parse(line, err.to_string()))?;

    Ok(Some(LogRecord {
        line,
        timestamp,
        direction,
        frame,
    }))
}

fn parse_timestamp(stamp: &str) -> Option<Tick> {
    let inner = stamp.strip_prefix('(')?.strip_suffix(')')?;
    let (seconds, fraction) = inner.split_once('.').unwrap_or((inner, ""));
    if fraction.len() > 6 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let seconds: Tick = seconds.parse().ok()?;
    let micros: Tick = if fraction.is_empty() {
        0
    } else {
        let scale = 10u64.pow(u32::try_from(6usize.saturating_sub(fraction.len())).ok()?);
        fraction.parse::<Tick>().ok()?.checked_mul(scale)?
    };
    seconds.checked_mul(1_000_000)?.checked_add(micros)
}

fn parse_bus(interface: &str) -> Option<u8> {
    let digits = interface.trim_start_matches(|c: char| !c.is_ascii_digit());
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

fn parse_body(body: &str) -> Result<(u32, Vec<u8>), String> {
    let (id, data) = body.split_once('#').ok_or("missing '#'")?;
    if id.is_empty() || id.len() > 8 {
        return Err(format!("bad identifier '{id}'"));
    }
    let id = u32::from_str_radix(id, 16).map_err(|err| format!("bad identifier '{id}': {err}"))?;
    // CAN-FD lines carry a flags nibble after a second '#'.
    let data = data.strip_prefix('#').map_or(data, |fd| fd.get(1..).unwrap_or(""));
    let data = parse_hex(data)?;
    if data.len() > MAX_PAYLOAD_LEN {
        return Err(format!("{} payload bytes, at most {MAX_PAYLOAD_LEN}", data.len()));
    }
    Ok((id, data))
}

fn parse_hex(text: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<u8> = text
        .bytes()
        .filter(|b| *b != b'.')
        .map(|b| match b {
            b'0'..=b'9' => Ok(b - b'0'),
            b'a'..=b'f' => Ok(b - b'a' + 10),
            b'A'..=b'F' => Ok(b - b'A' + 10),
            other => Err(format!("bad hex digit '{}'", char::from(other))),
        })
        .collect::<Result<_, _>>()?;
    let pairs = digits.chunks_exact(2);
    if !pairs.remainder().is_empty() {
        return Err("odd number of hex digits".to_string());
    }
    Ok(pairs
        .map(|pair| match pair {
            [high, low] => (high << 4) | low,
            _ => 0,
        })
        .collect())
}
