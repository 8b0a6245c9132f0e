/* report.rs : human readable stdout dumps, not a stable format */

use std::io::{self, Write};

use crate::measure::{ResourceSample, Throughput};

/// `label` on one line, lowercase hex on the next.
pub fn write_hex<W: Write>(out: &mut W, label: &str, bytes: &[u8]) -> io::Result<()> {
    writeln!(out, "{}", label)?;
    writeln!(out, "{}", hex::encode(bytes))
}

pub fn write_plain<W: Write>(out: &mut W, label: &str, bytes: &[u8]) -> io::Result<()> {
    writeln!(out, "{}", label)?;
    writeln!(out, "{}", String::from_utf8_lossy(bytes))
}

pub fn write_data<W: Write>(out: &mut W, label: &str, bytes: &[u8]) -> io::Result<()> {
    writeln!(out, "{} (Hex): {}", label, hex::encode(bytes))?;
    writeln!(out, "{} (Plain Text): {}", label, String::from_utf8_lossy(bytes))
}

pub fn write_throughput<W: Write>(out: &mut W, name: &str, throughput: &Throughput) -> io::Result<()> {
    match throughput.per_second() {
        Some(rate) => writeln!(out, "Throughput for {}: {:.2} operations/second", name, rate),
        None => writeln!(out, "Throughput for {}: not measurable ({} operations)", name, throughput.operations),
    }
}

fn bytes_or_na(value: Option<u64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{} bytes", v))
}

/* CPU figures are process CPU time (user + system), not wall time */
pub fn write_resources<W: Write>(out: &mut W, initial: &ResourceSample, last: &ResourceSample) -> io::Result<()> {
    writeln!(out, "Initial Memory Usage: {}", bytes_or_na(initial.memory))?;
    writeln!(out, "Final Memory Usage: {}", bytes_or_na(last.memory))?;
    match last.memory_change_since(initial) {
        Some(change) => writeln!(out, "Memory Usage Change: {} bytes", change)?,
        None => writeln!(out, "Memory Usage Change: n/a")?,
    }

    match (initial.cpu, last.cpu) {
        (Some(first), Some(second)) => {
            writeln!(out, "Initial CPU Time: {:.3} seconds", first.as_secs_f64())?;
            writeln!(out, "Final CPU Time: {:.3} seconds", second.as_secs_f64())?;
        }
        _ => writeln!(out, "CPU Time: n/a")?,
    }
    match last.cpu_percent_since(initial) {
        Some(percent) => writeln!(out, "CPU Usage: {:.1}% of {:.3} seconds wall time", percent, last.wall_since(initial).as_secs_f64()),
        None => writeln!(out, "CPU Usage: n/a"),
    }
}
