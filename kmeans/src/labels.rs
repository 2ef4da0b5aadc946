//! Label files
//! One integer cluster id per line, one line per point, in point order.

use std::{fs::File, io::{BufRead, BufReader, BufWriter, Write}, path::Path};

use crate::error::{ClusterError, Result};

pub fn format_labels(assignment: &[usize]) -> String {
    let mut out = String::with_capacity(assignment.len() * 3);
    for label in assignment {
        out.push_str(&label.to_string());
        out.push('\n');
    }
    out
}

/// Parse label text; blank lines are skipped
pub fn parse_labels(text: &str) -> Result<Vec<usize>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            line.trim().parse::<usize>()
                .map_err(|e| ClusterError::Parse(format!("line {}: '{}': {e}", n + 1, line.trim())))
        })
        .collect()
}

pub fn write_labels<P: AsRef<Path>>(path: P, assignment: &[usize]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for label in assignment {
        writeln!(writer, "{label}")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_labels<P: AsRef<Path>>(path: P) -> Result<Vec<usize>> {
    let reader = BufReader::new(File::open(path)?);
    let mut labels = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        labels.push(line.parse::<usize>()
            .map_err(|e| ClusterError::Parse(format!("line {}: '{line}': {e}", n + 1)))?);
    }
    Ok(labels)
}
