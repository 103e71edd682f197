//! Sample files fed to the recorder: `timestamp_ms,value` CSV.

use std::{fs::File, io::Read, path::Path};

use anyhow::{Context, Result};

/// Parses `timestamp_ms,value` records. Fields may be quoted and padded;
/// blank lines are skipped. Any other malformed record is an error naming
/// its line.
pub fn read_samples<R: Read>(reader: R, has_headers: bool) -> Result<Vec<(i64, f64)>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut samples = Vec::new();
    for record in reader.deserialize::<(i64, f64)>() {
        let sample = record.map_err(|err| {
            let line = err.position().map_or(0, |pos| pos.line());
            anyhow::Error::new(err).context(format!("malformed sample on line {line}"))
        })?;
        samples.push(sample);
    }
    Ok(samples)
}

pub fn read_samples_from_path(path: &Path, has_headers: bool) -> Result<Vec<(i64, f64)>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    read_samples(file, has_headers).with_context(|| format!("failed to read {}", path.display()))
}
