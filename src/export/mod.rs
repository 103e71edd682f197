//! Raw CSV export of a sensor's tier-0 readings.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::db::{Database, ScalarReading};
use crate::models::{RangeOrder, TimeRange};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const CSV_HEADER: [&str; 3] = ["timestamp_ms", "time", "value"];

/// One exported line. `time` is the RFC 3339 rendering of `timestamp_ms`,
/// empty when the timestamp is outside chrono's range.
#[derive(Debug, Serialize)]
struct ExportRow {
    timestamp_ms: i64,
    time: String,
    value: f64,
}

impl From<&ScalarReading> for ExportRow {
    fn from(reading: &ScalarReading) -> Self {
        Self {
            timestamp_ms: reading.timestamp_ms,
            time: DateTime::<Utc>::from_timestamp_millis(reading.timestamp_ms)
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
                .unwrap_or_default(),
            value: reading.value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: usize,
    pub pages: usize,
    /// Set when the token fired before the scan finished; `rows` were
    /// written before that.
    pub cancelled: bool,
}

/// Streams every tier-0 reading of one sensor to `writer` as CSV, oldest
/// first. Each page is encoded in memory and written in one go; the token
/// is checked between pages.
pub async fn export_csv<W: AsyncWrite + Unpin>(
    db: &Database,
    trial_id: &str,
    sensor_tag: &str,
    page_size: usize,
    writer: &mut W,
    cancel: &CancellationToken,
) -> Result<ExportSummary> {
    writer
        .write_all(&encode_header()?)
        .await
        .context("failed to write CSV header")?;

    let mut stream = db.stream_readings(
        trial_id,
        &[sensor_tag],
        TimeRange::all(RangeOrder::OldestFirst),
        0,
        page_size,
    );
    let mut summary = ExportSummary {
        rows: 0,
        pages: 0,
        cancelled: false,
    };

    loop {
        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log_warn!(
                    "export of {sensor_tag} in trial {trial_id} cancelled after {} rows",
                    summary.rows
                );
                summary.cancelled = true;
                break;
            }
            page = stream.next_page() => page?,
        };
        let Some(page) = page else {
            break;
        };

        writer
            .write_all(&encode_page(&page)?)
            .await
            .context("failed to write CSV rows")?;
        summary.rows += page.len();
        summary.pages += 1;
    }

    writer.flush().await.context("failed to flush CSV output")?;
    log_info!(
        "Exported {} rows of {sensor_tag} in trial {trial_id}",
        summary.rows
    );
    Ok(summary)
}

fn encode_header() -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    finish(writer)
}

fn encode_page(page: &[ScalarReading]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for reading in page {
        writer
            .serialize(ExportRow::from(reading))
            .context("failed to encode CSV row")?;
    }
    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|err| anyhow!("failed to finish CSV buffer: {}", err.error()))
}
