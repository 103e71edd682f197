use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::{
    helpers::parse_datetime,
    models::{SensorStats, ZoomStats, LEGACY_TRIAL_ID},
    Database,
};

fn row_to_stats(row: &Row) -> Result<SensorStats> {
    let updated_at: String = row.get("updated_at")?;

    Ok(SensorStats {
        trial_id: row.get("trial_id")?,
        sensor_tag: row.get("sensor_tag")?,
        zoom: ZoomStats {
            total_duration_ms: row.get("total_duration_ms")?,
            num_data_points: row.get("num_data_points")?,
            tier_count: row.get("tier_count")?,
            decimation_factor: row.get("decimation_factor")?,
        },
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

pub fn upsert_sensor_stats(
    conn: &Connection,
    trial_id: &str,
    sensor_tag: &str,
    zoom: &ZoomStats,
    updated_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO sensor_stats (
            trial_id,
            sensor_tag,
            total_duration_ms,
            num_data_points,
            tier_count,
            decimation_factor,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT (trial_id, sensor_tag) DO UPDATE SET
            total_duration_ms = excluded.total_duration_ms,
            num_data_points = excluded.num_data_points,
            tier_count = excluded.tier_count,
            decimation_factor = excluded.decimation_factor,
            updated_at = excluded.updated_at",
        params![
            trial_id,
            sensor_tag,
            zoom.total_duration_ms,
            zoom.num_data_points,
            zoom.tier_count,
            zoom.decimation_factor,
            updated_at.to_rfc3339(),
        ],
    )
    .context("failed to upsert sensor stats")?;
    Ok(())
}

fn select_sensor_stats(
    conn: &Connection,
    trial_id: &str,
    sensor_tag: &str,
) -> Result<Option<SensorStats>> {
    let mut stmt = conn.prepare_cached(
        "SELECT trial_id, sensor_tag, total_duration_ms, num_data_points, tier_count, decimation_factor, updated_at
         FROM sensor_stats
         WHERE trial_id = ?1 AND sensor_tag = ?2",
    )?;

    let mut rows = stmt.query(params![trial_id, sensor_tag])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_stats(row)?)),
        None => Ok(None),
    }
}

/// Stored stats for one sensor, with the same legacy fallback as reading
/// queries.
pub fn get_sensor_stats(
    conn: &Connection,
    trial_id: &str,
    sensor_tag: &str,
) -> Result<Option<SensorStats>> {
    let stats = select_sensor_stats(conn, trial_id, sensor_tag)?;
    if stats.is_some() || trial_id == LEGACY_TRIAL_ID {
        return Ok(stats);
    }
    select_sensor_stats(conn, LEGACY_TRIAL_ID, sensor_tag)
}

/// Derives zoom stats from the stored rows themselves.
///
/// The decimation factor is not recoverable from the rows, so the caller
/// supplies the one the trial was recorded with.
pub fn compute_sensor_stats(
    conn: &Connection,
    trial_id: &str,
    sensor_tag: &str,
    decimation_factor: i32,
) -> Result<ZoomStats> {
    let (count, first, last): (i64, Option<i64>, Option<i64>) = conn
        .query_row(
            "SELECT COUNT(*), MIN(timestamp_ms), MAX(timestamp_ms)
             FROM scalar_readings
             WHERE trial_id = ?1 AND sensor_tag = ?2 AND resolution_tier = 0",
            params![trial_id, sensor_tag],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .context("failed to aggregate tier-0 readings")?;

    let max_tier: Option<i32> = conn
        .query_row(
            "SELECT MAX(resolution_tier) FROM scalar_readings
             WHERE trial_id = ?1 AND sensor_tag = ?2",
            params![trial_id, sensor_tag],
            |row| row.get(0),
        )
        .context("failed to read highest stored tier")?;

    let total_duration_ms = match (first, last) {
        (Some(first), Some(last)) => last - first,
        _ => 0,
    };

    Ok(ZoomStats {
        total_duration_ms,
        num_data_points: count,
        tier_count: max_tier.map_or(0, |tier| tier + 1),
        decimation_factor,
    })
}

impl Database {
    pub async fn upsert_sensor_stats(
        &self,
        trial_id: &str,
        sensor_tag: &str,
        zoom: ZoomStats,
    ) -> Result<()> {
        let trial_id = trial_id.to_string();
        let sensor_tag = sensor_tag.to_string();
        self.execute(move |conn| {
            upsert_sensor_stats(conn, &trial_id, &sensor_tag, &zoom, Utc::now())
        })
        .await
    }

    pub async fn get_sensor_stats(
        &self,
        trial_id: &str,
        sensor_tag: &str,
    ) -> Result<Option<SensorStats>> {
        let trial_id = trial_id.to_string();
        let sensor_tag = sensor_tag.to_string();
        self.execute(move |conn| get_sensor_stats(conn, &trial_id, &sensor_tag))
            .await
    }

    /// Stored stats when present, otherwise stats aggregated from the rows.
    pub async fn zoom_stats_for(
        &self,
        trial_id: &str,
        sensor_tag: &str,
        fallback_decimation_factor: i32,
    ) -> Result<ZoomStats> {
        let trial_id = trial_id.to_string();
        let sensor_tag = sensor_tag.to_string();
        self.execute(move |conn| {
            if let Some(stats) = get_sensor_stats(conn, &trial_id, &sensor_tag)? {
                return Ok(stats.zoom);
            }
            compute_sensor_stats(conn, &trial_id, &sensor_tag, fallback_decimation_factor)
        })
        .await
    }
}
