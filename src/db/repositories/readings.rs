use anyhow::{ensure, Context, Result};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};

use crate::db::{
    helpers::numbered_placeholders,
    models::{ScalarReading, LEGACY_TRIAL_ID},
    Database, ReadingPager, ReadingStream,
};
use crate::models::TimeRange;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

const INSERT_READING_SQL: &str = "INSERT INTO scalar_readings (
        trial_id,
        sensor_tag,
        resolution_tier,
        timestamp_ms,
        value
    ) VALUES (?1, ?2, ?3, ?4, ?5)";

fn row_to_reading(row: &Row) -> rusqlite::Result<ScalarReading> {
    Ok(ScalarReading {
        trial_id: row.get("trial_id")?,
        sensor_tag: row.get("sensor_tag")?,
        tier: row.get("resolution_tier")?,
        timestamp_ms: row.get("timestamp_ms")?,
        value: row.get("value")?,
    })
}

fn ensure_finite(reading: &ScalarReading) -> Result<()> {
    ensure!(
        reading.value.is_finite(),
        "refusing non-finite value {} for sensor {} at {}",
        reading.value,
        reading.sensor_tag,
        reading.timestamp_ms
    );
    Ok(())
}

pub fn add_reading(conn: &Connection, reading: &ScalarReading) -> Result<()> {
    ensure_finite(reading)?;
    conn.prepare_cached(INSERT_READING_SQL)?
        .execute(params![
            reading.trial_id,
            reading.sensor_tag,
            reading.tier,
            reading.timestamp_ms,
            reading.value,
        ])
        .context("failed to insert scalar reading")?;
    Ok(())
}

/// Inserts every reading or none of them.
pub fn add_readings_batch(conn: &mut Connection, readings: &[ScalarReading]) -> Result<usize> {
    if readings.is_empty() {
        return Ok(0);
    }

    let tx = conn
        .transaction()
        .context("failed to open reading batch transaction")?;
    {
        let mut stmt = tx.prepare_cached(INSERT_READING_SQL)?;
        for reading in readings {
            // Bailing here drops `tx`, which rolls back the rows already written.
            ensure_finite(reading)?;
            stmt.execute(params![
                reading.trial_id,
                reading.sensor_tag,
                reading.tier,
                reading.timestamp_ms,
                reading.value,
            ])
            .context("failed to insert scalar reading in batch")?;
        }
    }
    tx.commit().context("failed to commit reading batch")?;

    Ok(readings.len())
}

/// One scoped query with no legacy fallback.
///
/// `tier < 0` disables the tier filter; `max_records <= 0` disables the limit.
pub(crate) fn select_readings<S: AsRef<str>>(
    conn: &Connection,
    trial_id: &str,
    tags: &[S],
    range: &TimeRange,
    tier: i32,
    max_records: i64,
) -> Result<Vec<ScalarReading>> {
    if tags.is_empty() || range.is_empty() {
        return Ok(Vec::new());
    }

    let mut sql = format!(
        "SELECT trial_id, sensor_tag, resolution_tier, timestamp_ms, value
         FROM scalar_readings
         WHERE trial_id = ?1
           AND timestamp_ms >= ?2
           AND timestamp_ms <= ?3
           AND sensor_tag IN ({})",
        numbered_placeholders(4, tags.len())
    );

    let mut values = vec![
        Value::Text(trial_id.to_string()),
        Value::Integer(range.lower()),
        Value::Integer(range.upper()),
    ];
    values.extend(tags.iter().map(|tag| Value::Text(tag.as_ref().to_string())));

    if tier >= 0 {
        values.push(Value::Integer(i64::from(tier)));
        sql.push_str(&format!(" AND resolution_tier = ?{}", values.len()));
    }

    let order = range.order().as_sql();
    sql.push_str(&format!(" ORDER BY timestamp_ms {order}, id {order}"));

    if max_records > 0 {
        values.push(Value::Integer(max_records));
        sql.push_str(&format!(" LIMIT ?{}", values.len()));
    }

    let mut stmt = conn
        .prepare_cached(&sql)
        .context("failed to prepare reading query")?;
    let rows = stmt.query_map(params_from_iter(values), row_to_reading)?;

    let mut readings = Vec::new();
    for reading in rows {
        readings.push(reading.context("failed to read scalar reading row")?);
    }

    Ok(readings)
}

/// Range query scoped to `trial_id`, falling back once to the legacy trial
/// when the scoped query matches nothing.
pub fn query_readings<S: AsRef<str>>(
    conn: &Connection,
    trial_id: &str,
    tags: &[S],
    range: TimeRange,
    tier: i32,
    max_records: i64,
) -> Result<Vec<ScalarReading>> {
    let readings = select_readings(conn, trial_id, tags, &range, tier, max_records)?;
    if !readings.is_empty()
        || trial_id == LEGACY_TRIAL_ID
        || tags.is_empty()
        || range.is_empty()
    {
        return Ok(readings);
    }

    log_debug!("no readings for trial {trial_id}, retrying under the legacy trial");
    select_readings(conn, LEGACY_TRIAL_ID, tags, &range, tier, max_records)
}

/// Tag of the earliest reading strictly after `timestamp_ms`.
///
/// Only meaningful while a single sensor records at a time.
pub fn first_tag_after(conn: &Connection, timestamp_ms: i64) -> Result<Option<String>> {
    conn.query_row(
        "SELECT sensor_tag FROM scalar_readings
         WHERE timestamp_ms > ?1
         ORDER BY timestamp_ms ASC, id ASC
         LIMIT 1",
        params![timestamp_ms],
        |row| row.get(0),
    )
    .optional()
    .context("failed to look up first sensor tag")
}

/// Removes the readings of one sensor in `range`, across every tier.
pub fn delete_readings(
    conn: &Connection,
    trial_id: &str,
    sensor_tag: &str,
    range: TimeRange,
) -> Result<usize> {
    if range.is_empty() {
        return Ok(0);
    }

    conn.execute(
        "DELETE FROM scalar_readings
         WHERE trial_id = ?1
           AND sensor_tag = ?2
           AND timestamp_ms >= ?3
           AND timestamp_ms <= ?4",
        params![trial_id, sensor_tag, range.lower(), range.upper()],
    )
    .context("failed to delete scalar readings")
}

pub fn delete_trial_readings(conn: &Connection, trial_id: &str) -> Result<usize> {
    conn.execute(
        "DELETE FROM scalar_readings WHERE trial_id = ?1",
        params![trial_id],
    )
    .context("failed to delete trial readings")
}

/// Keeps only the readings of one sensor inside `keep`, across every tier.
pub fn crop_trial_readings(
    conn: &mut Connection,
    trial_id: &str,
    sensor_tag: &str,
    keep: TimeRange,
) -> Result<usize> {
    let tx = conn
        .transaction()
        .context("failed to open crop transaction")?;

    let removed = if keep.is_empty() {
        tx.execute(
            "DELETE FROM scalar_readings WHERE trial_id = ?1 AND sensor_tag = ?2",
            params![trial_id, sensor_tag],
        )?
    } else {
        tx.execute(
            "DELETE FROM scalar_readings
             WHERE trial_id = ?1
               AND sensor_tag = ?2
               AND (timestamp_ms < ?3 OR timestamp_ms > ?4)",
            params![trial_id, sensor_tag, keep.lower(), keep.upper()],
        )?
    };

    tx.commit().context("failed to commit crop")?;
    Ok(removed)
}

impl Database {
    pub async fn add_reading(&self, reading: ScalarReading) -> Result<()> {
        self.execute(move |conn| add_reading(conn, &reading)).await
    }

    pub async fn add_readings_batch(&self, readings: Vec<ScalarReading>) -> Result<usize> {
        self.execute(move |conn| add_readings_batch(conn, &readings))
            .await
    }

    pub async fn query_readings<S: AsRef<str>>(
        &self,
        trial_id: &str,
        tags: &[S],
        range: TimeRange,
        tier: i32,
        max_records: i64,
    ) -> Result<Vec<ScalarReading>> {
        let trial_id = trial_id.to_string();
        let tags: Vec<String> = tags.iter().map(|tag| tag.as_ref().to_string()).collect();
        self.execute(move |conn| query_readings(conn, &trial_id, &tags, range, tier, max_records))
            .await
    }

    pub async fn first_tag_after(&self, timestamp_ms: i64) -> Result<Option<String>> {
        self.execute(move |conn| first_tag_after(conn, timestamp_ms))
            .await
    }

    pub async fn delete_readings(
        &self,
        trial_id: &str,
        sensor_tag: &str,
        range: TimeRange,
    ) -> Result<usize> {
        let trial_id = trial_id.to_string();
        let sensor_tag = sensor_tag.to_string();
        let removed = self
            .execute(move |conn| delete_readings(conn, &trial_id, &sensor_tag, range))
            .await?;
        log_info!("deleted {removed} readings");
        Ok(removed)
    }

    pub async fn delete_trial_readings(&self, trial_id: &str) -> Result<usize> {
        let trial_id = trial_id.to_string();
        self.execute(move |conn| delete_trial_readings(conn, &trial_id))
            .await
    }

    pub async fn crop_trial_readings(
        &self,
        trial_id: &str,
        sensor_tag: &str,
        keep: TimeRange,
    ) -> Result<usize> {
        let trial_id = trial_id.to_string();
        let sensor_tag = sensor_tag.to_string();
        self.execute(move |conn| crop_trial_readings(conn, &trial_id, &sensor_tag, keep))
            .await
    }

    /// Lazily pages through a range; nothing is queried until the first pull.
    pub fn stream_readings<S: AsRef<str>>(
        &self,
        trial_id: &str,
        tags: &[S],
        range: TimeRange,
        tier: i32,
        page_size: usize,
    ) -> ReadingStream {
        let pager = ReadingPager::new(trial_id, tags, range, tier, page_size);
        ReadingStream::new(self.clone(), pager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_connection, ANY_TIER};
    use crate::models::RangeOrder;

    fn reading(trial: &str, tag: &str, tier: i32, ts: i64, value: f64) -> ScalarReading {
        ScalarReading::new(trial, tag, tier, ts, value)
    }

    fn seed(conn: &mut Connection, trial: &str, tag: &str, tier: i32, stamps: &[i64]) {
        let rows: Vec<_> = stamps
            .iter()
            .map(|&ts| reading(trial, tag, tier, ts, ts as f64 / 10.0))
            .collect();
        add_readings_batch(conn, &rows).unwrap();
    }

    #[test]
    fn single_reading_round_trips() {
        let conn = test_connection();
        add_reading(&conn, &reading("t1", "light", 0, 1234, 42.5)).unwrap();

        let range = TimeRange::closed(1000, 2000);
        let rows = query_readings(&conn, "t1", &["light"], range, 0, 0).unwrap();
        assert_eq!(rows, vec![reading("t1", "light", 0, 1234, 42.5)]);
    }

    #[test]
    fn query_filters_by_tier_tag_and_bounds() {
        let mut conn = test_connection();
        seed(&mut conn, "t1", "light", 0, &[0, 10, 20, 30, 40]);
        seed(&mut conn, "t1", "light", 1, &[0, 40]);
        seed(&mut conn, "t1", "sound", 0, &[5, 15]);

        let middle = TimeRange::closed(10, 30);
        let tier0 = query_readings(&conn, "t1", &["light"], middle, 0, 0).unwrap();
        let stamps: Vec<_> = tier0.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![10, 20, 30]);

        let all = TimeRange::all(RangeOrder::OldestFirst);
        let tier1 = query_readings(&conn, "t1", &["light"], all, 1, 0).unwrap();
        assert_eq!(tier1.len(), 2);
        assert!(tier1.iter().all(|r| r.tier == 1));

        let both = query_readings(
            &conn,
            "t1",
            &["light", "sound"],
            TimeRange::new(0..20, RangeOrder::OldestFirst),
            0,
            0,
        )
        .unwrap();
        let stamps: Vec<_> = both.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![0, 5, 10, 15]);

        let origin = TimeRange::closed(0, 0);
        let any_tier = query_readings(&conn, "t1", &["light"], origin, ANY_TIER, 0).unwrap();
        assert_eq!(any_tier.len(), 2);
    }

    #[test]
    fn newest_first_with_limit_takes_latest_rows() {
        let mut conn = test_connection();
        seed(&mut conn, "t1", "light", 0, &[0, 10, 20, 30, 40]);

        let range = TimeRange::all(RangeOrder::NewestFirst);
        let rows = query_readings(&conn, "t1", &["light"], range, 0, 2).unwrap();
        let stamps: Vec<_> = rows.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![40, 30]);

        let unbounded = query_readings(&conn, "t1", &["light"], range, 0, -1).unwrap();
        assert_eq!(unbounded.len(), 5);
    }

    #[test]
    fn duplicate_timestamps_are_kept_in_insertion_order() {
        let conn = test_connection();
        add_reading(&conn, &reading("t1", "light", 0, 10, 1.0)).unwrap();
        add_reading(&conn, &reading("t1", "light", 0, 10, 2.0)).unwrap();

        let instant = TimeRange::closed(10, 10);
        let rows = query_readings(&conn, "t1", &["light"], instant, 0, 0).unwrap();
        let values: Vec<_> = rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn empty_trial_falls_back_to_legacy_rows() {
        let mut conn = test_connection();
        seed(&mut conn, LEGACY_TRIAL_ID, "light", 0, &[1, 2, 3]);

        let range = TimeRange::closed(0, 10);
        let rows = query_readings(&conn, "unknown-trial", &["light"], range, 0, 0).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.trial_id == LEGACY_TRIAL_ID));
    }

    #[test]
    fn scoped_rows_suppress_the_fallback() {
        let mut conn = test_connection();
        seed(&mut conn, LEGACY_TRIAL_ID, "light", 0, &[1, 2, 3]);
        seed(&mut conn, "t1", "light", 0, &[2]);

        let rows = query_readings(&conn, "t1", &["light"], TimeRange::closed(0, 10), 0, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].trial_id, "t1");
    }

    #[test]
    fn empty_inputs_return_nothing() {
        let mut conn = test_connection();
        seed(&mut conn, LEGACY_TRIAL_ID, "light", 0, &[1]);

        let no_tags: [&str; 0] = [];
        let rows = query_readings(&conn, "t1", &no_tags, TimeRange::closed(0, 10), 0, 0).unwrap();
        assert!(rows.is_empty());
        let rows = query_readings(&conn, "t1", &["light"], TimeRange::closed(10, 0), 0, 0).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn failed_batch_leaves_no_rows_behind() {
        let mut conn = test_connection();
        let batch = vec![
            reading("t1", "light", 0, 10, 1.0),
            reading("t1", "light", 1, 10, 1.0),
            reading("t1", "light", 2, 10, f64::NAN),
        ];

        assert!(add_readings_batch(&mut conn, &batch).is_err());

        let rows = query_readings(
            &conn,
            "t1",
            &["light"],
            TimeRange::all(RangeOrder::OldestFirst),
            ANY_TIER,
            0,
        )
        .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn first_tag_after_picks_the_next_reading() {
        let conn = test_connection();
        add_reading(&conn, &reading("t1", "sound", 0, 50, 1.0)).unwrap();
        add_reading(&conn, &reading("t1", "light", 0, 20, 1.0)).unwrap();

        assert_eq!(first_tag_after(&conn, 0).unwrap().as_deref(), Some("light"));
        assert_eq!(first_tag_after(&conn, 20).unwrap().as_deref(), Some("sound"));
        assert_eq!(first_tag_after(&conn, 50).unwrap(), None);
    }

    #[test]
    fn delete_spans_all_tiers_but_only_the_range() {
        let mut conn = test_connection();
        seed(&mut conn, "t1", "light", 0, &[0, 10, 20]);
        seed(&mut conn, "t1", "light", 1, &[0, 20]);
        seed(&mut conn, "t1", "sound", 0, &[10]);

        let removed = delete_readings(&conn, "t1", "light", TimeRange::closed(0, 10)).unwrap();
        assert_eq!(removed, 3);

        let left = query_readings(
            &conn,
            "t1",
            &["light", "sound"],
            TimeRange::all(RangeOrder::OldestFirst),
            ANY_TIER,
            0,
        )
        .unwrap();
        assert_eq!(left.len(), 3);
    }

    #[test]
    fn crop_keeps_only_the_window() {
        let mut conn = test_connection();
        seed(&mut conn, "t1", "light", 0, &[0, 10, 20, 30]);
        seed(&mut conn, "t1", "light", 1, &[0, 30]);

        let window = TimeRange::closed(5, 25);
        let removed = crop_trial_readings(&mut conn, "t1", "light", window).unwrap();
        assert_eq!(removed, 4);

        let all = TimeRange::all(RangeOrder::OldestFirst);
        let left = query_readings(&conn, "t1", &["light"], all, ANY_TIER, 0).unwrap();
        let stamps: Vec<_> = left.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![10, 20]);

        assert_eq!(delete_trial_readings(&conn, "t1").unwrap(), 2);
    }

    #[tokio::test]
    async fn database_wrappers_use_the_worker_thread() {
        let db = Database::open_in_memory().unwrap();
        db.add_readings_batch(vec![
            reading("t1", "light", 0, 1, 1.0),
            reading("t1", "light", 0, 2, 2.0),
        ])
        .await
        .unwrap();

        let rows = db
            .query_readings("t1", &["light"], TimeRange::closed(0, 5), 0, 0)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(db.first_tag_after(1).await.unwrap().as_deref(), Some("light"));
        assert_eq!(
            db.delete_readings("t1", "light", TimeRange::closed(2, 2)).await.unwrap(),
            1
        );
    }
}
