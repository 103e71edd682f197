use anyhow::{ensure, Context, Result};

use crate::db::{models::ZoomStats, Database};
use crate::recording::{RecordingConfig, ZoomRecorder};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Records one sensor of one trial into the store.
///
/// Each sample's tier-0 reading and whatever higher-tier readings it
/// completes are written in a single batch, so a crash never leaves the
/// tiers disagreeing about which samples exist.
pub struct SensorRecorder {
    db: Database,
    recorder: ZoomRecorder,
}

impl SensorRecorder {
    pub fn new(
        db: Database,
        trial_id: &str,
        sensor_tag: &str,
        config: RecordingConfig,
    ) -> Result<Self> {
        let recorder = ZoomRecorder::new(trial_id, sensor_tag, config)
            .with_context(|| format!("invalid recording config for sensor {sensor_tag}"))?;
        Ok(Self { db, recorder })
    }

    /// Stores one sample. Returns the number of rows written.
    pub async fn record(&mut self, timestamp_ms: i64, value: f64) -> Result<usize> {
        ensure!(
            value.is_finite(),
            "refusing non-finite sample {value} at {timestamp_ms}"
        );

        // Decimation state only advances once the sample is stored.
        let checkpoint = self.recorder.clone();
        let readings = self.recorder.add_sample(timestamp_ms, value);
        let decimated = readings.len() - 1;

        match self.db.add_readings_batch(readings).await {
            Ok(written) => {
                if decimated > 0 {
                    log_debug!(
                        "{}: sample at {timestamp_ms} completed {decimated} decimated readings",
                        self.recorder.sensor_tag()
                    );
                }
                Ok(written)
            }
            Err(err) => {
                self.recorder = checkpoint;
                Err(err)
            }
        }
    }

    pub fn stats(&self) -> ZoomStats {
        self.recorder.stats()
    }

    /// Flushes the partial buckets and stores the sensor's zoom stats.
    pub async fn finish(mut self) -> Result<ZoomStats> {
        let tail = self.recorder.flush();
        let written = self
            .db
            .add_readings_batch(tail)
            .await
            .context("failed to store final decimated readings")?;

        let stats = self.recorder.stats();
        self.db
            .upsert_sensor_stats(self.recorder.trial_id(), self.recorder.sensor_tag(), stats)
            .await?;

        log_info!(
            "Finished recording {} in trial {}: {} samples over {} ms ({} tail readings)",
            self.recorder.sensor_tag(),
            self.recorder.trial_id(),
            stats.num_data_points,
            stats.total_duration_ms,
            written
        );
        Ok(stats)
    }
}
