pub mod readings;
pub mod sensor_stats;
