pub mod aggregator;
pub mod config;
pub mod detector;
pub mod error;
pub mod format;
pub mod gaps;
pub mod geometry;
pub mod normalizer;
pub mod report;
pub mod sensor_stats;
pub mod spatial_index;
pub mod track;
pub mod types;

pub use aggregator::{calculate_stats, DailyStats, FuelStats, TotalStats};
pub use config::{DetectionConfig, ReportConfig, SensorBounds};
pub use detector::{detect_events, EventDetector};
pub use error::{ReportError, ReportResult};
pub use gaps::GapThresholds;
pub use report::{FuelReport, ReportSink};
pub use sensor_stats::{calculate_sensor_stats, SensorStats};
pub use spatial_index::{NearestPoint, SpatialIndex};
pub use types::{Event, EventKind, Observation, RawFuelRecord, RawSensorRecord, SensorSample};
