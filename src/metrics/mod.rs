pub mod report;

pub use report::{MetricsReport, OverallMetrics, PerClassMetric, TEST_METRICS_FILE};
