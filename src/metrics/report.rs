use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MetricsError;

/// File name the evaluation notebook writes its report to.
pub const TEST_METRICS_FILE: &str = "test_metrics.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallMetrics {
    pub accuracy: f64,
    pub macro_avg_f1: f64,
    pub weighted_avg_f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerClassMetric {
    pub label_id: usize,
    pub label_name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: u64,
}

/// Held-out evaluation results, reshaped for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub overall: OverallMetrics,
    pub per_class: Vec<PerClassMetric>,
}

impl MetricsReport {
    /// Reads a classification report and resolves class names against
    /// `label_names`. Read on every call; the file may be replaced while the
    /// service runs.
    pub fn load(path: impl AsRef<Path>, label_names: &[String]) -> Result<MetricsReport, MetricsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MetricsError::NotFound(path.to_path_buf()));
        }
        let reader = BufReader::new(File::open(path)?);
        let raw: Value = serde_json::from_reader(reader).map_err(|e| MetricsError::Malformed(e.to_string()))?;
        MetricsReport::from_value(&raw, label_names)
    }

    /// Reshapes a `classification_report(output_dict=True)` document.
    ///
    /// Keys made only of digits are per-class rows; `accuracy`, `macro avg`
    /// and `weighted avg` feed the overall block. Missing numbers read as 0.
    /// Rows come back ordered by class index.
    pub fn from_value(raw: &Value, label_names: &[String]) -> Result<MetricsReport, MetricsError> {
        let fields = raw
            .as_object()
            .ok_or_else(|| MetricsError::Malformed("report must be a JSON object".into()))?;

        let f1_of = |key: &str| fields.get(key).map(|avg| number(avg, "f1-score")).unwrap_or(0.0);
        let overall = OverallMetrics {
            accuracy: fields.get("accuracy").and_then(Value::as_f64).unwrap_or(0.0),
            macro_avg_f1: f1_of("macro avg"),
            weighted_avg_f1: f1_of("weighted avg"),
        };

        let mut per_class = Vec::new();
        for (key, row) in fields {
            if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            let label_id: usize = key
                .parse()
                .map_err(|_| MetricsError::Malformed(format!("class key '{key}' is out of range")))?;
            let label_name = label_names.get(label_id).cloned().unwrap_or_else(|| key.clone());
            per_class.push(PerClassMetric {
                label_id,
                label_name,
                precision: number(row, "precision"),
                recall: number(row, "recall"),
                f1_score: number(row, "f1-score"),
                support: number(row, "support").max(0.0) as u64,
            });
        }
        per_class.sort_by_key(|m| m.label_id);

        Ok(MetricsReport { overall, per_class })
    }
}

fn number(row: &Value, key: &str) -> f64 {
    row.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}
