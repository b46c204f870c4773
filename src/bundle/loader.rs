use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::device::Device;
use crate::error::{BundleError, ModelError};
use crate::network::{InferenceModel, StateDict, DEFAULT_ARCHITECTURE};

/// Side length used when a bundle does not declare `img_size`.
pub const DEFAULT_INPUT_SIZE: usize = 384;

/// Field names a bundle's state dict may be stored under, in lookup order.
pub const WEIGHT_ALIASES: [&str; 3] = ["model_state_dict", "model_state", "state_dict"];

/// Largest `num_classes` a bundle may declare.
pub const MAX_NUM_CLASSES: usize = 100_000;

/// Largest `img_size` a bundle may declare.
pub const MAX_INPUT_SIZE: usize = 8192;

/// A persisted model: architecture identity, class metadata and trained
/// parameters. Built once at start-up and never modified.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub architecture_name: String,
    pub num_classes: usize,
    pub input_size: usize,
    pub label_names: Vec<String>,
    pub weights: StateDict,
}

/// On-disk layout written by [`ModelBundle::save_json`].
#[derive(Serialize)]
struct BundleFile<'a> {
    model_name: &'a str,
    num_classes: usize,
    img_size: usize,
    label_names: &'a [String],
    model_state_dict: &'a StateDict,
}

impl ModelBundle {
    /// Reads and validates a bundle from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<ModelBundle, BundleError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BundleError::ArtifactNotFound(path.to_path_buf()));
        }
        let reader = BufReader::new(File::open(path)?);
        let value: Value = serde_json::from_reader(reader)
            .map_err(|e| BundleError::ArtifactMalformed(e.to_string()))?;
        let bundle = ModelBundle::from_value(value)?;
        tracing::info!(
            path = %path.display(),
            architecture = %bundle.architecture_name,
            num_classes = bundle.num_classes,
            input_size = bundle.input_size,
            tensors = bundle.weights.len(),
            "loaded model bundle"
        );
        Ok(bundle)
    }

    /// Validates an already-parsed bundle document.
    pub fn from_value(value: Value) -> Result<ModelBundle, BundleError> {
        let mut fields = match value {
            Value::Object(map) => map,
            other => {
                return Err(BundleError::ArtifactMalformed(format!(
                    "bundle must be a JSON object, found {}",
                    json_kind(&other)
                )))
            }
        };

        let architecture_name = match present(&fields, "model_name") {
            None => DEFAULT_ARCHITECTURE.to_owned(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => return Err(invalid("model_name", format!("expected a string, found {}", json_kind(other)))),
        };

        let num_classes = match present(&fields, "num_classes") {
            None => return Err(BundleError::MissingClassCount),
            Some(v) => positive_int("num_classes", v, MAX_NUM_CLASSES)?,
        };

        let input_size = match present(&fields, "img_size") {
            None => DEFAULT_INPUT_SIZE,
            Some(v) => positive_int("img_size", v, MAX_INPUT_SIZE)?,
        };

        let label_names = match present(&fields, "label_names") {
            None => default_labels(num_classes),
            Some(Value::Array(items)) if items.is_empty() => default_labels(num_classes),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_owned))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| invalid("label_names", "expected an array of strings".into()))?,
            Some(other) => return Err(invalid("label_names", format!("expected an array, found {}", json_kind(other)))),
        };
        if label_names.len() != num_classes {
            return Err(BundleError::LabelCountMismatch { labels: label_names.len(), classes: num_classes });
        }

        let weights = take_state_dict(&mut fields)?;

        Ok(ModelBundle { architecture_name, num_classes, input_size, label_names, weights })
    }

    /// Writes the bundle in the layout `load_json` reads.
    pub fn save_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        let doc = BundleFile {
            model_name: &self.architecture_name,
            num_classes: self.num_classes,
            img_size: self.input_size,
            label_names: &self.label_names,
            model_state_dict: &self.weights,
        };
        serde_json::to_writer(writer, &doc).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Model Builder entry point: constructs the declared architecture and
    /// strictly loads this bundle's weights into it.
    pub fn build_model(&self, device: Device) -> Result<InferenceModel, ModelError> {
        InferenceModel::build(&self.architecture_name, self.num_classes, self.input_size, &self.weights, device)
    }
}

/// A field counts as absent when it is missing or `null`.
fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|v| !v.is_null())
}

/// Accepts integers and integral floats in `1..=max`.
fn positive_int(field: &str, value: &Value, max: usize) -> Result<usize, BundleError> {
    let not_an_int = || invalid(field, format!("expected a positive integer, found {}", value));
    let n = match value.as_u64() {
        Some(n) => n,
        None => {
            let f = value.as_f64().filter(|f| f.is_finite() && f.fract() == 0.0 && *f >= 0.0).ok_or_else(not_an_int)?;
            if f > u32::MAX as f64 {
                return Err(invalid(field, format!("must be at most {}, found {}", max, value)));
            }
            f as u64
        }
    };
    if n == 0 {
        return Err(invalid(field, "must be at least 1".into()));
    }
    match u32::try_from(n).ok().map(|n| n as usize).filter(|&n| n <= max) {
        Some(n) => Ok(n),
        None => Err(invalid(field, format!("must be at most {}, found {}", max, n))),
    }
}

fn default_labels(num_classes: usize) -> Vec<String> {
    (0..num_classes).map(|i| i.to_string()).collect()
}

/// Removes the first non-empty state dict found under [`WEIGHT_ALIASES`].
fn take_state_dict(fields: &mut Map<String, Value>) -> Result<StateDict, BundleError> {
    for alias in WEIGHT_ALIASES {
        let value = match fields.remove(alias) {
            Some(v) => v,
            None => continue,
        };
        match &value {
            Value::Null => continue,
            Value::Object(m) if m.is_empty() => continue,
            Value::Object(_) => {}
            other => return Err(invalid(alias, format!("expected an object, found {}", json_kind(other)))),
        }
        let state: StateDict = serde_json::from_value(value).map_err(|e| invalid(alias, e.to_string()))?;
        if let Some((name, tensor)) = state.iter().find(|(_, t)| !t.is_consistent()) {
            return Err(invalid(
                &format!("{}.{}", alias, name),
                format!("shape {:?} needs {} values, found {}", tensor.shape, tensor.numel(), tensor.data.len()),
            ));
        }
        return Ok(state);
    }
    Err(BundleError::WeightsMissing { aliases: WEIGHT_ALIASES.to_vec() })
}

fn invalid(field: &str, reason: String) -> BundleError {
    BundleError::InvalidField { field: field.to_owned(), reason }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
