mod common;

use std::io::Write;

use ferrite_doc::math::Tensor;
use ferrite_doc::{Architecture, BundleError, Classifier, Device, Error, ModelBundle, ModelError};

use common::{bundle, zero_state};

#[test]
fn saved_bundles_load_back_and_build() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model_complete.json");
    let original = bundle(Architecture::ResNet18, &["invoice", "letter", "form"], 32, zero_state(Architecture::ResNet18, 3, 32));
    original.save_json(&path).unwrap();

    let loaded = ModelBundle::load_json(&path).unwrap();
    assert_eq!(loaded.architecture_name, "resnet18");
    assert_eq!(loaded.num_classes, 3);
    assert_eq!(loaded.input_size, 32);
    assert_eq!(loaded.label_names, original.label_names);
    assert_eq!(loaded.weights.len(), original.weights.len());

    let model = loaded.build_model(Device::Cpu).unwrap();
    assert_eq!(model.num_classes(), 3);
    assert_eq!(model.target_layer().as_deref(), Some("layer4.1"));
}

#[test]
fn missing_and_malformed_artifacts_are_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    assert!(matches!(ModelBundle::load_json(&missing), Err(BundleError::ArtifactNotFound(p)) if p == missing));

    let path = dir.path().join("broken.json");
    std::fs::File::create(&path).unwrap().write_all(b"{\"num_classes\": 4,").unwrap();
    assert!(matches!(ModelBundle::load_json(&path), Err(BundleError::ArtifactMalformed(_))));
}

#[test]
fn weights_and_class_count_are_checked_on_disk_too() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.json");

    std::fs::write(&path, r#"{"model_name": "resnet18", "num_classes": 4}"#).unwrap();
    assert!(matches!(ModelBundle::load_json(&path), Err(BundleError::WeightsMissing { .. })));

    std::fs::write(&path, r#"{"state_dict": {"fc.bias": {"shape": [4], "data": [0, 0, 0, 0]}}}"#).unwrap();
    assert!(matches!(ModelBundle::load_json(&path), Err(BundleError::MissingClassCount)));
}

#[test]
fn strict_loading_rejects_incomplete_or_foreign_weights() {
    let mut weights = zero_state(Architecture::ResNet18, 4, 32);
    weights.remove("layer3.1.bn2.running_mean");
    let err = bundle(Architecture::ResNet18, &["a", "b", "c", "d"], 32, weights).build_model(Device::Cpu).unwrap_err();
    assert!(matches!(err, ModelError::MissingParameter(ref n) if n == "layer3.1.bn2.running_mean"));

    let mut weights = zero_state(Architecture::ResNet18, 4, 32);
    weights.insert("head.weight".into(), Tensor::zeros(&[4, 512]));
    let err = bundle(Architecture::ResNet18, &["a", "b", "c", "d"], 32, weights).build_model(Device::Cpu).unwrap_err();
    assert!(matches!(err, ModelError::UnexpectedParameter(ref n) if n == "head.weight"));

    let mut weights = zero_state(Architecture::ResNet18, 4, 32);
    weights.insert("layer1.0.conv1.weight".into(), Tensor::zeros(&[64, 64, 1, 1]));
    let err = bundle(Architecture::ResNet18, &["a", "b", "c", "d"], 32, weights).build_model(Device::Cpu).unwrap_err();
    match err {
        ModelError::WeightShapeMismatch { name, expected, actual } => {
            assert_eq!(name, "layer1.0.conv1.weight");
            assert_eq!(expected, vec![64, 64, 3, 3]);
            assert_eq!(actual, vec![64, 64, 1, 1]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn batch_counters_from_training_are_ignored() {
    let mut weights = zero_state(Architecture::ResNet18, 2, 32);
    weights.insert("bn1.num_batches_tracked".into(), Tensor::zeros(&[]));
    weights.insert("layer4.1.bn2.num_batches_tracked".into(), Tensor::zeros(&[]));
    assert!(bundle(Architecture::ResNet18, &["a", "b"], 32, weights).build_model(Device::Cpu).is_ok());
}

#[test]
fn unknown_architectures_are_startup_fatal() {
    let mut b = bundle(Architecture::ResNet18, &["a", "b"], 32, zero_state(Architecture::ResNet18, 2, 32));
    b.architecture_name = "vit_base_patch16_384".into();
    let err: Error = b.build_model(Device::Cpu).unwrap_err().into();
    assert!(err.is_startup_fatal());
    assert!(err.to_string().contains("resnet50"), "error lists the supported names: {err}");
}
