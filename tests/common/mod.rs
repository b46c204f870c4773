#![allow(dead_code)]

use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ferrite_doc::math::Tensor;
use ferrite_doc::network::{parameter_shapes, StateDict};
use ferrite_doc::{Architecture, ModelBundle};

/// Every parameter of `arch` at its expected shape, filled with zeros.
pub fn zero_state(arch: Architecture, num_classes: usize, input_size: usize) -> StateDict {
    let mut net = arch.construct(num_classes, input_size);
    parameter_shapes(&mut net)
        .into_iter()
        .map(|(name, shape)| (name, Tensor::zeros(&shape)))
        .collect()
}

/// Reproducible non-trivial weights: uniform with variance 1/fan_in for
/// weight tensors, identity batch-norm statistics.
pub fn seeded_state(arch: Architecture, num_classes: usize, input_size: usize, seed: u64) -> StateDict {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut net = arch.construct(num_classes, input_size);
    parameter_shapes(&mut net)
        .into_iter()
        .map(|(name, shape)| {
            let mut t = Tensor::zeros(&shape);
            // Batch-norm weights are the only 1-D weights.
            let is_norm_scale = name.ends_with("weight") && shape.len() == 1;
            if name.ends_with("running_var") || is_norm_scale {
                t.data.iter_mut().for_each(|v| *v = 1.0);
            } else if name.ends_with("weight") {
                let fan_in: usize = shape[1..].iter().product();
                let bound = (3.0 / fan_in.max(1) as f32).sqrt();
                t.data.iter_mut().for_each(|v| *v = rng.gen_range(-bound..bound));
            } else if name.ends_with("bias") {
                t.data.iter_mut().for_each(|v| *v = rng.gen_range(-0.1..0.1));
            }
            (name, t)
        })
        .collect()
}

pub fn bundle(arch: Architecture, labels: &[&str], input_size: usize, weights: StateDict) -> ModelBundle {
    ModelBundle {
        architecture_name: arch.name().to_owned(),
        num_classes: labels.len(),
        input_size,
        label_names: labels.iter().map(|s| s.to_string()).collect(),
        weights,
    }
}

pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut out = Vec::new();
    image.write_to(&mut Cursor::new(&mut out), ImageOutputFormat::Png).unwrap();
    out
}

/// JPEG bytes for `image` with an EXIF APP1 segment carrying `orientation`.
pub fn jpeg_with_orientation(image: &DynamicImage, orientation: u16) -> Vec<u8> {
    let mut jpeg = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut jpeg), ImageOutputFormat::Jpeg(95))
        .unwrap();

    // Big-endian TIFF header, one IFD entry: Orientation, SHORT, count 1.
    let mut tiff = b"MM\0*".to_vec();
    tiff.extend_from_slice(&8u32.to_be_bytes());
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x0112u16.to_be_bytes());
    tiff.extend_from_slice(&3u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_be_bytes());

    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(&tiff);
    let mut app1 = vec![0xFF, 0xE1];
    app1.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    app1.extend_from_slice(&payload);

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    out
}
