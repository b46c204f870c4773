use crate::activation::argmax;
use crate::device::Device;
use crate::inference::classifier::ClassActivation;
use crate::layers::{
    global_avg_pool, global_avg_pool_backward, join, BatchNorm2d, Conv2d, Linear, MaxPool2d, Parameterized,
};
use crate::activation::ActivationFunction;
use crate::math::{Tensor, TensorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Two 3×3 convolutions (ResNet-18/34).
    Basic,
    /// 1×1 → 3×3 → 1×1 with 4× channel expansion (ResNet-50 and up).
    Bottleneck,
}

impl BlockKind {
    fn expansion(&self) -> usize {
        match self {
            BlockKind::Basic => 1,
            BlockKind::Bottleneck => 4,
        }
    }
}

/// Depth layout of one ResNet variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResNetConfig {
    pub block: BlockKind,
    pub depths: [usize; 4],
}

const STAGE_WIDTHS: [usize; 4] = [64, 128, 256, 512];

/// Handle naming the block whose output class-activation mapping reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialBlock {
    pub stage: usize,
    pub index: usize,
}

impl SpatialBlock {
    /// PyTorch-style module path, e.g. `layer4.2`.
    pub fn path(&self) -> String {
        format!("layer{}.{}", self.stage, self.index)
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Downsample {
    conv: Conv2d,
    bn: BatchNorm2d,
}

impl Downsample {
    fn forward(&self, x: &Tensor, device: Device) -> Result<Tensor, TensorError> {
        let mut out = self.conv.forward(x, device)?;
        self.bn.forward_inplace(&mut out, false)?;
        Ok(out)
    }
}

impl Parameterized for Downsample {
    fn parameters_mut<'a>(&'a mut self, prefix: &str, out: &mut Vec<(String, &'a mut Tensor)>) {
        self.conv.parameters_mut(&join(prefix, "0"), out);
        self.bn.parameters_mut(&join(prefix, "1"), out);
    }

    fn refresh(&mut self) {
        self.bn.refresh();
    }
}

/// One residual block. `convs[i]` is followed by `norms[i]`; every pair but
/// the last is followed by a ReLU, and the last ReLU comes after the skip
/// connection is added.
#[derive(Debug, Clone)]
struct Block {
    convs: Vec<Conv2d>,
    norms: Vec<BatchNorm2d>,
    downsample: Option<Downsample>,
}

impl Block {
    fn new(kind: BlockKind, in_planes: usize, planes: usize, stride: usize) -> Block {
        let out_planes = planes * kind.expansion();
        let convs = match kind {
            BlockKind::Basic => vec![
                Conv2d::new(in_planes, planes, 3, stride, 1),
                Conv2d::new(planes, planes, 3, 1, 1),
            ],
            BlockKind::Bottleneck => vec![
                Conv2d::new(in_planes, planes, 1, 1, 0),
                Conv2d::new(planes, planes, 3, stride, 1),
                Conv2d::new(planes, out_planes, 1, 1, 0),
            ],
        };
        let norms = convs.iter().map(|c| BatchNorm2d::new(c.out_channels())).collect();
        let downsample = if stride != 1 || in_planes != out_planes {
            Some(Downsample {
                conv: Conv2d::new(in_planes, out_planes, 1, stride, 0),
                bn: BatchNorm2d::new(out_planes),
            })
        } else {
            None
        };
        Block { convs, norms, downsample }
    }

    fn forward(&self, x: &Tensor, device: Device) -> Result<Tensor, TensorError> {
        let last = self.convs.len() - 1;
        let mut out = x.clone();
        for (i, (conv, norm)) in self.convs.iter().zip(self.norms.iter()).enumerate() {
            out = conv.forward(&out, device)?;
            norm.forward_inplace(&mut out, i != last)?;
        }
        match &self.downsample {
            Some(ds) => out.add_assign(&ds.forward(x, device)?)?,
            None => out.add_assign(x)?,
        }
        out.map_inplace(|v| if v > 0.0 { v } else { 0.0 });
        Ok(out)
    }
}

impl Parameterized for Block {
    fn parameters_mut<'a>(&'a mut self, prefix: &str, out: &mut Vec<(String, &'a mut Tensor)>) {
        for (i, (conv, norm)) in self.convs.iter_mut().zip(self.norms.iter_mut()).enumerate() {
            conv.parameters_mut(&join(prefix, &format!("conv{}", i + 1)), out);
            norm.parameters_mut(&join(prefix, &format!("bn{}", i + 1)), out);
        }
        if let Some(ds) = self.downsample.as_mut() {
            ds.parameters_mut(&join(prefix, "downsample"), out);
        }
    }

    fn refresh(&mut self) {
        self.norms.iter_mut().for_each(|n| n.refresh());
        if let Some(ds) = self.downsample.as_mut() {
            ds.refresh();
        }
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// ResNet with the torchvision/timm module layout, so checkpoints exported
/// from either load by name.
#[derive(Debug, Clone)]
pub struct ResNet {
    conv1: Conv2d,
    bn1: BatchNorm2d,
    maxpool: MaxPool2d,
    stages: Vec<Vec<Block>>,
    fc: Linear,
}

impl ResNet {
    pub fn new(config: ResNetConfig, num_classes: usize) -> ResNet {
        let mut in_planes = 64;
        let mut stages = Vec::with_capacity(4);
        for (stage, (&planes, &depth)) in STAGE_WIDTHS.iter().zip(config.depths.iter()).enumerate() {
            let mut blocks = Vec::with_capacity(depth);
            for i in 0..depth {
                let stride = if stage > 0 && i == 0 { 2 } else { 1 };
                blocks.push(Block::new(config.block, in_planes, planes, stride));
                in_planes = planes * config.block.expansion();
            }
            stages.push(blocks);
        }
        ResNet {
            conv1: Conv2d::new(3, 64, 7, 2, 3),
            bn1: BatchNorm2d::new(64),
            maxpool: MaxPool2d { kernel: 3, stride: 2, padding: 1 },
            stages,
            fc: Linear::new(in_planes, num_classes, ActivationFunction::Identity),
        }
    }

    /// The last residual block of the last stage (`layer4[-1]`).
    pub fn final_spatial_block(&self) -> Option<SpatialBlock> {
        let stage = self.stages.len();
        let depth = self.stages.last()?.len();
        if depth == 0 {
            return None;
        }
        Some(SpatialBlock { stage, index: depth - 1 })
    }

    /// Stem plus all four stages: the output of `layer4[-1]`.
    pub fn forward_features(&self, x: &Tensor, device: Device) -> Result<Tensor, TensorError> {
        let mut out = self.conv1.forward(x, device)?;
        self.bn1.forward_inplace(&mut out, true)?;
        out = self.maxpool.forward(&out)?;
        for block in self.stages.iter().flatten() {
            out = block.forward(&out, device)?;
        }
        Ok(out)
    }

    pub fn forward(&self, x: &Tensor, device: Device) -> Result<Vec<f32>, TensorError> {
        let features = self.forward_features(x, device)?;
        self.fc.forward(&global_avg_pool(&features)?, device)
    }

    /// Forward pass that keeps the final block's activations, then a backward
    /// pass from the chosen logit through the head (average pool and `fc`)
    /// back to those activations. The gradient buffer is allocated here and
    /// handed to the caller; no state on `self` is touched.
    pub fn class_activation(
        &self,
        x: &Tensor,
        class: Option<usize>,
        device: Device,
    ) -> Result<ClassActivation, TensorError> {
        let activations = self.forward_features(x, device)?;
        let (_, h, w) = activations.chw()?;
        let logits = self.fc.forward(&global_avg_pool(&activations)?, device)?;

        let target_class = class.or_else(|| argmax(&logits)).unwrap_or(0);
        let mut grad_logits = vec![0.0f32; logits.len()];
        if let Some(g) = grad_logits.get_mut(target_class) {
            *g = 1.0;
        }
        let grad_pooled = self.fc.backward_input(&grad_logits);
        let gradients = global_avg_pool_backward(&grad_pooled, h, w);

        Ok(ClassActivation { target_class, logits, activations, gradients })
    }
}

impl Parameterized for ResNet {
    fn parameters_mut<'a>(&'a mut self, prefix: &str, out: &mut Vec<(String, &'a mut Tensor)>) {
        self.conv1.parameters_mut(&join(prefix, "conv1"), out);
        self.bn1.parameters_mut(&join(prefix, "bn1"), out);
        for (s, blocks) in self.stages.iter_mut().enumerate() {
            for (i, block) in blocks.iter_mut().enumerate() {
                block.parameters_mut(&join(prefix, &format!("layer{}.{}", s + 1, i)), out);
            }
        }
        self.fc.parameters_mut(&join(prefix, "fc"), out);
    }

    fn refresh(&mut self) {
        self.bn1.refresh();
        self.stages.iter_mut().flatten().for_each(|b| b.refresh());
    }
}
