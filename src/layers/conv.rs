use crate::device::Device;
use crate::layers::{join, Parameterized};
use crate::math::{Tensor, TensorError};

/// 2D convolution without bias or groups, as used throughout ResNet
/// (every convolution there is followed by batch norm).
///
/// Weight layout: `[out_channels, in_channels, kernel, kernel]`.
#[derive(Debug, Clone)]
pub struct Conv2d {
    pub weight: Tensor,
    pub stride: usize,
    pub padding: usize,
}

impl Conv2d {
    pub fn new(in_channels: usize, out_channels: usize, kernel: usize, stride: usize, padding: usize) -> Conv2d {
        Conv2d {
            weight: Tensor::zeros(&[out_channels, in_channels, kernel, kernel]),
            stride,
            padding,
        }
    }

    pub fn out_channels(&self) -> usize {
        self.weight.shape[0]
    }

    pub fn in_channels(&self) -> usize {
        self.weight.shape[1]
    }

    pub fn kernel(&self) -> usize {
        self.weight.shape[2]
    }

    pub fn output_hw(&self, h: usize, w: usize) -> (usize, usize) {
        let k = self.kernel();
        let oh = (h + 2 * self.padding).saturating_sub(k) / self.stride + 1;
        let ow = (w + 2 * self.padding).saturating_sub(k) / self.stride + 1;
        (oh, ow)
    }

    /// Convolves a `[c, h, w]` feature map.
    ///
    /// The input is unfolded into a `[c·k·k, oh·ow]` column matrix (skipped
    /// for 1×1 stride-1 kernels, where the input already has that layout), and
    /// every output channel is an axpy accumulation over its rows.
    pub fn forward(&self, input: &Tensor, device: Device) -> Result<Tensor, TensorError> {
        let (c, h, w) = input.chw()?;
        if c != self.in_channels() {
            return Err(TensorError::LengthMismatch {
                shape: input.shape.clone(),
                expected: self.in_channels(),
                actual: c,
            });
        }
        let k = self.kernel();
        let (oh, ow) = self.output_hw(h, w);
        let plane = oh * ow;
        let rows = c * k * k;

        let unfolded;
        let columns: &[f32] = if k == 1 && self.stride == 1 && self.padding == 0 {
            &input.data
        } else {
            unfolded = self.im2col(input, oh, ow);
            &unfolded
        };

        let mut out = Tensor::zeros(&[self.out_channels(), oh, ow]);
        device.for_each_chunk(&mut out.data, plane, |o, acc| {
            let filter = &self.weight.data[o * rows..(o + 1) * rows];
            for (r, &wv) in filter.iter().enumerate() {
                if wv == 0.0 {
                    continue;
                }
                let col = &columns[r * plane..(r + 1) * plane];
                for (a, &x) in acc.iter_mut().zip(col.iter()) {
                    *a += wv * x;
                }
            }
        });
        Ok(out)
    }

    fn im2col(&self, input: &Tensor, oh: usize, ow: usize) -> Vec<f32> {
        let (c, h, w) = (input.shape[0], input.shape[1], input.shape[2]);
        let k = self.kernel();
        let plane = oh * ow;
        let mut cols = vec![0.0f32; c * k * k * plane];
        for ch in 0..c {
            let src = &input.data[ch * h * w..(ch + 1) * h * w];
            for ky in 0..k {
                for kx in 0..k {
                    let row = (ch * k + ky) * k + kx;
                    let dst = &mut cols[row * plane..(row + 1) * plane];
                    for oy in 0..oh {
                        let iy = (oy * self.stride + ky) as isize - self.padding as isize;
                        if iy < 0 || iy >= h as isize {
                            continue;
                        }
                        let src_row = &src[iy as usize * w..(iy as usize + 1) * w];
                        for ox in 0..ow {
                            let ix = (ox * self.stride + kx) as isize - self.padding as isize;
                            if ix >= 0 && ix < w as isize {
                                dst[oy * ow + ox] = src_row[ix as usize];
                            }
                        }
                    }
                }
            }
        }
        cols
    }
}

impl Parameterized for Conv2d {
    fn parameters_mut<'a>(&'a mut self, prefix: &str, out: &mut Vec<(String, &'a mut Tensor)>) {
        out.push((join(prefix, "weight"), &mut self.weight));
    }
}
