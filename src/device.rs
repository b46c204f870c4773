use std::fmt;

use rayon::prelude::*;

/// Compute device a model is pinned to.
///
/// Selection happens once, at process start, via [`Device::detect`]; the
/// result is passed explicitly to the model builder and preprocessor.
/// Kernels consult it to decide whether per-channel work is spread over the
/// rayon pool or run on the calling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    ParallelCpu { threads: usize },
}

impl Device {
    /// Picks the parallel CPU device when more than one worker is available.
    pub fn detect() -> Device {
        let threads = rayon::current_num_threads();
        let device = if threads > 1 {
            Device::ParallelCpu { threads }
        } else {
            Device::Cpu
        };
        tracing::info!(%device, "selected compute device");
        device
    }

    /// Runs `f(index, chunk)` over consecutive `chunk_len`-sized chunks of
    /// `out`, in parallel on the parallel device.
    pub fn for_each_chunk<F>(&self, out: &mut [f32], chunk_len: usize, f: F)
    where
        F: Fn(usize, &mut [f32]) + Send + Sync,
    {
        if chunk_len == 0 {
            return;
        }
        match self {
            Device::Cpu => out
                .chunks_mut(chunk_len)
                .enumerate()
                .for_each(|(i, chunk)| f(i, chunk)),
            Device::ParallelCpu { .. } => out
                .par_chunks_mut(chunk_len)
                .enumerate()
                .for_each(|(i, chunk)| f(i, chunk)),
        }
    }
}

impl Default for Device {
    fn default() -> Self {
        Device::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::ParallelCpu { threads } => write!(f, "cpu x{}", threads),
        }
    }
}
