//! Data-parallel compute device backed by a rayon thread pool.

use std::time::{Duration, Instant};

use log::{debug, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::accumulation::{blend_running_mean, AccumulationBuffer};
use crate::error::RenderError;
use crate::rendering::PixelKernel;
use crate::timing::TimestampReadback;

pub const WORKGROUP_SIZE_X: u32 = 16;
pub const WORKGROUP_SIZE_Y: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub timestamp_query: bool,
}

#[derive(Clone, Debug)]
pub struct DeviceDescriptor {
    pub capabilities: DeviceCapabilities,
    pub threads: usize,
    pub readback_latency: u32,
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        DeviceDescriptor {
            capabilities: DeviceCapabilities {
                timestamp_query: true,
            },
            threads: 0,
            readback_latency: 1,
        }
    }
}

struct TimestampQueries {
    query_set: [u64; 2],
    resolve_buffer: [u64; 2],
    readback: TimestampReadback,
}

pub struct CpuDevice {
    pool: ThreadPool,
    capabilities: DeviceCapabilities,
    epoch: Instant,
    timestamps: Option<TimestampQueries>,
}

impl CpuDevice {
    pub fn new(descriptor: &DeviceDescriptor) -> Result<Self, RenderError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(descriptor.threads)
            .thread_name(|i| format!("lane-worker-{i}"))
            .build()?;
        let capabilities = descriptor.capabilities;
        let timestamps = if capabilities.timestamp_query {
            Some(TimestampQueries {
                query_set: [0; 2],
                resolve_buffer: [0; 2],
                readback: TimestampReadback::new(descriptor.readback_latency),
            })
        } else {
            warn!("timestamp queries unavailable, device time will not be reported");
            None
        };
        debug!("compute device with {} lanes", pool.current_num_threads());
        Ok(CpuDevice {
            pool,
            capabilities,
            epoch: Instant::now(),
            timestamps,
        })
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn timestamp(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Runs `kernel` once for every pixel and folds the result into the
    /// running mean as sample number `sample_count`. Each task covers one
    /// row of workgroups, walking it tile by tile.
    pub fn dispatch<K: PixelKernel>(
        &mut self,
        kernel: &K,
        buffer: &mut AccumulationBuffer,
        sample_count: u32,
    ) -> Duration {
        let begin_instant = Instant::now();
        let begin = self.timestamp();
        let width = buffer.width() as usize;
        let height = buffer.height() as usize;
        let band_len = width * WORKGROUP_SIZE_Y as usize;
        let (image, rngs) = buffer.lanes_mut();

        if band_len > 0 {
            self.pool.install(|| {
                image
                    .par_chunks_mut(band_len)
                    .zip(rngs.par_chunks_mut(band_len))
                    .enumerate()
                    .for_each(|(band, (pixels, lane_rngs))| {
                        let rows = pixels.len() / width;
                        let y0 = band * WORKGROUP_SIZE_Y as usize;
                        for tile_x in (0..width).step_by(WORKGROUP_SIZE_X as usize) {
                            let tile_end = (tile_x + WORKGROUP_SIZE_X as usize).min(width);
                            for row in 0..rows {
                                for x in tile_x..tile_end {
                                    let i = row * width + x;
                                    let sample =
                                        kernel.shade(x as u32, (y0 + row) as u32, &mut lane_rngs[i]);
                                    pixels[i] = blend_running_mean(&pixels[i], &sample, sample_count);
                                }
                            }
                        }
                    });
            });
        }
        debug_assert!(image.len() == width * height);

        let end = self.timestamp();
        if let Some(queries) = self.timestamps.as_mut() {
            queries.query_set = [begin, end.max(begin)];
        }
        begin_instant.elapsed()
    }

    /// Resolves the query set and, if the readback slot is free, copies the
    /// timestamps into it and requests a map. Skips while a map is pending.
    pub fn submit_timestamp_readback(&mut self) -> bool {
        let Some(queries) = self.timestamps.as_mut() else {
            return false;
        };
        queries.resolve_buffer = queries.query_set;
        if !queries.readback.is_unmapped() {
            return false;
        }
        queries.readback.copy_from(&queries.resolve_buffer) && queries.readback.map_async()
    }

    /// Polls an outstanding readback; yields the device duration once the
    /// map completes and releases the slot.
    pub fn poll(&mut self) -> Option<Duration> {
        let queries = self.timestamps.as_mut()?;
        if !queries.readback.poll() {
            return None;
        }
        let elapsed = queries.readback.read();
        queries.readback.unmap();
        elapsed
    }

    pub fn readback_pending(&self) -> bool {
        self.timestamps
            .as_ref()
            .map(|q| !q.readback.is_unmapped())
            .unwrap_or(false)
    }
}
