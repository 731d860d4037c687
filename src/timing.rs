//! Frame timing instrumentation: smoothed host and device durations and the
//! single-slot timestamp readback.

use std::time::Duration;

use log::trace;

pub const EMA_NEW_WEIGHT: f64 = 0.8;

/// Exponential moving average; the first sample seeds it directly.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Ema {
    value: Option<f64>,
}

impl Ema {
    pub fn update(&mut self, sample: f64) -> f64 {
        let next = match self.value {
            None => sample,
            Some(old) => old * (1.0 - EMA_NEW_WEIGHT) + sample * EMA_NEW_WEIGHT,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTimings {
    frame_time: Ema,
    device_time: Ema,
    host_time: Ema,
}

impl FrameTimings {
    pub fn record_frame(&mut self, delta: Duration) {
        self.frame_time.update(as_millis(delta));
    }

    pub fn record_device(&mut self, delta: Duration) {
        self.device_time.update(as_millis(delta));
    }

    pub fn record_host(&mut self, delta: Duration) {
        self.host_time.update(as_millis(delta));
    }

    pub fn frame_time_ms(&self) -> Option<f64> {
        self.frame_time.value()
    }

    pub fn device_time_ms(&self) -> Option<f64> {
        self.device_time.value()
    }

    pub fn host_time_ms(&self) -> Option<f64> {
        self.host_time.value()
    }
}

fn as_millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapState {
    Unmapped,
    Pending { polls_left: u32 },
    Mapped,
}

/// Host-readable copy of the resolved begin/end timestamps.
///
/// Mirrors a mappable buffer: a copy into it and a map request are only
/// accepted while it is unmapped, mapping completes after a number of
/// device polls, and the contents can be read until it is unmapped again.
#[derive(Clone, Debug)]
pub struct TimestampReadback {
    state: MapState,
    latency_polls: u32,
    contents: [u64; 2],
}

impl TimestampReadback {
    pub fn new(latency_polls: u32) -> Self {
        TimestampReadback {
            state: MapState::Unmapped,
            latency_polls,
            contents: [0; 2],
        }
    }

    pub fn state(&self) -> MapState {
        self.state
    }

    pub fn is_unmapped(&self) -> bool {
        self.state == MapState::Unmapped
    }

    /// Copies resolved timestamps in; refused while a readback is outstanding.
    pub fn copy_from(&mut self, resolved: &[u64; 2]) -> bool {
        if !self.is_unmapped() {
            trace!("timestamp readback busy, skipping copy");
            return false;
        }
        self.contents = *resolved;
        true
    }

    pub fn map_async(&mut self) -> bool {
        if !self.is_unmapped() {
            trace!("timestamp readback busy, skipping map");
            return false;
        }
        self.state = MapState::Pending {
            polls_left: self.latency_polls,
        };
        true
    }

    pub fn poll(&mut self) -> bool {
        match self.state {
            MapState::Pending { polls_left } if polls_left <= 1 => {
                self.state = MapState::Mapped;
                true
            }
            MapState::Pending { polls_left } => {
                self.state = MapState::Pending {
                    polls_left: polls_left - 1,
                };
                false
            }
            MapState::Mapped => true,
            MapState::Unmapped => false,
        }
    }

    pub fn read(&self) -> Option<Duration> {
        match self.state {
            MapState::Mapped => {
                let [begin, end] = self.contents;
                Some(Duration::from_nanos(end.saturating_sub(begin)))
            }
            _ => None,
        }
    }

    pub fn unmap(&mut self) {
        if self.state == MapState::Mapped {
            self.state = MapState::Unmapped;
        }
    }
}
