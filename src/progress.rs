use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::timing::FrameTimings;

/// Sample counter shown while accumulating, with the smoothed timings as
/// the message.
pub struct SampleProgress {
    bar: ProgressBar,
}

impl SampleProgress {
    pub fn new(target: u32, visible: bool) -> Self {
        let bar = ProgressBar::new(target as u64);
        if visible {
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(4));
        } else {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:30.cyan/blue}] {pos:>5}/{len:5} samples {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        SampleProgress { bar }
    }

    /// Restarts the bar for a new series.
    pub fn reset(&self, target: u32) {
        self.bar.set_length(target as u64);
        self.bar.reset();
    }

    pub fn update(&self, frame_counter: u32, timings: &FrameTimings) {
        self.bar.set_position(frame_counter as u64);
        self.bar.set_message(format_timings(timings));
    }

    pub fn finish(&self) {
        self.bar.finish();
    }
}

fn metric(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |ms| format!("{ms:.2}ms"))
}

pub fn format_timings(timings: &FrameTimings) -> String {
    format!(
        "frame {} device {} host {}",
        metric(timings.frame_time_ms()),
        metric(timings.device_time_ms()),
        metric(timings.host_time_ms())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn missing_metrics_read_na() {
        let mut timings = FrameTimings::default();
        timings.record_host(Duration::from_micros(1500));
        assert_eq!(format_timings(&timings), "frame n/a device n/a host 1.50ms");
    }
}
