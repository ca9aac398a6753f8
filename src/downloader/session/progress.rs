//! Progress estimation across finished and in-flight segments

use crate::fetch::TransferProgress;

/// Running byte totals used to weigh partially received segments
#[derive(Debug, Default)]
pub(super) struct ProgressTracker {
    total: usize,
    bytes_done: u64,
    segments_done: usize,
    last_emitted: Option<f32>,
}

impl ProgressTracker {
    pub(super) fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Account for one finished segment of `len` bytes
    pub(super) fn record_segment(&mut self, len: usize) {
        self.bytes_done += len as u64;
        self.segments_done += 1;
    }

    /// Mean finished segment size, the stand-in for unknown lengths
    fn average_segment_len(&self) -> Option<f64> {
        (self.segments_done > 0 && self.bytes_done > 0)
            .then(|| self.bytes_done as f64 / self.segments_done as f64)
    }

    /// Completion in percent: `done` whole segments plus each in-flight
    /// transfer's received fraction (capped at one segment each)
    pub(super) fn percent<'a>(
        &self,
        done: usize,
        inflight: impl IntoIterator<Item = &'a TransferProgress>,
    ) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        let average = self.average_segment_len();
        let partial: f64 = inflight
            .into_iter()
            .map(|transfer| {
                let loaded = transfer.loaded() as f64;
                let expected = transfer.total().map(|t| t as f64).or(average);
                match expected {
                    Some(expected) if expected > 0.0 => (loaded / expected).min(1.0),
                    _ => 0.0,
                }
            })
            .sum();

        let ratio = (done as f64 + partial) / self.total as f64;
        (ratio.clamp(0.0, 1.0) * 100.0) as f32
    }

    /// `percent` if it differs from the last value handed out
    pub(super) fn changed(&mut self, percent: f32) -> Option<f32> {
        if self.last_emitted == Some(percent) {
            return None;
        }
        self.last_emitted = Some(percent);
        Some(percent)
    }
}
