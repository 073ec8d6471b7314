//! Decode timestamp estimation for streams that only carry PTS.

use std::time::Duration;

const STEP: Duration = Duration::from_millis(1);

/// Estimates a monotonic DTS from the PTS of each arriving access unit.
///
/// With B-frames the PTS sequence goes backwards; a frame whose PTS is
/// below its predecessor's is treated as a B-frame. Only PTS values seen so
/// far are used, so estimation adds no latency.
#[derive(Debug, Clone)]
pub struct DtsEstimator {
    initializing: u8,
    prev_dts: Duration,
    prev_pts: Duration,
    prev_prev_pts: Duration,
}

impl Default for DtsEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl DtsEstimator {
    /// Create an estimator with no history.
    pub fn new() -> Self {
        Self {
            initializing: 2,
            prev_dts: Duration::ZERO,
            prev_pts: Duration::ZERO,
            prev_prev_pts: Duration::ZERO,
        }
    }

    /// Feed the PTS of the next access unit and get its DTS.
    pub fn feed(&mut self, pts: Duration) -> Duration {
        let dts = if self.initializing > 0 {
            self.initializing -= 1;
            self.prev_dts + STEP
        } else if pts > self.prev_pts {
            if self.prev_pts < self.prev_prev_pts {
                // previous frame was a B-frame
                self.prev_pts
            } else {
                self.prev_prev_pts + STEP
            }
        } else {
            self.prev_dts + STEP
        };

        let dts = dts.max(self.prev_dts);

        self.prev_prev_pts = self.prev_pts;
        self.prev_pts = pts;
        self.prev_dts = dts;

        dts
    }
}
