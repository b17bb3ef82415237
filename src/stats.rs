use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Frames averaged for the FPS readout.
const MAX_FRAME_SAMPLES: usize = 30;

/// Rolling frame-time average.
pub struct FrameStats {
    frame_times: VecDeque<Duration>,
    last_frame: Instant,
    pub frames: u64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameStats {
    pub fn new() -> Self {
        Self {
            frame_times: VecDeque::with_capacity(MAX_FRAME_SAMPLES + 1),
            last_frame: Instant::now(),
            frames: 0,
        }
    }

    /// Mark the end of a frame.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.record(now.duration_since(self.last_frame));
        self.last_frame = now;
    }

    pub fn record(&mut self, frame_time: Duration) {
        self.frames += 1;
        self.frame_times.push_back(frame_time);
        if self.frame_times.len() > MAX_FRAME_SAMPLES {
            self.frame_times.pop_front();
        }
    }

    pub fn average(&self) -> Duration {
        if self.frame_times.is_empty() {
            return Duration::ZERO;
        }
        self.frame_times.iter().sum::<Duration>() / self.frame_times.len() as u32
    }

    pub fn fps(&self) -> f64 {
        let avg = self.average().as_secs_f64();
        if avg > 0.0 { 1.0 / avg } else { 0.0 }
    }
}
