use std::time::Instant;

const FPS_SAMPLE_COUNT: usize = 60;

/// Per-frame clock. The scene either feeds it wall-clock time through
/// [`FrameClock::begin_frame`] or a fixed step through [`FrameClock::advance`]
/// (headless runs and tests).
pub struct FrameClock {
    pub max_dt: f32,
    /// Delta handed to update hooks; zero while paused.
    pub dt: f32,
    /// Unscaled delta of the last frame, also advanced while paused.
    pub real_dt: f32,
    /// Seconds of unpaused time.
    pub elapsed: f64,
    /// Seconds since the clock was created, including paused frames.
    pub real_elapsed: f64,
    pub frame_count: u64,
    paused: bool,
    last_instant: Instant,

    fps_samples: [f32; FPS_SAMPLE_COUNT],
    fps_sample_index: usize,
    pub smoothed_fps: f32,
    pub smoothed_frame_time_ms: f32,
}

impl FrameClock {
    pub fn new(max_dt: f32) -> Self {
        Self {
            max_dt,
            dt: 0.0,
            real_dt: 0.0,
            elapsed: 0.0,
            real_elapsed: 0.0,
            frame_count: 0,
            paused: false,
            last_instant: Instant::now(),
            fps_samples: [1.0 / 60.0; FPS_SAMPLE_COUNT],
            fps_sample_index: 0,
            smoothed_fps: 60.0,
            smoothed_frame_time_ms: 16.667,
        }
    }

    pub fn begin_frame(&mut self) {
        let now = Instant::now();
        let raw = now.duration_since(self.last_instant).as_secs_f32();
        self.last_instant = now;
        self.advance(raw);
    }

    pub fn advance(&mut self, raw_dt: f32) {
        let mut dt = raw_dt.max(0.0);
        if dt > self.max_dt {
            log::debug!(
                "Frame took {:.1}ms, capping to {:.1}ms",
                dt * 1000.0,
                self.max_dt * 1000.0
            );
            dt = self.max_dt;
        }

        self.real_dt = dt;
        self.real_elapsed += dt as f64;
        self.frame_count += 1;
        if self.paused {
            self.dt = 0.0;
        } else {
            self.dt = dt;
            self.elapsed += dt as f64;
        }

        self.fps_samples[self.fps_sample_index] = dt;
        self.fps_sample_index = (self.fps_sample_index + 1) % FPS_SAMPLE_COUNT;
        let avg_dt: f32 = self.fps_samples.iter().sum::<f32>() / FPS_SAMPLE_COUNT as f32;
        self.smoothed_frame_time_ms = avg_dt * 1000.0;
        self.smoothed_fps = if avg_dt > 0.0 { 1.0 / avg_dt } else { 0.0 };
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(0.25)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_frames_report_zero_dt() {
        let mut clock = FrameClock::default();
        clock.advance(0.1);
        clock.pause();
        clock.advance(0.1);
        assert_eq!(clock.dt, 0.0);
        assert!((clock.elapsed - 0.1).abs() < 1e-6);
        assert!((clock.real_elapsed - 0.2).abs() < 1e-6);
        assert_eq!(clock.frame_count, 2);

        clock.resume();
        clock.advance(0.05);
        assert!((clock.dt - 0.05).abs() < 1e-6);
    }

    #[test]
    fn long_frames_are_capped() {
        let mut clock = FrameClock::new(0.1);
        clock.advance(3.0);
        assert!((clock.dt - 0.1).abs() < 1e-6);
    }

    #[test]
    fn fps_converges_to_steady_rate() {
        let mut clock = FrameClock::default();
        for _ in 0..FPS_SAMPLE_COUNT {
            clock.advance(1.0 / 30.0);
        }
        assert!((clock.smoothed_fps - 30.0).abs() < 0.1, "{}", clock.smoothed_fps);
    }
}
