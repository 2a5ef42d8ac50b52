//! Frame-sequence animation over a sprite-sheet grid.
//!
//! An [`Animation`] pairs an immutable descriptor (image key, grid, frame count,
//! per-frame duration) with mutable playback state. `tick` consumes whole frame
//! durations in a loop so a long hitch catches up several frames in one call.

use serde::{Deserialize, Serialize};

use crate::math::Rect;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationMode {
    #[default]
    Loop,
    PingPong,
    Stop,
    Once,
}

impl AnimationMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "loop" => Some(Self::Loop),
            "pingpong" | "ping_pong" => Some(Self::PingPong),
            "stop" => Some(Self::Stop),
            "once" => Some(Self::Once),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    pub image: String,
    pub rows: u32,
    pub columns: u32,
    pub frame_count: u32,
    /// Seconds per frame.
    pub frame_duration: f32,

    #[serde(skip)]
    pub current_frame: u32,
    #[serde(skip)]
    pub current_time: f32,
    #[serde(skip)]
    pub reversed: bool,
}

impl Animation {
    pub fn new(image: &str, rows: u32, columns: u32, frame_count: u32, frame_duration: f32) -> Self {
        Self {
            image: image.to_string(),
            rows: rows.max(1),
            columns: columns.max(1),
            frame_count,
            frame_duration,
            current_frame: 0,
            current_time: 0.0,
            reversed: false,
        }
    }

    pub fn from_fps(image: &str, rows: u32, columns: u32, frame_count: u32, fps: f32) -> Self {
        let duration = if fps > 0.0 { 1.0 / fps } else { 0.0 };
        Self::new(image, rows, columns, frame_count, duration)
    }

    pub fn is_last_frame(&self) -> bool {
        self.frame_count > 0 && self.current_frame == self.frame_count - 1
    }

    pub fn rewind(&mut self) {
        self.current_frame = 0;
        self.current_time = 0.0;
        self.reversed = false;
    }

    /// Advance playback by `dt` seconds under `mode`.
    pub fn tick(&mut self, dt: f32, mode: AnimationMode) {
        if self.frame_count == 0 || self.frame_duration <= 0.0 {
            return;
        }
        self.current_time += dt;

        match mode {
            AnimationMode::Loop => {
                while self.current_time >= self.frame_duration {
                    self.current_frame = (self.current_frame + 1) % self.frame_count;
                    self.current_time -= self.frame_duration;
                }
            }
            AnimationMode::PingPong => {
                let count = self.frame_count as i64;
                let mut index = self.current_frame as i64;
                while self.current_time >= self.frame_duration {
                    index += if self.reversed { -1 } else { 1 };
                    if index < 0 {
                        index = 1.min(count - 1);
                        self.reversed = false;
                    } else if index >= count {
                        index = (count - 2).max(0);
                        self.reversed = true;
                    }
                    self.current_time -= self.frame_duration;
                }
                self.current_frame = index as u32;
            }
            // Both modes hold on the final frame.
            AnimationMode::Stop | AnimationMode::Once => {
                if self.current_frame < self.frame_count - 1 {
                    while self.current_time >= self.frame_duration
                        && self.current_frame < self.frame_count - 1
                    {
                        self.current_frame += 1;
                        self.current_time -= self.frame_duration;
                    }
                }
            }
        }
    }

    /// Source rectangle of the current frame inside an image of the given size.
    pub fn frame_rect(&self, image_width: u32, image_height: u32) -> Rect {
        let columns = self.columns.max(1);
        let rows = self.rows.max(1);
        let width = (image_width / columns) as f32;
        let height = (image_height / rows) as f32;
        Rect::new(
            (self.current_frame % columns) as f32 * width,
            (self.current_frame / columns) as f32 * height,
            width,
            height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames_after_steps(anim: &mut Animation, mode: AnimationMode, steps: usize) -> Vec<u32> {
        let dt = anim.frame_duration;
        (0..steps)
            .map(|_| {
                anim.tick(dt, mode);
                anim.current_frame
            })
            .collect()
    }

    #[test]
    fn loop_wraps_modulo_frame_count() {
        let mut anim = Animation::new("hero", 1, 4, 4, 0.1);
        let frames = frames_after_steps(&mut anim, AnimationMode::Loop, 6);
        assert_eq!(frames, vec![1, 2, 3, 0, 1, 2]);
    }

    #[test]
    fn ping_pong_bounces_without_repeating_end_frame() {
        let mut anim = Animation::new("hero", 1, 4, 4, 0.25);
        let frames = frames_after_steps(&mut anim, AnimationMode::PingPong, 7);
        assert_eq!(frames, vec![1, 2, 3, 2, 1, 0, 1]);
        assert!(!anim.reversed);
    }

    #[test]
    fn once_and_stop_hold_on_last_frame() {
        for mode in [AnimationMode::Once, AnimationMode::Stop] {
            let mut anim = Animation::new("hero", 1, 3, 3, 0.5);
            let frames = frames_after_steps(&mut anim, mode, 5);
            assert_eq!(frames, vec![1, 2, 2, 2, 2], "mode {mode:?}");
            assert!(anim.is_last_frame());
        }
    }

    #[test]
    fn large_step_catches_up_multiple_frames() {
        let mut anim = Animation::new("hero", 1, 8, 8, 0.1);
        anim.tick(0.55, AnimationMode::Loop);
        assert_eq!(anim.current_frame, 5);
        assert!((anim.current_time - 0.05).abs() < 1e-4);
    }

    #[test]
    fn frame_rect_walks_the_grid_row_major() {
        let mut anim = Animation::new("sheet", 2, 3, 6, 0.1);
        anim.current_frame = 4;
        assert_eq!(anim.frame_rect(96, 64), Rect::new(32.0, 32.0, 32.0, 32.0));
    }

    #[test]
    fn frame_rect_treats_empty_grid_as_single_cell() {
        let mut anim = Animation::new("sheet", 1, 1, 4, 0.1);
        anim.rows = 0;
        anim.columns = 0;
        anim.current_frame = 2;
        assert_eq!(anim.frame_rect(64, 16), Rect::new(0.0, 32.0, 64.0, 16.0));
    }

    #[test]
    fn from_fps_converts_to_duration() {
        let anim = Animation::from_fps("sheet", 1, 1, 1, 20.0);
        assert!((anim.frame_duration - 0.05).abs() < 1e-6);
    }

    #[test]
    fn mode_names_parse_case_insensitively() {
        assert_eq!(AnimationMode::from_name("PingPong"), Some(AnimationMode::PingPong));
        assert_eq!(AnimationMode::from_name("ONCE"), Some(AnimationMode::Once));
        assert_eq!(AnimationMode::from_name("bounce"), None);
    }
}
