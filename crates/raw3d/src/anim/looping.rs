//! Loop seam smoothing
//!
//! Frames straddling the seam between the last and the first frame are
//! replaced with a blend so a looping animation does not pop when it wraps.
//! Root keys after the seam are first moved into the yaw frame of the last
//! frame so the blend does not fight accumulated turning, and that yaw is
//! removed again when the blended frames are written back.

use super::Anim;
use crate::error::Result;
use crate::math::{yaw_of, yaw_rotation, KeyFrame};

/// The blend window covers `fps / LOOP_WINDOW_DIVISOR` frames on each side of the seam
pub const LOOP_WINDOW_DIVISOR: u32 = 19;

impl Anim {
    /// Frames on each side of the seam affected by [`Anim::clean_looping_anim`]
    pub fn loop_window(&self) -> usize {
        (self.fps / LOOP_WINDOW_DIVISOR) as usize
    }

    /// Smooth the seam between the last and first frame
    ///
    /// # Returns
    ///
    /// `Ok(false)` without touching the keys when the animation is shorter
    /// than two blend windows or the frame rate is too low for a window.
    pub fn clean_looping_anim(&mut self) -> Result<bool> {
        self.check_grid()?;

        let n = self.bones.len();
        let frames = self.frame_count;
        let window = self.loop_window();
        if n == 0 || window == 0 || frames < 2 * window {
            log::warn!(
                "Animation '{}' with {} frames at {} fps is too short to smooth its loop",
                self.name,
                frames,
                self.fps
            );
            return Ok(false);
        }

        let span = 2 * window;
        let frame_at = |i: usize| (frames + i - window) % frames;

        // Window frames with the post-seam root moved into the last frame's yaw
        let last_root = *self.key(frames - 1, 0);
        let turn = yaw_rotation(yaw_of(last_root.rotation));
        let mut continuous: Vec<KeyFrame> = Vec::with_capacity(span * n);
        for i in 0..span {
            let frame = frame_at(i);
            let start = continuous.len();
            continuous.extend_from_slice(self.frame_keys(frame));
            if frame < window {
                let source = *self.key(frame, 0);
                let root = &mut continuous[start];
                root.rotation = turn * source.rotation;
                root.translation = last_root.translation + turn * source.translation;
                root.translation.y = source.translation.y;
            }
        }

        // Even blend from the first to the last window frame
        let mut blended = vec![KeyFrame::IDENTITY; span * n];
        for i in 0..span {
            let t = (i as f32 + 0.5) / span as f32;
            for b in 0..n {
                blended[i * n + b] = continuous[b].blend(t, &continuous[(span - 1) * n + b]);
            }
        }

        // Progressively narrower blends mixed in at half weight
        for j in 0..window {
            let narrow = 2 * (window - j);
            let last = narrow - 1;
            for i in 0..narrow {
                let t = (i as f32 + 0.5) / narrow as f32;
                for b in 0..n {
                    let target = continuous[j * n + b].blend(t, &continuous[last * n + b]);
                    let slot = &mut blended[(j + i) * n + b];
                    *slot = slot.blend(0.5, &target);
                }
            }
        }

        let last_new = blended[(window - 1) * n];
        let untwist = yaw_rotation(-yaw_of(last_new.rotation));
        for i in 0..span {
            let frame = frame_at(i);
            let row = &mut blended[i * n..(i + 1) * n];
            if frame < window {
                let root = &mut row[0];
                root.rotation = (untwist * root.rotation).normalize();
                let mut offset = root.translation - last_new.translation;
                offset.y = root.translation.y;
                root.translation = untwist * offset;
            }
            self.frame_keys_mut(frame).copy_from_slice(row);
        }

        log::debug!("Smoothed loop seam of '{}' over {} frames", self.name, span);
        Ok(true)
    }
}
