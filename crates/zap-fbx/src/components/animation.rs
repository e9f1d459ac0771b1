//! Clip playback state for a skinned entity.
//!
//! Holds the clip library and a play head. Sampling into bone transforms
//! happens in `systems::animation`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::assets::clip::AnimationClip;

/// Playback state for an entity.
#[derive(Debug, Clone)]
pub struct AnimationComponent {
    /// Named clips available for this entity.
    pub clips: HashMap<String, Arc<AnimationClip>>,
    /// Currently playing clip name.
    pub current: String,
    /// Play head in seconds.
    pub time: f32,
    /// Whether the play head advances.
    pub playing: bool,
    /// Playback speed multiplier (1.0 = normal).
    pub speed: f32,
    /// Wrap at the end instead of holding the last pose.
    pub looping: bool,
    /// Set when the play head moved since the last sample.
    pub(crate) needs_sample: bool,
}

impl Default for AnimationComponent {
    fn default() -> Self {
        Self {
            clips: HashMap::new(),
            current: String::new(),
            time: 0.0,
            playing: true,
            speed: 1.0,
            looping: true,
            needs_sample: true,
        }
    }
}

impl AnimationComponent {
    /// Create with a single clip, playing from the start.
    pub fn single(clip: Arc<AnimationClip>) -> Self {
        let name = clip.name.clone();
        let mut clips = HashMap::new();
        clips.insert(name.clone(), clip);
        Self {
            clips,
            current: name,
            ..Default::default()
        }
    }

    /// Add a clip under its own name.
    pub fn add(&mut self, clip: Arc<AnimationClip>) {
        self.clips.insert(clip.name.clone(), clip);
    }

    /// Play a named clip from the beginning. Unknown names are ignored.
    pub fn play(&mut self, name: &str) {
        if self.clips.contains_key(name) {
            self.current = name.to_string();
            self.time = 0.0;
            self.playing = true;
            self.needs_sample = true;
        }
    }

    /// Play a clip only if it's different from current.
    pub fn play_if_different(&mut self, name: &str) {
        if self.current != name {
            self.play(name);
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn resume(&mut self) {
        self.playing = true;
    }

    /// Stop and rewind to the first frame.
    pub fn stop(&mut self) {
        self.playing = false;
        self.time = 0.0;
        self.needs_sample = true;
    }

    /// Jump to a time, clamped to the clip. NaN is ignored.
    pub fn seek(&mut self, time: f32) {
        if time.is_nan() {
            return;
        }
        let duration = self.current_clip().map_or(0.0, |c| c.duration);
        self.time = time.clamp(0.0, duration);
        self.needs_sample = true;
    }

    pub fn current_clip(&self) -> Option<&Arc<AnimationClip>> {
        self.clips.get(&self.current)
    }

    /// Whether a non-looping clip has reached its end.
    pub fn is_finished(&self) -> bool {
        match self.current_clip() {
            Some(clip) => !self.looping && self.time >= clip.duration,
            None => true,
        }
    }

    /// Advance the play head by `dt` seconds. Returns true if it moved.
    /// A non-finite step (from `dt` or `speed`) leaves the play head alone.
    pub fn tick(&mut self, dt: f32) -> bool {
        if !self.playing {
            return false;
        }
        let step = dt * self.speed;
        if !step.is_finite() {
            log::warn!("animation step {} x {} is not finite; ignored", dt, self.speed);
            return false;
        }
        let Some(duration) = self.current_clip().map(|c| c.duration) else {
            return false;
        };

        if duration <= 0.0 {
            // Single-key clips hold one pose.
            self.time = 0.0;
            return false;
        }

        self.time += step;
        if self.time >= duration {
            if self.looping {
                self.time %= duration;
            } else {
                self.time = duration;
                self.playing = false;
            }
        } else if self.time < 0.0 {
            // Negative speed plays backwards.
            self.time = if self.looping {
                self.time.rem_euclid(duration)
            } else {
                self.playing = false;
                0.0
            };
        }
        self.needs_sample = true;
        true
    }
}
