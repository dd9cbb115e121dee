//! Animation clips and keyframe sampling
//!
//! An [`Animation`] maps bone ids to [`AnimationChannel`]s. Each channel holds
//! three independent [`Track`]s (translation, rotation, scale) that are sampled
//! separately and composed as `T * R * S`.

use std::collections::BTreeMap;

use glam::{Mat4, Quat, Vec3};

// ---------------------------------------------------------------------------
// Interpolation
// ---------------------------------------------------------------------------

/// Values that can be blended between two keyframes.
pub trait Interpolate: Copy {
    fn interpolate(&self, other: &Self, t: f32) -> Self;
}

impl Interpolate for Vec3 {
    #[inline]
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        self.lerp(*other, t)
    }
}

impl Interpolate for Quat {
    /// Shortest-arc spherical interpolation.
    #[inline]
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        self.slerp(*other, t).normalize()
    }
}

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

/// A single `(time, value)` key, time in ticks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keyframe<T> {
    pub time: f64,
    pub value: T,
}

impl<T> Keyframe<T> {
    pub fn new(time: f64, value: T) -> Self {
        Self { time, value }
    }
}

/// Time-ordered keyframes for one component of a bone transform.
#[derive(Clone, Debug)]
pub struct Track<T> {
    keys: Vec<Keyframe<T>>,
}

impl<T: Interpolate> Track<T> {
    /// Create a track from keys in any order. Keys are sorted by time (stable).
    pub fn new(mut keys: Vec<Keyframe<T>>) -> Self {
        keys.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
        Self { keys }
    }

    pub fn empty() -> Self {
        Self { keys: Vec::new() }
    }

    pub fn keys(&self) -> &[Keyframe<T>] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Time of the last key, 0 for an empty track.
    pub fn end_time(&self) -> f64 {
        self.keys.last().map(|k| k.time).unwrap_or(0.0)
    }

    /// Sample the track at `time`.
    ///
    /// Empty tracks return `default`, a single key is constant, times outside
    /// the key range clamp to the first/last key.
    pub fn sample(&self, time: f64, default: T) -> T {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return default,
        };

        if self.keys.len() == 1 || time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        for pair in self.keys.windows(2) {
            let (current, next) = (&pair[0], &pair[1]);
            if time >= current.time && time < next.time {
                let span = next.time - current.time;
                let factor = if span > 0.0 { (time - current.time) / span } else { 0.0 };
                if factor <= 0.0 {
                    return current.value;
                }
                return current.value.interpolate(&next.value, factor as f32);
            }
        }

        // NaN time falls through every comparison
        last.value
    }
}

impl<T: Interpolate> Default for Track<T> {
    fn default() -> Self {
        Self::empty()
    }
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Keyframe tracks driving one bone's local transform.
#[derive(Clone, Debug, Default)]
pub struct AnimationChannel {
    pub positions: Track<Vec3>,
    pub rotations: Track<Quat>,
    pub scales: Track<Vec3>,
}

impl AnimationChannel {
    pub fn new(positions: Track<Vec3>, rotations: Track<Quat>, scales: Track<Vec3>) -> Self {
        Self { positions, rotations, scales }
    }

    pub fn position_at(&self, time: f64) -> Vec3 {
        self.positions.sample(time, Vec3::ZERO)
    }

    pub fn rotation_at(&self, time: f64) -> Quat {
        self.rotations.sample(time, Quat::IDENTITY)
    }

    pub fn scale_at(&self, time: f64) -> Vec3 {
        self.scales.sample(time, Vec3::ONE)
    }

    /// Local transform at `time` (ticks): translate * rotate * scale.
    pub fn transform_at(&self, time: f64) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale_at(time),
            self.rotation_at(time),
            self.position_at(time),
        )
    }

    /// Latest key time across the three tracks.
    pub fn end_time(&self) -> f64 {
        self.positions
            .end_time()
            .max(self.rotations.end_time())
            .max(self.scales.end_time())
    }
}

// ---------------------------------------------------------------------------
// Animation
// ---------------------------------------------------------------------------

/// A looping animation over a skeleton's bones.
#[derive(Clone, Debug)]
pub struct Animation {
    pub name: String,
    /// Length in ticks.
    pub duration: f64,
    pub ticks_per_second: f64,
    /// Multiplier applied to elapsed time.
    pub playback_speed: f64,
    /// Playback position in seconds, always in `[0, period)`.
    clock: f64,
    /// Channels keyed by bone id.
    pub channels: BTreeMap<usize, AnimationChannel>,
}

impl Animation {
    pub fn new(name: impl Into<String>, duration: f64, ticks_per_second: f64) -> Self {
        Self {
            name: name.into(),
            duration,
            ticks_per_second,
            playback_speed: 1.0,
            clock: 0.0,
            channels: BTreeMap::new(),
        }
    }

    /// Attach a channel to a bone, replacing any existing one.
    pub fn add_channel(&mut self, bone_id: usize, channel: AnimationChannel) {
        self.channels.insert(bone_id, channel);
    }

    pub fn channel(&self, bone_id: usize) -> Option<&AnimationChannel> {
        self.channels.get(&bone_id)
    }

    /// Length of one loop in seconds, 0 when the animation is degenerate.
    pub fn period_seconds(&self) -> f64 {
        if self.duration > 0.0 && self.ticks_per_second > 0.0 {
            self.duration / self.ticks_per_second
        } else {
            0.0
        }
    }

    /// Current playback position in seconds.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Current playback position in ticks, in `[0, duration)`.
    pub fn current_tick(&self) -> f64 {
        if self.period_seconds() <= 0.0 {
            return 0.0;
        }
        (self.clock * self.ticks_per_second).rem_euclid(self.duration)
    }

    /// Advance the clock by `delta_seconds` and return the wrapped tick time.
    pub fn advance(&mut self, delta_seconds: f64) -> f64 {
        let period = self.period_seconds();
        if period <= 0.0 {
            self.clock = 0.0;
            return 0.0;
        }

        let delta = delta_seconds * self.playback_speed;
        if delta.is_finite() {
            self.clock = (self.clock + delta).rem_euclid(period);
        }
        self.current_tick()
    }

    /// Rewind to the start.
    pub fn reset(&mut self) {
        self.clock = 0.0;
    }

    /// Local transforms for every animated bone at `tick`.
    pub fn sample(&self, tick: f64) -> impl Iterator<Item = (usize, Mat4)> + '_ {
        self.channels
            .iter()
            .map(move |(&bone_id, channel)| (bone_id, channel.transform_at(tick)))
    }
}
