use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Standard gravity in m/s².
pub const GRAVITY_EARTH: f32 = 9.80665;
/// Magnitude, in g, a sample has to exceed to count as a shake.
pub const THRESHOLD: f32 = 2.7;
/// Shakes closer together than this (ms) are dropped.
pub const SLOP_TIME: u64 = 700;
/// A pause longer than this (ms) starts a fresh shake count.
pub const RESET_TIME: u64 = 3000;

/// Detector tuning, always the hardcoded defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShakeConfig {
    pub threshold: f32,
    pub slop_time: u64,
    pub reset_time: u64,
}

impl Default for ShakeConfig {
    fn default() -> Self {
        Self {
            threshold: THRESHOLD,
            slop_time: SLOP_TIME,
            reset_time: RESET_TIME,
        }
    }
}

/// A single accelerometer reading in m/s².
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelerationSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl AccelerationSample {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Builds a sample from raw sensor values. Needs at least three finite
    /// components; anything else is not a usable reading.
    pub fn from_values(values: &[f32]) -> Option<Self> {
        match values {
            [x, y, z, ..] if x.is_finite() && y.is_finite() && z.is_finite() => {
                Some(Self::new(*x, *y, *z))
            }
            _ => None,
        }
    }

    /// Magnitude of the reading in units of g.
    pub fn g_force(&self) -> f32 {
        let g_x = (self.x / GRAVITY_EARTH) as f64;
        let g_y = (self.y / GRAVITY_EARTH) as f64;
        let g_z = (self.z / GRAVITY_EARTH) as f64;
        (g_x * g_x + g_y * g_y + g_z * g_z).sqrt() as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShakeEvent {
    /// Shakes in the current burst, starting at 1.
    pub count: u32,
    pub timestamp: u64,
}

/// Turns acceleration samples into discrete shake events.
#[derive(Debug, Clone, Default)]
pub struct ShakeDetector {
    config: ShakeConfig,
    last_shake: Option<u64>,
    count: u32,
}

impl ShakeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn last_shake(&self) -> Option<u64> {
        self.last_shake
    }

    /// Feeds one sample taken at `now` (ms). Returns the shake it triggered.
    pub fn process(&mut self, sample: &AccelerationSample, now: u64) -> Option<ShakeEvent> {
        let g_force = sample.g_force();
        if g_force.is_nan() || g_force <= self.config.threshold {
            return None;
        }

        // debounce before idle reset: a dropped sample must not touch the count
        let elapsed = self.last_shake.map(|last| now.saturating_sub(last));
        match elapsed {
            Some(elapsed) if elapsed < self.config.slop_time => {
                debug!(g_force, elapsed, "shake debounced");
                return None;
            }
            Some(elapsed) if elapsed > self.config.reset_time => self.count = 0,
            None => self.count = 0,
            _ => {}
        }

        self.last_shake = Some(now);
        self.count += 1;
        info!(g_force, count = self.count, "shake");
        Some(ShakeEvent {
            count: self.count,
            timestamp: now,
        })
    }

    /// Like `process`, for raw sensor values that may be malformed.
    pub fn process_values(&mut self, values: &[f32], now: u64) -> Option<ShakeEvent> {
        match AccelerationSample::from_values(values) {
            Some(sample) => self.process(&sample, now),
            None => {
                debug!(?values, "malformed sample dropped");
                None
            }
        }
    }

    /// Polls shake events out of a stream of `(timestamp, sample)` pairs.
    pub fn events<I>(&mut self, samples: I) -> ShakeEvents<'_, I::IntoIter>
    where
        I: IntoIterator<Item = (u64, AccelerationSample)>,
    {
        ShakeEvents {
            detector: self,
            samples: samples.into_iter(),
        }
    }
}

pub struct ShakeEvents<'a, I> {
    detector: &'a mut ShakeDetector,
    samples: I,
}

impl<'a, I> Iterator for ShakeEvents<'a, I>
where
    I: Iterator<Item = (u64, AccelerationSample)>,
{
    type Item = ShakeEvent;

    fn next(&mut self) -> Option<ShakeEvent> {
        for (now, sample) in self.samples.by_ref() {
            if let Some(event) = self.detector.process(&sample, now) {
                return Some(event);
            }
        }
        None
    }
}

/// Wall clock in ms since the epoch, for samples that carry no timestamp.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
