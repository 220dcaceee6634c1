// SPDX-License-Identifier: MIT OR Apache-2.0
//! Piecewise curves used by tone mapping nodes.
//!
//! A curve is a list of keys sorted by time. Between two keys the value is a
//! cubic Hermite segment shaped by the keys' tangents; outside the key range
//! the curve holds the first/last key value.

use serde::{Deserialize, Serialize};

/// A key on a curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    /// Position on the curve domain
    pub time: f32,
    /// Value at this key
    pub value: f32,
    /// Slope arriving at this key
    pub in_tangent: f32,
    /// Slope leaving this key
    pub out_tangent: f32,
}

impl CurveKey {
    /// Create a key with flat tangents
    pub fn new(time: f32, value: f32) -> Self {
        Self {
            time,
            value,
            in_tangent: 0.0,
            out_tangent: 0.0,
        }
    }

    /// Set both tangents
    pub fn with_tangents(mut self, in_tangent: f32, out_tangent: f32) -> Self {
        self.in_tangent = in_tangent;
        self.out_tangent = out_tangent;
        self
    }
}

/// Piecewise Hermite curve
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    keys: Vec<CurveKey>,
}

impl Curve {
    /// Create a curve from keys in any order
    pub fn new(keys: Vec<CurveKey>) -> Self {
        let mut curve = Self { keys };
        curve.sort_keys();
        curve
    }

    /// Straight line through two points, e.g. `linear(0.0, 0.0, 1.0, 1.0)`
    pub fn linear(time_start: f32, value_start: f32, time_end: f32, value_end: f32) -> Self {
        let span = time_end - time_start;
        let slope = if span == 0.0 {
            0.0
        } else {
            (value_end - value_start) / span
        };
        Self::new(vec![
            CurveKey::new(time_start, value_start).with_tangents(slope, slope),
            CurveKey::new(time_end, value_end).with_tangents(slope, slope),
        ])
    }

    /// The identity curve over `[0, 1]`
    pub fn identity() -> Self {
        Self::linear(0.0, 0.0, 1.0, 1.0)
    }

    /// Keys sorted by time
    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    /// Add a key, keeping the keys sorted
    pub fn add_key(&mut self, key: CurveKey) {
        self.keys.push(key);
        self.sort_keys();
    }

    fn sort_keys(&mut self) {
        self.keys.sort_by(|a, b| a.time.total_cmp(&b.time));
    }

    /// Sample the curve. An empty curve evaluates to `0.0`.
    pub fn evaluate(&self, time: f32) -> f32 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return 0.0;
        };

        match self.keys.iter().position(|k| k.time >= time) {
            None => last.value,
            Some(0) => first.value,
            Some(idx) => {
                let a = &self.keys[idx - 1];
                let b = &self.keys[idx];
                let span = b.time - a.time;
                if span.abs() < 0.0001 {
                    return b.value;
                }
                let t = (time - a.time) / span;
                hermite(a.value, a.out_tangent * span, b.value, b.in_tangent * span, t)
            }
        }
    }
}

/// Cubic Hermite basis
fn hermite(p0: f32, m0: f32, p1: f32, m1: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;

    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;

    h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
}
