//! Rigid 3D poses
//!
//! A [`Transform`] is a rotation (unit quaternion) plus a translation, an
//! error estimate reported by the tracker, and a validity window. Vendor
//! adapters hand the polling loop a [`RawPose`]; decoding it into a
//! `Transform` is where orientation sanitization happens.

use std::time::{Duration, Instant};

/// Squared quaternion norm below which a received orientation is treated
/// as corrupt and replaced with identity.
pub const DEGENERATE_NORM_SQUARED: f64 = 1e-6;

/// Rotation quaternion, scalar part `w`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    /// Create a quaternion from its components (not normalized)
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Quaternion { x, y, z, w }
    }

    /// Identity rotation
    pub fn identity() -> Self {
        Quaternion::new(0.0, 0.0, 0.0, 1.0)
    }

    pub fn norm_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w
    }

    /// Normalize to unit length.
    ///
    /// Returns the quaternion and `true` when the input was degenerate
    /// (squared norm below [`DEGENERATE_NORM_SQUARED`]) or not finite; in
    /// that case the result is the identity rotation.
    pub fn sanitized(&self) -> (Quaternion, bool) {
        let n2 = self.norm_squared();
        if !n2.is_finite() || n2 < DEGENERATE_NORM_SQUARED {
            return (Quaternion::identity(), true);
        }
        let n = n2.sqrt();
        (
            Quaternion::new(self.x / n, self.y / n, self.z / n, self.w / n),
            false,
        )
    }

    pub fn conjugate(&self) -> Self {
        Quaternion::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Hamilton product `self * other`
    pub fn mul(&self, other: &Quaternion) -> Self {
        let (a, b) = (self, other);
        Quaternion {
            w: a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
            x: a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            y: a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            z: a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
        }
    }

    /// Rotate a vector by this (unit) quaternion
    pub fn rotate(&self, v: [f64; 3]) -> [f64; 3] {
        let p = Quaternion::new(v[0], v[1], v[2], 0.0);
        let r = self.mul(&p).mul(&self.conjugate());
        [r.x, r.y, r.z]
    }

    /// Convert to a 3x3 rotation matrix (row-major)
    pub fn to_matrix(&self) -> [[f64; 3]; 3] {
        let Quaternion { x, y, z, w } = *self;
        [
            [1.0 - 2.0 * (y * y + z * z), 2.0 * (x * y - z * w), 2.0 * (x * z + y * w)],
            [2.0 * (x * y + z * w), 1.0 - 2.0 * (x * x + z * z), 2.0 * (y * z - x * w)],
            [2.0 * (x * z - y * w), 2.0 * (y * z + x * w), 1.0 - 2.0 * (x * x + y * y)],
        ]
    }

    /// Build from a 3x3 rotation matrix (row-major).
    ///
    /// Uses the largest-diagonal branch to stay stable near 180 degrees.
    pub fn from_matrix(m: &[[f64; 3]; 3]) -> Self {
        let trace = m[0][0] + m[1][1] + m[2][2];
        if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Quaternion::new(
                (m[2][1] - m[1][2]) / s,
                (m[0][2] - m[2][0]) / s,
                (m[1][0] - m[0][1]) / s,
                0.25 * s,
            )
        } else if m[0][0] > m[1][1] && m[0][0] > m[2][2] {
            let s = (1.0 + m[0][0] - m[1][1] - m[2][2]).sqrt() * 2.0;
            Quaternion::new(
                0.25 * s,
                (m[0][1] + m[1][0]) / s,
                (m[0][2] + m[2][0]) / s,
                (m[2][1] - m[1][2]) / s,
            )
        } else if m[1][1] > m[2][2] {
            let s = (1.0 + m[1][1] - m[0][0] - m[2][2]).sqrt() * 2.0;
            Quaternion::new(
                (m[0][1] + m[1][0]) / s,
                0.25 * s,
                (m[1][2] + m[2][1]) / s,
                (m[0][2] - m[2][0]) / s,
            )
        } else {
            let s = (1.0 + m[2][2] - m[0][0] - m[1][1]).sqrt() * 2.0;
            Quaternion::new(
                (m[0][2] + m[2][0]) / s,
                (m[1][2] + m[2][1]) / s,
                0.25 * s,
                (m[1][0] - m[0][1]) / s,
            )
        }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Quaternion::identity()
    }
}

/// Pose exactly as a vendor adapter received it, before sanitization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPose {
    /// Orientation, possibly not normalized
    pub rotation: Quaternion,
    /// Translation in millimeters
    pub translation: [f64; 3],
    /// RMS error reported by the tracker (0 when unknown)
    pub error: f64,
}

impl RawPose {
    pub fn new(rotation: Quaternion, translation: [f64; 3], error: f64) -> Self {
        RawPose {
            rotation,
            translation,
            error,
        }
    }

    /// Build from the upper 3x4 part of a homogeneous matrix
    pub fn from_matrix(matrix: &[[f64; 4]; 3]) -> Self {
        let rotation = [
            [matrix[0][0], matrix[0][1], matrix[0][2]],
            [matrix[1][0], matrix[1][1], matrix[1][2]],
            [matrix[2][0], matrix[2][1], matrix[2][2]],
        ];
        RawPose {
            rotation: Quaternion::from_matrix(&rotation),
            translation: [matrix[0][3], matrix[1][3], matrix[2][3]],
            error: 0.0,
        }
    }
}

/// Rigid pose with validity metadata
///
/// Values are built once per polling cycle and never mutated after they
/// are published; every operation returns a new `Transform`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    rotation: Quaternion,
    translation: [f64; 3],
    error: f64,
    start: Instant,
    expiration: Instant,
}

impl Transform {
    /// Create a transform valid for `validity` from now.
    ///
    /// The rotation is normalized; a degenerate rotation becomes identity.
    /// Use [`Transform::from_raw`] when the caller needs to know whether
    /// that substitution happened.
    pub fn new(rotation: Quaternion, translation: [f64; 3], error: f64, validity: Duration) -> Self {
        let (rotation, _) = rotation.sanitized();
        let start = Instant::now();
        Transform {
            rotation,
            translation,
            error,
            start,
            expiration: start + validity,
        }
    }

    /// Identity transform that is already expired
    pub fn identity() -> Self {
        let now = Instant::now();
        Transform {
            rotation: Quaternion::identity(),
            translation: [0.0; 3],
            error: 0.0,
            start: now,
            expiration: now,
        }
    }

    pub fn from_translation(translation: [f64; 3], validity: Duration) -> Self {
        Transform::new(Quaternion::identity(), translation, 0.0, validity)
    }

    /// Decode a raw vendor pose.
    ///
    /// Returns the transform and whether the orientation had to be replaced
    /// with identity.
    pub fn from_raw(raw: &RawPose, validity: Duration) -> (Self, bool) {
        let (rotation, sanitized) = raw.rotation.sanitized();
        let start = Instant::now();
        (
            Transform {
                rotation,
                translation: raw.translation,
                error: raw.error,
                start,
                expiration: start + validity,
            },
            sanitized,
        )
    }

    pub fn rotation(&self) -> Quaternion {
        self.rotation
    }

    pub fn translation(&self) -> [f64; 3] {
        self.translation
    }

    pub fn error(&self) -> f64 {
        self.error
    }

    pub fn start_time(&self) -> Instant {
        self.start
    }

    pub fn expiration_time(&self) -> Instant {
        self.expiration
    }

    pub fn is_valid_at(&self, instant: Instant) -> bool {
        instant >= self.start && instant < self.expiration
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expiration
    }

    /// `self ∘ other`: apply `other` first, then `self`.
    ///
    /// The result is valid over the intersection of both windows and
    /// carries the larger error estimate.
    pub fn compose(&self, other: &Transform) -> Transform {
        let rotated = self.rotation.rotate(other.translation);
        let (rotation, _) = self.rotation.mul(&other.rotation).sanitized();
        Transform {
            rotation,
            translation: [
                rotated[0] + self.translation[0],
                rotated[1] + self.translation[1],
                rotated[2] + self.translation[2],
            ],
            error: self.error.max(other.error),
            start: self.start.max(other.start),
            expiration: self.expiration.min(other.expiration),
        }
    }

    pub fn inverse(&self) -> Transform {
        let rotation = self.rotation.conjugate();
        let t = rotation.rotate(self.translation);
        Transform {
            rotation,
            translation: [-t[0], -t[1], -t[2]],
            ..*self
        }
    }

    /// Upper 3x4 part of the homogeneous matrix
    pub fn to_matrix(&self) -> [[f64; 4]; 3] {
        let r = self.rotation.to_matrix();
        let t = self.translation;
        [
            [r[0][0], r[0][1], r[0][2], t[0]],
            [r[1][0], r[1][1], r[1][2], t[1]],
            [r[2][0], r[2][1], r[2][2], t[2]],
        ]
    }

    /// Same pose with its validity window moved to `[start, start + validity)`
    pub fn with_validity(&self, start: Instant, validity: Duration) -> Transform {
        Transform {
            start,
            expiration: start + validity,
            ..*self
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Transform::identity()
    }
}
