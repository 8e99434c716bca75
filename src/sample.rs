//! The value type a device produces per tool and per cycle
//!
//! Trackers produce [`Transform`]s and imagers produce [`Frame`]s. Both flow
//! through the same store, polling loop and status reporter, so the
//! operations those components need are collected in [`Sample`].

use crate::config::ToolConfig;
use crate::error::Result;
use crate::frame::{Frame, RawFrame};
use crate::transform::{RawPose, Transform};
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Result of decoding one raw reading
#[derive(Debug, Clone)]
pub struct Decoded<S> {
    pub sample: S,
    /// The orientation was degenerate and has been replaced with identity
    pub sanitized: bool,
}

pub trait Sample: Clone + Debug + Send + Sync + 'static {
    /// Vendor-side representation handed over by an adapter
    type Raw: Clone + Debug + Send + 'static;

    /// Decode a raw reading for `tool`.
    ///
    /// An `Err` rejects the sample for this cycle only.
    fn decode(raw: Self::Raw, tool: &ToolConfig, validity: Duration) -> Result<Decoded<Self>>;

    /// Placeholder reported before anything was published
    fn empty() -> Self;

    fn expiration(&self) -> Instant;

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expiration()
    }

    /// Express `self` in the coordinate frame of `reference`
    fn relative_to(&self, _reference: &Self) -> Self {
        self.clone()
    }
}

impl Sample for Transform {
    type Raw = RawPose;

    /// Sanitize the orientation and apply the tool calibration
    /// (`pose · calibration`).
    fn decode(raw: RawPose, tool: &ToolConfig, validity: Duration) -> Result<Decoded<Self>> {
        let (pose, sanitized) = Transform::from_raw(&raw, validity);
        let sample = match &tool.calibration {
            Some(calibration) => pose
                .compose(&calibration.to_transform(validity))
                .with_validity(pose.start_time(), validity),
            None => pose,
        };
        Ok(Decoded { sample, sanitized })
    }

    fn empty() -> Self {
        Transform::identity()
    }

    fn expiration(&self) -> Instant {
        self.expiration_time()
    }

    /// `reference⁻¹ · self`
    fn relative_to(&self, reference: &Self) -> Self {
        reference.inverse().compose(self)
    }
}

impl Sample for Frame {
    type Raw = RawFrame;

    fn decode(raw: RawFrame, tool: &ToolConfig, validity: Duration) -> Result<Decoded<Self>> {
        Ok(Decoded {
            sample: Frame::from_raw(raw, tool.frame.as_ref(), validity)?,
            sanitized: false,
        })
    }

    fn empty() -> Self {
        Frame::empty()
    }

    fn expiration(&self) -> Instant {
        self.expiration_time()
    }
}
