//! Temporal State
//!
//! Tracks what the temporal reprojection pass needs from earlier frames:
//! the previous view-projection matrix (and its inverse) and whether the
//! previous-color / previous-depth targets hold usable history.
//!
//! Per-frame jitter comes from two fixed tables (the GTAO rotation and
//! spatial offset sequences), indexed by the host's frame counter.
//!
//! # Lifecycle
//!
//! ```text
//! advance(frame, vp)  ──►  record + execute  ──►  commit(vp, wrote_history)
//!        (pure)                                     previous := vp
//! ```
//!
//! Only frames whose main list ran commit. History simply stops advancing
//! while the effect is disabled or the main list is detached, so the
//! stored matrix always belongs to the frame that wrote the history.

use glam::Mat4;

/// Per-frame rotation angles in degrees.
pub const TEMPORAL_ROTATIONS: [f32; 6] = [60.0, 300.0, 180.0, 240.0, 120.0, 0.0];

/// Per-frame spatial offsets. Only the first two are used when downscaling.
pub const SPATIAL_OFFSETS: [f32; 4] = [0.0, 0.5, 0.25, 0.75];

/// Jitter values for one frame.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct TemporalJitter {
    /// Rotation normalized to `[0, 1)`.
    pub rotation: f32,
    pub spatial_offset: f32,
}

impl TemporalJitter {
    /// Jitter for `frame_index`. The offset table period is 2 when the march
    /// runs downscaled, 4 otherwise.
    #[must_use]
    pub fn for_frame(frame_index: u64, downscaled: bool) -> Self {
        let rotation_slot = (frame_index % TEMPORAL_ROTATIONS.len() as u64) as usize;
        let offset_period: u64 = if downscaled { 2 } else { 4 };
        let offset_slot = (frame_index % offset_period) as usize;
        Self {
            rotation: TEMPORAL_ROTATIONS[rotation_slot] / 360.0,
            spatial_offset: SPATIAL_OFFSETS[offset_slot],
        }
    }
}

/// Everything the temporal pass needs for the current frame.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct TemporalSample {
    pub jitter: TemporalJitter,
    pub previous_view_projection: Mat4,
    pub previous_inverse_view_projection: Mat4,
    /// `false` when the history targets hold nothing usable yet.
    pub history_valid: bool,
}

/// Cross-frame temporal bookkeeping.
#[derive(Clone, Debug, Default)]
pub struct TemporalState {
    previous: Option<(Mat4, Mat4)>,
    history_valid: bool,
}

impl TemporalState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes this frame's temporal inputs without mutating anything.
    ///
    /// On the first frame (or after [`invalidate`](Self::invalidate)) the
    /// previous matrices equal the current ones.
    #[must_use]
    pub fn advance(&self, frame_index: u64, current_view_projection: Mat4, downscaled: bool) -> TemporalSample {
        let (previous_view_projection, previous_inverse_view_projection) = self
            .previous
            .unwrap_or((current_view_projection, current_view_projection.inverse()));

        TemporalSample {
            jitter: TemporalJitter::for_frame(frame_index, downscaled),
            previous_view_projection,
            previous_inverse_view_projection,
            history_valid: self.history_valid && self.previous.is_some(),
        }
    }

    /// Makes `view_projection` the previous frame's matrix.
    ///
    /// Call only for frames whose main list executed. `wrote_history` tells
    /// whether the frame refreshed the previous color/depth targets. A frame
    /// that ran without writing them leaves history that no longer matches
    /// the stored matrix, so history becomes invalid.
    pub fn commit(&mut self, view_projection: Mat4, wrote_history: bool) {
        self.previous = Some((view_projection, view_projection.inverse()));
        self.history_valid = wrote_history;
    }

    /// Discards all history (used after the history targets are reallocated).
    pub fn invalidate(&mut self) {
        self.previous = None;
        self.history_valid = false;
    }

    /// Previous frame's view-projection, if any frame was committed.
    #[must_use]
    pub fn previous_view_projection(&self) -> Option<Mat4> {
        self.previous.map(|(vp, _)| vp)
    }

    /// Whether the history targets hold usable data.
    #[must_use]
    pub fn has_history(&self) -> bool {
        self.history_valid
    }
}
