//! Error Types
//!
//! This module defines the error types used throughout the SSRT pipeline.
//!
//! # Overview
//!
//! [`SsrtError`] follows the three failure classes of the effect:
//!
//! - **Resource exhaustion**: a render target could not be allocated. The
//!   current frame is skipped; the host keeps whatever it rendered last.
//! - **Missing dependency**: the SSRT shader program or the static fallback
//!   cubemap is absent. The effect fails closed instead of rendering garbage.
//! - **Misuse**: lifecycle calls made in the wrong state, or command lists
//!   that reference targets the frame never bound.
//!
//! Configuration *warnings* (odd resolution combined with downscaling) are
//! not errors; they are logged and reported through
//! [`FrameReport::warnings`](crate::renderer::effect::FrameReport::warnings).

use thiserror::Error;

use crate::renderer::effect::EffectState;

/// The main error type for the SSRT effect.
#[derive(Error, Debug)]
pub enum SsrtError {
    // ========================================================================
    // Resource Exhaustion
    // ========================================================================
    /// A render target could not be created by the device.
    #[error("Failed to allocate render target '{label}' ({width}x{height}): {reason}")]
    TextureAllocation {
        /// Debug label of the requested target
        label: &'static str,
        /// Requested width in pixels
        width: u32,
        /// Requested height in pixels
        height: u32,
        /// Device-specific failure description
        reason: String,
    },

    // ========================================================================
    // Missing Dependencies
    // ========================================================================
    /// The shared SSRT shading program is not available on the device.
    #[error("SSRT shader program is not available")]
    MissingProgram,

    /// Static irradiance fallback was requested but no cubemap is bound.
    #[error("Static fallback requested but no irradiance cubemap is bound")]
    MissingFallbackCubemap,

    // ========================================================================
    // Misuse
    // ========================================================================
    /// A lifecycle call was made from a state that does not allow it.
    #[error("Cannot {action} while the effect is {from:?}")]
    InvalidTransition {
        /// State the effect was in
        from: EffectState,
        /// Attempted operation
        action: &'static str,
    },

    /// A recorded command referenced a target that was not bound this frame.
    #[error("Command references unbound target: {0}")]
    UnresolvedTarget(String),

    // ========================================================================
    // Configuration
    // ========================================================================
    /// Settings could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Alias for `Result<T, SsrtError>`.
pub type Result<T> = std::result::Result<T, SsrtError>;
