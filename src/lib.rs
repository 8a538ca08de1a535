#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Screen-space ray-traced ambient occlusion and one-bounce diffuse GI.
//!
//! The effect reuses the depth, normal and direct-lighting buffers of a
//! deferred renderer and injects three command lists into the host's frame.
//! See [`SsrtEffect`] for the per-frame lifecycle.

pub mod camera;
pub mod errors;
pub mod renderer;
pub mod settings;

pub use camera::CameraFrame;
pub use errors::{Result, SsrtError};
pub use renderer::effect::{EffectState, FrameOutcome, FrameReport, RenderHost, SsrtEffect};
pub use renderer::graph::{InjectionPoint, SsrtPass};
pub use settings::{DebugMode, FallbackMethod, ResolutionDownscale, SsrtPreset, SsrtSettings};

/// Version of the effect.
pub const SSRT_VERSION: &str = "1.0.0";
