//! SSRT Renderer
//!
//! Components, leaf-first:
//!
//! - [`device`]: GPU allocation seam (`RenderDevice`)
//! - [`resources`]: persistent render targets
//! - [`transient_pool`]: per-frame pooled targets
//! - [`temporal`]: cross-frame history and jitter
//! - [`uniforms`]: per-frame parameter block
//! - [`graph`]: pipeline assembly and replay
//! - [`environment`]: off-screen fallback cubemap
//! - [`effect`]: lifecycle controller
//!
//! Backends: [`headless`] (no GPU) and [`wgpu_backend`].

pub mod device;
pub mod effect;
pub mod environment;
pub mod graph;
pub mod headless;
pub mod resources;
pub mod temporal;
pub mod transient_pool;
pub mod uniforms;
pub mod wgpu_backend;

pub use device::{RenderDevice, TextureDesc, TextureHandle, TextureKind};
pub use effect::{EffectState, FrameOutcome, FrameReport, RenderHost, SsrtEffect};
pub use environment::{CubeFace, FaceCapture, FallbackEnvironment};
pub use headless::{HeadlessDevice, RecordedOp, RecordingExecutor};
pub use resources::{PersistentTarget, ResourceManager, ResourceSet};
pub use temporal::{TemporalJitter, TemporalSample, TemporalState};
pub use uniforms::{FrameParams, ParameterBinder, SsrtUniforms};
