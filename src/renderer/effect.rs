//! Lifecycle Controller
//!
//! [`SsrtEffect`] wires the pipeline into the host's injection points and
//! orchestrates one frame at a time.
//!
//! # State machine
//!
//! ```text
//!              attach()                on_frame() ok
//!  Detached ──────────────► AttachedIdle ─────────────► AttachedRecording
//!     ▲                        ▲   ▲                       │    │
//!     │        detach()        │   └── end_frame() ────────┘    │
//!     └────────────────────────┴────── on_frame() (auto end) ◄──┘
//! ```
//!
//! # Frame order
//!
//! 1. settings snapshot (clamped)
//! 2. resource reconciliation (history invalidated on reallocation)
//! 3. temporal advance
//! 4. fallback environment refresh
//! 5. parameter binding
//! 6. pipeline assembly and transient allocation
//!
//! Any failure in these steps skips the frame: nothing is recorded, the
//! host keeps its previous output and temporal history does not advance.

use glam::{Mat4, UVec2};
use log::{debug, error, trace, warn};

use crate::camera::CameraFrame;
use crate::errors::{Result, SsrtError};
use crate::renderer::device::{RenderDevice, TextureHandle};
use crate::renderer::environment::{FaceCapture, FallbackEnvironment};
use crate::renderer::graph::{
    ConfigWarning, FrameGraph, InjectionPoint, PassExecutor, PipelineBuilder, ResolvedTargets,
    execute_list, odd_resolution_warning,
};
use crate::renderer::resources::{ResourceManager, ResourceSet};
use crate::renderer::temporal::TemporalState;
use crate::renderer::transient_pool::TransientTexturePool;
use crate::renderer::uniforms::{FrameParams, ParameterBinder};
use crate::settings::{ResolutionDownscale, SsrtSettings};

/// Frames a free transient texture may stay unused before it is released.
pub const TRANSIENT_MAX_IDLE_FRAMES: u32 = 2;

/// Lifecycle state of the effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectState {
    /// No command list is attached to the host.
    Detached,
    /// Attached; no frame is currently recorded.
    AttachedIdle,
    /// Attached; the current frame's lists are ready to execute.
    AttachedRecording,
}

/// The host renderer's command list registry.
pub trait RenderHost {
    fn add_command_list(&mut self, point: InjectionPoint, name: &'static str);

    fn remove_command_list(&mut self, point: InjectionPoint, name: &'static str);
}

/// Summary of a recorded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    /// The persistent target set was (re)allocated this frame.
    pub reallocated: bool,
    /// Whether the temporal pass blends against history this frame.
    pub history_valid: bool,
    pub warnings: Vec<ConfigWarning>,
    /// Cubemap face the host must render this frame (dynamic fallback).
    pub environment_capture: Option<FaceCapture>,
}

/// Result of [`SsrtEffect::on_frame`].
#[derive(Debug)]
pub enum FrameOutcome {
    Recorded(FrameReport),
    /// The frame was skipped; the host keeps its previous output.
    Skipped(SsrtError),
    /// The effect is detached.
    Inactive,
}

impl FrameOutcome {
    #[must_use]
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }

    #[must_use]
    pub fn report(&self) -> Option<&FrameReport> {
        match self {
            Self::Recorded(report) => Some(report),
            _ => None,
        }
    }
}

struct RecordedFrame {
    view_projection: Mat4,
    params: FrameParams,
    resolved: ResolvedTargets,
    temporal_enabled: bool,
    main_executed: bool,
}

/// Screen-space ray-traced AO + GI effect.
pub struct SsrtEffect {
    /// Live configuration; snapshotted at the start of every frame.
    pub settings: SsrtSettings,

    state: EffectState,
    attached: [bool; 3],

    resources: ResourceManager,
    transient_pool: TransientTexturePool,
    temporal: TemporalState,
    builder: PipelineBuilder,
    environment: FallbackEnvironment,

    frame: Option<RecordedFrame>,
    /// Last odd (resolution, downscale) pair that was logged.
    last_warned: Option<(UVec2, ResolutionDownscale)>,
}

impl Default for SsrtEffect {
    fn default() -> Self {
        Self::new(SsrtSettings::default())
    }
}

impl SsrtEffect {
    #[must_use]
    pub fn new(settings: SsrtSettings) -> Self {
        Self {
            settings,
            state: EffectState::Detached,
            attached: [false; 3],
            resources: ResourceManager::new(),
            transient_pool: TransientTexturePool::new(),
            temporal: TemporalState::new(),
            builder: PipelineBuilder::new(),
            environment: FallbackEnvironment::new(),
            frame: None,
            last_warned: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn state(&self) -> EffectState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn is_attached_at(&self, point: InjectionPoint) -> bool {
        self.attached[point.order() as usize]
    }

    /// The persistent target set, if allocated.
    #[must_use]
    pub fn resources(&self) -> Option<&ResourceSet> {
        self.resources.resources()
    }

    #[must_use]
    pub fn resource_generation(&self) -> u64 {
        self.resources.generation()
    }

    /// Command lists of the last recorded frame.
    #[must_use]
    pub fn graph(&self) -> &FrameGraph {
        self.builder.graph()
    }

    #[must_use]
    pub fn temporal(&self) -> &TemporalState {
        &self.temporal
    }

    #[must_use]
    pub fn transient_pool(&self) -> &TransientTexturePool {
        &self.transient_pool
    }

    /// Parameters bound for the frame being recorded.
    #[must_use]
    pub fn frame_params(&self) -> Option<&FrameParams> {
        self.frame.as_ref().map(|f| &f.params)
    }

    /// Role → handle table for the frame being recorded.
    #[must_use]
    pub fn resolved_targets(&self) -> Option<&ResolvedTargets> {
        self.frame.as_ref().map(|f| &f.resolved)
    }

    /// Binds the host's irradiance cubemap for the static fallback.
    pub fn set_static_cubemap(&mut self, cubemap: Option<TextureHandle>) {
        self.environment.set_static_cubemap(cubemap);
    }

    /// Current dynamic fallback cubemap, if any.
    #[must_use]
    pub fn dynamic_cubemap(&self) -> Option<TextureHandle> {
        self.environment.dynamic_cubemap()
    }

    // ========================================================================
    // Attachment
    // ========================================================================

    /// Attaches all command lists to the host.
    ///
    /// Fails closed with [`SsrtError::MissingProgram`] when the shading
    /// program is not loaded.
    pub fn attach(&mut self, host: &mut dyn RenderHost, device: &dyn RenderDevice) -> Result<()> {
        if self.state != EffectState::Detached {
            return Err(SsrtError::InvalidTransition {
                from: self.state,
                action: "attach",
            });
        }
        if !device.has_program() {
            error!("SSRT: shader program not loaded, effect stays detached");
            return Err(SsrtError::MissingProgram);
        }

        for point in InjectionPoint::ALL {
            host.add_command_list(point, point.list_name());
            self.attached[point.order() as usize] = true;
        }
        self.state = EffectState::AttachedIdle;
        debug!("SSRT: attached");
        Ok(())
    }

    /// Detaches every list. Idempotent.
    ///
    /// Persistent resources stay allocated until
    /// [`release_resources`](Self::release_resources).
    pub fn detach(&mut self, host: &mut dyn RenderHost) {
        for point in InjectionPoint::ALL {
            self.detach_point(host, point);
        }
    }

    /// Detaches the list at one injection point. Idempotent.
    pub fn detach_point(&mut self, host: &mut dyn RenderHost, point: InjectionPoint) {
        let slot = point.order() as usize;
        if !self.attached[slot] {
            return;
        }
        host.remove_command_list(point, point.list_name());
        self.attached[slot] = false;

        if self.attached.iter().all(|a| !a) {
            self.end_frame();
            self.state = EffectState::Detached;
            debug!("SSRT: detached");
        }
    }

    // ========================================================================
    // Per-frame
    // ========================================================================

    /// Records the frame's command lists.
    ///
    /// An unfinished previous frame is ended first. Never panics on
    /// resource or dependency failures; those skip the frame.
    pub fn on_frame(
        &mut self,
        device: &mut dyn RenderDevice,
        frame_index: u64,
        camera: &CameraFrame,
        hdr: bool,
    ) -> FrameOutcome {
        if self.state == EffectState::Detached {
            return FrameOutcome::Inactive;
        }
        self.end_frame();

        match self.record_frame(device, frame_index, camera, hdr) {
            Ok(report) => {
                self.state = EffectState::AttachedRecording;
                FrameOutcome::Recorded(report)
            }
            Err(err) => {
                match &err {
                    SsrtError::MissingProgram | SsrtError::MissingFallbackCubemap => {
                        error!("SSRT: frame {frame_index} skipped: {err}");
                    }
                    _ => warn!("SSRT: frame {frame_index} skipped: {err}"),
                }
                FrameOutcome::Skipped(err)
            }
        }
    }

    fn record_frame(
        &mut self,
        device: &mut dyn RenderDevice,
        frame_index: u64,
        camera: &CameraFrame,
        hdr: bool,
    ) -> Result<FrameReport> {
        let settings = self.settings.sanitized();

        if !device.has_program() {
            return Err(SsrtError::MissingProgram);
        }

        let resolution = camera.resolution();
        let downscale = settings.resolution_downscale;

        let mut warnings = Vec::new();
        if let Some(warning) = odd_resolution_warning(resolution, downscale) {
            if self.last_warned != Some((resolution, downscale)) {
                warn!("SSRT: {warning}");
                self.last_warned = Some((resolution, downscale));
            }
            warnings.push(warning);
        }

        let reconciled = match self.resources.reconcile(device, resolution, downscale, hdr) {
            Ok(reconciled) => reconciled,
            Err(err) => {
                self.temporal.invalidate();
                return Err(err);
            }
        };
        if reconciled.reallocated {
            self.temporal.invalidate();
        }

        let view_projection = camera.view_projection();
        let sample = self
            .temporal
            .advance(frame_index, view_projection, downscale.is_downscaled());

        let environment_capture =
            self.environment
                .refresh(device, settings.fallback_method, frame_index, camera)?;
        let fallback = self.environment.binding(settings.fallback_method)?;

        let params = ParameterBinder::bind(&settings, camera, &sample, &reconciled.set, fallback);

        self.transient_pool.reset();
        self.transient_pool.trim(device, TRANSIENT_MAX_IDLE_FRAMES);

        let graph = self.builder.build(&settings, resolution, sample.history_valid);

        let mut resolved = ResolvedTargets::new(reconciled.set);
        for request in graph.lists().flat_map(|list| list.transients.iter()) {
            let id = self.transient_pool.allocate(device, &request.desc)?;
            let handle = self
                .transient_pool
                .handle(id)
                .ok_or_else(|| SsrtError::UnresolvedTarget(request.slot.label().to_string()))?;
            resolved.bind_transient(request.slot, handle);
        }

        trace!(
            "SSRT: recorded frame {frame_index} ({} transients, history {})",
            self.transient_pool.active_count(),
            sample.history_valid
        );

        self.frame = Some(RecordedFrame {
            view_projection,
            params,
            resolved,
            temporal_enabled: settings.temporal_enabled,
            main_executed: false,
        });

        Ok(FrameReport {
            frame_index,
            reallocated: reconciled.reallocated,
            history_valid: sample.history_valid,
            warnings,
            environment_capture,
        })
    }

    /// Replays the list attached at `point`.
    ///
    /// A no-op when the point is detached or the current frame was skipped.
    pub fn execute(&mut self, point: InjectionPoint, executor: &mut dyn PassExecutor) -> Result<()> {
        if self.state == EffectState::Detached {
            return Err(SsrtError::InvalidTransition {
                from: self.state,
                action: "execute",
            });
        }
        if !self.is_attached_at(point) {
            return Ok(());
        }
        let Some(frame) = self.frame.as_mut() else {
            trace!("SSRT: nothing recorded for {}", point.name());
            return Ok(());
        };

        execute_list(self.builder.graph().list(point), &frame.resolved, &frame.params, executor)?;

        if point == InjectionPoint::BeforeImageEffectsOpaque {
            frame.main_executed = true;
        }
        Ok(())
    }

    /// Replays every attached list in injection order.
    pub fn execute_all(&mut self, executor: &mut dyn PassExecutor) -> Result<()> {
        for point in InjectionPoint::ALL {
            self.execute(point, executor)?;
        }
        Ok(())
    }

    /// Finishes the current frame and advances temporal history.
    ///
    /// Temporal state only moves when the main list actually ran; otherwise
    /// the previous matrix stays with the frame that wrote the history. A
    /// no-op when nothing is recorded.
    pub fn end_frame(&mut self) {
        if let Some(frame) = self.frame.take()
            && frame.main_executed
        {
            self.temporal.commit(frame.view_projection, frame.temporal_enabled);
        }
        if self.state == EffectState::AttachedRecording {
            self.state = EffectState::AttachedIdle;
        }
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Releases every GPU allocation the effect owns. Safe to call at any
    /// time, including before the first frame.
    pub fn release_resources(&mut self, device: &mut dyn RenderDevice) {
        self.end_frame();
        self.resources.release_all(device);
        self.transient_pool.release_all(device);
        self.environment.release(device);
        self.temporal.invalidate();
    }

    /// Detaches and releases everything.
    pub fn shutdown(&mut self, host: &mut dyn RenderHost, device: &mut dyn RenderDevice) {
        self.detach(host);
        self.release_resources(device);
    }
}
