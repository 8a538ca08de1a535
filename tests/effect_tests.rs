//! Lifecycle Controller Tests
//!
//! Tests for:
//! - Attach / detach registration with the host
//! - State transitions across record, execute and end of frame
//! - Fail-closed behavior for missing dependencies and allocation failures
//! - Fallback environment binding
//! - Disable / re-enable across resolution changes
//! - Teardown

use glam::{UVec2, Vec3};

use ssrt::renderer::device::{LDR_FORMAT, RenderDevice, TextureDesc, TextureKind};
use ssrt::renderer::environment::{CubeFace, DYNAMIC_CUBEMAP_SIZE};
use ssrt::renderer::graph::{InjectionPoint, SsrtPass, TextureTarget};
use ssrt::renderer::headless::{HeadlessDevice, RecordedOp, RecordingExecutor};
use ssrt::renderer::resources::PersistentTarget;
use ssrt::{
    CameraFrame, EffectState, FallbackMethod, FrameOutcome, RenderHost, SsrtEffect, SsrtError, SsrtSettings,
};

const HD: UVec2 = UVec2::new(1920, 1080);
const SMALL: UVec2 = UVec2::new(1280, 720);

/// Frames needed for idle transients of an old shape to age out.
const SETTLE_FRAMES: u64 = 4;

#[derive(Default)]
struct TestHost {
    lists: Vec<(InjectionPoint, &'static str)>,
}

impl RenderHost for TestHost {
    fn add_command_list(&mut self, point: InjectionPoint, name: &'static str) {
        self.lists.push((point, name));
    }

    fn remove_command_list(&mut self, point: InjectionPoint, name: &'static str) {
        self.lists.retain(|entry| *entry != (point, name));
    }
}

fn camera(resolution: UVec2) -> CameraFrame {
    CameraFrame::perspective(Vec3::new(0.0, 2.0, 6.0), Vec3::NEG_Z, Vec3::Y, 60.0, 0.1, 200.0, resolution.x, resolution.y)
}

fn attached(settings: SsrtSettings) -> (SsrtEffect, HeadlessDevice, TestHost) {
    let device = HeadlessDevice::new();
    let mut host = TestHost::default();
    let mut effect = SsrtEffect::new(settings);
    effect.attach(&mut host, &device).unwrap();
    (effect, device, host)
}

/// Records, executes and ends one frame.
fn full_frame(
    effect: &mut SsrtEffect,
    device: &mut HeadlessDevice,
    exec: &mut RecordingExecutor,
    frame: u64,
    resolution: UVec2,
) -> FrameOutcome {
    exec.clear_ops();
    let outcome = effect.on_frame(device, frame, &camera(resolution), true);
    if outcome.is_recorded() {
        effect.execute_all(exec).unwrap();
    }
    effect.end_frame();
    outcome
}

/// Live texture count of a freshly started effect after settling at `resolution`.
fn steady_state_live_count(resolution: UVec2) -> usize {
    let (mut effect, mut device, _host) = attached(SsrtSettings::default());
    let mut exec = RecordingExecutor::new();
    for frame in 0..SETTLE_FRAMES {
        full_frame(&mut effect, &mut device, &mut exec, frame, resolution);
    }
    device.live_count()
}

// ============================================================================
// Attachment
// ============================================================================

#[test]
fn attach_registers_three_lists_in_order() {
    let (effect, _device, host) = attached(SsrtSettings::default());
    assert_eq!(effect.state(), EffectState::AttachedIdle);
    assert_eq!(
        host.lists,
        vec![
            (InjectionPoint::BeforeGBuffer, "ClearBuffer"),
            (InjectionPoint::BeforeLighting, "StoreAmbient"),
            (InjectionPoint::BeforeImageEffectsOpaque, "SSRT"),
        ]
    );
    for point in InjectionPoint::ALL {
        assert!(effect.is_attached_at(point));
    }
}

#[test]
fn attach_twice_is_rejected() {
    let (mut effect, device, mut host) = attached(SsrtSettings::default());
    let err = effect.attach(&mut host, &device).unwrap_err();
    assert!(matches!(
        err,
        SsrtError::InvalidTransition {
            from: EffectState::AttachedIdle,
            ..
        }
    ));
    assert_eq!(host.lists.len(), 3);
}

#[test]
fn attach_without_program_fails_closed() {
    let device = HeadlessDevice::without_program();
    let mut host = TestHost::default();
    let mut effect = SsrtEffect::default();

    assert!(matches!(effect.attach(&mut host, &device), Err(SsrtError::MissingProgram)));
    assert_eq!(effect.state(), EffectState::Detached);
    assert!(host.lists.is_empty());
}

#[test]
fn detach_is_idempotent() {
    let (mut effect, _device, mut host) = attached(SsrtSettings::default());
    effect.detach(&mut host);
    effect.detach(&mut host);
    assert!(host.lists.is_empty());
    assert_eq!(effect.state(), EffectState::Detached);
}

#[test]
fn detach_single_point_keeps_others() {
    let (mut effect, _device, mut host) = attached(SsrtSettings::default());

    effect.detach_point(&mut host, InjectionPoint::BeforeLighting);
    effect.detach_point(&mut host, InjectionPoint::BeforeLighting);
    assert_eq!(host.lists.len(), 2);
    assert!(!effect.is_attached_at(InjectionPoint::BeforeLighting));
    assert_eq!(effect.state(), EffectState::AttachedIdle);

    effect.detach_point(&mut host, InjectionPoint::BeforeGBuffer);
    effect.detach_point(&mut host, InjectionPoint::BeforeImageEffectsOpaque);
    assert_eq!(effect.state(), EffectState::Detached);
    assert!(host.lists.is_empty());
}

#[test]
fn detached_point_is_not_executed() {
    let (mut effect, mut device, mut host) = attached(SsrtSettings::default());
    let mut exec = RecordingExecutor::new();
    effect.detach_point(&mut host, InjectionPoint::BeforeGBuffer);

    effect.on_frame(&mut device, 0, &camera(HD), true);
    effect.execute_all(&mut exec).unwrap();
    assert_eq!(exec.ops.iter().filter(|op| matches!(op, RecordedOp::Clear { .. })).count(), 1);
    assert_eq!(exec.count_pass(SsrtPass::Ssrt), 1);
}

// ============================================================================
// State Transitions
// ============================================================================

#[test]
fn frame_moves_through_recording_and_back_to_idle() {
    let (mut effect, mut device, _host) = attached(SsrtSettings::default());
    let mut exec = RecordingExecutor::new();

    assert!(effect.on_frame(&mut device, 0, &camera(HD), true).is_recorded());
    assert_eq!(effect.state(), EffectState::AttachedRecording);
    assert!(effect.frame_params().is_some());

    effect.execute_all(&mut exec).unwrap();
    assert_eq!(effect.state(), EffectState::AttachedRecording);

    effect.end_frame();
    assert_eq!(effect.state(), EffectState::AttachedIdle);
    assert!(effect.frame_params().is_none());

    // Executing with nothing recorded is a no-op.
    exec.clear_ops();
    effect.execute_all(&mut exec).unwrap();
    assert!(exec.ops.is_empty());
}

#[test]
fn on_frame_while_detached_is_inactive() {
    let mut device = HeadlessDevice::new();
    let mut effect = SsrtEffect::default();
    assert!(matches!(
        effect.on_frame(&mut device, 0, &camera(HD), true),
        FrameOutcome::Inactive
    ));
    assert_eq!(device.total_created(), 0);
}

#[test]
fn execute_while_detached_is_rejected() {
    let mut effect = SsrtEffect::default();
    let mut exec = RecordingExecutor::new();
    let err = effect.execute(InjectionPoint::BeforeImageEffectsOpaque, &mut exec).unwrap_err();
    assert!(matches!(
        err,
        SsrtError::InvalidTransition {
            from: EffectState::Detached,
            action: "execute",
        }
    ));
}

#[test]
fn clear_and_store_ambient_lists_run_at_their_points() {
    let (mut effect, mut device, _host) = attached(SsrtSettings::default());
    let mut exec = RecordingExecutor::new();
    effect.on_frame(&mut device, 0, &camera(HD), true);

    effect.execute(InjectionPoint::BeforeGBuffer, &mut exec).unwrap();
    assert_eq!(
        exec.ops,
        vec![RecordedOp::Clear {
            target: TextureTarget::Camera,
        }]
    );

    exec.clear_ops();
    effect.execute(InjectionPoint::BeforeLighting, &mut exec).unwrap();
    let ambient = effect.resources().unwrap().get(PersistentTarget::Ambient);
    assert_eq!(
        exec.ops,
        vec![
            RecordedOp::Blit {
                source: TextureTarget::Camera,
                destination: TextureTarget::Texture(ambient),
            },
            RecordedOp::Clear {
                target: TextureTarget::Camera,
            },
        ]
    );
}

// ============================================================================
// Failure Handling
// ============================================================================

#[test]
fn missing_program_skips_frame() {
    let (mut effect, mut device, _host) = attached(SsrtSettings::default());
    device.set_program_loaded(false);

    let outcome = effect.on_frame(&mut device, 0, &camera(HD), true);
    assert!(matches!(outcome, FrameOutcome::Skipped(SsrtError::MissingProgram)));
    assert_eq!(effect.state(), EffectState::AttachedIdle);
    assert!(effect.frame_params().is_none());
    assert_eq!(device.total_created(), 0);

    device.set_program_loaded(true);
    assert!(effect.on_frame(&mut device, 1, &camera(HD), true).is_recorded());
}

#[test]
fn allocation_failure_skips_frame_then_recovers() {
    let (mut effect, mut device, _host) = attached(SsrtSettings::default());
    let mut exec = RecordingExecutor::new();

    device.fail_allocations_after(2);
    let outcome = full_frame(&mut effect, &mut device, &mut exec, 0, HD);
    assert!(matches!(outcome, FrameOutcome::Skipped(SsrtError::TextureAllocation { .. })));
    assert!(exec.ops.is_empty());
    assert!(effect.resources().is_none());
    assert_eq!(device.live_count(), 0);

    device.stop_failing();
    for frame in 1..=SETTLE_FRAMES {
        assert!(full_frame(&mut effect, &mut device, &mut exec, frame, HD).is_recorded());
    }
    assert_eq!(device.live_count(), steady_state_live_count(HD));
}

#[test]
fn transient_allocation_failure_does_not_leak() {
    let (mut effect, mut device, _host) = attached(SsrtSettings::default());
    let mut exec = RecordingExecutor::new();
    full_frame(&mut effect, &mut device, &mut exec, 0, HD);

    // Persistent targets (5) succeed, the first new transient fails.
    device.fail_allocations_after(5);
    let outcome = full_frame(&mut effect, &mut device, &mut exec, 1, SMALL);
    assert!(matches!(outcome, FrameOutcome::Skipped(SsrtError::TextureAllocation { .. })));

    device.stop_failing();
    for frame in 2..(2 + SETTLE_FRAMES) {
        assert!(full_frame(&mut effect, &mut device, &mut exec, frame, SMALL).is_recorded());
    }
    assert_eq!(device.live_count(), steady_state_live_count(SMALL));
}

#[test]
fn oversized_resolution_is_reported_not_panicked() {
    let (mut effect, mut device, _host) = attached(SsrtSettings::default());
    device.set_max_dimension(4096);
    let outcome = effect.on_frame(&mut device, 0, &camera(UVec2::new(8192, 4320)), true);
    match outcome {
        FrameOutcome::Skipped(SsrtError::TextureAllocation { width, height, .. }) => {
            assert!(width > 4096 || height > 4096);
        }
        other => panic!("expected allocation failure, got {other:?}"),
    }
}

// ============================================================================
// Fallback Environment
// ============================================================================

#[test]
fn static_fallback_without_cubemap_skips_frame() {
    let settings = SsrtSettings {
        fallback_method: FallbackMethod::StaticIrradianceCubemap,
        ..Default::default()
    };
    let (mut effect, mut device, _host) = attached(settings);

    let outcome = effect.on_frame(&mut device, 0, &camera(HD), true);
    assert!(matches!(outcome, FrameOutcome::Skipped(SsrtError::MissingFallbackCubemap)));
}

#[test]
fn static_fallback_binds_host_cubemap() {
    let settings = SsrtSettings {
        fallback_method: FallbackMethod::StaticIrradianceCubemap,
        ..Default::default()
    };
    let (mut effect, mut device, _host) = attached(settings);
    let cubemap = device
        .create_texture(&TextureDesc::cube("Irradiance", 16, LDR_FORMAT))
        .unwrap();
    effect.set_static_cubemap(Some(cubemap));

    let report = effect.on_frame(&mut device, 0, &camera(HD), true).report().cloned().unwrap();
    assert!(report.environment_capture.is_none());
    assert_eq!(effect.frame_params().unwrap().bindings.fallback_cubemap, Some(cubemap));
    assert_eq!(effect.frame_params().unwrap().uniforms.fallback_method, 1);
    assert!(effect.dynamic_cubemap().is_none());
}

#[test]
fn dynamic_fallback_cycles_faces() {
    let settings = SsrtSettings {
        fallback_method: FallbackMethod::DynamicCubemap,
        ..Default::default()
    };
    let (mut effect, mut device, _host) = attached(settings);
    let mut exec = RecordingExecutor::new();

    let mut faces = Vec::new();
    for frame in 0..12u64 {
        let report = full_frame(&mut effect, &mut device, &mut exec, frame, HD)
            .report()
            .cloned()
            .unwrap();
        let capture = report.environment_capture.unwrap();
        assert_eq!(Some(capture.target), effect.dynamic_cubemap());
        faces.push(capture.face);
    }
    assert_eq!(&faces[..6], &CubeFace::ALL);
    assert_eq!(&faces[6..], &CubeFace::ALL);

    let cubemap = effect.dynamic_cubemap().unwrap();
    let desc = device.desc(cubemap).unwrap();
    assert_eq!(desc.kind, TextureKind::Cube);
    assert_eq!(desc.width, DYNAMIC_CUBEMAP_SIZE);
}

#[test]
fn dynamic_fallback_is_bound_and_released_when_switched_off() {
    let settings = SsrtSettings {
        fallback_method: FallbackMethod::DynamicCubemap,
        ..Default::default()
    };
    let (mut effect, mut device, _host) = attached(settings);
    let mut exec = RecordingExecutor::new();

    exec.clear_ops();
    effect.on_frame(&mut device, 0, &camera(HD), true);
    let cubemap = effect.dynamic_cubemap().unwrap();
    assert_eq!(effect.frame_params().unwrap().bindings.fallback_cubemap, Some(cubemap));
    effect.end_frame();

    effect.settings.fallback_method = FallbackMethod::Off;
    full_frame(&mut effect, &mut device, &mut exec, 1, HD);
    assert!(effect.dynamic_cubemap().is_none());
    assert!(!device.is_live(cubemap));
}

// ============================================================================
// Disable / Re-enable
// ============================================================================

#[test]
fn reenable_after_resolution_change_reallocates_once() {
    let (mut effect, mut device, mut host) = attached(SsrtSettings::default());
    let mut exec = RecordingExecutor::new();

    for frame in 0..3 {
        full_frame(&mut effect, &mut device, &mut exec, frame, HD);
    }
    let generation = effect.resource_generation();
    effect.detach(&mut host);

    // Resolution changes while the effect is off.
    for frame in 3..8 {
        assert!(matches!(
            full_frame(&mut effect, &mut device, &mut exec, frame, SMALL),
            FrameOutcome::Inactive
        ));
    }
    assert_eq!(effect.resource_generation(), generation);

    effect.attach(&mut host, &device).unwrap();
    let report = full_frame(&mut effect, &mut device, &mut exec, 8, SMALL)
        .report()
        .cloned()
        .unwrap();
    assert!(report.reallocated);
    assert!(!report.history_valid);
    assert_eq!(effect.resource_generation(), generation + 1);

    let report = full_frame(&mut effect, &mut device, &mut exec, 9, SMALL)
        .report()
        .cloned()
        .unwrap();
    assert!(!report.reallocated);
}

#[test]
fn resolution_round_trip_returns_to_same_live_count() {
    let (mut effect, mut device, _host) = attached(SsrtSettings::default());
    let mut exec = RecordingExecutor::new();

    let mut frame = 0;
    let mut settle = |effect: &mut SsrtEffect, device: &mut HeadlessDevice, res: UVec2| {
        for _ in 0..SETTLE_FRAMES {
            full_frame(effect, device, &mut exec, frame, res);
            frame += 1;
        }
        device.live_count()
    };

    let before = settle(&mut effect, &mut device, HD);
    settle(&mut effect, &mut device, SMALL);
    let after = settle(&mut effect, &mut device, HD);

    assert_eq!(before, after);
    for role in PersistentTarget::ALL {
        assert_eq!(device.live_with_label(role.label()).count(), 1, "{role:?}");
    }
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn shutdown_releases_everything() {
    let settings = SsrtSettings {
        fallback_method: FallbackMethod::DynamicCubemap,
        ..Default::default()
    };
    let (mut effect, mut device, mut host) = attached(settings);
    let mut exec = RecordingExecutor::new();
    for frame in 0..3 {
        full_frame(&mut effect, &mut device, &mut exec, frame, HD);
    }
    effect.on_frame(&mut device, 3, &camera(HD), true);

    effect.shutdown(&mut host, &mut device);
    assert_eq!(device.live_count(), 0);
    assert_eq!(device.total_created(), device.total_released());
    assert!(host.lists.is_empty());
    assert_eq!(effect.state(), EffectState::Detached);
    assert!(effect.resources().is_none());
    assert!(!effect.temporal().has_history());
}

#[test]
fn shutdown_before_first_frame_is_noop() {
    let (mut effect, mut device, mut host) = attached(SsrtSettings::default());
    effect.shutdown(&mut host, &mut device);
    effect.shutdown(&mut host, &mut device);
    assert_eq!(device.total_released(), 0);
    assert_eq!(effect.state(), EffectState::Detached);
}

#[test]
fn shutdown_leaves_host_cubemap_alive() {
    let settings = SsrtSettings {
        fallback_method: FallbackMethod::StaticIrradianceCubemap,
        ..Default::default()
    };
    let (mut effect, mut device, mut host) = attached(settings);
    let cubemap = device
        .create_texture(&TextureDesc::cube("Irradiance", 16, LDR_FORMAT))
        .unwrap();
    effect.set_static_cubemap(Some(cubemap));
    let mut exec = RecordingExecutor::new();
    full_frame(&mut effect, &mut device, &mut exec, 0, HD);

    effect.shutdown(&mut host, &mut device);
    assert!(device.is_live(cubemap));
    assert_eq!(device.live_count(), 1);
}
