//! Resource Manager Tests
//!
//! Tests for:
//! - Downscaled target dimensions for every tier
//! - Reallocation only when the target shape changes
//! - Formats per role and HDR mode
//! - Leak freedom across resolution round trips and failed allocations
//! - Teardown before any allocation

use glam::UVec2;

use ssrt::renderer::device::{DEPTH_FORMAT, HALF_FORMAT, HDR_FORMAT, LDR_FORMAT, RenderDevice};
use ssrt::renderer::headless::HeadlessDevice;
use ssrt::renderer::resources::{PersistentTarget, ResourceManager};
use ssrt::settings::ResolutionDownscale;
use ssrt::SsrtError;

fn size_of(device: &HeadlessDevice, manager: &ResourceManager, role: PersistentTarget) -> UVec2 {
    let handle = manager.resources().unwrap().get(role);
    device.desc(handle).unwrap().size()
}

// ============================================================================
// Dimensions
// ============================================================================

#[test]
fn downscaled_targets_are_floor_of_resolution_over_factor() {
    for resolution in [UVec2::new(1920, 1080), UVec2::new(1921, 1081), UVec2::new(1366, 767)] {
        for downscale in ResolutionDownscale::ALL {
            let mut device = HeadlessDevice::new();
            let mut manager = ResourceManager::new();
            manager.reconcile(&mut device, resolution, downscale, true).unwrap();

            let expected = resolution / downscale.factor();
            assert_eq!(size_of(&device, &manager, PersistentTarget::BentNormal), expected);
            assert_eq!(size_of(&device, &manager, PersistentTarget::GiOcclusion), expected);
            assert_eq!(manager.resources().unwrap().downscaled_size(), expected);

            for role in [
                PersistentTarget::Ambient,
                PersistentTarget::PreviousColor,
                PersistentTarget::PreviousDepth,
            ] {
                assert_eq!(size_of(&device, &manager, role), resolution, "{role:?} at {downscale:?}");
            }
        }
    }
}

#[test]
fn tiny_resolution_never_produces_zero_sized_targets() {
    let mut device = HeadlessDevice::new();
    let mut manager = ResourceManager::new();
    manager
        .reconcile(&mut device, UVec2::new(5, 3), ResolutionDownscale::Eighth, false)
        .unwrap();
    assert_eq!(size_of(&device, &manager, PersistentTarget::BentNormal), UVec2::ONE);
}

#[test]
fn formats_follow_role_and_hdr_mode() {
    for (hdr, ambient) in [(true, HDR_FORMAT), (false, LDR_FORMAT)] {
        let mut device = HeadlessDevice::new();
        let mut manager = ResourceManager::new();
        let set = manager
            .reconcile(&mut device, UVec2::new(640, 480), ResolutionDownscale::Half, hdr)
            .unwrap()
            .set;

        let format = |role| device.desc(set.get(role)).unwrap().format;
        assert_eq!(format(PersistentTarget::BentNormal), HALF_FORMAT);
        assert_eq!(format(PersistentTarget::GiOcclusion), HDR_FORMAT);
        assert_eq!(format(PersistentTarget::Ambient), ambient);
        assert_eq!(format(PersistentTarget::PreviousColor), HDR_FORMAT);
        assert_eq!(format(PersistentTarget::PreviousDepth), DEPTH_FORMAT);
    }
}

#[test]
fn gi_and_history_stay_hdr_in_ldr_mode() {
    let mut device = HeadlessDevice::new();
    let mut manager = ResourceManager::new();
    let set = manager
        .reconcile(&mut device, UVec2::new(1280, 720), ResolutionDownscale::Full, false)
        .unwrap()
        .set;

    for role in [PersistentTarget::GiOcclusion, PersistentTarget::PreviousColor] {
        assert_eq!(device.desc(set.get(role)).unwrap().format, HDR_FORMAT, "{role:?}");
    }
}

// ============================================================================
// Reallocation
// ============================================================================

#[test]
fn reallocates_only_when_shape_changes() {
    let mut device = HeadlessDevice::new();
    let mut manager = ResourceManager::new();
    let res = UVec2::new(1920, 1080);

    assert!(manager.reconcile(&mut device, res, ResolutionDownscale::Half, true).unwrap().reallocated);
    for _ in 0..10 {
        let r = manager.reconcile(&mut device, res, ResolutionDownscale::Half, true).unwrap();
        assert!(!r.reallocated);
    }
    assert_eq!(manager.generation(), 1);
    assert_eq!(device.total_created(), 5);

    assert!(
        manager
            .reconcile(&mut device, res, ResolutionDownscale::Quarter, true)
            .unwrap()
            .reallocated
    );
    assert!(
        manager
            .reconcile(&mut device, UVec2::new(1280, 720), ResolutionDownscale::Quarter, true)
            .unwrap()
            .reallocated
    );
    assert!(
        manager
            .reconcile(&mut device, UVec2::new(1280, 720), ResolutionDownscale::Quarter, false)
            .unwrap()
            .reallocated
    );
    assert_eq!(manager.generation(), 4);
    assert_eq!(device.live_count(), 5);
}

#[test]
fn full_resolution_change_reallocates_even_with_same_downscaled_size() {
    let mut device = HeadlessDevice::new();
    let mut manager = ResourceManager::new();
    manager
        .reconcile(&mut device, UVec2::new(1920, 1080), ResolutionDownscale::Half, true)
        .unwrap();
    let r = manager
        .reconcile(&mut device, UVec2::new(1921, 1080), ResolutionDownscale::Half, true)
        .unwrap();
    assert!(r.reallocated);
    assert_eq!(r.set.downscaled_size(), UVec2::new(960, 540));
    assert_eq!(size_of(&device, &manager, PersistentTarget::Ambient), UVec2::new(1921, 1080));
}

#[test]
fn reallocation_releases_previous_handles() {
    let mut device = HeadlessDevice::new();
    let mut manager = ResourceManager::new();
    let old = manager
        .reconcile(&mut device, UVec2::new(800, 600), ResolutionDownscale::Half, true)
        .unwrap()
        .set;
    manager
        .reconcile(&mut device, UVec2::new(1024, 768), ResolutionDownscale::Half, true)
        .unwrap();

    for (role, handle) in old.iter() {
        assert!(!device.is_live(handle), "{role:?} leaked");
    }
    assert_eq!(device.live_count(), 5);
}

#[test]
fn resolution_round_trip_leaves_no_duplicates() {
    let mut device = HeadlessDevice::new();
    let mut manager = ResourceManager::new();
    let hd = UVec2::new(1920, 1080);

    manager.reconcile(&mut device, hd, ResolutionDownscale::Half, true).unwrap();
    let before = device.live_count();

    manager
        .reconcile(&mut device, UVec2::new(1280, 720), ResolutionDownscale::Half, true)
        .unwrap();
    manager.reconcile(&mut device, hd, ResolutionDownscale::Half, true).unwrap();

    assert_eq!(device.live_count(), before);
    assert_eq!(manager.live_count(), 5);
    for role in PersistentTarget::ALL {
        assert_eq!(device.live_with_label(role.label()).count(), 1, "{role:?}");
    }
}

// ============================================================================
// Failure & Teardown
// ============================================================================

#[test]
fn failed_allocation_leaves_no_partial_set() {
    let mut device = HeadlessDevice::new();
    let mut manager = ResourceManager::new();
    device.fail_allocations_after(3);

    let err = manager
        .reconcile(&mut device, UVec2::new(1920, 1080), ResolutionDownscale::Half, true)
        .unwrap_err();
    assert!(matches!(err, SsrtError::TextureAllocation { .. }));
    assert_eq!(device.live_count(), 0);
    assert!(manager.resources().is_none());
    assert_eq!(manager.live_count(), 0);

    device.stop_failing();
    let r = manager
        .reconcile(&mut device, UVec2::new(1920, 1080), ResolutionDownscale::Half, true)
        .unwrap();
    assert!(r.reallocated);
    assert_eq!(device.live_count(), 5);
}

#[test]
fn failed_reallocation_drops_old_set() {
    let mut device = HeadlessDevice::new();
    let mut manager = ResourceManager::new();
    manager
        .reconcile(&mut device, UVec2::new(640, 480), ResolutionDownscale::Half, true)
        .unwrap();

    device.set_max_dimension(1024);
    assert!(
        manager
            .reconcile(&mut device, UVec2::new(4096, 2160), ResolutionDownscale::Half, true)
            .is_err()
    );
    assert_eq!(device.live_count(), 0);
    assert!(manager.resources().is_none());
}

#[test]
fn release_before_any_allocation_is_noop() {
    let mut device = HeadlessDevice::new();
    let mut manager = ResourceManager::new();
    manager.release_all(&mut device);
    manager.release_all(&mut device);
    assert_eq!(device.total_released(), 0);
}

#[test]
fn release_all_frees_every_target() {
    let mut device = HeadlessDevice::new();
    let mut manager = ResourceManager::new();
    manager
        .reconcile(&mut device, UVec2::new(640, 480), ResolutionDownscale::Half, true)
        .unwrap();
    manager.release_all(&mut device);
    assert_eq!(device.live_count(), 0);
    assert_eq!(device.total_released(), 5);

    // Next reconcile starts from scratch.
    assert!(
        manager
            .reconcile(&mut device, UVec2::new(640, 480), ResolutionDownscale::Half, true)
            .unwrap()
            .reallocated
    );
    assert!(device.has_program());
}
