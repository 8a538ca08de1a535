//! Parameter Binder
//!
//! Every SSRT pass reads the same parameter block. [`ParameterBinder::bind`]
//! turns the frame's settings snapshot, camera and temporal sample into a
//! [`FrameParams`] value that is handed explicitly to each pass invocation;
//! there is no hidden global shader state.
//!
//! The binder is pure: it allocates nothing and has no side effects. It must
//! run after the resource manager reconciled the target set (the texture
//! bindings must reference current-size targets) and before the pipeline is
//! replayed.

use glam::Mat4;

use crate::camera::CameraFrame;
use crate::renderer::device::TextureHandle;
use crate::renderer::resources::{PersistentTarget, ResourceSet};
use crate::renderer::temporal::TemporalSample;
use crate::settings::SsrtSettings;

/// GPU layout of the shared SSRT parameter block (480 bytes).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SsrtUniforms {
    pub camera_to_world: Mat4,
    pub inverse_projection: Mat4,
    pub view_projection: Mat4,
    pub inverse_view_projection: Mat4,
    pub last_frame_view_projection: Mat4,
    pub last_frame_inverse_view_projection: Mat4,

    pub rotation_count: u32,
    pub step_count: u32,
    pub gi_boost: f32,
    pub ln_dl_offset: f32,

    pub n_dl_offset: f32,
    pub radius: f32,
    pub exp_start: f32,
    pub exp_factor: f32,

    pub thickness: f32,
    pub falloff: f32,
    pub power: f32,
    pub temporal_response: f32,

    pub multi_bounce_ao: u32,
    pub direct_lighting_ao: u32,
    pub fallback_method: u32,
    pub light_only: u32,

    pub reuse_count: u32,
    pub jitter_samples: u32,
    pub half_proj_scale: f32,
    pub resolution_downscale: u32,

    pub temporal_direction: f32,
    pub temporal_offset: f32,
    pub history_valid: u32,
    pub(crate) _pad: u32,
}

impl Default for SsrtUniforms {
    fn default() -> Self {
        Self {
            camera_to_world: Mat4::IDENTITY,
            inverse_projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            inverse_view_projection: Mat4::IDENTITY,
            last_frame_view_projection: Mat4::IDENTITY,
            last_frame_inverse_view_projection: Mat4::IDENTITY,
            ..bytemuck::Zeroable::zeroed()
        }
    }
}

/// Texture bindings shared by every pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureBindings {
    pub bent_normal: TextureHandle,
    pub gi_occlusion: TextureHandle,
    pub ambient: TextureHandle,
    pub previous_color: TextureHandle,
    pub previous_depth: TextureHandle,
    /// Environment cubemap; `None` when the fallback is off.
    pub fallback_cubemap: Option<TextureHandle>,
}

impl TextureBindings {
    #[must_use]
    pub fn from_resources(resources: &ResourceSet, fallback_cubemap: Option<TextureHandle>) -> Self {
        Self {
            bent_normal: resources.get(PersistentTarget::BentNormal),
            gi_occlusion: resources.get(PersistentTarget::GiOcclusion),
            ambient: resources.get(PersistentTarget::Ambient),
            previous_color: resources.get(PersistentTarget::PreviousColor),
            previous_depth: resources.get(PersistentTarget::PreviousDepth),
            fallback_cubemap,
        }
    }
}

/// The complete per-frame parameter set passed to every pass.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameParams {
    pub uniforms: SsrtUniforms,
    pub bindings: TextureBindings,
}

/// `pixel_height / (2 * tan(fov / 2)) * 0.5`.
#[inline]
#[must_use]
pub fn half_projection_scale(pixel_height: u32, fov_y_degrees: f32) -> f32 {
    let tan_half_fov = (fov_y_degrees.to_radians() * 0.5).tan();
    pixel_height as f32 / (tan_half_fov * 2.0) * 0.5
}

#[inline]
fn flag(value: bool) -> u32 {
    u32::from(value)
}

/// Publishes settings and per-frame derived values.
pub struct ParameterBinder;

impl ParameterBinder {
    /// Builds the parameter set for one frame.
    #[must_use]
    pub fn bind(
        settings: &SsrtSettings,
        camera: &CameraFrame,
        temporal: &TemporalSample,
        resources: &ResourceSet,
        fallback_cubemap: Option<TextureHandle>,
    ) -> FrameParams {
        let view_projection = camera.view_projection();

        let uniforms = SsrtUniforms {
            camera_to_world: camera.view.inverse(),
            inverse_projection: camera.projection.inverse(),
            view_projection,
            inverse_view_projection: view_projection.inverse(),
            last_frame_view_projection: temporal.previous_view_projection,
            last_frame_inverse_view_projection: temporal.previous_inverse_view_projection,

            rotation_count: settings.rotation_count,
            step_count: settings.step_count,
            gi_boost: settings.gi_boost,
            ln_dl_offset: settings.ln_dl_offset,

            n_dl_offset: settings.n_dl_offset,
            radius: settings.radius,
            exp_start: settings.exp_start,
            exp_factor: settings.exp_factor,

            thickness: settings.thickness,
            falloff: settings.falloff,
            power: settings.power,
            temporal_response: settings.temporal_response,

            multi_bounce_ao: flag(settings.multi_bounce_ao),
            direct_lighting_ao: flag(settings.direct_lighting_ao),
            fallback_method: settings.fallback_method.shader_value(),
            light_only: flag(settings.light_only),

            reuse_count: settings.reuse_count,
            jitter_samples: flag(settings.jitter_samples),
            half_proj_scale: half_projection_scale(camera.height, camera.fov_y_degrees),
            resolution_downscale: settings.resolution_downscale.factor(),

            temporal_direction: temporal.jitter.rotation,
            temporal_offset: temporal.jitter.spatial_offset,
            history_valid: flag(temporal.history_valid),
            _pad: 0,
        };

        FrameParams {
            uniforms,
            bindings: TextureBindings::from_resources(resources, fallback_cubemap),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_block_size_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<SsrtUniforms>(), 480);
        assert_eq!(std::mem::size_of::<SsrtUniforms>() % 16, 0);
    }

    #[test]
    fn test_half_projection_scale_at_90_degrees() {
        // tan(45°) = 1 → 1080 / 2 * 0.5
        assert!((half_projection_scale(1080, 90.0) - 270.0).abs() < 1e-3);
    }

    #[test]
    fn test_half_projection_scale_grows_as_fov_narrows() {
        assert!(half_projection_scale(720, 30.0) > half_projection_scale(720, 60.0));
    }
}
