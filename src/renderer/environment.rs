//! Fallback Environment Sampler
//!
//! Rays that leave the screen or the sampling radius can pick up lighting
//! from an environment cubemap instead of contributing nothing:
//!
//! - `Off`: nothing is bound; off-screen contribution is zero.
//! - `StaticIrradianceCubemap`: a host-supplied, pre-convolved cubemap is
//!   bound as-is with no per-frame work.
//! - `DynamicCubemap`: a small cubemap is re-rendered around the camera,
//!   one face per frame, by the host's forward renderer.
//!
//! The dynamic cubemap is owned here; the static one stays owned by the
//! host and is never released by the effect.

use glam::{Mat4, Vec3};
use log::debug;

use crate::camera::CameraFrame;
use crate::errors::{Result, SsrtError};
use crate::renderer::device::{LDR_FORMAT, RenderDevice, TextureDesc, TextureHandle};
use crate::settings::FallbackMethod;

/// Edge length of each dynamic cubemap face.
pub const DYNAMIC_CUBEMAP_SIZE: u32 = 32;

/// One face of a cubemap, in layer order.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum CubeFace {
    PositiveX = 0,
    NegativeX = 1,
    PositiveY = 2,
    NegativeY = 3,
    PositiveZ = 4,
    NegativeZ = 5,
}

impl CubeFace {
    pub const ALL: [Self; 6] = [
        Self::PositiveX,
        Self::NegativeX,
        Self::PositiveY,
        Self::NegativeY,
        Self::PositiveZ,
        Self::NegativeZ,
    ];

    /// The face refreshed on `frame_index`.
    #[inline]
    #[must_use]
    pub const fn for_frame(frame_index: u64) -> Self {
        Self::ALL[(frame_index % 6) as usize]
    }

    /// Array layer of the face.
    #[inline]
    #[must_use]
    pub const fn layer(self) -> u32 {
        self as u32
    }

    /// Direction the capture camera looks at.
    #[must_use]
    pub const fn forward(self) -> Vec3 {
        match self {
            Self::PositiveX => Vec3::X,
            Self::NegativeX => Vec3::NEG_X,
            Self::PositiveY => Vec3::Y,
            Self::NegativeY => Vec3::NEG_Y,
            Self::PositiveZ => Vec3::Z,
            Self::NegativeZ => Vec3::NEG_Z,
        }
    }

    /// Up vector of the capture camera.
    #[must_use]
    pub const fn up(self) -> Vec3 {
        match self {
            Self::PositiveY => Vec3::Z,
            Self::NegativeY => Vec3::NEG_Z,
            _ => Vec3::NEG_Y,
        }
    }
}

/// A face the host must render this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceCapture {
    pub face: CubeFace,
    /// Cube texture holding the face.
    pub target: TextureHandle,
    pub view: Mat4,
    /// 90° square frustum with the primary camera's clip planes.
    pub projection: Mat4,
}

impl FaceCapture {
    fn new(face: CubeFace, target: TextureHandle, camera: &CameraFrame) -> Self {
        let position = camera.position();
        Self {
            face,
            target,
            view: Mat4::look_to_rh(position, face.forward(), face.up()),
            projection: Mat4::perspective_rh(90f32.to_radians(), 1.0, camera.near, camera.far),
        }
    }
}

/// Owner of the fallback cubemap binding.
#[derive(Debug, Default)]
pub struct FallbackEnvironment {
    dynamic: Option<TextureHandle>,
    static_cubemap: Option<TextureHandle>,
}

impl FallbackEnvironment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host-owned irradiance cubemap used by the static fallback.
    pub fn set_static_cubemap(&mut self, cubemap: Option<TextureHandle>) {
        self.static_cubemap = cubemap;
    }

    #[inline]
    #[must_use]
    pub fn static_cubemap(&self) -> Option<TextureHandle> {
        self.static_cubemap
    }

    /// The dynamic cubemap, if allocated.
    #[inline]
    #[must_use]
    pub fn dynamic_cubemap(&self) -> Option<TextureHandle> {
        self.dynamic
    }

    /// Per-frame update.
    ///
    /// With the dynamic method, allocates the cubemap on first use and
    /// returns the face to render this frame. With any other method the
    /// dynamic cubemap is released and nothing is returned.
    pub fn refresh(
        &mut self,
        device: &mut dyn RenderDevice,
        method: FallbackMethod,
        frame_index: u64,
        camera: &CameraFrame,
    ) -> Result<Option<FaceCapture>> {
        if method != FallbackMethod::DynamicCubemap {
            self.release(device);
            return Ok(None);
        }

        let target = match self.dynamic {
            Some(handle) => handle,
            None => {
                let handle = device.create_texture(&TextureDesc::cube(
                    "SSRT Fallback Cubemap",
                    DYNAMIC_CUBEMAP_SIZE,
                    LDR_FORMAT,
                ))?;
                debug!("SSRT: allocated {DYNAMIC_CUBEMAP_SIZE}px dynamic fallback cubemap");
                self.dynamic = Some(handle);
                handle
            }
        };

        Ok(Some(FaceCapture::new(CubeFace::for_frame(frame_index), target, camera)))
    }

    /// Cubemap bound to the ray march for `method`.
    pub fn binding(&self, method: FallbackMethod) -> Result<Option<TextureHandle>> {
        match method {
            FallbackMethod::Off => Ok(None),
            FallbackMethod::StaticIrradianceCubemap => {
                self.static_cubemap.map(Some).ok_or(SsrtError::MissingFallbackCubemap)
            }
            FallbackMethod::DynamicCubemap => Ok(self.dynamic),
        }
    }

    /// Releases the dynamic cubemap. The static cubemap is left alone.
    pub fn release(&mut self, device: &mut dyn RenderDevice) {
        if let Some(handle) = self.dynamic.take() {
            device.release_texture(handle);
            debug!("SSRT: released dynamic fallback cubemap");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::headless::HeadlessDevice;

    fn camera() -> CameraFrame {
        CameraFrame::perspective(Vec3::new(0.0, 1.0, 5.0), Vec3::NEG_Z, Vec3::Y, 60.0, 0.3, 500.0, 640, 480)
    }

    #[test]
    fn test_face_cycles_every_six_frames() {
        let faces: Vec<_> = (0..12).map(CubeFace::for_frame).collect();
        assert_eq!(&faces[..6], &CubeFace::ALL);
        assert_eq!(&faces[6..], &CubeFace::ALL);
    }

    #[test]
    fn test_dynamic_allocates_once() {
        let mut device = HeadlessDevice::new();
        let mut env = FallbackEnvironment::new();

        for frame in 0..6 {
            let capture = env
                .refresh(&mut device, FallbackMethod::DynamicCubemap, frame, &camera())
                .unwrap()
                .unwrap();
            assert_eq!(capture.face.layer() as u64, frame);
        }
        assert_eq!(device.total_created(), 1);

        let handle = env.dynamic_cubemap().unwrap();
        let desc = device.desc(handle).unwrap();
        assert_eq!((desc.width, desc.height), (32, 32));
        assert_eq!(desc.format, LDR_FORMAT);
    }

    #[test]
    fn test_capture_is_colocated_with_primary_camera() {
        let mut device = HeadlessDevice::new();
        let mut env = FallbackEnvironment::new();
        let cam = camera();
        let capture = env
            .refresh(&mut device, FallbackMethod::DynamicCubemap, 4, &cam)
            .unwrap()
            .unwrap();
        let eye = capture.view.inverse().w_axis.truncate();
        assert!((eye - cam.position()).length() < 1e-4);
        assert_eq!(capture.face, CubeFace::PositiveZ);
    }

    #[test]
    fn test_switching_away_from_dynamic_releases() {
        let mut device = HeadlessDevice::new();
        let mut env = FallbackEnvironment::new();
        env.refresh(&mut device, FallbackMethod::DynamicCubemap, 0, &camera())
            .unwrap();
        assert_eq!(device.live_count(), 1);

        let none = env.refresh(&mut device, FallbackMethod::Off, 1, &camera()).unwrap();
        assert!(none.is_none());
        assert_eq!(device.live_count(), 0);
        assert_eq!(env.binding(FallbackMethod::Off).unwrap(), None);
    }

    #[test]
    fn test_static_without_cubemap_fails_closed() {
        let env = FallbackEnvironment::new();
        assert!(matches!(
            env.binding(FallbackMethod::StaticIrradianceCubemap),
            Err(SsrtError::MissingFallbackCubemap)
        ));
    }
}
