//! SSRT Settings & Configuration Surface
//!
//! This module defines every tunable parameter of the effect as pure data.
//! The embedding application owns an [`SsrtSettings`] value (usually through
//! [`SsrtEffect::settings`](crate::renderer::effect::SsrtEffect::settings))
//! and may edit any field at runtime; the effect takes a clamped snapshot at
//! the start of every frame, so edits take effect on the very next frame.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ssrt::settings::{SsrtSettings, ResolutionDownscale, DebugMode};
//!
//! let mut settings = SsrtSettings::default();
//! settings.resolution_downscale = ResolutionDownscale::Full;
//! settings.debug_mode = DebugMode::Gi;
//!
//! // Or load from JSON (unknown fields rejected, missing fields defaulted)
//! let settings = SsrtSettings::from_json(r#"{ "step_count": 12, "radius": 5.0 }"#)?;
//! ```
//!
//! # Ranges
//!
//! | Field | Range | Default |
//! |-------|-------|---------|
//! | `rotation_count` | 1–4 | 4 |
//! | `step_count` | 1–16 | 8 |
//! | `radius` | 1–25 | 3.5 |
//! | `exp_start` | 0.1–1 | 1.0 |
//! | `exp_factor` | 1–2 | 1.0 |
//! | `gi_boost` | 0–75 | 20 |
//! | `ln_dl_offset` / `n_dl_offset` | 0–1 | 0 |
//! | `power` | 1–8 | 1.5 |
//! | `thickness` | 0.1–10 | 10 |
//! | `falloff` | 1–50 | 1 |
//! | `reuse_count` | 1–8 | 5 |
//! | `temporal_response` | 0–1 | 0.35 |

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::renderer::graph::SsrtPass;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Selects what the composite pass writes to the primary output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DebugMode {
    /// Ambient occlusion only.
    Ao,
    /// Bent normals only.
    BentNormal,
    /// Indirect diffuse lighting only.
    Gi,
    /// Final composite of AO and GI onto the lit scene.
    #[default]
    Combined,
}

impl DebugMode {
    /// The composite pass recorded for this mode.
    #[inline]
    #[must_use]
    pub const fn pass(self) -> SsrtPass {
        match self {
            Self::Ao => SsrtPass::DebugAo,
            Self::BentNormal => SsrtPass::DebugBentNormal,
            Self::Gi => SsrtPass::DebugGi,
            Self::Combined => SsrtPass::DebugCombined,
        }
    }
}

/// Source of lighting for rays that leave the screen or the sampling radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FallbackMethod {
    /// No fallback; off-screen contribution is zero.
    #[default]
    Off,
    /// A pre-convolved irradiance cubemap supplied by the host.
    StaticIrradianceCubemap,
    /// A cubemap re-rendered around the camera, one face per frame.
    DynamicCubemap,
}

impl FallbackMethod {
    /// Integer selector consumed by the shader.
    #[inline]
    #[must_use]
    pub const fn shader_value(self) -> u32 {
        match self {
            Self::Off => 0,
            Self::StaticIrradianceCubemap => 1,
            Self::DynamicCubemap => 2,
        }
    }
}

/// Integer resolution divisor for a buffer tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResolutionDownscale {
    Full,
    #[default]
    Half,
    Quarter,
    Eighth,
}

impl ResolutionDownscale {
    /// All tiers, from full resolution down.
    pub const ALL: [Self; 4] = [Self::Full, Self::Half, Self::Quarter, Self::Eighth];

    /// The integer divisor (1, 2, 4 or 8).
    #[inline]
    #[must_use]
    pub const fn factor(self) -> u32 {
        match self {
            Self::Full => 1,
            Self::Half => 2,
            Self::Quarter => 4,
            Self::Eighth => 8,
        }
    }

    /// Maps a divisor back to its tier.
    #[must_use]
    pub const fn from_factor(factor: u32) -> Option<Self> {
        match factor {
            1 => Some(Self::Full),
            2 => Some(Self::Half),
            4 => Some(Self::Quarter),
            8 => Some(Self::Eighth),
            _ => None,
        }
    }

    /// Returns `true` for every tier below full resolution.
    #[inline]
    #[must_use]
    pub const fn is_downscaled(self) -> bool {
        !matches!(self, Self::Full)
    }

    /// Divides a resolution by this tier's factor (floor), never below 1×1.
    #[inline]
    #[must_use]
    pub fn apply(self, resolution: glam::UVec2) -> glam::UVec2 {
        (resolution / self.factor()).max(glam::UVec2::ONE)
    }
}

/// Canned display configurations for quick A/B comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SsrtPreset {
    /// Full composite, AO on indirect lighting only.
    Combined,
    /// Indirect lighting view, modulated by albedo.
    GiOnly,
    /// Indirect radiance only, without albedo.
    GiLightOnly,
    /// Full composite with AO also applied to direct lighting.
    CombinedDirectAo,
}

// ---------------------------------------------------------------------------
// Ranges
// ---------------------------------------------------------------------------

pub const ROTATION_COUNT_RANGE: RangeInclusive<u32> = 1..=4;
pub const STEP_COUNT_RANGE: RangeInclusive<u32> = 1..=16;
pub const RADIUS_RANGE: RangeInclusive<f32> = 1.0..=25.0;
pub const EXP_START_RANGE: RangeInclusive<f32> = 0.1..=1.0;
pub const EXP_FACTOR_RANGE: RangeInclusive<f32> = 1.0..=2.0;
pub const GI_BOOST_RANGE: RangeInclusive<f32> = 0.0..=75.0;
pub const DOT_OFFSET_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const POWER_RANGE: RangeInclusive<f32> = 1.0..=8.0;
pub const THICKNESS_RANGE: RangeInclusive<f32> = 0.1..=10.0;
pub const FALLOFF_RANGE: RangeInclusive<f32> = 1.0..=50.0;
pub const REUSE_COUNT_RANGE: RangeInclusive<u32> = 1..=8;
pub const TEMPORAL_RESPONSE_RANGE: RangeInclusive<f32> = 0.0..=1.0;

fn clamp_u32(value: u32, range: &RangeInclusive<u32>) -> u32 {
    value.clamp(*range.start(), *range.end())
}

/// Non-finite input falls back to the field default.
fn clamp_f32(value: f32, range: &RangeInclusive<f32>, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(*range.start(), *range.end())
    } else {
        fallback
    }
}

// ---------------------------------------------------------------------------
// SsrtSettings
// ---------------------------------------------------------------------------

/// Complete configuration of the SSRT effect.
///
/// Fields are public for direct editing; out-of-range values are tolerated
/// and clamped by [`sanitized`](Self::sanitized) when the frame snapshot is
/// taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SsrtSettings {
    // === Sampling ===
    /// Number of directional rotations per pixel.
    pub rotation_count: u32,
    /// Samples taken along one edge of a conic slice.
    pub step_count: u32,
    /// World-space sampling radius; AO and GI only act within it.
    pub radius: f32,
    /// Initial multiplier on the step size.
    pub exp_start: f32,
    /// Exponent applied to the step size at each step.
    pub exp_factor: f32,
    /// Jitter sample positions to hide undersampling bands.
    pub jitter_samples: bool,

    // === GI ===
    /// Intensity of the indirect diffuse light.
    pub gi_boost: f32,
    /// Store the lightmask in a float format instead of 8-bit.
    pub light_buffer_hdr: bool,
    /// Resolution tier of the lightmask.
    pub light_buffer_resolution: ResolutionDownscale,
    /// Bypass of the `dot(lightNormal, lightDirection)` weighting.
    pub ln_dl_offset: f32,
    /// Bypass of the `dot(normal, lightDirection)` weighting.
    pub n_dl_offset: f32,

    // === Occlusion ===
    /// Power curve applied to AO.
    pub power: f32,
    /// Assumed world-space thickness of on-screen geometry.
    pub thickness: f32,
    /// Occlusion falloff relative to distance.
    pub falloff: f32,
    /// Analytic multi-bounce approximation.
    pub multi_bounce_ao: bool,
    /// Apply AO to direct lighting as well.
    pub direct_lighting_ao: bool,

    // === Off-screen Fallback ===
    pub fallback_method: FallbackMethod,

    // === Filters ===
    /// Resolution tier the ray march runs at.
    pub resolution_downscale: ResolutionDownscale,
    /// Neighbor pixels reused by the spatial filter (1 disables it).
    pub reuse_count: u32,
    /// Temporal reprojection on/off.
    pub temporal_enabled: bool,
    /// Accumulation speed; lower is smoother but ghosts more.
    pub temporal_response: f32,

    // === Debug ===
    pub debug_mode: DebugMode,
    /// Show radiance only, without albedo modulation.
    pub light_only: bool,
}

impl Default for SsrtSettings {
    fn default() -> Self {
        Self {
            rotation_count: 4,
            step_count: 8,
            radius: 3.5,
            exp_start: 1.0,
            exp_factor: 1.0,
            jitter_samples: true,

            gi_boost: 20.0,
            light_buffer_hdr: false,
            light_buffer_resolution: ResolutionDownscale::Half,
            ln_dl_offset: 0.0,
            n_dl_offset: 0.0,

            power: 1.5,
            thickness: 10.0,
            falloff: 1.0,
            multi_bounce_ao: false,
            direct_lighting_ao: false,

            fallback_method: FallbackMethod::Off,

            resolution_downscale: ResolutionDownscale::Half,
            reuse_count: 5,
            temporal_enabled: true,
            temporal_response: 0.35,

            debug_mode: DebugMode::Combined,
            light_only: false,
        }
    }
}

impl SsrtSettings {
    /// Creates settings with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses settings from JSON and clamps them into range.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.sanitized())
    }

    /// Serializes the settings to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns a copy with every numeric field clamped to its range.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        Self {
            rotation_count: clamp_u32(self.rotation_count, &ROTATION_COUNT_RANGE),
            step_count: clamp_u32(self.step_count, &STEP_COUNT_RANGE),
            radius: clamp_f32(self.radius, &RADIUS_RANGE, defaults.radius),
            exp_start: clamp_f32(self.exp_start, &EXP_START_RANGE, defaults.exp_start),
            exp_factor: clamp_f32(self.exp_factor, &EXP_FACTOR_RANGE, defaults.exp_factor),
            gi_boost: clamp_f32(self.gi_boost, &GI_BOOST_RANGE, defaults.gi_boost),
            ln_dl_offset: clamp_f32(self.ln_dl_offset, &DOT_OFFSET_RANGE, defaults.ln_dl_offset),
            n_dl_offset: clamp_f32(self.n_dl_offset, &DOT_OFFSET_RANGE, defaults.n_dl_offset),
            power: clamp_f32(self.power, &POWER_RANGE, defaults.power),
            thickness: clamp_f32(self.thickness, &THICKNESS_RANGE, defaults.thickness),
            falloff: clamp_f32(self.falloff, &FALLOFF_RANGE, defaults.falloff),
            reuse_count: clamp_u32(self.reuse_count, &REUSE_COUNT_RANGE),
            temporal_response: clamp_f32(
                self.temporal_response,
                &TEMPORAL_RESPONSE_RANGE,
                defaults.temporal_response,
            ),
            ..self.clone()
        }
    }

    /// Returns `true` when the spatial reuse filter runs.
    #[inline]
    #[must_use]
    pub fn spatial_reuse_enabled(&self) -> bool {
        self.reuse_count > 1
    }

    /// Applies one of the canned display configurations.
    pub fn apply_preset(&mut self, preset: SsrtPreset) {
        match preset {
            SsrtPreset::Combined => {
                self.debug_mode = DebugMode::Combined;
                self.light_only = false;
                self.direct_lighting_ao = false;
            }
            SsrtPreset::GiOnly => {
                self.debug_mode = DebugMode::Gi;
                self.light_only = false;
            }
            SsrtPreset::GiLightOnly => {
                self.debug_mode = DebugMode::Gi;
                self.light_only = true;
            }
            SsrtPreset::CombinedDirectAo => {
                self.debug_mode = DebugMode::Combined;
                self.light_only = false;
                self.direct_lighting_ao = true;
            }
        }
    }
}
