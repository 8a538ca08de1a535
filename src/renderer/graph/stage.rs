//! Injection Point Definitions
//!
//! `InjectionPoint` names the fixed stages of the host's per-frame
//! rendering where the effect attaches a command list.

/// Host pipeline stage that receives one of the effect's command lists.
///
/// | Point | List | Content |
/// |-------|------|---------|
/// | `BeforeGBuffer` | `ClearBuffer` | Clear the primary output |
/// | `BeforeLighting` | `StoreAmbient` | Save ambient, clear the indirect channel |
/// | `BeforeImageEffectsOpaque` | `SSRT` | The main pipeline |
///
/// The per-frame callback itself (the fourth host stage) is not a command
/// list; it is [`SsrtEffect::on_frame`](crate::renderer::effect::SsrtEffect::on_frame).
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
#[repr(u8)]
pub enum InjectionPoint {
    /// Before the geometry buffers are populated.
    BeforeGBuffer = 0,

    /// After the geometry buffers, before direct lighting.
    BeforeLighting = 1,

    /// After lighting, before opaque image effects.
    BeforeImageEffectsOpaque = 2,
}

impl InjectionPoint {
    pub const ALL: [Self; 3] = [
        Self::BeforeGBuffer,
        Self::BeforeLighting,
        Self::BeforeImageEffectsOpaque,
    ];

    /// Returns the numeric index of the point (used for sorting).
    #[inline]
    #[must_use]
    pub const fn order(self) -> u8 {
        self as u8
    }

    /// Point name (for debugging).
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BeforeGBuffer => "BeforeGBuffer",
            Self::BeforeLighting => "BeforeLighting",
            Self::BeforeImageEffectsOpaque => "BeforeImageEffectsOpaque",
        }
    }

    /// Name of the command list attached at this point.
    #[inline]
    #[must_use]
    pub const fn list_name(self) -> &'static str {
        match self {
            Self::BeforeGBuffer => "ClearBuffer",
            Self::BeforeLighting => "StoreAmbient",
            Self::BeforeImageEffectsOpaque => "SSRT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_ordering() {
        assert!(InjectionPoint::BeforeGBuffer < InjectionPoint::BeforeLighting);
        assert!(InjectionPoint::BeforeLighting < InjectionPoint::BeforeImageEffectsOpaque);
        for (i, p) in InjectionPoint::ALL.iter().enumerate() {
            assert_eq!(p.order() as usize, i);
        }
    }
}
