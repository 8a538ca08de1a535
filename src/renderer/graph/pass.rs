//! SSRT Pass Table
//!
//! Every pass of the effect runs the same shading program; the program picks
//! the pass-specific logic from the integer index below. The table is a
//! contract with the shader and must not be reordered.
//!
//! | Index | Pass | Outputs |
//! |-------|------|---------|
//! | 0 | `Ssrt` | bent normal, GI occlusion |
//! | 1 | `Upsample` | filter buffer |
//! | 2 | `SampleReuse` | filter buffer |
//! | 3 | `TemporalReproj` | filter buffer |
//! | 4–7 | `Debug*` | primary output |
//! | 8 | `GetDepth` | depth copy |
//! | 9 | `GetNormal` | normal copy |
//! | 10 | `GetLightmask` | lightmask |
//! | 11 | `CopyLightmask` | lightmask |

/// Shader pass selector.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
#[repr(u32)]
pub enum SsrtPass {
    Ssrt = 0,
    Upsample = 1,
    SampleReuse = 2,
    TemporalReproj = 3,
    DebugAo = 4,
    DebugBentNormal = 5,
    DebugGi = 6,
    DebugCombined = 7,
    GetDepth = 8,
    GetNormal = 9,
    GetLightmask = 10,
    CopyLightmask = 11,
}

impl SsrtPass {
    /// Number of passes in the table.
    pub const COUNT: usize = 12;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Ssrt,
        Self::Upsample,
        Self::SampleReuse,
        Self::TemporalReproj,
        Self::DebugAo,
        Self::DebugBentNormal,
        Self::DebugGi,
        Self::DebugCombined,
        Self::GetDepth,
        Self::GetNormal,
        Self::GetLightmask,
        Self::CopyLightmask,
    ];

    /// Index handed to the shading program.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub const fn from_index(index: u32) -> Option<Self> {
        if (index as usize) < Self::COUNT {
            Some(Self::ALL[index as usize])
        } else {
            None
        }
    }

    /// Pass name (for debug groups and logs).
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ssrt => "SSRT",
            Self::Upsample => "Upsample",
            Self::SampleReuse => "SampleReuse",
            Self::TemporalReproj => "TemporalReproj",
            Self::DebugAo => "DebugAO",
            Self::DebugBentNormal => "DebugBentNormal",
            Self::DebugGi => "DebugGI",
            Self::DebugCombined => "DebugCombined",
            Self::GetDepth => "GetDepth",
            Self::GetNormal => "GetNormal",
            Self::GetLightmask => "GetLightmask",
            Self::CopyLightmask => "CopyLightmask",
        }
    }

    /// Returns `true` for the passes that write the primary output.
    #[inline]
    #[must_use]
    pub const fn is_composite(self) -> bool {
        matches!(
            self,
            Self::DebugAo | Self::DebugBentNormal | Self::DebugGi | Self::DebugCombined
        )
    }

    /// Returns `true` if the pass reads previous-frame color/depth.
    #[inline]
    #[must_use]
    pub const fn reads_history(self) -> bool {
        matches!(self, Self::TemporalReproj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_table_is_stable() {
        for (i, pass) in SsrtPass::ALL.iter().enumerate() {
            assert_eq!(pass.index() as usize, i);
            assert_eq!(SsrtPass::from_index(i as u32), Some(*pass));
        }
        assert_eq!(SsrtPass::from_index(12), None);
        assert_eq!(SsrtPass::GetLightmask.index(), 10);
    }

    #[test]
    fn test_composite_passes() {
        let composites: Vec<_> = SsrtPass::ALL.iter().filter(|p| p.is_composite()).collect();
        assert_eq!(composites.len(), 4);
        assert!(SsrtPass::TemporalReproj.reads_history());
        assert!(!SsrtPass::Upsample.reads_history());
    }
}
