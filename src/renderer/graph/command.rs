//! Command List Data Model
//!
//! A frame of the effect is described as plain data: an ordered list of
//! tagged commands per injection point. Targets are named by role
//! ([`Target`]) and only resolved to device handles when the list is
//! replayed, so a list can be inspected and tested without a GPU.

use smallvec::SmallVec;

use super::pass::SsrtPass;
use super::stage::InjectionPoint;
use crate::renderer::device::TextureDesc;
use crate::renderer::resources::PersistentTarget;

/// Per-frame working buffers served by the transient pool.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum TransientSlot {
    /// Snapshot of the direct-lighting-only primary target.
    CameraColor,
    /// Direct lighting + ambient, the radiance the march integrates.
    Lightmask,
    Filter1,
    Filter2,
    /// Depth guide for the bilateral upsample.
    CurrentDepth,
    /// Normal guide for the bilateral upsample.
    CurrentNormal,
}

impl TransientSlot {
    pub const COUNT: usize = 6;

    pub const ALL: [Self; Self::COUNT] = [
        Self::CameraColor,
        Self::Lightmask,
        Self::Filter1,
        Self::Filter2,
        Self::CurrentDepth,
        Self::CurrentNormal,
    ];

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CameraColor => "SSRT Camera Color",
            Self::Lightmask => "SSRT Lightmask",
            Self::Filter1 => "SSRT Filter 1",
            Self::Filter2 => "SSRT Filter 2",
            Self::CurrentDepth => "SSRT Current Depth",
            Self::CurrentNormal => "SSRT Current Normal",
        }
    }
}

/// A render target referenced by a command.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum Target {
    /// The host's primary output (camera target).
    Camera,
    Persistent(PersistentTarget),
    Transient(TransientSlot),
}

/// Outputs of one pass invocation. The ray march is the only pass with two.
pub type TargetList = SmallVec<[Target; 2]>;

/// One recorded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Clear a target to transparent black.
    Clear { target: Target },
    /// Scaled copy through the fullscreen blit program.
    Blit { source: Target, destination: Target },
    /// Same-size texel copy.
    Copy { source: Target, destination: Target },
    /// Run `pass` of the SSRT program into `targets`.
    Draw { pass: SsrtPass, targets: TargetList },
}

impl Command {
    #[inline]
    #[must_use]
    pub fn draw(pass: SsrtPass, target: Target) -> Self {
        Self::Draw {
            pass,
            targets: smallvec::smallvec![target],
        }
    }

    /// Targets written by this command.
    #[must_use]
    pub fn writes(&self) -> &[Target] {
        match self {
            Self::Clear { target } => std::slice::from_ref(target),
            Self::Blit { destination, .. } | Self::Copy { destination, .. } => {
                std::slice::from_ref(destination)
            }
            Self::Draw { targets, .. } => targets,
        }
    }
}

/// A transient buffer the list needs, declared before first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientRequest {
    pub slot: TransientSlot,
    pub desc: TextureDesc,
}

/// An ordered command list attached at one injection point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandList {
    pub name: &'static str,
    pub point: InjectionPoint,
    pub transients: Vec<TransientRequest>,
    pub commands: Vec<Command>,
}

impl CommandList {
    #[must_use]
    pub fn new(point: InjectionPoint) -> Self {
        Self {
            name: point.list_name(),
            point,
            transients: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Empties the list, keeping its allocations.
    pub fn clear(&mut self) {
        self.transients.clear();
        self.commands.clear();
    }

    #[inline]
    pub(crate) fn declare(&mut self, slot: TransientSlot, desc: TextureDesc) {
        self.transients.push(TransientRequest { slot, desc });
    }

    #[inline]
    pub(crate) fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Draw passes in recording order.
    pub fn passes(&self) -> impl Iterator<Item = SsrtPass> + '_ {
        self.commands.iter().filter_map(|c| match c {
            Command::Draw { pass, .. } => Some(*pass),
            _ => None,
        })
    }

    /// Number of times `pass` is drawn.
    #[must_use]
    pub fn count_pass(&self, pass: SsrtPass) -> usize {
        self.passes().filter(|p| *p == pass).count()
    }

    /// Descriptor declared for `slot`, if the list uses it.
    #[must_use]
    pub fn transient(&self, slot: TransientSlot) -> Option<&TextureDesc> {
        self.transients.iter().find(|r| r.slot == slot).map(|r| &r.desc)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
