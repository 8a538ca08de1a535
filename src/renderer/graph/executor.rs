//! Command List Replay
//!
//! [`execute_list`] walks a [`CommandList`] in order and hands each command,
//! with its targets resolved to device handles, to a [`PassExecutor`].
//! Resolution happens before anything is issued: a list that references a
//! target the frame never bound fails as a whole instead of half-recording.

use log::trace;
use smallvec::SmallVec;

use super::command::{Command, CommandList, Target, TransientSlot};
use super::pass::SsrtPass;
use crate::errors::{Result, SsrtError};
use crate::renderer::device::TextureHandle;
use crate::renderer::resources::ResourceSet;
use crate::renderer::uniforms::FrameParams;

/// A target after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// The host's primary output.
    Camera,
    Texture(TextureHandle),
}

/// Role → handle table for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTargets {
    persistent: ResourceSet,
    transients: [Option<TextureHandle>; TransientSlot::COUNT],
}

impl ResolvedTargets {
    #[must_use]
    pub fn new(persistent: ResourceSet) -> Self {
        Self {
            persistent,
            transients: [None; TransientSlot::COUNT],
        }
    }

    /// Binds a transient slot to the handle the pool served for it.
    pub fn bind_transient(&mut self, slot: TransientSlot, handle: TextureHandle) {
        self.transients[slot.slot()] = Some(handle);
    }

    #[inline]
    #[must_use]
    pub fn transient(&self, slot: TransientSlot) -> Option<TextureHandle> {
        self.transients[slot.slot()]
    }

    #[inline]
    #[must_use]
    pub fn persistent(&self) -> &ResourceSet {
        &self.persistent
    }

    pub fn resolve(&self, target: Target) -> Result<TextureTarget> {
        match target {
            Target::Camera => Ok(TextureTarget::Camera),
            Target::Persistent(role) => Ok(TextureTarget::Texture(self.persistent.get(role))),
            Target::Transient(slot) => self
                .transient(slot)
                .map(TextureTarget::Texture)
                .ok_or_else(|| SsrtError::UnresolvedTarget(slot.label().to_string())),
        }
    }
}

/// Backend that issues the GPU work for replayed commands.
pub trait PassExecutor {
    fn clear(&mut self, target: TextureTarget) -> Result<()>;

    fn blit(&mut self, source: TextureTarget, destination: TextureTarget) -> Result<()>;

    fn copy(&mut self, source: TextureTarget, destination: TextureTarget) -> Result<()>;

    /// Runs `pass` of the shared program into `targets`.
    ///
    /// `inputs` maps every role the program may sample; `params` is the
    /// frame's parameter block.
    fn draw(
        &mut self,
        pass: SsrtPass,
        targets: &[TextureTarget],
        params: &FrameParams,
        inputs: &ResolvedTargets,
    ) -> Result<()>;
}

enum Resolved {
    Clear(TextureTarget),
    Blit(TextureTarget, TextureTarget),
    Copy(TextureTarget, TextureTarget),
    Draw(SsrtPass, SmallVec<[TextureTarget; 2]>),
}

fn resolve_command(command: &Command, resolved: &ResolvedTargets) -> Result<Resolved> {
    Ok(match command {
        Command::Clear { target } => Resolved::Clear(resolved.resolve(*target)?),
        Command::Blit {
            source,
            destination,
        } => Resolved::Blit(resolved.resolve(*source)?, resolved.resolve(*destination)?),
        Command::Copy {
            source,
            destination,
        } => Resolved::Copy(resolved.resolve(*source)?, resolved.resolve(*destination)?),
        Command::Draw { pass, targets } => Resolved::Draw(
            *pass,
            targets
                .iter()
                .map(|t| resolved.resolve(*t))
                .collect::<Result<_>>()?,
        ),
    })
}

/// Replays `list` into `executor`.
pub fn execute_list(
    list: &CommandList,
    resolved: &ResolvedTargets,
    params: &FrameParams,
    executor: &mut dyn PassExecutor,
) -> Result<()> {
    let commands = list
        .commands
        .iter()
        .map(|c| resolve_command(c, resolved))
        .collect::<Result<Vec<_>>>()?;

    trace!("SSRT: replaying '{}' ({} commands)", list.name, commands.len());

    for command in commands {
        match command {
            Resolved::Clear(target) => executor.clear(target)?,
            Resolved::Blit(source, destination) => executor.blit(source, destination)?,
            Resolved::Copy(source, destination) => executor.copy(source, destination)?,
            Resolved::Draw(pass, targets) => executor.draw(pass, &targets, params, resolved)?,
        }
    }
    Ok(())
}
