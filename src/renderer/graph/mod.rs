//! Pipeline Assembly
//!
//! Provides:
//! - `SsrtPass`: the shader pass index table
//! - `InjectionPoint`: host stages receiving a command list
//! - `Command` / `CommandList`: frame description as plain data
//! - `PipelineBuilder` / `FrameGraph`: per-frame list assembly
//! - `PassExecutor` / `execute_list`: replay into a backend

pub mod builder;
pub mod command;
pub mod executor;
pub mod pass;
pub mod stage;

pub use builder::{ConfigWarning, FrameGraph, PipelineBuilder, odd_resolution_warning};
pub use command::{Command, CommandList, Target, TargetList, TransientRequest, TransientSlot};
pub use executor::{PassExecutor, ResolvedTargets, TextureTarget, execute_list};
pub use pass::SsrtPass;
pub use stage::InjectionPoint;
