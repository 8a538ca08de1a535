//! wgpu Backend
//!
//! [`WgpuDevice`] allocates the effect's render targets on a `wgpu::Device`;
//! [`WgpuExecutor`] replays the recorded command lists into a command
//! encoder using the host's SSRT shader module.
//!
//! ```rust,ignore
//! let mut gpu = WgpuDevice::new(device, queue);
//! gpu.load_program(SSRT_WGSL);
//! let mut cache = WgpuPassCache::new(&gpu);
//!
//! effect.attach(&mut host, &gpu)?;
//! if let FrameOutcome::Recorded(report) = effect.on_frame(&mut gpu, frame, &camera, true) {
//!     let mut executor = WgpuExecutor::new(&gpu, &mut cache, &mut encoder, host_frame);
//!     effect.execute_all(&mut executor)?;
//! }
//! ```

mod device;
mod executor;

pub use device::WgpuDevice;
pub use executor::{HostFrame, WgpuExecutor, WgpuPassCache};
