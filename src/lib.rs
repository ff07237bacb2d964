#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod arbiter;
pub mod error;
pub mod init;
pub mod pipeline;
pub mod queue;
pub mod reaper;
pub mod transaction;
pub mod transport;

#[cfg(feature = "board")]
pub mod display;
#[cfg(feature = "board")]
pub mod wiring;

#[cfg(test)]
mod testing;

pub use arbiter::ControlLine;
pub use error::{DisplayError, InitError, RegionError};
pub use pipeline::{draw_region, fill_region, PixelBuffer, Region, CHUNK_PIXELS};
pub use queue::{run_dispatch_loop, QueuedBus};
pub use reaper::{run_completion_loop, ReapSummary};
pub use transaction::{ControlTag, Transaction};
pub use transport::{PreTransfer, Transport, TransportError};
