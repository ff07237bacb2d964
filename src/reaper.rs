//! Completion reaper.
//!
//! Sole owner of buffer release: it takes finished transactions back from the
//! transport in submission order and drops the buffer of every transferred
//! draw once its last chunk has completed.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::DisplayError;
use crate::transaction::{PixelSource, Release, Transaction};
use crate::transport::Transport;

/// What reaping one transaction did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reaped {
    /// No completion metadata, only the record was dropped.
    Scaffold,
    /// Completion for a caller-retained buffer.
    Retained,
    /// Transferred buffer freed.
    Released,
    /// Transferred buffer still referenced elsewhere.
    Shared,
}

/// Counters reported when the loop stops.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReapSummary {
    pub completed: usize,
    pub released: usize,
    pub retained: usize,
}

impl ReapSummary {
    fn record(&mut self, reaped: Reaped) {
        self.completed += 1;
        match reaped {
            Reaped::Released => self.released += 1,
            Reaped::Retained => self.retained += 1,
            Reaped::Scaffold | Reaped::Shared => {}
        }
    }
}

/// Act on a completed transaction and drop it.
///
/// A draw cut short by a refused submission has no completion in the queue;
/// its last queued chunk then holds the final reference and is reported as
/// [`Reaped::Released`] when reaping it frees the buffer.
pub fn reap(transaction: Transaction) -> Reaped {
    let (payload, completion) = transaction.into_parts();
    let chunk = payload.into_source();
    let Some(completion) = completion else {
        return match chunk.map(PixelSource::release) {
            Some(Release::Freed) => {
                log::debug!("released pixel buffer of an incomplete draw");
                Reaped::Released
            }
            _ => Reaped::Scaffold,
        };
    };
    // the chunk's own reference has to go before the owning one is released
    drop(chunk);
    match completion.release() {
        Release::Retained => Reaped::Retained,
        Release::Freed => {
            log::debug!("released transferred pixel buffer");
            Reaped::Released
        }
        Release::StillShared => {
            log::debug!("transferred pixel buffer still referenced at completion");
            Reaped::Shared
        }
    }
}

/// Incremental reaper for callers that interleave it with other work.
#[derive(Default)]
pub struct Reaper {
    summary: ReapSummary,
}

impl Reaper {
    pub const fn new() -> Self {
        Self { summary: ReapSummary { completed: 0, released: 0, retained: 0 } }
    }

    /// Reap the next completion if one is ready.
    pub fn poll<T: Transport + ?Sized>(&mut self, bus: &T) -> Result<Option<Reaped>, DisplayError> {
        let next = bus.poll_completed().map_err(|e| {
            log::error!("reaper: {}", e);
            DisplayError::Retrieval(e)
        })?;
        Ok(next.map(|t| {
            let reaped = reap(t);
            self.summary.record(reaped);
            reaped
        }))
    }

    /// Block until the next completion and reap it.
    pub fn reap_next<T: Transport + ?Sized>(&mut self, bus: &T) -> Result<Reaped, DisplayError> {
        let t = bus.retrieve_completed().map_err(|e| {
            log::error!("reaper: {}", e);
            DisplayError::Retrieval(e)
        })?;
        let reaped = reap(t);
        self.summary.record(reaped);
        Ok(reaped)
    }

    pub fn summary(&self) -> ReapSummary {
        self.summary
    }
}

/// Reap completions until `shutdown` is set, then drain whatever has already
/// completed and return the counters. Transactions still in flight at that
/// point are left alone; their buffers are not released.
pub fn run_completion_loop<T: Transport + ?Sized>(
    bus: &T,
    shutdown: &AtomicBool,
) -> Result<ReapSummary, DisplayError> {
    let mut reaper = Reaper::new();
    while !shutdown.load(Ordering::Acquire) {
        if reaper.poll(bus)?.is_none() {
            core::hint::spin_loop();
        }
    }
    while reaper.poll(bus)?.is_some() {}
    Ok(reaper.summary())
}
