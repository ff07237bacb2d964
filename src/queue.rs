//! Fixed-slot transaction queue shared between the drawing core and the
//! dispatch core.
//!
//! `N` slots are shared by queued, in-flight and completed-but-unretrieved
//! transactions. `submit` spins while all slots are taken; that is the only
//! backpressure point of the pipeline.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use embedded_hal::spi::{Error as _, SpiDevice};
use heapless::Deque;

use crate::transaction::Transaction;
use crate::transport::{PreTransfer, Transport, TransportError};

struct QueueState<const N: usize> {
    pending: Deque<Transaction, N>,
    done: Deque<Transaction, N>,
    in_flight: bool,
    closed: bool,
    fault: Option<TransportError>,
}

impl<const N: usize> QueueState<N> {
    const fn new() -> Self {
        Self {
            pending: Deque::new(),
            done: Deque::new(),
            in_flight: false,
            closed: false,
            fault: None,
        }
    }

    #[inline]
    fn slots_used(&self) -> usize {
        self.pending.len() + self.done.len() + self.in_flight as usize
    }
}

/// Queue-based transport with `N` transaction slots.
pub struct QueuedBus<const N: usize> {
    state: Mutex<RefCell<QueueState<N>>>,
}

impl<const N: usize> Default for QueuedBus<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> QueuedBus<N> {
    pub const fn new() -> Self {
        Self { state: Mutex::new(RefCell::new(QueueState::new())) }
    }

    /// Refuse further submissions. Queued work still goes out.
    pub fn close(&self) {
        critical_section::with(|cs| self.state.borrow_ref_mut(cs).closed = true);
    }

    /// Transactions accepted but not yet retrieved.
    pub fn outstanding(&self) -> usize {
        critical_section::with(|cs| self.state.borrow_ref(cs).slots_used())
    }

    /// Dispatch one queued transaction: run `hook`, then clock the payload out
    /// on `spi`. Returns `Ok(false)` when nothing was queued.
    pub fn service<SPI, H>(&self, spi: &mut SPI, hook: &mut H) -> Result<bool, TransportError>
    where
        SPI: SpiDevice<u8>,
        H: PreTransfer,
    {
        let next = critical_section::with(|cs| {
            let mut s = self.state.borrow_ref_mut(cs);
            if let Some(e) = s.fault {
                return Err(e);
            }
            let t = s.pending.pop_front();
            s.in_flight = t.is_some();
            Ok(t)
        })?;
        let Some(t) = next else {
            return Ok(false);
        };

        hook.pre_transfer(&t);
        let sent = spi.write(t.payload().wire_bytes());

        critical_section::with(|cs| {
            let mut s = self.state.borrow_ref_mut(cs);
            s.in_flight = false;
            match sent {
                Ok(()) => {
                    // a slot was reserved for it at submission
                    let _ = s.done.push_back(t);
                    Ok(true)
                }
                Err(e) => {
                    let e = TransportError::Bus(e.kind());
                    s.fault = Some(e);
                    Err(e)
                }
            }
        })
    }
}

impl<const N: usize> Transport for QueuedBus<N> {
    fn submit(&self, transaction: Transaction) -> Result<(), TransportError> {
        let mut t = transaction;
        loop {
            let refused = critical_section::with(|cs| {
                let mut s = self.state.borrow_ref_mut(cs);
                if let Some(e) = s.fault {
                    return Err(e);
                }
                if s.closed {
                    return Err(TransportError::Closed);
                }
                if s.slots_used() >= N {
                    return Ok(Some(t));
                }
                Ok(s.pending.push_back(t).err())
            })?;
            match refused {
                None => return Ok(()),
                Some(back) => {
                    t = back;
                    core::hint::spin_loop();
                }
            }
        }
    }

    fn poll_completed(&self) -> Result<Option<Transaction>, TransportError> {
        critical_section::with(|cs| {
            let mut s = self.state.borrow_ref_mut(cs);
            match s.fault {
                Some(e) => Err(e),
                None => Ok(s.done.pop_front()),
            }
        })
    }
}

/// Dispatch queued transactions until `shutdown` is set.
pub fn run_dispatch_loop<const N: usize, SPI, H>(
    bus: &QueuedBus<N>,
    spi: &mut SPI,
    hook: &mut H,
    shutdown: &AtomicBool,
) -> Result<(), TransportError>
where
    SPI: SpiDevice<u8>,
    H: PreTransfer,
{
    while !shutdown.load(Ordering::Acquire) {
        if !bus.service(spi, hook)? {
            core::hint::spin_loop();
        }
    }
    Ok(())
}
