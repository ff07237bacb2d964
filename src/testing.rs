// Test doubles shared by the unit tests.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::vec::Vec;

use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::spi::{ErrorKind, ErrorType as SpiErrorType, Operation, SpiDevice};

use crate::transaction::Transaction;
use crate::transport::{Transport, TransportError};

/// Transport that completes transactions instantly, in submission order.
pub struct MockTransport {
    queue: RefCell<VecDeque<Transaction>>,
    submits: Cell<usize>,
    fail_submit_at: Option<usize>,
    fail_retrieval: Cell<bool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            submits: Cell::new(0),
            fail_submit_at: None,
            fail_retrieval: Cell::new(false),
        }
    }

    /// Refuses the submission with index `n` and everything after it.
    pub fn failing_at(n: usize) -> Self {
        Self { fail_submit_at: Some(n), ..Self::new() }
    }

    pub fn break_retrieval(&self) {
        self.fail_retrieval.set(true);
    }

    pub fn submit_calls(&self) -> usize {
        self.submits.get()
    }

    pub fn take_submitted(&self) -> Vec<Transaction> {
        self.queue.borrow_mut().drain(..).collect()
    }
}

impl Transport for MockTransport {
    fn submit(&self, transaction: Transaction) -> Result<(), TransportError> {
        let n = self.submits.get();
        self.submits.set(n + 1);
        if self.fail_submit_at.is_some_and(|f| n >= f) {
            return Err(TransportError::Closed);
        }
        self.queue.borrow_mut().push_back(transaction);
        Ok(())
    }

    fn poll_completed(&self) -> Result<Option<Transaction>, TransportError> {
        if self.fail_retrieval.get() {
            return Err(TransportError::Bus(ErrorKind::Other));
        }
        Ok(self.queue.borrow_mut().pop_front())
    }
}

/// What reached the wire, shared between the pin and SPI doubles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireEvent {
    Dc(bool),
    Write(Vec<u8>),
    DelayMs(u32),
}

pub type WireLog = Arc<Mutex<Vec<WireEvent>>>;

pub fn wire_log() -> WireLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Output pin that records its level changes.
pub struct LogPin {
    log: WireLog,
}

impl LogPin {
    pub fn new(log: &WireLog) -> Self {
        Self { log: log.clone() }
    }
}

impl PinErrorType for LogPin {
    type Error = Infallible;
}

impl OutputPin for LogPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.log.lock().unwrap().push(WireEvent::Dc(false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.log.lock().unwrap().push(WireEvent::Dc(true));
        Ok(())
    }
}

/// Output pin whose level changes are not interesting to the test.
pub struct NullPin;

impl PinErrorType for NullPin {
    type Error = Infallible;
}

impl OutputPin for NullPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// SPI device that records writes and can be told to fail after `n` of them.
pub struct LogSpi {
    log: WireLog,
    fail_after: Option<usize>,
    writes: usize,
}

impl LogSpi {
    pub fn new(log: &WireLog) -> Self {
        Self { log: log.clone(), fail_after: None, writes: 0 }
    }

    pub fn failing_after(log: &WireLog, n: usize) -> Self {
        Self { fail_after: Some(n), ..Self::new(log) }
    }
}

impl SpiErrorType for LogSpi {
    type Error = ErrorKind;
}

impl SpiDevice<u8> for LogSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
        for op in operations.iter() {
            if let Operation::Write(bytes) = op {
                if self.fail_after.is_some_and(|n| self.writes >= n) {
                    return Err(ErrorKind::Overrun);
                }
                self.writes += 1;
                self.log.lock().unwrap().push(WireEvent::Write(bytes.to_vec()));
            }
        }
        Ok(())
    }
}

/// Delay that only records what was asked of it.
pub struct LogDelay {
    log: WireLog,
}

impl LogDelay {
    pub fn new(log: &WireLog) -> Self {
        Self { log: log.clone() }
    }
}

impl embedded_hal::delay::DelayNs for LogDelay {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_ms(&mut self, ms: u32) {
        self.log.lock().unwrap().push(WireEvent::DelayMs(ms));
    }
}
