//! Contract between the drawing pipeline and whatever executes transactions.

use core::fmt;

use embedded_hal::spi::ErrorKind;

use crate::transaction::Transaction;

/// Failure reported by a transport.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// The transport no longer accepts work.
    Closed,
    /// A transfer failed on the wire; the transport is unusable afterwards.
    Bus(ErrorKind),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Closed => f.write_str("transport closed"),
            TransportError::Bus(kind) => write!(f, "bus fault: {}", kind),
        }
    }
}

/// Ordered, queue-based transaction execution.
///
/// Transactions are executed on the wire in submission order and come back
/// from the retrieval calls in that same order.
pub trait Transport {
    /// Queue a transaction. May block while every slot is in use.
    fn submit(&self, transaction: Transaction) -> Result<(), TransportError>;

    /// Next completed transaction, if one is ready.
    fn poll_completed(&self) -> Result<Option<Transaction>, TransportError>;

    /// Block until the next transaction completes.
    fn retrieve_completed(&self) -> Result<Transaction, TransportError> {
        loop {
            if let Some(t) = self.poll_completed()? {
                return Ok(t);
            }
            core::hint::spin_loop();
        }
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn submit(&self, transaction: Transaction) -> Result<(), TransportError> {
        (**self).submit(transaction)
    }

    fn poll_completed(&self) -> Result<Option<Transaction>, TransportError> {
        (**self).poll_completed()
    }

    fn retrieve_completed(&self) -> Result<Transaction, TransportError> {
        (**self).retrieve_completed()
    }
}

/// Hook run right before a transaction's bits leave the bus.
///
/// Runs in the dispatch path: must not block, allocate or fail.
pub trait PreTransfer {
    fn pre_transfer(&mut self, transaction: &Transaction);
}

impl<F: FnMut(&Transaction)> PreTransfer for F {
    fn pre_transfer(&mut self, transaction: &Transaction) {
        self(transaction)
    }
}
