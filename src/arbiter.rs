//! D/C line arbitration.
//!
//! The ILI9341 samples its D/C input together with the first bit of every
//! transfer: low for a command byte, high for arguments and pixels. Each
//! transaction carries the level it needs and [`ControlLine`] drives it just
//! before the transport clocks the transaction out.

use embedded_hal::digital::{OutputPin, PinState};

use crate::transaction::{ControlTag, Transaction};
use crate::transport::PreTransfer;

/// Level the D/C line must have for a transaction tagged `tag`.
#[inline]
pub const fn control_level(tag: ControlTag) -> PinState {
    match tag {
        ControlTag::Command => PinState::Low,
        ControlTag::Data | ControlTag::Continuation => PinState::High,
    }
}

/// The D/C output, installed as the transport's pre-transfer hook.
pub struct ControlLine<P> {
    pin: P,
}

impl<P: OutputPin> ControlLine<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Drive the line for `tag`. Pin errors are dropped; GPIO writes on the
    /// supported targets are infallible.
    #[inline]
    pub fn apply(&mut self, tag: ControlTag) {
        let _ = self.pin.set_state(control_level(tag));
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> PreTransfer for ControlLine<P> {
    #[inline]
    fn pre_transfer(&mut self, transaction: &Transaction) {
        self.apply(transaction.tag());
    }
}
