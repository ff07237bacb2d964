//! Transaction records handed to the bus transport.
//!
//! Every unit of wire work is a [`Transaction`]: a control tag telling the
//! D/C arbiter what level to drive, a payload (a few inline command/address
//! bytes or a slice of a pixel buffer) and optional completion metadata that
//! the reaper acts on once the hardware is done with it.

use alloc::sync::Arc;
use core::ops::Range;

/// Largest payload stored inline in the transaction itself.
pub const INLINE_CAPACITY: usize = 4;

/// Which level the shared D/C line needs while this transaction is on the wire.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ControlTag {
    /// Controller command byte, D/C low.
    Command,
    /// Argument or pixel data, D/C high.
    Data,
    /// Logically data following a command; leaves the line at data level.
    #[default]
    Continuation,
}

/// Backing memory of a pixel payload.
#[derive(Clone, Debug)]
pub enum PixelSource {
    /// Caller keeps ownership; the pixels are never released by the driver.
    Static(&'static [u16]),
    /// Ownership moved into the driver.
    Shared(Arc<[u16]>),
}

impl PixelSource {
    pub fn as_slice(&self) -> &[u16] {
        match self {
            PixelSource::Static(s) => s,
            PixelSource::Shared(s) => &s[..],
        }
    }

    /// Give up this reference to the pixels.
    pub fn release(self) -> Release {
        match self {
            PixelSource::Static(_) => Release::Retained,
            PixelSource::Shared(pixels) => {
                let last = Arc::strong_count(&pixels) == 1;
                drop(pixels);
                if last {
                    Release::Freed
                } else {
                    Release::StillShared
                }
            }
        }
    }
}

/// What a transaction puts on the wire.
#[derive(Clone, Debug)]
pub enum Payload {
    /// Short command or address payload, stored in the record.
    Inline { bytes: [u8; INLINE_CAPACITY], len: u8 },
    /// A range of pixels (16 bits each) inside an external buffer.
    Pixels { source: PixelSource, range: Range<usize> },
}

impl Payload {
    /// Inline payload from up to [`INLINE_CAPACITY`] bytes.
    pub fn inline(data: &[u8]) -> Self {
        debug_assert!(data.len() <= INLINE_CAPACITY, "inline payload of {} bytes", data.len());
        let len = data.len().min(INLINE_CAPACITY);
        let mut bytes = [0u8; INLINE_CAPACITY];
        bytes[..len].copy_from_slice(&data[..len]);
        Payload::Inline { bytes, len: len as u8 }
    }

    /// Length of the transfer in bits.
    pub fn bit_len(&self) -> usize {
        match self {
            Payload::Inline { len, .. } => 8 * (*len as usize),
            Payload::Pixels { range, .. } => 16 * range.len(),
        }
    }

    /// Pixels carried by this payload (zero for inline payloads).
    pub fn pixel_count(&self) -> usize {
        match self {
            Payload::Inline { .. } => 0,
            Payload::Pixels { range, .. } => range.len(),
        }
    }

    /// Bytes exactly as they are clocked out. Pixels go out in memory order,
    /// so callers store them already in the controller's byte order.
    pub fn wire_bytes(&self) -> &[u8] {
        match self {
            Payload::Inline { bytes, len } => &bytes[..*len as usize],
            Payload::Pixels { source, range } => {
                bytemuck::cast_slice(&source.as_slice()[range.clone()])
            }
        }
    }

    /// The pixel buffer behind this payload, if any.
    pub fn into_source(self) -> Option<PixelSource> {
        match self {
            Payload::Inline { .. } => None,
            Payload::Pixels { source, .. } => Some(source),
        }
    }
}

/// Completion metadata, attached to the last chunk of a draw.
#[derive(Debug)]
pub struct Completion {
    owns_buffer: bool,
    buffer: PixelSource,
}

/// Outcome of acting on a [`Completion`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Release {
    /// Buffer belongs to the caller, nothing to do.
    Retained,
    /// Buffer memory was freed by this call.
    Freed,
    /// Owned buffer still referenced elsewhere; it is freed with the last reference.
    StillShared,
}

impl Completion {
    pub fn new(buffer: PixelSource) -> Self {
        let owns_buffer = matches!(buffer, PixelSource::Shared(_));
        Self { owns_buffer, buffer }
    }

    #[inline]
    pub fn owns_buffer(&self) -> bool {
        self.owns_buffer
    }

    /// Give up the buffer reference. Consumes the metadata, so a buffer can be
    /// released at most once.
    pub fn release(self) -> Release {
        self.buffer.release()
    }
}

/// One unit of wire work.
#[derive(Debug)]
pub struct Transaction {
    tag: ControlTag,
    payload: Payload,
    completion: Option<Completion>,
}

impl Transaction {
    pub fn new(tag: ControlTag, payload: Payload) -> Self {
        Self { tag, payload, completion: None }
    }

    /// A single command byte.
    pub fn command(cmd: u8) -> Self {
        Self::new(ControlTag::Command, Payload::inline(&[cmd]))
    }

    /// Argument bytes following a command.
    pub fn arguments(data: &[u8]) -> Self {
        Self::new(ControlTag::Continuation, Payload::inline(data))
    }

    /// A chunk of pixels from `source`.
    pub fn pixels(source: PixelSource, range: Range<usize>) -> Self {
        Self::new(ControlTag::Data, Payload::Pixels { source, range })
    }

    pub fn with_completion(mut self, completion: Completion) -> Self {
        self.completion = Some(completion);
        self
    }

    #[inline]
    pub fn tag(&self) -> ControlTag {
        self.tag
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    #[inline]
    pub fn bit_len(&self) -> usize {
        self.payload.bit_len()
    }

    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    /// Split into payload and completion so the payload's buffer reference can
    /// be dropped before the completion releases the buffer.
    pub fn into_parts(self) -> (Payload, Option<Completion>) {
        (self.payload, self.completion)
    }
}
