//! Window-and-write pipeline.
//!
//! A draw becomes `5 + N` transactions: CASET, column range, PASET, page
//! range, RAMWR, then the pixel payload split into chunks of at most
//! [`CHUNK_PIXELS`]. They are queued in that order and the call returns as
//! soon as the transport has accepted all of them.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ops::Range;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::IntoStorage;
use embedded_graphics::primitives::Rectangle;

use crate::error::{DisplayError, RegionError};
use crate::transaction::{Completion, PixelSource, Transaction};
use crate::transport::Transport;

/// Transfer-size limit of a single payload transaction, in pixels.
pub const CHUNK_PIXELS: usize = 1024;

/// Transactions queued ahead of the pixel payload.
pub const CONTROL_TRANSACTIONS: usize = 5;

pub const CMD_COLUMN_ADDRESS_SET: u8 = 0x2A;
pub const CMD_PAGE_ADDRESS_SET: u8 = 0x2B;
pub const CMD_MEMORY_WRITE: u8 = 0x2C;

/// Rectangle on the panel, in pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Region {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Check the region and return the inclusive window end `(x1, y1)`.
    pub fn window_end(&self) -> Result<(u16, u16), RegionError> {
        if self.width == 0 || self.height == 0 {
            return Err(RegionError::EmptyDimension);
        }
        let x1 = self.x.checked_add(self.width - 1).ok_or(RegionError::CoordinateOverflow)?;
        let y1 = self.y.checked_add(self.height - 1).ok_or(RegionError::CoordinateOverflow)?;
        Ok((x1, y1))
    }
}

impl TryFrom<Rectangle> for Region {
    type Error = RegionError;

    fn try_from(r: Rectangle) -> Result<Self, Self::Error> {
        if r.size.width == 0 || r.size.height == 0 {
            return Err(RegionError::EmptyDimension);
        }
        let field = |v: i64| u16::try_from(v).map_err(|_| RegionError::CoordinateOverflow);
        let region = Region {
            x: field(r.top_left.x as i64)?,
            y: field(r.top_left.y as i64)?,
            width: field(r.size.width as i64)?,
            height: field(r.size.height as i64)?,
        };
        region.window_end()?;
        Ok(region)
    }
}

/// Pixels handed to [`draw_region`].
///
/// To redraw from a buffer the caller keeps changing, transfer a clone of an
/// `Arc` it holds on to: the reaper drops the driver's references after the
/// last chunk and `Arc::get_mut` on the kept handle succeeds again from then
/// on.
#[derive(Clone, Debug)]
pub enum PixelBuffer {
    /// Caller keeps the buffer. It is only read and can never change.
    Retained(&'static [u16]),
    /// Ownership moves into the driver; released by the reaper once the last
    /// chunk has gone out.
    Transferred(Arc<[u16]>),
}

impl PixelBuffer {
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            PixelBuffer::Retained(p) => p.len(),
            PixelBuffer::Transferred(p) => p.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn owns_buffer(&self) -> bool {
        matches!(self, PixelBuffer::Transferred(_))
    }

    fn into_source(self) -> PixelSource {
        match self {
            PixelBuffer::Retained(p) => PixelSource::Static(p),
            PixelBuffer::Transferred(p) => PixelSource::Shared(p),
        }
    }
}

impl From<Vec<u16>> for PixelBuffer {
    fn from(pixels: Vec<u16>) -> Self {
        PixelBuffer::Transferred(Arc::from(pixels))
    }
}

/// How a payload of `pixel_count` pixels is split.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    pub count: usize,
    /// Pixels in the final chunk; a full chunk when the count divides evenly.
    pub last: usize,
}

impl ChunkPlan {
    pub const fn new(pixel_count: usize) -> Self {
        if pixel_count == 0 {
            return Self { count: 0, last: 0 };
        }
        let remainder = pixel_count % CHUNK_PIXELS;
        Self {
            count: pixel_count.div_ceil(CHUNK_PIXELS),
            last: if remainder == 0 { CHUNK_PIXELS } else { remainder },
        }
    }

    /// Pixel range of chunk `i`.
    pub fn range(&self, i: usize) -> Range<usize> {
        let start = i * CHUNK_PIXELS;
        let len = if i + 1 == self.count { self.last } else { CHUNK_PIXELS };
        start..start + len
    }
}

#[inline]
fn address_range(start: u16, end: u16) -> [u8; 4] {
    let [s_hi, s_lo] = start.to_be_bytes();
    let [e_hi, e_lo] = end.to_be_bytes();
    [s_hi, s_lo, e_hi, e_lo]
}

/// Build the ordered transaction list for one draw. The last payload chunk
/// carries the buffer's completion metadata.
pub fn build_transactions(
    region: &Region,
    pixels: PixelBuffer,
) -> Result<Vec<Transaction>, RegionError> {
    let (x1, y1) = region.window_end()?;
    let pixel_count = region.pixel_count();
    if pixels.len() != pixel_count {
        return Err(RegionError::LengthMismatch { expected: pixel_count, actual: pixels.len() });
    }

    let plan = ChunkPlan::new(pixel_count);
    log::debug!(
        "draw {}x{} at ({},{}): pixels {}, chunks {}, last {}",
        region.width, region.height, region.x, region.y, pixel_count, plan.count, plan.last
    );

    let mut out = Vec::with_capacity(CONTROL_TRANSACTIONS + plan.count);
    out.push(Transaction::command(CMD_COLUMN_ADDRESS_SET));
    out.push(Transaction::arguments(&address_range(region.x, x1)));
    out.push(Transaction::command(CMD_PAGE_ADDRESS_SET));
    out.push(Transaction::arguments(&address_range(region.y, y1)));
    out.push(Transaction::command(CMD_MEMORY_WRITE));

    let source = pixels.into_source();
    for i in 0..plan.count - 1 {
        out.push(Transaction::pixels(source.clone(), plan.range(i)));
    }
    let last = plan.range(plan.count - 1);
    out.push(Transaction::pixels(source.clone(), last).with_completion(Completion::new(source)));
    Ok(out)
}

/// Queue a draw of `pixels` into `region`.
///
/// Returns once every transaction has been accepted by the transport, not when
/// they have been sent. Region errors are reported before anything is queued.
/// A transferred buffer is never handed back, not even on error.
///
/// When the transport refuses a transaction the rest of the draw is dropped.
/// If no payload chunk had been queued yet, that drop frees a transferred
/// buffer here; otherwise the queued chunks keep it alive and the reaper frees
/// it with the last of them.
pub fn draw_region<T: Transport + ?Sized>(
    bus: &T,
    region: Region,
    pixels: PixelBuffer,
) -> Result<(), DisplayError> {
    let owned = pixels.owns_buffer();
    let transactions = build_transactions(&region, pixels)?;
    for (index, t) in transactions.into_iter().enumerate() {
        bus.submit(t).map_err(|source| {
            log::error!("draw: transaction {} refused: {}", index, source);
            if owned && index <= CONTROL_TRANSACTIONS {
                log::debug!("draw: no pixels queued, buffer dropped with the draw");
            }
            DisplayError::Submission { index, source }
        })?;
    }
    Ok(())
}

/// Fill `region` with one pixel value, already in wire order.
pub fn fill_region<T: Transport + ?Sized>(
    bus: &T,
    region: Region,
    raw: u16,
) -> Result<(), DisplayError> {
    region.window_end()?;
    let pixels: Arc<[u16]> = core::iter::repeat(raw).take(region.pixel_count()).collect();
    draw_region(bus, region, PixelBuffer::Transferred(pixels))
}

/// Colour in the controller's big-endian byte order, ready to store in a
/// pixel buffer.
#[inline]
pub fn wire_color(color: Rgb565) -> u16 {
    u16::from_ne_bytes(color.into_storage().to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use crate::transaction::{ControlTag, Payload};
    use crate::transport::TransportError;
    use embedded_graphics::prelude::{Point, RgbColor, Size};
    use std::vec;

    fn owned(n: usize) -> PixelBuffer {
        PixelBuffer::from(vec![0xA5A5u16; n])
    }

    fn payload_lengths(ts: &[Transaction]) -> Vec<usize> {
        ts[CONTROL_TRANSACTIONS..].iter().map(|t| t.payload().pixel_count()).collect()
    }

    #[test]
    fn single_full_chunk() {
        let bus = MockTransport::new();
        draw_region(&bus, Region::new(0, 0, 32, 32), owned(1024)).unwrap();
        let ts = bus.take_submitted();
        assert_eq!(ts.len(), 6);
        assert_eq!(ts[5].bit_len(), 16 * 1024);
        assert!(ts[5].completion().unwrap().owns_buffer());
    }

    #[test]
    fn exact_multiple_has_no_trailing_chunk() {
        let ts = build_transactions(&Region::new(0, 0, 64, 64), owned(4096)).unwrap();
        assert_eq!(payload_lengths(&ts), [1024, 1024, 1024, 1024]);
    }

    #[test]
    fn small_region_does_not_overrun() {
        let ts = build_transactions(&Region::new(5, 5, 10, 10), owned(100)).unwrap();
        assert_eq!(payload_lengths(&ts), [100]);
        assert_eq!(ts[5].bit_len(), 1600);
    }

    #[test]
    fn remainder_chunk_is_last() {
        let ts = build_transactions(&Region::new(0, 0, 41, 25), owned(1025)).unwrap();
        assert_eq!(payload_lengths(&ts), [1024, 1]);
    }

    #[test]
    fn chunks_cover_every_pixel_once() {
        for &(w, h) in &[(1u16, 1u16), (1, 1023), (32, 32), (33, 31), (320, 240), (100, 77)] {
            let n = w as usize * h as usize;
            let ts = build_transactions(&Region::new(0, 0, w, h), owned(n)).unwrap();
            let payload = &ts[CONTROL_TRANSACTIONS..];
            assert_eq!(payload.len(), n.div_ceil(CHUNK_PIXELS));
            assert_eq!(payload.iter().map(|t| t.bit_len()).sum::<usize>(), 16 * n);

            let mut next = 0;
            for t in payload {
                match t.payload() {
                    Payload::Pixels { range, .. } => {
                        assert_eq!(range.start, next);
                        assert!(!range.is_empty());
                        next = range.end;
                    }
                    other => panic!("unexpected payload {:?}", other),
                }
            }
            assert_eq!(next, n);
        }
    }

    #[test]
    fn control_sequence_precedes_payload() {
        let bus = MockTransport::new();
        draw_region(&bus, Region::new(10, 20, 30, 40), owned(1200)).unwrap();
        let ts = bus.take_submitted();

        let tags: Vec<_> = ts.iter().map(|t| t.tag()).collect();
        assert_eq!(
            tags,
            [
                ControlTag::Command,
                ControlTag::Continuation,
                ControlTag::Command,
                ControlTag::Continuation,
                ControlTag::Command,
                ControlTag::Data,
                ControlTag::Data,
            ]
        );
        assert_eq!(ts[0].payload().wire_bytes(), &[CMD_COLUMN_ADDRESS_SET]);
        assert_eq!(ts[1].payload().wire_bytes(), &[0, 10, 0, 39]);
        assert_eq!(ts[2].payload().wire_bytes(), &[CMD_PAGE_ADDRESS_SET]);
        assert_eq!(ts[3].payload().wire_bytes(), &[0, 20, 0, 59]);
        assert_eq!(ts[4].payload().wire_bytes(), &[CMD_MEMORY_WRITE]);
    }

    #[test]
    fn window_encodes_high_bytes() {
        let ts = build_transactions(&Region::new(0x0100, 0x00FF, 0x40, 2), owned(0x80)).unwrap();
        assert_eq!(ts[1].payload().wire_bytes(), &[0x01, 0x00, 0x01, 0x3F]);
        assert_eq!(ts[3].payload().wire_bytes(), &[0x00, 0xFF, 0x01, 0x00]);
    }

    #[test]
    fn only_last_chunk_carries_completion() {
        let ts = build_transactions(&Region::new(0, 0, 64, 40), owned(2560)).unwrap();
        let with_meta: Vec<usize> = ts
            .iter()
            .enumerate()
            .filter(|(_, t)| t.completion().is_some())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(with_meta, [ts.len() - 1]);
    }

    #[test]
    fn retained_buffer_is_not_owned() {
        static FRAME: [u16; 16] = [0; 16];
        let ts = build_transactions(&Region::new(0, 0, 4, 4), PixelBuffer::Retained(&FRAME)).unwrap();
        assert!(!ts.last().unwrap().completion().unwrap().owns_buffer());
    }

    #[test]
    fn invalid_regions_queue_nothing() {
        let bus = MockTransport::new();

        let err = draw_region(&bus, Region::new(0, 0, 0, 10), owned(0)).unwrap_err();
        assert_eq!(err, DisplayError::InvalidRegion(RegionError::EmptyDimension));

        let err = draw_region(&bus, Region::new(0, 0, 10, 10), owned(99)).unwrap_err();
        assert_eq!(
            err,
            DisplayError::InvalidRegion(RegionError::LengthMismatch { expected: 100, actual: 99 })
        );

        let err = draw_region(&bus, Region::new(u16::MAX, 0, 2, 1), owned(2)).unwrap_err();
        assert_eq!(err, DisplayError::InvalidRegion(RegionError::CoordinateOverflow));

        assert_eq!(bus.submit_calls(), 0);
    }

    #[test]
    fn submission_failure_reports_index() {
        let bus = MockTransport::failing_at(3);
        let pixels: Arc<[u16]> = Arc::from(vec![0u16; 64]);
        let weak = Arc::downgrade(&pixels);
        let err = draw_region(&bus, Region::new(0, 0, 8, 8), PixelBuffer::Transferred(pixels))
            .unwrap_err();
        assert_eq!(err, DisplayError::Submission { index: 3, source: TransportError::Closed });
        // nothing queued references the pixels, so they went with the draw
        assert!(weak.upgrade().is_none());
        assert_eq!(bus.take_submitted().len(), 3);
    }

    #[test]
    fn submission_failure_keeps_queued_chunks_valid() {
        let bus = MockTransport::failing_at(6);
        let pixels: Arc<[u16]> = Arc::from(vec![0x1234u16; 3000]);
        let weak = Arc::downgrade(&pixels);
        draw_region(&bus, Region::new(0, 0, 60, 50), PixelBuffer::Transferred(pixels))
            .unwrap_err();

        let ts = bus.take_submitted();
        assert_eq!(ts.len(), 6);
        assert!(ts.iter().all(|t| t.completion().is_none()));
        assert_eq!(ts[5].payload().wire_bytes().len(), 2 * CHUNK_PIXELS);
        assert!(weak.upgrade().is_some());
        drop(ts);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn kept_handle_is_writable_after_draw_is_dropped() {
        let mut frame: Arc<[u16]> = Arc::from(vec![0u16; 4]);
        let bus = MockTransport::new();
        draw_region(&bus, Region::new(0, 0, 2, 2), PixelBuffer::Transferred(frame.clone()))
            .unwrap();
        assert!(Arc::get_mut(&mut frame).is_none());
        drop(bus.take_submitted());
        Arc::get_mut(&mut frame).unwrap()[0] = 0xFFFF;
    }

    #[test]
    fn region_from_rectangle() {
        let r = Region::try_from(Rectangle::new(Point::new(3, 4), Size::new(5, 6))).unwrap();
        assert_eq!(r, Region::new(3, 4, 5, 6));

        let neg = Rectangle::new(Point::new(-1, 0), Size::new(5, 6));
        assert_eq!(Region::try_from(neg), Err(RegionError::CoordinateOverflow));

        let empty = Rectangle::new(Point::new(0, 0), Size::new(0, 6));
        assert_eq!(Region::try_from(empty), Err(RegionError::EmptyDimension));
    }

    #[test]
    fn fill_region_queues_owned_pixels() {
        let bus = MockTransport::new();
        let red = wire_color(Rgb565::RED);
        fill_region(&bus, Region::new(0, 0, 3, 2), red).unwrap();
        let ts = bus.take_submitted();
        assert_eq!(ts.len(), 6);
        assert!(ts[5].completion().unwrap().owns_buffer());
        let bytes = ts[5].payload().wire_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..2], &[0xF8, 0x00]);
    }
}
