// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ring buffer for tracing driver activity
//!
//! A `Ringbuf` records the most recent `N` events of some `Copy + PartialEq`
//! payload type, along with the source line that recorded them. It is meant to
//! be owned by whatever it instruments (typically inside the same lock as the
//! state it describes) rather than living in a static, so that independent
//! instances of a driver keep independent histories.
//!
//! ## Recording entries
//!
//! ```
//! use ringbuf::{ringbuf_entry, Ringbuf};
//!
//! #[derive(Copy, Clone, PartialEq)]
//! enum Trace {
//!     None,
//!     Enabled(u8),
//! }
//!
//! let mut trace: Ringbuf<Trace, 16> = Ringbuf::new(Trace::None);
//! ringbuf_entry!(trace, Trace::Enabled(3));
//! assert!(trace.recent().any(|e| e.payload == Trace::Enabled(3)));
//! ```
//!
//! When an entry is recorded with an identical payload from the same line as
//! the most recent entry, the existing entry's `count` is bumped instead of
//! consuming a new slot. This keeps polling loops from flushing the history.

#![no_std]

/// Inserts `payload` into the ring buffer `buf`, tagging it with the calling
/// line.
///
/// `buf` may be any place expression of type `Ringbuf<T, N>` (a field, a
/// local, or `*some_mut_ref`).
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluate the payload before borrowing the buffer, so that payloads
        // may read from the structure that owns the buffer.
        let p = $payload;
        $crate::Ringbuf::entry(&mut $buf, line!() as u16, p);
    }};
}

///
/// The structure of a single [`Ringbuf`] entry. When an entry is generated with
/// an identical payload to the most recent entry (in terms of both `line` and
/// `payload`), `count` will be incremented rather than generating a new entry.
///
#[derive(Debug, Copy, Clone)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

///
/// A ring buffer of parametrized type and size.
///
#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    last: Option<usize>,
    buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, { N }> {
    /// Creates an empty ring buffer, with every slot holding `init`.
    pub const fn new(init: T) -> Self {
        Self {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: init,
            }; N],
        }
    }

    pub fn entry(&mut self, line: u16, payload: T) {
        // On first use `last` is None; treating that as an out-of-range index
        // makes us skip the reuse check and deposit the entry in slot 0.
        let last = self.last.unwrap_or(usize::MAX);

        // `get_mut` also protects us from a corrupted `last`, in which case we
        // simply start over at 0.
        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                // Only reuse this entry if we don't overflow the count.
                if let Some(new_count) = ent.count.checked_add(1) {
                    ent.count = new_count;
                    return;
                }
            }
        }

        let ndx = {
            let last_plus_1 = last.wrapping_add(1);
            if last_plus_1 >= self.buffer.len() {
                0
            } else {
                last_plus_1
            }
        };

        let ent = &mut self.buffer[ndx];
        *ent = RingbufEntry {
            line,
            payload,
            count: 1,
            generation: ent.generation.wrapping_add(1),
        };

        self.last = Some(ndx);
    }

    /// Returns the most recently recorded entry, if any.
    pub fn last(&self) -> Option<&RingbufEntry<T>> {
        self.last.and_then(|ndx| self.buffer.get(ndx))
    }

    /// Iterates over recorded entries from oldest to newest. Slots that have
    /// never been written are skipped.
    pub fn recent(&self) -> impl Iterator<Item = &RingbufEntry<T>> + '_ {
        let start = match self.last {
            Some(last) => last + 1,
            None => N,
        };
        (0..N)
            .map(move |i| &self.buffer[(start + i) % N])
            .filter(|ent| ent.count != 0)
    }
}
