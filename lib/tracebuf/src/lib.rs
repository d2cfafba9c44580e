// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Owned event trace ring for instrumenting drivers.
//!
//! A `TraceBuf` is a fixed-capacity ring of `Copy + PartialEq` payloads that
//! a driver embeds in its context and records state transitions into. It is
//! meant for inspection with a debugger (or in unit tests), not for
//! formatted logging: recording an entry is a couple of stores, cheap enough
//! to leave in interrupt-path code.
//!
//! A run of identical consecutive payloads is coalesced into a single entry
//! with a repeat count, so a tight polling loop does not wipe out the
//! interesting history around it.

#![cfg_attr(target_os = "none", no_std)]

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Entry<T> {
    pub payload: T,
    /// Number of consecutive identical recordings folded into this entry.
    pub count: u32,
}

pub struct TraceBuf<T, const N: usize> {
    entries: [Option<Entry<T>>; N],
    /// Index of the most recently written entry.
    last: usize,
    /// Total number of `record` calls, including coalesced ones.
    total: u64,
}

impl<T: Copy + PartialEq, const N: usize> Default for TraceBuf<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + PartialEq, const N: usize> TraceBuf<T, N> {
    pub const fn new() -> Self {
        Self {
            entries: [None; N],
            last: 0,
            total: 0,
        }
    }

    /// Records `payload`, folding it into the previous entry when it is
    /// identical to it.
    pub fn record(&mut self, payload: T) {
        self.total = self.total.wrapping_add(1);

        if let Some(prev) = &mut self.entries[self.last] {
            if prev.payload == payload {
                prev.count = prev.count.saturating_add(1);
                return;
            }
        }

        let next = if self.entries[self.last].is_none() {
            // First recording lands in slot 0 rather than slot 1.
            self.last
        } else {
            (self.last + 1) % N
        };
        self.entries[next] = Some(Entry { payload, count: 1 });
        self.last = next;
    }

    /// The most recent entry, if anything has been recorded.
    pub fn last_entry(&self) -> Option<&Entry<T>> {
        self.entries[self.last].as_ref()
    }

    /// Total number of recordings, including coalesced repeats.
    pub fn total_recorded(&self) -> u64 {
        self.total
    }

    /// Iterates entries oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &Entry<T>> + '_ {
        let start = (self.last + 1) % N;
        (0..N)
            .map(move |i| &self.entries[(start + i) % N])
            .filter_map(|e| e.as_ref())
    }

    /// Number of times `payload` appears across all retained entries,
    /// counting coalesced repeats. Handy in tests.
    pub fn occurrences(&self, payload: T) -> u32 {
        self.iter()
            .filter(|e| e.payload == payload)
            .map(|e| e.count)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty() {
        let buf: TraceBuf<u32, 4> = TraceBuf::new();
        assert_eq!(buf.last_entry(), None);
        assert_eq!(buf.iter().count(), 0);
        assert_eq!(buf.total_recorded(), 0);
    }

    #[test]
    fn records_in_order() {
        let mut buf: TraceBuf<u32, 4> = TraceBuf::new();
        buf.record(1);
        buf.record(2);
        buf.record(3);

        let seen: Vec<u32> = buf.iter().map(|e| e.payload).collect();
        assert_eq!(seen, [1, 2, 3]);
        assert_eq!(buf.last_entry().unwrap().payload, 3);
    }

    #[test]
    fn coalesces_repeats() {
        let mut buf: TraceBuf<u32, 4> = TraceBuf::new();
        buf.record(7);
        buf.record(7);
        buf.record(7);
        buf.record(8);

        let seen: Vec<(u32, u32)> =
            buf.iter().map(|e| (e.payload, e.count)).collect();
        assert_eq!(seen, [(7, 3), (8, 1)]);
        assert_eq!(buf.total_recorded(), 4);
    }

    #[test]
    fn wraps_and_overwrites_oldest() {
        let mut buf: TraceBuf<u32, 3> = TraceBuf::new();
        for v in 0..5 {
            buf.record(v);
        }
        let seen: Vec<u32> = buf.iter().map(|e| e.payload).collect();
        assert_eq!(seen, [2, 3, 4]);
    }

    #[test]
    fn occurrences_counts_repeats() {
        let mut buf: TraceBuf<u32, 8> = TraceBuf::new();
        buf.record(5);
        buf.record(6);
        buf.record(5);
        buf.record(5);
        assert_eq!(buf.occurrences(5), 3);
        assert_eq!(buf.occurrences(6), 1);
        assert_eq!(buf.occurrences(9), 0);
    }
}
