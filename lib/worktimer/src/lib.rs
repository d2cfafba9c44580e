// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A deadline table for deferred work items.
//!
//! `WorkTimer` tracks one deadline per variant of an enum type, so a driver
//! can treat a single owner-provided clock as a set of independent one-shot
//! work timers. The expected usage model is:
//!
//! - Create an `enum` naming your work items and derive the `Enum` trait
//!   (from the `enum_map` crate) for it.
//!
//! - Create a `WorkTimer<YourEnumType>`.
//!
//! - Schedule and cancel work with `schedule_at`/`cancel`.
//!
//! - Periodically (or when your owner's timer notification arrives) call
//!   `poll` with the current time, then drain `iter_fired`.
//!
//! Unlike a timer multiplexer bound to an OS timer, `WorkTimer` never makes
//! a syscall: the owner injects time explicitly, which also makes the type
//! directly testable on the host. Use `next_deadline` to decide how long the
//! owner may sleep.

#![cfg_attr(target_os = "none", no_std)]

use enum_map::{EnumArray, EnumMap};

#[derive(Copy, Clone, Default)]
pub struct Slot {
    deadline: Option<u64>,
    fired_but_not_observed: bool,
}

pub struct WorkTimer<E: EnumArray<Slot>> {
    slots: EnumMap<E, Slot>,
}

impl<E: EnumArray<Slot> + Copy> Default for WorkTimer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EnumArray<Slot> + Copy> WorkTimer<E> {
    pub fn new() -> Self {
        Self {
            slots: EnumMap::default(),
        }
    }

    /// Schedules `which` to fire at time `deadline`, replacing any prior
    /// setting for the same item. A deadline that is already in the past
    /// fires on the next `poll`.
    pub fn schedule_at(&mut self, which: E, deadline: u64) {
        self.slots[which].deadline = Some(deadline);
    }

    /// Cancels `which`. Returns whether it had been scheduled. A fired but
    /// not yet observed event is left in place.
    pub fn cancel(&mut self, which: E) -> bool {
        self.slots[which].deadline.take().is_some()
    }

    /// Whether `which` is scheduled and has not yet fired.
    pub fn is_pending(&self, which: E) -> bool {
        self.slots[which].deadline.is_some()
    }

    /// The earliest scheduled deadline, if any; how long the owner may
    /// sleep before the next `poll` is due.
    pub fn next_deadline(&self) -> Option<u64> {
        self.slots
            .values()
            .filter_map(|slot| slot.deadline)
            .min()
    }

    /// Marks every work item whose deadline has elapsed at time `now` as
    /// fired. Fired items are read out (destructively) with `iter_fired`.
    pub fn poll(&mut self, now: u64) {
        for slot in self.slots.values_mut() {
            if let Some(deadline) = slot.deadline {
                if deadline <= now {
                    slot.deadline = None;
                    slot.fired_but_not_observed = true;
                }
            }
        }
    }

    /// Returns an iterator over work items that have fired since they were
    /// last observed, in declaration order. Dropping the iterator early
    /// leaves the unobserved items for the next call.
    pub fn iter_fired(&mut self) -> impl Iterator<Item = E> + '_ {
        self.slots.iter_mut().filter_map(|(e, slot)| {
            if core::mem::replace(&mut slot.fired_but_not_observed, false) {
                Some(e)
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enum_map::Enum;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
    enum Work {
        A,
        B,
    }

    #[test]
    fn nothing_fired() {
        let mut uut = WorkTimer::new();
        uut.poll(1_000_000);
        assert_eq!(uut.iter_fired().next(), None::<Work>);
    }

    #[test]
    fn fires_at_deadline() {
        let mut uut = WorkTimer::new();
        uut.schedule_at(Work::A, 100);

        uut.poll(99);
        assert_eq!(uut.iter_fired().next(), None);
        assert!(uut.is_pending(Work::A));

        uut.poll(100);
        assert_eq!(uut.iter_fired().collect::<Vec<_>>(), [Work::A]);
        assert!(!uut.is_pending(Work::A));

        // One-shot: no further events.
        uut.poll(10_000);
        assert_eq!(uut.iter_fired().next(), None);
    }

    #[test]
    fn reschedule_replaces() {
        let mut uut = WorkTimer::new();
        uut.schedule_at(Work::A, 100);
        uut.schedule_at(Work::A, 500);

        uut.poll(200);
        assert_eq!(uut.iter_fired().next(), None);

        uut.poll(500);
        assert_eq!(uut.iter_fired().collect::<Vec<_>>(), [Work::A]);
    }

    #[test]
    fn cancel_prevents_firing() {
        let mut uut = WorkTimer::new();
        uut.schedule_at(Work::B, 10);
        assert!(uut.cancel(Work::B));
        assert!(!uut.cancel(Work::B));

        uut.poll(1000);
        assert_eq!(uut.iter_fired().next(), None);
    }

    #[test]
    fn next_deadline_is_earliest() {
        let mut uut = WorkTimer::new();
        assert_eq!(uut.next_deadline(), None);

        uut.schedule_at(Work::A, 300);
        uut.schedule_at(Work::B, 200);
        assert_eq!(uut.next_deadline(), Some(200));

        uut.cancel(Work::B);
        assert_eq!(uut.next_deadline(), Some(300));
    }

    #[test]
    fn fired_items_in_declaration_order() {
        let mut uut = WorkTimer::new();
        uut.schedule_at(Work::B, 5);
        uut.schedule_at(Work::A, 7);
        uut.poll(10);
        assert_eq!(uut.iter_fired().collect::<Vec<_>>(), [Work::A, Work::B]);
    }

    #[test]
    fn unobserved_events_persist() {
        let mut uut = WorkTimer::new();
        uut.schedule_at(Work::A, 5);
        uut.schedule_at(Work::B, 5);
        uut.poll(5);

        // Observe only the first event.
        assert_eq!(uut.iter_fired().next(), Some(Work::A));
        // The second is still there.
        assert_eq!(uut.iter_fired().collect::<Vec<_>>(), [Work::B]);
    }
}
