//! Four-slot field ring.
//!
//! [`FieldRing`] holds the node fields of one turbine at the time levels
//! n-2, n-1, n and n+1 in a fixed array addressed through a head index.
//! Shifting to the next driver step moves the head; no slot is
//! reallocated.

use std::mem;

use aerolink_core::{FieldKind, NodeFields, TimeSlot};

const SLOTS: usize = 4;

/// Largest number of valid past levels (n, n-1, n-2).
pub const MAX_HISTORY_DEPTH: u8 = 3;

/// The four time levels of one turbine.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRing {
    slots: [NodeFields; SLOTS],
    /// Physical index of the n-2 slot.
    head: usize,
    /// Valid levels among n, n-1, n-2.
    depth: u8,
}

impl FieldRing {
    /// A zero-filled ring with a single valid level.
    pub fn new(n_vel: usize, n_force: usize) -> Self {
        let slot = NodeFields::new(n_vel, n_force);
        Self {
            slots: [slot.clone(), slot.clone(), slot.clone(), slot],
            head: 0,
            depth: 1,
        }
    }

    /// Rebuild a ring from slots ordered n-2, n-1, n, n+1.
    ///
    /// `depth` is clamped to `1..=3`.
    pub fn from_ordered(slots: [NodeFields; SLOTS], depth: u8) -> Self {
        Self {
            slots,
            head: 0,
            depth: depth.clamp(1, MAX_HISTORY_DEPTH),
        }
    }

    fn index(&self, slot: TimeSlot) -> usize {
        (self.head + slot.offset()) % SLOTS
    }

    /// Fields at `slot`.
    pub fn get(&self, slot: TimeSlot) -> &NodeFields {
        &self.slots[self.index(slot)]
    }

    /// Mutable fields at `slot`.
    pub fn get_mut(&mut self, slot: TimeSlot) -> &mut NodeFields {
        let i = self.index(slot);
        &mut self.slots[i]
    }

    /// Number of valid levels among n, n-1, n-2.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Slots ordered n-2, n-1, n, n+1.
    pub fn ordered(&self) -> [&NodeFields; SLOTS] {
        TimeSlot::ALL.map(|s| self.get(s))
    }

    /// Owned copy of the slots ordered n-2, n-1, n, n+1.
    pub fn to_ordered(&self) -> [NodeFields; SLOTS] {
        TimeSlot::ALL.map(|s| self.get(s).clone())
    }

    /// Overwrite every other slot with n+1 and reset the depth to one.
    pub fn seed_all_from_np1(&mut self) {
        let src = self.index(TimeSlot::Np1);
        let np1 = mem::replace(&mut self.slots[src], NodeFields::new(0, 0));
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if i != src {
                slot.copy_from(&np1);
            }
        }
        self.slots[src] = np1;
        self.depth = 1;
    }

    /// Shift to the next driver step.
    ///
    /// n+1 becomes n, n becomes n-1, n-1 becomes n-2. The old n-2 storage
    /// is reused as the new n+1 and reseeded from the new n.
    pub fn advance(&mut self) {
        self.head = (self.head + 1) % SLOTS;
        let n = self.index(TimeSlot::N);
        let np1 = self.index(TimeSlot::Np1);
        let src = mem::replace(&mut self.slots[n], NodeFields::new(0, 0));
        self.slots[np1].copy_from(&src);
        self.slots[n] = src;
        self.depth = (self.depth + 1).min(MAX_HISTORY_DEPTH);
    }

    /// Predict n+1 from the valid past levels.
    ///
    /// With three levels, quadratic backward-difference extrapolation
    /// `3f(n) - 3f(n-1) + f(n-2)`; with two, linear `2f(n) - f(n-1)`; with
    /// one, a zeroth-order hold. Only the structural fields are predicted;
    /// reference positions and sampled flow velocities are left alone.
    pub fn extrapolate_np1(&mut self) {
        let i = self.index(TimeSlot::Np1);
        let mut np1 = mem::replace(&mut self.slots[i], NodeFields::new(0, 0));
        let n = self.get(TimeSlot::N);
        let nm1 = self.get(TimeSlot::Nm1);
        let nm2 = self.get(TimeSlot::Nm2);
        for kind in FieldKind::ALL.into_iter().filter(|k| k.is_extrapolated()) {
            let out = np1.field_mut(kind);
            let f0 = n.field(kind);
            match self.depth {
                1 => out.copy_from_slice(f0),
                2 => {
                    let f1 = nm1.field(kind);
                    for (o, (a, b)) in out.iter_mut().zip(f0.iter().zip(f1)) {
                        *o = 2.0 * a - b;
                    }
                }
                _ => {
                    let f1 = nm1.field(kind);
                    let f2 = nm2.field(kind);
                    for (k, o) in out.iter_mut().enumerate() {
                        *o = 3.0 * f0[k] - 3.0 * f1[k] + f2[k];
                    }
                }
            }
        }
        self.slots[i] = np1;
    }
}
