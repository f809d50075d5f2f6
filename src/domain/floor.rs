//! Floor: an ordered run of slots with its own active/inactive gate
//!
//! Slots are kept sorted by slot number, so declaration order (entrance
//! proximity) and numeric order are the same thing. Status can be flipped
//! while the floor is shared between gates.

use crate::domain::error::{ParkingError, Result};
use crate::domain::slot::Slot;
use crate::domain::strategy::SlotAssignmentStrategy;
use crate::domain::types::{FloorNumber, SlotNumber, VehicleType};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloorStatus {
    Active,
    Inactive,
}

impl FloorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FloorStatus::Active => "active",
            FloorStatus::Inactive => "inactive",
        }
    }
}

#[derive(Debug)]
pub struct Floor {
    number: FloorNumber,
    active: AtomicBool,
    slots: Vec<Slot>,
}

impl Floor {
    pub fn new(number: FloorNumber) -> Self {
        Self { number, active: AtomicBool::new(true), slots: Vec::new() }
    }

    #[inline]
    pub fn number(&self) -> FloorNumber {
        self.number
    }

    pub fn add_slot(&mut self, slot: Slot) -> Result<()> {
        match self.slots.binary_search_by_key(&slot.number(), |s| s.number()) {
            Ok(_) => Err(ParkingError::DuplicateSlotNumber { floor: self.number, slot: slot.number() }),
            Err(pos) => {
                self.slots.insert(pos, slot);
                Ok(())
            }
        }
    }

    /// Add one slot per number in `numbers`, all typed to `vehicle_type`.
    /// Stops at the first duplicate; slots added before it are kept.
    pub fn add_slot_range(&mut self, numbers: RangeInclusive<u32>, vehicle_type: VehicleType) -> Result<()> {
        for number in numbers {
            self.add_slot(Slot::new(SlotNumber(number), vehicle_type))?;
        }
        Ok(())
    }

    /// Slots in entrance-proximity order
    #[inline]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, number: SlotNumber) -> Option<&Slot> {
        self.slots
            .binary_search_by_key(&number, |s| s.number())
            .ok()
            .map(|idx| &self.slots[idx])
    }

    pub fn status(&self) -> FloorStatus {
        if self.active.load(Ordering::Acquire) {
            FloorStatus::Active
        } else {
            FloorStatus::Inactive
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status() == FloorStatus::Active
    }

    pub fn set_status(&self, status: FloorStatus) {
        self.active.store(status == FloorStatus::Active, Ordering::Release);
    }

    /// Ask `strategy` for a free slot. An inactive floor never offers one,
    /// whatever the state of its slots.
    pub fn find_available_slot(
        &self,
        strategy: &dyn SlotAssignmentStrategy,
        vehicle_type: VehicleType,
    ) -> Option<&Slot> {
        if !self.is_active() {
            return None;
        }
        strategy.select_slot(self, vehicle_type)
    }

    /// Free slots of `vehicle_type`, counted by a linear scan
    pub fn available_count(&self, vehicle_type: VehicleType) -> usize {
        self.slots.iter().filter(|s| s.is_eligible(vehicle_type)).count()
    }

    /// Total slots of `vehicle_type`, free or not
    pub fn capacity(&self, vehicle_type: VehicleType) -> usize {
        self.slots.iter().filter(|s| s.compatible_type() == vehicle_type).count()
    }
}
