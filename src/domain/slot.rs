//! Single parking space with its own occupancy lock
//!
//! Each slot is an independently lockable unit: `occupy` and `vacate` on the
//! same slot are mutually exclusive, while different slots never contend.

use crate::domain::error::{ParkingError, Result};
use crate::domain::types::{SlotNumber, Vehicle, VehicleType};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    Free,
    Occupied,
}

#[derive(Debug)]
pub struct Slot {
    number: SlotNumber,
    compatible_type: VehicleType,
    /// `Some` exactly when the slot is occupied
    occupant: Mutex<Option<Vehicle>>,
}

impl Slot {
    pub fn new(number: SlotNumber, compatible_type: VehicleType) -> Self {
        Self { number, compatible_type, occupant: Mutex::new(None) }
    }

    #[inline]
    pub fn number(&self) -> SlotNumber {
        self.number
    }

    #[inline]
    pub fn compatible_type(&self) -> VehicleType {
        self.compatible_type
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.occupant.lock().is_none()
    }

    pub fn occupancy(&self) -> Occupancy {
        if self.is_available() {
            Occupancy::Free
        } else {
            Occupancy::Occupied
        }
    }

    /// Whether this slot takes `vehicle_type` and is currently free
    #[inline]
    pub fn is_eligible(&self, vehicle_type: VehicleType) -> bool {
        self.compatible_type == vehicle_type && self.is_available()
    }

    pub fn occupant(&self) -> Option<Vehicle> {
        self.occupant.lock().clone()
    }

    /// Place a vehicle in the slot. This is the only authority that decides
    /// whether a racing caller wins the slot.
    pub fn occupy(&self, vehicle: &Vehicle) -> Result<()> {
        if vehicle.vehicle_type() != self.compatible_type {
            return Err(ParkingError::TypeMismatch {
                slot: self.number,
                expected: self.compatible_type,
                actual: vehicle.vehicle_type(),
            });
        }

        let mut occupant = self.occupant.lock();
        if occupant.is_some() {
            return Err(ParkingError::AlreadyOccupied { slot: self.number });
        }
        *occupant = Some(vehicle.clone());
        Ok(())
    }

    /// Clear the slot, returning the vehicle that was in it
    pub fn vacate(&self) -> Result<Vehicle> {
        self.occupant.lock().take().ok_or(ParkingError::AlreadyFree { slot: self.number })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn car_slot() -> Slot {
        Slot::new(SlotNumber(3), VehicleType::Car)
    }

    #[test]
    fn test_occupy_and_vacate() {
        let slot = car_slot();
        let car = Vehicle::new("DL01AB1234", VehicleType::Car);

        assert!(slot.is_available());
        slot.occupy(&car).unwrap();
        assert_eq!(slot.occupancy(), Occupancy::Occupied);
        assert_eq!(slot.occupant(), Some(car.clone()));

        let vacated = slot.vacate().unwrap();
        assert_eq!(vacated, car);
        assert!(slot.is_available());
        assert!(slot.occupant().is_none());
    }

    #[test]
    fn test_occupy_rejects_wrong_type() {
        let slot = car_slot();
        for vehicle_type in [VehicleType::Motorcycle, VehicleType::Truck] {
            let err = slot.occupy(&Vehicle::new("X", vehicle_type)).unwrap_err();
            assert!(matches!(err, ParkingError::TypeMismatch { .. }));
        }
        assert!(slot.is_available());
    }

    #[test]
    fn test_occupy_twice_fails() {
        let slot = car_slot();
        slot.occupy(&Vehicle::new("A", VehicleType::Car)).unwrap();

        let err = slot.occupy(&Vehicle::new("B", VehicleType::Car)).unwrap_err();
        assert_eq!(err, ParkingError::AlreadyOccupied { slot: SlotNumber(3) });
        assert_eq!(slot.occupant().unwrap().id().as_str(), "A");
    }

    #[test]
    fn test_vacate_free_slot_fails() {
        let slot = car_slot();
        assert_eq!(slot.vacate().unwrap_err(), ParkingError::AlreadyFree { slot: SlotNumber(3) });
    }

    #[test]
    fn test_concurrent_occupy_single_winner() {
        let slot = car_slot();
        let winners = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for i in 0..8 {
                let slot = &slot;
                let winners = &winners;
                s.spawn(move || {
                    if slot.occupy(&Vehicle::new(format!("CAR{i}"), VehicleType::Car)).is_ok() {
                        winners.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });

        assert_eq!(winners.load(Ordering::Relaxed), 1);
        assert!(!slot.is_available());
    }
}
