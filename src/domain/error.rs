//! Error taxonomy for parking operations
//!
//! Every failure is scoped to the single call that triggered it.

use crate::domain::types::{FloorNumber, SlotNumber, VehicleId, VehicleType};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParkingError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParkingError {
    #[error("floor {floor} is already registered")]
    DuplicateFloorNumber { floor: FloorNumber },

    #[error("slot {slot} already exists on floor {floor}")]
    DuplicateSlotNumber { floor: FloorNumber, slot: SlotNumber },

    #[error("floor {floor} not found or inactive")]
    FloorNotFound { floor: FloorNumber },

    #[error("vehicle {vehicle_id} already has an open ticket")]
    VehicleAlreadyParked { vehicle_id: VehicleId },

    #[error("no free {vehicle_type} slot on floor {floor}")]
    NoSlotAvailable { floor: FloorNumber, vehicle_type: VehicleType },

    #[error("slot {slot} takes {expected} but vehicle is {actual}")]
    TypeMismatch { slot: SlotNumber, expected: VehicleType, actual: VehicleType },

    #[error("slot {slot} is already occupied")]
    AlreadyOccupied { slot: SlotNumber },

    #[error("slot {slot} is already free")]
    AlreadyFree { slot: SlotNumber },

    #[error("no open ticket for vehicle {vehicle_id}")]
    TicketNotFound { vehicle_id: VehicleId },

    #[error("ticket store error: {0}")]
    Store(String),
}

impl ParkingError {
    /// Short stable label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ParkingError::DuplicateFloorNumber { .. } => "duplicate_floor_number",
            ParkingError::DuplicateSlotNumber { .. } => "duplicate_slot_number",
            ParkingError::FloorNotFound { .. } => "floor_not_found",
            ParkingError::VehicleAlreadyParked { .. } => "vehicle_already_parked",
            ParkingError::NoSlotAvailable { .. } => "no_slot_available",
            ParkingError::TypeMismatch { .. } => "type_mismatch",
            ParkingError::AlreadyOccupied { .. } => "already_occupied",
            ParkingError::AlreadyFree { .. } => "already_free",
            ParkingError::TicketNotFound { .. } => "ticket_not_found",
            ParkingError::Store(_) => "store",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ParkingError::NoSlotAvailable { floor: FloorNumber(2), vehicle_type: VehicleType::Car };
        assert_eq!(err.to_string(), "no free car slot on floor 2");

        let err = ParkingError::VehicleAlreadyParked { vehicle_id: VehicleId::new("X") };
        assert_eq!(err.to_string(), "vehicle X already has an open ticket");
        assert_eq!(err.kind(), "vehicle_already_parked");
    }
}
