//! Domain models - occupancy core and value types
//!
//! This module contains the canonical data types used throughout the system:
//! - `Slot` - a single typed parking space with its own lock
//! - `Floor` - ordered slots with active/inactive gating
//! - `SlotAssignmentStrategy` - pluggable slot selection policy
//! - `Ticket` - one parking session from entry to exit
//! - `Bill` / `Payment` - exit desk records
//! - `ParkingError` - error taxonomy for all core operations

pub mod error;
pub mod floor;
pub mod payment;
pub mod slot;
pub mod strategy;
pub mod ticket;
pub mod types;

// Re-export commonly used types at module level
pub use error::{ParkingError, Result};
pub use floor::{Floor, FloorStatus};
pub use slot::Slot;
pub use strategy::{NearestStrategy, OptimizedStrategy, RandomStrategy, SlotAssignmentStrategy, StrategyKind};
pub use ticket::{Ticket, TicketId, TicketStatus};
pub use types::{FloorNumber, SlotNumber, Vehicle, VehicleId, VehicleType};
