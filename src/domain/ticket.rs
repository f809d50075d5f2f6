//! Ticket: one parking session from entry to exit

use crate::domain::types::{FloorNumber, SlotNumber, Vehicle, VehicleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Time-sortable ticket identifier (UUIDv7)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub String);

impl TicketId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Active -> Closed is the only transition; a ticket is never reopened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Active,
    Closed,
}

impl TicketStatus {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Active => "active",
            TicketStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub vehicle: Vehicle,
    /// Location of the assigned slot; the ticket does not own it
    pub floor: FloorNumber,
    pub slot: SlotNumber,
    /// Entry gate that issued the ticket; `None` for direct lot calls
    #[serde(default)]
    pub gate: Option<u32>,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub status: TicketStatus,
}

impl Ticket {
    /// Open a ticket for a vehicle that has just occupied `slot`
    ///
    /// # Example
    ///
    /// ```
    /// use chrono::Utc;
    /// use parking_core::domain::ticket::{Ticket, TicketStatus};
    /// use parking_core::domain::types::{FloorNumber, SlotNumber, Vehicle, VehicleType};
    ///
    /// let vehicle = Vehicle::new("DL01AB1234", VehicleType::Car);
    /// let ticket = Ticket::open(vehicle, FloorNumber(1), SlotNumber(3), Utc::now());
    /// assert_eq!(ticket.status, TicketStatus::Active);
    /// assert!(ticket.duration().is_none());
    /// ```
    pub fn open(vehicle: Vehicle, floor: FloorNumber, slot: SlotNumber, entry_time: DateTime<Utc>) -> Self {
        Self {
            id: TicketId::generate(),
            vehicle,
            floor,
            slot,
            gate: None,
            entry_time,
            exit_time: None,
            status: TicketStatus::Active,
        }
    }

    #[inline]
    pub fn vehicle_id(&self) -> &VehicleId {
        self.vehicle.id()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == TicketStatus::Active
    }

    /// Stamp the exit time and close. No-op on an already closed ticket.
    pub fn close(&mut self, exit_time: DateTime<Utc>) {
        if !self.is_open() {
            return;
        }
        self.exit_time = Some(exit_time);
        self.status = TicketStatus::Closed;
    }

    /// Whether `snapshot` of the same ticket may overwrite this one.
    /// Closed is terminal, so a late Active snapshot never replaces it.
    pub fn accepts_snapshot(&self, snapshot: &Ticket) -> bool {
        self.is_open() || !snapshot.is_open()
    }

    /// Raw elapsed time between entry and exit, `None` while open.
    /// A clock that stepped backwards yields zero rather than a negative span.
    pub fn duration(&self) -> Option<Duration> {
        let exit = self.exit_time?;
        Some((exit - self.entry_time).to_std().unwrap_or(Duration::ZERO))
    }
}
