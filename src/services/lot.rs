//! Lot orchestrator - park/unpark over floors with the active strategy
//!
//! Locking layout:
//! - each slot has its own mutex, so gates parking onto different slots of
//!   the same floor never block each other
//! - the ticket book (open tickets plus in-flight reservations) is a single
//!   short critical section giving check-and-insert for park and atomic
//!   removal for unpark
//! - floors and the strategy sit behind read-mostly RwLocks
//!
//! Lock order is book -> floors -> slot. Park selects and occupies a slot
//! without holding the book lock.

use crate::domain::error::{ParkingError, Result};
use crate::domain::floor::{Floor, FloorStatus};
use crate::domain::strategy::SlotAssignmentStrategy;
use crate::domain::ticket::Ticket;
use crate::domain::types::{FloorNumber, SlotNumber, Vehicle, VehicleId, VehicleType};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::store::TicketStore;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Open tickets plus vehicles whose park is still in flight
#[derive(Default)]
struct TicketBook {
    open: FxHashMap<VehicleId, Ticket>,
    reserved: FxHashSet<VehicleId>,
}

impl TicketBook {
    fn is_taken(&self, vehicle_id: &VehicleId) -> bool {
        self.open.contains_key(vehicle_id) || self.reserved.contains(vehicle_id)
    }
}

pub struct Lot {
    name: String,
    address: String,
    floors: RwLock<BTreeMap<FloorNumber, Arc<Floor>>>,
    strategy: RwLock<Arc<dyn SlotAssignmentStrategy>>,
    book: Mutex<TicketBook>,
    store: Option<Arc<dyn TicketStore>>,
    metrics: Option<Arc<Metrics>>,
}

impl Lot {
    pub fn new(name: impl Into<String>, address: impl Into<String>, strategy: Arc<dyn SlotAssignmentStrategy>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            floors: RwLock::new(BTreeMap::new()),
            strategy: RwLock::new(strategy),
            book: Mutex::new(TicketBook::default()),
            store: None,
            metrics: None,
        }
    }

    /// Build a lot with the floors, slots and strategy described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let lot = Self::new(config.lot_name(), config.lot_address(), config.strategy().build());
        for floor_config in config.floors() {
            let mut floor = Floor::new(FloorNumber(floor_config.number));
            for range in &floor_config.slots {
                floor.add_slot_range(range.first..=range.last, range.vehicle_type)?;
            }
            if !floor_config.active {
                floor.set_status(FloorStatus::Inactive);
            }
            lot.add_floor(floor)?;
        }
        Ok(lot)
    }

    pub fn with_store(mut self, store: Arc<dyn TicketStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn add_floor(&self, floor: Floor) -> Result<()> {
        let number = floor.number();
        let mut floors = self.floors.write();
        if floors.contains_key(&number) {
            return Err(ParkingError::DuplicateFloorNumber { floor: number });
        }
        debug!(floor = %number, slots = %floor.slots().len(), "floor_added");
        floors.insert(number, Arc::new(floor));
        Ok(())
    }

    pub fn floor(&self, number: FloorNumber) -> Option<Arc<Floor>> {
        self.floors.read().get(&number).cloned()
    }

    pub fn floor_numbers(&self) -> Vec<FloorNumber> {
        self.floors.read().keys().copied().collect()
    }

    pub fn set_floor_status(&self, number: FloorNumber, status: FloorStatus) -> Result<()> {
        let floor = self.floor(number).ok_or(ParkingError::FloorNotFound { floor: number })?;
        floor.set_status(status);
        info!(floor = %number, status = %status.as_str(), "floor_status_changed");
        Ok(())
    }

    /// Replace the active strategy. Open tickets are unaffected; the next
    /// park uses the new one.
    pub fn set_strategy(&self, strategy: Arc<dyn SlotAssignmentStrategy>) {
        let mut current = self.strategy.write();
        info!(from = %current.name(), to = %strategy.name(), "strategy_changed");
        *current = strategy;
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.read().name()
    }

    pub fn park(&self, vehicle: Vehicle, floor: FloorNumber) -> Result<Ticket> {
        self.park_at(vehicle, floor, Utc::now())
    }

    /// Park with an explicit entry timestamp
    pub fn park_at(&self, vehicle: Vehicle, floor: FloorNumber, entry_time: DateTime<Utc>) -> Result<Ticket> {
        self.park_entry(vehicle, floor, entry_time, None)
    }

    /// Park through a numbered entry gate, stamping the gate on the ticket
    pub fn park_from_gate(&self, vehicle: Vehicle, floor: FloorNumber, gate: u32) -> Result<Ticket> {
        self.park_entry(vehicle, floor, Utc::now(), Some(gate))
    }

    fn park_entry(
        &self,
        vehicle: Vehicle,
        floor: FloorNumber,
        entry_time: DateTime<Utc>,
        gate: Option<u32>,
    ) -> Result<Ticket> {
        let start = Instant::now();

        match self.try_park(&vehicle, floor, entry_time, gate) {
            Ok(ticket) => {
                let latency_us = start.elapsed().as_micros() as u64;
                if let Some(metrics) = &self.metrics {
                    metrics.record_park(latency_us);
                }
                info!(
                    vehicle_id = %ticket.vehicle_id(),
                    vehicle_type = %vehicle.vehicle_type(),
                    floor = %ticket.floor,
                    slot = %ticket.slot,
                    ticket_id = %ticket.id,
                    gate = ?ticket.gate,
                    latency_us = %latency_us,
                    "vehicle_parked"
                );
                self.persist(&ticket);
                Ok(ticket)
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_rejection(&e);
                }
                warn!(
                    vehicle_id = %vehicle.id(),
                    floor = %floor,
                    reason = %e.kind(),
                    "park_rejected"
                );
                Err(e)
            }
        }
    }

    fn try_park(
        &self,
        vehicle: &Vehicle,
        floor_number: FloorNumber,
        entry_time: DateTime<Utc>,
        gate: Option<u32>,
    ) -> Result<Ticket> {
        let floor = self
            .floor(floor_number)
            .filter(|f| f.is_active())
            .ok_or(ParkingError::FloorNotFound { floor: floor_number })?;

        {
            let mut book = self.book.lock();
            if book.is_taken(vehicle.id()) {
                return Err(ParkingError::VehicleAlreadyParked { vehicle_id: vehicle.id().clone() });
            }
            book.reserved.insert(vehicle.id().clone());
        }

        let claimed = self.claim_slot(&floor, vehicle);

        let mut book = self.book.lock();
        book.reserved.remove(vehicle.id());
        let slot = claimed?;
        let mut ticket = Ticket::open(vehicle.clone(), floor_number, slot, entry_time);
        ticket.gate = gate;
        book.open.insert(vehicle.id().clone(), ticket.clone());
        Ok(ticket)
    }

    /// Select and occupy a slot, re-running selection when another gate won
    /// the chosen slot. Bounded by the floor's slot count.
    fn claim_slot(&self, floor: &Floor, vehicle: &Vehicle) -> Result<SlotNumber> {
        let strategy = self.strategy.read().clone();
        let vehicle_type = vehicle.vehicle_type();
        let no_slot = || ParkingError::NoSlotAvailable { floor: floor.number(), vehicle_type };

        for _ in 0..floor.slots().len().max(1) {
            let slot = floor.find_available_slot(strategy.as_ref(), vehicle_type).ok_or_else(no_slot)?;
            match slot.occupy(vehicle) {
                Ok(()) => return Ok(slot.number()),
                Err(ParkingError::AlreadyOccupied { slot }) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_slot_race_retry();
                    }
                    debug!(vehicle_id = %vehicle.id(), floor = %floor.number(), slot = %slot, "slot_race_retry");
                }
                Err(e) => return Err(e),
            }
        }

        Err(no_slot())
    }

    /// Release the vehicle's slot and return the elapsed time
    pub fn unpark(&self, vehicle_id: &VehicleId) -> Result<Duration> {
        self.unpark_at(vehicle_id, Utc::now())
    }

    pub fn unpark_at(&self, vehicle_id: &VehicleId, exit_time: DateTime<Utc>) -> Result<Duration> {
        self.checkout_at(vehicle_id, exit_time).map(|ticket| ticket.duration().unwrap_or_default())
    }

    /// Unpark and hand back the closed ticket for billing
    pub fn checkout(&self, vehicle_id: &VehicleId) -> Result<Ticket> {
        self.checkout_at(vehicle_id, Utc::now())
    }

    pub fn checkout_at(&self, vehicle_id: &VehicleId, exit_time: DateTime<Utc>) -> Result<Ticket> {
        match self.try_checkout(vehicle_id, exit_time) {
            Ok(ticket) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_unpark();
                }
                info!(
                    vehicle_id = %vehicle_id,
                    floor = %ticket.floor,
                    slot = %ticket.slot,
                    ticket_id = %ticket.id,
                    duration_secs = %ticket.duration().unwrap_or_default().as_secs(),
                    "vehicle_unparked"
                );
                self.persist(&ticket);
                Ok(ticket)
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_rejection(&e);
                }
                warn!(vehicle_id = %vehicle_id, reason = %e.kind(), "unpark_rejected");
                Err(e)
            }
        }
    }

    fn try_checkout(&self, vehicle_id: &VehicleId, exit_time: DateTime<Utc>) -> Result<Ticket> {
        let mut book = self.book.lock();
        let (floor_number, slot_number) = match book.open.get(vehicle_id) {
            Some(ticket) => (ticket.floor, ticket.slot),
            None => return Err(ParkingError::TicketNotFound { vehicle_id: vehicle_id.clone() }),
        };

        let floor = self.floor(floor_number).ok_or(ParkingError::FloorNotFound { floor: floor_number })?;
        let slot = floor.slot(slot_number).ok_or(ParkingError::AlreadyFree { slot: slot_number })?;
        if let Err(e) = slot.vacate() {
            error!(
                vehicle_id = %vehicle_id,
                floor = %floor_number,
                slot = %slot_number,
                "slot_state_inconsistent"
            );
            return Err(e);
        }

        let mut ticket = book
            .open
            .remove(vehicle_id)
            .ok_or(ParkingError::TicketNotFound { vehicle_id: vehicle_id.clone() })?;
        ticket.close(exit_time);
        Ok(ticket)
    }

    /// Free slots of `vehicle_type` across active floors
    pub fn available_slots_count(&self, vehicle_type: VehicleType) -> usize {
        self.floors
            .read()
            .values()
            .filter(|f| f.is_active())
            .map(|f| f.available_count(vehicle_type))
            .sum()
    }

    pub fn open_ticket(&self, vehicle_id: &VehicleId) -> Option<Ticket> {
        self.book.lock().open.get(vehicle_id).cloned()
    }

    pub fn is_parked(&self, vehicle_id: &VehicleId) -> bool {
        self.book.lock().open.contains_key(vehicle_id)
    }

    pub fn open_ticket_count(&self) -> usize {
        self.book.lock().open.len()
    }

    /// Re-occupy slots for tickets the store still holds as open.
    /// Tickets that no longer fit the floor layout are skipped.
    pub fn restore_open_tickets(&self) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };

        let tickets = store.load_open_tickets().map_err(|e| ParkingError::Store(e.to_string()))?;
        let mut restored = 0;

        for ticket in tickets {
            let mut book = self.book.lock();
            if book.is_taken(ticket.vehicle_id()) {
                warn!(vehicle_id = %ticket.vehicle_id(), ticket_id = %ticket.id, "restore_skipped_duplicate_vehicle");
                continue;
            }

            let occupied = self
                .floor(ticket.floor)
                .ok_or(ParkingError::FloorNotFound { floor: ticket.floor })
                .and_then(|floor| {
                    let slot = floor.slot(ticket.slot).ok_or(ParkingError::NoSlotAvailable {
                        floor: ticket.floor,
                        vehicle_type: ticket.vehicle.vehicle_type(),
                    })?;
                    slot.occupy(&ticket.vehicle)
                });

            match occupied {
                Ok(()) => {
                    book.open.insert(ticket.vehicle_id().clone(), ticket);
                    restored += 1;
                }
                Err(e) => {
                    warn!(
                        vehicle_id = %ticket.vehicle_id(),
                        ticket_id = %ticket.id,
                        floor = %ticket.floor,
                        slot = %ticket.slot,
                        reason = %e.kind(),
                        "restore_skipped"
                    );
                }
            }
        }

        info!(restored = %restored, "open_tickets_restored");
        Ok(restored)
    }

    fn persist(&self, ticket: &Ticket) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save_ticket(ticket) {
            if let Some(metrics) = &self.metrics {
                metrics.record_store_failure();
            }
            error!(ticket_id = %ticket.id, error = %e, "ticket_store_failed");
        }
    }

    /// Availability snapshot for every floor
    pub fn status(&self) -> LotStatus {
        let floors: Vec<FloorReport> = self
            .floors
            .read()
            .values()
            .map(|floor| FloorReport {
                number: floor.number(),
                status: floor.status(),
                by_type: VehicleType::ALL
                    .iter()
                    .map(|&vehicle_type| TypeAvailability {
                        vehicle_type,
                        available: floor.available_count(vehicle_type),
                        capacity: floor.capacity(vehicle_type),
                    })
                    .collect(),
            })
            .collect();

        LotStatus {
            name: self.name.clone(),
            strategy: self.strategy_name(),
            parked_vehicles: self.open_ticket_count(),
            floors,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeAvailability {
    pub vehicle_type: VehicleType,
    pub available: usize,
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FloorReport {
    pub number: FloorNumber,
    pub status: FloorStatus,
    pub by_type: Vec<TypeAvailability>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LotStatus {
    pub name: String,
    pub strategy: &'static str,
    pub parked_vehicles: usize,
    pub floors: Vec<FloorReport>,
}

impl LotStatus {
    pub fn total_capacity(&self) -> usize {
        self.floors.iter().flat_map(|f| &f.by_type).map(|t| t.capacity).sum()
    }

    pub fn log(&self) {
        info!(
            lot = %self.name,
            strategy = %self.strategy,
            parked_vehicles = %self.parked_vehicles,
            total_capacity = %self.total_capacity(),
            "lot_status"
        );
        for floor in &self.floors {
            let free = |t: VehicleType| {
                floor.by_type.iter().find(|a| a.vehicle_type == t).map(|a| a.available).unwrap_or(0)
            };
            info!(
                floor = %floor.number,
                status = %floor.status.as_str(),
                motorcycle_free = %free(VehicleType::Motorcycle),
                car_free = %free(VehicleType::Car),
                truck_free = %free(VehicleType::Truck),
                "floor_status"
            );
        }
    }
}
