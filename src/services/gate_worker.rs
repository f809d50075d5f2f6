//! Gate worker - serves one entry/exit gate against a shared lot
//!
//! Each gate owns a bounded command queue and a worker task. Several gates
//! drive the same `Arc<Lot>` in parallel; the lot's per-slot locking keeps
//! them from colliding. Replies travel back on a oneshot channel.

use crate::domain::error::ParkingError;
use crate::domain::ticket::Ticket;
use crate::domain::types::{FloorNumber, Vehicle, VehicleId};
use crate::infra::metrics::Metrics;
use crate::services::lot::Lot;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// A command queued at a gate
#[derive(Debug)]
pub enum GateCmd {
    Enter {
        vehicle: Vehicle,
        floor: FloorNumber,
        enqueued_at: Instant,
        reply: oneshot::Sender<Result<Ticket, ParkingError>>,
    },
    Exit {
        vehicle_id: VehicleId,
        enqueued_at: Instant,
        reply: oneshot::Sender<Result<Ticket, ParkingError>>,
    },
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Parking(#[from] ParkingError),
    #[error("gate {0} queue is full")]
    Busy(u32),
    #[error("gate {0} is closed")]
    Closed(u32),
}

/// Caller side of a gate
#[derive(Clone)]
pub struct GateHandle {
    gate_number: u32,
    cmd_tx: mpsc::Sender<GateCmd>,
    metrics: Arc<Metrics>,
}

impl GateHandle {
    pub fn gate_number(&self) -> u32 {
        self.gate_number
    }

    /// Queue an entry and wait for the issued ticket
    pub async fn enter(&self, vehicle: Vehicle, floor: FloorNumber) -> Result<Ticket, GateError> {
        let (reply, rx) = oneshot::channel();
        self.submit(GateCmd::Enter { vehicle, floor, enqueued_at: Instant::now(), reply })?;
        let result = rx.await.map_err(|_| GateError::Closed(self.gate_number))?;
        Ok(result?)
    }

    /// Queue an exit and wait for the closed ticket
    pub async fn exit(&self, vehicle_id: VehicleId) -> Result<Ticket, GateError> {
        let (reply, rx) = oneshot::channel();
        self.submit(GateCmd::Exit { vehicle_id, enqueued_at: Instant::now(), reply })?;
        let result = rx.await.map_err(|_| GateError::Closed(self.gate_number))?;
        Ok(result?)
    }

    fn submit(&self, cmd: GateCmd) -> Result<(), GateError> {
        self.cmd_tx.try_send(cmd).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                self.metrics.record_gate_cmd_dropped();
                warn!(gate = %self.gate_number, "gate_cmd_dropped_queue_full");
                GateError::Busy(self.gate_number)
            }
            mpsc::error::TrySendError::Closed(_) => GateError::Closed(self.gate_number),
        })
    }
}

/// Worker that applies queued gate commands to the lot
pub struct GateWorker {
    gate_number: u32,
    lot: Arc<Lot>,
    cmd_rx: mpsc::Receiver<GateCmd>,
}

impl GateWorker {
    /// Run the worker, processing commands until every handle is dropped
    pub async fn run(mut self) {
        info!(gate = %self.gate_number, "gate_worker_started");

        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                GateCmd::Enter { vehicle, floor, enqueued_at, reply } => {
                    let queue_delay_us = enqueued_at.elapsed().as_micros() as u64;
                    let result = self.lot.park_from_gate(vehicle, floor, self.gate_number);
                    debug!(gate = %self.gate_number, queue_delay_us = %queue_delay_us, ok = %result.is_ok(), "gate_enter_processed");
                    // Caller may have given up waiting
                    let _ = reply.send(result);
                }
                GateCmd::Exit { vehicle_id, enqueued_at, reply } => {
                    let queue_delay_us = enqueued_at.elapsed().as_micros() as u64;
                    let result = self.lot.checkout(&vehicle_id);
                    debug!(gate = %self.gate_number, queue_delay_us = %queue_delay_us, ok = %result.is_ok(), "gate_exit_processed");
                    let _ = reply.send(result);
                }
            }
        }

        info!(gate = %self.gate_number, "gate_worker_stopped");
    }
}

/// Create a gate command channel and worker
///
/// Returns the handle (for callers) and the worker (to be spawned)
pub fn create_gate_worker(
    gate_number: u32,
    lot: Arc<Lot>,
    metrics: Arc<Metrics>,
    buffer_size: usize,
) -> (GateHandle, GateWorker) {
    let (cmd_tx, cmd_rx) = mpsc::channel(buffer_size);
    let handle = GateHandle { gate_number, cmd_tx, metrics };
    let worker = GateWorker { gate_number, lot, cmd_rx };
    (handle, worker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::floor::Floor;
    use crate::domain::strategy::NearestStrategy;
    use crate::domain::types::{SlotNumber, VehicleType};
    use std::collections::HashSet;

    fn create_lot() -> Arc<Lot> {
        let lot = Lot::new("Test Lot", "Somewhere", Arc::new(NearestStrategy));
        let mut floor = Floor::new(FloorNumber(1));
        floor.add_slot_range(1..=20, VehicleType::Car).unwrap();
        lot.add_floor(floor).unwrap();
        Arc::new(lot)
    }

    #[tokio::test]
    async fn test_enter_and_exit_through_gate() {
        let lot = create_lot();
        let (gate, worker) = create_gate_worker(1, lot.clone(), Arc::new(Metrics::new()), 16);
        tokio::spawn(worker.run());

        let ticket = gate.enter(Vehicle::new("A", VehicleType::Car), FloorNumber(1)).await.unwrap();
        assert_eq!(ticket.slot, SlotNumber(1));
        assert_eq!(ticket.gate, Some(1));
        assert!(lot.is_parked(&VehicleId::new("A")));

        let closed = gate.exit(VehicleId::new("A")).await.unwrap();
        assert_eq!(closed.id, ticket.id);
        assert!(!closed.is_open());
        assert_eq!(closed.gate, Some(1));
    }

    #[tokio::test]
    async fn test_gate_surfaces_parking_errors() {
        let lot = create_lot();
        let (gate, worker) = create_gate_worker(1, lot, Arc::new(Metrics::new()), 16);
        tokio::spawn(worker.run());

        let err = gate.exit(VehicleId::new("NOPE")).await.unwrap_err();
        assert!(matches!(err, GateError::Parking(ParkingError::TicketNotFound { .. })));
    }

    #[tokio::test]
    async fn test_full_queue_reports_busy() {
        let lot = create_lot();
        let metrics = Arc::new(Metrics::new());
        // Worker never spawned, so the single queue slot stays taken
        let (gate, _worker) = create_gate_worker(3, lot, metrics.clone(), 1);

        let (reply, _rx) = oneshot::channel();
        gate.submit(GateCmd::Exit { vehicle_id: VehicleId::new("A"), enqueued_at: Instant::now(), reply })
            .unwrap();

        let err = gate.enter(Vehicle::new("B", VehicleType::Car), FloorNumber(1)).await.unwrap_err();
        assert!(matches!(err, GateError::Busy(3)));
        assert_eq!(metrics.report(0).gate_cmds_dropped, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_gates_never_share_a_slot() {
        let lot = create_lot();
        let metrics = Arc::new(Metrics::new());
        let mut gates = Vec::new();
        for gate_number in 1..=4 {
            let (gate, worker) = create_gate_worker(gate_number, lot.clone(), metrics.clone(), 64);
            tokio::spawn(worker.run());
            gates.push(gate);
        }

        let mut tasks = Vec::new();
        for i in 0..24 {
            let gate = gates[i % gates.len()].clone();
            tasks.push(tokio::spawn(async move {
                gate.enter(Vehicle::new(format!("CAR{i}"), VehicleType::Car), FloorNumber(1)).await
            }));
        }

        let mut slots = HashSet::new();
        let mut rejected = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(ticket) => assert!(slots.insert(ticket.slot), "slot {} issued twice", ticket.slot),
                Err(GateError::Parking(ParkingError::NoSlotAvailable { .. })) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(slots.len(), 20);
        assert_eq!(rejected, 4);
        assert_eq!(lot.open_ticket_count(), 20);
    }
}
