//! Parking lot demo - drives the lot through concurrent entry/exit gates
//!
//! Module structure:
//! - `domain/` - Occupancy core (Slot, Floor, strategies, Ticket, Bill)
//! - `services/` - Lot orchestrator, billing, gate workers
//! - `io/` - Ticket persistence (in-memory, JSONL journal)
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use parking_core::domain::payment::{Payment, PaymentMode, PaymentStatus};
use parking_core::domain::{FloorNumber, OptimizedStrategy, Ticket, Vehicle, VehicleType};
use parking_core::infra::{Config, Metrics};
use parking_core::io::JsonlTicketStore;
use parking_core::services::{create_gate_worker, BillingService, GateHandle, Lot};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Parking lot demo - slot allocation, ticketing and billing
#[derive(Parser, Debug)]
#[command(name = "parking-lot", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Structured logging, level via RUST_LOG (default: info)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "parking-lot starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        lot = %config.lot_name(),
        strategy = %config.strategy().as_str(),
        floors = %config.floors().len(),
        entry_gates = %config.entry_gates(),
        store_file = ?config.store_file(),
        "config_loaded"
    );

    let metrics = Arc::new(Metrics::new());
    let mut lot = Lot::from_config(&config)?.with_metrics(metrics.clone());
    if let Some(path) = config.store_file() {
        lot = lot.with_store(Arc::new(JsonlTicketStore::new(path)));
    }
    lot.restore_open_tickets()?;
    let lot = Arc::new(lot);
    info!(lot = %lot.name(), address = %lot.address(), "lot_initialized");

    let billing = BillingService::new(config.fee_schedule());

    // One worker per gate, all sharing the lot
    let mut gates: Vec<GateHandle> = Vec::new();
    for gate_number in 1..=config.entry_gates().max(1) {
        let (handle, worker) =
            create_gate_worker(gate_number, lot.clone(), metrics.clone(), config.gate_queue_size());
        tokio::spawn(worker.run());
        gates.push(handle);
    }

    // Periodic metrics reporter
    let reporter_metrics = metrics.clone();
    let reporter_lot = lot.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            reporter_metrics.report(reporter_lot.open_ticket_count()).log();
        }
    });

    // Arrivals, spread across the gates and handled in parallel
    let arrivals = [
        ("DL01AB1234", VehicleType::Car),
        ("DL02CD5678", VehicleType::Motorcycle),
        ("DL03EF9012", VehicleType::Car),
        ("DL04GH3456", VehicleType::Truck),
        ("DL05IJ7890", VehicleType::Motorcycle),
        ("DL06KL2345", VehicleType::Car),
    ];
    let tickets = enter_all(&gates, &arrivals, FloorNumber(1)).await;
    lot.status().log();

    for vehicle_type in VehicleType::ALL {
        info!(vehicle_type = %vehicle_type, available = %lot.available_slots_count(vehicle_type), "availability");
    }

    // First three vehicles leave and pay
    for ticket in tickets.iter().take(3) {
        let gate = &gates[0];
        let closed = match gate.exit(ticket.vehicle_id().clone()).await {
            Ok(closed) => closed,
            Err(e) => {
                warn!(vehicle_id = %ticket.vehicle_id(), error = %e, "exit_failed");
                continue;
            }
        };
        let mut bill = billing.bill_for(&closed)?;
        let amount = bill.outstanding();
        billing.settle(&mut bill, Payment::new(amount, PaymentMode::Card, closed.id.to_string(), PaymentStatus::Success));
    }
    lot.status().log();

    // Later arrivals prefer the back of the floor
    lot.set_strategy(Arc::new(OptimizedStrategy));
    let late_arrivals = [("DL07MN5678", VehicleType::Car), ("DL08OP9012", VehicleType::Motorcycle)];
    enter_all(&gates, &late_arrivals, FloorNumber(2)).await;

    let status = lot.status();
    status.log();
    let status_json = serde_json::to_string(&status)?;
    info!(status = %status_json, "final_status");
    metrics.report(lot.open_ticket_count()).log();

    info!("parking-lot demo complete");
    Ok(())
}

/// Park every vehicle through the gates concurrently, returning issued tickets
async fn enter_all(gates: &[GateHandle], arrivals: &[(&str, VehicleType)], floor: FloorNumber) -> Vec<Ticket> {
    let mut tasks = Vec::with_capacity(arrivals.len());
    for (i, (registration, vehicle_type)) in arrivals.iter().enumerate() {
        let gate = gates[i % gates.len()].clone();
        let vehicle = Vehicle::new(*registration, *vehicle_type);
        tasks.push(tokio::spawn(async move { gate.enter(vehicle, floor).await }));
    }

    let mut tickets = Vec::with_capacity(tasks.len());
    for task in tasks {
        match task.await {
            Ok(Ok(ticket)) => tickets.push(ticket),
            Ok(Err(e)) => warn!(error = %e, "entry_failed"),
            Err(e) => warn!(error = %e, "entry_task_failed"),
        }
    }
    tickets
}
