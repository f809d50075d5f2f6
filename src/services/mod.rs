//! Services - orchestration and collaborators around the occupancy core
//!
//! - `lot` - Lot orchestrator (park/unpark, strategy, open tickets)
//! - `billing` - Fee schedule and bill generation
//! - `gate_worker` - Async entry/exit gate command worker

pub mod billing;
pub mod gate_worker;
pub mod lot;

// Re-export commonly used types
pub use billing::{BillingService, FeeSchedule};
pub use gate_worker::{create_gate_worker, GateCmd, GateError, GateHandle, GateWorker};
pub use lot::{Lot, LotStatus};
