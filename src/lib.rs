//! Parking lot core library
//!
//! Slot allocation, occupancy bookkeeping and ticketing for a multi-floor
//! parking lot. Exposes modules for integration testing and binary reuse.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
