//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations so gates never contend on a mutex
//! just to count. Reporting swaps the windowed counters to zero.
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are
//! statistical counters only; do NOT use them for coordination.

use crate::domain::error::ParkingError;
use crate::domain::types::VehicleType;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries (microseconds)
/// Buckets: ≤10, ≤20, ≤40, ≤80, ≤160, ≤320, ≤640, ≤1280, ≤2560, ≤5120, >5120
const BUCKET_BOUNDS: [u64; 10] = [10, 20, 40, 80, 160, 320, 640, 1280, 2560, 5120];
const NUM_BUCKETS: usize = 11;
const NUM_VEHICLE_TYPES: usize = VehicleType::ALL.len();

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Last bucket reports 2x the previous bound
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] = [10, 20, 40, 80, 160, 320, 640, 1280, 2560, 5120, 10240];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector shared by the lot and its gates
pub struct Metrics {
    /// Successful parks (monotonic)
    parks_total: AtomicU64,
    /// Successful parks since last report (reset on report)
    parks_since_report: AtomicU64,
    /// Successful unparks (monotonic)
    unparks_total: AtomicU64,
    /// Park latency histogram (reset on report)
    park_latency_buckets: [AtomicU64; NUM_BUCKETS],
    park_latency_sum_us: AtomicU64,
    park_latency_max_us: AtomicU64,
    /// Rejections by cause (monotonic)
    rejected_no_slot: AtomicU64,
    /// No-slot rejections split by vehicle type, indexed by `VehicleType::index`
    rejected_no_slot_by_type: [AtomicU64; NUM_VEHICLE_TYPES],
    rejected_already_parked: AtomicU64,
    rejected_floor_not_found: AtomicU64,
    rejected_ticket_not_found: AtomicU64,
    rejected_other: AtomicU64,
    /// Times a park lost a slot race and re-ran selection (monotonic)
    slot_race_retries: AtomicU64,
    /// Ticket store calls that failed (monotonic)
    store_failures: AtomicU64,
    /// Gate commands dropped because a gate queue was full (monotonic)
    gate_cmds_dropped: AtomicU64,
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            parks_total: AtomicU64::new(0),
            parks_since_report: AtomicU64::new(0),
            unparks_total: AtomicU64::new(0),
            park_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            park_latency_sum_us: AtomicU64::new(0),
            park_latency_max_us: AtomicU64::new(0),
            rejected_no_slot: AtomicU64::new(0),
            rejected_no_slot_by_type: std::array::from_fn(|_| AtomicU64::new(0)),
            rejected_already_parked: AtomicU64::new(0),
            rejected_floor_not_found: AtomicU64::new(0),
            rejected_ticket_not_found: AtomicU64::new(0),
            rejected_other: AtomicU64::new(0),
            slot_race_retries: AtomicU64::new(0),
            store_failures: AtomicU64::new(0),
            gate_cmds_dropped: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a successful park with its latency (lock-free)
    #[inline]
    pub fn record_park(&self, latency_us: u64) {
        self.parks_total.fetch_add(1, Ordering::Relaxed);
        self.parks_since_report.fetch_add(1, Ordering::Relaxed);
        self.park_latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.park_latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.park_latency_max_us, latency_us);
    }

    #[inline]
    pub fn record_unpark(&self) {
        self.unparks_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected park/unpark by error cause
    pub fn record_rejection(&self, err: &ParkingError) {
        let counter = match err {
            ParkingError::NoSlotAvailable { vehicle_type, .. } => {
                self.rejected_no_slot_by_type[vehicle_type.index()].fetch_add(1, Ordering::Relaxed);
                &self.rejected_no_slot
            }
            ParkingError::VehicleAlreadyParked { .. } => &self.rejected_already_parked,
            ParkingError::FloorNotFound { .. } => &self.rejected_floor_not_found,
            ParkingError::TicketNotFound { .. } => &self.rejected_ticket_not_found,
            _ => &self.rejected_other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_slot_race_retry(&self) {
        self.slot_race_retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_gate_cmd_dropped(&self) {
        self.gate_cmds_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn parks_total(&self) -> u64 {
        self.parks_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn unparks_total(&self) -> u64 {
        self.unparks_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn slot_race_retries(&self) -> u64 {
        self.slot_race_retries.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn store_failures(&self) -> u64 {
        self.store_failures.load(Ordering::Relaxed)
    }

    /// Generate a summary and reset windowed counters
    ///
    /// `open_tickets` is sampled by the caller from the lot.
    pub fn report(&self, open_tickets: usize) -> MetricsSummary {
        let now = Instant::now();
        let elapsed_secs = {
            let mut last = self.last_report_time.lock();
            let elapsed = now.duration_since(*last).as_secs_f64();
            *last = now;
            elapsed
        };

        let parks_window = self.parks_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.park_latency_sum_us.swap(0, Ordering::Relaxed);
        let latency_max = self.park_latency_max_us.swap(0, Ordering::Relaxed);
        let buckets = swap_buckets(&self.park_latency_buckets);

        let parks_per_sec = if elapsed_secs > 0.0 { parks_window as f64 / elapsed_secs } else { 0.0 };
        let avg_latency = if parks_window > 0 { latency_sum / parks_window } else { 0 };

        MetricsSummary {
            parks_total: self.parks_total.load(Ordering::Relaxed),
            parks_per_sec,
            unparks_total: self.unparks_total.load(Ordering::Relaxed),
            park_lat_avg_us: avg_latency,
            park_lat_max_us: latency_max,
            park_lat_p50_us: percentile_from_buckets(&buckets, 0.50),
            park_lat_p99_us: percentile_from_buckets(&buckets, 0.99),
            park_lat_buckets: buckets,
            rejected_no_slot: self.rejected_no_slot.load(Ordering::Relaxed),
            rejected_no_slot_by_type: std::array::from_fn(|i| self.rejected_no_slot_by_type[i].load(Ordering::Relaxed)),
            rejected_already_parked: self.rejected_already_parked.load(Ordering::Relaxed),
            rejected_floor_not_found: self.rejected_floor_not_found.load(Ordering::Relaxed),
            rejected_ticket_not_found: self.rejected_ticket_not_found.load(Ordering::Relaxed),
            rejected_other: self.rejected_other.load(Ordering::Relaxed),
            slot_race_retries: self.slot_race_retries.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            gate_cmds_dropped: self.gate_cmds_dropped.load(Ordering::Relaxed),
            open_tickets,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct MetricsSummary {
    pub parks_total: u64,
    pub parks_per_sec: f64,
    pub unparks_total: u64,
    pub park_lat_avg_us: u64,
    pub park_lat_max_us: u64,
    pub park_lat_p50_us: u64,
    pub park_lat_p99_us: u64,
    /// Bounds: ≤10, ≤20, ≤40, ≤80, ≤160, ≤320, ≤640, ≤1280, ≤2560, ≤5120, >5120 µs
    pub park_lat_buckets: [u64; NUM_BUCKETS],
    pub rejected_no_slot: u64,
    /// Same order as `VehicleType::ALL`
    pub rejected_no_slot_by_type: [u64; NUM_VEHICLE_TYPES],
    pub rejected_already_parked: u64,
    pub rejected_floor_not_found: u64,
    pub rejected_ticket_not_found: u64,
    pub rejected_other: u64,
    pub slot_race_retries: u64,
    pub store_failures: u64,
    pub gate_cmds_dropped: u64,
    pub open_tickets: usize,
}

impl MetricsSummary {
    pub fn no_slot_rejections(&self, vehicle_type: VehicleType) -> u64 {
        self.rejected_no_slot_by_type[vehicle_type.index()]
    }

    pub fn log(&self) {
        info!(
            parks_total = %self.parks_total,
            parks_per_sec = format!("{:.1}", self.parks_per_sec),
            unparks_total = %self.unparks_total,
            open_tickets = %self.open_tickets,
            park_avg_us = %self.park_lat_avg_us,
            park_p99_us = %self.park_lat_p99_us,
            rejected_no_slot = %self.rejected_no_slot,
            no_slot_motorcycle = %self.no_slot_rejections(VehicleType::Motorcycle),
            no_slot_car = %self.no_slot_rejections(VehicleType::Car),
            no_slot_truck = %self.no_slot_rejections(VehicleType::Truck),
            rejected_already_parked = %self.rejected_already_parked,
            slot_race_retries = %self.slot_race_retries,
            store_failures = %self.store_failures,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{FloorNumber, VehicleId};
    use std::sync::Arc;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.parks_total(), 0);
        assert_eq!(metrics.unparks_total(), 0);
    }

    #[test]
    fn test_report_resets_window_only() {
        let metrics = Metrics::new();
        metrics.record_park(15);
        metrics.record_park(300);
        metrics.record_unpark();

        let summary = metrics.report(1);
        assert_eq!(summary.parks_total, 2);
        assert_eq!(summary.unparks_total, 1);
        assert_eq!(summary.park_lat_max_us, 300);
        assert_eq!(summary.park_lat_avg_us, 157);
        assert_eq!(summary.park_lat_buckets.iter().sum::<u64>(), 2);
        assert_eq!(summary.open_tickets, 1);

        let summary = metrics.report(0);
        assert_eq!(summary.parks_total, 2);
        assert_eq!(summary.park_lat_max_us, 0);
        assert_eq!(summary.park_lat_buckets.iter().sum::<u64>(), 0);
    }

    #[test]
    fn test_rejections_by_kind() {
        let metrics = Metrics::new();
        metrics.record_rejection(&ParkingError::NoSlotAvailable {
            floor: FloorNumber(1),
            vehicle_type: VehicleType::Car,
        });
        metrics.record_rejection(&ParkingError::TicketNotFound { vehicle_id: VehicleId::new("X") });
        metrics.record_rejection(&ParkingError::Store("disk".to_string()));

        metrics.record_rejection(&ParkingError::NoSlotAvailable {
            floor: FloorNumber(2),
            vehicle_type: VehicleType::Truck,
        });

        let summary = metrics.report(0);
        assert_eq!(summary.rejected_no_slot, 2);
        assert_eq!(summary.no_slot_rejections(VehicleType::Car), 1);
        assert_eq!(summary.no_slot_rejections(VehicleType::Truck), 1);
        assert_eq!(summary.no_slot_rejections(VehicleType::Motorcycle), 0);
        assert_eq!(summary.rejected_ticket_not_found, 1);
        assert_eq!(summary.rejected_other, 1);
        assert_eq!(summary.rejected_already_parked, 0);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(10), 0);
        assert_eq!(bucket_index(11), 1);
        assert_eq!(bucket_index(5120), 9);
        assert_eq!(bucket_index(5121), 10);
    }

    #[test]
    fn test_percentile_computation() {
        let mut buckets = [0u64; NUM_BUCKETS];
        buckets[0] = 90;
        buckets[5] = 10;
        assert_eq!(percentile_from_buckets(&buckets, 0.50), 10);
        assert_eq!(percentile_from_buckets(&buckets, 0.99), 320);
        assert_eq!(percentile_from_buckets(&[0; NUM_BUCKETS], 0.99), 0);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = Arc::new(Metrics::new());
        let mut handles = vec![];

        for _ in 0..4 {
            let m = metrics.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..1000 {
                    m.record_park(i % 200);
                    m.record_slot_race_retry();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.parks_total(), 4000);
        assert_eq!(metrics.slot_race_retries(), 4000);
    }
}
