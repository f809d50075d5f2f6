//! Billing collaborator - turns a closed ticket into a bill
//!
//! The lot only reports raw durations. Rounding is decided here: partial
//! hours round up, an exact number of hours does not.

use crate::domain::payment::{Bill, BillStatus, Payment};
use crate::domain::ticket::Ticket;
use std::time::Duration;
use tracing::{info, warn};

const NANOS_PER_HOUR: u128 = 3_600_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    pub base_fee: u64,
    pub hourly_rate: u64,
}

impl FeeSchedule {
    pub fn new(base_fee: u64, hourly_rate: u64) -> Self {
        Self { base_fee, hourly_rate }
    }

    /// Whole hours billed for `duration`, rounding any partial hour up
    pub fn billable_hours(duration: Duration) -> u64 {
        u64::try_from(duration.as_nanos().div_ceil(NANOS_PER_HOUR)).unwrap_or(u64::MAX)
    }

    /// base_fee + hourly_rate × billable hours; never below base_fee
    pub fn fee_for(&self, duration: Duration) -> u64 {
        let hours = Self::billable_hours(duration);
        self.base_fee.saturating_add(self.hourly_rate.saturating_mul(hours)).max(self.base_fee)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self { base_fee: 10, hourly_rate: 10 }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BillingError {
    #[error("ticket {0} is still open")]
    TicketOpen(String),
}

pub struct BillingService {
    schedule: FeeSchedule,
}

impl BillingService {
    pub fn new(schedule: FeeSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> FeeSchedule {
        self.schedule
    }

    /// Build a pending bill for a closed ticket
    pub fn bill_for(&self, ticket: &Ticket) -> Result<Bill, BillingError> {
        let (Some(exit_time), Some(duration)) = (ticket.exit_time, ticket.duration()) else {
            return Err(BillingError::TicketOpen(ticket.id.to_string()));
        };

        let amount = self.schedule.fee_for(duration);
        let bill = Bill::new(ticket.id.clone(), ticket.vehicle_id().clone(), exit_time, amount);

        info!(
            ticket_id = %ticket.id,
            vehicle_id = %ticket.vehicle_id(),
            duration_secs = %duration.as_secs(),
            hours = %FeeSchedule::billable_hours(duration),
            amount = %amount,
            "bill_created"
        );
        Ok(bill)
    }

    /// Apply a payment attempt and log the resulting bill status
    pub fn settle(&self, bill: &mut Bill, payment: Payment) -> BillStatus {
        let amount = payment.amount;
        let mode = payment.mode;
        let status = bill.record_payment(payment);
        if status == BillStatus::Paid {
            info!(bill_id = %bill.id, amount = %amount, mode = ?mode, "bill_paid");
        } else {
            warn!(
                bill_id = %bill.id,
                amount = %amount,
                outstanding = %bill.outstanding(),
                status = %status.as_str(),
                "bill_not_settled"
            );
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{PaymentMode, PaymentStatus};
    use crate::domain::types::{FloorNumber, SlotNumber, Vehicle, VehicleType};
    use chrono::{TimeDelta, Utc};

    fn closed_ticket(elapsed: TimeDelta) -> Ticket {
        let mut ticket =
            Ticket::open(Vehicle::new("DL01AB1234", VehicleType::Car), FloorNumber(1), SlotNumber(3), Utc::now());
        ticket.close(ticket.entry_time + elapsed);
        ticket
    }

    #[test]
    fn test_billable_hours_rounding() {
        assert_eq!(FeeSchedule::billable_hours(Duration::ZERO), 0);
        assert_eq!(FeeSchedule::billable_hours(Duration::from_secs(1)), 1);
        assert_eq!(FeeSchedule::billable_hours(Duration::from_secs(3600)), 1);
        assert_eq!(FeeSchedule::billable_hours(Duration::from_secs(3601)), 2);
        assert_eq!(FeeSchedule::billable_hours(Duration::from_millis(3_600_500)), 2);
        assert_eq!(FeeSchedule::billable_hours(Duration::from_millis(500)), 1);
        assert_eq!(FeeSchedule::billable_hours(Duration::from_secs(7200)), 2);
    }

    #[test]
    fn test_fee_two_hours() {
        assert_eq!(FeeSchedule::default().fee_for(Duration::from_secs(2 * 3600)), 30);
    }

    #[test]
    fn test_fee_minimum_is_base() {
        let schedule = FeeSchedule::new(25, 0);
        assert_eq!(schedule.fee_for(Duration::ZERO), 25);
        assert_eq!(schedule.fee_for(Duration::from_secs(10 * 3600)), 25);
    }

    #[test]
    fn test_bill_for_closed_ticket() {
        let service = BillingService::new(FeeSchedule::default());
        let ticket = closed_ticket(TimeDelta::minutes(90));

        let bill = service.bill_for(&ticket).unwrap();
        assert_eq!(bill.total_amount, 30);
        assert_eq!(bill.ticket_id, ticket.id);
        assert_eq!(bill.status, BillStatus::Pending);
    }

    #[test]
    fn test_bill_for_open_ticket_fails() {
        let service = BillingService::new(FeeSchedule::default());
        let ticket =
            Ticket::open(Vehicle::new("A", VehicleType::Car), FloorNumber(1), SlotNumber(3), Utc::now());
        assert!(matches!(service.bill_for(&ticket), Err(BillingError::TicketOpen(_))));
    }

    #[test]
    fn test_settle() {
        let service = BillingService::new(FeeSchedule::default());
        let mut bill = service.bill_for(&closed_ticket(TimeDelta::minutes(30))).unwrap();
        assert_eq!(bill.total_amount, 20);

        let status = service.settle(&mut bill, Payment::new(20, PaymentMode::Upi, "upi-1", PaymentStatus::Success));
        assert_eq!(status, BillStatus::Paid);
    }
}
