//! Bills and payments produced at the exit desk

use crate::domain::ticket::TicketId;
use crate::domain::types::VehicleId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    Cash,
    Online,
    Card,
    Upi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Pending,
    PartiallyPaid,
    Paid,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "pending",
            BillStatus::PartiallyPaid => "partially_paid",
            BillStatus::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub amount: u64,
    pub mode: PaymentMode,
    /// Reference from the payment provider (receipt, UPI txn id, ...)
    pub ref_id: String,
    pub status: PaymentStatus,
    pub paid_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(amount: u64, mode: PaymentMode, ref_id: impl Into<String>, status: PaymentStatus) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            amount,
            mode,
            ref_id: ref_id.into(),
            status,
            paid_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub ticket_id: TicketId,
    pub vehicle_id: VehicleId,
    pub exit_time: DateTime<Utc>,
    pub total_amount: u64,
    pub status: BillStatus,
    pub payments: Vec<Payment>,
}

impl Bill {
    pub fn new(ticket_id: TicketId, vehicle_id: VehicleId, exit_time: DateTime<Utc>, total_amount: u64) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            ticket_id,
            vehicle_id,
            exit_time,
            total_amount,
            status: BillStatus::Pending,
            payments: Vec::new(),
        }
    }

    /// Sum of successful payments
    pub fn paid_amount(&self) -> u64 {
        self.payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Success)
            .map(|p| p.amount)
            .sum()
    }

    pub fn outstanding(&self) -> u64 {
        self.total_amount.saturating_sub(self.paid_amount())
    }

    /// Attach a payment attempt. Failed attempts are kept for the record but
    /// do not move the status.
    pub fn record_payment(&mut self, payment: Payment) -> BillStatus {
        self.payments.push(payment);
        let paid = self.paid_amount();
        self.status = if paid >= self.total_amount {
            BillStatus::Paid
        } else if paid > 0 {
            BillStatus::PartiallyPaid
        } else {
            BillStatus::Pending
        };
        self.status
    }
}
