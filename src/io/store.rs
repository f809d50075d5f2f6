//! Ticket persistence collaborator
//!
//! The lot hands every ticket state change to a store after the in-memory
//! transition has happened. A lot without a store is fully functional.

use crate::domain::ticket::{Ticket, TicketId};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

pub trait TicketStore: Send + Sync {
    /// Persist the current state of `ticket`, overwriting by id. A Closed
    /// snapshot is never replaced by an Active one.
    fn save_ticket(&self, ticket: &Ticket) -> anyhow::Result<()>;

    /// Tickets whose latest saved state is still open
    fn load_open_tickets(&self) -> anyhow::Result<Vec<Ticket>>;
}

/// Store keeping the latest snapshot of each ticket in memory
#[derive(Default)]
pub struct InMemoryTicketStore {
    tickets: Mutex<FxHashMap<TicketId, Ticket>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &TicketId) -> Option<Ticket> {
        self.tickets.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tickets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.lock().is_empty()
    }
}

impl TicketStore for InMemoryTicketStore {
    fn save_ticket(&self, ticket: &Ticket) -> anyhow::Result<()> {
        let mut tickets = self.tickets.lock();
        match tickets.get_mut(&ticket.id) {
            Some(current) if !current.accepts_snapshot(ticket) => {
                debug!(ticket_id = %ticket.id, "stale_ticket_snapshot_ignored");
            }
            Some(current) => *current = ticket.clone(),
            None => {
                tickets.insert(ticket.id.clone(), ticket.clone());
            }
        }
        Ok(())
    }

    fn load_open_tickets(&self) -> anyhow::Result<Vec<Ticket>> {
        let mut open: Vec<Ticket> = self.tickets.lock().values().filter(|t| t.is_open()).cloned().collect();
        open.sort_by_key(|t| t.entry_time);
        Ok(open)
    }
}
