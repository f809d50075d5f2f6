//! Ticket journal - appends ticket snapshots to a JSONL file
//!
//! Every save appends one JSON object per line. Loading replays the file
//! and keeps the last snapshot per ticket id, so a ticket opened and later
//! closed is not reported as open. Closed is terminal: an Active line
//! appended after the Closed one (two gates racing to save) is ignored.

use crate::domain::ticket::{Ticket, TicketId};
use crate::io::store::TicketStore;
use anyhow::Context;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct JsonlTicketStore {
    file_path: PathBuf,
    /// Serializes appends from concurrent gates
    write_lock: Mutex<()>,
}

impl JsonlTicketStore {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        info!(file_path = %file_path.display(), "ticket_store_initialized");
        Self { file_path, write_lock: Mutex::new(()) }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let _guard = self.write_lock.lock();

        // Create parent directories if they don't exist
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.file_path)?;
        writeln!(file, "{}", line)?;
        debug!(file = %self.file_path.display(), bytes = %line.len(), "ticket_snapshot_written");

        Ok(())
    }
}

impl TicketStore for JsonlTicketStore {
    fn save_ticket(&self, ticket: &Ticket) -> anyhow::Result<()> {
        let json = serde_json::to_string(ticket).context("Failed to serialize ticket")?;
        self.append_line(&json)
            .with_context(|| format!("Failed to append to ticket journal {}", self.file_path.display()))
    }

    fn load_open_tickets(&self) -> anyhow::Result<Vec<Ticket>> {
        if !self.file_path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.file_path)
            .with_context(|| format!("Failed to open ticket journal {}", self.file_path.display()))?;

        let mut latest: FxHashMap<TicketId, Ticket> = FxHashMap::default();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read ticket journal line {}", line_no + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Ticket>(&line) {
                Ok(ticket) => match latest.get_mut(&ticket.id) {
                    Some(current) if !current.accepts_snapshot(&ticket) => {
                        debug!(ticket_id = %ticket.id, line = %(line_no + 1), "stale_ticket_snapshot_ignored");
                    }
                    Some(current) => *current = ticket,
                    None => {
                        latest.insert(ticket.id.clone(), ticket);
                    }
                },
                Err(e) => {
                    // A torn final write must not block recovery of the rest
                    warn!(line = %(line_no + 1), error = %e, "ticket_journal_line_skipped");
                }
            }
        }

        let mut open: Vec<Ticket> = latest.into_values().filter(|t| t.is_open()).collect();
        open.sort_by_key(|t| t.entry_time);
        Ok(open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{FloorNumber, SlotNumber, Vehicle, VehicleType};
    use chrono::{TimeDelta, Utc};
    use tempfile::tempdir;

    fn ticket(id: &str, slot: u32) -> Ticket {
        Ticket::open(Vehicle::new(id, VehicleType::Car), FloorNumber(1), SlotNumber(slot), Utc::now())
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = JsonlTicketStore::new(dir.path().join("tickets.jsonl"));
        assert!(store.load_open_tickets().unwrap().is_empty());
    }

    #[test]
    fn test_save_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("tickets.jsonl");
        let store = JsonlTicketStore::new(&path);

        let mut t = ticket("A", 3);
        store.save_ticket(&t).unwrap();
        t.close(t.entry_time + TimeDelta::hours(1));
        store.save_ticket(&t).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));

        let parsed: serde_json::Value = serde_json::from_str(content.lines().last().unwrap()).unwrap();
        assert_eq!(parsed["id"], t.id.0);
        assert_eq!(parsed["status"], "closed");
    }

    #[test]
    fn test_load_keeps_latest_snapshot() {
        let dir = tempdir().unwrap();
        let store = JsonlTicketStore::new(dir.path().join("tickets.jsonl"));

        let mut closed = ticket("A", 3);
        let still_open = ticket("B", 4);
        store.save_ticket(&closed).unwrap();
        store.save_ticket(&still_open).unwrap();
        closed.close(closed.entry_time + TimeDelta::minutes(20));
        store.save_ticket(&closed).unwrap();

        let open = store.load_open_tickets().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].vehicle_id().as_str(), "B");
    }

    #[test]
    fn test_closed_snapshot_wins_over_later_active_line() {
        let dir = tempdir().unwrap();
        let store = JsonlTicketStore::new(dir.path().join("tickets.jsonl"));

        let opened = ticket("A", 3);
        let mut closed = opened.clone();
        closed.close(opened.entry_time + TimeDelta::minutes(10));
        store.save_ticket(&closed).unwrap();
        store.save_ticket(&opened).unwrap();

        assert!(store.load_open_tickets().unwrap().is_empty());
    }

    #[test]
    fn test_load_skips_corrupt_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tickets.jsonl");
        let store = JsonlTicketStore::new(&path);

        store.save_ticket(&ticket("A", 3)).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{\"id\": \"trunc").unwrap();

        assert_eq!(store.load_open_tickets().unwrap().len(), 1);
    }
}
