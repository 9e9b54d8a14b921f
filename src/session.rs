// src/session.rs

use anyhow::Result;
use tracing::info;

use crate::process::{self, TripRecord};

/// Owner of the current working set. Every load rebuilds the set from
/// scratch; a failed load leaves the previous records in place as the
/// last-known-good state.
#[derive(Default)]
pub struct Session {
    records: Vec<TripRecord>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the working set from raw export text. On success returns the
    /// new record count; on failure the existing records are untouched.
    pub fn load(&mut self, text: &str) -> Result<usize> {
        let records = process::build_records(text)?;
        info!(
            replaced = self.records.len(),
            loaded = records.len(),
            "working set reloaded"
        );
        self.records = records;
        Ok(self.records.len())
    }

    pub fn records(&self) -> &[TripRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "Data,Tipo,Luogo\n5/3/2024,Notte,Roma\n";

    #[test]
    fn load_replaces_records_on_success() {
        let mut session = Session::new();
        assert_eq!(session.load(GOOD).unwrap(), 1);
        assert_eq!(session.records()[0].city, "Roma");
    }

    #[test]
    fn failed_load_keeps_last_known_good() {
        let mut session = Session::new();
        session.load(GOOD).unwrap();

        // header without a date column is a fatal load error
        assert!(session.load("Da,A\nMilano,Roma\n").is_err());
        assert_eq!(session.records().len(), 1);
        assert_eq!(session.records()[0].city, "Roma");
    }
}
