//! C1: connection registry.
//!
//! Caches one [`ConnectionEntry`] per X server connection behind a single
//! mutex (spec §4.1). This is the only process-wide mutable state in the
//! engine; its lifetime is bound to whatever owns it (e.g. a device or
//! instance object in the calling driver), not to the process itself.

use std::{collections::HashMap, sync::Arc, sync::Mutex};

use tracing::debug;
use x11rb::rust_connection::RustConnection;

use crate::{capabilities::ConnectionEntry, error::SetupError};

/// Caches per-connection capability probes.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: Mutex<HashMap<usize, Arc<ConnectionEntry>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached entry for `connection`, probing and inserting
    /// one if this is the first time this connection has been seen.
    ///
    /// The probe (blocking I/O) runs without holding the table's mutex;
    /// if a racing caller won the insert in the meantime, this call's
    /// freshly probed entry is discarded and the winner's is returned
    /// (spec §4.1).
    pub fn get_or_create(
        &self,
        connection: &Arc<RustConnection>,
        root: u32,
        want_shm: bool,
    ) -> Result<Arc<ConnectionEntry>, SetupError> {
        let key = Arc::as_ptr(connection) as usize;

        if let Some(entry) = self.entries.lock().unwrap().get(&key) {
            return Ok(entry.clone());
        }

        let probed = Arc::new(crate::capabilities::probe_connection(connection, root, want_shm)?);

        let mut table = self.entries.lock().unwrap();
        let entry = table.entry(key).or_insert_with(|| {
            debug!("registered new X11 connection entry");
            probed
        });
        Ok(entry.clone())
    }

    /// Frees every cached entry. Called once at engine teardown.
    pub fn destroy(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_has_no_entries() {
        let registry = ConnectionRegistry::new();
        assert!(registry.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn destroy_clears_all_entries() {
        let registry = ConnectionRegistry::new();
        registry
            .entries
            .lock()
            .unwrap()
            .insert(1, Arc::new(ConnectionEntry {
                present_available: true,
                dri3_available: true,
                xfixes_available: true,
                has_dri3_modifiers: false,
                has_xfixes_regions: true,
                mit_shm_available_and_usable: false,
                is_xwayland: false,
                is_proprietary_stack: false,
            }));
        assert_eq!(registry.entries.lock().unwrap().len(), 1);
        registry.destroy();
        assert!(registry.entries.lock().unwrap().is_empty());
    }
}
