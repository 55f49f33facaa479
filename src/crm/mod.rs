//! Relationship engine: leads, the actions recorded against them, and the one
//! follow-up process each lead gets once it has an action.
//!
//! Every call goes through a single connection guarded by a mutex. Writes
//! that read before they decide (`create_action`, `reconcile_processes`) also
//! run inside a `BEGIN IMMEDIATE` transaction, so two engines on the same
//! database file cannot both create a process for one lead.

use parking_lot::{Mutex, MutexGuard};

use crate::config::Config;
use crate::db::{DbError, Entity, Filter, Record, Store, Value};
use crate::error::CrmError;
use crate::util::now_local_timestamp;

pub mod actions;
pub mod leads;
pub mod processes;
pub mod types;

pub use types::*;

pub struct Crm {
    store: Mutex<Store>,
}

impl Crm {
    /// Open the database named by `config` and make sure the collections exist.
    pub fn open(config: &Config) -> Result<Self, CrmError> {
        let store = Store::open_at(&config.database_path, config.busy_timeout())?;
        Self::with_store(store)
    }

    /// Wrap an already-open store, creating or upgrading the collections.
    pub fn with_store(store: Store) -> Result<Self, CrmError> {
        init_schema(&store)?;
        Ok(Self {
            store: Mutex::new(store),
        })
    }

    /// Lock the store for ad-hoc access.
    pub fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock()
    }
}

/// Create the three collections and bring older databases up to the current
/// column set. Databases from before leads carried a `url`, or actions a
/// `timestamp`, get those columns added in place. Rows that predate the
/// `status` and `timestamp` rules are filled in so they decode.
fn init_schema(store: &Store) -> Result<(), DbError> {
    store.ensure_collection::<Lead>()?;
    store.ensure_collection::<Action>()?;
    store.ensure_collection::<Process>()?;

    store.add_column(Lead::COLLECTION, "url", "TEXT")?;
    store.add_column(Action::COLLECTION, "timestamp", "TEXT")?;
    store.add_column(Process::COLLECTION, "name", "TEXT")?;

    let defaulted = store.update(
        Lead::COLLECTION,
        &Record::new().with("status", DEFAULT_LEAD_STATUS),
        &[Filter::eq(LeadField::Status, Value::Null)],
    )?;
    if defaulted > 0 {
        log::info!("Set status '{DEFAULT_LEAD_STATUS}' on {defaulted} legacy leads");
    }

    // ALTER TABLE only accepts constant defaults, so stamp existing rows by hand
    let stamped = store.update(
        Action::COLLECTION,
        &Record::new().with("timestamp", now_local_timestamp()),
        &[Filter::eq(ActionField::Timestamp, Value::Null)],
    )?;
    if stamped > 0 {
        log::info!("Backfilled timestamp on {stamped} legacy actions");
    }
    Ok(())
}

// =============================================================================
// Shared test utilities
// =============================================================================
