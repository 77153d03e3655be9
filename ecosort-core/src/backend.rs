//! Bundle type tying one storage engine's port implementations together.

use std::sync::Arc;

use crate::ports::{BookingStore, IdentityStore, LedgerStore, RewardStore};

#[derive(Debug, Clone)]
/// Metadata describing a storage backend.
pub struct BackendMeta {
    /// Stable identifier used in configuration, e.g. `"sqlite"`.
    pub id: String,
    /// Human-friendly display name.
    pub name: String,
}

/// Collection of ports implemented by a single persistence engine.
///
/// The service only ever sees this bundle, so swapping the local SQLite file
/// for a networked database is a matter of constructing a different backend.
pub struct StorageBackend {
    /// Static metadata describing the engine.
    pub meta: BackendMeta,
    /// Implementation for accounts and roles.
    pub identity: Arc<dyn IdentityStore>,
    /// Implementation for bookings and status transitions.
    pub bookings: Arc<dyn BookingStore>,
    /// Implementation for the append-only points ledger.
    pub ledger: Arc<dyn LedgerStore>,
    /// Implementation for the rewards catalog.
    pub rewards: Arc<dyn RewardStore>,
}
