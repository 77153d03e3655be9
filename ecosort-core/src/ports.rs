//! Traits describing storage capabilities and shared helper types.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Error as SqlxError;

use crate::model::{
    Booking, BookingId, BookingStatus, LedgerEntry, Reward, RewardId, Role, User, UserId,
    WasteType, Zone,
};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to storage backends or applying
/// domain rules on top of them.
pub enum StoreError {
    /// Underlying database call failed.
    #[error("Database error: {0}")]
    Database(#[from] SqlxError),
    /// Password hashing or verification machinery failed.
    #[error("Password hash error: {0}")]
    PasswordHash(String),
    /// Registration conflict: the username is already taken.
    #[error("Username already taken")]
    DuplicateUser,
    /// Login failure; identical for unknown users and wrong passwords.
    #[error("Invalid username or password")]
    InvalidCredentials,
    /// Registration with a blank username or password.
    #[error("Username and password must not be empty")]
    EmptyCredentials,
    /// Residents must provide a home address at registration.
    #[error("Residents must provide an address")]
    AddressRequired,
    /// Referenced user does not exist.
    #[error("User not found")]
    UserNotFound,
    /// Referenced booking does not exist.
    #[error("Booking not found")]
    BookingNotFound,
    /// Referenced reward does not exist.
    #[error("Reward not found")]
    RewardNotFound,
    /// The requested status change is not in the transition table.
    #[error("Illegal status change: {from} -> {to}")]
    InvalidTransition {
        /// State the booking was observed in.
        from: BookingStatus,
        /// State the caller asked for.
        to: BookingStatus,
    },
    /// A concurrent edit changed the booking between read and update.
    #[error("Booking was modified concurrently")]
    Conflict,
    /// The booking is already in a terminal state.
    #[error("Booking is already {0}")]
    BookingClosed(BookingStatus),
    /// Completion needs a positive collected weight.
    #[error("Weight must be a positive number of kilograms")]
    InvalidWeight,
    /// The resident's balance does not cover the redemption.
    #[error("Not enough points")]
    InsufficientPoints,
    /// The acting role is not allowed to perform the operation.
    #[error("Operation not permitted for role {0}")]
    NotPermitted(Role),
    /// Internal backend error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone)]
/// Write payload for registering a user.
pub struct NewUser {
    /// Login name, already normalised to lowercase.
    pub username: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    /// Account role.
    pub role: Role,
    /// Home address, when the role requires one.
    pub address: Option<String>,
    /// Home or duty zone.
    pub zone: Option<Zone>,
}

#[derive(Debug, Clone)]
/// Write payload for creating a booking. New bookings always start pending.
pub struct NewBooking {
    /// The booking resident.
    pub resident: UserId,
    /// Requested collection day.
    pub scheduled_date: NaiveDate,
    /// What is being collected.
    pub waste_type: WasteType,
    /// Zone copied from the resident.
    pub zone: Option<Zone>,
    /// Instructions for the collector.
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
/// Write payload for appending a ledger entry.
pub struct NewLedgerEntry {
    /// Account the entry belongs to.
    pub resident: UserId,
    /// Signed points movement.
    pub points_delta: i64,
    /// Human-readable cause.
    pub reason: String,
    /// Originating booking, when there is one.
    pub booking: Option<BookingId>,
}

#[async_trait]
/// Storage port for user accounts and role assignments.
pub trait IdentityStore: Send + Sync {
    /// Persist a new account.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateUser`] when the username is taken, or a
    /// [`StoreError`] when the backend fails.
    async fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Look up an account by its (lowercase) username.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Look up an account by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// All registered accounts, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn all_users(&self) -> Result<Vec<User>, StoreError>;

    /// Overwrite a user's zone (admin reassigning a collector's duty zone).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UserNotFound`] for an unknown id, or a
    /// [`StoreError`] when the backend fails.
    async fn set_assigned_zone(&self, user: UserId, zone: Zone) -> Result<(), StoreError>;
}

#[async_trait]
/// Storage port for pickup bookings and their status transitions.
pub trait BookingStore: Send + Sync {
    /// Persist a new pending booking.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails or the resident does
    /// not exist.
    async fn insert_booking(&self, new_booking: NewBooking) -> Result<Booking, StoreError>;

    /// Look up a booking by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    /// A resident's bookings, newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn bookings_for_resident(&self, resident: UserId) -> Result<Vec<Booking>, StoreError>;

    /// All bookings in the given state, oldest first, optionally restricted
    /// to one zone.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn bookings_with_status(
        &self,
        status: BookingStatus,
        zone: Option<&Zone>,
    ) -> Result<Vec<Booking>, StoreError>;

    /// Every booking in the store, newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn all_bookings(&self) -> Result<Vec<Booking>, StoreError>;

    /// Compare-and-swap status update: the single-row write succeeds only if
    /// the stored status still equals `expected`. Optionally records the
    /// collected weight in the same write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BookingNotFound`] for an unknown id,
    /// [`StoreError::Conflict`] when the stored status no longer matches
    /// `expected`, or a [`StoreError`] when the backend fails.
    async fn update_status(
        &self,
        id: BookingId,
        expected: BookingStatus,
        next: BookingStatus,
        weight_kg: Option<f64>,
    ) -> Result<Booking, StoreError>;

    /// Attach a collector-reported issue note to a booking.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BookingNotFound`] for an unknown id, or a
    /// [`StoreError`] when the backend fails.
    async fn record_issue(&self, id: BookingId, note: &str) -> Result<(), StoreError>;
}

#[async_trait]
/// Storage port for the append-only eco-points ledger.
pub trait LedgerStore: Send + Sync {
    /// Append one entry. Entries are immutable once written.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError>;

    /// A resident's entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn entries_for(&self, resident: UserId) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Derived balance: the sum of the resident's deltas.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn balance(&self, resident: UserId) -> Result<i64, StoreError>;

    /// Per-resident balance totals, highest first (leaderboard source).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn totals_by_resident(&self) -> Result<Vec<(UserId, i64)>, StoreError>;
}

#[async_trait]
/// Storage port for the rewards catalog.
pub trait RewardStore: Send + Sync {
    /// The full catalog, cheapest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn all(&self) -> Result<Vec<Reward>, StoreError>;

    /// Look up a catalog item by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn reward(&self, id: RewardId) -> Result<Option<Reward>, StoreError>;
}
