//! SQLite storage backend for EcoSort.
//!
//! Implements the core storage ports against a single local database file
//! (or an in-memory database for tests), using explicit schema-versioned
//! migrations instead of ad-hoc `CREATE TABLE IF NOT EXISTS`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Error as SqlxError;
use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use ecosort_core::{
    backend::{BackendMeta, StorageBackend},
    model::{
        Booking, BookingId, BookingStatus, LedgerEntry, LedgerEntryId, Reward, RewardId, Role,
        User, UserId, WasteType, Zone,
    },
    ports::{
        BookingStore, IdentityStore, LedgerStore, NewBooking, NewLedgerEntry, NewUser,
        RewardStore, StoreError,
    },
};

/// Schema-versioned migrations for this backend.
pub mod migrations;

/// Rewards inserted when the catalog is empty, as shipped by the original
/// deployment.
const DEFAULT_REWARDS: [(&str, i64); 5] = [
    ("Metal Straw Set", 100),
    ("GrabFood RM5 Discount", 250),
    ("Tesco RM10 Voucher", 500),
    ("EcoSort T-Shirt", 1000),
    ("Netflix 1-Month Sub", 1500),
];

/// Open (or create) the database file and build the full port bundle.
///
/// # Errors
///
/// Returns a [`StoreError`] when the file cannot be opened or a migration
/// fails.
pub async fn backend(path: &Path) -> Result<StorageBackend, StoreError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    build(pool).await
}

/// Build the bundle on a fresh in-memory database.
///
/// # Errors
///
/// Returns a [`StoreError`] when a migration fails.
pub async fn backend_in_memory() -> Result<StorageBackend, StoreError> {
    build(memory_pool().await?).await
}

/// Pool over a private in-memory database. A single connection is pinned so
/// every query sees the same database.
async fn memory_pool() -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    Ok(pool)
}

async fn build(pool: SqlitePool) -> Result<StorageBackend, StoreError> {
    migrations::apply(&pool).await?;
    seed_default_rewards(&pool).await?;
    Ok(StorageBackend {
        meta: BackendMeta {
            id: "sqlite".to_owned(),
            name: "SQLite file store".to_owned(),
        },
        identity: Arc::new(SqliteIdentityStore::new(pool.clone())),
        bookings: Arc::new(SqliteBookingStore::new(pool.clone())),
        ledger: Arc::new(SqliteLedgerStore::new(pool.clone())),
        rewards: Arc::new(SqliteRewardStore::new(pool)),
    })
}

/// Insert the default rewards catalog when the table is empty.
///
/// # Errors
///
/// Returns a [`StoreError`] when the backend fails.
pub async fn seed_default_rewards(pool: &SqlitePool) -> Result<(), StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rewards")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }
    for (name, cost) in DEFAULT_REWARDS {
        sqlx::query("INSERT INTO rewards (name, cost) VALUES (?, ?)")
            .bind(name)
            .bind(cost)
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    role: String,
    address: Option<String>,
    zone: Option<String>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<User, StoreError> {
        let role = Role::parse(&self.role).ok_or_else(|| {
            StoreError::Internal(format!("Unknown role in users table: {}", self.role))
        })?;
        Ok(User {
            id: UserId(self.id),
            username: self.username,
            password_hash: self.password_hash,
            role,
            address: self.address,
            zone: self.zone.map(Zone),
            created_at: self.created_at,
        })
    }
}

/// Row shape of the `bookings` table.
#[derive(Debug, FromRow)]
struct BookingRow {
    id: i64,
    resident_id: i64,
    scheduled_date: NaiveDate,
    waste_type: String,
    status: String,
    zone: Option<String>,
    notes: Option<String>,
    issue: Option<String>,
    weight_kg: Option<f64>,
    created_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking, StoreError> {
        let status = BookingStatus::parse(&self.status).ok_or_else(|| {
            StoreError::Internal(format!("Unknown status in bookings table: {}", self.status))
        })?;
        Ok(Booking {
            id: BookingId(self.id),
            resident: UserId(self.resident_id),
            scheduled_date: self.scheduled_date,
            waste_type: WasteType::parse(&self.waste_type),
            status,
            zone: self.zone.map(Zone),
            notes: self.notes,
            issue: self.issue,
            weight_kg: self.weight_kg,
            created_at: self.created_at,
        })
    }
}

/// Row shape of the `ledger_entries` table.
#[derive(Debug, FromRow)]
struct LedgerRow {
    id: i64,
    resident_id: i64,
    booking_id: Option<i64>,
    points_delta: i64,
    reason: String,
    created_at: DateTime<Utc>,
}

impl LedgerRow {
    fn into_entry(self) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId(self.id),
            resident: UserId(self.resident_id),
            points_delta: self.points_delta,
            reason: self.reason,
            booking: self.booking_id.map(BookingId),
            created_at: self.created_at,
        }
    }
}

/// Row shape of the `rewards` table.
#[derive(Debug, FromRow)]
struct RewardRow {
    id: i64,
    name: String,
    cost: i64,
}

impl RewardRow {
    fn into_reward(self) -> Reward {
        Reward {
            id: RewardId(self.id),
            name: self.name,
            cost: self.cost,
        }
    }
}

/// Identity port over the `users` table.
pub struct SqliteIdentityStore {
    pool: SqlitePool,
}

impl SqliteIdentityStore {
    /// Create a new store bound to the given pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, role, address, zone, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(new_user.role.as_str())
        .bind(&new_user.address)
        .bind(new_user.zone.as_ref().map(|zone| zone.0.as_str()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        self.user_by_id(UserId(result.last_insert_rowid()))
            .await?
            .ok_or_else(|| StoreError::Internal("Inserted user vanished".into()))
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRow::into_user)
            .transpose()
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRow::into_user)
            .transpose()
    }

    async fn all_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn set_assigned_zone(&self, user: UserId, zone: Zone) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET zone = ? WHERE id = ?")
            .bind(zone.0)
            .bind(user.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::UserNotFound);
        }
        Ok(())
    }
}

/// Booking port over the `bookings` table.
pub struct SqliteBookingStore {
    pool: SqlitePool,
}

impl SqliteBookingStore {
    /// Create a new store bound to the given pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn fetch_booking(pool: &SqlitePool, id: BookingId) -> Result<Option<Booking>, StoreError> {
    sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings WHERE id = ?")
        .bind(id.0)
        .fetch_optional(pool)
        .await?
        .map(BookingRow::into_booking)
        .transpose()
}

#[async_trait]
impl BookingStore for SqliteBookingStore {
    async fn insert_booking(&self, new_booking: NewBooking) -> Result<Booking, StoreError> {
        let result = sqlx::query(
            "INSERT INTO bookings (resident_id, scheduled_date, waste_type, status, zone, notes, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new_booking.resident.0)
        .bind(new_booking.scheduled_date)
        .bind(new_booking.waste_type.as_str())
        .bind(BookingStatus::Pending.as_str())
        .bind(new_booking.zone.as_ref().map(|zone| zone.0.as_str()))
        .bind(&new_booking.notes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        fetch_booking(&self.pool, BookingId(result.last_insert_rowid()))
            .await?
            .ok_or_else(|| StoreError::Internal("Inserted booking vanished".into()))
    }

    async fn booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        fetch_booking(&self.pool, id).await
    }

    async fn bookings_for_resident(&self, resident: UserId) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(
            "SELECT * FROM bookings WHERE resident_id = ? ORDER BY id DESC",
        )
        .bind(resident.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn bookings_with_status(
        &self,
        status: BookingStatus,
        zone: Option<&Zone>,
    ) -> Result<Vec<Booking>, StoreError> {
        let rows = match zone {
            Some(zone) => {
                sqlx::query_as::<_, BookingRow>(
                    "SELECT * FROM bookings WHERE status = ? AND zone = ? ORDER BY id",
                )
                .bind(status.as_str())
                .bind(zone.0.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, BookingRow>(
                    "SELECT * FROM bookings WHERE status = ? ORDER BY id",
                )
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn all_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn update_status(
        &self,
        id: BookingId,
        expected: BookingStatus,
        next: BookingStatus,
        weight_kg: Option<f64>,
    ) -> Result<Booking, StoreError> {
        // Single-row compare-and-swap: the WHERE clause re-checks the expected
        // status so a racing writer makes this a no-op instead of a lost update.
        let result = sqlx::query(
            "UPDATE bookings SET status = ?, weight_kg = COALESCE(?, weight_kg) \
             WHERE id = ? AND status = ?",
        )
        .bind(next.as_str())
        .bind(weight_kg)
        .bind(id.0)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match fetch_booking(&self.pool, id).await? {
                None => Err(StoreError::BookingNotFound),
                Some(_) => Err(StoreError::Conflict),
            };
        }

        fetch_booking(&self.pool, id)
            .await?
            .ok_or(StoreError::BookingNotFound)
    }

    async fn record_issue(&self, id: BookingId, note: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE bookings SET issue = ? WHERE id = ?")
            .bind(note)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::BookingNotFound);
        }
        Ok(())
    }
}

/// Ledger port over the `ledger_entries` table. Append-only: no update or
/// delete statement exists anywhere in this store.
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Create a new store bound to the given pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let result = sqlx::query(
            "INSERT INTO ledger_entries (resident_id, booking_id, points_delta, reason, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.resident.0)
        .bind(entry.booking.map(|booking| booking.0))
        .bind(entry.points_delta)
        .bind(&entry.reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, LedgerRow>("SELECT * FROM ledger_entries WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into_entry())
    }

    async fn entries_for(&self, resident: UserId) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            "SELECT * FROM ledger_entries WHERE resident_id = ? ORDER BY id DESC",
        )
        .bind(resident.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LedgerRow::into_entry).collect())
    }

    async fn balance(&self, resident: UserId) -> Result<i64, StoreError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(points_delta), 0) FROM ledger_entries WHERE resident_id = ?",
        )
        .bind(resident.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn totals_by_resident(&self) -> Result<Vec<(UserId, i64)>, StoreError> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT resident_id, SUM(points_delta) AS total FROM ledger_entries \
             GROUP BY resident_id ORDER BY total DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(resident, total)| (UserId(resident), total))
            .collect())
    }
}

/// Reward catalog port over the `rewards` table.
pub struct SqliteRewardStore {
    pool: SqlitePool,
}

impl SqliteRewardStore {
    /// Create a new store bound to the given pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RewardStore for SqliteRewardStore {
    async fn all(&self) -> Result<Vec<Reward>, StoreError> {
        let rows = sqlx::query_as::<_, RewardRow>("SELECT * FROM rewards ORDER BY cost")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(RewardRow::into_reward).collect())
    }

    async fn reward(&self, id: RewardId) -> Result<Option<Reward>, StoreError> {
        let row = sqlx::query_as::<_, RewardRow>("SELECT * FROM rewards WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(RewardRow::into_reward))
    }
}

fn map_unique_violation(err: SqlxError) -> StoreError {
    match &err {
        SqlxError::Database(db) if db.is_unique_violation() => StoreError::DuplicateUser,
        _ => StoreError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_backend() -> StorageBackend {
        backend_in_memory().await.expect("in-memory backend")
    }

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_owned(),
            password_hash: "$argon2id$test".to_owned(),
            role,
            address: Some("12 Jalan Teknokrat 3".to_owned()),
            zone: Some(Zone("Zone A".to_owned())),
        }
    }

    fn new_booking(resident: UserId) -> NewBooking {
        NewBooking {
            resident,
            scheduled_date: NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date"),
            waste_type: WasteType::Recyclable,
            zone: Some(Zone("Zone A".to_owned())),
            notes: Some("Gate code 4711".to_owned()),
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent_and_bump_the_version() {
        let pool = memory_pool().await.expect("pool");
        migrations::apply(&pool).await.expect("first run");
        migrations::apply(&pool).await.expect("second run");

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await
            .expect("user_version");
        assert_eq!(version, migrations::latest_version());
    }

    #[tokio::test]
    async fn duplicate_username_maps_to_duplicate_user() {
        let backend = test_backend().await;
        backend
            .identity
            .insert_user(new_user("alice", Role::Resident))
            .await
            .expect("first insert");
        let err = backend
            .identity
            .insert_user(new_user("alice", Role::Collector))
            .await
            .expect_err("second insert must fail");
        assert!(matches!(err, StoreError::DuplicateUser));
    }

    #[tokio::test]
    async fn user_round_trips_through_rows() {
        let backend = test_backend().await;
        let user = backend
            .identity
            .insert_user(new_user("alice", Role::Resident))
            .await
            .expect("insert");
        let fetched = backend
            .identity
            .user_by_username("alice")
            .await
            .expect("query")
            .expect("present");
        assert_eq!(fetched.id, user.id);
        assert_eq!(fetched.role, Role::Resident);
        assert_eq!(fetched.zone, Some(Zone("Zone A".to_owned())));
    }

    #[tokio::test]
    async fn status_cas_rejects_stale_writers() {
        let backend = test_backend().await;
        let alice = backend
            .identity
            .insert_user(new_user("alice", Role::Resident))
            .await
            .expect("insert user");
        let booking = backend
            .bookings
            .insert_booking(new_booking(alice.id))
            .await
            .expect("insert booking");
        assert_eq!(booking.status, BookingStatus::Pending);

        let assigned = backend
            .bookings
            .update_status(
                booking.id,
                BookingStatus::Pending,
                BookingStatus::Assigned,
                None,
            )
            .await
            .expect("first CAS");
        assert_eq!(assigned.status, BookingStatus::Assigned);

        // A second writer still expecting `pending` must lose the race.
        let err = backend
            .bookings
            .update_status(
                booking.id,
                BookingStatus::Pending,
                BookingStatus::Assigned,
                None,
            )
            .await
            .expect_err("stale CAS must fail");
        assert!(matches!(err, StoreError::Conflict));

        let err = backend
            .bookings
            .update_status(
                BookingId(9999),
                BookingStatus::Pending,
                BookingStatus::Assigned,
                None,
            )
            .await
            .expect_err("unknown booking must fail");
        assert!(matches!(err, StoreError::BookingNotFound));
    }

    #[tokio::test]
    async fn completion_records_weight() {
        let backend = test_backend().await;
        let alice = backend
            .identity
            .insert_user(new_user("alice", Role::Resident))
            .await
            .expect("insert user");
        let booking = backend
            .bookings
            .insert_booking(new_booking(alice.id))
            .await
            .expect("insert booking");
        backend
            .bookings
            .update_status(
                booking.id,
                BookingStatus::Pending,
                BookingStatus::Assigned,
                None,
            )
            .await
            .expect("assign");
        let completed = backend
            .bookings
            .update_status(
                booking.id,
                BookingStatus::Assigned,
                BookingStatus::Completed,
                Some(3.5),
            )
            .await
            .expect("complete");
        assert_eq!(completed.status, BookingStatus::Completed);
        assert_eq!(completed.weight_kg, Some(3.5));
    }

    #[tokio::test]
    async fn balance_is_the_sum_of_entries() {
        let backend = test_backend().await;
        let alice = backend
            .identity
            .insert_user(new_user("alice", Role::Resident))
            .await
            .expect("insert user");

        for delta in [35, 20, -40] {
            backend
                .ledger
                .append(NewLedgerEntry {
                    resident: alice.id,
                    points_delta: delta,
                    reason: "test entry".to_owned(),
                    booking: None,
                })
                .await
                .expect("append");
        }

        let balance = backend.ledger.balance(alice.id).await.expect("balance");
        assert_eq!(balance, 15);

        let entries = backend.ledger.entries_for(alice.id).await.expect("entries");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries.iter().map(|entry| entry.points_delta).sum::<i64>(), balance);
    }

    #[tokio::test]
    async fn totals_rank_residents_highest_first() {
        let backend = test_backend().await;
        let alice = backend
            .identity
            .insert_user(new_user("alice", Role::Resident))
            .await
            .expect("alice");
        let bob = backend
            .identity
            .insert_user(new_user("bob", Role::Resident))
            .await
            .expect("bob");

        for (resident, delta) in [(alice.id, 50), (bob.id, 120), (alice.id, 30)] {
            backend
                .ledger
                .append(NewLedgerEntry {
                    resident,
                    points_delta: delta,
                    reason: "test entry".to_owned(),
                    booking: None,
                })
                .await
                .expect("append");
        }

        let totals = backend.ledger.totals_by_resident().await.expect("totals");
        assert_eq!(totals, vec![(bob.id, 120), (alice.id, 80)]);
    }

    #[tokio::test]
    async fn rewards_are_seeded_once() {
        let backend = test_backend().await;
        let rewards = backend.rewards.all().await.expect("rewards");
        assert_eq!(rewards.len(), DEFAULT_REWARDS.len());
        // Catalog is cost-ascending.
        assert!(rewards.windows(2).all(|pair| pair[0].cost <= pair[1].cost));
    }

    #[tokio::test]
    async fn zone_filter_restricts_open_bookings() {
        let backend = test_backend().await;
        let alice = backend
            .identity
            .insert_user(new_user("alice", Role::Resident))
            .await
            .expect("alice");
        backend
            .bookings
            .insert_booking(new_booking(alice.id))
            .await
            .expect("zone A booking");
        let mut other = new_booking(alice.id);
        other.zone = Some(Zone("Zone B".to_owned()));
        backend
            .bookings
            .insert_booking(other)
            .await
            .expect("zone B booking");

        let zone_a = backend
            .bookings
            .bookings_with_status(BookingStatus::Pending, Some(&Zone("Zone A".to_owned())))
            .await
            .expect("filtered");
        assert_eq!(zone_a.len(), 1);

        let all = backend
            .bookings
            .bookings_with_status(BookingStatus::Pending, None)
            .await
            .expect("unfiltered");
        assert_eq!(all.len(), 2);
    }
}
