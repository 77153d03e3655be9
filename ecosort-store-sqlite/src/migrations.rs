//! Ordered, schema-versioned migrations for the SQLite backend.
//!
//! The applied schema version lives in SQLite's `PRAGMA user_version`; each
//! migration runs inside a transaction together with the version bump, so a
//! failed migration leaves the file at the previous version.

use sqlx::sqlite::SqlitePool;
use tracing::{debug, info};

use ecosort_core::ports::StoreError;

/// One schema step. Versions must be strictly increasing.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "users, bookings, ledger",
        sql: "\
CREATE TABLE users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL,
    address       TEXT,
    zone          TEXT,
    created_at    TEXT NOT NULL
);

CREATE TABLE bookings (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    resident_id    INTEGER NOT NULL REFERENCES users(id),
    scheduled_date TEXT NOT NULL,
    waste_type     TEXT NOT NULL,
    status         TEXT NOT NULL DEFAULT 'pending',
    zone           TEXT,
    notes          TEXT,
    issue          TEXT,
    weight_kg      REAL,
    created_at     TEXT NOT NULL
);

CREATE INDEX idx_bookings_resident ON bookings(resident_id);
CREATE INDEX idx_bookings_status ON bookings(status);

CREATE TABLE ledger_entries (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    resident_id  INTEGER NOT NULL REFERENCES users(id),
    booking_id   INTEGER REFERENCES bookings(id),
    points_delta INTEGER NOT NULL,
    reason       TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE INDEX idx_ledger_resident ON ledger_entries(resident_id);
",
    },
    Migration {
        version: 2,
        name: "rewards catalog",
        sql: "\
CREATE TABLE rewards (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    cost INTEGER NOT NULL
);
",
    },
];

/// Bring the database file up to the latest schema version.
///
/// Safe to call on every startup: already-applied versions are skipped.
///
/// # Errors
///
/// Returns a [`StoreError`] when a migration statement or the version bump
/// fails; the transaction rollback leaves the schema at the prior version.
pub async fn apply(pool: &SqlitePool) -> Result<(), StoreError> {
    let current: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;

    for migration in MIGRATIONS {
        if migration.version <= current {
            debug!(version = migration.version, "migration already applied");
            continue;
        }

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(migration.sql).execute(&mut *tx).await?;
        // PRAGMA arguments cannot be bound; the version is a trusted constant.
        sqlx::raw_sql(&format!("PRAGMA user_version = {}", migration.version))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            version = migration.version,
            name = migration.name,
            "applied schema migration"
        );
    }

    Ok(())
}

/// The schema version the newest migration produces.
#[must_use]
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}
