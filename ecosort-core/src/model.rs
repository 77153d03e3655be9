//! Domain data structures for users, bookings, and the eco-points ledger.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a registered user.
pub struct UserId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a pickup booking.
pub struct BookingId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a ledger entry.
pub struct LedgerEntryId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a reward catalog item.
pub struct RewardId(pub i64);

impl fmt::Display for BookingId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Closed set of account roles. A user's role is fixed at registration.
pub enum Role {
    /// Schedules pickups and earns eco-points.
    Resident,
    /// Fulfils pickups and records collected weight.
    Collector,
    /// Read/aggregate visibility plus zone assignments.
    Admin,
}

impl Role {
    /// All roles, in registration-form order.
    pub const ALL: [Role; 3] = [Role::Resident, Role::Collector, Role::Admin];

    /// Stable slug used for storage and configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Resident => "resident",
            Role::Collector => "collector",
            Role::Admin => "admin",
        }
    }

    /// Parse a stored slug back into a role.
    #[must_use]
    pub fn parse(slug: &str) -> Option<Role> {
        match slug {
            "resident" => Some(Role::Resident),
            "collector" => Some(Role::Collector),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Label of a residential / duty zone, e.g. `"Zone A"`.
pub struct Zone(pub String);

impl fmt::Display for Zone {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Categories of waste a resident can book a pickup for.
pub enum WasteType {
    /// Household recyclables (paper, plastics, glass).
    Recyclable,
    /// Electronic waste.
    EWaste,
    /// Bulk items such as furniture.
    BulkItem,
    /// Garden and green waste.
    GardenWaste,
    /// Anything the closed set does not cover.
    Other(String),
}

impl WasteType {
    /// The built-in categories offered on the booking form.
    pub const BUILT_IN: [WasteType; 4] = [
        WasteType::Recyclable,
        WasteType::EWaste,
        WasteType::BulkItem,
        WasteType::GardenWaste,
    ];

    /// Stable slug used for storage and the points rate table.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            WasteType::Recyclable => "recyclable",
            WasteType::EWaste => "e_waste",
            WasteType::BulkItem => "bulk_item",
            WasteType::GardenWaste => "garden_waste",
            WasteType::Other(name) => name.as_str(),
        }
    }

    /// Map a stored slug back to a category; unknown slugs become [`WasteType::Other`].
    #[must_use]
    pub fn parse(slug: &str) -> WasteType {
        match slug {
            "recyclable" => WasteType::Recyclable,
            "e_waste" => WasteType::EWaste,
            "bulk_item" => WasteType::BulkItem,
            "garden_waste" => WasteType::GardenWaste,
            other => WasteType::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for WasteType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Lifecycle state of a booking.
pub enum BookingStatus {
    /// Created by a resident, waiting for a collector.
    Pending,
    /// Taken onto a collector's manifest.
    Assigned,
    /// Collected; weight recorded and points awarded. Terminal.
    Completed,
    /// Withdrawn before completion. Terminal.
    Cancelled,
}

impl BookingStatus {
    /// Stable slug used for storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Assigned => "assigned",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a stored slug back into a status.
    #[must_use]
    pub fn parse(slug: &str) -> Option<BookingStatus> {
        match slug {
            "pending" => Some(BookingStatus::Pending),
            "assigned" => Some(BookingStatus::Assigned),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether no further transitions are allowed out of this state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// The full transition table: pending → assigned → completed, and
    /// pending/assigned → cancelled. Everything else is rejected.
    #[must_use]
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Assigned)
                | (BookingStatus::Assigned, BookingStatus::Completed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Assigned, BookingStatus::Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
/// A registered account.
///
/// `password_hash` is an argon2id PHC string and must never be rendered or
/// logged; the struct is deliberately not `Serialize`.
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Login name, stored lowercase, unique.
    pub username: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    /// Fixed account role.
    pub role: Role,
    /// Home address; required for residents, absent for staff.
    pub address: Option<String>,
    /// Resident's home zone, or a collector's assigned duty zone.
    pub zone: Option<Zone>,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
/// A scheduled waste pickup request.
pub struct Booking {
    /// Unique identifier.
    pub id: BookingId,
    /// The resident who booked the pickup.
    pub resident: UserId,
    /// Requested collection day.
    pub scheduled_date: NaiveDate,
    /// What is being collected.
    pub waste_type: WasteType,
    /// Current lifecycle state.
    pub status: BookingStatus,
    /// Zone copied from the resident at booking time, used for dispatch.
    pub zone: Option<Zone>,
    /// Free-form instructions for the collector (gate codes etc.).
    pub notes: Option<String>,
    /// Problem reported by a collector, if any.
    pub issue: Option<String>,
    /// Collected weight, recorded on completion.
    pub weight_kg: Option<f64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
/// One append-only movement on a resident's eco-points account.
///
/// Entries are never mutated or deleted; the displayed balance is always the
/// sum of a resident's deltas.
pub struct LedgerEntry {
    /// Unique identifier.
    pub id: LedgerEntryId,
    /// Account the entry belongs to.
    pub resident: UserId,
    /// Signed movement: positive for completed pickups, negative for redemptions.
    pub points_delta: i64,
    /// Human-readable cause, e.g. `"Completed pickup #4 (recyclable, 3.5 kg)"`.
    pub reason: String,
    /// Booking that caused the entry, when there is one.
    pub booking: Option<BookingId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// An item in the rewards catalog a resident can spend points on.
pub struct Reward {
    /// Unique identifier.
    pub id: RewardId,
    /// Display name.
    pub name: String,
    /// Price in eco-points.
    pub cost: i64,
}

#[derive(Debug, Clone)]
/// One row of the resident leaderboard.
pub struct LeaderboardEntry {
    /// The resident's login name.
    pub username: String,
    /// Derived points balance.
    pub points: i64,
}

#[derive(Debug, Clone, Default)]
/// Aggregate activity numbers for the admin overview.
pub struct SystemOverview {
    /// Registered accounts, all roles.
    pub total_users: u64,
    /// Bookings currently waiting for a collector.
    pub pending_bookings: u64,
    /// Sum of recorded weights over completed bookings.
    pub completed_weight_kg: f64,
    /// Booking counts per waste type slug, largest first.
    pub bookings_by_waste_type: Vec<(String, u64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_accepts_only_the_documented_edges() {
        use BookingStatus::{Assigned, Cancelled, Completed, Pending};

        let allowed = [
            (Pending, Assigned),
            (Assigned, Completed),
            (Pending, Cancelled),
            (Assigned, Cancelled),
        ];

        for from in [Pending, Assigned, Completed, Cancelled] {
            for to in [Pending, Assigned, Completed, Cancelled] {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "{from} -> {to} should be {expected}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for terminal in [BookingStatus::Completed, BookingStatus::Cancelled] {
            assert!(terminal.is_terminal(), "{terminal} must be terminal");
            for to in [
                BookingStatus::Pending,
                BookingStatus::Assigned,
                BookingStatus::Completed,
                BookingStatus::Cancelled,
            ] {
                assert!(
                    !terminal.can_transition_to(to),
                    "{terminal} -> {to} must be rejected"
                );
            }
        }
    }

    #[test]
    fn slugs_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        for status in [
            BookingStatus::Pending,
            BookingStatus::Assigned,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(WasteType::parse("e_waste"), WasteType::EWaste);
        assert_eq!(
            WasteType::parse("tyres"),
            WasteType::Other("tyres".to_owned())
        );
    }
}
