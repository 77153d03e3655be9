//! In-memory storage backend for EcoSort.
//!
//! Implements the same port semantics as the SQLite backend — unique
//! usernames, compare-and-swap status updates, an append-only ledger — on
//! mutex-guarded tables. Used by tests and as the `memory` backend choice in
//! configuration; nothing survives process exit.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use ecosort_core::{
    backend::{BackendMeta, StorageBackend},
    model::{
        Booking, BookingId, BookingStatus, LedgerEntry, LedgerEntryId, Reward, RewardId, User,
        UserId, Zone,
    },
    ports::{
        BookingStore, IdentityStore, LedgerStore, NewBooking, NewLedgerEntry, NewUser,
        RewardStore, StoreError,
    },
};

/// Rewards seeded into a fresh backend, matching the SQLite defaults.
const DEFAULT_REWARDS: [(&str, i64); 5] = [
    ("Metal Straw Set", 100),
    ("GrabFood RM5 Discount", 250),
    ("Tesco RM10 Voucher", 500),
    ("EcoSort T-Shirt", 1000),
    ("Netflix 1-Month Sub", 1500),
];

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    bookings: Vec<Booking>,
    ledger: Vec<LedgerEntry>,
    rewards: Vec<Reward>,
    next_user: i64,
    next_booking: i64,
    next_entry: i64,
}

/// All four ports on one set of in-memory tables.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store with no rewards catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with the default rewards catalog.
    #[must_use]
    pub fn with_default_rewards() -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock().expect("fresh mutex");
            for (index, (name, cost)) in DEFAULT_REWARDS.iter().enumerate() {
                inner.rewards.push(Reward {
                    id: RewardId(index as i64 + 1),
                    name: (*name).to_owned(),
                    cost: *cost,
                });
            }
        }
        store
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Internal("Store mutex poisoned".into()))
    }
}

/// Build the full port bundle on a fresh, seeded in-memory store.
#[must_use]
pub fn backend() -> StorageBackend {
    let store = Arc::new(MemoryStore::with_default_rewards());
    StorageBackend {
        meta: BackendMeta {
            id: "memory".to_owned(),
            name: "In-memory store".to_owned(),
        },
        identity: Arc::clone(&store) as Arc<dyn IdentityStore>,
        bookings: Arc::clone(&store) as Arc<dyn BookingStore>,
        ledger: Arc::clone(&store) as Arc<dyn LedgerStore>,
        rewards: store,
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.lock()?;
        if inner
            .users
            .iter()
            .any(|user| user.username == new_user.username)
        {
            return Err(StoreError::DuplicateUser);
        }
        inner.next_user += 1;
        let user = User {
            id: UserId(inner.next_user),
            username: new_user.username,
            password_hash: new_user.password_hash,
            role: new_user.role,
            address: new_user.address,
            zone: new_user.zone,
            created_at: Utc::now(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.users.iter().find(|user| user.id == id).cloned())
    }

    async fn all_users(&self) -> Result<Vec<User>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.users.clone())
    }

    async fn set_assigned_zone(&self, user: UserId, zone: Zone) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let user = inner
            .users
            .iter_mut()
            .find(|candidate| candidate.id == user)
            .ok_or(StoreError::UserNotFound)?;
        user.zone = Some(zone);
        Ok(())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert_booking(&self, new_booking: NewBooking) -> Result<Booking, StoreError> {
        let mut inner = self.lock()?;
        if !inner
            .users
            .iter()
            .any(|user| user.id == new_booking.resident)
        {
            return Err(StoreError::UserNotFound);
        }
        inner.next_booking += 1;
        let booking = Booking {
            id: BookingId(inner.next_booking),
            resident: new_booking.resident,
            scheduled_date: new_booking.scheduled_date,
            waste_type: new_booking.waste_type,
            status: BookingStatus::Pending,
            zone: new_booking.zone,
            notes: new_booking.notes,
            issue: None,
            weight_kg: None,
            created_at: Utc::now(),
        };
        inner.bookings.push(booking.clone());
        Ok(booking)
    }

    async fn booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .bookings
            .iter()
            .find(|booking| booking.id == id)
            .cloned())
    }

    async fn bookings_for_resident(&self, resident: UserId) -> Result<Vec<Booking>, StoreError> {
        let inner = self.lock()?;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .iter()
            .filter(|booking| booking.resident == resident)
            .cloned()
            .collect();
        bookings.reverse();
        Ok(bookings)
    }

    async fn bookings_with_status(
        &self,
        status: BookingStatus,
        zone: Option<&Zone>,
    ) -> Result<Vec<Booking>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .bookings
            .iter()
            .filter(|booking| booking.status == status)
            .filter(|booking| zone.is_none() || booking.zone.as_ref() == zone)
            .cloned()
            .collect())
    }

    async fn all_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        let inner = self.lock()?;
        let mut bookings = inner.bookings.clone();
        bookings.reverse();
        Ok(bookings)
    }

    async fn update_status(
        &self,
        id: BookingId,
        expected: BookingStatus,
        next: BookingStatus,
        weight_kg: Option<f64>,
    ) -> Result<Booking, StoreError> {
        let mut inner = self.lock()?;
        let booking = inner
            .bookings
            .iter_mut()
            .find(|booking| booking.id == id)
            .ok_or(StoreError::BookingNotFound)?;
        // Same compare-and-swap contract as the SQL backend.
        if booking.status != expected {
            return Err(StoreError::Conflict);
        }
        booking.status = next;
        if weight_kg.is_some() {
            booking.weight_kg = weight_kg;
        }
        Ok(booking.clone())
    }

    async fn record_issue(&self, id: BookingId, note: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let booking = inner
            .bookings
            .iter_mut()
            .find(|booking| booking.id == id)
            .ok_or(StoreError::BookingNotFound)?;
        booking.issue = Some(note.to_owned());
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let mut inner = self.lock()?;
        inner.next_entry += 1;
        let entry = LedgerEntry {
            id: LedgerEntryId(inner.next_entry),
            resident: entry.resident,
            points_delta: entry.points_delta,
            reason: entry.reason,
            booking: entry.booking,
            created_at: Utc::now(),
        };
        inner.ledger.push(entry.clone());
        Ok(entry)
    }

    async fn entries_for(&self, resident: UserId) -> Result<Vec<LedgerEntry>, StoreError> {
        let inner = self.lock()?;
        let mut entries: Vec<LedgerEntry> = inner
            .ledger
            .iter()
            .filter(|entry| entry.resident == resident)
            .cloned()
            .collect();
        entries.reverse();
        Ok(entries)
    }

    async fn balance(&self, resident: UserId) -> Result<i64, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .ledger
            .iter()
            .filter(|entry| entry.resident == resident)
            .map(|entry| entry.points_delta)
            .sum())
    }

    async fn totals_by_resident(&self) -> Result<Vec<(UserId, i64)>, StoreError> {
        let inner = self.lock()?;
        let mut totals: Vec<(UserId, i64)> = Vec::new();
        for entry in &inner.ledger {
            match totals.iter_mut().find(|(id, _)| *id == entry.resident) {
                Some((_, total)) => *total += entry.points_delta,
                None => totals.push((entry.resident, entry.points_delta)),
            }
        }
        totals.sort_by(|left, right| right.1.cmp(&left.1));
        Ok(totals)
    }
}

#[async_trait]
impl RewardStore for MemoryStore {
    async fn all(&self) -> Result<Vec<Reward>, StoreError> {
        let inner = self.lock()?;
        let mut rewards = inner.rewards.clone();
        rewards.sort_by_key(|reward| reward.cost);
        Ok(rewards)
    }

    async fn reward(&self, id: RewardId) -> Result<Option<Reward>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.rewards.iter().find(|reward| reward.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use ecosort_core::{
        AssignedCancelPolicy, BookingStatus, EcoSortService, Role, ServicePolicy, StoreError,
        User, WasteType, Zone,
    };

    use super::backend;

    fn service() -> EcoSortService {
        EcoSortService::new(Arc::new(backend()), ServicePolicy::default())
    }

    fn service_with_cancel_policy(cancel_assigned: AssignedCancelPolicy) -> EcoSortService {
        let policy = ServicePolicy {
            cancel_assigned,
            ..ServicePolicy::default()
        };
        EcoSortService::new(Arc::new(backend()), policy)
    }

    fn pickup_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
    }

    async fn register_resident(service: &EcoSortService, name: &str) -> User {
        service
            .register(
                name,
                "secret",
                Role::Resident,
                Some("12 Jalan Teknokrat 3".to_owned()),
                Some(Zone("Zone A".to_owned())),
            )
            .await
            .expect("register resident")
    }

    async fn register_collector(service: &EcoSortService, name: &str) -> User {
        service
            .register(name, "secret", Role::Collector, None, None)
            .await
            .expect("register collector")
    }

    #[tokio::test]
    async fn duplicate_registration_fails_the_second_time() {
        let service = service();
        register_resident(&service, "alice").await;
        let err = service
            .register(
                "Alice",
                "other",
                Role::Resident,
                Some("somewhere else".to_owned()),
                None,
            )
            .await
            .expect_err("same username (case-insensitive) must fail");
        assert!(matches!(err, StoreError::DuplicateUser));
    }

    #[tokio::test]
    async fn authentication_checks_the_password_and_returns_the_role() {
        let service = service();
        register_collector(&service, "fathul").await;

        let err = service
            .authenticate("fathul", "wrong")
            .await
            .expect_err("wrong password must fail");
        assert!(matches!(err, StoreError::InvalidCredentials));

        let err = service
            .authenticate("nobody", "secret")
            .await
            .expect_err("unknown user must fail");
        assert!(matches!(err, StoreError::InvalidCredentials));

        let user = service
            .authenticate("fathul", "secret")
            .await
            .expect("correct credentials");
        assert_eq!(user.role, Role::Collector);
    }

    #[tokio::test]
    async fn residents_must_register_with_an_address() {
        let service = service();
        let err = service
            .register("alice", "secret", Role::Resident, None, None)
            .await
            .expect_err("resident without address must fail");
        assert!(matches!(err, StoreError::AddressRequired));
    }

    #[tokio::test]
    async fn completed_pickup_awards_exactly_one_positive_entry() {
        let service = service();
        let alice = register_resident(&service, "alice").await;
        let collector = register_collector(&service, "fathul").await;

        let booking = service
            .book_pickup(&alice, pickup_date(), WasteType::Recyclable, None)
            .await
            .expect("book");
        assert_eq!(booking.status, BookingStatus::Pending);

        let assigned = service
            .assign(&collector, booking.id)
            .await
            .expect("assign");
        assert_eq!(assigned.status, BookingStatus::Assigned);

        let (completed, entry) = service
            .complete(&collector, booking.id, 3.5)
            .await
            .expect("complete");
        assert_eq!(completed.status, BookingStatus::Completed);
        assert_eq!(completed.weight_kg, Some(3.5));
        assert!(entry.points_delta > 0, "award must be positive");

        let entries = service.ledger(alice.id).await.expect("ledger");
        assert_eq!(entries.len(), 1, "exactly one entry per completion");
        assert_eq!(entries[0].booking, Some(booking.id));
        assert_eq!(
            service.balance(alice.id).await.expect("balance"),
            entry.points_delta
        );
    }

    #[tokio::test]
    async fn cancelling_a_pending_booking_leaves_no_ledger_entry() {
        let service = service();
        let alice = register_resident(&service, "alice").await;

        let booking = service
            .book_pickup(&alice, pickup_date(), WasteType::GardenWaste, None)
            .await
            .expect("book");
        let cancelled = service.cancel(&alice, booking.id).await.expect("cancel");
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        assert!(service.ledger(alice.id).await.expect("ledger").is_empty());
        assert_eq!(service.balance(alice.id).await.expect("balance"), 0);
    }

    #[tokio::test]
    async fn transitions_outside_the_table_are_rejected() {
        let service = service();
        let alice = register_resident(&service, "alice").await;
        let collector = register_collector(&service, "fathul").await;

        let booking = service
            .book_pickup(&alice, pickup_date(), WasteType::EWaste, None)
            .await
            .expect("book");

        // pending -> completed skips assignment.
        let err = service
            .complete(&collector, booking.id, 2.0)
            .await
            .expect_err("completing a pending booking must fail");
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: BookingStatus::Pending,
                to: BookingStatus::Completed,
            }
        ));

        service.assign(&collector, booking.id).await.expect("assign");

        // assigning twice is not an edge either.
        let err = service
            .assign(&collector, booking.id)
            .await
            .expect_err("double assign must fail");
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        service
            .complete(&collector, booking.id, 2.0)
            .await
            .expect("complete");

        // terminal states reject everything.
        let err = service
            .cancel(&alice, booking.id)
            .await
            .expect_err("cancelling a completed booking must fail");
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn strangers_cannot_cancel_someone_elses_booking() {
        let service = service();
        let alice = register_resident(&service, "alice").await;
        let mallory = register_resident(&service, "mallory").await;

        let booking = service
            .book_pickup(&alice, pickup_date(), WasteType::Recyclable, None)
            .await
            .expect("book");
        let err = service
            .cancel(&mallory, booking.id)
            .await
            .expect_err("other residents must not cancel");
        assert!(matches!(err, StoreError::NotPermitted(Role::Resident)));
    }

    #[tokio::test]
    async fn assigned_cancellation_follows_the_configured_policy() {
        let service = service_with_cancel_policy(AssignedCancelPolicy::Collector);
        let alice = register_resident(&service, "alice").await;
        let collector = register_collector(&service, "fathul").await;

        let booking = service
            .book_pickup(&alice, pickup_date(), WasteType::BulkItem, None)
            .await
            .expect("book");
        service.assign(&collector, booking.id).await.expect("assign");

        let err = service
            .cancel(&alice, booking.id)
            .await
            .expect_err("resident is outside the collector-only policy");
        assert!(matches!(err, StoreError::NotPermitted(Role::Resident)));

        let cancelled = service
            .cancel(&collector, booking.id)
            .await
            .expect("collector may cancel");
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn redemption_spends_points_through_the_ledger() {
        let service = service();
        let alice = register_resident(&service, "alice").await;
        let collector = register_collector(&service, "fathul").await;

        let rewards = service.rewards().await.expect("rewards");
        let cheapest = rewards.first().expect("seeded catalog").clone();

        let err = service
            .redeem(&alice, cheapest.id)
            .await
            .expect_err("zero balance cannot redeem");
        assert!(matches!(err, StoreError::InsufficientPoints));

        // 15 kg of recyclables at the default 10 points/kg covers the 100-point item.
        let booking = service
            .book_pickup(&alice, pickup_date(), WasteType::Recyclable, None)
            .await
            .expect("book");
        service.assign(&collector, booking.id).await.expect("assign");
        service
            .complete(&collector, booking.id, 15.0)
            .await
            .expect("complete");

        let (code, entry) = service.redeem(&alice, cheapest.id).await.expect("redeem");
        assert!(code.starts_with("ECO-"), "voucher code format");
        assert_eq!(entry.points_delta, -cheapest.cost);
        assert_eq!(
            service.balance(alice.id).await.expect("balance"),
            150 - cheapest.cost
        );
    }

    #[tokio::test]
    async fn issues_can_only_be_reported_on_open_bookings() {
        let service = service();
        let alice = register_resident(&service, "alice").await;
        let collector = register_collector(&service, "fathul").await;

        let booking = service
            .book_pickup(&alice, pickup_date(), WasteType::Recyclable, None)
            .await
            .expect("book");
        service
            .report_issue(&collector, booking.id, "Access blocked")
            .await
            .expect("report on pending booking");

        let history = service.history(&alice).await.expect("history");
        assert_eq!(history[0].issue.as_deref(), Some("Access blocked"));

        service.cancel(&alice, booking.id).await.expect("cancel");
        let err = service
            .report_issue(&collector, booking.id, "Too late")
            .await
            .expect_err("terminal bookings are closed");
        assert!(matches!(
            err,
            StoreError::BookingClosed(BookingStatus::Cancelled)
        ));
    }

    #[tokio::test]
    async fn leaderboard_ranks_residents_by_derived_balance() {
        let service = service();
        let alice = register_resident(&service, "alice").await;
        let bob = register_resident(&service, "bob").await;
        let collector = register_collector(&service, "fathul").await;

        for (resident, weight) in [(&alice, 2.0), (&bob, 9.0), (&alice, 3.0)] {
            let booking = service
                .book_pickup(resident, pickup_date(), WasteType::Recyclable, None)
                .await
                .expect("book");
            service.assign(&collector, booking.id).await.expect("assign");
            service
                .complete(&collector, booking.id, weight)
                .await
                .expect("complete");
        }

        let top = service.leaderboard(10).await.expect("leaderboard");
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].username, "bob");
        assert_eq!(top[0].points, 90);
        assert_eq!(top[1].username, "alice");
        assert_eq!(top[1].points, 50);
    }

    #[tokio::test]
    async fn only_admins_see_the_overview() {
        let service = service();
        let alice = register_resident(&service, "alice").await;
        let admin = service
            .register("afiq", "secret", Role::Admin, None, None)
            .await
            .expect("register admin");

        let err = service
            .overview(&alice)
            .await
            .expect_err("residents cannot read the overview");
        assert!(matches!(err, StoreError::NotPermitted(Role::Resident)));

        service
            .book_pickup(&alice, pickup_date(), WasteType::Recyclable, None)
            .await
            .expect("book");
        let overview = service.overview(&admin).await.expect("overview");
        assert_eq!(overview.total_users, 2);
        assert_eq!(overview.pending_bookings, 1);
        assert_eq!(
            overview.bookings_by_waste_type,
            vec![("recyclable".to_owned(), 1)]
        );
    }

    #[tokio::test]
    async fn admins_reassign_collector_zones() {
        let service = service();
        let admin = service
            .register("afiq", "secret", Role::Admin, None, None)
            .await
            .expect("register admin");
        let collector = register_collector(&service, "fathul").await;
        let alice = register_resident(&service, "alice").await;

        service
            .assign_zone(&admin, collector.id, Zone("Zone B".to_owned()))
            .await
            .expect("assign zone");
        let users = service.users(&admin).await.expect("users");
        let fathul = users
            .iter()
            .find(|user| user.username == "fathul")
            .expect("collector present");
        assert_eq!(fathul.zone, Some(Zone("Zone B".to_owned())));

        let err = service
            .assign_zone(&admin, alice.id, Zone("Zone C".to_owned()))
            .await
            .expect_err("residents are not on the duty roster");
        assert!(matches!(err, StoreError::NotPermitted(Role::Resident)));
    }
}
