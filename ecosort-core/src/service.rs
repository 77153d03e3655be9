//! High-level service facade combining identity, bookings, and the ledger.

use std::sync::Arc;

use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use chrono::NaiveDate;
use rand::Rng;

use crate::backend::{BackendMeta, StorageBackend};
use crate::model::{
    Booking, BookingId, BookingStatus, LeaderboardEntry, LedgerEntry, Reward, RewardId, Role,
    SystemOverview, User, UserId, WasteType, Zone,
};
use crate::policy::ServicePolicy;
use crate::ports::{NewBooking, NewLedgerEntry, NewUser, StoreError};

/// Public entry point for everything the role dashboards need.
pub struct EcoSortService {
    backend: Arc<StorageBackend>,
    policy: ServicePolicy,
}

impl EcoSortService {
    /// Create a new service bound to the provided backend and policy.
    #[must_use]
    pub fn new(backend: Arc<StorageBackend>, policy: ServicePolicy) -> Self {
        Self { backend, policy }
    }

    /// Metadata of the storage backend in use.
    #[must_use]
    pub fn backend_meta(&self) -> &BackendMeta {
        &self.backend.meta
    }

    // ----- identity & access -------------------------------------------------

    /// Register a new account. Usernames are trimmed and lowercased before
    /// storage; residents must supply an address.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyCredentials`] for blank inputs,
    /// [`StoreError::AddressRequired`] for residents without an address,
    /// [`StoreError::DuplicateUser`] when the username is taken, or a
    /// [`StoreError`] when the backend fails.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: Role,
        address: Option<String>,
        zone: Option<Zone>,
    ) -> Result<User, StoreError> {
        let username = username.trim().to_lowercase();
        if username.is_empty() || password.is_empty() {
            return Err(StoreError::EmptyCredentials);
        }

        let address = address.map(|addr| addr.trim().to_owned()).filter(|addr| !addr.is_empty());
        if role == Role::Resident && address.is_none() {
            return Err(StoreError::AddressRequired);
        }

        let password_hash = hash_password(password)?;
        self.backend
            .identity
            .insert_user(NewUser {
                username,
                password_hash,
                role,
                address,
                zone,
            })
            .await
    }

    /// Verify credentials and return the matching account.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCredentials`] for unknown users and wrong
    /// passwords alike, or a [`StoreError`] when the backend fails.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, StoreError> {
        let username = username.trim().to_lowercase();
        let Some(user) = self.backend.identity.user_by_username(&username).await? else {
            return Err(StoreError::InvalidCredentials);
        };
        if verify_password(password, &user.password_hash)? {
            Ok(user)
        } else {
            Err(StoreError::InvalidCredentials)
        }
    }

    // ----- booking lifecycle -------------------------------------------------

    /// Create a new pending pickup request for the acting resident.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotPermitted`] for non-residents, or a
    /// [`StoreError`] when the backend fails.
    pub async fn book_pickup(
        &self,
        resident: &User,
        scheduled_date: NaiveDate,
        waste_type: WasteType,
        notes: Option<String>,
    ) -> Result<Booking, StoreError> {
        require_role(resident, Role::Resident)?;
        self.backend
            .bookings
            .insert_booking(NewBooking {
                resident: resident.id,
                scheduled_date,
                waste_type,
                zone: resident.zone.clone(),
                notes: notes.filter(|note| !note.trim().is_empty()),
            })
            .await
    }

    /// Pending and assigned bookings, optionally restricted to one zone —
    /// the collector's manifest.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    pub async fn open_jobs(&self, zone: Option<&Zone>) -> Result<Vec<Booking>, StoreError> {
        let mut jobs = self
            .backend
            .bookings
            .bookings_with_status(BookingStatus::Pending, zone)
            .await?;
        jobs.extend(
            self.backend
                .bookings
                .bookings_with_status(BookingStatus::Assigned, zone)
                .await?,
        );
        jobs.sort_by_key(|job| job.id.0);
        Ok(jobs)
    }

    /// Take a pending booking onto the collector's manifest.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotPermitted`] for non-collectors,
    /// [`StoreError::InvalidTransition`] when the booking is not pending, or
    /// [`StoreError::Conflict`] when another collector won the race.
    pub async fn assign(&self, collector: &User, id: BookingId) -> Result<Booking, StoreError> {
        require_role(collector, Role::Collector)?;
        self.transition(id, BookingStatus::Assigned, None).await
    }

    /// Complete an assigned booking: record the collected weight and award
    /// eco-points to the booking resident.
    ///
    /// The status CAS guarantees at most one award per booking even when two
    /// collectors submit concurrently; the loser sees [`StoreError::Conflict`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotPermitted`] for non-collectors,
    /// [`StoreError::InvalidWeight`] for non-positive weights,
    /// [`StoreError::InvalidTransition`] when the booking is not assigned, or
    /// a [`StoreError`] when the backend fails.
    pub async fn complete(
        &self,
        collector: &User,
        id: BookingId,
        weight_kg: f64,
    ) -> Result<(Booking, LedgerEntry), StoreError> {
        require_role(collector, Role::Collector)?;
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(StoreError::InvalidWeight);
        }

        let booking = self
            .transition(id, BookingStatus::Completed, Some(weight_kg))
            .await?;

        let points = self.policy.points.points_for(&booking.waste_type, weight_kg);
        let entry = self
            .backend
            .ledger
            .append(NewLedgerEntry {
                resident: booking.resident,
                points_delta: points,
                reason: format!(
                    "Completed pickup {} ({}, {weight_kg} kg)",
                    booking.id, booking.waste_type
                ),
                booking: Some(booking.id),
            })
            .await?;

        Ok((booking, entry))
    }

    /// Cancel a booking. Pending bookings may be cancelled by the owning
    /// resident; assigned bookings follow the configured cancel policy.
    /// Admins may cancel any non-terminal booking. Never touches the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotPermitted`] when the actor is not covered,
    /// [`StoreError::InvalidTransition`] for terminal bookings, or
    /// [`StoreError::Conflict`] on a concurrent edit.
    pub async fn cancel(&self, actor: &User, id: BookingId) -> Result<Booking, StoreError> {
        let booking = self
            .backend
            .bookings
            .booking(id)
            .await?
            .ok_or(StoreError::BookingNotFound)?;

        let permitted = match (actor.role, booking.status) {
            (Role::Admin, _) => true,
            (Role::Resident, BookingStatus::Pending) => booking.resident == actor.id,
            (Role::Resident, BookingStatus::Assigned) => {
                booking.resident == actor.id && self.policy.cancel_assigned.allows(Role::Resident)
            }
            (Role::Collector, BookingStatus::Assigned) => {
                self.policy.cancel_assigned.allows(Role::Collector)
            }
            _ => false,
        };

        if !booking.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(StoreError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Cancelled,
            });
        }
        if !permitted {
            return Err(StoreError::NotPermitted(actor.role));
        }

        self.backend
            .bookings
            .update_status(id, booking.status, BookingStatus::Cancelled, None)
            .await
    }

    /// Attach a problem note ("access blocked", "contaminated load", …) to a
    /// booking that is still open. The status is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotPermitted`] for non-collectors,
    /// [`StoreError::BookingClosed`] for terminal bookings, or a
    /// [`StoreError`] when the backend fails.
    pub async fn report_issue(
        &self,
        collector: &User,
        id: BookingId,
        note: &str,
    ) -> Result<(), StoreError> {
        require_role(collector, Role::Collector)?;
        let booking = self
            .backend
            .bookings
            .booking(id)
            .await?
            .ok_or(StoreError::BookingNotFound)?;
        if booking.status.is_terminal() {
            return Err(StoreError::BookingClosed(booking.status));
        }
        self.backend.bookings.record_issue(id, note).await
    }

    /// The acting resident's booking history, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotPermitted`] for non-residents, or a
    /// [`StoreError`] when the backend fails.
    pub async fn history(&self, resident: &User) -> Result<Vec<Booking>, StoreError> {
        require_role(resident, Role::Resident)?;
        self.backend.bookings.bookings_for_resident(resident.id).await
    }

    // ----- eco-points --------------------------------------------------------

    /// Derived balance: the sum of the resident's ledger deltas.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    pub async fn balance(&self, resident: UserId) -> Result<i64, StoreError> {
        self.backend.ledger.balance(resident).await
    }

    /// A resident's ledger entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    pub async fn ledger(&self, resident: UserId) -> Result<Vec<LedgerEntry>, StoreError> {
        self.backend.ledger.entries_for(resident).await
    }

    /// The rewards catalog, cheapest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    pub async fn rewards(&self) -> Result<Vec<Reward>, StoreError> {
        self.backend.rewards.all().await
    }

    /// Spend points on a catalog item. Appends a negative ledger entry and
    /// returns the voucher code together with the entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotPermitted`] for non-residents,
    /// [`StoreError::RewardNotFound`] for an unknown item,
    /// [`StoreError::InsufficientPoints`] when the balance does not cover the
    /// cost, or a [`StoreError`] when the backend fails.
    pub async fn redeem(
        &self,
        resident: &User,
        reward_id: RewardId,
    ) -> Result<(String, LedgerEntry), StoreError> {
        require_role(resident, Role::Resident)?;
        let reward = self
            .backend
            .rewards
            .reward(reward_id)
            .await?
            .ok_or(StoreError::RewardNotFound)?;

        let balance = self.backend.ledger.balance(resident.id).await?;
        if balance < reward.cost {
            return Err(StoreError::InsufficientPoints);
        }

        let entry = self
            .backend
            .ledger
            .append(NewLedgerEntry {
                resident: resident.id,
                points_delta: -reward.cost,
                reason: format!("Redeemed {}", reward.name),
                booking: None,
            })
            .await?;

        let code: u32 = rand::thread_rng().gen_range(1000..10_000);
        Ok((format!("ECO-{code}"), entry))
    }

    /// Top residents by derived balance.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let totals = self.backend.ledger.totals_by_resident().await?;
        let mut entries = Vec::new();
        for (resident, points) in totals.into_iter().take(limit) {
            let Some(user) = self.backend.identity.user_by_id(resident).await? else {
                continue;
            };
            entries.push(LeaderboardEntry {
                username: user.username,
                points,
            });
        }
        Ok(entries)
    }

    // ----- admin -------------------------------------------------------------

    /// All registered accounts, for the admin user database view.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotPermitted`] for non-admins, or a
    /// [`StoreError`] when the backend fails.
    pub async fn users(&self, admin: &User) -> Result<Vec<User>, StoreError> {
        require_role(admin, Role::Admin)?;
        self.backend.identity.all_users().await
    }

    /// Aggregate activity numbers for the admin overview.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotPermitted`] for non-admins, or a
    /// [`StoreError`] when the backend fails.
    pub async fn overview(&self, admin: &User) -> Result<SystemOverview, StoreError> {
        require_role(admin, Role::Admin)?;

        let users = self.backend.identity.all_users().await?;
        let bookings = self.backend.bookings.all_bookings().await?;

        let mut by_type: Vec<(String, u64)> = Vec::new();
        let mut pending = 0_u64;
        let mut completed_weight = 0.0_f64;
        for booking in &bookings {
            if booking.status == BookingStatus::Pending {
                pending += 1;
            }
            if booking.status == BookingStatus::Completed {
                completed_weight += booking.weight_kg.unwrap_or(0.0);
            }
            let slug = booking.waste_type.as_str();
            match by_type.iter_mut().find(|(name, _)| name.as_str() == slug) {
                Some((_, count)) => *count += 1,
                None => by_type.push((slug.to_owned(), 1)),
            }
        }
        by_type.sort_by(|left, right| right.1.cmp(&left.1));

        Ok(SystemOverview {
            total_users: users.len() as u64,
            pending_bookings: pending,
            completed_weight_kg: completed_weight,
            bookings_by_waste_type: by_type,
        })
    }

    /// Reassign a collector to a duty zone (admin roster management).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotPermitted`] when the actor is not an admin or
    /// the target is not a collector, [`StoreError::UserNotFound`] for an
    /// unknown target, or a [`StoreError`] when the backend fails.
    pub async fn assign_zone(
        &self,
        admin: &User,
        collector: UserId,
        zone: Zone,
    ) -> Result<(), StoreError> {
        require_role(admin, Role::Admin)?;
        let target = self
            .backend
            .identity
            .user_by_id(collector)
            .await?
            .ok_or(StoreError::UserNotFound)?;
        if target.role != Role::Collector {
            return Err(StoreError::NotPermitted(target.role));
        }
        self.backend.identity.set_assigned_zone(collector, zone).await
    }

    // ----- internals ---------------------------------------------------------

    /// Read-check-CAS helper for status transitions: rejects edges outside
    /// the transition table with `InvalidTransition`, and surfaces a racing
    /// writer between the read and the update as `Conflict`.
    async fn transition(
        &self,
        id: BookingId,
        next: BookingStatus,
        weight_kg: Option<f64>,
    ) -> Result<Booking, StoreError> {
        let current = self
            .backend
            .bookings
            .booking(id)
            .await?
            .ok_or(StoreError::BookingNotFound)?;
        if !current.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }
        self.backend
            .bookings
            .update_status(id, current.status, next, weight_kg)
            .await
    }
}

fn require_role(user: &User, role: Role) -> Result<(), StoreError> {
    if user.role == role {
        Ok(())
    } else {
        Err(StoreError::NotPermitted(user.role))
    }
}

fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| StoreError::PasswordHash(err.to_string()))
}

fn verify_password(password: &str, phc: &str) -> Result<bool, StoreError> {
    let parsed =
        PasswordHash::new(phc).map_err(|err| StoreError::PasswordHash(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
