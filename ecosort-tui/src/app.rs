use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate};
use ecosort_core::{
    model::{Booking, LeaderboardEntry, Reward, Role, SystemOverview, User, WasteType, Zone},
    service::EcoSortService,
};

/// Zones offered on the registration form and the admin roster.
pub(crate) const ZONES: [&str; 4] = ["Zone A", "Zone B", "Zone C", "Zone D"];

/// Canned issue note, matching what drivers reported in the field.
pub(crate) const ISSUE_NOTE: &str = "Access blocked / contaminated load";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Login,
    Register,
    Resident,
    Collector,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResidentTab {
    Book,
    History,
    Shop,
    Leaderboard,
}

impl ResidentTab {
    pub(crate) fn next(self) -> Self {
        match self {
            ResidentTab::Book => ResidentTab::History,
            ResidentTab::History => ResidentTab::Shop,
            ResidentTab::Shop => ResidentTab::Leaderboard,
            ResidentTab::Leaderboard => ResidentTab::Book,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AdminTab {
    Overview,
    Users,
    Zones,
}

impl AdminTab {
    pub(crate) fn next(self) -> Self {
        match self {
            AdminTab::Overview => AdminTab::Users,
            AdminTab::Users => AdminTab::Zones,
            AdminTab::Zones => AdminTab::Overview,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginField {
    Username,
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegisterField {
    Username,
    Password,
    Role,
    Address,
    Zone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BookField {
    Date,
    WasteType,
    Notes,
}

pub(crate) struct App {
    pub service: Arc<EcoSortService>,

    pub screen: Screen,
    pub session: Option<User>,

    // Login form
    pub login_username: String,
    pub login_password: String,
    pub login_field: LoginField,

    // Registration form
    pub reg_username: String,
    pub reg_password: String,
    pub reg_role_index: usize,
    pub reg_address: String,
    pub reg_zone_index: usize,
    pub reg_field: RegisterField,

    // Resident dashboard
    pub resident_tab: ResidentTab,
    pub book_date: String,
    pub book_waste_index: usize,
    pub book_notes: String,
    pub book_field: BookField,
    pub history: Vec<Booking>,
    pub history_index: usize,
    pub balance: i64,
    pub rewards: Vec<Reward>,
    pub reward_index: usize,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub voucher: Option<String>,

    // Collector dashboard
    pub jobs: Vec<Booking>,
    pub job_index: usize,
    pub weight_input: String,
    pub zone_filter_on: bool,

    // Admin dashboard
    pub admin_tab: AdminTab,
    pub overview: SystemOverview,
    pub users: Vec<User>,
    pub user_index: usize,
    pub zone_choice_index: usize,

    pub is_loading: bool,
    pub error_message: Option<String>,
    pub info_message: Option<String>,
}

impl App {
    pub(crate) fn new(service: Arc<EcoSortService>) -> Self {
        Self {
            service,
            screen: Screen::Login,
            session: None,
            login_username: String::new(),
            login_password: String::new(),
            login_field: LoginField::Username,
            reg_username: String::new(),
            reg_password: String::new(),
            reg_role_index: 0,
            reg_address: String::new(),
            reg_zone_index: 0,
            reg_field: RegisterField::Username,
            resident_tab: ResidentTab::Book,
            book_date: default_book_date(),
            book_waste_index: 0,
            book_notes: String::new(),
            book_field: BookField::Date,
            history: Vec::new(),
            history_index: 0,
            balance: 0,
            rewards: Vec::new(),
            reward_index: 0,
            leaderboard: Vec::new(),
            voucher: None,
            jobs: Vec::new(),
            job_index: 0,
            weight_input: String::new(),
            zone_filter_on: true,
            admin_tab: AdminTab::Overview,
            overview: SystemOverview::default(),
            users: Vec::new(),
            user_index: 0,
            zone_choice_index: 0,
            is_loading: false,
            error_message: None,
            info_message: None,
        }
    }

    /// Clear everything tied to the previous session and show the login form.
    pub(crate) fn logout(&mut self) {
        let service = Arc::clone(&self.service);
        *self = Self::new(service);
    }

    /// The waste type currently selected on the booking form.
    pub(crate) fn selected_waste_type(&self) -> WasteType {
        WasteType::BUILT_IN
            .get(self.book_waste_index)
            .cloned()
            .unwrap_or(WasteType::Recyclable)
    }

    /// Parse the booking form's date input.
    pub(crate) fn parse_book_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.book_date.trim(), "%Y-%m-%d").ok()
    }

    pub(crate) fn selected_history_booking(&self) -> Option<&Booking> {
        self.history.get(self.history_index)
    }

    pub(crate) fn selected_reward(&self) -> Option<&Reward> {
        self.rewards.get(self.reward_index)
    }

    pub(crate) fn selected_job(&self) -> Option<&Booking> {
        self.jobs.get(self.job_index)
    }

    /// Collectors listed on the admin zone roster.
    pub(crate) fn roster(&self) -> Vec<&User> {
        self.users
            .iter()
            .filter(|user| user.role == Role::Collector)
            .collect()
    }

    pub(crate) fn selected_collector(&self) -> Option<&User> {
        self.roster().get(self.user_index).copied()
    }

    /// Zone the collector manifest is filtered to, when the filter is on.
    pub(crate) fn manifest_zone(&self) -> Option<Zone> {
        if !self.zone_filter_on {
            return None;
        }
        self.session.as_ref().and_then(|user| user.zone.clone())
    }

    pub(crate) fn selected_zone_choice(&self) -> Zone {
        Zone(ZONES[self.zone_choice_index % ZONES.len()].to_owned())
    }

    pub(crate) fn clear_messages(&mut self) {
        self.error_message = None;
        self.info_message = None;
    }
}

/// Booking forms default to tomorrow, like the original date picker.
fn default_book_date() -> String {
    (Local::now().date_naive() + Duration::days(1))
        .format("%Y-%m-%d")
        .to_string()
}
