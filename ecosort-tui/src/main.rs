//! Terminal UI for EcoSort: residents book waste pickups and spend eco-points,
//! collectors work their manifest, admins watch the whole system.

mod app;
mod config;
mod input;
mod ui;

use std::{fs::OpenOptions, io, path::Path, sync::Arc, time::Duration as StdDuration};

use anyhow::{Context, Result, bail};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ecosort_core::{
    model::{Role, User, Zone},
    ports::StoreError,
    service::EcoSortService,
};

use crate::app::{App, ISSUE_NOTE, Screen, ZONES};
use crate::input::Action;

#[tokio::main]
async fn main() -> Result<()> {
    // Config + logging; the terminal itself belongs to the UI, so tracing
    // output goes to a file.
    let config = config::load().context("failed to load configuration")?;
    init_tracing(&config.log_file).context("failed to initialise logging")?;
    info!(backend = %config.storage.backend, "starting ecosort");

    // Storage + service setup
    let storage = match config.storage.backend.as_str() {
        "sqlite" => ecosort_store_sqlite::backend(&config.storage.path).await?,
        "memory" => ecosort_store_memory::backend(),
        other => bail!("Unknown storage backend '{other}' (expected 'sqlite' or 'memory')"),
    };
    let service = Arc::new(EcoSortService::new(Arc::new(storage), config.policy.clone()));
    info!(store = %service.backend_meta().name, "storage ready");

    if config.seed_demo_accounts {
        seed_demo_accounts(&service).await;
    }

    // App state
    let app = App::new(service);

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        // Draw current UI
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for input (non-blocking, small timeout to keep CPU low)
        if event::poll(StdDuration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
        {
            let action = input::handle_key_event(key, &mut app);

            match action {
                Action::Quit => break,
                Action::None => {}

                Action::SubmitLogin => {
                    app.clear_messages();
                    app.is_loading = true;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    let res = app
                        .service
                        .authenticate(&app.login_username, &app.login_password)
                        .await;

                    app.is_loading = false;
                    match res {
                        Ok(user) => enter_session(&mut app, user).await,
                        Err(err) => {
                            app.login_password.clear();
                            app.error_message = Some(format!("Login failed: {err}"));
                        }
                    }
                }

                Action::SubmitRegistration => {
                    app.clear_messages();
                    app.is_loading = true;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    let role = Role::ALL
                        .get(app.reg_role_index)
                        .copied()
                        .unwrap_or(Role::Resident);
                    let address = Some(app.reg_address.clone()).filter(|addr| !addr.is_empty());
                    // Zone is part of the resident pickup address; collectors
                    // get a duty zone from an admin later.
                    let zone = (role == Role::Resident).then(|| {
                        Zone(
                            ZONES
                                .get(app.reg_zone_index)
                                .copied()
                                .unwrap_or(ZONES[0])
                                .to_owned(),
                        )
                    });

                    let res = app
                        .service
                        .register(&app.reg_username, &app.reg_password, role, address, zone)
                        .await;

                    app.is_loading = false;
                    match res {
                        Ok(user) => {
                            app.login_username = user.username;
                            app.login_password.clear();
                            app.reg_username.clear();
                            app.reg_password.clear();
                            app.reg_address.clear();
                            app.screen = Screen::Login;
                            app.info_message = Some("Account created! Please log in.".to_owned());
                        }
                        Err(err) => {
                            app.error_message = Some(format!("Registration failed: {err}"));
                        }
                    }
                }

                Action::BookPickup => {
                    app.clear_messages();
                    let Some(resident) = app.session.clone() else {
                        continue;
                    };
                    let Some(date) = app.parse_book_date() else {
                        app.error_message =
                            Some("Pickup date must look like 2024-06-01".to_owned());
                        continue;
                    };

                    let notes = Some(app.book_notes.clone()).filter(|note| !note.is_empty());
                    let res = app
                        .service
                        .book_pickup(&resident, date, app.selected_waste_type(), notes)
                        .await;
                    match res {
                        Ok(booking) => {
                            app.book_notes.clear();
                            app.info_message =
                                Some(format!("Pickup {} booked for {date}", booking.id));
                            refresh_resident(&mut app).await;
                        }
                        Err(err) => {
                            app.error_message = Some(format!("Booking failed: {err}"));
                        }
                    }
                }

                Action::CancelSelectedBooking => {
                    app.clear_messages();
                    let Some(actor) = app.session.clone() else {
                        continue;
                    };
                    let Some(booking) = app.selected_history_booking().cloned() else {
                        continue;
                    };
                    match app.service.cancel(&actor, booking.id).await {
                        Ok(cancelled) => {
                            app.info_message = Some(format!("Booking {} cancelled", cancelled.id));
                            refresh_resident(&mut app).await;
                        }
                        Err(err) => {
                            app.error_message = Some(format!("Cancel failed: {err}"));
                        }
                    }
                }

                Action::RedeemSelectedReward => {
                    app.clear_messages();
                    let Some(resident) = app.session.clone() else {
                        continue;
                    };
                    let Some(reward) = app.selected_reward().cloned() else {
                        continue;
                    };
                    match app.service.redeem(&resident, reward.id).await {
                        Ok((code, _entry)) => {
                            app.info_message =
                                Some(format!("Redeemed {} — voucher {code}", reward.name));
                            app.voucher = Some(code);
                            refresh_resident(&mut app).await;
                        }
                        Err(err) => {
                            app.error_message = Some(format!("Redemption failed: {err}"));
                        }
                    }
                }

                Action::RefreshResident => {
                    app.clear_messages();
                    refresh_resident(&mut app).await;
                }

                Action::AssignSelectedJob => {
                    app.clear_messages();
                    let Some(collector) = app.session.clone() else {
                        continue;
                    };
                    let Some(job) = app.selected_job().cloned() else {
                        continue;
                    };
                    match app.service.assign(&collector, job.id).await {
                        Ok(assigned) => {
                            app.info_message = Some(format!("Job {} assigned", assigned.id));
                            refresh_jobs(&mut app).await;
                        }
                        Err(err) => {
                            app.error_message = Some(format!("Assign failed: {err}"));
                        }
                    }
                }

                Action::CompleteSelectedJob => {
                    app.clear_messages();
                    let Some(collector) = app.session.clone() else {
                        continue;
                    };
                    let Some(job) = app.selected_job().cloned() else {
                        continue;
                    };
                    let Ok(weight_kg) = app.weight_input.trim().parse::<f64>() else {
                        app.error_message =
                            Some("Type the collected weight in kg first, e.g. 3.5".to_owned());
                        continue;
                    };
                    match app.service.complete(&collector, job.id, weight_kg).await {
                        Ok((completed, entry)) => {
                            app.weight_input.clear();
                            app.info_message = Some(format!(
                                "Job {} completed — {} pts awarded",
                                completed.id, entry.points_delta
                            ));
                            refresh_jobs(&mut app).await;
                        }
                        Err(err) => {
                            app.error_message = Some(format!("Complete failed: {err}"));
                        }
                    }
                }

                Action::ReportIssueSelectedJob => {
                    app.clear_messages();
                    let Some(collector) = app.session.clone() else {
                        continue;
                    };
                    let Some(job) = app.selected_job().cloned() else {
                        continue;
                    };
                    match app.service.report_issue(&collector, job.id, ISSUE_NOTE).await {
                        Ok(()) => {
                            app.info_message = Some(format!("Issue reported on job {}", job.id));
                            refresh_jobs(&mut app).await;
                        }
                        Err(err) => {
                            app.error_message = Some(format!("Report failed: {err}"));
                        }
                    }
                }

                Action::CancelSelectedJob => {
                    app.clear_messages();
                    let Some(collector) = app.session.clone() else {
                        continue;
                    };
                    let Some(job) = app.selected_job().cloned() else {
                        continue;
                    };
                    match app.service.cancel(&collector, job.id).await {
                        Ok(cancelled) => {
                            app.info_message = Some(format!("Job {} cancelled", cancelled.id));
                            refresh_jobs(&mut app).await;
                        }
                        Err(err) => {
                            app.error_message = Some(format!("Cancel failed: {err}"));
                        }
                    }
                }

                Action::ToggleZoneFilter => {
                    app.clear_messages();
                    app.zone_filter_on = !app.zone_filter_on;
                    refresh_jobs(&mut app).await;
                }

                Action::RefreshJobs => {
                    app.clear_messages();
                    refresh_jobs(&mut app).await;
                }

                Action::RefreshAdmin => {
                    app.clear_messages();
                    refresh_admin(&mut app).await;
                }

                Action::AssignCollectorZone => {
                    app.clear_messages();
                    let Some(admin) = app.session.clone() else {
                        continue;
                    };
                    let Some(collector) = app.selected_collector().cloned() else {
                        continue;
                    };
                    let zone = app.selected_zone_choice();
                    match app
                        .service
                        .assign_zone(&admin, collector.id, zone.clone())
                        .await
                    {
                        Ok(()) => {
                            app.info_message =
                                Some(format!("{} reassigned to {zone}", collector.username));
                            refresh_admin(&mut app).await;
                        }
                        Err(err) => {
                            app.error_message = Some(format!("Assignment failed: {err}"));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Put the authenticated user on the dashboard their role owns. The role set
/// is closed, so this match is the whole page-selection logic.
async fn enter_session(app: &mut App, user: User) {
    app.login_password.clear();
    app.screen = match user.role {
        Role::Resident => Screen::Resident,
        Role::Collector => Screen::Collector,
        Role::Admin => Screen::Admin,
    };
    app.session = Some(user);
    match app.screen {
        Screen::Resident => refresh_resident(app).await,
        Screen::Collector => refresh_jobs(app).await,
        Screen::Admin => refresh_admin(app).await,
        Screen::Login | Screen::Register => {}
    }
}

async fn refresh_resident(app: &mut App) {
    let Some(user) = app.session.clone() else {
        return;
    };

    match app.service.balance(user.id).await {
        Ok(balance) => app.balance = balance,
        Err(err) => {
            app.error_message = Some(format!("Failed to load balance: {err}"));
            return;
        }
    }
    match app.service.history(&user).await {
        Ok(history) => {
            app.history = history;
            app.history_index = app.history_index.min(app.history.len().saturating_sub(1));
        }
        Err(err) => {
            app.error_message = Some(format!("Failed to load history: {err}"));
            return;
        }
    }
    match app.service.rewards().await {
        Ok(rewards) => {
            app.rewards = rewards;
            app.reward_index = app.reward_index.min(app.rewards.len().saturating_sub(1));
        }
        Err(err) => {
            app.error_message = Some(format!("Failed to load rewards: {err}"));
            return;
        }
    }
    match app.service.leaderboard(10).await {
        Ok(leaderboard) => app.leaderboard = leaderboard,
        Err(err) => {
            app.error_message = Some(format!("Failed to load leaderboard: {err}"));
        }
    }
}

async fn refresh_jobs(app: &mut App) {
    let zone = app.manifest_zone();
    match app.service.open_jobs(zone.as_ref()).await {
        Ok(jobs) => {
            app.jobs = jobs;
            app.job_index = app.job_index.min(app.jobs.len().saturating_sub(1));
        }
        Err(err) => {
            app.error_message = Some(format!("Failed to load manifest: {err}"));
        }
    }
}

async fn refresh_admin(app: &mut App) {
    let Some(admin) = app.session.clone() else {
        return;
    };

    match app.service.overview(&admin).await {
        Ok(overview) => app.overview = overview,
        Err(err) => {
            app.error_message = Some(format!("Failed to load overview: {err}"));
            return;
        }
    }
    match app.service.users(&admin).await {
        Ok(users) => {
            app.users = users;
            let len = match app.admin_tab {
                app::AdminTab::Zones => app.roster().len(),
                _ => app.users.len(),
            };
            app.user_index = app.user_index.min(len.saturating_sub(1));
        }
        Err(err) => {
            app.error_message = Some(format!("Failed to load users: {err}"));
        }
    }
}

/// Register the classic demo accounts so a fresh database is explorable
/// without signing everyone up by hand. Existing accounts are left alone.
async fn seed_demo_accounts(service: &EcoSortService) {
    let demo: [(&str, Role, Option<&str>, Option<&str>); 5] = [
        ("afiq", Role::Admin, None, None),
        ("min", Role::Admin, None, None),
        ("fathul", Role::Collector, None, Some("Zone A")),
        ("amir", Role::Collector, None, Some("Zone B")),
        ("john", Role::Resident, Some("12 Jalan Teknokrat 3"), Some("Zone A")),
    ];

    for (name, role, address, zone) in demo {
        let res = service
            .register(
                name,
                "123",
                role,
                address.map(str::to_owned),
                zone.map(|zone| Zone(zone.to_owned())),
            )
            .await;
        match res {
            Ok(_) => info!(user = name, role = %role, "seeded demo account"),
            Err(StoreError::DuplicateUser) => {}
            Err(err) => warn!(user = name, "failed to seed demo account: {err}"),
        }
    }
}

fn init_tracing(path: &Path) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
