use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ecosort_core::model::{Role, WasteType};

use crate::app::{AdminTab, App, BookField, LoginField, RegisterField, ResidentTab, Screen};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Action {
    None,
    Quit,
    /// Run `service.authenticate`(...) with the login form contents
    SubmitLogin,
    /// Run `service.register`(...) with the registration form contents
    SubmitRegistration,
    /// Run `service.book_pickup`(...) with the booking form contents
    BookPickup,
    /// Cancel the booking selected in the history list
    CancelSelectedBooking,
    /// Redeem the reward selected in the shop list
    RedeemSelectedReward,
    /// Reload balance, history, rewards, and leaderboard
    RefreshResident,
    /// Take the selected pending job onto the manifest
    AssignSelectedJob,
    /// Complete the selected job with the weight input
    CompleteSelectedJob,
    /// Attach the canned issue note to the selected job
    ReportIssueSelectedJob,
    /// Cancel the selected job
    CancelSelectedJob,
    /// Reload the collector manifest
    RefreshJobs,
    /// Flip the manifest zone filter and reload
    ToggleZoneFilter,
    /// Reload overview, users, and roster
    RefreshAdmin,
    /// Assign the chosen zone to the selected collector
    AssignCollectorZone,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{Backspace, Char, Down, Enter, Esc, Left, Right, Tab, Up};

    // Global quit shortcuts; plain characters stay available for text entry.
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, Char('c') | Char('q'))
    {
        return Action::Quit;
    }

    let mut action = Action::None;

    match app.screen {
        Screen::Login => match key.code {
            Up | Down => {
                app.login_field = match app.login_field {
                    LoginField::Username => LoginField::Password,
                    LoginField::Password => LoginField::Username,
                };
            }
            Tab => {
                app.clear_messages();
                app.screen = Screen::Register;
            }
            Enter => action = Action::SubmitLogin,
            Char(character) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
                match app.login_field {
                    LoginField::Username => app.login_username.push(character),
                    LoginField::Password => app.login_password.push(character),
                }
            }
            Backspace => {
                match app.login_field {
                    LoginField::Username => app.login_username.pop(),
                    LoginField::Password => app.login_password.pop(),
                };
            }
            _ => {}
        },

        Screen::Register => match key.code {
            Up => app.reg_field = previous_register_field(app.reg_field),
            Down => app.reg_field = next_register_field(app.reg_field),
            Left | Right => match app.reg_field {
                RegisterField::Role => {
                    app.reg_role_index =
                        cycle(app.reg_role_index, Role::ALL.len(), key.code == Right);
                }
                RegisterField::Zone => {
                    app.reg_zone_index =
                        cycle(app.reg_zone_index, crate::app::ZONES.len(), key.code == Right);
                }
                _ => {}
            },
            Tab | Esc => {
                app.clear_messages();
                app.screen = Screen::Login;
            }
            Enter => action = Action::SubmitRegistration,
            Char(character) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
                match app.reg_field {
                    RegisterField::Username => app.reg_username.push(character),
                    RegisterField::Password => app.reg_password.push(character),
                    RegisterField::Address => app.reg_address.push(character),
                    RegisterField::Role | RegisterField::Zone => {}
                }
            }
            Backspace => {
                match app.reg_field {
                    RegisterField::Username => app.reg_username.pop(),
                    RegisterField::Password => app.reg_password.pop(),
                    RegisterField::Address => app.reg_address.pop(),
                    RegisterField::Role | RegisterField::Zone => None,
                };
            }
            _ => {}
        },

        Screen::Resident => match app.resident_tab {
            ResidentTab::Book => match key.code {
                Esc => app.logout(),
                Tab => {
                    app.resident_tab = app.resident_tab.next();
                    action = Action::RefreshResident;
                }
                Up => app.book_field = previous_book_field(app.book_field),
                Down => app.book_field = next_book_field(app.book_field),
                Left | Right if app.book_field == BookField::WasteType => {
                    app.book_waste_index =
                        cycle(app.book_waste_index, WasteType::BUILT_IN.len(), key.code == Right);
                }
                Enter => action = Action::BookPickup,
                Char(character)
                    if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
                {
                    match app.book_field {
                        BookField::Date => app.book_date.push(character),
                        BookField::Notes => app.book_notes.push(character),
                        BookField::WasteType => {}
                    }
                }
                Backspace => {
                    match app.book_field {
                        BookField::Date => app.book_date.pop(),
                        BookField::Notes => app.book_notes.pop(),
                        BookField::WasteType => None,
                    };
                }
                _ => {}
            },
            ResidentTab::History => match key.code {
                Esc => app.logout(),
                Tab => {
                    app.resident_tab = app.resident_tab.next();
                    action = Action::RefreshResident;
                }
                Up => app.history_index = app.history_index.saturating_sub(1),
                Down => {
                    if app.history_index + 1 < app.history.len() {
                        app.history_index += 1;
                    }
                }
                Char('c') => action = Action::CancelSelectedBooking,
                Char('r') => action = Action::RefreshResident,
                _ => {}
            },
            ResidentTab::Shop => match key.code {
                Esc => app.logout(),
                Tab => {
                    app.resident_tab = app.resident_tab.next();
                    action = Action::RefreshResident;
                }
                Up => app.reward_index = app.reward_index.saturating_sub(1),
                Down => {
                    if app.reward_index + 1 < app.rewards.len() {
                        app.reward_index += 1;
                    }
                }
                Enter => action = Action::RedeemSelectedReward,
                Char('r') => action = Action::RefreshResident,
                _ => {}
            },
            ResidentTab::Leaderboard => match key.code {
                Esc => app.logout(),
                Tab => {
                    app.resident_tab = app.resident_tab.next();
                    action = Action::RefreshResident;
                }
                Char('r') => action = Action::RefreshResident,
                _ => {}
            },
        },

        Screen::Collector => match key.code {
            Esc => app.logout(),
            Up => app.job_index = app.job_index.saturating_sub(1),
            Down => {
                if app.job_index + 1 < app.jobs.len() {
                    app.job_index += 1;
                }
            }
            // Digits and the decimal point feed the weight box; letters are commands.
            Char(character @ ('0'..='9' | '.')) => app.weight_input.push(character),
            Backspace => {
                app.weight_input.pop();
            }
            Char('a') => action = Action::AssignSelectedJob,
            Enter => action = Action::CompleteSelectedJob,
            Char('i') => action = Action::ReportIssueSelectedJob,
            Char('c') => action = Action::CancelSelectedJob,
            Char('z') => action = Action::ToggleZoneFilter,
            Char('r') => action = Action::RefreshJobs,
            _ => {}
        },

        Screen::Admin => match key.code {
            Esc => app.logout(),
            Tab => {
                app.admin_tab = app.admin_tab.next();
                app.user_index = 0;
                action = Action::RefreshAdmin;
            }
            Up => app.user_index = app.user_index.saturating_sub(1),
            Down => {
                let len = match app.admin_tab {
                    AdminTab::Zones => app.roster().len(),
                    _ => app.users.len(),
                };
                if app.user_index + 1 < len {
                    app.user_index += 1;
                }
            }
            Left | Right if app.admin_tab == AdminTab::Zones => {
                app.zone_choice_index =
                    cycle(app.zone_choice_index, crate::app::ZONES.len(), key.code == Right);
            }
            Enter if app.admin_tab == AdminTab::Zones => action = Action::AssignCollectorZone,
            Char('r') => action = Action::RefreshAdmin,
            _ => {}
        },
    }
    action
}

fn cycle(index: usize, len: usize, forward: bool) -> usize {
    if forward {
        (index + 1) % len
    } else {
        (index + len - 1) % len
    }
}

fn next_register_field(field: RegisterField) -> RegisterField {
    match field {
        RegisterField::Username => RegisterField::Password,
        RegisterField::Password => RegisterField::Role,
        RegisterField::Role => RegisterField::Address,
        RegisterField::Address => RegisterField::Zone,
        RegisterField::Zone => RegisterField::Username,
    }
}

fn previous_register_field(field: RegisterField) -> RegisterField {
    match field {
        RegisterField::Username => RegisterField::Zone,
        RegisterField::Password => RegisterField::Username,
        RegisterField::Role => RegisterField::Password,
        RegisterField::Address => RegisterField::Role,
        RegisterField::Zone => RegisterField::Address,
    }
}

fn next_book_field(field: BookField) -> BookField {
    match field {
        BookField::Date => BookField::WasteType,
        BookField::WasteType => BookField::Notes,
        BookField::Notes => BookField::Date,
    }
}

fn previous_book_field(field: BookField) -> BookField {
    match field {
        BookField::Date => BookField::Notes,
        BookField::WasteType => BookField::Date,
        BookField::Notes => BookField::WasteType,
    }
}
