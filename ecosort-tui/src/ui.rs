use ecosort_core::model::{BookingStatus, Role, WasteType};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, Tabs, Wrap},
};

use crate::app::{AdminTab, App, BookField, LoginField, RegisterField, ResidentTab, Screen, ZONES};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    // Title / header
    let mut header_text = String::from("ecosort – municipal waste pickups & eco-points");
    if let Some(user) = &app.session {
        header_text.push_str(&format!(" · {} ({})", user.username, user.role));
        if let Some(zone) = &user.zone {
            header_text.push_str(&format!(" · {zone}"));
        }
        if user.role == Role::Resident {
            header_text.push_str(&format!(" · {} pts", app.balance));
        }
    }
    let header = Paragraph::new(header_text)
        .block(Block::default().borders(Borders::ALL).title("EcoSort"));
    frame.render_widget(header, *header_area);

    // Main screen
    match app.screen {
        Screen::Login => draw_login(frame, app, *content_area),
        Screen::Register => draw_register(frame, app, *content_area),
        Screen::Resident => draw_resident(frame, app, *content_area),
        Screen::Collector => draw_collector(frame, app, *content_area),
        Screen::Admin => draw_admin(frame, app, *content_area),
    }

    // Status bar
    let nav_hint = match app.screen {
        Screen::Login => "↑/↓ field · Enter log in · Tab register · Ctrl-C/Ctrl-Q quit",
        Screen::Register => {
            "↑/↓ field · ←/→ choose role/zone · Enter sign up · Tab back · Ctrl-C/Ctrl-Q quit"
        }
        Screen::Resident => match app.resident_tab {
            ResidentTab::Book => {
                "↑/↓ field · ←/→ waste type · Enter book · Tab next tab · Esc log out"
            }
            ResidentTab::History => "↑/↓ select · c cancel booking · Tab next tab · Esc log out",
            ResidentTab::Shop => "↑/↓ select · Enter redeem · Tab next tab · Esc log out",
            ResidentTab::Leaderboard => "r refresh · Tab next tab · Esc log out",
        },
        Screen::Collector => {
            "↑/↓ select · a assign · type weight + Enter complete · i issue · c cancel · z zone filter · Esc log out"
        }
        Screen::Admin => {
            "Tab next tab · ↑/↓ select · ←/→ zone · Enter assign zone · r refresh · Esc log out"
        }
    };

    let status_text = if app.is_loading {
        format!("Working… · {nav_hint}")
    } else if let Some(msg) = &app.error_message {
        format!("{msg} · {nav_hint}")
    } else if let Some(msg) = &app.info_message {
        format!("{msg} · {nav_hint}")
    } else {
        nav_hint.to_owned()
    };

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.info_message.is_some() {
        Style::default().fg(Color::Green)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, *status_area);
}

fn input_block(title: &str, focused: bool) -> Block<'_> {
    let block = Block::default().borders(Borders::ALL).title(title.to_owned());
    if focused {
        block.border_style(Style::default().fg(Color::Yellow))
    } else {
        block
    }
}

fn draw_login(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [username_area, password_area, rest_area] = chunks else {
        return;
    };

    let username = Paragraph::new(app.login_username.as_str()).block(input_block(
        "Username",
        app.login_field == LoginField::Username,
    ));
    frame.render_widget(username, *username_area);

    let masked = "*".repeat(app.login_password.chars().count());
    let password = Paragraph::new(masked).block(input_block(
        "Password",
        app.login_field == LoginField::Password,
    ));
    frame.render_widget(password, *password_area);

    let welcome = Paragraph::new(
        "Welcome to EcoSort. Log in to schedule pickups, run your collection round, \
         or open the admin dashboard. New here? Press Tab to create an account.",
    )
    .block(Block::default().borders(Borders::ALL).title("Welcome"))
    .wrap(Wrap { trim: true });
    frame.render_widget(welcome, *rest_area);
}

fn draw_register(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [username_area, password_area, role_area, address_area, zone_area, rest_area] = chunks
    else {
        return;
    };

    let username = Paragraph::new(app.reg_username.as_str()).block(input_block(
        "Choose username",
        app.reg_field == RegisterField::Username,
    ));
    frame.render_widget(username, *username_area);

    let masked = "*".repeat(app.reg_password.chars().count());
    let password = Paragraph::new(masked).block(input_block(
        "Choose password",
        app.reg_field == RegisterField::Password,
    ));
    frame.render_widget(password, *password_area);

    let role = Role::ALL
        .get(app.reg_role_index)
        .copied()
        .unwrap_or(Role::Resident);
    let role_line = Paragraph::new(format!("← {role} →")).block(input_block(
        "I am a…",
        app.reg_field == RegisterField::Role,
    ));
    frame.render_widget(role_line, *role_area);

    let address = Paragraph::new(app.reg_address.as_str()).block(input_block(
        "Home address (required for residents)",
        app.reg_field == RegisterField::Address,
    ));
    frame.render_widget(address, *address_area);

    let zone = ZONES.get(app.reg_zone_index).copied().unwrap_or(ZONES[0]);
    let zone_line = Paragraph::new(format!("← {zone} →")).block(input_block(
        "Residential zone",
        app.reg_field == RegisterField::Zone,
    ));
    frame.render_widget(zone_line, *zone_area);

    let hint = Paragraph::new("Residents earn eco-points for every completed pickup.")
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    frame.render_widget(hint, *rest_area);
}

fn draw_resident(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [tabs_area, body_area] = chunks else {
        return;
    };

    let tab_index = match app.resident_tab {
        ResidentTab::Book => 0,
        ResidentTab::History => 1,
        ResidentTab::Shop => 2,
        ResidentTab::Leaderboard => 3,
    };
    let tabs = Tabs::new(vec!["Book pickup", "History", "Shop", "Leaderboard"])
        .select(tab_index)
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL).title("Resident"));
    frame.render_widget(tabs, *tabs_area);

    match app.resident_tab {
        ResidentTab::Book => draw_book_form(frame, app, *body_area),
        ResidentTab::History => draw_history(frame, app, *body_area),
        ResidentTab::Shop => draw_shop(frame, app, *body_area),
        ResidentTab::Leaderboard => draw_leaderboard(frame, app, *body_area),
    }
}

fn draw_book_form(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [date_area, waste_area, notes_area, rest_area] = chunks else {
        return;
    };

    let date = Paragraph::new(app.book_date.as_str()).block(input_block(
        "Pickup date (YYYY-MM-DD)",
        app.book_field == BookField::Date,
    ));
    frame.render_widget(date, *date_area);

    let waste = app.selected_waste_type();
    let waste_line = Paragraph::new(format!("← {} →", waste_label(&waste)))
        .style(Style::default().fg(waste_color(&waste)))
        .block(input_block(
            "Waste type",
            app.book_field == BookField::WasteType,
        ));
    frame.render_widget(waste_line, *waste_area);

    let notes = Paragraph::new(app.book_notes.as_str()).block(input_block(
        "Notes for the collector (gate code, location…)",
        app.book_field == BookField::Notes,
    ));
    frame.render_widget(notes, *notes_area);

    let hint = Paragraph::new("Press Enter to book. Completed pickups are weighed on collection and credited to your eco-points balance.")
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    frame.render_widget(hint, *rest_area);
}

fn draw_history(frame: &mut Frame<'_>, app: &App, area: Rect) {
    if app.history.is_empty() {
        let empty = Paragraph::new("No pickups yet. Book one on the first tab!")
            .block(Block::default().borders(Borders::ALL).title("History"))
            .wrap(Wrap { trim: true });
        frame.render_widget(empty, area);
        return;
    }

    let rows = app.history.iter().enumerate().map(|(index, booking)| {
        let weight = booking
            .weight_kg
            .map_or(String::from("–"), |weight| format!("{weight:.1} kg"));
        let issue = booking.issue.as_deref().unwrap_or("");
        let mut style = Style::default().fg(status_color(booking.status));
        if index == app.history_index {
            style = style.add_modifier(Modifier::BOLD);
        }
        Row::new(vec![
            Cell::from(booking.id.to_string()),
            Cell::from(booking.scheduled_date.format("%d.%m.%Y").to_string()),
            Cell::from(waste_label(&booking.waste_type).to_owned()),
            Cell::from(booking.status.to_string()),
            Cell::from(weight),
            Cell::from(issue.to_owned()),
        ])
        .style(style)
    });

    let column_widths = [
        Constraint::Length(6),
        Constraint::Length(12),
        Constraint::Length(18),
        Constraint::Length(10),
        Constraint::Length(9),
        Constraint::Min(10),
    ];

    let table = Table::new(rows, column_widths)
        .header(
            Row::new(vec!["ID", "Date", "Type", "Status", "Weight", "Issue"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("History (↑/↓, c to cancel)"),
        )
        .column_spacing(1);

    frame.render_widget(table, area);
}

fn draw_shop(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let items = if app.rewards.is_empty() {
        vec![ListItem::new("The catalog is empty.")]
    } else {
        app.rewards
            .iter()
            .map(|reward| {
                let affordable = app.balance >= reward.cost;
                let line = format!("{} — {} pts", reward.name, reward.cost);
                let style = if affordable {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                ListItem::new(line).style(style)
            })
            .collect()
    };

    let title = match &app.voucher {
        Some(code) => format!("Shop · balance {} pts · last voucher {code}", app.balance),
        None => format!("Shop · balance {} pts", app.balance),
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default();
    if !app.rewards.is_empty() {
        state.select(Some(app.reward_index));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_leaderboard(frame: &mut Frame<'_>, app: &App, area: Rect) {
    if app.leaderboard.is_empty() {
        let empty = Paragraph::new("Nobody has earned points yet.")
            .block(Block::default().borders(Borders::ALL).title("Leaderboard"))
            .wrap(Wrap { trim: true });
        frame.render_widget(empty, area);
        return;
    }

    let rows = app.leaderboard.iter().enumerate().map(|(index, entry)| {
        Row::new(vec![
            Cell::from(format!("{}", index + 1)),
            Cell::from(entry.username.clone()),
            Cell::from(format!("{} pts", entry.points)),
        ])
    });

    let column_widths = [
        Constraint::Length(5),
        Constraint::Min(16),
        Constraint::Length(12),
    ];

    let table = Table::new(rows, column_widths)
        .header(
            Row::new(vec!["Rank", "Resident", "Points"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Top recyclers"),
        )
        .column_spacing(1);

    frame.render_widget(table, area);
}

fn draw_collector(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [jobs_area, weight_area] = chunks else {
        return;
    };

    let zone_label = app
        .manifest_zone()
        .map_or_else(|| String::from("all zones"), |zone| zone.to_string());

    if app.jobs.is_empty() {
        let empty = Paragraph::new("All clear! No open pickups in your sector.")
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Manifest · {zone_label}")),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(empty, *jobs_area);
    } else {
        let rows = app.jobs.iter().enumerate().map(|(index, job)| {
            let zone = job
                .zone
                .as_ref()
                .map_or(String::from("–"), ToString::to_string);
            let note = job
                .issue
                .as_deref()
                .or(job.notes.as_deref())
                .unwrap_or("");
            let mut style = Style::default().fg(status_color(job.status));
            if index == app.job_index {
                style = style.add_modifier(Modifier::BOLD);
            }
            Row::new(vec![
                Cell::from(job.id.to_string()),
                Cell::from(job.scheduled_date.format("%d.%m.%Y").to_string()),
                Cell::from(zone),
                Cell::from(waste_label(&job.waste_type).to_owned()),
                Cell::from(job.status.to_string()),
                Cell::from(note.to_owned()),
            ])
            .style(style)
        });

        let column_widths = [
            Constraint::Length(6),
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(18),
            Constraint::Length(10),
            Constraint::Min(12),
        ];

        let table = Table::new(rows, column_widths)
            .header(
                Row::new(vec!["ID", "Date", "Zone", "Type", "Status", "Notes/Issue"])
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Manifest · {zone_label} (↑/↓, a assign)")),
            )
            .column_spacing(1);

        frame.render_widget(table, *jobs_area);
    }

    let weight = Paragraph::new(app.weight_input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Collected weight in kg (digits, then Enter to complete)"),
    );
    frame.render_widget(weight, *weight_area);
}

fn draw_admin(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [tabs_area, body_area] = chunks else {
        return;
    };

    let tab_index = match app.admin_tab {
        AdminTab::Overview => 0,
        AdminTab::Users => 1,
        AdminTab::Zones => 2,
    };
    let tabs = Tabs::new(vec!["Overview", "Users", "Team & zones"])
        .select(tab_index)
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL).title("Admin"));
    frame.render_widget(tabs, *tabs_area);

    match app.admin_tab {
        AdminTab::Overview => draw_overview(frame, app, *body_area),
        AdminTab::Users => draw_users(frame, app, *body_area),
        AdminTab::Zones => draw_zones(frame, app, *body_area),
    }
}

fn draw_overview(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [totals_area, breakdown_area] = chunks else {
        return;
    };

    let totals = Paragraph::new(format!(
        "Registered users: {}\nPending pickups: {}\nTotal recycled: {:.1} kg",
        app.overview.total_users, app.overview.pending_bookings, app.overview.completed_weight_kg,
    ))
    .block(Block::default().borders(Borders::ALL).title("Activity"));
    frame.render_widget(totals, *totals_area);

    let rows = app
        .overview
        .bookings_by_waste_type
        .iter()
        .map(|(slug, count)| {
            Row::new(vec![
                Cell::from(slug.clone()),
                Cell::from(format!("{count}")),
            ])
        });

    let table = Table::new(rows, [Constraint::Min(18), Constraint::Length(8)])
        .header(
            Row::new(vec!["Waste type", "Bookings"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Waste composition"),
        )
        .column_spacing(1);

    frame.render_widget(table, *breakdown_area);
}

fn draw_users(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let rows = app.users.iter().enumerate().map(|(index, user)| {
        let zone = user
            .zone
            .as_ref()
            .map_or(String::from("–"), ToString::to_string);
        let address = user.address.as_deref().unwrap_or("–");
        let mut style = Style::default();
        if index == app.user_index {
            style = style.add_modifier(Modifier::BOLD);
        }
        Row::new(vec![
            Cell::from(user.username.clone()),
            Cell::from(user.role.to_string()),
            Cell::from(zone),
            Cell::from(address.to_owned()),
        ])
        .style(style)
    });

    let column_widths = [
        Constraint::Length(16),
        Constraint::Length(10),
        Constraint::Length(8),
        Constraint::Min(16),
    ];

    let table = Table::new(rows, column_widths)
        .header(
            Row::new(vec!["Username", "Role", "Zone", "Address"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Registered accounts"),
        )
        .column_spacing(1);

    frame.render_widget(table, area);
}

fn draw_zones(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let roster = app.roster();

    let items = if roster.is_empty() {
        vec![ListItem::new("No collectors registered yet.")]
    } else {
        roster
            .iter()
            .enumerate()
            .map(|(index, collector)| {
                let prefix = if index == app.user_index { "> " } else { "  " };
                let zone = collector
                    .zone
                    .as_ref()
                    .map_or(String::from("unassigned"), ToString::to_string);
                ListItem::new(format!("{prefix}{} — {zone}", collector.username))
            })
            .collect()
    };

    let chosen = app.selected_zone_choice();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            "Duty roster · assign ← {chosen} → with Enter"
        )))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default();
    if !roster.is_empty() {
        state.select(Some(app.user_index));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn waste_label(waste_type: &WasteType) -> &str {
    match waste_type {
        WasteType::Recyclable => "Recyclable",
        WasteType::EWaste => "E-waste",
        WasteType::BulkItem => "Bulk item",
        WasteType::GardenWaste => "Garden waste",
        WasteType::Other(name) => name.as_str(),
    }
}

fn waste_color(waste_type: &WasteType) -> Color {
    match waste_type {
        WasteType::Recyclable => Color::Green,
        WasteType::EWaste => Color::Red,
        WasteType::BulkItem => Color::Blue,
        WasteType::GardenWaste => Color::LightGreen,
        WasteType::Other(_) => Color::Magenta,
    }
}

fn status_color(status: BookingStatus) -> Color {
    match status {
        BookingStatus::Pending => Color::Yellow,
        BookingStatus::Assigned => Color::Blue,
        BookingStatus::Completed => Color::Green,
        BookingStatus::Cancelled => Color::Gray,
    }
}
