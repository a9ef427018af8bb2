//! Rendering for the list and form screens.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::{
    app::App,
    state::{self, View},
};

pub fn draw(f: &mut Frame, app: &mut App) {
    match app.state.view {
        View::List => draw_list(f, app),
        View::Form => draw_form(f, app),
    }
    if app.state.pending_delete.is_some() {
        draw_confirm(f, app);
    }
}

fn draw_list(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3), // Search box
                Constraint::Min(1),    // Listing
                Constraint::Length(1), // Status / key help
            ]
            .as_ref(),
        )
        .split(f.area());

    f.render_widget(&app.search_input, chunks[0]);

    let visible = state::visible(&app.state.records, &app.state.search_term);
    let title = if app.state.loading {
        " Employees (loading) ".to_string()
    } else {
        format!(" Employees ({}) ", visible.len())
    };

    if visible.is_empty() {
        let empty = Paragraph::new("No matching employees.")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(empty, chunks[1]);
    } else {
        let items: Vec<ListItem> = visible
            .iter()
            .map(|record| {
                let marker = if record.is_active {
                    "[active]"
                } else {
                    "[inactive]"
                };
                let style = if record.is_active {
                    Style::default()
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                let line = format!(
                    "{:>4}  {:<10}  {}  ({})",
                    record.id, marker, record.full_name, record.role
                );
                ListItem::new(line).style(style)
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol(">> ");

        let mut list_state = ListState::default();
        list_state.select(Some(app.state.selected.min(visible.len() - 1)));
        f.render_stateful_widget(list, chunks[1], &mut list_state);
    }

    let footer = match &app.state.status {
        Some(status) => Paragraph::new(status.as_str()).style(Style::default().fg(Color::Red)),
        None => Paragraph::new(
            "Ctrl+N new | Enter edit | Ctrl+T toggle | Del delete | Ctrl+R reload | Esc quit",
        )
        .style(Style::default().fg(Color::DarkGray)),
    };
    f.render_widget(footer, chunks[2]);
}

fn draw_form(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(1), // Heading
                Constraint::Length(3), // Full name
                Constraint::Length(3), // Role
                Constraint::Length(1), // Status / key help
                Constraint::Min(0),
            ]
            .as_ref(),
        )
        .split(f.area());

    let heading = if app.state.editing_id.is_some() {
        "Edit employee"
    } else {
        "New employee"
    };
    f.render_widget(
        Paragraph::new(heading).style(Style::default().add_modifier(Modifier::BOLD)),
        chunks[0],
    );

    f.render_widget(&app.name_input, chunks[1]);
    f.render_widget(&app.role_input, chunks[2]);

    let footer = if app.state.saving {
        Paragraph::new("Saving...").style(Style::default().fg(Color::Yellow))
    } else {
        match &app.state.status {
            Some(status) => Paragraph::new(status.as_str()).style(Style::default().fg(Color::Red)),
            None => Paragraph::new("Enter save | Tab switch field | Esc back")
                .style(Style::default().fg(Color::DarkGray)),
        }
    };
    f.render_widget(footer, chunks[3]);
}

fn draw_confirm(f: &mut Frame, app: &App) {
    let Some(id) = app.state.pending_delete else {
        return;
    };
    let name = app
        .state
        .records
        .iter()
        .find(|record| record.id == id)
        .map(|record| record.full_name.as_str())
        .unwrap_or("this employee");

    let area = centered_rect(46, 5, f.area());
    f.render_widget(Clear, area); // Clear underlying text

    let dialog = Paragraph::new(vec![
        Line::from(format!("Delete {name}?")),
        Line::from(""),
        Line::from(Span::styled(
            "y: delete    n: keep",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title(" Confirm Delete "));
    f.render_widget(dialog, area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
