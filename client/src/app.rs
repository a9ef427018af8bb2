//! Terminal runtime: owns the event loop, translates keys into actions
//! and runs the commands the state transitions ask for.

use std::{io, sync::Arc, time::Duration};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::{Backend, CrosstermBackend},
    style::{Color, Style},
    widgets::{Block, Borders},
};
use tokio::sync::mpsc;
use tracing::warn;
use tui_textarea::TextArea;

use crate::{
    api::DirectoryApi,
    state::{self, Action, AppState, Command, View},
    ui,
};

/// Which form field has keyboard focus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormField {
    FullName,
    Role,
}

pub struct App {
    pub state: AppState,
    pub search_input: TextArea<'static>,
    pub name_input: TextArea<'static>,
    pub role_input: TextArea<'static>,
    pub form_focus: FormField,
    api: Arc<dyn DirectoryApi>,
    events_tx: mpsc::UnboundedSender<Action>,
    events_rx: mpsc::UnboundedReceiver<Action>,
}

impl App {
    pub fn new(api: Arc<dyn DirectoryApi>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut app = Self {
            state: AppState::default(),
            search_input: Self::search_textarea(),
            name_input: Self::field_textarea(" Full Name "),
            role_input: Self::field_textarea(" Role "),
            form_focus: FormField::FullName,
            api,
            events_tx,
            events_rx,
        };
        app.style_form_focus();
        app
    }

    fn search_textarea() -> TextArea<'static> {
        let mut textarea = TextArea::default();
        textarea.set_placeholder_text("Search by name or role");
        textarea.set_block(Block::default().borders(Borders::ALL).title(" Search "));
        textarea
    }

    fn field_textarea(title: &'static str) -> TextArea<'static> {
        let mut textarea = TextArea::default();
        textarea.set_block(Block::default().borders(Borders::ALL).title(title));
        textarea
    }

    /// Rebuild the form inputs from the current draft. Called whenever
    /// the form view is entered so an edit shows the stored values.
    fn seed_form_inputs(&mut self) {
        self.name_input = Self::field_textarea(" Full Name ");
        self.name_input.insert_str(&self.state.form.full_name);
        self.role_input = Self::field_textarea(" Role ");
        self.role_input.insert_str(&self.state.form.role);
        self.form_focus = FormField::FullName;
        self.style_form_focus();
    }

    fn style_form_focus(&mut self) {
        let focused = Style::default().fg(Color::Yellow);
        let idle = Style::default();
        let (name_style, role_style) = match self.form_focus {
            FormField::FullName => (focused, idle),
            FormField::Role => (idle, focused),
        };
        self.name_input.set_block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Full Name ")
                .border_style(name_style),
        );
        self.role_input.set_block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Role ")
                .border_style(role_style),
        );
    }

    pub async fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let res = self.run_loop(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        Ok(res?)
    }

    async fn run_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        self.dispatch(Action::Refresh);
        loop {
            terminal.draw(|f| ui::draw(f, self))?;

            // Completions from in-flight requests.
            while let Ok(action) = self.events_rx.try_recv() {
                self.dispatch(action);
            }

            // Short poll keeps the loop responsive to request
            // completions even while the keyboard is idle.
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }

            if self.state.should_quit {
                return Ok(());
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.dispatch(Action::Quit);
            return;
        }
        if self.state.pending_delete.is_some() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => self.dispatch(Action::ConfirmDelete),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.dispatch(Action::CancelDelete)
                }
                _ => {}
            }
            return;
        }
        match self.state.view {
            View::List => self.handle_list_key(key),
            View::Form => self.handle_form_key(key),
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            // Esc clears an active search first and quits once the
            // search box is already empty.
            KeyCode::Esc => {
                if self.state.search_term.is_empty() {
                    self.dispatch(Action::Quit);
                } else {
                    self.search_input = Self::search_textarea();
                    self.dispatch(Action::SearchChanged(String::new()));
                }
            }
            KeyCode::Up => self.dispatch(Action::SelectionUp),
            KeyCode::Down => self.dispatch(Action::SelectionDown),
            KeyCode::Enter => {
                self.dispatch(Action::OpenEditForm);
                if self.state.view == View::Form {
                    self.seed_form_inputs();
                }
            }
            KeyCode::Delete => self.dispatch(Action::RequestDelete),
            KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.dispatch(Action::OpenNewForm);
                self.seed_form_inputs();
            }
            KeyCode::Char('t') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.dispatch(Action::ToggleStatus);
            }
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.dispatch(Action::Refresh);
            }
            _ => {
                if self.search_input.input(key) {
                    let term = self.search_input.lines().join("");
                    self.dispatch(Action::SearchChanged(term));
                }
            }
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.dispatch(Action::CancelForm),
            KeyCode::Tab | KeyCode::BackTab => {
                self.form_focus = match self.form_focus {
                    FormField::FullName => FormField::Role,
                    FormField::Role => FormField::FullName,
                };
                self.style_form_focus();
            }
            KeyCode::Enter => {
                let full_name = self.name_input.lines().join("");
                let role = self.role_input.lines().join("");
                self.dispatch(Action::SubmitForm { full_name, role });
            }
            _ => {
                let input = match self.form_focus {
                    FormField::FullName => &mut self.name_input,
                    FormField::Role => &mut self.role_input,
                };
                input.input(key);
            }
        }
    }

    fn dispatch(&mut self, action: Action) {
        let commands = state::update(&mut self.state, action);
        for command in commands {
            self.run_command(command);
        }
    }

    /// Each command runs on its own task; the outcome is fed back into
    /// the loop as an action through the events channel.
    fn run_command(&self, command: Command) {
        let api = Arc::clone(&self.api);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let action = match command {
                Command::LoadAll => match api.list().await {
                    Ok(records) => Some(Action::RecordsLoaded(records)),
                    Err(err) => {
                        warn!(error = %err, "loading employees failed");
                        Some(Action::LoadFailed(err.to_string()))
                    }
                },
                Command::Create(employee) => match api.create(employee).await {
                    Ok(_) => Some(Action::SaveCompleted),
                    Err(err) => {
                        warn!(error = %err, "creating employee failed");
                        Some(Action::SaveFailed(err.to_string()))
                    }
                },
                Command::SaveEdit { id, patch } => match api.update(id, patch).await {
                    Ok(_) => Some(Action::SaveCompleted),
                    Err(err) => {
                        warn!(error = %err, id, "updating employee failed");
                        Some(Action::SaveFailed(err.to_string()))
                    }
                },
                // A successful toggle needs no follow-up: the record
                // was already flipped locally.
                Command::PushToggle { id, patch } => match api.update(id, patch).await {
                    Ok(_) => None,
                    Err(err) => {
                        warn!(error = %err, id, "pushing status change failed");
                        Some(Action::ToggleRejected(err.to_string()))
                    }
                },
                Command::Delete(id) => match api.delete(id).await {
                    Ok(_) => Some(Action::DeleteCompleted),
                    Err(err) => {
                        warn!(error = %err, id, "deleting employee failed");
                        Some(Action::DeleteFailed(err.to_string()))
                    }
                },
            };
            if let Some(action) = action {
                let _ = tx.send(action);
            }
        });
    }
}
