//! Client state and the transitions over it.
//!
//! [`update`] is a pure function from the current state and one
//! [`Action`] to the next state plus the [`Command`]s the runtime must
//! execute. Keeping every rule here means the whole interaction model
//! is testable without a terminal or a network.

use crate::api::{Employee, EmployeePatch, NewEmployee};

/// Which screen is showing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    List,
    Form,
}

/// Draft values for the record form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormData {
    pub full_name: String,
    pub role: String,
}

#[derive(Debug)]
pub struct AppState {
    /// Records as last reported by the service, newest first.
    pub records: Vec<Employee>,
    pub search_term: String,
    pub view: View,
    pub form: FormData,
    /// Id of the record being edited; `None` while creating.
    pub editing_id: Option<i32>,
    /// Cursor into the *filtered* listing.
    pub selected: usize,
    /// Id awaiting delete confirmation.
    pub pending_delete: Option<i32>,
    pub loading: bool,
    pub saving: bool,
    pub status: Option<String>,
    pub should_quit: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            search_term: String::new(),
            view: View::List,
            form: FormData::default(),
            editing_id: None,
            selected: 0,
            pending_delete: None,
            loading: false,
            saving: false,
            status: None,
            should_quit: false,
        }
    }
}

/// Everything that can happen: key-driven intents and completions of
/// earlier commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    SearchChanged(String),
    SelectionUp,
    SelectionDown,
    OpenNewForm,
    OpenEditForm,
    CancelForm,
    SubmitForm { full_name: String, role: String },
    ToggleStatus,
    RequestDelete,
    ConfirmDelete,
    CancelDelete,
    Refresh,
    Quit,
    RecordsLoaded(Vec<Employee>),
    LoadFailed(String),
    SaveCompleted,
    SaveFailed(String),
    ToggleRejected(String),
    DeleteCompleted,
    DeleteFailed(String),
}

/// Side effects requested by [`update`]; the runtime turns each into an
/// API call whose outcome comes back as another [`Action`].
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    LoadAll,
    Create(NewEmployee),
    SaveEdit { id: i32, patch: EmployeePatch },
    PushToggle { id: i32, patch: EmployeePatch },
    Delete(i32),
}

pub fn update(state: &mut AppState, action: Action) -> Vec<Command> {
    match action {
        Action::SearchChanged(term) => {
            state.search_term = term;
            clamp_selection(state);
            Vec::new()
        }
        Action::SelectionUp => {
            state.selected = state.selected.saturating_sub(1);
            Vec::new()
        }
        Action::SelectionDown => {
            let len = visible(&state.records, &state.search_term).len();
            if state.selected + 1 < len {
                state.selected += 1;
            }
            Vec::new()
        }
        Action::OpenNewForm => {
            state.form = FormData::default();
            state.editing_id = None;
            state.status = None;
            state.view = View::Form;
            Vec::new()
        }
        Action::OpenEditForm => {
            let current = selected_record(state).cloned();
            if let Some(record) = current {
                state.form = FormData {
                    full_name: record.full_name,
                    role: record.role,
                };
                state.editing_id = Some(record.id);
                state.status = None;
                state.view = View::Form;
            }
            Vec::new()
        }
        // Leaving the form keeps the draft and the editing target, so
        // reopening it picks up where the user stopped.
        Action::CancelForm => {
            state.view = View::List;
            Vec::new()
        }
        Action::SubmitForm { full_name, role } => {
            if state.view != View::Form || state.saving {
                return Vec::new();
            }
            state.form = FormData {
                full_name: full_name.clone(),
                role: role.clone(),
            };
            let full_name = full_name.trim().to_string();
            let role = role.trim().to_string();
            if full_name.is_empty() || role.is_empty() {
                state.status = Some("full name and role are required".to_string());
                return Vec::new();
            }
            state.saving = true;
            state.status = None;
            match state.editing_id {
                Some(id) => vec![Command::SaveEdit {
                    id,
                    patch: EmployeePatch {
                        full_name: Some(full_name),
                        role: Some(role),
                        is_active: None,
                    },
                }],
                None => vec![Command::Create(NewEmployee { full_name, role })],
            }
        }
        // Optimistic: flip the cached record right away and push the
        // change behind the user's back. A rejection comes back as
        // `ToggleRejected`, which reloads the authoritative state.
        Action::ToggleStatus => {
            if state.view != View::List {
                return Vec::new();
            }
            let Some(id) = selected_record(state).map(|record| record.id) else {
                return Vec::new();
            };
            let Some(record) = state.records.iter_mut().find(|record| record.id == id) else {
                return Vec::new();
            };
            record.is_active = !record.is_active;
            vec![Command::PushToggle {
                id,
                patch: EmployeePatch {
                    is_active: Some(record.is_active),
                    ..Default::default()
                },
            }]
        }
        Action::RequestDelete => {
            if state.view == View::List {
                let id = selected_record(state).map(|record| record.id);
                state.pending_delete = id;
            }
            Vec::new()
        }
        Action::ConfirmDelete => match state.pending_delete.take() {
            Some(id) => vec![Command::Delete(id)],
            None => Vec::new(),
        },
        Action::CancelDelete => {
            state.pending_delete = None;
            Vec::new()
        }
        Action::Refresh => {
            state.loading = true;
            vec![Command::LoadAll]
        }
        Action::Quit => {
            state.should_quit = true;
            Vec::new()
        }
        // Whatever the service sent replaces the cache wholesale; a
        // stale optimistic flip does not survive a reload, and neither
        // does a failure message the reload has already corrected.
        Action::RecordsLoaded(records) => {
            state.records = records;
            state.loading = false;
            state.status = None;
            clamp_selection(state);
            Vec::new()
        }
        Action::LoadFailed(message) => {
            state.loading = false;
            state.status = Some(format!("load failed: {message}"));
            Vec::new()
        }
        Action::SaveCompleted => {
            state.saving = false;
            state.form = FormData::default();
            state.editing_id = None;
            state.view = View::List;
            state.loading = true;
            vec![Command::LoadAll]
        }
        // A failed save keeps the form open with the draft intact.
        Action::SaveFailed(message) => {
            state.saving = false;
            state.status = Some(format!("save failed: {message}"));
            Vec::new()
        }
        Action::ToggleRejected(message) => {
            state.status = Some(format!("status update failed: {message}"));
            state.loading = true;
            vec![Command::LoadAll]
        }
        Action::DeleteCompleted => {
            state.loading = true;
            vec![Command::LoadAll]
        }
        Action::DeleteFailed(message) => {
            state.status = Some(format!("delete failed: {message}"));
            Vec::new()
        }
    }
}

/// Records whose name or role contains the term, case-insensitively.
/// An empty term matches everything.
pub fn visible<'a>(records: &'a [Employee], term: &str) -> Vec<&'a Employee> {
    let needle = term.to_lowercase();
    records
        .iter()
        .filter(|record| {
            record.full_name.to_lowercase().contains(&needle)
                || record.role.to_lowercase().contains(&needle)
        })
        .collect()
}

/// The record under the cursor, honoring the active filter.
pub fn selected_record(state: &AppState) -> Option<&Employee> {
    visible(&state.records, &state.search_term)
        .get(state.selected)
        .copied()
}

fn clamp_selection(state: &mut AppState) {
    let len = visible(&state.records, &state.search_term).len();
    if len == 0 {
        state.selected = 0;
    } else if state.selected >= len {
        state.selected = len - 1;
    }
}
