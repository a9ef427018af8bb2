//! Terminal client for the staff directory service.
//!
//! The crate is split along the same lines as the screens it renders:
//! [`api`] talks to the HTTP service, [`state`] owns every state
//! transition as a pure function, [`app`] wires terminal events to
//! state transitions, and [`ui`] draws the current state.

pub mod api;
pub mod app;
pub mod state;
pub mod ui;
