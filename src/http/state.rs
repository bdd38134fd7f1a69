use std::sync::Arc;

use crate::session::Session;

/// Shared application state for HTTP handlers.
///
/// Exactly one session exists per control surface; the handlers toggle it
/// rather than creating new ones.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
}

impl AppState {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}
