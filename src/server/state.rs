//! Shared state across all handlers.

use std::sync::Arc;

use crate::Narrator;

#[derive(Clone)]
pub struct AppState {
    pub narrator: Arc<Narrator>,
}

impl AppState {
    pub fn new(narrator: Arc<Narrator>) -> Self {
        Self { narrator }
    }
}
