use std::sync::Arc;

use crate::database::RoutineExecutor;
use crate::middleware::CookieSettings;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<dyn RoutineExecutor>,
    pub cookies: CookieSettings,
}

impl AppState {
    pub fn new(executor: Arc<dyn RoutineExecutor>, cookies: CookieSettings) -> Self {
        Self { executor, cookies }
    }
}
