use std::sync::{Arc, Mutex, MutexGuard};

use notaria_ai::GeminiClient;
use notaria_core::{Integration, ServiceName, Settings};
use notaria_store::{Media, Store};

use crate::AppError;
use crate::session::Sessions;

/// Shared application state. The store sits behind one mutex; handlers
/// take it in short blocks and never across an `.await`.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<Store>>,
    pub media: Media,
    pub settings: Arc<Settings>,
    pub sessions: Sessions,
}

impl AppState {
    pub fn new(store: Store, media: Media, settings: Settings) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            media,
            settings: Arc::new(settings),
            sessions: Sessions::default(),
        }
    }

    pub fn db(&self) -> Result<MutexGuard<'_, Store>, AppError> {
        self.store.lock().map_err(|_| AppError::Poisoned)
    }

    pub fn gemini(&self) -> Result<GeminiClient, AppError> {
        Ok(GeminiClient::new(&self.settings.gemini, self.settings.http_timeout)?)
    }

    /// The integration row for `service`, if configured.
    pub fn integration(&self, service: ServiceName) -> Result<Option<Integration>, AppError> {
        Ok(self.db()?.integration_for(service)?)
    }
}
