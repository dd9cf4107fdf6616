//! Shared application state injected into handlers.

use crate::crypto::key_management::MasterKey;
use crate::db::DbPool;
use crate::jobs::scheduler::JobScheduler;
use crate::services::email_service::Mailer;
use crate::services::image_service::ImageStore;

/// Everything a handler needs, built once at startup and cloned per
/// request. All members are cheap clones (pool handles, Arc'd clients);
/// the master key and client configs are read-only for the process
/// lifetime.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub master_key: MasterKey,
    pub mailer: Mailer,
    pub images: ImageStore,
    pub scheduler: JobScheduler,
}
