//! Store layer: one trait per aggregate, backed by PostgreSQL or memory.

use sqlx::PgPool;
use std::sync::Arc;

pub mod class;
pub mod memory;
pub mod redemption;
pub mod session;
pub mod user;

pub use class::{ClassRepositoryTrait, PgClassRepository};
pub use memory::MemoryStore;
pub use redemption::{PgRedemptionRepository, RedemptionRepositoryTrait};
pub use session::{PgSessionRepository, SessionRepositoryTrait};
pub use user::{PgUserRepository, UserRepositoryTrait};

/// Trait objects for every repository, shared by services and handlers.
#[derive(Clone)]
pub struct Repositories {
    pub sessions: Arc<dyn SessionRepositoryTrait>,
    pub redemptions: Arc<dyn RedemptionRepositoryTrait>,
    pub users: Arc<dyn UserRepositoryTrait>,
    pub classes: Arc<dyn ClassRepositoryTrait>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            sessions: Arc::new(PgSessionRepository::new(pool.clone())),
            redemptions: Arc::new(PgRedemptionRepository::new(pool.clone())),
            users: Arc::new(PgUserRepository::new(pool.clone())),
            classes: Arc::new(PgClassRepository::new(pool)),
        }
    }

    /// All four traits served by one shared [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::from_memory(MemoryStore::new())
    }

    pub fn from_memory(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            sessions: store.clone(),
            redemptions: store.clone(),
            users: store.clone(),
            classes: store,
        }
    }
}
