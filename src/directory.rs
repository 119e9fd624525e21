//! Actor directory collaborator.
//!
//! The engine only ever asks it one question: who is this actor and what
//! role do they hold? Identity issuance lives entirely outside the core.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::job::{Actor, Role};

/// Narrow seam for resolving actor ids to identities.
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    async fn resolve(&self, id: Uuid) -> Result<Option<Actor>, DatabaseError>;
}

/// Postgres-backed directory over the `actors` table.
pub struct PgActorDirectory {
    pool: deadpool_postgres::Pool,
}

impl PgActorDirectory {
    pub fn new(pool: deadpool_postgres::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActorDirectory for PgActorDirectory {
    async fn resolve(&self, id: Uuid) -> Result<Option<Actor>, DatabaseError> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt("SELECT id, role FROM actors WHERE id = $1", &[&id])
            .await?;

        match row {
            Some(row) => {
                let role_str: String = row.get("role");
                let role = Role::parse(&role_str).ok_or_else(|| {
                    DatabaseError::Serialization(format!("unknown actor role: {role_str}"))
                })?;
                Ok(Some(Actor { id: row.get("id"), role }))
            }
            None => Ok(None),
        }
    }
}

/// In-memory directory for tests and local runs.
#[derive(Default)]
pub struct MemoryDirectory {
    actors: Mutex<HashMap<Uuid, Actor>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, actor: Actor) {
        self.actors.lock().await.insert(actor.id, actor);
    }
}

#[async_trait]
impl ActorDirectory for MemoryDirectory {
    async fn resolve(&self, id: Uuid) -> Result<Option<Actor>, DatabaseError> {
        Ok(self.actors.lock().await.get(&id).copied())
    }
}
