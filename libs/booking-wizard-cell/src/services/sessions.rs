// libs/booking-wizard-cell/src/services/sessions.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{interval, Duration};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::WizardError;
use crate::models::WizardSession;

/// Sessions untouched for this long are dropped by the sweeper.
const IDLE_SESSION_TTL_MINUTES: i64 = 30;
/// How often the sweeper runs.
const SWEEP_INTERVAL_SECS: u64 = 300;

/// In-memory registry of live wizard sessions, keyed by session id.
///
/// Each session sits behind its own async mutex, so independent sessions
/// never contend while operations on one session serialize their
/// mutate/issue/settle phases. Lookups verify the caller owns the session
/// and answer `SessionNotFound` otherwise, so foreign ids do not even leak
/// existence.
pub struct WizardSessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<WizardSession>>>>,
}

impl WizardSessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a freshly opened session and hands back its handle.
    pub async fn insert(&self, session: WizardSession) -> Arc<Mutex<WizardSession>> {
        let id = session.id;
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, Arc::clone(&handle));
        debug!("Registered wizard session {}", id);
        handle
    }

    /// Looks up a session on behalf of its owner.
    pub async fn get(
        &self,
        id: Uuid,
        owner: &str,
    ) -> Result<Arc<Mutex<WizardSession>>, WizardError> {
        let handle = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(WizardError::SessionNotFound)?;

        let session = handle.lock().await;
        if session.owner != owner {
            return Err(WizardError::SessionNotFound);
        }
        drop(session);

        Ok(handle)
    }

    /// Unregisters a session, returning its handle for a final read.
    pub async fn remove(
        &self,
        id: Uuid,
        owner: &str,
    ) -> Result<Arc<Mutex<WizardSession>>, WizardError> {
        let handle = self.get(id, owner).await?;
        self.sessions.write().await.remove(&id);
        debug!("Removed wizard session {}", id);
        Ok(handle)
    }

    /// Drops every session whose `updated_at` is older than `max_idle`.
    /// A session whose lock is held is in active use and is skipped this
    /// round. Returns how many sessions were dropped.
    pub async fn sweep_idle(&self, max_idle: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self.sessions.write().await;

        let expired: Vec<Uuid> = sessions
            .iter()
            .filter_map(|(id, handle)| match handle.try_lock() {
                Ok(session) if session.updated_at < cutoff => Some(*id),
                _ => None,
            })
            .collect();

        for id in &expired {
            sessions.remove(id);
            debug!("Swept idle wizard session {}", id);
        }
        expired.len()
    }

    /// Periodic sweep of sessions abandoned without an explicit close.
    /// Spawned once by the binary; runs for the life of the process.
    pub async fn sweep_loop(self: Arc<Self>) {
        let mut tick = interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        loop {
            tick.tick().await;
            let swept = self
                .sweep_idle(chrono::Duration::minutes(IDLE_SESSION_TTL_MINUTES))
                .await;
            if swept > 0 {
                info!("Swept {} idle wizard sessions", swept);
            }
        }
    }

    /// Number of live sessions, for the service banner.
    pub async fn live_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for WizardSessionStore {
    fn default() -> Self {
        Self::new()
    }
}
