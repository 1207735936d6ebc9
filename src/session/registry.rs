use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuthClient, ProfileLoader, SessionStore};
use crate::backend::IdentityProvider;
use crate::events::EventBus;

/// How long a session may live before a token is issued for it.
const UNCLAIMED_TTL_MINUTES: i64 = 5;

/// One browser session: its identity handle and the store observing it.
#[derive(Clone)]
pub struct ClientSession {
    pub id: Uuid,
    pub client: AuthClient,
    pub store: Arc<SessionStore>,
}

struct Entry {
    session: ClientSession,
    expires_at: DateTime<Utc>,
}

/// Live client sessions keyed by the id carried in the session token.
///
/// A session lives until it is closed or until the expiry of the last token
/// issued for it, whichever comes first.
#[derive(Clone)]
pub struct SessionRegistry {
    provider: Arc<dyn IdentityProvider>,
    loader: ProfileLoader,
    events: EventBus,
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionRegistry {
    pub fn new(provider: Arc<dyn IdentityProvider>, loader: ProfileLoader, events: EventBus) -> Self {
        Self {
            provider,
            loader,
            events,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Client for one-off calls that do not belong to a session (sign-up,
    /// recovery requests).
    pub fn auth_client(&self) -> AuthClient {
        AuthClient::new(Arc::clone(&self.provider), self.events.clone())
    }

    /// Starts a new session: the store subscribes to its client before the
    /// initial session is resolved so no change is missed.
    pub async fn open(&self) -> ClientSession {
        let client = self.auth_client();
        let store = SessionStore::new(self.loader.clone());
        store.attach(client.on_auth_state_change());
        store.init(&client).await;

        let session = ClientSession {
            id: Uuid::new_v4(),
            client,
            store,
        };
        let entry = Entry {
            session: session.clone(),
            expires_at: Utc::now() + chrono::Duration::minutes(UNCLAIMED_TTL_MINUTES),
        };
        self.sessions.write().await.insert(session.id, entry);
        tracing::debug!(session_id = %session.id, "client session opened");
        session
    }

    /// Moves the expiry of a session to that of the token just issued for it.
    pub async fn extend(&self, id: Uuid, expires_at: DateTime<Utc>) -> bool {
        match self.sessions.write().await.get_mut(&id) {
            Some(entry) => {
                entry.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    /// The live session `id`; an expired one is closed on the way.
    pub async fn get(&self, id: Uuid) -> Option<ClientSession> {
        {
            let sessions = self.sessions.read().await;
            let entry = sessions.get(&id)?;
            if entry.expires_at > Utc::now() {
                return Some(entry.session.clone());
            }
        }

        self.close(id).await;
        None
    }

    /// Tears the session down; returns whether it existed.
    pub async fn close(&self, id: Uuid) -> bool {
        let Some(entry) = self.sessions.write().await.remove(&id) else {
            return false;
        };
        entry.session.store.teardown();
        tracing::debug!(session_id = %id, "client session closed");
        true
    }

    /// Closes every session whose expiry is not after `now`; returns how many.
    pub async fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<Entry> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, entry)| entry.expires_at <= now)
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for entry in &expired {
            entry.session.store.teardown();
        }
        if !expired.is_empty() {
            tracing::info!(evicted = expired.len(), "expired client sessions closed");
        }
        expired.len()
    }

    /// Periodically evicts expired sessions. Runs for the life of the process.
    pub async fn sweep_expired(self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            self.evict_expired(Utc::now()).await;
        }
    }

    /// Refetches the profile in every session signed in as `principal_id` and
    /// waits (bounded) for each to settle; returns how many were reloaded.
    /// Used after the profile changed outside the session, so guards do not
    /// keep judging a stale copy.
    pub async fn reload_profiles(&self, principal_id: Uuid, timeout: Duration) -> usize {
        let stores: Vec<Arc<SessionStore>> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|entry| entry.session.store.current_principal().map(|p| p.id) == Some(principal_id))
            .map(|entry| Arc::clone(&entry.session.store))
            .collect();

        for store in &stores {
            if let Some(load) = store.load_profile(Some(principal_id)) {
                if tokio::time::timeout(timeout, load).await.is_err() {
                    tracing::warn!(principal_id = %principal_id, "profile reload still running after timeout");
                }
            }
        }
        stores.len()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
