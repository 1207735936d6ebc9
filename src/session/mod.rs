//! Session Store: who is signed in on one client, and their profile.
//!
//! Every session-affecting event bumps a generation counter. A profile load
//! remembers the generation it was started for and its result is dropped if
//! the session moved on in the meantime (sign-out, another sign-in).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::principal::Principal;
use crate::models::profile::Profile;

pub mod client;
pub mod loader;
pub mod registry;

pub use client::{AuthClient, AuthEventKind, AuthStateChange, Subscription};
pub use loader::{LoadState, ProfileError, ProfileLoader, RetryPolicy};
pub use registry::{ClientSession, SessionRegistry};

/// Point-in-time view of a session, the only input of access decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub principal: Option<Principal>,
    pub profile: Option<Profile>,
    /// True while the session or its profile is being resolved.
    pub loading: bool,
    pub load: LoadState,
    generation: u64,
}

impl SessionSnapshot {
    /// Snapshot of a settled session, mostly useful to evaluate decisions.
    pub fn settled(principal: Option<Principal>, profile: Option<Profile>) -> Self {
        let load = if profile.is_some() { LoadState::Resolved } else { LoadState::Idle };
        Self {
            principal,
            profile,
            loading: false,
            load,
            generation: 0,
        }
    }

    pub fn loading(principal: Option<Principal>) -> Self {
        Self {
            principal,
            loading: true,
            ..Default::default()
        }
    }

    pub fn with_load(mut self, load: LoadState) -> Self {
        self.load = load;
        self
    }

    pub fn principal_id(&self) -> Option<Uuid> {
        self.principal.as_ref().map(|p| p.id)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Serializable view returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub principal: Option<Principal>,
    pub profile: Option<Profile>,
    pub loading: bool,
    #[schema(example = "/panel")]
    pub landing: String,
}

impl From<&SessionSnapshot> for SessionView {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            principal: snapshot.principal.clone(),
            profile: snapshot.profile.clone(),
            loading: snapshot.loading,
            landing: crate::access::landing_route(snapshot).path().to_string(),
        }
    }
}

pub struct SessionStore {
    state: watch::Sender<SessionSnapshot>,
    loader: ProfileLoader,
    inflight: Mutex<Option<AbortHandle>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    /// A fresh store is loading until `init` resolves the initial session.
    pub fn new(loader: ProfileLoader) -> Arc<Self> {
        let (state, _) = watch::channel(SessionSnapshot::loading(None));
        Arc::new(Self {
            state,
            loader,
            inflight: Mutex::new(None),
            listener: Mutex::new(None),
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn current_principal(&self) -> Option<Principal> {
        self.state.borrow().principal.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Resolves the initial session. A failing lookup is treated as signed out.
    pub async fn init(self: &Arc<Self>, client: &AuthClient) -> Option<JoinHandle<()>> {
        let principal = match client.get_session().await {
            Ok(principal) => principal,
            Err(err) => {
                tracing::error!("Error fetching session: {}", err);
                None
            }
        };
        self.on_auth_event(AuthStateChange::new(AuthEventKind::InitialSession, principal))
    }

    /// Feeds every change published on `subscription` into the store until the
    /// client goes away or the store is torn down.
    pub fn attach(self: &Arc<Self>, mut subscription: Subscription) {
        let store = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(change) = subscription.recv().await {
                let Some(store) = store.upgrade() else { break };
                store.on_auth_event(change);
            }
        });

        if let Some(previous) = self.lock_listener().replace(handle) {
            previous.abort();
        }
    }

    /// Applies an auth event. Returns the profile load it started, if any.
    pub fn on_auth_event(self: &Arc<Self>, change: AuthStateChange) -> Option<JoinHandle<()>> {
        tracing::debug!(
            kind = ?change.kind,
            principal_id = ?change.principal.as_ref().map(|p| p.id),
            "auth state change"
        );

        let principal = match change.kind {
            AuthEventKind::SignedOut => None,
            _ => change.principal,
        };
        let principal_id = principal.as_ref().map(|p| p.id);

        let mut generation = 0;
        self.state.send_modify(|s| {
            s.generation += 1;
            generation = s.generation;
            s.principal = principal;
            s.profile = None;
            s.load = LoadState::Idle;
            s.loading = principal_id.is_some();
        });

        self.cancel_inflight();
        principal_id.map(|id| self.spawn_load(generation, id))
    }

    /// Reloads the profile of the current principal; clears it when there is none.
    pub fn load_profile(self: &Arc<Self>, principal_id: Option<Uuid>) -> Option<JoinHandle<()>> {
        let Some(principal_id) = principal_id else {
            self.state.send_modify(|s| {
                s.generation += 1;
                s.profile = None;
                s.load = LoadState::Idle;
                s.loading = false;
            });
            self.cancel_inflight();
            return None;
        };

        let mut generation = None;
        self.state.send_if_modified(|s| {
            if s.principal_id() != Some(principal_id) {
                return false;
            }
            s.generation += 1;
            generation = Some(s.generation);
            s.loading = true;
            true
        });

        let generation = generation?;
        self.cancel_inflight();
        Some(self.spawn_load(generation, principal_id))
    }

    fn spawn_load(self: &Arc<Self>, generation: u64, principal_id: Uuid) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let progress = Arc::clone(&store);
            let outcome = store
                .loader
                .load(principal_id, move |load| {
                    progress.apply(generation, principal_id, |s| s.load = load);
                })
                .await;

            store.apply(generation, principal_id, |s| {
                match outcome {
                    Ok(profile) => {
                        s.profile = Some(profile);
                        s.load = LoadState::Resolved;
                    }
                    Err(err) => {
                        s.profile = None;
                        s.load = LoadState::Failed(err);
                    }
                }
                s.loading = false;
            });
        });

        *self.lock_inflight() = Some(handle.abort_handle());
        handle
    }

    /// Mutates state only if it still belongs to `generation` and `principal_id`.
    fn apply(&self, generation: u64, principal_id: Uuid, update: impl FnOnce(&mut SessionSnapshot)) -> bool {
        let applied = self.state.send_if_modified(|s| {
            if s.generation != generation || s.principal_id() != Some(principal_id) {
                return false;
            }
            update(s);
            true
        });

        if !applied {
            tracing::debug!(principal_id = %principal_id, generation, "discarding stale profile result");
        }
        applied
    }

    /// Waits until the store is not loading, optionally for a specific
    /// principal, and returns the snapshot at that point. Gives up after
    /// `timeout` and returns whatever is current.
    pub async fn settled(&self, expect: Option<Uuid>, timeout: Duration) -> SessionSnapshot {
        self.settled_since(0, expect, timeout).await
    }

    /// Like `settled`, but ignores snapshots from `generation` or earlier, so a
    /// caller that just triggered an auth event does not read the state from
    /// before it.
    pub async fn settled_since(&self, generation: u64, expect: Option<Uuid>, timeout: Duration) -> SessionSnapshot {
        let mut rx = self.state.subscribe();
        let wait = rx.wait_for(|s| {
            s.generation > generation && !s.loading && (expect.is_none() || s.principal_id() == expect)
        });

        let snapshot = match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(snapshot)) => snapshot.clone(),
            _ => self.snapshot(),
        };
        snapshot
    }

    /// Clears the session and stops background work.
    pub fn teardown(&self) {
        self.state.send_modify(|s| {
            s.generation += 1;
            s.principal = None;
            s.profile = None;
            s.load = LoadState::Idle;
            s.loading = false;
        });
        self.cancel_inflight();
        if let Some(listener) = self.lock_listener().take() {
            listener.abort();
        }
    }

    fn cancel_inflight(&self) {
        if let Some(previous) = self.lock_inflight().take() {
            previous.abort();
        }
    }

    fn lock_inflight(&self) -> std::sync::MutexGuard<'_, Option<AbortHandle>> {
        self.inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_listener(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.listener.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::client::testing::OneUser;
    use super::loader::testing::*;
    use super::*;
    use crate::events::init_event_bus;
    use crate::models::profile::{AccountStatus, Role};
    use chrono::Utc;
    use tokio::sync::Notify;

    const SETTLE: Duration = Duration::from_secs(2);

    fn principal() -> Principal {
        Principal::new(Uuid::new_v4(), "ada@example.com").verified_at(Utc::now())
    }

    fn store_with(source: Arc<dyn crate::backend::ProfileSource>, policy: RetryPolicy) -> Arc<SessionStore> {
        let (bus, _rx) = init_event_bus();
        SessionStore::new(ProfileLoader::new(source, bus, policy))
    }

    #[tokio::test]
    async fn starts_loading_and_init_without_credential_settles_signed_out() {
        let principal = principal();
        let (bus, _rx) = init_event_bus();
        let client = AuthClient::new(Arc::new(OneUser { principal }), bus);
        let store = store_with(Arc::new(ScriptedSource::default()), RetryPolicy::default());

        assert!(store.is_loading());
        assert!(store.init(&client).await.is_none());

        let snapshot = store.snapshot();
        assert!(!snapshot.loading);
        assert!(snapshot.principal.is_none());
        assert!(snapshot.profile.is_none());
    }

    #[tokio::test]
    async fn sign_in_through_attached_client_loads_profile() {
        let principal = principal();
        let profile = profile_for(principal.id, Role::Member, AccountStatus::Active);
        let (bus, _rx) = init_event_bus();
        let client = AuthClient::new(Arc::new(OneUser { principal: principal.clone() }), bus);
        let store = store_with(
            Arc::new(ScriptedSource::new(vec![Reply::Found(profile.clone())])),
            RetryPolicy::default(),
        );
        store.attach(client.on_auth_state_change());
        store.init(&client).await;

        client.sign_in_with_password("ada@example.com", "secret123").await.unwrap();
        let snapshot = store.settled(Some(principal.id), SETTLE).await;

        assert_eq!(snapshot.principal, Some(principal));
        assert_eq!(snapshot.profile, Some(profile));
        assert_eq!(snapshot.load, LoadState::Resolved);
        assert!(!snapshot.loading);
    }

    #[tokio::test]
    async fn stays_loading_through_retries() {
        let principal = principal();
        let profile = profile_for(principal.id, Role::Member, AccountStatus::Active);
        let source = Arc::new(ScriptedSource::new(vec![
            Reply::NotFound,
            Reply::NotFound,
            Reply::Found(profile.clone()),
        ]));
        let store = store_with(source.clone(), RetryPolicy::new(5, Duration::from_millis(20)));
        let mut rx = store.watch();

        store.on_auth_event(AuthStateChange::new(AuthEventKind::SignedIn, Some(principal.clone())));

        let retrying = rx
            .wait_for(|s| matches!(s.load, LoadState::RetryScheduled { .. }))
            .await
            .unwrap()
            .clone();
        assert!(retrying.loading);
        assert!(retrying.profile.is_none());

        let snapshot = store.settled(Some(principal.id), SETTLE).await;
        assert_eq!(snapshot.profile, Some(profile));
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_end_in_failed_state() {
        let principal = principal();
        let store = store_with(
            Arc::new(ScriptedSource::default()),
            RetryPolicy::new(2, Duration::from_millis(5)),
        );

        let load = store
            .on_auth_event(AuthStateChange::new(AuthEventKind::SignedIn, Some(principal.clone())))
            .unwrap();
        load.await.unwrap();

        let snapshot = store.snapshot();
        assert!(!snapshot.loading);
        assert!(snapshot.profile.is_none());
        assert_eq!(snapshot.load, LoadState::Failed(ProfileError::Missing { attempts: 2 }));
        assert_eq!(snapshot.principal, Some(principal));
    }

    #[tokio::test]
    async fn sign_out_during_fetch_discards_late_result() {
        let principal = principal();
        let source = Arc::new(GatedSource {
            gate: Notify::new(),
            profile: profile_for(principal.id, Role::Admin, AccountStatus::Active),
        });
        let store = store_with(source.clone(), RetryPolicy::default());

        let load = store
            .on_auth_event(AuthStateChange::new(AuthEventKind::SignedIn, Some(principal)))
            .unwrap();
        assert!(store.is_loading());

        assert!(store.on_auth_event(AuthStateChange::new(AuthEventKind::SignedOut, None)).is_none());
        source.gate.notify_one();
        assert!(load.await.unwrap_err().is_cancelled());

        let snapshot = store.snapshot();
        assert!(snapshot.principal.is_none());
        assert!(snapshot.profile.is_none());
        assert!(!snapshot.loading);
    }

    #[tokio::test]
    async fn stale_generation_is_not_applied() {
        let principal = principal();
        let store = store_with(Arc::new(ScriptedSource::default()), RetryPolicy::new(1, Duration::ZERO));

        store.on_auth_event(AuthStateChange::new(AuthEventKind::SignedIn, Some(principal.clone())));
        let stale = store.snapshot().generation();
        store.on_auth_event(AuthStateChange::new(AuthEventKind::TokenRefreshed, Some(principal.clone())));

        let profile = profile_for(principal.id, Role::Member, AccountStatus::Active);
        assert!(!store.apply(stale, principal.id, |s| s.profile = Some(profile)));
        assert!(store.snapshot().profile.is_none());
    }

    #[tokio::test]
    async fn switching_principals_replaces_profile() {
        let first = principal();
        let second = Principal::new(Uuid::new_v4(), "grace@example.com");
        let second_profile = profile_for(second.id, Role::Member, AccountStatus::Suspended);
        let source = Arc::new(GatedSource {
            gate: Notify::new(),
            profile: second_profile.clone(),
        });
        let store = store_with(source.clone(), RetryPolicy::default());

        let first_load = store
            .on_auth_event(AuthStateChange::new(AuthEventKind::SignedIn, Some(first)))
            .unwrap();
        let second_load = store
            .on_auth_event(AuthStateChange::new(AuthEventKind::SignedIn, Some(second.clone())))
            .unwrap();
        source.gate.notify_one();

        assert!(first_load.await.unwrap_err().is_cancelled());
        second_load.await.unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.principal, Some(second));
        assert_eq!(snapshot.profile, Some(second_profile));
    }

    #[tokio::test]
    async fn settled_since_skips_the_previous_generation() {
        let principal = principal();
        let profile = profile_for(principal.id, Role::Member, AccountStatus::Active);
        let store = store_with(
            Arc::new(ScriptedSource::new(vec![Reply::Found(profile.clone()), Reply::Found(profile)])),
            RetryPolicy::default(),
        );
        store.on_auth_event(AuthStateChange::new(AuthEventKind::SignedIn, Some(principal.clone())));
        let before = store.settled(Some(principal.id), SETTLE).await.generation();

        let pending = store.settled_since(before, Some(principal.id), Duration::from_millis(20)).await;
        assert_eq!(pending.generation(), before);

        store.on_auth_event(AuthStateChange::new(AuthEventKind::TokenRefreshed, Some(principal.clone())));
        let refreshed = store.settled_since(before, Some(principal.id), SETTLE).await;
        assert!(refreshed.generation() > before);
        assert!(refreshed.profile.is_some());
    }

    #[tokio::test]
    async fn teardown_clears_everything() {
        let principal = principal();
        let source = Arc::new(GatedSource {
            gate: Notify::new(),
            profile: profile_for(principal.id, Role::Member, AccountStatus::Active),
        });
        let store = store_with(source, RetryPolicy::default());
        let load = store
            .on_auth_event(AuthStateChange::new(AuthEventKind::SignedIn, Some(principal)))
            .unwrap();

        store.teardown();

        assert!(load.await.unwrap_err().is_cancelled());
        assert_eq!(store.snapshot().principal, None);
        assert!(!store.is_loading());
    }
}
