//! Single owner of the client-side session state.
//!
//! The store wraps two persistence scopes behind one lock: the short-lived
//! access credential is held in memory only and dies with the process, while
//! the refresh credential and the cached user profile are written as JSON
//! files under the storage directory and survive restarts. A restarted
//! process therefore comes up with the durable pair loaded and no access
//! credential; the first protected call fails with 401 and is silently
//! refreshed.
//!
//! Every mutation that changes the durable scope emits a [`SessionEvent`] on
//! a broadcast channel so other consumers of the same store (sync tasks,
//! additional windows) can re-read state. Events carry no payload; receivers
//! re-fetch rather than trust a stale snapshot.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::models::{UserPatch, UserProfile};

/// Durable file holding the refresh credential
const CREDENTIAL_FILE: &str = "credential.json";

/// Durable file holding the cached user profile
const PROFILE_FILE: &str = "profile.json";

/// Capacity of the session event channel. Events are tiny and receivers
/// re-read state on lag, so a small buffer is enough.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Notification that the durable session scope changed. Receivers must
/// re-read the store; the event intentionally carries no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Credentials were written (login or refresh rotation)
    SessionUpdated,
    /// The cached user profile changed
    UserUpdated,
    /// The session was destroyed (logout or cascade)
    Cleared,
}

/// Snapshot of the session. The session counts as authenticated only when
/// all three fields are present; the access credential and user may each be
/// absent independently of the refresh credential.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub access: Option<String>,
    pub refresh: Option<String>,
    pub user: Option<UserProfile>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access.is_some() && self.refresh.is_some() && self.user.is_some()
    }
}

/// On-disk form of the refresh credential.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCredential {
    refresh_token: String,
    saved_at: DateTime<Utc>,
}

#[derive(Default)]
struct SessionState {
    access: Option<String>,
    refresh: Option<String>,
    user: Option<UserProfile>,
}

pub struct SessionStore {
    state: RwLock<SessionState>,
    storage_dir: PathBuf,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    /// Open the store, loading whatever durable state exists on disk.
    /// Unreadable files are treated as absent rather than fatal.
    pub fn new(storage_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&storage_dir)
            .with_context(|| format!("Failed to create storage dir {}", storage_dir.display()))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let store = Self {
            state: RwLock::new(SessionState::default()),
            storage_dir,
            events,
        };
        store.load_durable();
        Ok(store)
    }

    fn load_durable(&self) {
        let mut state = self.state.write();
        state.refresh = match self.read_json::<StoredCredential>(CREDENTIAL_FILE) {
            Ok(stored) => stored.map(|c| c.refresh_token),
            Err(err) => {
                warn!(error = %err, "Failed to load stored credential, treating as absent");
                None
            }
        };
        state.user = match self.read_json::<UserProfile>(PROFILE_FILE) {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "Failed to load cached profile, treating as absent");
                None
            }
        };
    }

    // ===== Reads =====

    pub fn snapshot(&self) -> Session {
        let state = self.state.read();
        Session {
            access: state.access.clone(),
            refresh: state.refresh.clone(),
            user: state.user.clone(),
        }
    }

    pub fn access_credential(&self) -> Option<String> {
        self.state.read().access.clone()
    }

    pub fn refresh_credential(&self) -> Option<String> {
        self.state.read().refresh.clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        let state = self.state.read();
        state.access.is_some() && state.refresh.is_some() && state.user.is_some()
    }

    /// Subscribe to durable-scope change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // ===== Mutations =====

    /// Populate the full session after a successful login. Writes all three
    /// fields under one lock and persists the durable pair.
    pub fn set_after_login(
        &self,
        access: String,
        refresh: String,
        user: UserProfile,
    ) -> Result<()> {
        let result = {
            let mut state = self.state.write();
            state.access = Some(access);
            state.refresh = Some(refresh.clone());
            state.user = Some(user.clone());
            self.write_credential(&refresh)
                .and_then(|_| self.write_json(PROFILE_FILE, &user))
        };
        self.emit(SessionEvent::SessionUpdated);
        result
    }

    /// Install a freshly minted access credential. The refresh credential is
    /// replaced only when the server rotated it; without rotation nothing
    /// durable changes and no event is emitted.
    pub fn set_after_refresh(&self, access: String, rotated_refresh: Option<String>) -> Result<()> {
        let (rotated, result) = {
            let mut state = self.state.write();
            state.access = Some(access);
            match rotated_refresh {
                Some(refresh) => {
                    state.refresh = Some(refresh.clone());
                    (true, self.write_credential(&refresh))
                }
                None => (false, Ok(())),
            }
        };
        if rotated {
            self.emit(SessionEvent::SessionUpdated);
        }
        result
    }

    /// Shallow-merge a partial update into the cached profile and re-persist.
    /// A missing cached profile makes this a no-op.
    pub fn merge_user(&self, patch: &UserPatch) -> Result<()> {
        let result = {
            let mut state = self.state.write();
            match state.user.as_mut() {
                Some(user) => {
                    patch.apply_to(user);
                    let user = user.clone();
                    self.write_json(PROFILE_FILE, &user)
                }
                None => {
                    warn!("merge_user called with no cached profile");
                    return Ok(());
                }
            }
        };
        self.emit(SessionEvent::UserUpdated);
        result
    }

    /// Destroy the session: all three fields and both durable files go away
    /// under one lock, so readers never observe partial state. Idempotent;
    /// a second clear changes nothing and emits nothing.
    pub fn clear(&self) -> Result<()> {
        let had_session = {
            let mut state = self.state.write();
            let had_session =
                state.access.is_some() || state.refresh.is_some() || state.user.is_some();
            state.access = None;
            state.refresh = None;
            state.user = None;
            self.remove_file(CREDENTIAL_FILE)?;
            self.remove_file(PROFILE_FILE)?;
            had_session
        };
        if had_session {
            self.emit(SessionEvent::Cleared);
        }
        Ok(())
    }

    // ===== Persistence plumbing =====

    fn emit(&self, event: SessionEvent) {
        debug!(?event, "session event");
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.storage_dir.join(name)
    }

    fn write_credential(&self, refresh_token: &str) -> Result<()> {
        self.write_json(
            CREDENTIAL_FILE,
            &StoredCredential {
                refresh_token: refresh_token.to_string(),
                saved_at: Utc::now(),
            },
        )
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.file_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", name))?;
        let value =
            serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", name))?;
        Ok(Some(value))
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let contents = serde_json::to_string_pretty(value)?;
        std::fs::write(self.file_path(name), contents)
            .with_context(|| format!("Failed to write {}", name))
    }

    fn remove_file(&self, name: &str) -> Result<()> {
        let path = self.file_path(name);
        if path.exists() {
            std::fs::remove_file(&path).with_context(|| format!("Failed to remove {}", name))?;
        }
        Ok(())
    }
}
