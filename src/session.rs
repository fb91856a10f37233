//! Identity session: mirrors the external auth provider's state.
//!
//! Two producers feed one state machine: the provider's push stream of
//! auth-state changes, and a single explicit "get current session" pull done
//! at startup so the UI is not stuck loading until the first stream event.
//! A stream event always supersedes the initial pull; between events of the
//! same producer, the newer timestamp wins.
//!
//! The session is an explicit object threaded through call sites; there is
//! no process-global singleton. Components read it through a watch channel.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::traits::Principal;

/// An authenticated principal plus its session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub principal: Principal,
    pub access_token: String,
}

/// An auth-state change: the new session (None on sign-out or expiry) and
/// when the producer observed it.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub session: Option<AuthSession>,
    pub at: DateTime<Utc>,
}

/// What observers see: the current session, and whether the startup read is
/// still outstanding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session: Option<AuthSession>,
    pub loading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Producer {
    InitialPull,
    Stream,
}

struct Applied {
    producer: Producer,
    at: DateTime<Utc>,
}

pub struct IdentitySession {
    tx: watch::Sender<SessionSnapshot>,
    applied: Mutex<Option<Applied>>,
    auth: AuthConfig,
}

impl IdentitySession {
    pub fn new(auth: AuthConfig) -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot {
            session: None,
            loading: true,
        });
        Self {
            tx,
            applied: Mutex::new(None),
            auth,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.tx.borrow().session.clone()
    }

    pub fn current_principal(&self) -> Option<Principal> {
        self.tx.borrow().session.as_ref().map(|s| s.principal.clone())
    }

    /// Apply the one-off startup read. Ignored once any stream event has
    /// been applied, or when an already-applied pull is newer.
    pub fn apply_initial_pull(&self, event: AuthEvent) {
        self.apply(Producer::InitialPull, event);
    }

    /// Apply a pushed auth-state change. Supersedes the initial pull
    /// unconditionally; between stream events the newer timestamp wins.
    pub fn apply_stream_event(&self, event: AuthEvent) {
        self.apply(Producer::Stream, event);
    }

    fn apply(&self, producer: Producer, event: AuthEvent) {
        let mut applied = self.applied.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = applied.as_ref() {
            let superseded = match (prev.producer, producer) {
                // The stream is authoritative once it has spoken.
                (Producer::Stream, Producer::InitialPull) => true,
                (Producer::InitialPull, Producer::Stream) => false,
                _ => event.at < prev.at,
            };
            if superseded {
                debug!(?producer, "Ignoring superseded auth update");
                return;
            }
        }
        *applied = Some(Applied {
            producer,
            at: event.at,
        });
        drop(applied);

        let signed_in = event.session.is_some();
        self.tx.send_replace(SessionSnapshot {
            session: event.session,
            loading: false,
        });
        info!(?producer, signed_in, "Auth state updated");
    }

    /// Spawn the listener that mirrors provider stream events into this
    /// session. Dropping the returned guard detaches the listener.
    pub fn attach_stream(self: &Arc<Self>, mut rx: mpsc::Receiver<AuthEvent>) -> StreamGuard {
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                session.apply_stream_event(event);
            }
            debug!("Auth stream closed");
        });
        StreamGuard { handle }
    }

    /// Build the external OAuth redirect URL. Sign-in resolves through the
    /// auth stream, never through this call's return value.
    pub fn sign_in_url(&self) -> anyhow::Result<String> {
        if self.auth.authorize_url.is_empty() {
            anyhow::bail!("auth.authorize_url is not configured");
        }
        Ok(format!(
            "{}?provider={}&redirect_to={}",
            self.auth.authorize_url,
            self.auth.provider,
            urlencoded(&self.auth.redirect_origin)
        ))
    }

    /// Ask the provider to end the session. Local state is only cleared by
    /// the resulting stream event, not here.
    pub async fn sign_out(&self, client: &reqwest::Client, logout_url: &str) -> anyhow::Result<()> {
        let Some(session) = self.current() else {
            anyhow::bail!("no active session");
        };
        let resp = client
            .post(logout_url)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("sign-out failed with status {}", resp.status());
        }
        Ok(())
    }
}

/// Detaches the stream listener when the owning scope is destroyed.
pub struct StreamGuard {
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Simple URL-encoding for query parameter values.
fn urlencoded(s: &str) -> String {
    let mut result = String::with_capacity(s.len() * 2);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_session(id: &str) -> AuthSession {
        AuthSession {
            principal: Principal {
                id: id.to_string(),
                email: format!("{}@example.com", id),
                display_name: id.to_string(),
            },
            access_token: format!("token-{}", id),
        }
    }

    fn auth_config() -> AuthConfig {
        AuthConfig {
            authorize_url: "https://auth.example.com/authorize".to_string(),
            provider: "google".to_string(),
            redirect_origin: "http://localhost:3000".to_string(),
        }
    }

    #[test]
    fn starts_loading_with_no_session() {
        let session = IdentitySession::new(auth_config());
        let snap = session.subscribe().borrow().clone();
        assert!(snap.loading);
        assert!(snap.session.is_none());
    }

    #[test]
    fn initial_pull_resolves_loading() {
        let session = IdentitySession::new(auth_config());
        session.apply_initial_pull(AuthEvent {
            session: Some(make_session("u1")),
            at: Utc::now(),
        });
        let snap = session.subscribe().borrow().clone();
        assert!(!snap.loading);
        assert_eq!(session.current_principal().unwrap().id, "u1");
    }

    #[test]
    fn stream_event_supersedes_later_initial_pull() {
        let session = IdentitySession::new(auth_config());
        let now = Utc::now();
        session.apply_stream_event(AuthEvent {
            session: Some(make_session("stream-user")),
            at: now,
        });
        // The pull resolves afterwards with a newer timestamp, but the
        // stream has already spoken.
        session.apply_initial_pull(AuthEvent {
            session: None,
            at: now + Duration::seconds(5),
        });
        assert_eq!(session.current_principal().unwrap().id, "stream-user");
    }

    #[test]
    fn stream_event_replaces_earlier_initial_pull() {
        let session = IdentitySession::new(auth_config());
        let now = Utc::now();
        session.apply_initial_pull(AuthEvent {
            session: Some(make_session("pulled")),
            at: now,
        });
        session.apply_stream_event(AuthEvent {
            session: None,
            at: now - Duration::seconds(5),
        });
        // Sign-out from the stream wins even with an older timestamp.
        assert!(session.current().is_none());
        assert!(!session.subscribe().borrow().loading);
    }

    #[test]
    fn stale_stream_event_is_ignored() {
        let session = IdentitySession::new(auth_config());
        let now = Utc::now();
        session.apply_stream_event(AuthEvent {
            session: Some(make_session("newer")),
            at: now,
        });
        session.apply_stream_event(AuthEvent {
            session: Some(make_session("older")),
            at: now - Duration::seconds(10),
        });
        assert_eq!(session.current_principal().unwrap().id, "newer");
    }

    #[tokio::test]
    async fn attach_stream_mirrors_events() {
        let session = Arc::new(IdentitySession::new(auth_config()));
        let (tx, rx) = mpsc::channel(4);
        let _guard = session.attach_stream(rx);

        let mut watcher = session.subscribe();
        tx.send(AuthEvent {
            session: Some(make_session("u1")),
            at: Utc::now(),
        })
        .await
        .unwrap();

        watcher.changed().await.unwrap();
        assert_eq!(session.current_principal().unwrap().id, "u1");
    }

    #[tokio::test]
    async fn dropping_the_guard_detaches_the_listener() {
        let session = Arc::new(IdentitySession::new(auth_config()));
        let (tx, rx) = mpsc::channel(4);
        let guard = session.attach_stream(rx);
        drop(guard);
        // Give the abort a chance to land, then verify events no longer flow.
        tokio::task::yield_now().await;
        let _ = tx
            .send(AuthEvent {
                session: Some(make_session("u1")),
                at: Utc::now(),
            })
            .await;
        tokio::task::yield_now().await;
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn sign_out_without_session_is_refused() {
        let session = IdentitySession::new(auth_config());
        let client = reqwest::Client::new();
        let err = session
            .sign_out(&client, "http://localhost:1/logout")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no active session"));
    }

    #[test]
    fn sign_in_url_encodes_the_redirect_origin() {
        let session = IdentitySession::new(auth_config());
        assert_eq!(
            session.sign_in_url().unwrap(),
            "https://auth.example.com/authorize?provider=google&redirect_to=http%3A%2F%2Flocalhost%3A3000"
        );
    }

    #[test]
    fn sign_in_url_requires_configuration() {
        let session = IdentitySession::new(AuthConfig::default());
        assert!(session.sign_in_url().is_err());
    }
}
