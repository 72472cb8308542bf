//! Authenticated secret store connection that renews its token on expiry.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use topicseal_keys::{Clock, KeyError, SecretReader, SecretResponse, SystemClock};
use tracing::{debug, info};

use crate::auth::VaultAuth;
use crate::error::VaultError;
use crate::session::{LoginGrant, SecretStoreSession};

/// Token in use and when it stops being valid.
#[derive(Clone)]
struct Lease {
    token: String,
    /// `None` never expires.
    expires_at: Option<DateTime<Utc>>,
    renewable: bool,
}

impl Lease {
    fn permanent(token: String) -> Self {
        Self {
            token,
            expires_at: None,
            renewable: false,
        }
    }

    fn from_grant(grant: LoginGrant, now: DateTime<Utc>) -> Self {
        let expires_at = if grant.lease_duration.is_zero() {
            None
        } else {
            Some(
                chrono::Duration::from_std(grant.lease_duration)
                    .ok()
                    .and_then(|d| now.checked_add_signed(d))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            )
        };
        Self {
            token: grant.client_token,
            expires_at,
            renewable: grant.renewable,
        }
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// [`SecretReader`] over a [`SecretStoreSession`].
///
/// Every read first checks the current lease. An expired app-role lease is
/// replaced by logging in again, synchronously, before the read goes out.
/// Static tokens are never renewed.
pub struct TokenRenewingConnection<S> {
    session: S,
    auth: VaultAuth,
    clock: Arc<dyn Clock>,
    lease: Mutex<Lease>,
}

impl<S> fmt::Debug for TokenRenewingConnection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lease = self.lease.lock();
        f.debug_struct("TokenRenewingConnection")
            .field("auth", &self.auth)
            .field("expires_at", &lease.expires_at)
            .field("renewable", &lease.renewable)
            .finish()
    }
}

impl<S: SecretStoreSession> TokenRenewingConnection<S> {
    /// Authenticate and return a ready connection.
    pub fn connect(session: S, auth: VaultAuth) -> Result<Self, VaultError> {
        Self::connect_with_clock(session, auth, Arc::new(SystemClock))
    }

    pub fn connect_with_clock(
        session: S,
        auth: VaultAuth,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, VaultError> {
        let lease = match &auth {
            VaultAuth::Token(token) => Lease::permanent(token.clone()),
            VaultAuth::AppRole { role_id, secret_id } => {
                let grant = session.login_app_role(role_id, secret_id)?;
                let lease = Lease::from_grant(grant, clock.now());
                debug!(expires_at = ?lease.expires_at, renewable = lease.renewable, "logged in with app role");
                lease
            }
        };
        Ok(Self {
            session,
            auth,
            clock,
            lease: Mutex::new(lease),
        })
    }

    /// Underlying session.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// When the current token expires, `None` if it never does.
    pub fn lease_expires_at(&self) -> Option<DateTime<Utc>> {
        self.lease.lock().expires_at
    }

    /// Whether the current token can be renewed.
    pub fn is_renewable(&self) -> bool {
        self.lease.lock().renewable
    }

    fn current_token(&self) -> Result<String, VaultError> {
        let mut lease = self.lease.lock();
        let now = self.clock.now();
        if lease.is_expired_at(now) {
            if let VaultAuth::AppRole { role_id, secret_id } = &self.auth {
                let grant = self.session.login_app_role(role_id, secret_id)?;
                *lease = Lease::from_grant(grant, now);
                info!(
                    expires_at = ?lease.expires_at,
                    renewable = lease.renewable,
                    "secret store token expired, logged in again"
                );
            }
        }
        Ok(lease.token.clone())
    }

    fn read_at(&self, path: &str, version: Option<u32>) -> Result<SecretResponse, VaultError> {
        let token = self.current_token()?;
        self.session.read(&token, path, version)
    }
}

impl<S: SecretStoreSession> SecretReader for TokenRenewingConnection<S> {
    fn read(&self, path: &str) -> Result<SecretResponse, KeyError> {
        Ok(self.read_at(path, None)?)
    }

    fn read_version(&self, path: &str, version: u32) -> Result<SecretResponse, KeyError> {
        Ok(self.read_at(path, Some(version))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use topicseal_keys::{ManualClock, SecretMetadata};

    struct FakeSession {
        logins: AtomicUsize,
        lease: Duration,
        tokens_seen: parking_lot::Mutex<Vec<(String, Option<u32>)>>,
    }

    impl FakeSession {
        fn new(lease: Duration) -> Self {
            Self {
                logins: AtomicUsize::new(0),
                lease,
                tokens_seen: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    impl SecretStoreSession for FakeSession {
        fn login_app_role(&self, role_id: &str, secret_id: &str) -> Result<LoginGrant, VaultError> {
            if secret_id != "right" {
                return Err(VaultError::Login(format!("role {} denied", role_id)));
            }
            let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(LoginGrant {
                client_token: format!("token-{}", n),
                lease_duration: self.lease,
                renewable: true,
            })
        }

        fn read(
            &self,
            token: &str,
            _path: &str,
            version: Option<u32>,
        ) -> Result<SecretResponse, VaultError> {
            self.tokens_seen.lock().push((token.to_string(), version));
            Ok(SecretResponse {
                data: [("value".to_string(), "a2V5".to_string())].into_iter().collect(),
                metadata: Some(SecretMetadata {
                    version: version.unwrap_or(7),
                    created_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
                }),
            })
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn app_role() -> VaultAuth {
        VaultAuth::AppRole {
            role_id: "orders-service".into(),
            secret_id: "right".into(),
        }
    }

    #[test]
    fn static_token_never_logs_in() {
        let clock = Arc::new(ManualClock::new(start()));
        let conn = TokenRenewingConnection::connect_with_clock(
            FakeSession::new(Duration::from_secs(60)),
            VaultAuth::Token("s.static".into()),
            clock.clone(),
        )
        .unwrap();
        conn.read("kv/orders").unwrap();
        clock.advance(Duration::from_secs(365 * 24 * 3600));
        conn.read("kv/orders").unwrap();
        assert_eq!(conn.session().logins.load(Ordering::SeqCst), 0);
        assert!(conn.lease_expires_at().is_none());
        assert!(conn
            .session()
            .tokens_seen
            .lock()
            .iter()
            .all(|(t, _)| t == "s.static"));
    }

    #[test]
    fn app_role_logs_in_on_connect() {
        let conn = TokenRenewingConnection::connect_with_clock(
            FakeSession::new(Duration::from_secs(60)),
            app_role(),
            Arc::new(ManualClock::new(start())),
        )
        .unwrap();
        assert_eq!(conn.session().logins.load(Ordering::SeqCst), 1);
        assert_eq!(
            conn.lease_expires_at(),
            Some(start() + chrono::Duration::seconds(60))
        );
        assert!(conn.is_renewable());
    }

    #[test]
    fn expired_lease_relogs_exactly_once() {
        let clock = Arc::new(ManualClock::new(start()));
        let conn = TokenRenewingConnection::connect_with_clock(
            FakeSession::new(Duration::from_secs(60)),
            app_role(),
            clock.clone(),
        )
        .unwrap();

        conn.read("kv/orders").unwrap();
        clock.advance(Duration::from_secs(60));
        conn.read_version("kv/orders", 3).unwrap();
        conn.read("kv/orders").unwrap();

        assert_eq!(conn.session().logins.load(Ordering::SeqCst), 2);
        let seen = conn.session().tokens_seen.lock().clone();
        assert_eq!(
            seen,
            vec![
                ("token-1".to_string(), None),
                ("token-2".to_string(), Some(3)),
                ("token-2".to_string(), None),
            ]
        );
    }

    #[test]
    fn zero_lease_never_expires() {
        let clock = Arc::new(ManualClock::new(start()));
        let conn = TokenRenewingConnection::connect_with_clock(
            FakeSession::new(Duration::ZERO),
            app_role(),
            clock.clone(),
        )
        .unwrap();
        clock.advance(Duration::from_secs(10 * 24 * 3600));
        conn.read("kv/orders").unwrap();
        assert_eq!(conn.session().logins.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_login_surfaces_as_store_error() {
        let err = TokenRenewingConnection::connect_with_clock(
            FakeSession::new(Duration::from_secs(60)),
            VaultAuth::AppRole {
                role_id: "orders-service".into(),
                secret_id: "wrong".into(),
            },
            Arc::new(ManualClock::new(start())),
        )
        .unwrap_err();
        assert!(matches!(err, VaultError::Login(_)));
        assert!(KeyError::from(err).is_store_failure());
    }

    #[test]
    fn debug_hides_token() {
        let conn = TokenRenewingConnection::connect_with_clock(
            FakeSession::new(Duration::from_secs(60)),
            app_role(),
            Arc::new(ManualClock::new(start())),
        )
        .unwrap();
        assert!(!format!("{:?}", conn).contains("token-1"));
    }
}
