//! Authentication, sessions and account credentials.
//!
//! Sign-in is guarded by the login limiter twice, once keyed by client IP
//! and once by email, so neither a single address nor a single account can
//! be brute-forced. Every outcome is written to the security audit trail.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use ph_core::config::AuthConfig;
use ph_core::error::{PhError, PhResult};
use ph_models::models::format_timestamp;
use ph_models::{timestamp_now, Database, NewProfile, Profile, Session};

use crate::audit::{events, AuditService};
use crate::event_bus::{AppEvent, EventBus};
use crate::password;
use crate::rate_limit::{Limiter, RateLimiter};
use crate::service::StateCell;
use crate::validate;

/// The caller behind a valid session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: String,
    /// Digest of the session token that authenticated this request.
    #[serde(skip)]
    pub session_hash: Option<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ph_core::constants::roles::ADMIN
    }

    fn from_profile(profile: &Profile, session_hash: Option<String>) -> Self {
        Self {
            id: profile.id,
            username: profile.username.clone(),
            role: profile.role.clone(),
            session_hash,
        }
    }
}

/// A freshly issued session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSession {
    /// Raw token for the client cookie. Never persisted.
    pub token: String,
    pub expires_at: String,
    pub user: AuthUser,
}

pub struct AuthService {
    pub(crate) state: StateCell,
    database: Database,
    limiter: Arc<RateLimiter>,
    audit: Arc<AuditService>,
    event_bus: EventBus,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(
        database: Database,
        limiter: Arc<RateLimiter>,
        audit: Arc<AuditService>,
        event_bus: EventBus,
        config: AuthConfig,
    ) -> Self {
        Self {
            state: StateCell::new(),
            database,
            limiter,
            audit,
            event_bus,
            config,
        }
    }

    /// Register a new account and sign it in.
    pub fn sign_up(&self, email: &str, username: &str, password: &str, ip: Option<&str>) -> PhResult<IssuedSession> {
        let email = validate::email(email)?;
        let username = validate::username(username)?;
        validate::password(password, self.config.min_password_len)?;

        let profile = {
            let conn = self.database.conn()?;
            if Profile::find_by_username(&conn, &username)?.is_some() {
                return Err(PhError::Conflict("username is already taken".into()));
            }
            if Profile::find_by_email(&conn, &email)?.is_some() {
                return Err(PhError::Conflict("an account with this email already exists".into()));
            }
            Profile::create(
                &conn,
                &NewProfile {
                    username: username.clone(),
                    email,
                    password_hash: password::hash_password(password),
                    display_name: None,
                },
            )?
        };

        info!("new account: {}", profile.username);
        self.audit.security_event(Some(profile.id), events::SIGN_UP, ip, None);
        self.event_bus.emit(AppEvent::UserSignedUp {
            user_id: profile.id,
            username: profile.username.clone(),
        });

        self.issue_session(&profile, ip)
    }

    /// Exchange credentials for a session.
    pub async fn sign_in(&self, email: &str, password: &str, ip: Option<&str>) -> PhResult<IssuedSession> {
        let email = email.trim().to_lowercase();

        if let Some(ip) = ip {
            self.limiter.enforce(&format!("ip:{ip}"), Limiter::Login).await?;
        }
        self.limiter.enforce(&format!("email:{email}"), Limiter::Login).await?;

        let profile = {
            let conn = self.database.conn()?;
            Profile::find_by_email(&conn, &email)?
        };

        let profile = match profile {
            Some(p) if password::verify_password(password, &p.password_hash) => p,
            other => {
                let user_id = other.map(|p| p.id);
                self.audit.security_event(
                    user_id,
                    events::SIGN_IN_FAILED,
                    ip,
                    Some(json!({ "email": email })),
                );
                return Err(PhError::Authentication("invalid email or password".into()));
            }
        };

        if profile.is_banned {
            self.audit.security_event(
                Some(profile.id),
                events::SIGN_IN_FAILED,
                ip,
                Some(json!({ "reason": "banned" })),
            );
            return Err(PhError::forbidden("this account has been suspended"));
        }

        self.audit.security_event(Some(profile.id), events::SIGN_IN, ip, None);
        self.issue_session(&profile, ip)
    }

    fn issue_session(&self, profile: &Profile, ip: Option<&str>) -> PhResult<IssuedSession> {
        let token = password::generate_session_token();
        let token_hash = password::hash_token(&token);
        let expires_at = format_timestamp(Utc::now() + Duration::hours(self.config.session_ttl_hours));

        let conn = self.database.conn()?;
        Session::create(&conn, &token_hash, profile.id, ip, &expires_at)?;

        Ok(IssuedSession {
            token,
            expires_at,
            user: AuthUser::from_profile(profile, Some(token_hash)),
        })
    }

    /// Revoke a session. Unknown tokens are ignored.
    pub fn sign_out(&self, token: &str) -> PhResult<()> {
        let token_hash = password::hash_token(token);
        let conn = self.database.conn()?;
        let user_id = Session::find_active(&conn, &token_hash, &timestamp_now())?.map(|s| s.user_id);
        if Session::delete(&conn, &token_hash)? {
            drop(conn);
            self.audit.security_event(user_id, events::SIGN_OUT, None, None);
        }
        Ok(())
    }

    /// Look up the user behind a session token. Expired sessions and banned
    /// users resolve to `None`.
    pub fn resolve_session(&self, token: &str) -> PhResult<Option<AuthUser>> {
        if token.is_empty() {
            return Ok(None);
        }
        let token_hash = password::hash_token(token);
        let conn = self.database.conn()?;

        let Some(session) = Session::find_active(&conn, &token_hash, &timestamp_now())? else {
            return Ok(None);
        };
        match Profile::find_by_id(&conn, session.user_id)? {
            Some(profile) if !profile.is_banned => Ok(Some(AuthUser::from_profile(&profile, Some(token_hash)))),
            _ => Ok(None),
        }
    }

    /// Resolve a token or fail with an authentication error.
    pub fn require_user(&self, token: Option<&str>) -> PhResult<AuthUser> {
        match token {
            Some(token) => self.resolve_session(token)?.ok_or_else(PhError::unauthenticated),
            None => Err(PhError::unauthenticated()),
        }
    }

    pub fn require_admin(&self, user: &AuthUser) -> PhResult<()> {
        if user.is_admin() {
            Ok(())
        } else {
            Err(PhError::forbidden("admin access required"))
        }
    }

    fn verify_current_password(&self, user: &AuthUser, password: &str) -> PhResult<Profile> {
        let conn = self.database.conn()?;
        let profile = Profile::find_by_id(&conn, user.id)?.ok_or_else(|| PhError::not_found("profile"))?;
        if !password::verify_password(password, &profile.password_hash) {
            return Err(PhError::Authentication("current password is incorrect".into()));
        }
        Ok(profile)
    }

    pub async fn change_email(&self, user: &AuthUser, new_email: &str, password: &str) -> PhResult<()> {
        self.limiter.enforce(&user.id.to_string(), Limiter::EmailChange).await?;

        let new_email = validate::email(new_email)?;
        let profile = self.verify_current_password(user, password)?;
        if profile.email == new_email {
            return Err(PhError::validation("new email is the same as the current one"));
        }

        {
            let conn = self.database.conn()?;
            if Profile::find_by_email(&conn, &new_email)?.is_some() {
                return Err(PhError::Conflict("an account with this email already exists".into()));
            }
            Profile::set_email(&conn, user.id, &new_email)?;
        }

        self.audit.security_event(
            Some(user.id),
            events::EMAIL_CHANGED,
            None,
            Some(json!({ "from": profile.email, "to": new_email })),
        );
        Ok(())
    }

    /// Change the password and revoke every other session of the user.
    pub async fn change_password(&self, user: &AuthUser, current: &str, new_password: &str) -> PhResult<usize> {
        self.limiter.enforce(&user.id.to_string(), Limiter::PasswordChange).await?;

        validate::password(new_password, self.config.min_password_len)?;
        self.verify_current_password(user, current)?;
        if current == new_password {
            return Err(PhError::validation("new password must differ from the current one"));
        }

        let revoked = self.database.transaction(|conn| {
            Profile::set_password_hash(conn, user.id, &password::hash_password(new_password))?;
            Session::delete_for_user_except(conn, user.id, user.session_hash.as_deref())
        })?;

        self.audit.security_event(
            Some(user.id),
            events::PASSWORD_CHANGED,
            None,
            Some(json!({ "revokedSessions": revoked })),
        );
        Ok(revoked)
    }

    /// Delete expired sessions.
    pub fn purge_expired_sessions(&self) -> PhResult<usize> {
        let conn = self.database.conn()?;
        let purged = Session::purge_expired(&conn, &timestamp_now())?;
        if purged > 0 {
            info!("purged {purged} expired sessions");
        }
        Ok(purged)
    }
}

impl crate::service::Service for AuthService {
    fn name(&self) -> &str {
        "auth"
    }

    fn state(&self) -> crate::service::ServiceState {
        self.state.get()
    }

    fn init(&self) -> PhResult<()> {
        if let Err(e) = self.purge_expired_sessions() {
            warn!("could not purge expired sessions: {e}");
        }
        self.state.set(crate::service::ServiceState::Running);
        info!("auth initialized");
        Ok(())
    }

    fn shutdown(&self) -> PhResult<()> {
        self.state.set(crate::service::ServiceState::Stopped);
        Ok(())
    }
}
