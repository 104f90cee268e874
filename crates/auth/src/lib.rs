//! OTP-based authentication for the Cybermitra backend.
//!
//! The flow is: a client asks for a one-time code for a phone number or
//! email address, the code is delivered out of band, and verifying it
//! either completes a login (known identifier) or hands back a short-lived
//! registration token that [`Authenticator::complete_registration`] turns
//! into a user plus session.
//!
//! Codes are stored hashed, are single-use, expire, and are attempt- and
//! resend-limited server side.

mod identifier;

pub use identifier::Identifier;

use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use cybermitra_config::AuthConfig;
use cybermitra_database::User;
use rand::{Rng, RngCore};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("no active code for this identifier, request one first")]
    OtpNotRequested,
    #[error("the code has expired, request a new one")]
    OtpExpired,
    #[error("incorrect code, {attempts_remaining} attempts remaining")]
    OtpInvalid { attempts_remaining: u32 },
    #[error("too many incorrect attempts, request a new code")]
    TooManyAttempts,
    #[error("please wait {retry_after_seconds}s before requesting another code")]
    ResendCooldown { retry_after_seconds: u64 },
    #[error("invalid or expired registration token")]
    RegistrationTokenInvalid,
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("code delivery failed")]
    DeliveryFailed(#[source] anyhow::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("hashing failed: {0}")]
    Hash(#[from] argon2::password_hash::Error),
}

/// Out-of-band transport for one-time codes.
///
/// Production deployments plug an SMS or SMTP gateway in here; the
/// default [`LogDelivery`] just logs the code for local development.
pub trait OtpDelivery: Send + Sync {
    fn deliver(&self, identifier: &Identifier, code: &str) -> anyhow::Result<()>;
}

/// Development delivery: the code only reaches the server log.
pub struct LogDelivery;

impl OtpDelivery for LogDelivery {
    fn deliver(&self, identifier: &Identifier, code: &str) -> anyhow::Result<()> {
        info!(identifier = %identifier, code, "otp issued (log delivery)");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful code verification.
#[derive(Debug)]
pub enum VerifyOutcome {
    /// The identifier belongs to an existing user; they are logged in.
    Registered { user: User, session: AuthSession },
    /// First-time identifier; registration must be completed to log in.
    NeedsRegistration { registration_token: String },
}

/// Profile fields collected when a new identifier registers.
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
}

impl NewProfile {
    fn validate(&self) -> Result<(), AuthError> {
        if self.name.trim().is_empty() {
            return Err(AuthError::InvalidProfile("name is required".into()));
        }
        if self.name.len() > 120 {
            return Err(AuthError::InvalidProfile("name too long".into()));
        }
        if let Some(email) = &self.email {
            Identifier::parse(email)
                .ok()
                .filter(|id| matches!(id, Identifier::Email(_)))
                .ok_or_else(|| AuthError::InvalidProfile("invalid email address".into()))?;
        }
        if let Some(pincode) = &self.pincode {
            let valid = pincode.len() == 6
                && pincode.chars().all(|c| c.is_ascii_digit())
                && !pincode.starts_with('0');
            if !valid {
                return Err(AuthError::InvalidProfile("invalid pincode".into()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct OtpIssue {
    /// Seconds the client must wait before asking for another code.
    pub cooldown_seconds: u64,
}

#[derive(Clone)]
pub struct Authenticator {
    pool: SqlitePool,
    session_ttl: Duration,
    otp_ttl: Duration,
    resend_cooldown: Duration,
    max_attempts: u32,
    registration_ttl: Duration,
    delivery: Arc<dyn OtpDelivery>,
}

impl Authenticator {
    pub fn new(pool: SqlitePool, config: &AuthConfig, delivery: Arc<dyn OtpDelivery>) -> Self {
        Self {
            pool,
            session_ttl: Duration::seconds(config.session_ttl_seconds as i64),
            otp_ttl: Duration::seconds(config.otp_ttl_seconds as i64),
            resend_cooldown: Duration::seconds(config.otp_resend_cooldown_seconds as i64),
            max_attempts: config.otp_max_attempts,
            registration_ttl: Duration::seconds(config.registration_ttl_seconds as i64),
            delivery,
        }
    }

    /// Issue a fresh code for the identifier and hand it to the delivery
    /// transport. A still-cooling-down identifier is refused.
    pub async fn request_otp(&self, identifier: &Identifier) -> Result<OtpIssue, AuthError> {
        let key = identifier.canonical();
        let now = Utc::now();

        let existing = sqlx::query("SELECT issued_at FROM otp_codes WHERE identifier = ?")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = existing {
            let issued_at: String = row.try_get("issued_at")?;
            if let Ok(issued_at) = DateTime::parse_from_rfc3339(&issued_at) {
                let next_allowed = issued_at.with_timezone(&Utc) + self.resend_cooldown;
                if next_allowed > now {
                    let retry_after_seconds = (next_allowed - now).num_seconds().max(1) as u64;
                    return Err(AuthError::ResendCooldown {
                        retry_after_seconds,
                    });
                }
            }
        }

        let code = generate_code();
        let code_hash = hash_secret(&code)?;
        let expires_at = now + self.otp_ttl;

        sqlx::query(
            "INSERT INTO otp_codes (identifier, code_hash, attempts, issued_at, expires_at)
             VALUES (?, ?, 0, ?, ?)
             ON CONFLICT(identifier) DO UPDATE SET
                 code_hash = excluded.code_hash,
                 attempts = 0,
                 issued_at = excluded.issued_at,
                 expires_at = excluded.expires_at",
        )
        .bind(&key)
        .bind(&code_hash)
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.delivery
            .deliver(identifier, &code)
            .map_err(AuthError::DeliveryFailed)?;

        Ok(OtpIssue {
            cooldown_seconds: self.resend_cooldown.num_seconds().max(0) as u64,
        })
    }

    /// Check a submitted code. Codes are single-use: a correct code is
    /// consumed whether the identifier is registered or not.
    pub async fn verify_otp(
        &self,
        identifier: &Identifier,
        code: &str,
    ) -> Result<VerifyOutcome, AuthError> {
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(AuthError::OtpInvalid {
                attempts_remaining: self.remaining_attempts(identifier).await?,
            });
        }

        let key = identifier.canonical();
        let row = sqlx::query(
            "SELECT code_hash, attempts, expires_at FROM otp_codes WHERE identifier = ?",
        )
        .bind(&key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(AuthError::OtpNotRequested);
        };

        let expires_at: String = row.try_get("expires_at")?;
        let expired = DateTime::parse_from_rfc3339(&expires_at)
            .map(|t| t.with_timezone(&Utc) <= Utc::now())
            .unwrap_or(true);
        if expired {
            self.discard_code(&key).await?;
            return Err(AuthError::OtpExpired);
        }

        let attempts: i64 = row.try_get("attempts")?;
        if attempts >= self.max_attempts as i64 {
            self.discard_code(&key).await?;
            return Err(AuthError::TooManyAttempts);
        }

        let code_hash: String = row.try_get("code_hash")?;
        let stored = PasswordHash::new(&code_hash)?;
        if Argon2::default()
            .verify_password(code.as_bytes(), &stored)
            .is_err()
        {
            sqlx::query("UPDATE otp_codes SET attempts = attempts + 1 WHERE identifier = ?")
                .bind(&key)
                .execute(&self.pool)
                .await?;
            let used = attempts as u32 + 1;
            warn!(identifier = %identifier, used, "otp verification failed");
            return Err(AuthError::OtpInvalid {
                attempts_remaining: self.max_attempts.saturating_sub(used),
            });
        }

        self.discard_code(&key).await?;

        match self.find_user(identifier).await? {
            Some(user) => {
                let session = self.issue_session(user.id).await?;
                info!(user = %user.public_id, "login completed");
                Ok(VerifyOutcome::Registered { user, session })
            }
            None => {
                let registration_token = self.issue_registration_token(&key).await?;
                Ok(VerifyOutcome::NeedsRegistration { registration_token })
            }
        }
    }

    /// Create the user for a verified-but-unregistered identifier.
    pub async fn complete_registration(
        &self,
        registration_token: &str,
        profile: &NewProfile,
    ) -> Result<(User, AuthSession), AuthError> {
        profile.validate()?;

        let row = sqlx::query(
            "SELECT id, identifier, expires_at FROM registration_tokens WHERE token = ?",
        )
        .bind(registration_token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(AuthError::RegistrationTokenInvalid);
        };

        let token_id: i64 = row.try_get("id")?;
        let expires_at: String = row.try_get("expires_at")?;
        let expired = DateTime::parse_from_rfc3339(&expires_at)
            .map(|t| t.with_timezone(&Utc) <= Utc::now())
            .unwrap_or(true);
        if expired {
            sqlx::query("DELETE FROM registration_tokens WHERE id = ?")
                .bind(token_id)
                .execute(&self.pool)
                .await?;
            return Err(AuthError::RegistrationTokenInvalid);
        }

        let key: String = row.try_get("identifier")?;
        let identifier = identifier_from_canonical(&key)?;

        // The identifier may have registered through another device while
        // this token was outstanding.
        if let Some(user) = self.find_user(&identifier).await? {
            let session = self.issue_session(user.id).await?;
            return Ok((user, session));
        }

        let (phone, identity_email) = match &identifier {
            Identifier::Phone(value) => (Some(value.clone()), None),
            Identifier::Email(value) => (None, Some(value.clone())),
        };
        let email = identity_email.or_else(|| profile.email.clone());

        let now = Utc::now().to_rfc3339();
        let public_id = cybermitra_database::ids::new_public_id();
        let result = sqlx::query(
            "INSERT INTO users (public_id, name, phone, email, address, city, state, pincode, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(profile.name.trim())
        .bind(&phone)
        .bind(&email)
        .bind(&profile.address)
        .bind(&profile.city)
        .bind(&profile.state)
        .bind(&profile.pincode)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        sqlx::query("DELETE FROM registration_tokens WHERE id = ?")
            .bind(token_id)
            .execute(&self.pool)
            .await?;

        let user = User {
            id: result.last_insert_rowid(),
            public_id,
            name: profile.name.trim().to_string(),
            phone,
            email,
            address: profile.address.clone(),
            city: profile.city.clone(),
            state: profile.state.clone(),
            pincode: profile.pincode.clone(),
            created_at: now.clone(),
            updated_at: now,
        };

        info!(user = %user.public_id, "registration completed");
        let session = self.issue_session(user.id).await?;
        Ok((user, session))
    }

    /// Resolve a bearer token to its user, deleting the session if it has
    /// lapsed.
    pub async fn authenticate_token(&self, token: &str) -> Result<(User, AuthSession), AuthError> {
        let row = sqlx::query("SELECT user_id, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(AuthError::SessionNotFound);
        };

        let user_id: i64 = row.try_get("user_id")?;
        let expires_at: String = row.try_get("expires_at")?;
        let expires_at = DateTime::parse_from_rfc3339(&expires_at)
            .map_err(|_| AuthError::SessionNotFound)?
            .with_timezone(&Utc);

        if expires_at <= Utc::now() {
            sqlx::query("DELETE FROM sessions WHERE token = ?")
                .bind(token)
                .execute(&self.pool)
                .await?;
            return Err(AuthError::SessionExpired);
        }

        let user = self.fetch_user(user_id).await?;
        let session = AuthSession {
            token: token.to_owned(),
            user_id,
            expires_at,
        };

        Ok((user, session))
    }

    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn user_profile(&self, user_id: i64) -> Result<User, AuthError> {
        self.fetch_user(user_id).await
    }

    async fn remaining_attempts(&self, identifier: &Identifier) -> Result<u32, AuthError> {
        let row = sqlx::query("SELECT attempts FROM otp_codes WHERE identifier = ?")
            .bind(identifier.canonical())
            .fetch_optional(&self.pool)
            .await?;
        let attempts: i64 = match row {
            Some(row) => row.try_get("attempts")?,
            None => return Err(AuthError::OtpNotRequested),
        };
        Ok(self.max_attempts.saturating_sub(attempts as u32))
    }

    async fn discard_code(&self, key: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM otp_codes WHERE identifier = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_user(&self, identifier: &Identifier) -> Result<Option<User>, AuthError> {
        let query = match identifier {
            Identifier::Phone(_) => "SELECT id FROM users WHERE phone = ?",
            Identifier::Email(_) => "SELECT id FROM users WHERE email = ?",
        };
        let row = sqlx::query(query)
            .bind(identifier.value())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let id: i64 = row.try_get("id")?;
                Ok(Some(self.fetch_user(id).await?))
            }
            None => Ok(None),
        }
    }

    async fn fetch_user(&self, id: i64) -> Result<User, AuthError> {
        let row = sqlx::query(
            "SELECT id, public_id, name, phone, email, address, city, state, pincode, created_at, updated_at
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(User {
            id: row.try_get("id")?,
            public_id: row.try_get("public_id")?,
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            email: row.try_get("email")?,
            address: row.try_get("address")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            pincode: row.try_get("pincode")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn issue_session(&self, user_id: i64) -> Result<AuthSession, AuthError> {
        let token = generate_token();
        let now = Utc::now();
        let expires_at = now + self.session_ttl;

        sqlx::query(
            "INSERT INTO sessions (user_id, token, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&token)
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(AuthSession {
            token,
            user_id,
            expires_at,
        })
    }

    async fn issue_registration_token(&self, key: &str) -> Result<String, AuthError> {
        let token = generate_token();
        let now = Utc::now();
        let expires_at = now + self.registration_ttl;

        sqlx::query(
            "INSERT INTO registration_tokens (identifier, token, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(key)
        .bind(&token)
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(token)
    }
}

fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_secret(secret: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(secret.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn identifier_from_canonical(key: &str) -> Result<Identifier, AuthError> {
    if let Some(value) = key.strip_prefix("phone:") {
        return Ok(Identifier::Phone(value.to_string()));
    }
    if let Some(value) = key.strip_prefix("email:") {
        return Ok(Identifier::Email(value.to_string()));
    }
    Err(AuthError::InvalidIdentifier(format!(
        "unrecognised identifier key: {key}"
    )))
}
