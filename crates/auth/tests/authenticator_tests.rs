//! End-to-end tests for the OTP authenticator against an in-memory store.

use std::sync::{Arc, Mutex};

use cybermitra_auth::{
    AuthError, Authenticator, Identifier, LogDelivery, NewProfile, OtpDelivery, VerifyOutcome,
};
use cybermitra_config::AuthConfig;
use cybermitra_database::run_migrations;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Captures issued codes instead of sending them anywhere.
#[derive(Default)]
struct CaptureDelivery {
    sent: Mutex<Vec<(String, String)>>,
}

impl CaptureDelivery {
    fn last_code(&self) -> String {
        self.sent
            .lock()
            .unwrap()
            .last()
            .map(|(_, code)| code.clone())
            .expect("a code should have been delivered")
    }

    fn delivery_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl OtpDelivery for CaptureDelivery {
    fn deliver(&self, identifier: &Identifier, code: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((identifier.canonical(), code.to_string()));
        Ok(())
    }
}

async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

async fn setup() -> (Authenticator, Arc<CaptureDelivery>, SqlitePool) {
    let pool = memory_pool().await;
    let delivery = Arc::new(CaptureDelivery::default());
    let authenticator = Authenticator::new(pool.clone(), &AuthConfig::default(), delivery.clone());
    (authenticator, delivery, pool)
}

fn profile(name: &str) -> NewProfile {
    NewProfile {
        name: name.to_string(),
        city: Some("Pune".to_string()),
        state: Some("Maharashtra".to_string()),
        pincode: Some("411001".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn new_phone_identifier_registers_then_logs_in() {
    let (auth, delivery, _pool) = setup().await;
    let identifier = Identifier::parse("+91 98765 43210").unwrap();

    auth.request_otp(&identifier).await.unwrap();
    let outcome = auth
        .verify_otp(&identifier, &delivery.last_code())
        .await
        .unwrap();

    let registration_token = match outcome {
        VerifyOutcome::NeedsRegistration { registration_token } => registration_token,
        other => panic!("expected registration, got {other:?}"),
    };

    let (user, session) = auth
        .complete_registration(&registration_token, &profile("Asha Kulkarni"))
        .await
        .unwrap();
    assert_eq!(user.phone.as_deref(), Some("+919876543210"));

    let (fetched, _) = auth.authenticate_token(&session.token).await.unwrap();
    assert_eq!(fetched.id, user.id);
    assert_eq!(fetched.name, "Asha Kulkarni");
}

#[tokio::test]
async fn known_identifier_skips_registration() {
    let (auth, delivery, _pool) = setup().await;
    let identifier = Identifier::parse("asha@example.com").unwrap();

    auth.request_otp(&identifier).await.unwrap();
    let outcome = auth
        .verify_otp(&identifier, &delivery.last_code())
        .await
        .unwrap();
    let token = match outcome {
        VerifyOutcome::NeedsRegistration { registration_token } => registration_token,
        other => panic!("expected registration, got {other:?}"),
    };
    auth.complete_registration(&token, &profile("Asha"))
        .await
        .unwrap();

    // Second login with the same email must complete directly.
    sqlx::query("DELETE FROM otp_codes").execute(&_pool).await.unwrap();
    auth.request_otp(&identifier).await.unwrap();
    let outcome = auth
        .verify_otp(&identifier, &delivery.last_code())
        .await
        .unwrap();

    match outcome {
        VerifyOutcome::Registered { user, session } => {
            assert_eq!(user.email.as_deref(), Some("asha@example.com"));
            assert!(!session.token.is_empty());
        }
        other => panic!("expected direct login, got {other:?}"),
    }
}

#[tokio::test]
async fn resend_is_blocked_inside_the_cooldown_window() {
    let (auth, delivery, pool) = setup().await;
    let identifier = Identifier::parse("9876543210").unwrap();

    auth.request_otp(&identifier).await.unwrap();
    let err = auth.request_otp(&identifier).await.unwrap_err();
    assert!(matches!(err, AuthError::ResendCooldown { .. }));
    assert_eq!(delivery.delivery_count(), 1, "no duplicate code issued");

    // Age the issuance past the cooldown; a resend must then succeed and
    // replace the old code.
    let past = (chrono::Utc::now() - chrono::Duration::seconds(120)).to_rfc3339();
    sqlx::query("UPDATE otp_codes SET issued_at = ?")
        .bind(&past)
        .execute(&pool)
        .await
        .unwrap();

    let first_code = delivery.last_code();
    auth.request_otp(&identifier).await.unwrap();
    assert_eq!(delivery.delivery_count(), 2);

    if first_code != delivery.last_code() {
        let err = auth.verify_otp(&identifier, &first_code).await.unwrap_err();
        assert!(matches!(err, AuthError::OtpInvalid { .. }));
    }
}

#[tokio::test]
async fn wrong_codes_are_attempt_limited() {
    let (auth, delivery, _pool) = setup().await;
    let identifier = Identifier::parse("9876543210").unwrap();
    auth.request_otp(&identifier).await.unwrap();

    let real_code = delivery.last_code();
    let wrong_code = if real_code == "000000" { "000001" } else { "000000" };

    for expected_remaining in (0..5).rev() {
        let err = auth.verify_otp(&identifier, wrong_code).await.unwrap_err();
        match err {
            AuthError::OtpInvalid { attempts_remaining } => {
                assert_eq!(attempts_remaining, expected_remaining)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    // The sixth try trips the limit and burns the code entirely.
    let err = auth.verify_otp(&identifier, wrong_code).await.unwrap_err();
    assert!(matches!(err, AuthError::TooManyAttempts));

    let err = auth.verify_otp(&identifier, &real_code).await.unwrap_err();
    assert!(matches!(err, AuthError::OtpNotRequested));
}

#[tokio::test]
async fn codes_are_single_use() {
    let (auth, delivery, _pool) = setup().await;
    let identifier = Identifier::parse("9876543210").unwrap();

    auth.request_otp(&identifier).await.unwrap();
    let code = delivery.last_code();
    auth.verify_otp(&identifier, &code).await.unwrap();

    let err = auth.verify_otp(&identifier, &code).await.unwrap_err();
    assert!(matches!(err, AuthError::OtpNotRequested));
}

#[tokio::test]
async fn expired_codes_are_rejected() {
    let (auth, delivery, pool) = setup().await;
    let identifier = Identifier::parse("9876543210").unwrap();
    auth.request_otp(&identifier).await.unwrap();

    let past = (chrono::Utc::now() - chrono::Duration::seconds(1)).to_rfc3339();
    sqlx::query("UPDATE otp_codes SET expires_at = ?")
        .bind(&past)
        .execute(&pool)
        .await
        .unwrap();

    let err = auth
        .verify_otp(&identifier, &delivery.last_code())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::OtpExpired));
}

#[tokio::test]
async fn registration_validates_the_profile() {
    let (auth, delivery, _pool) = setup().await;
    let identifier = Identifier::parse("9876543210").unwrap();
    auth.request_otp(&identifier).await.unwrap();
    let token = match auth
        .verify_otp(&identifier, &delivery.last_code())
        .await
        .unwrap()
    {
        VerifyOutcome::NeedsRegistration { registration_token } => registration_token,
        other => panic!("expected registration, got {other:?}"),
    };

    let err = auth
        .complete_registration(&token, &NewProfile::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidProfile(_)));

    let mut bad_pincode = profile("Ravi");
    bad_pincode.pincode = Some("11".to_string());
    let err = auth
        .complete_registration(&token, &bad_pincode)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidProfile(_)));

    // Validation failures keep the token usable.
    auth.complete_registration(&token, &profile("Ravi"))
        .await
        .unwrap();
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let (auth, delivery, _pool) = setup().await;
    let identifier = Identifier::parse("9876543210").unwrap();
    auth.request_otp(&identifier).await.unwrap();
    let token = match auth
        .verify_otp(&identifier, &delivery.last_code())
        .await
        .unwrap()
    {
        VerifyOutcome::NeedsRegistration { registration_token } => registration_token,
        other => panic!("expected registration, got {other:?}"),
    };
    let (_, session) = auth
        .complete_registration(&token, &profile("Asha"))
        .await
        .unwrap();

    auth.logout(&session.token).await.unwrap();
    let err = auth.authenticate_token(&session.token).await.unwrap_err();
    assert!(matches!(err, AuthError::SessionNotFound));
}

#[tokio::test]
async fn log_delivery_is_usable_as_a_default() {
    let pool = memory_pool().await;
    let auth = Authenticator::new(pool, &AuthConfig::default(), Arc::new(LogDelivery));
    let identifier = Identifier::parse("9876543210").unwrap();
    auth.request_otp(&identifier).await.unwrap();
}
