//! The identity-verification flow a login UI drives.
//!
//! `choice → phone|email → otp → register`, with a short-circuit exit
//! for identifiers that already have an account. Collaborator failures
//! surface as a user-visible message and leave the flow on its current
//! step with the entered data intact; the typed code is only cleared by
//! an explicit resend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::types::{Session, VerifyResponse};
use crate::ClientError;

/// The auth endpoints the flow calls. [`crate::ApiClient`] implements
/// this; tests substitute their own.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Returns the resend cooldown the server granted, in seconds.
    async fn request_otp(&self, identifier: &str) -> Result<u64, ClientError>;
    async fn verify_otp(&self, identifier: &str, code: &str) -> Result<VerifyResponse, ClientError>;
    async fn register(
        &self,
        registration_token: &str,
        form: &RegistrationForm,
    ) -> Result<Session, ClientError>;
}

#[async_trait]
impl AuthGateway for crate::ApiClient {
    async fn request_otp(&self, identifier: &str) -> Result<u64, ClientError> {
        // Fully-qualified calls pick the inherent methods over this trait.
        let issued = crate::ApiClient::request_otp(self, identifier).await?;
        Ok(issued.cooldown_seconds)
    }

    async fn verify_otp(&self, identifier: &str, code: &str) -> Result<VerifyResponse, ClientError> {
        crate::ApiClient::verify_otp(self, identifier, code).await
    }

    async fn register(
        &self,
        registration_token: &str,
        form: &RegistrationForm,
    ) -> Result<Session, ClientError> {
        crate::ApiClient::register(
            self,
            registration_token,
            &serde_json::json!({
                "name": form.name,
                "email": form.email,
                "address": form.address,
                "city": form.city,
                "state": form.state,
                "pincode": form.pincode,
            }),
        )
        .await
    }
}

/// Time source for the resend countdown; injected so tests can tick it.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    Choice,
    Phone,
    Email,
    Otp,
    Register,
    Complete,
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
}

pub struct LoginFlow {
    gateway: Arc<dyn AuthGateway>,
    clock: Arc<dyn Clock>,
    step: LoginStep,
    identifier: String,
    otp_input: String,
    error: Option<String>,
    resend_ready_at: Option<Instant>,
    registration_token: Option<String>,
    session: Option<Session>,
}

impl LoginFlow {
    pub fn new(gateway: Arc<dyn AuthGateway>) -> Self {
        Self::with_clock(gateway, Arc::new(SystemClock))
    }

    pub fn with_clock(gateway: Arc<dyn AuthGateway>, clock: Arc<dyn Clock>) -> Self {
        Self {
            gateway,
            clock,
            step: LoginStep::Choice,
            identifier: String::new(),
            otp_input: String::new(),
            error: None,
            resend_ready_at: None,
            registration_token: None,
            session: None,
        }
    }

    pub fn step(&self) -> LoginStep {
        self.step
    }

    /// The message to surface for the current step, if the last action
    /// failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The identifier as entered; preserved across failures.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn otp_input(&self) -> &str {
        &self.otp_input
    }

    pub fn set_otp_input(&mut self, input: &str) {
        self.otp_input = input.chars().filter(|c| c.is_ascii_digit()).take(6).collect();
    }

    /// The completed session, once the flow reaches [`LoginStep::Complete`].
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn choose_phone(&mut self) {
        if self.step == LoginStep::Choice {
            self.step = LoginStep::Phone;
        }
    }

    pub fn choose_email(&mut self) {
        if self.step == LoginStep::Choice {
            self.step = LoginStep::Email;
        }
    }

    /// Submit the phone number or email and request a code.
    pub async fn submit_identifier(&mut self, identifier: &str) -> bool {
        if !matches!(self.step, LoginStep::Phone | LoginStep::Email) {
            return false;
        }
        self.identifier = identifier.trim().to_string();
        if self.identifier.is_empty() {
            self.error = Some("enter your phone number or email".to_string());
            return false;
        }

        match self.gateway.request_otp(&self.identifier).await {
            Ok(cooldown_seconds) => {
                self.error = None;
                self.otp_input.clear();
                self.start_cooldown(cooldown_seconds);
                self.step = LoginStep::Otp;
                true
            }
            Err(client_error) => {
                self.error = Some(user_message(&client_error));
                false
            }
        }
    }

    /// Seconds until resend becomes available; zero when it is.
    pub fn resend_remaining_seconds(&self) -> u64 {
        match self.resend_ready_at {
            Some(ready_at) => ready_at
                .saturating_duration_since(self.clock.now())
                .as_secs(),
            None => 0,
        }
    }

    pub fn can_resend(&self) -> bool {
        self.step == LoginStep::Otp && self.resend_remaining_seconds() == 0
    }

    /// Ask for a fresh code. Refused locally while the countdown runs,
    /// without touching the network. Clears the typed code on success.
    pub async fn resend(&mut self) -> bool {
        if !self.can_resend() {
            return false;
        }
        match self.gateway.request_otp(&self.identifier).await {
            Ok(cooldown_seconds) => {
                self.error = None;
                self.otp_input.clear();
                self.start_cooldown(cooldown_seconds);
                true
            }
            Err(client_error) => {
                self.error = Some(user_message(&client_error));
                false
            }
        }
    }

    /// Submit the 6-digit code.
    pub async fn submit_code(&mut self) -> bool {
        if self.step != LoginStep::Otp {
            return false;
        }
        if self.otp_input.len() != 6 {
            self.error = Some("enter the 6-digit code".to_string());
            return false;
        }

        match self
            .gateway
            .verify_otp(&self.identifier, &self.otp_input)
            .await
        {
            Ok(VerifyResponse::Registered { token, user }) => {
                self.error = None;
                self.session = Some(Session { token, user });
                self.step = LoginStep::Complete;
                true
            }
            Ok(VerifyResponse::NeedsRegistration { registration_token }) => {
                self.error = None;
                self.registration_token = Some(registration_token);
                self.step = LoginStep::Register;
                true
            }
            Err(client_error) => {
                self.error = Some(user_message(&client_error));
                false
            }
        }
    }

    /// Submit the profile and finish the flow.
    pub async fn submit_registration(&mut self, form: &RegistrationForm) -> bool {
        if self.step != LoginStep::Register {
            return false;
        }
        let Some(token) = self.registration_token.clone() else {
            self.error = Some("verification expired, start again".to_string());
            return false;
        };

        match self.gateway.register(&token, form).await {
            Ok(session) => {
                self.error = None;
                self.session = Some(session);
                self.step = LoginStep::Complete;
                true
            }
            Err(client_error) => {
                self.error = Some(user_message(&client_error));
                false
            }
        }
    }

    fn start_cooldown(&mut self, cooldown_seconds: u64) {
        self.resend_ready_at = Some(self.clock.now() + Duration::from_secs(cooldown_seconds));
    }
}

fn user_message(error: &ClientError) -> String {
    match error {
        ClientError::Api { message, .. } => message.clone(),
        ClientError::Unauthorized => "your session has expired, please sign in again".to_string(),
        ClientError::Http(_) => "could not reach the server, check your connection".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserProfile;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    fn profile(name: &str) -> UserProfile {
        UserProfile {
            id: "u1".into(),
            name: name.into(),
            phone: Some("+919876543210".into()),
            email: None,
            address: None,
            city: None,
            state: None,
            pincode: None,
            created_at: "2026-08-01T00:00:00Z".into(),
        }
    }

    /// Scripted gateway that counts OTP requests.
    struct ScriptedGateway {
        requests: AtomicU64,
        known_identifier: Option<String>,
        verify_error: Mutex<Option<String>>,
    }

    impl ScriptedGateway {
        fn new(known_identifier: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                requests: AtomicU64::new(0),
                known_identifier: known_identifier.map(str::to_string),
                verify_error: Mutex::new(None),
            })
        }

        fn request_count(&self) -> u64 {
            self.requests.load(Ordering::SeqCst)
        }

        fn fail_next_verify(&self, message: &str) {
            *self.verify_error.lock().unwrap() = Some(message.to_string());
        }
    }

    #[async_trait]
    impl AuthGateway for ScriptedGateway {
        async fn request_otp(&self, _identifier: &str) -> Result<u64, ClientError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(60)
        }

        async fn verify_otp(
            &self,
            identifier: &str,
            _code: &str,
        ) -> Result<VerifyResponse, ClientError> {
            if let Some(message) = self.verify_error.lock().unwrap().take() {
                return Err(ClientError::Api {
                    status: 400,
                    message,
                });
            }
            if self.known_identifier.as_deref() == Some(identifier) {
                Ok(VerifyResponse::Registered {
                    token: "session-token".into(),
                    user: profile("Asha"),
                })
            } else {
                Ok(VerifyResponse::NeedsRegistration {
                    registration_token: "reg-token".into(),
                })
            }
        }

        async fn register(
            &self,
            registration_token: &str,
            form: &RegistrationForm,
        ) -> Result<Session, ClientError> {
            assert_eq!(registration_token, "reg-token");
            Ok(Session {
                token: "session-token".into(),
                user: profile(&form.name),
            })
        }
    }

    /// A clock the test advances by hand.
    struct TestClock {
        start: Instant,
        offset: Mutex<Duration>,
    }

    impl TestClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                start: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            })
        }

        fn advance(&self, duration: Duration) {
            *self.offset.lock().unwrap() += duration;
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.start + *self.offset.lock().unwrap()
        }
    }

    async fn reach_otp_step(flow: &mut LoginFlow) {
        flow.choose_phone();
        assert!(flow.submit_identifier("9876543210").await);
        assert_eq!(flow.step(), LoginStep::Otp);
    }

    #[tokio::test]
    async fn a_new_identifier_goes_through_registration() {
        let gateway = ScriptedGateway::new(None);
        let mut flow = LoginFlow::new(gateway.clone());

        reach_otp_step(&mut flow).await;
        flow.set_otp_input("123456");
        assert!(flow.submit_code().await);
        assert_eq!(flow.step(), LoginStep::Register);

        let form = RegistrationForm {
            name: "Asha".into(),
            ..Default::default()
        };
        assert!(flow.submit_registration(&form).await);
        assert_eq!(flow.step(), LoginStep::Complete);
        assert_eq!(flow.session().unwrap().token, "session-token");
    }

    #[tokio::test]
    async fn a_known_identifier_skips_registration() {
        let gateway = ScriptedGateway::new(Some("9876543210"));
        let mut flow = LoginFlow::new(gateway);

        reach_otp_step(&mut flow).await;
        flow.set_otp_input("123456");
        assert!(flow.submit_code().await);

        assert_eq!(flow.step(), LoginStep::Complete);
        assert!(flow.session().is_some());
    }

    #[tokio::test]
    async fn resend_is_refused_while_the_countdown_runs() {
        let gateway = ScriptedGateway::new(None);
        let clock = TestClock::new();
        let mut flow = LoginFlow::with_clock(gateway.clone(), clock.clone());

        reach_otp_step(&mut flow).await;
        assert_eq!(gateway.request_count(), 1);
        assert!(!flow.can_resend());
        assert_eq!(flow.resend_remaining_seconds(), 60);

        // Early resend must not reach the gateway.
        assert!(!flow.resend().await);
        assert_eq!(gateway.request_count(), 1);

        clock.advance(Duration::from_secs(61));
        assert!(flow.can_resend());
        assert!(flow.resend().await);
        assert_eq!(gateway.request_count(), 2);

        // The countdown restarts after a resend.
        assert!(!flow.can_resend());
    }

    #[tokio::test]
    async fn resend_clears_the_typed_code_but_failure_keeps_it() {
        let gateway = ScriptedGateway::new(None);
        let clock = TestClock::new();
        let mut flow = LoginFlow::with_clock(gateway.clone(), clock.clone());

        reach_otp_step(&mut flow).await;
        flow.set_otp_input("123456");

        gateway.fail_next_verify("incorrect code, 4 attempts remaining");
        assert!(!flow.submit_code().await);
        assert_eq!(flow.step(), LoginStep::Otp);
        assert_eq!(flow.otp_input(), "123456", "failed verify keeps the input");
        assert_eq!(flow.error(), Some("incorrect code, 4 attempts remaining"));
        assert_eq!(flow.identifier(), "9876543210");

        clock.advance(Duration::from_secs(61));
        assert!(flow.resend().await);
        assert_eq!(flow.otp_input(), "", "explicit resend clears the input");
    }

    #[tokio::test]
    async fn short_codes_are_rejected_locally() {
        let gateway = ScriptedGateway::new(None);
        let mut flow = LoginFlow::new(gateway.clone());

        reach_otp_step(&mut flow).await;
        flow.set_otp_input("123");
        assert!(!flow.submit_code().await);
        assert_eq!(flow.step(), LoginStep::Otp);
        assert!(flow.error().is_some());
    }

    #[test]
    fn otp_input_is_digit_filtered_and_capped() {
        let gateway = ScriptedGateway::new(None);
        let mut flow = LoginFlow::new(gateway);
        flow.set_otp_input(" 12a34-5678 ");
        assert_eq!(flow.otp_input(), "123456");
    }
}
