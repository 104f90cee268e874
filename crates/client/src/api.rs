//! The authenticated API client.
//!
//! Construction is explicit dependency injection: a base url, a
//! [`TokenProvider`] that owns credential lookup, and an optional
//! unauthorized callback fired when an authenticated call comes back
//! 401. The callback only fires if a token was actually attached, so
//! public endpoints can never trigger a logout loop.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use cybermitra_protocol::ChatMessageRequest;

use crate::reader::ChatStream;
use crate::types::{
    ApiErrorBody, AuditQuestion, AuditReport, ChatDetail, ChatSummary, Complaint, ComplaintUpdate,
    EmergencyContact, Evidence, NewComplaint, OtpRequested, Session, Station, UserProfile,
    VerifyResponse,
};
use crate::ClientError;

/// Source of the bearer token. Implementations decide where credentials
/// live; the client never reads storage on its own.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Always-anonymous provider.
pub struct NoToken;

impl TokenProvider for NoToken {
    fn token(&self) -> Option<String> {
        None
    }
}

/// A fixed token, useful for tools and tests.
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Callback invoked when an authenticated request is rejected with 401.
pub type UnauthorizedHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct ApiClientConfig {
    /// Per-request timeout for plain REST calls. The streaming endpoint
    /// is exempt and guarded by `stream_idle_timeout` instead.
    pub request_timeout: Duration,
    /// Maximum silence between stream chunks before the turn fails.
    pub stream_idle_timeout: Duration,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            stream_idle_timeout: Duration::from_secs(120),
        }
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
    on_unauthorized: Option<UnauthorizedHandler>,
    config: ApiClientConfig,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        tokens: Arc<dyn TokenProvider>,
        on_unauthorized: Option<UnauthorizedHandler>,
    ) -> Result<Self, ClientError> {
        Self::with_config(base_url, tokens, on_unauthorized, ApiClientConfig::default())
    }

    pub fn with_config(
        base_url: &str,
        tokens: Arc<dyn TokenProvider>,
        on_unauthorized: Option<UnauthorizedHandler>,
        config: ApiClientConfig,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        let http = reqwest::Client::builder()
            .user_agent("cybermitra-client")
            .build()?;

        Ok(Self {
            http,
            base_url,
            tokens,
            on_unauthorized,
            config,
        })
    }

    // ── auth ────────────────────────────────────────────────────────

    pub async fn request_otp(&self, identifier: &str) -> Result<OtpRequested, ClientError> {
        self.post_json(
            "api/auth/otp/request",
            &serde_json::json!({ "identifier": identifier }),
        )
        .await
    }

    pub async fn verify_otp(
        &self,
        identifier: &str,
        code: &str,
    ) -> Result<VerifyResponse, ClientError> {
        self.post_json(
            "api/auth/otp/verify",
            &serde_json::json!({ "identifier": identifier, "code": code }),
        )
        .await
    }

    pub async fn register(
        &self,
        registration_token: &str,
        profile: &serde_json::Value,
    ) -> Result<Session, ClientError> {
        let mut body = profile.clone();
        body["registration_token"] = serde_json::json!(registration_token);
        self.post_json("api/auth/register", &body).await
    }

    pub async fn me(&self) -> Result<UserProfile, ClientError> {
        self.get_json("api/auth/me", &[]).await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let request = self.request(Method::POST, "api/auth/logout")?;
        self.send(request, true).await?;
        Ok(())
    }

    // ── chat ────────────────────────────────────────────────────────

    pub async fn list_chats(&self) -> Result<Vec<ChatSummary>, ClientError> {
        self.get_json("api/chats", &[]).await
    }

    pub async fn chat(&self, chat_id: i64) -> Result<ChatDetail, ClientError> {
        self.get_json(&format!("api/chats/{chat_id}"), &[]).await
    }

    pub async fn delete_chat(&self, chat_id: i64) -> Result<(), ClientError> {
        let request = self.request(Method::DELETE, &format!("api/chats/{chat_id}"))?;
        self.send(request, true).await?;
        Ok(())
    }

    /// Send one chat message and stream the assistant's turn back.
    pub async fn send_message(
        &self,
        message: ChatMessageRequest,
    ) -> Result<ChatStream, ClientError> {
        // No overall request timeout here: a turn may legitimately take
        // longer than a REST call. The idle timeout guards the stream.
        let url = self
            .base_url
            .join("api/chats/messages")
            .map_err(|e| ClientError::InvalidBaseUrl(e.to_string()))?;
        let request = self.http.request(Method::POST, url).json(&message);
        let response = self.send(request, true).await?;

        debug!("chat stream opened");
        let source = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ClientError::from))
            .boxed();
        Ok(ChatStream::new(
            source,
            Some(self.config.stream_idle_timeout),
        ))
    }

    // ── complaints & evidence ───────────────────────────────────────

    pub async fn list_complaints(&self) -> Result<Vec<Complaint>, ClientError> {
        self.get_json("api/complaints", &[]).await
    }

    pub async fn create_complaint(&self, complaint: &NewComplaint) -> Result<Complaint, ClientError> {
        self.post_json("api/complaints", complaint).await
    }

    pub async fn complaint(&self, complaint_id: &str) -> Result<Complaint, ClientError> {
        self.get_json(&format!("api/complaints/{complaint_id}"), &[])
            .await
    }

    pub async fn update_complaint(
        &self,
        complaint_id: &str,
        update: &ComplaintUpdate,
    ) -> Result<Complaint, ClientError> {
        let request = self
            .request(Method::PUT, &format!("api/complaints/{complaint_id}"))?
            .json(update);
        let response = self.send(request, true).await?;
        Ok(response.json().await?)
    }

    pub async fn delete_complaint(&self, complaint_id: &str) -> Result<(), ClientError> {
        let request = self.request(Method::DELETE, &format!("api/complaints/{complaint_id}"))?;
        self.send(request, true).await?;
        Ok(())
    }

    pub async fn upload_evidence(
        &self,
        complaint_id: &str,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<Evidence, ClientError> {
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = self
            .request(Method::POST, &format!("api/complaints/{complaint_id}/evidence"))?
            .multipart(form);
        let response = self.send(request, true).await?;
        Ok(response.json().await?)
    }

    pub async fn list_evidence(&self, complaint_id: &str) -> Result<Vec<Evidence>, ClientError> {
        self.get_json(&format!("api/complaints/{complaint_id}/evidence"), &[])
            .await
    }

    pub async fn download_evidence(&self, evidence_id: &str) -> Result<Vec<u8>, ClientError> {
        let request = self.request(Method::GET, &format!("api/evidence/{evidence_id}/download"))?;
        let response = self.send(request, true).await?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn delete_evidence(&self, evidence_id: &str) -> Result<(), ClientError> {
        let request = self.request(Method::DELETE, &format!("api/evidence/{evidence_id}"))?;
        self.send(request, true).await?;
        Ok(())
    }

    // ── directories & audit ─────────────────────────────────────────

    pub async fn search_stations(
        &self,
        state: Option<&str>,
        district: Option<&str>,
        text: Option<&str>,
    ) -> Result<Vec<Station>, ClientError> {
        let mut query = Vec::new();
        if let Some(state) = state {
            query.push(("state", state));
        }
        if let Some(district) = district {
            query.push(("district", district));
        }
        if let Some(text) = text {
            query.push(("q", text));
        }
        self.get_json("api/stations", &query).await
    }

    pub async fn emergency_panel(&self) -> Result<Vec<EmergencyContact>, ClientError> {
        self.get_json("api/emergency", &[]).await
    }

    pub async fn audit_questions(&self) -> Result<Vec<AuditQuestion>, ClientError> {
        self.get_json("api/audit/questions", &[]).await
    }

    pub async fn run_audit(
        &self,
        answers: &BTreeMap<String, bool>,
    ) -> Result<AuditReport, ClientError> {
        self.post_json("api/audit/run", &serde_json::json!({ "answers": answers }))
            .await
    }

    // ── plumbing ────────────────────────────────────────────────────

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{path}: {e}")))?;
        Ok(self
            .http
            .request(method, url)
            .timeout(self.config.request_timeout))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let request = self.request(Method::GET, path)?.query(query);
        let response = self.send(request, true).await?;
        Ok(response.json().await?)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let request = self.request(Method::POST, path)?.json(body);
        let response = self.send(request, true).await?;
        Ok(response.json().await?)
    }

    /// Attach credentials, run the request, and translate failures.
    ///
    /// `authenticated` only controls whether a token is attached when
    /// available; endpoints that are public on the server simply never
    /// see a 401.
    async fn send(
        &self,
        mut request: RequestBuilder,
        authenticated: bool,
    ) -> Result<reqwest::Response, ClientError> {
        let mut token_attached = false;
        if authenticated {
            if let Some(token) = self.tokens.token() {
                token_attached = true;
                request = request.bearer_auth(token);
            }
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            // Only a rejected credential means the session is dead; an
            // anonymous 401 must not knock the client into logout.
            if token_attached {
                if let Some(handler) = &self.on_unauthorized {
                    handler();
                }
            }
            return Err(ClientError::Unauthorized);
        }

        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .map(|body| body.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}
