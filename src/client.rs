// src/client.rs

//! Client side of the HTTP boundary, used by exam sessions.

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::models::{
    exam::PublicExam,
    result::{ResultView, SubmissionSummary, SubmitExamRequest, SubmitResponse},
    user::{LoginResponse, UserSummary},
};

/// Uniform error for every call: the HTTP status plus the server's message.
/// Transport failures (no response at all) use status 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.status == 0 {
            write!(f, "network error: {}", self.message)
        } else {
            write!(f, "{} ({})", self.message, self.status)
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ApiError {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => ApiError::transport(err.to_string()),
        }
    }
}

/// What an exam session needs from the server.
#[async_trait]
pub trait ExamApi: Send + Sync {
    /// The exam as the current user may see it. Answer keys, if the server
    /// sent any, are dropped while decoding.
    async fn fetch_exam(&self, exam_id: i64) -> Result<PublicExam, ApiError>;

    async fn submit_exam(&self, request: &SubmitExamRequest) -> Result<SubmissionSummary, ApiError>;
}

/// `reqwest` implementation talking to this crate's router.
#[derive(Clone)]
pub struct HttpExamApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpExamApi {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:5000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Logs in and keeps the issued token for later calls.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<UserSummary, ApiError> {
        let request = self
            .client
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }));
        let response: LoginResponse = self.send(request).await?;
        self.token = Some(response.token);
        Ok(response.user)
    }

    pub async fn list_exams(&self) -> Result<Vec<PublicExam>, ApiError> {
        self.send(self.client.get(self.url("/exams"))).await
    }

    pub async fn my_results(&self) -> Result<Vec<ResultView>, ApiError> {
        self.send(self.client.get(self.url("/results/my-results"))).await
    }

    pub async fn all_results(&self) -> Result<Vec<ResultView>, ApiError> {
        self.send(self.client.get(self.url("/results/all"))).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });

        tracing::debug!(status = status.as_u16(), %message, "API call failed");

        Err(ApiError {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ExamApi for HttpExamApi {
    async fn fetch_exam(&self, exam_id: i64) -> Result<PublicExam, ApiError> {
        self.send(self.client.get(self.url(&format!("/exams/{exam_id}"))))
            .await
    }

    async fn submit_exam(&self, request: &SubmitExamRequest) -> Result<SubmissionSummary, ApiError> {
        let response: SubmitResponse = self
            .send(self.client.post(self.url("/results/submit")).json(request))
            .await?;
        Ok(response.result)
    }
}
