use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::api::{
    AuthResponse, ErrorResponse, LoginRequest, ProfileResponse, RegisterRequest,
};
use crate::db::models::PublicUser;
use crate::error::ClientError;

/// Asks the server whether a bearer token is still accepted.
///
/// Implementations return [`ClientError::SessionInvalid`] when the server
/// rejects the token and [`ClientError::NetworkError`] when it could not be
/// asked at all.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<PublicUser, ClientError>;
}

/// HTTP client for the `/api` endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    async fn rejection(response: Response) -> ClientError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => "unexpected response".to_string(),
        };
        ClientError::Rejected { status, message }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let response = self
            .http
            .post(self.endpoint("/api/login")?)
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(response.json().await?)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        let response = self
            .http
            .post(self.endpoint("/api/register")?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(response.json().await?)
    }

    /// Tell the server to drop the session. Failures are only logged; the
    /// local logout proceeds regardless.
    pub async fn logout(&self, token: &str) {
        let result = async {
            self.http
                .post(self.endpoint("/api/logout")?)
                .bearer_auth(token)
                .send()
                .await?
                .error_for_status()?;
            Ok::<(), ClientError>(())
        }
        .await;

        if let Err(e) = result {
            warn!("Server logout failed: {}", e);
        }
    }
}

#[async_trait]
impl SessionVerifier for ApiClient {
    async fn verify(&self, token: &str) -> Result<PublicUser, ClientError> {
        let response = self
            .http
            .get(self.endpoint("/api/user/profile")?)
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: ProfileResponse = response.json().await?;
                debug!("Session verified for user {}", body.user.id);
                Ok(body.user)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClientError::SessionInvalid),
            status if status.is_server_error() => {
                Err(ClientError::NetworkError(format!("server responded {}", status)))
            }
            _ => Err(Self::rejection(response).await),
        }
    }
}
