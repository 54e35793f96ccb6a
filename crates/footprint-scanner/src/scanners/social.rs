use super::{api_client, body_excerpt, send_with_rate_limit_retry, ScanOutput, Scanner};
use crate::error::{Result, ScannerError};
use async_trait::async_trait;
use footprint_core::{ApiConfig, ScanCategory, ScanningConfig};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

const USER_FIELDS: &str =
    "public_metrics,description,created_at,location,profile_image_url,verified";

/// Profile lookup on the Twitter v2 API.
pub struct SocialProfileScanner {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    max_retry_after: Duration,
    username: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    data: Option<TwitterUser>,
    #[serde(default)]
    errors: Vec<ApiProblem>,
}

#[derive(Debug, Deserialize)]
struct ApiProblem {
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwitterUser {
    id: String,
    name: String,
    username: String,
    created_at: Option<String>,
    description: Option<String>,
    location: Option<String>,
    #[serde(default)]
    verified: bool,
    profile_image_url: Option<String>,
    #[serde(default)]
    public_metrics: PublicMetrics,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    followers_count: u64,
    #[serde(default)]
    following_count: u64,
    #[serde(default)]
    tweet_count: u64,
    #[serde(default)]
    listed_count: u64,
}

/// Profile as stored in the aggregate result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocialProfile {
    /// Always true; a missing user is an error
    pub found: bool,
    /// Numeric account id
    pub id: String,
    /// Display name
    pub name: String,
    /// Handle
    pub username: String,
    /// Account creation time
    pub created_at: Option<String>,
    /// Bio
    pub description: Option<String>,
    /// Free-form location
    pub location: Option<String>,
    /// Verification badge
    pub verified: bool,
    /// Avatar URL
    pub profile_image_url: Option<String>,
    /// Follower count
    pub followers: u64,
    /// Following count
    pub following: u64,
    /// Tweet count
    pub tweet_count: u64,
    /// Lists the account is on
    pub listed_count: u64,
}

impl From<TwitterUser> for SocialProfile {
    fn from(user: TwitterUser) -> Self {
        Self {
            found: true,
            id: user.id,
            name: user.name,
            username: user.username,
            created_at: user.created_at,
            description: user.description,
            location: user.location,
            verified: user.verified,
            profile_image_url: user.profile_image_url,
            followers: user.public_metrics.followers_count,
            following: user.public_metrics.following_count,
            tweet_count: user.public_metrics.tweet_count,
            listed_count: user.public_metrics.listed_count,
        }
    }
}

impl SocialProfileScanner {
    /// Bind a handle to the configured API.
    pub fn new(
        apis: &ApiConfig,
        scanning: &ScanningConfig,
        username: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: api_client(
                ScanCategory::SocialProfile.display_name(),
                apis,
                &scanning.user_agent,
            )?,
            base_url: apis.twitter_base_url.trim_end_matches('/').to_string(),
            bearer_token: apis
                .twitter_bearer_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
            max_retry_after: Duration::from_secs(scanning.max_retry_after_secs),
            username: username.into().trim().trim_start_matches('@').to_string(),
        })
    }
}

#[async_trait]
impl Scanner for SocialProfileScanner {
    fn category(&self) -> ScanCategory {
        ScanCategory::SocialProfile
    }

    async fn scan(&self) -> Result<ScanOutput> {
        let name = self.name();
        let Some(token) = self.bearer_token.as_deref() else {
            return Err(ScannerError::authentication(
                name,
                "Twitter bearer token not provided, skipping profile lookup",
            ));
        };
        if self.username.is_empty() {
            return Err(ScannerError::invalid_input(name, "username is empty"));
        }

        let url = format!("{}/2/users/by/username/{}", self.base_url, self.username);
        let response = send_with_rate_limit_retry(name, self.max_retry_after, || {
            self.client
                .get(&url)
                .bearer_auth(token)
                .query(&[("user.fields", USER_FIELDS)])
        })
        .await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ScannerError::authentication(name, "Twitter rejected the bearer token"));
            }
            other => {
                let excerpt = body_excerpt(response).await;
                return Err(ScannerError::api(
                    name,
                    other.as_u16(),
                    format!("Twitter API error: status {}, response: {excerpt}", other.as_u16()),
                ));
            }
        }

        let body: UserResponse = response.json().await.map_err(|e| ScannerError::Parsing {
            scanner: name.to_string(),
            message: "Twitter API returned an unexpected body".to_string(),
            source: Some(Box::new(e)),
        })?;

        let Some(user) = body.data else {
            let detail = body
                .errors
                .into_iter()
                .find_map(|p| p.detail)
                .unwrap_or_else(|| "User not found.".to_string());
            return Err(ScannerError::Api {
                scanner: name.to_string(),
                message: detail,
                status: Some(StatusCode::OK.as_u16()),
            });
        };

        let profile = SocialProfile::from(user);
        info!(username = %profile.username, followers = profile.followers, "profile found");

        let data = serde_json::to_value(&profile)
            .map_err(|e| ScannerError::internal(name, e.to_string()))?;
        Ok(ScanOutput::new(data)
            .with_keyword("name", profile.name.clone())
            .with_keyword("location", profile.location.clone().unwrap_or_default()))
    }
}
