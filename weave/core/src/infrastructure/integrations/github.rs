// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! GitHub Source Control Adapter
//!
//! Marks commits with a `weave/coherence` status and, for commits that belong
//! to a pull request, applies a coherence label (creating it on first use).

use async_trait::async_trait;
use serde_json::json;
use std::sync::OnceLock;
use tracing::Level;
use url::Url;

use super::http;
use crate::domain::field::CommitMade;
use crate::domain::integration::{Integration, IntegrationError, IntegrationKind, Label, SourceControl};
use crate::domain::weave_config::{resolve_secret, GitHubConfig};

const NAME: &str = "GitHub";
pub const STATUS_CONTEXT: &str = "weave/coherence";
const API_VERSION: &str = "2022-11-28";

struct Credentials {
    token: String,
    repository: String,
}

/// Label describing a coherence reading.
pub fn coherence_label(coherence: f64) -> Label {
    let (name, color, description) = if coherence >= 75.0 {
        ("coherence: high", "2ecc71", "Committed while field coherence was 75% or above")
    } else if coherence >= 50.0 {
        ("coherence: balanced", "f1c40f", "Committed while field coherence was between 50% and 75%")
    } else {
        ("coherence: seeking", "e67e22", "Committed while field coherence was below 50%")
    };

    Label {
        name: name.to_string(),
        color: color.to_string(),
        description: Some(description.to_string()),
    }
}

/// Commit status state for a coherence reading.
pub fn status_state(coherence: f64) -> &'static str {
    if coherence >= 50.0 {
        "success"
    } else {
        "pending"
    }
}

pub struct GitHubIntegration {
    config: GitHubConfig,
    client: reqwest::Client,
    credentials: OnceLock<Credentials>,
}

impl GitHubIntegration {
    pub fn new(config: GitHubConfig) -> Self {
        Self {
            config,
            client: http::client(),
            credentials: OnceLock::new(),
        }
    }

    fn credentials(&self) -> Result<&Credentials, IntegrationError> {
        self.credentials
            .get()
            .ok_or_else(|| IntegrationError::NotInitialized(NAME.to_string()))
    }

    /// `<api>/repos/<owner>/<name>/<segments...>` with each segment escaped.
    fn repo_url(&self, segments: &[&str]) -> Result<Url, IntegrationError> {
        let credentials = self.credentials()?;
        let mut url = Url::parse(&format!(
            "{}/repos/{}",
            http::trim_base(&self.config.api_url),
            credentials.repository
        ))
        .map_err(|e| IntegrationError::configuration(NAME, format!("invalid API URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| IntegrationError::configuration(NAME, "API URL cannot be a base"))?
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> Result<reqwest::RequestBuilder, IntegrationError> {
        let credentials = self.credentials()?;
        Ok(self
            .client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", credentials.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION))
    }

    async fn label_pull_request(&self, number: u64, label: &Label) -> Result<(), IntegrationError> {
        let url = self.repo_url(&["issues", &number.to_string(), "labels"])?;
        let response = self
            .request(reqwest::Method::POST, url)?
            .json(&json!({ "labels": [label.name] }))
            .send()
            .await?;

        http::check(NAME, response).await?;
        Ok(())
    }
}

#[async_trait]
impl Integration for GitHubIntegration {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::SourceControl
    }

    fn name(&self) -> &str {
        NAME
    }

    async fn initialize(&self) -> Result<(), IntegrationError> {
        let token = resolve_secret(&self.config.token)
            .ok_or_else(|| IntegrationError::configuration(NAME, "GITHUB_TOKEN is not set"))?;
        let repository = self
            .config
            .repository
            .clone()
            .filter(|r| r.contains('/'))
            .ok_or_else(|| IntegrationError::configuration(NAME, "GITHUB_REPOSITORY must be 'owner/name'"))?;

        self.log(Level::INFO, &format!("Connected to {}", repository));
        let _ = self.credentials.set(Credentials { token, repository });
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), IntegrationError> {
        Ok(())
    }
}

#[async_trait]
impl SourceControl for GitHubIntegration {
    async fn annotate_commit(&self, commit: &CommitMade, coherence: f64) -> Result<(), IntegrationError> {
        let url = self.repo_url(&["statuses", &commit.sha])?;
        let response = self
            .request(reqwest::Method::POST, url)?
            .json(&json!({
                "state": status_state(coherence),
                "context": STATUS_CONTEXT,
                "description": format!("Field coherence {:.1}%", coherence),
            }))
            .send()
            .await?;
        http::check(NAME, response).await?;

        if let Some(number) = commit.pull_request {
            let label = coherence_label(coherence);
            self.ensure_label(&label).await?;
            self.label_pull_request(number, &label).await?;
        }

        self.log(
            Level::DEBUG,
            &format!("Annotated {} at {:.1}% coherence", commit.sha, coherence),
        );
        Ok(())
    }

    async fn ensure_label(&self, label: &Label) -> Result<bool, IntegrationError> {
        let url = self.repo_url(&["labels", &label.name])?;
        let response = self.request(reqwest::Method::GET, url)?.send().await?;

        if response.status() != reqwest::StatusCode::NOT_FOUND {
            http::check(NAME, response).await?;
            return Ok(false);
        }

        let url = self.repo_url(&["labels"])?;
        let response = self
            .request(reqwest::Method::POST, url)?
            .json(label)
            .send()
            .await?;
        http::check(NAME, response).await?;

        self.log(Level::INFO, &format!("Created label '{}'", label.name));
        Ok(true)
    }
}
