// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Replicate Image Generation Adapter
//!
//! Creates a prediction against the model's latest version, waits for it to
//! reach a terminal state, downloads the first output and stores it under
//! the visions directory as `<safe-name>-<metric>pct-<timestamp>.png`.
//! Old visions are pruned on request by modification time.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{LazyLock, OnceLock};
use std::time::{Duration, SystemTime};
use tracing::Level;

use super::http;
use crate::domain::integration::{
    Artifact, ArtifactGenerator, ArtifactRequest, Integration, IntegrationError, IntegrationKind,
};
use crate::domain::weave_config::{resolve_secret, ReplicateConfig};

const NAME: &str = "Replicate";
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

const NEGATIVE_PROMPT: &str = "text, words, letters, numbers, signatures, watermarks";

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9-]").expect("valid regex"));

#[derive(Serialize)]
struct PredictionRequest {
    input: PredictionInput,
}

#[derive(Serialize)]
struct PredictionInput {
    prompt: String,
    negative_prompt: &'static str,
    width: u32,
    height: u32,
    aspect_ratio: &'static str,
    num_outputs: u32,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: String,
    status: String,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: String,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }

    /// First output URL, whether the model returns one string or a list.
    fn first_output(&self) -> Option<String> {
        match self.output.as_ref()? {
            serde_json::Value::String(url) if !url.is_empty() => Some(url.clone()),
            serde_json::Value::Array(items) => items
                .iter()
                .find_map(|item| item.as_str().filter(|s| !s.is_empty()).map(str::to_string)),
            _ => None,
        }
    }
}

/// `<safe-name>-<metric>pct-<timestamp>.png`, with every character outside
/// `[a-zA-Z0-9-]` in the name replaced by `-` and `:`/`.` in the ISO
/// timestamp replaced by `-`.
pub fn vision_filename(name: &str, metric: f64, timestamp: DateTime<Utc>) -> String {
    let safe_name = if name.is_empty() {
        "vision".to_string()
    } else {
        UNSAFE_CHARS.replace_all(name, "-").into_owned()
    };
    let stamp = timestamp
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");

    format!("{}-{}pct-{}.png", safe_name, metric.round() as i64, stamp)
}

pub struct ReplicateIntegration {
    config: ReplicateConfig,
    client: reqwest::Client,
    api_token: OnceLock<String>,
    visions_dir: PathBuf,
}

impl ReplicateIntegration {
    pub fn new(config: ReplicateConfig) -> Self {
        let visions_dir = config.resolved_visions_dir();
        Self {
            config,
            client: http::client(),
            api_token: OnceLock::new(),
            visions_dir,
        }
    }

    pub fn visions_dir(&self) -> &PathBuf {
        &self.visions_dir
    }

    fn full_prompt(&self, prompt: &str) -> String {
        if self.config.style_suffix.is_empty() {
            prompt.to_string()
        } else {
            format!("{}, {}", prompt, self.config.style_suffix)
        }
    }

    async fn create_prediction(&self, token: &str, request: &ArtifactRequest, prompt: String) -> Result<(u16, Prediction), IntegrationError> {
        let (width, height) = request.size.dimensions();
        let body = PredictionRequest {
            input: PredictionInput {
                prompt,
                negative_prompt: NEGATIVE_PROMPT,
                width,
                height,
                aspect_ratio: request.size.aspect_ratio(),
                num_outputs: 1,
            },
        };

        let url = format!(
            "{}/models/{}/predictions",
            http::trim_base(&self.config.api_url),
            self.config.model
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await?;

        let response = http::check(NAME, response).await?;
        let status = response.status().as_u16();
        Ok((status, response.json().await?))
    }

    async fn wait_for(&self, token: &str, mut status: u16, mut prediction: Prediction) -> Result<(u16, Prediction), IntegrationError> {
        let mut polls = 0;
        while !prediction.is_terminal() {
            if polls >= self.config.max_polls {
                return Err(IntegrationError::Timeout(Duration::from_millis(
                    self.config.poll_interval_ms * u64::from(self.config.max_polls),
                )));
            }
            let Some(get_url) = prediction.urls.as_ref().map(|u| u.get.clone()) else {
                return Err(IntegrationError::InvalidPayload(format!(
                    "prediction {} is {} but has no poll URL",
                    prediction.id, prediction.status
                )));
            };

            tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
            polls += 1;

            let response = self
                .client
                .get(&get_url)
                .header("Authorization", format!("Bearer {}", token))
                .send()
                .await?;
            let response = http::check(NAME, response).await?;
            status = response.status().as_u16();
            prediction = response.json().await?;
        }

        Ok((status, prediction))
    }

    /// Delete files in the visions directory last modified more than
    /// `days_to_keep` days ago and return how many went. Needs no token.
    pub async fn cleanup_old_visions(&self, days_to_keep: u32) -> Result<usize, IntegrationError> {
        let keep = Duration::from_secs(u64::from(days_to_keep) * SECONDS_PER_DAY);
        let cutoff = SystemTime::now().checked_sub(keep).unwrap_or(SystemTime::UNIX_EPOCH);

        let mut entries = match tokio::fs::read_dir(&self.visions_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() || metadata.modified()? >= cutoff {
                continue;
            }
            tokio::fs::remove_file(entry.path()).await?;
            removed += 1;
        }

        if removed > 0 {
            self.log(Level::INFO, &format!("Cleaned {} old vision files", removed));
        }
        Ok(removed)
    }

    async fn download(&self, url: &str, filename: &str) -> Result<PathBuf, IntegrationError> {
        let response = self.client.get(url).send().await?;
        let bytes = http::check(NAME, response).await?.bytes().await?;

        tokio::fs::create_dir_all(&self.visions_dir).await?;
        let path = self.visions_dir.join(filename);
        tokio::fs::write(&path, &bytes).await?;
        Ok(path)
    }
}

#[async_trait]
impl Integration for ReplicateIntegration {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::ImageGeneration
    }

    fn name(&self) -> &str {
        NAME
    }

    async fn initialize(&self) -> Result<(), IntegrationError> {
        let token = resolve_secret(&self.config.api_token)
            .ok_or_else(|| IntegrationError::configuration(NAME, "REPLICATE_API_TOKEN is not set"))?;

        tokio::fs::create_dir_all(&self.visions_dir).await?;
        let _ = self.api_token.set(token);

        self.log(
            Level::INFO,
            &format!("Vision generator ready ({}) at {}", self.config.model, self.visions_dir.display()),
        );
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), IntegrationError> {
        Ok(())
    }
}

#[async_trait]
impl ArtifactGenerator for ReplicateIntegration {
    async fn generate(&self, request: &ArtifactRequest) -> Result<Artifact, IntegrationError> {
        let token = self
            .api_token
            .get()
            .ok_or_else(|| IntegrationError::NotInitialized(NAME.to_string()))?;

        let prompt = self.full_prompt(&request.prompt);
        self.log(
            Level::DEBUG,
            &format!("Generating '{}': {}", request.name, prompt.chars().take(100).collect::<String>()),
        );

        let (status, prediction) = self.create_prediction(token, request, prompt.clone()).await?;
        let (status, prediction) = self.wait_for(token, status, prediction).await?;

        if prediction.status != "succeeded" {
            let reason = prediction
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| prediction.status.clone());
            return Err(IntegrationError::Api {
                service: NAME.to_string(),
                status,
                body: format!("prediction {} {}: {}", prediction.id, prediction.status, reason),
            });
        }

        let remote_url = prediction
            .first_output()
            .ok_or_else(|| IntegrationError::EmptyResult(NAME.to_string()))?;

        let timestamp = Utc::now();
        let filename = vision_filename(&request.name, request.metric, timestamp);
        let local_path = self.download(&remote_url, &filename).await?;

        self.log(Level::INFO, &format!("Vision saved: {}", filename));

        Ok(Artifact {
            remote_url,
            local_path,
            prompt,
            metric_value: request.metric,
            timestamp,
        })
    }
}
