use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::types::PreferenceItem;
use super::OnboardingService;

/// HTTP implementation of the onboarding service contract.
pub struct RestOnboardingService {
    client: Client,
    base_url: String,
}

impl RestOnboardingService {
    pub fn new(base_url: &str, request_timeout_ms: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms))
            .pool_max_idle_per_host(4)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_items(&self, url: &str, what: &str) -> Result<Vec<PreferenceItem>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {what} failed"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GET {what} failed ({status}): {body}");
        }
        resp.json()
            .await
            .with_context(|| format!("failed to parse {what} response"))
    }
}

#[async_trait]
impl OnboardingService for RestOnboardingService {
    async fn list_program_activities(&self, program_id: &str) -> Result<Vec<PreferenceItem>> {
        let url = format!("{}/api/programs/{}/onboarding", self.base_url, program_id);
        self.get_items(&url, "program activities").await
    }

    async fn list_user_preferences(
        &self,
        page: u32,
        program_id: &str,
        keyword: Option<&str>,
    ) -> Result<Vec<PreferenceItem>> {
        let mut url = format!(
            "{}/api/preferences?page={}&program_id={}",
            self.base_url, page, program_id
        );
        if let Some(keyword) = keyword {
            url.push_str("&keyword=");
            url.push_str(keyword);
        }
        self.get_items(&url, "user preferences").await
    }

    async fn clone_items(&self, items: &[PreferenceItem]) -> Result<Vec<PreferenceItem>> {
        let url = format!("{}/api/moments/clone", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(items)
            .send()
            .await
            .context("clone request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("clone failed ({status}): {body}");
        }
        resp.json().await.context("failed to parse clone response")
    }
}
