pub mod rest;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use types::PreferenceItem;

/// Functional contract of the remote onboarding data service. The feed
/// engine only depends on this seam; transport lives behind it.
#[async_trait]
pub trait OnboardingService: Send + Sync {
    /// All onboarding items for one program, across all participants.
    /// One-shot: the result is never paged.
    async fn list_program_activities(&self, program_id: &str) -> Result<Vec<PreferenceItem>>;

    /// One page of the current user's items across programs. An empty
    /// result signals end-of-data.
    async fn list_user_preferences(
        &self,
        page: u32,
        program_id: &str,
        keyword: Option<&str>,
    ) -> Result<Vec<PreferenceItem>>;

    /// Clone a batch of picker selections into new items with fresh
    /// identities. Returned order is not guaranteed to match the input.
    async fn clone_items(&self, items: &[PreferenceItem]) -> Result<Vec<PreferenceItem>>;
}
