//! Remote ticket gateway.

mod client;
mod error;
mod models;

pub use client::{search_query, JiraClient};
pub use error::{classify, GatewayError, GatewayResult};
pub use models::{
    Issue, IssueDraft, IssueFields, Resolution, SearchOptions, Status, StatusCategory, Transition,
    STATUS_CATEGORY_DONE,
};

use async_trait::async_trait;

/// Operations the reconciliation engine needs from the ticket system.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketGateway: Send + Sync {
    /// Issues in `project` carrying `issue_label`, ordered by key.
    async fn search(&self, project: &str, issue_label: &str, options: &SearchOptions) -> GatewayResult<Vec<Issue>>;
    async fn get_issue(&self, id: &str) -> GatewayResult<Issue>;
    async fn create_issue(&self, draft: &IssueDraft) -> GatewayResult<Issue>;
    async fn add_comment(&self, issue_id: &str, body: &str) -> GatewayResult<()>;
    async fn transitions(&self, issue_key: &str) -> GatewayResult<Vec<Transition>>;
    async fn do_transition(&self, issue_key: &str, transition_id: &str) -> GatewayResult<()>;
}
