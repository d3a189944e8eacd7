//! Jira REST API v2 client.

use async_trait::async_trait;
use reqwest::{header::HeaderMap, header::RETRY_AFTER, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

use super::{
    error::{GatewayError, GatewayResult},
    models::{Issue, IssueDraft, SearchOptions, Transition},
    TicketGateway,
};
use crate::{config::ApiConfig, identity, Error, Result};

pub struct JiraClient {
    base_url: Url,
    user: String,
    password: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct TransitionsResponse {
    #[serde(default)]
    transitions: Vec<Transition>,
}

/// JQL matching issues labelled with `issue_label` in `project`.
pub fn search_query(project: &str, issue_label: &str) -> String {
    format!(
        "project={} and labels={} order by key",
        project,
        identity::quote(issue_label)
    )
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl JiraClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("Invalid JIRA URL {}: {}", config.url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            user: config.user.clone(),
            password: config.password.clone(),
            client,
        })
    }

    fn endpoint(&self, api: &'static str, path: &str) -> GatewayResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| GatewayError::permanent(api, format!("invalid endpoint {}: {}", path, e)))
    }

    async fn execute(&self, api: &'static str, request: RequestBuilder) -> GatewayResult<Response> {
        let response = request
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(|e| {
                error!("handleJiraError: api={}, err={}", api, e);
                GatewayError::transport(api, e)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = parse_retry_after(response.headers());
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        error!("handleJiraError: api={}, url={}, status={}", api, url, status);
        Err(GatewayError::from_status(api, &url, status.as_u16(), retry_after, &body))
    }

    async fn execute_json<T: DeserializeOwned>(&self, api: &'static str, request: RequestBuilder) -> GatewayResult<T> {
        self.execute(api, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| GatewayError::transport(api, format!("invalid response body: {}", e)))
    }
}

#[async_trait]
impl TicketGateway for JiraClient {
    async fn search(&self, project: &str, issue_label: &str, options: &SearchOptions) -> GatewayResult<Vec<Issue>> {
        let api = "Issue.Search";
        let query = search_query(project, issue_label);
        info!("search: query={} options={:?}", query, options);

        let url = self.endpoint(api, "rest/api/2/search")?;
        let request = self.client.get(url).query(&[
            ("jql", query),
            ("fields", options.fields.join(",")),
            ("maxResults", options.max_results.to_string()),
        ]);
        let response: SearchResponse = self.execute_json(api, request).await?;
        Ok(response.issues)
    }

    async fn get_issue(&self, id: &str) -> GatewayResult<Issue> {
        let api = "Issue.Get";
        debug!("get: id={}", id);
        let url = self.endpoint(api, &format!("rest/api/2/issue/{}", id))?;
        self.execute_json(api, self.client.get(url)).await
    }

    async fn create_issue(&self, draft: &IssueDraft) -> GatewayResult<Issue> {
        let api = "Issue.Create";
        info!("create: issue={:?}", draft);
        let url = self.endpoint(api, "rest/api/2/issue")?;
        let issue: Issue = self
            .execute_json(api, self.client.post(url).json(&draft.to_request()))
            .await?;
        info!("  done: key={} ID={}", issue.key, issue.id);
        Ok(issue)
    }

    async fn add_comment(&self, issue_id: &str, body: &str) -> GatewayResult<()> {
        let api = "Issue.AddComment";
        debug!("comment: id={}", issue_id);
        let url = self.endpoint(api, &format!("rest/api/2/issue/{}/comment", issue_id))?;
        self.execute(api, self.client.post(url).json(&json!({ "body": body })))
            .await?;
        Ok(())
    }

    async fn transitions(&self, issue_key: &str) -> GatewayResult<Vec<Transition>> {
        let api = "Issue.GetTransitions";
        let url = self.endpoint(api, &format!("rest/api/2/issue/{}/transitions", issue_key))?;
        let response: TransitionsResponse = self.execute_json(api, self.client.get(url)).await?;
        Ok(response.transitions)
    }

    async fn do_transition(&self, issue_key: &str, transition_id: &str) -> GatewayResult<()> {
        let api = "Issue.DoTransition";
        info!("reopen: issueKey={} transitionID={}", issue_key, transition_id);
        let url = self.endpoint(api, &format!("rest/api/2/issue/{}/transitions", issue_key))?;
        let body = json!({ "transition": { "id": transition_id } });
        self.execute(api, self.client.post(url).json(&body)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn api_config(url: &str) -> ApiConfig {
        ApiConfig {
            url: url.into(),
            user: "jirauser".into(),
            password: "secret".into(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_search_query_quotes_label() {
        assert_eq!(
            search_query("AB", r#"ALERT{alertname="Disk"}"#),
            r#"project=AB and labels="ALERT{alertname=\"Disk\"}" order by key"#
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = JiraClient::new(&api_config("https://example.com/jira")).unwrap();
        let url = client.endpoint("Issue.Get", "rest/api/2/issue/10001").unwrap();
        assert_eq!(url.as_str(), "https://example.com/jira/rest/api/2/issue/10001");
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        assert!(matches!(JiraClient::new(&api_config("not a url")), Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(120)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }
}
