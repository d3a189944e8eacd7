//! Alert to issue reconciliation.
//!
//! For every alert of a group the engine makes sure exactly one open Jira
//! issue exists: it creates one, reopens a resolved one, or leaves an open
//! one alone. The lookup cache is only a hint; every cached id is confirmed
//! with Jira before it is trusted.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::{
    alertmanager::{Alert, Data},
    cache::LookupCache,
    config::ReceiverConfig,
    identity,
    jira::{Issue, IssueDraft, SearchOptions, TicketGateway},
    template::TemplateEngine,
    Error, ErrorKind, LabelFailure, Result,
};

/// Outcome for a single issue label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusNotify {
    pub status: u16,
    pub error: Option<String>,
    #[serde(rename = "retry_after_secs", skip_serializing_if = "Option::is_none", serialize_with = "as_secs")]
    pub retry_after: Option<Duration>,
}

fn as_secs<S: serde::Serializer>(value: &Option<Duration>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_some(&d.as_secs()),
        None => serializer.serialize_none(),
    }
}

impl StatusNotify {
    pub fn ok() -> Self {
        Self {
            status: 200,
            error: None,
            retry_after: None,
        }
    }

    pub fn failed(err: &Error) -> Self {
        let kind = err.kind();
        let retry_after = match kind {
            ErrorKind::Temporary { retry_after } => retry_after,
            ErrorKind::Permanent => None,
        };
        Self {
            status: kind.status_code().as_u16(),
            error: Some(err.to_string()),
            retry_after,
        }
    }

    fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::failed(&e),
        }
    }
}

/// Per-label outcomes of one group, ordered by label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Outcomes(BTreeMap<String, StatusNotify>);

impl Outcomes {
    pub fn record(&mut self, issue_label: String, outcome: StatusNotify) {
        self.0.insert(issue_label, outcome);
    }

    pub fn get(&self, issue_label: &str) -> Option<&StatusNotify> {
        self.0.get(issue_label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StatusNotify)> {
        self.0.iter()
    }

    /// The shared status if every alert ended the same way, 207 otherwise.
    /// An empty group is a 200.
    pub fn aggregate_status(&self) -> u16 {
        let mut statuses = self.0.values().map(|o| o.status);
        let Some(first) = statuses.next() else {
            return 200;
        };
        if statuses.all(|s| s == first) {
            first
        } else {
            207
        }
    }

    /// Longest retry hint among temporary failures.
    pub fn retry_after(&self) -> Option<Duration> {
        self.0.values().filter_map(|o| o.retry_after).max()
    }

    /// Collapse into a single error naming every failed label.
    pub fn into_result(self) -> Result<()> {
        let failures: Vec<LabelFailure> = self
            .0
            .into_iter()
            .filter_map(|(issue_label, outcome)| {
                outcome.error.map(|message| LabelFailure {
                    issue_label,
                    status: outcome.status,
                    message,
                })
            })
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Batch(failures))
        }
    }
}

/// Reconciles alert groups for one configured receiver.
pub struct Receiver<'a> {
    conf: &'a ReceiverConfig,
    templates: &'a TemplateEngine,
    gateway: &'a dyn TicketGateway,
    cache: &'a LookupCache,
}

impl<'a> Receiver<'a> {
    pub fn new(
        conf: &'a ReceiverConfig,
        templates: &'a TemplateEngine,
        gateway: &'a dyn TicketGateway,
        cache: &'a LookupCache,
    ) -> Self {
        Self {
            conf,
            templates,
            gateway,
            cache,
        }
    }

    /// Reconcile every alert of `data` in order. Fails as a whole only when
    /// the project cannot be rendered; anything else is reported per label.
    pub async fn notify(&self, data: &Data) -> Result<Outcomes> {
        if data.alerts.is_empty() {
            info!("No firing alerts for receiver {}, nothing to do", self.conf.name);
            return Ok(Outcomes::default());
        }

        let group_context = data.template_context();
        let project = self.templates.render(&self.conf.project, &group_context)?;
        if project.trim().is_empty() {
            return Err(Error::Template(format!(
                "project template {:?} rendered empty for receiver {}",
                self.conf.project, self.conf.name
            )));
        }

        info!(
            "Reconciling {} alert(s) for receiver {} in project {}",
            data.alerts.len(),
            self.conf.name,
            project
        );
        let mut outcomes = Outcomes::default();
        for alert in &data.alerts {
            let issue_label = identity::issue_label(&alert.labels);
            let outcome = self
                .reconcile(&project, data, &group_context, alert, &issue_label)
                .await;
            if let Some(err) = &outcome.error {
                warn!("Alert {} failed with {}: {}", issue_label, outcome.status, err);
            }
            outcomes.record(issue_label, outcome);
        }
        Ok(outcomes)
    }

    async fn reconcile(
        &self,
        project: &str,
        data: &Data,
        group_context: &Value,
        alert: &Alert,
        issue_label: &str,
    ) -> StatusNotify {
        let issue = match self.resolve_issue(project, issue_label).await {
            Ok(issue) => issue,
            Err(e) => {
                warn!("got an error while searching {}: {}", issue_label, e);
                return StatusNotify::failed(&e);
            }
        };

        let result = match issue {
            Some(issue) => self.update_existing(&issue, alert, issue_label).await,
            None => {
                self.create(project, data, group_context, alert, issue_label)
                    .await
            }
        };
        StatusNotify::from_result(result)
    }

    /// Cached id confirmed by Jira, else a label search that refreshes the
    /// cache on a hit.
    async fn resolve_issue(&self, project: &str, issue_label: &str) -> Result<Option<Issue>> {
        info!("getting issue with label: {}", issue_label);
        if let Some(id) = self.cache.get(issue_label).await {
            match self.gateway.get_issue(&id).await {
                Ok(issue) => return Ok(Some(issue)),
                Err(e) => info!("got an error while getting the issue by id {}: {}", id, e),
            }
        }

        let issue = self.search(project, issue_label).await?;
        if let Some(issue) = &issue {
            self.cache.put(issue_label, &issue.id).await;
        }
        Ok(issue)
    }

    async fn search(&self, project: &str, issue_label: &str) -> Result<Option<Issue>> {
        let issues = self
            .gateway
            .search(project, issue_label, &SearchOptions::default())
            .await?;
        if issues.len() > 1 {
            let keys: Vec<&str> = issues.iter().map(|i| i.key.as_str()).collect();
            error!(
                "More than one issue matched {}, will only update first: {:?}",
                issue_label, keys
            );
        }
        match issues.into_iter().next() {
            Some(issue) => {
                info!("  found: {}", issue.key);
                Ok(Some(issue))
            }
            None => {
                info!("  no results");
                Ok(None)
            }
        }
    }

    /// Comment, then apply the lifecycle policy. A lifecycle failure is
    /// reported in preference to a comment failure.
    async fn update_existing(&self, issue: &Issue, alert: &Alert, issue_label: &str) -> Result<()> {
        let commented = self.add_comment(issue, alert).await;
        if let Err(e) = &commented {
            warn!("Failed to comment on {}: {}", issue.key, e);
        }
        let lifecycle = self.apply_lifecycle(issue, issue_label).await;
        lifecycle.and(commented)
    }

    async fn add_comment(&self, issue: &Issue, alert: &Alert) -> Result<()> {
        let Some(template) = self.conf.comment.as_deref().filter(|t| !t.is_empty()) else {
            return Ok(());
        };
        let body = self.templates.render(template, &alert.template_context())?;
        self.gateway.add_comment(&issue.id, &body).await?;
        Ok(())
    }

    async fn apply_lifecycle(&self, issue: &Issue, issue_label: &str) -> Result<()> {
        if !issue.is_done() {
            info!("Issue {} for {} is unresolved, nothing to do", issue.key, issue_label);
            return Ok(());
        }

        let wont_fix = self.conf.wont_fix_resolution.as_deref().filter(|r| !r.is_empty());
        if let (Some(wont_fix), Some(resolution)) = (wont_fix, issue.resolution_name()) {
            if resolution == wont_fix {
                info!(
                    "Issue {} for {} is resolved as {:?}, not reopening",
                    issue.key, issue_label, resolution
                );
                return Ok(());
            }
        }

        info!("Issue {} for {} was resolved, reopening", issue.key, issue_label);
        self.reopen(&issue.key).await
    }

    async fn reopen(&self, issue_key: &str) -> Result<()> {
        let transitions = self.gateway.transitions(issue_key).await?;
        let transition = transitions
            .iter()
            .find(|t| t.name == self.conf.reopen_state)
            .ok_or_else(|| Error::MissingTransition {
                state: self.conf.reopen_state.clone(),
                issue: issue_key.to_string(),
            })?;
        self.gateway.do_transition(issue_key, &transition.id).await?;
        Ok(())
    }

    async fn create(
        &self,
        project: &str,
        data: &Data,
        group_context: &Value,
        alert: &Alert,
        issue_label: &str,
    ) -> Result<()> {
        info!("No issue matching {} found, creating new issue", issue_label);

        let draft = self.draft(project, data, group_context, alert, issue_label)?;
        let issue = self.gateway.create_issue(&draft).await?;
        info!("Issue created: key={} ID={}", issue.key, issue.id);

        self.cache.put(issue_label, &issue.id).await;
        Ok(())
    }

    fn draft(
        &self,
        project: &str,
        data: &Data,
        group_context: &Value,
        alert: &Alert,
        issue_label: &str,
    ) -> Result<IssueDraft> {
        let alert_context = alert.template_context();
        let mut batch = self.templates.batch();

        let issue_type = batch.render(&self.conf.issue_type, group_context);
        let summary = batch.render(&self.conf.summary, &alert_context);
        let description = batch.render(&self.conf.description, &alert_context);
        let extra = match &self.conf.fields {
            Some(fields) => match batch.render_value(fields, &alert_context) {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            None => Map::new(),
        };
        batch.finish()?;

        let mut labels = vec![issue_label.to_string()];
        if self.conf.add_group_labels {
            labels.extend(
                data.group_labels
                    .iter()
                    .map(|(name, value)| identity::group_label(name, value)),
            );
        }

        Ok(IssueDraft {
            project: project.to_string(),
            issue_type,
            summary,
            description,
            labels,
            priority: self.conf.priority.clone().filter(|p| !p.is_empty()),
            components: self.conf.components.clone(),
            extra,
        })
    }
}
