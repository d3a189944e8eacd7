//! Alertmanager webhook payload (version 4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub type Labels = BTreeMap<String, String>;

pub const STATUS_FIRING: &str = "firing";

/// One notification group as posted by Alertmanager.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Data {
    #[serde(default)]
    pub version: String,
    #[serde(rename = "groupKey", default)]
    pub group_key: String,
    #[serde(rename = "truncatedAlerts", default)]
    pub truncated_alerts: u64,
    pub receiver: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(rename = "groupLabels", default)]
    pub group_labels: Labels,
    #[serde(rename = "commonLabels", default)]
    pub common_labels: Labels,
    #[serde(rename = "commonAnnotations", default)]
    pub common_annotations: Labels,
    #[serde(rename = "externalURL", default)]
    pub external_url: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Alert {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: Labels,
    #[serde(rename = "startsAt", default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(rename = "endsAt", default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL", default)]
    pub generator_url: String,
    #[serde(default)]
    pub fingerprint: String,
}

impl Alert {
    pub fn is_firing(&self) -> bool {
        self.status == STATUS_FIRING
    }

    /// Template context for per-alert fields (summary, description, comment,
    /// extra fields). Keys follow Alertmanager's template data names.
    pub fn template_context(&self) -> Value {
        json!({
            "Status": self.status,
            "Labels": self.labels,
            "Annotations": self.annotations,
            "StartsAt": self.starts_at,
            "EndsAt": self.ends_at,
            "GeneratorURL": self.generator_url,
            "Fingerprint": self.fingerprint,
        })
    }
}

impl Data {
    /// Drop resolved alerts, returning how many were removed.
    pub fn retain_firing(&mut self) -> usize {
        let before = self.alerts.len();
        self.alerts.retain(Alert::is_firing);
        before - self.alerts.len()
    }

    /// Template context for group-level fields (project, issue type).
    pub fn template_context(&self) -> Value {
        let alerts: Vec<Value> = self.alerts.iter().map(Alert::template_context).collect();
        json!({
            "Receiver": self.receiver,
            "Status": self.status,
            "Alerts": alerts,
            "GroupLabels": self.group_labels,
            "CommonLabels": self.common_labels,
            "CommonAnnotations": self.common_annotations,
            "ExternalURL": self.external_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "version": "4",
        "groupKey": "{}:{alertname=\"Disk\"}",
        "truncatedAlerts": 0,
        "status": "firing",
        "receiver": "jira-ab",
        "groupLabels": {"alertname": "Disk"},
        "commonLabels": {"alertname": "Disk", "severity": "critical"},
        "commonAnnotations": {"summary": "Disk almost full"},
        "externalURL": "http://alertmanager:9093",
        "alerts": [
            {
                "status": "firing",
                "labels": {"alertname": "Disk", "instance": "a"},
                "annotations": {"summary": "Disk almost full on a"},
                "startsAt": "2024-05-01T10:00:00Z",
                "endsAt": "0001-01-01T00:00:00Z",
                "generatorURL": "http://prometheus/graph",
                "fingerprint": "abc"
            },
            {
                "status": "resolved",
                "labels": {"alertname": "Disk", "instance": "b"},
                "annotations": {},
                "startsAt": "2024-05-01T09:00:00Z",
                "endsAt": "2024-05-01T09:30:00Z",
                "generatorURL": "http://prometheus/graph",
                "fingerprint": "def"
            }
        ]
    }"#;

    #[test]
    fn test_parse_webhook_payload() {
        let data: Data = serde_json::from_str(PAYLOAD).unwrap();
        assert_eq!(data.receiver, "jira-ab");
        assert_eq!(data.alerts.len(), 2);
        assert_eq!(data.group_labels.get("alertname").map(String::as_str), Some("Disk"));
        assert!(data.alerts[0].is_firing());
        assert!(!data.alerts[1].is_firing());
    }

    #[test]
    fn test_retain_firing() {
        let mut data: Data = serde_json::from_str(PAYLOAD).unwrap();
        assert_eq!(data.retain_firing(), 1);
        assert_eq!(data.alerts.len(), 1);
        assert_eq!(data.alerts[0].fingerprint, "abc");
    }

    #[test]
    fn test_minimal_payload_defaults() {
        let data: Data = serde_json::from_str(r#"{"receiver": "r"}"#).unwrap();
        assert!(data.alerts.is_empty());
        assert!(data.group_labels.is_empty());
    }

    #[test]
    fn test_template_contexts() {
        let data: Data = serde_json::from_str(PAYLOAD).unwrap();
        let group = data.template_context();
        assert_eq!(group["GroupLabels"]["alertname"], "Disk");
        assert_eq!(group["Alerts"].as_array().unwrap().len(), 2);

        let alert = data.alerts[0].template_context();
        assert_eq!(alert["Labels"]["instance"], "a");
        assert_eq!(alert["Annotations"]["summary"], "Disk almost full on a");
    }
}
