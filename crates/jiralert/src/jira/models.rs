use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Status category key Jira uses for resolved/closed issues.
pub const STATUS_CATEGORY_DONE: &str = "done";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub fields: IssueFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub name: String,
    #[serde(rename = "statusCategory", default, skip_serializing_if = "Option::is_none")]
    pub status_category: Option<StatusCategory>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusCategory {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub name: String,
}

impl Issue {
    /// The set of status categories is fixed, so this holds for any workflow.
    pub fn is_done(&self) -> bool {
        self.fields
            .status
            .as_ref()
            .and_then(|s| s.status_category.as_ref())
            .map(|c| c.key == STATUS_CATEGORY_DONE)
            .unwrap_or(false)
    }

    pub fn resolution_name(&self) -> Option<&str> {
        self.fields.resolution.as_ref().map(|r| r.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub fields: Vec<String>,
    pub max_results: u32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            fields: vec!["summary".into(), "status".into(), "resolution".into()],
            max_results: 50,
        }
    }
}

/// Fields for a new issue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueDraft {
    pub project: String,
    pub issue_type: String,
    pub summary: String,
    pub description: String,
    pub labels: Vec<String>,
    pub priority: Option<String>,
    pub components: Vec<String>,
    /// Rendered custom fields, merged last into the `fields` object.
    pub extra: Map<String, Value>,
}

impl IssueDraft {
    /// Body for `POST /rest/api/2/issue`.
    pub fn to_request(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("project".into(), json!({ "key": self.project }));
        fields.insert("issuetype".into(), json!({ "name": self.issue_type }));
        fields.insert("summary".into(), json!(self.summary));
        fields.insert("description".into(), json!(self.description));
        fields.insert("labels".into(), json!(self.labels));
        if let Some(priority) = &self.priority {
            fields.insert("priority".into(), json!({ "name": priority }));
        }
        if !self.components.is_empty() {
            let components: Vec<Value> = self.components.iter().map(|c| json!({ "name": c })).collect();
            fields.insert("components".into(), Value::Array(components));
        }
        for (key, value) in &self.extra {
            fields.insert(key.clone(), value.clone());
        }
        json!({ "fields": fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue_with(category: &str, resolution: Option<&str>) -> Issue {
        Issue {
            id: "10001".into(),
            key: "AB-1".into(),
            fields: IssueFields {
                summary: Some("Disk".into()),
                status: Some(Status {
                    name: "Closed".into(),
                    status_category: Some(StatusCategory {
                        key: category.into(),
                        name: None,
                    }),
                }),
                resolution: resolution.map(|name| Resolution { name: name.into() }),
            },
        }
    }

    #[test]
    fn test_is_done() {
        assert!(issue_with("done", Some("Fixed")).is_done());
        assert!(!issue_with("indeterminate", None).is_done());
        assert!(!issue_with("new", None).is_done());
        assert!(!Issue::default().is_done());
    }

    #[test]
    fn test_parse_search_issue() {
        let issue: Issue = serde_json::from_str(
            r#"{
                "id": "10001",
                "key": "AB-1",
                "self": "https://jira/rest/api/2/issue/10001",
                "fields": {
                    "summary": "Disk full",
                    "status": {"name": "Done", "statusCategory": {"key": "done", "name": "Done"}},
                    "resolution": {"name": "Won't Fix"}
                }
            }"#,
        )
        .unwrap();
        assert!(issue.is_done());
        assert_eq!(issue.resolution_name(), Some("Won't Fix"));
    }

    #[test]
    fn test_draft_request_body() {
        let mut extra = Map::new();
        extra.insert("customfield_10001".into(), json!({"value": "storage"}));
        let draft = IssueDraft {
            project: "AB".into(),
            issue_type: "Bug".into(),
            summary: "Disk full".into(),
            description: "on a".into(),
            labels: vec!["ALERT{alertname=\"Disk\"}".into()],
            priority: Some("Critical".into()),
            components: vec!["Storage".into()],
            extra,
        };

        let body = draft.to_request();
        assert_eq!(body["fields"]["project"]["key"], "AB");
        assert_eq!(body["fields"]["issuetype"]["name"], "Bug");
        assert_eq!(body["fields"]["labels"][0], "ALERT{alertname=\"Disk\"}");
        assert_eq!(body["fields"]["priority"]["name"], "Critical");
        assert_eq!(body["fields"]["components"][0]["name"], "Storage");
        assert_eq!(body["fields"]["customfield_10001"]["value"], "storage");
    }

    #[test]
    fn test_draft_omits_unset_optionals() {
        let draft = IssueDraft {
            project: "AB".into(),
            issue_type: "Bug".into(),
            ..Default::default()
        };
        let body = draft.to_request();
        assert!(body["fields"].get("priority").is_none());
        assert!(body["fields"].get("components").is_none());
    }
}
