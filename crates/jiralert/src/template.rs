//! Template rendering using Tera
//!
//! Receiver templates are usually written in Alertmanager's Go template
//! style (`{{ .Labels.alertname }}`). They are converted to Tera syntax and
//! rendered against the alert or group context.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use serde_yaml::Value as YamlValue;
use tera::{Context, Tera};
use tracing::{debug, info};

use crate::{Error, Result};

lazy_static! {
    static ref DEFAULT_DOUBLE_QUOTED: Regex =
        Regex::new(r#"\{\{([^}]+)\|\s*default\s+"([^"]+)"\s*\}\}"#).expect("valid regex");
    static ref DEFAULT_SINGLE_QUOTED: Regex =
        Regex::new(r#"\{\{([^}]+)\|\s*default\s+'([^']+)'\s*\}\}"#).expect("valid regex");
    static ref DEFAULT_BARE: Regex =
        Regex::new(r#"\{\{([^}]+)\|\s*default\s+([^}\s]+)\s*\}\}"#).expect("valid regex");
    static ref KV_LOOKUP: Regex = Regex::new(
        r#"\{\{(-?)\s*((?:Labels|Annotations|GroupLabels|CommonLabels|CommonAnnotations)\.[A-Za-z_][A-Za-z0-9_]*)\s*(-?)\}\}"#
    )
    .expect("valid regex");
}

/// Convert Go template syntax to Tera syntax
///
/// Handles common patterns:
/// - {{ .path.to.value }} -> {{ path.to.value }}
/// - {{ .value | default "default" }} -> {{ value | default(value="default") }}
/// - {{ .Labels.name }} -> {{ Labels.name | default(value="") }}
///
/// A missing key in one of the label or annotation maps renders empty.
pub fn convert_go_to_tera(template: &str) -> String {
    let converted = template
        .replace("{{- .", "{{- ")
        .replace("{{ .", "{{ ")
        .replace("{{.", "{{");
    let converted = KV_LOOKUP.replace_all(&converted, "{{${1} ${2} | default(value=\"\") ${3}}}");

    let replacement = "{{${1}| default(value=\"${2}\") }}";
    let converted = DEFAULT_DOUBLE_QUOTED.replace_all(&converted, replacement);
    let converted = DEFAULT_SINGLE_QUOTED.replace_all(&converted, replacement);
    let converted = DEFAULT_BARE.replace_all(&converted, replacement);

    converted.into_owned()
}

fn is_static(template: &str) -> bool {
    !template.contains("{{") && !template.contains("{%")
}

fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn to_context(data: &Value) -> Context {
    let mut context = Context::new();
    match data {
        Value::Object(map) => {
            for (key, value) in map {
                context.insert(key, value);
            }
        }
        _ => {
            // If not an object, make it available as "data"
            context.insert("data", data);
        }
    }
    context
}

/// Renders receiver templates. Optionally preloaded with named templates
/// from a glob so receiver templates can `{% include %}` shared snippets.
#[derive(Clone, Default)]
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load shared templates matching `glob`, or an empty engine for `None`.
    pub fn load(glob: Option<&str>) -> Result<Self> {
        let Some(glob) = glob else {
            return Ok(Self::new());
        };
        let mut tera = Tera::new(glob)
            .map_err(|e| Error::Template(format!("Failed to load templates from {}: {}", glob, describe(&e))))?;
        tera.autoescape_on(vec![]);
        info!("Loaded {} shared templates from {}", tera.get_template_names().count(), glob);
        Ok(Self { tera })
    }

    /// Render a template string with the given context
    pub fn render(&self, template: &str, data: &Value) -> Result<String> {
        if is_static(template) {
            return Ok(template.to_string());
        }
        let converted = convert_go_to_tera(template);
        debug!("Rendering template: {}", converted);

        let mut tera = self.tera.clone();
        tera.render_str(&converted, &to_context(data))
            .map_err(|e| Error::Template(format!("Failed to render template {:?}: {}", template, describe(&e))))
    }

    /// Start a batch of renders whose first error is reported by
    /// [`RenderBatch::finish`].
    pub fn batch(&self) -> RenderBatch<'_> {
        RenderBatch {
            engine: self,
            error: None,
        }
    }
}

/// Collects renders and remembers the first failure, so a group of fields
/// can be rendered and checked once.
pub struct RenderBatch<'a> {
    engine: &'a TemplateEngine,
    error: Option<Error>,
}

impl<'a> RenderBatch<'a> {
    /// Render `template`, returning an empty string on failure.
    pub fn render(&mut self, template: &str, data: &Value) -> String {
        match self.engine.render(template, data) {
            Ok(rendered) => rendered,
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(e);
                }
                String::new()
            }
        }
    }

    /// Deep copy `value`, rendering every string key and value. Map keys
    /// that are not strings are dropped.
    pub fn render_value(&mut self, value: &YamlValue, data: &Value) -> Value {
        match value {
            YamlValue::Null => Value::Null,
            YamlValue::Bool(b) => Value::Bool(*b),
            YamlValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::from(i)
                } else if let Some(u) = n.as_u64() {
                    Value::from(u)
                } else {
                    n.as_f64()
                        .and_then(serde_json::Number::from_f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            YamlValue::String(s) => Value::String(self.render(s, data)),
            YamlValue::Sequence(items) => {
                Value::Array(items.iter().map(|item| self.render_value(item, data)).collect())
            }
            YamlValue::Mapping(map) => {
                let mut converted = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    let YamlValue::String(key) = key else {
                        continue;
                    };
                    let key = self.render(key, data);
                    let item = self.render_value(item, data);
                    converted.insert(key, item);
                }
                Value::Object(converted)
            }
            YamlValue::Tagged(tagged) => self.render_value(&tagged.value, data),
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn finish(self) -> Result<()> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
