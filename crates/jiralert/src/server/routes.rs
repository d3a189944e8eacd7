use axum::{
    body::Bytes,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use http::{header, HeaderValue, Method, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::{
    alertmanager::Data,
    metrics::{
        gather_metrics, ALERTS_PROCESSED_TOTAL, CONFIG_RELOADS_TOTAL, GROUPS_RECEIVED_TOTAL,
        REQUESTS_TOTAL,
    },
    notify::Receiver,
};

/// Receiver label for requests whose payload could not be decoded.
const UNKNOWN_RECEIVER: &str = "<unknown>";

const HOME_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>JIRAlert</title></head>
<body>
<nav>
<a href="/">Home</a> |
<a href="/config">Configuration</a> |
<a href="/metrics">Metrics</a> |
<a href="/logs">Logs</a> |
<a href="/reload">Reload</a>
</nav>
<h1>JIRAlert {{ version }}</h1>
<p>Alertmanager webhook receiver that files Jira issues. Point Alertmanager at <code>/alert</code>.</p>
<h2>Receivers</h2>
<ul>
{% for receiver in receivers %}<li>{{ receiver.name }}: project {{ receiver.project }}, {{ receiver.issue_type }}</li>
{% endfor %}</ul>
</body>
</html>
"#;

fn error_response(receiver: &str, status: StatusCode, message: String) -> Response {
    REQUESTS_TOTAL
        .with_label_values(&[receiver, status.as_str()])
        .inc();
    let body = json!({
        "error": true,
        "status": status.as_u16(),
        "message": message,
    });
    (status, Json(body)).into_response()
}

pub async fn alert(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let mut data: Data = match serde_json::from_slice(&body) {
        Ok(data) => data,
        Err(e) => {
            warn!("Failed to decode webhook payload: {}", e);
            return error_response(UNKNOWN_RECEIVER, StatusCode::BAD_REQUEST, e.to_string());
        }
    };
    debug!(
        "Received group {} for receiver {} with {} alert(s)",
        data.group_key,
        data.receiver,
        data.alerts.len()
    );

    let snapshot = state.snapshot.current().await;
    let Some(conf) = snapshot.config.receiver_by_name(&data.receiver) else {
        warn!("Receiver missing: {}", data.receiver);
        let message = format!("Receiver missing: {}", data.receiver);
        return error_response(&data.receiver, StatusCode::NOT_FOUND, message);
    };
    GROUPS_RECEIVED_TOTAL.with_label_values(&[conf.name.as_str()]).inc();

    let dropped = data.retain_firing();
    if dropped > 0 {
        warn!(
            "Ignoring {} resolved alert(s) for receiver {}",
            dropped, conf.name
        );
    }

    let receiver = Receiver::new(conf, &snapshot.templates, state.gateway.as_ref(), &state.cache);
    let outcomes = match receiver.notify(&data).await {
        Ok(outcomes) => outcomes,
        Err(e) => {
            error!("Notification for receiver {} failed: {}", conf.name, e);
            return error_response(&conf.name, StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    for (_, outcome) in outcomes.iter() {
        ALERTS_PROCESSED_TOTAL
            .with_label_values(&[conf.name.as_str(), outcome.status.to_string().as_str()])
            .inc();
    }

    let status = StatusCode::from_u16(outcomes.aggregate_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status != StatusCode::OK {
        REQUESTS_TOTAL
            .with_label_values(&[conf.name.as_str(), status.as_str()])
            .inc();
    }
    info!(
        "Processed {} alert(s) for receiver {} with status {}",
        outcomes.len(),
        conf.name,
        status
    );

    let mut response = (status, Json(&outcomes)).into_response();
    if status == StatusCode::SERVICE_UNAVAILABLE {
        if let Some(retry_after) = outcomes.retry_after() {
            if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
    }
    response
}

pub async fn home(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.snapshot.current().await;
    let mut context = tera::Context::new();
    context.insert("version", env!("CARGO_PKG_VERSION"));
    context.insert("receivers", &snapshot.config.receivers);
    match tera::Tera::one_off(HOME_PAGE, &context, true) {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            error!("Failed to render home page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn metrics() -> Response {
    match gather_metrics() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub async fn config(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.snapshot.current().await;
    match snapshot.config.to_yaml() {
        Ok(yaml) => ([(header::CONTENT_TYPE, "text/yaml; charset=utf-8")], yaml).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn reload(State(state): State<Arc<AppState>>, method: Method) -> Response {
    CONFIG_RELOADS_TOTAL.inc();
    match state.snapshot.reload().await {
        Ok(snapshot) => {
            info!(
                "Configuration reloaded with {} receiver(s)",
                snapshot.config.receivers.len()
            );
            if method == Method::GET {
                Redirect::to("/config").into_response()
            } else {
                (StatusCode::OK, "configuration reloaded").into_response()
            }
        }
        Err(e) => {
            error!("Failed to reload configuration: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to reload config: {}", e),
            )
                .into_response()
        }
    }
}
