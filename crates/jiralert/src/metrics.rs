use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::{Error, Result};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref GROUPS_RECEIVED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("jiralert_groups_received_total", "Total number of alert groups received."),
        &["receiver"]
    )
    .expect("valid metric definition");
    pub static ref ALERTS_PROCESSED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("jiralert_alerts_processed_total", "Total number of alerts reconciled, by outcome status."),
        &["receiver", "status"]
    )
    .expect("valid metric definition");
    pub static ref REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("jiralert_requests_total", "Webhook requests answered with an error, by status."),
        &["receiver", "status"]
    )
    .expect("valid metric definition");
    pub static ref CONFIG_RELOADS_TOTAL: IntCounter = IntCounter::new(
        "jiralert_config_reloads_total",
        "Total number of configuration reload requests."
    )
    .expect("valid metric definition");
}

/// Register all collectors with [`REGISTRY`]. Call once at startup.
pub fn register_metrics() -> Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(GROUPS_RECEIVED_TOTAL.clone()),
        Box::new(ALERTS_PROCESSED_TOTAL.clone()),
        Box::new(REQUESTS_TOTAL.clone()),
        Box::new(CONFIG_RELOADS_TOTAL.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(Error::Internal(format!("Failed to register metric: {}", e))),
        }
    }
    Ok(())
}

// Function to gather metrics for exposition
pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| Error::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer).map_err(|e| Error::Internal(format!("Metrics are not UTF-8: {}", e)))
}
