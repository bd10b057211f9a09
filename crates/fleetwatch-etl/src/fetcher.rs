//! Paginated telemetry fetcher.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::FetcherConfig;
use crate::error::EtlError;

const EXCERPT_CHARS: usize = 200;

/// Source of raw telemetry records.
///
/// Records are returned undecoded; a record that fails to decode is a
/// per-record problem, not a failed fetch.
pub trait TelemetrySource: Send + Sync {
    /// Pull every page, or at most `max_pages` when non-zero.
    fn fetch_all(&self, max_pages: u32) -> impl Future<Output = Result<Vec<Value>, EtlError>> + Send;
}

/// One decoded response envelope.
#[derive(Debug)]
struct Page {
    data: Vec<Value>,
    total: u64,
    page: u64,
    total_pages: u64,
}

/// HTTP client for the telemetry provider.
pub struct TelemetryClient {
    http: reqwest::Client,
    config: FetcherConfig,
}

impl TelemetryClient {
    pub fn new(config: FetcherConfig) -> Result<Self, EtlError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("fleetwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EtlError::Connection(e.to_string()))?;

        Ok(Self { http, config })
    }

    async fn fetch_page(&self, page: u32) -> Result<Page, EtlError> {
        let page_size = self.config.effective_page_size();
        debug!(page, page_size, "Fetching telemetry page");

        let mut request = self
            .http
            .get(&self.config.base_url)
            .query(&[("page", page), ("page_size", page_size)]);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EtlError::Connection(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EtlError::Connection(e.to_string()))?;

        if !status.is_success() {
            return Err(format_error(format!("HTTP {status} for page {page}"), &body));
        }

        parse_envelope(&body)
    }
}

impl TelemetrySource for TelemetryClient {
    async fn fetch_all(&self, max_pages: u32) -> Result<Vec<Value>, EtlError> {
        let mut records = Vec::new();
        let mut page = 1u32;

        loop {
            let envelope = self.fetch_page(page).await?;
            if envelope.data.is_empty() {
                debug!(page, "Empty page, stopping");
                break;
            }

            let received = envelope.data.len();
            records.extend(envelope.data);
            debug!(
                page = envelope.page,
                total_pages = envelope.total_pages,
                total = envelope.total,
                received,
                "Telemetry page received"
            );

            if envelope.page >= envelope.total_pages {
                break;
            }
            if max_pages > 0 && page >= max_pages {
                info!(max_pages, "Page limit reached");
                break;
            }
            page += 1;
        }

        info!(records = records.len(), pages = page, "Telemetry fetch complete");
        Ok(records)
    }
}

fn format_error(message: String, body: &str) -> EtlError {
    let excerpt: String = body.chars().take(EXCERPT_CHARS).collect();
    warn!(%message, %excerpt, "Malformed telemetry response");
    EtlError::ResponseFormat { message, excerpt }
}

fn parse_envelope(body: &str) -> Result<Page, EtlError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| format_error(format!("response is not JSON: {e}"), body))?;

    let Value::Object(mut fields) = value else {
        return Err(format_error("response is not a JSON object".into(), body));
    };

    let data = match fields.remove("data") {
        Some(Value::Array(data)) => data,
        Some(_) => return Err(format_error("`data` is not an array".into(), body)),
        None => return Err(format_error("missing field `data`".into(), body)),
    };

    let count = |name: &str| -> Result<u64, EtlError> {
        match fields.get(name) {
            Some(v) => v
                .as_u64()
                .ok_or_else(|| format_error(format!("`{name}` is not a count"), body)),
            None => Err(format_error(format!("missing field `{name}`"), body)),
        }
    };

    let total = count("total")?;
    let page = count("page")?;
    count("page_size")?;
    let total_pages = count("total_pages")?;

    Ok(Page {
        data,
        total,
        page,
        total_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_with_all_fields_parses() {
        let page = parse_envelope(
            r#"{"data":[{"vehicle_id":1}],"total":1,"page":1,"page_size":5000,"total_pages":1}"#,
        )
        .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.total, 1);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn every_envelope_field_is_required() {
        for missing in ["data", "total", "page", "page_size", "total_pages"] {
            let mut envelope = serde_json::json!({
                "data": [], "total": 0, "page": 1, "page_size": 10, "total_pages": 0
            });
            envelope.as_object_mut().unwrap().remove(missing);
            let err = parse_envelope(&envelope.to_string()).unwrap_err();
            match err {
                EtlError::ResponseFormat { message, .. } => assert!(message.contains(missing)),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn excerpt_is_bounded() {
        let body = "x".repeat(1000);
        let EtlError::ResponseFormat { excerpt, .. } = parse_envelope(&body).unwrap_err() else {
            panic!("expected format error");
        };
        assert_eq!(excerpt.len(), EXCERPT_CHARS);
    }
}
