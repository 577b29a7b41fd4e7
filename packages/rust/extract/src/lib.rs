//! Raw extraction adapters.
//!
//! An extraction run over a source publication produces an
//! [`ExtractionBundle`]: raw tables and raw text units, each tagged with a
//! confidence score. This crate loads that bundle from a local file or an
//! HTTP(S) endpoint and assigns every table its [`TableShape`] exactly once,
//! so later stages never inspect titles again.

mod bundle;

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use riskbase_shared::{ExtractionBundle, Result, RiskbaseError};
use tracing::{debug, info, instrument};
use url::Url;

pub use bundle::{content_sha256, parse_bundle, source_confidence};

/// Default timeout in seconds for fetching a remote bundle.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum response size we accept (50 MB).
const MAX_RESPONSE_SIZE: u64 = 50 * 1024 * 1024;

/// User-Agent string for bundle requests.
const USER_AGENT: &str = concat!("Riskbase/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Source location
// ---------------------------------------------------------------------------

/// Where an extraction bundle lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Http(Url),
    File(PathBuf),
}

impl SourceLocation {
    /// Interpret a CLI argument as a URL (`http`, `https`, `file`) or a plain path.
    pub fn parse(raw: &str) -> Result<Self> {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Self::Http(url)),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Self::File)
                .map_err(|()| RiskbaseError::config(format!("invalid file URL: {raw}"))),
            Ok(url) if url.scheme().len() > 1 => Err(RiskbaseError::config(format!(
                "unsupported source scheme '{}'",
                url.scheme()
            ))),
            // Single-letter schemes are Windows drive letters.
            _ => Ok(Self::File(PathBuf::from(raw))),
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Options for fetching a bundle.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// A loaded bundle together with the digest of the bytes it came from.
#[derive(Debug, Clone)]
pub struct FetchedBundle {
    pub bundle: ExtractionBundle,
    pub sha256: String,
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Load and tag an extraction bundle.
///
/// Network and I/O failures are retryable; a malformed document is not.
#[instrument(skip_all, fields(source = %source))]
pub async fn fetch_bundle(source: &SourceLocation, opts: &FetchOptions) -> Result<FetchedBundle> {
    let body = match source {
        SourceLocation::Http(url) => fetch_remote(url, opts).await?,
        SourceLocation::File(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RiskbaseError::io(path, e))?,
    };

    let sha256 = content_sha256(body.as_bytes());
    let mut bundle = parse_bundle(&body)?;
    if bundle.source.is_none() {
        if let SourceLocation::Http(url) = source {
            bundle.source = Some(url.to_string());
        }
    }

    info!(
        tables = bundle.tables.len(),
        texts = bundle.texts.len(),
        %sha256,
        "extraction bundle loaded"
    );

    Ok(FetchedBundle { bundle, sha256 })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &FetchOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| RiskbaseError::Network(format!("failed to build HTTP client: {e}")))
}

async fn fetch_remote(url: &Url, opts: &FetchOptions) -> Result<String> {
    let client = build_client(opts)?;
    debug!(%url, "fetching extraction bundle");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| RiskbaseError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RiskbaseError::Network(format!("{url}: HTTP {status}")));
    }

    if let Some(len) = response.content_length() {
        if len > MAX_RESPONSE_SIZE {
            return Err(RiskbaseError::parse(format!(
                "{url}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
            )));
        }
    }

    response
        .text()
        .await
        .map_err(|e| RiskbaseError::Network(format!("{url}: failed to read body: {e}")))
}

#[cfg(test)]
mod tests {
    use riskbase_shared::TableShape;

    use super::*;

    const BUNDLE: &str = r#"{
        "tables": [
            {"page": 4, "title": "AI applicability by occupation group",
             "headers": ["Occupation Group", "SOC", "Score"], "rows": [["Sales", "41-0000", "0.6"]],
             "confidence": 0.9},
            {"page": 7, "title": "Wages", "headers": ["a"], "rows": [["1"]]}
        ],
        "texts": [{"page": 1, "text": "Working with AI", "confidence": 0.8}]
    }"#;

    #[test]
    fn source_location_parsing() {
        assert!(matches!(
            SourceLocation::parse("https://example.com/bundle.json").unwrap(),
            SourceLocation::Http(_)
        ));
        assert_eq!(
            SourceLocation::parse("data/bundle.json").unwrap(),
            SourceLocation::File(PathBuf::from("data/bundle.json"))
        );
        assert!(SourceLocation::parse("ftp://example.com/x").is_err());
    }

    #[tokio::test]
    async fn fetch_from_mock_server() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/bundle.json"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(BUNDLE))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/bundle.json", server.uri())).unwrap();
        let fetched = fetch_bundle(&SourceLocation::Http(url.clone()), &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(fetched.bundle.tables.len(), 2);
        assert_eq!(fetched.bundle.tables[0].shape, Some(TableShape::OccupationGroup));
        assert_eq!(fetched.bundle.tables[1].shape, Some(TableShape::Opaque));
        assert_eq!(fetched.bundle.source.as_deref(), Some(url.as_str()));
        assert_eq!(fetched.sha256.len(), 64);
    }

    #[tokio::test]
    async fn http_error_is_retryable_network_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/bundle.json", server.uri())).unwrap();
        let err = fetch_bundle(&SourceLocation::Http(url), &FetchOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "NETWORK_ERROR");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let err = fetch_bundle(&SourceLocation::Http(url), &FetchOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "PARSE_ERROR");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn fetch_from_file() {
        let dir = std::env::temp_dir().join(format!("rb-extract-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bundle.json");
        std::fs::write(&path, BUNDLE).unwrap();

        let fetched = fetch_bundle(&SourceLocation::File(path), &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(fetched.bundle.texts.len(), 1);
        assert!(fetched.bundle.source.is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let path = std::env::temp_dir().join(format!("rb-missing-{}.json", uuid::Uuid::now_v7()));
        let err = fetch_bundle(&SourceLocation::File(path), &FetchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
    }
}
