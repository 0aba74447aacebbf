/// HTML to PDF rendering
///
/// Two backends, picked per call from the admin setting
/// ([`PdfMethod`]):
///
/// - `local` runs a headless Chromium binary with `--print-to-pdf`. The
///   document is passed as a `data:` URL, so it has an opaque origin and
///   cannot read `file:` URLs. All network requests go to a dead proxy, so
///   remote and internal hosts are unreachable and images must be inlined.
/// - `api` POSTs `{"html": ...}` to a third-party endpoint with a bearer key
///   and returns the response body.
///
/// Both are bounded by the configured timeout.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use wfahub_shared::models::app_settings::PdfMethod;
/// use wfahub_shared::pdf::{PdfOptions, PdfRenderer};
///
/// # async fn example() -> Result<(), wfahub_shared::pdf::PdfError> {
/// let renderer = PdfRenderer::new(PdfOptions {
///     chromium_path: "chromium".to_string(),
///     api_url: None,
///     api_key: None,
///     timeout: Duration::from_secs(30),
/// });
///
/// let bytes = renderer.render(PdfMethod::Local, "<h1>Quote</h1>").await?;
/// assert!(bytes.starts_with(b"%PDF"));
/// # Ok(())
/// # }
/// ```

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use std::ffi::OsString;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;

use crate::models::app_settings::PdfMethod;

/// Largest HTML document the local method accepts; the `data:` URL has to fit
/// in a single command-line argument
pub const MAX_LOCAL_DOCUMENT_BYTES: usize = 90 * 1024;

/// Discard port on loopback; nothing listens there
const DEAD_PROXY: &str = "127.0.0.1:9";

fn local_file_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:^|[^a-z0-9+.\-])file:/").expect("file URL pattern compiles"))
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("PDF backend not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Failed to start PDF renderer: {0}")]
    Launch(String),

    #[error("PDF renderer failed: {0}")]
    Failed(String),

    #[error("PDF rendering timed out after {0:?}")]
    Timeout(Duration),

    #[error("PDF API error: {0}")]
    Api(String),

    #[error("Document rejected: {0}")]
    Rejected(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct PdfOptions {
    /// Chromium/Chrome executable for the local method
    pub chromium_path: String,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PdfRenderer {
    options: PdfOptions,
    http: reqwest::Client,
}

impl PdfRenderer {
    pub fn new(options: PdfOptions) -> Self {
        let http = match reqwest::Client::builder().timeout(options.timeout).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to build PDF API client, using defaults; the timeout is applied per request"
                );
                reqwest::Client::new()
            }
        };

        Self { options, http }
    }

    pub async fn render(&self, method: PdfMethod, html: &str) -> Result<Vec<u8>, PdfError> {
        let started = std::time::Instant::now();
        let result = match method {
            PdfMethod::Local => self.render_local(html).await,
            PdfMethod::Api => self.render_api(html).await,
        };

        match &result {
            Ok(bytes) => tracing::debug!(
                method = method.as_str(),
                size = bytes.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Rendered PDF"
            ),
            Err(e) => tracing::warn!(method = method.as_str(), error = %e, "PDF rendering failed"),
        }

        result
    }

    async fn render_local(&self, html: &str) -> Result<Vec<u8>, PdfError> {
        check_document(html)?;

        let dir = tempfile::tempdir()?;
        let output = dir.path().join("document.pdf");

        let mut command = Command::new(&self.options.chromium_path);
        command
            .args(chromium_args(dir.path(), &output, html))
            .kill_on_drop(true);

        let status = tokio::time::timeout(self.options.timeout, command.output())
            .await
            .map_err(|_| PdfError::Timeout(self.options.timeout))?
            .map_err(|e| PdfError::Launch(format!("{}: {}", self.options.chromium_path, e)))?;

        if !status.status.success() {
            let stderr = String::from_utf8_lossy(&status.stderr);
            return Err(PdfError::Failed(format!(
                "exit status {}: {}",
                status.status,
                stderr.lines().last().unwrap_or("").trim()
            )));
        }

        let bytes = tokio::fs::read(&output)
            .await
            .map_err(|e| PdfError::Failed(format!("no output file: {}", e)))?;
        check_pdf(bytes)
    }

    async fn render_api(&self, html: &str) -> Result<Vec<u8>, PdfError> {
        let url = self
            .options
            .api_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(PdfError::NotConfigured("PDF_API_URL is not set"))?;

        let mut request = self.http.post(url).json(&serde_json::json!({ "html": html }));
        if let Some(key) = self.options.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = tokio::time::timeout(self.options.timeout, request.send())
            .await
            .map_err(|_| PdfError::Timeout(self.options.timeout))?
            .map_err(|e| {
                if e.is_timeout() {
                    PdfError::Timeout(self.options.timeout)
                } else {
                    PdfError::Api(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PdfError::Api(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PdfError::Api(e.to_string()))?;
        check_pdf(bytes.to_vec())
    }
}

/// Chromium command line for printing `html` into `output`
///
/// The profile lives in `workdir` so nothing is shared between renders.
fn chromium_args(workdir: &Path, output: &Path, html: &str) -> Vec<OsString> {
    let mut profile = OsString::from("--user-data-dir=");
    profile.push(workdir.join("profile"));
    let mut print_to = OsString::from("--print-to-pdf=");
    print_to.push(output);

    vec![
        "--headless".into(),
        "--disable-gpu".into(),
        "--disable-extensions".into(),
        "--disable-background-networking".into(),
        "--block-new-web-contents".into(),
        format!("--proxy-server={}", DEAD_PROXY).into(),
        // loopback is bypassed by default; route it to the proxy as well
        "--proxy-bypass-list=<-loopback>".into(),
        "--no-pdf-header-footer".into(),
        profile,
        print_to,
        format!("data:text/html;charset=utf-8;base64,{}", STANDARD.encode(html)).into(),
    ]
}

/// Refuses documents the local renderer should not load
fn check_document(html: &str) -> Result<(), PdfError> {
    if html.len() > MAX_LOCAL_DOCUMENT_BYTES {
        return Err(PdfError::Rejected("document is too large for local rendering"));
    }
    if local_file_pattern().is_match(html) {
        return Err(PdfError::Rejected("document references a local file"));
    }
    Ok(())
}

fn check_pdf(bytes: Vec<u8>) -> Result<Vec<u8>, PdfError> {
    if bytes.starts_with(b"%PDF") {
        Ok(bytes)
    } else {
        Err(PdfError::Failed("output is not a PDF document".to_string()))
    }
}

/// Attachment file name for a campaign, always ending in `.pdf`
pub fn attachment_filename(name: Option<&str>) -> String {
    let base = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("document");
    let base: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') { c } else { '_' })
        .collect();

    if base.to_ascii_lowercase().ends_with(".pdf") {
        base
    } else {
        format!("{}.pdf", base)
    }
}
