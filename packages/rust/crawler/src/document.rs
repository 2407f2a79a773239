//! PDF text extraction through an external parser command.
//!
//! The PDF is downloaded to a temp file, the parser is invoked as
//! `<command> <args..> <file.pdf>`, and its output is read from
//! `<file.pdf>.parse.md`. Every failure degrades to `None`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use compintel_shared::{CompintelError, DocumentParser, Result};

use crate::guard::{is_ssrf_target, parse_target_url};
use crate::http::USER_AGENT;

/// Largest PDF we are willing to download.
const MAX_PDF_BYTES: usize = 20 * 1024 * 1024;

/// Document parser that shells out to a command-line PDF parser.
pub struct CommandDocumentParser {
    client: Client,
    command: String,
    args: Vec<String>,
    allow_private_hosts: bool,
}

impl CommandDocumentParser {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CompintelError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            command: command.into(),
            args,
            allow_private_hosts: false,
        })
    }

    /// Allow downloading from localhost and private-network hosts.
    pub fn allow_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private_hosts = allow;
        self
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let target = parse_target_url(url)?;
        if !self.allow_private_hosts && is_ssrf_target(&target) {
            return Err(CompintelError::validation(format!(
                "refusing to download from {target}"
            )));
        }

        let response = self
            .client
            .get(target.as_str())
            .send()
            .await
            .map_err(|e| CompintelError::Network(format!("{target}: {e}")))?;

        if !response.status().is_success() {
            return Err(CompintelError::Network(format!(
                "{target}: HTTP {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CompintelError::Network(format!("{target}: body read failed: {e}")))?;

        if bytes.len() > MAX_PDF_BYTES {
            return Err(CompintelError::validation(format!(
                "{target}: PDF too large ({} bytes)",
                bytes.len()
            )));
        }

        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| CompintelError::io(dest, e))
    }

    async fn run_parser(&self, pdf_path: &Path, output_path: &Path) -> Result<String> {
        let output = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .arg(pdf_path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CompintelError::io(PathBuf::from(&self.command), e))?;

        if !output.status.success() {
            return Err(CompintelError::parse(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        tokio::fs::read_to_string(output_path)
            .await
            .map_err(|e| CompintelError::io(output_path, e))
    }
}

/// Removes the temp files of one parse when dropped, including on cancellation.
struct TempFiles(Vec<PathBuf>);

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in &self.0 {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[async_trait]
impl DocumentParser for CommandDocumentParser {
    #[instrument(skip(self))]
    async fn parse_pdf(&self, url: &str) -> Option<String> {
        let pdf_path = std::env::temp_dir().join(format!("compintel-{}.pdf", Uuid::now_v7()));
        let mut output_name = pdf_path.clone().into_os_string();
        output_name.push(".parse.md");
        let output_path = PathBuf::from(output_name);
        let _cleanup = TempFiles(vec![pdf_path.clone(), output_path.clone()]);

        if let Err(e) = self.download(url, &pdf_path).await {
            warn!(error = %e, "PDF download failed");
            return None;
        }

        match self.run_parser(&pdf_path, &output_path).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!(chars = text.chars().count(), "PDF parsed");
                Some(text)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "PDF parse failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn pdf_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/deck.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.7 fake".to_vec()),
            )
            .mount(&server)
            .await;
        server
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn parses_with_command_output_file() {
        let server = pdf_server().await;
        let parser = CommandDocumentParser::new(
            "sh",
            vec![
                "-c".into(),
                r#"printf 'Enterprise tier: $99/seat' > "$0.parse.md""#.into(),
            ],
            Duration::from_secs(5),
        )
        .unwrap()
        .allow_private_hosts(true);

        let text = parser
            .parse_pdf(&format!("{}/deck.pdf", server.uri()))
            .await;
        assert_eq!(text.as_deref(), Some("Enterprise tier: $99/seat"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_yields_none() {
        let server = pdf_server().await;
        let parser = CommandDocumentParser::new(
            "sh",
            vec!["-c".into(), "exit 3".into()],
            Duration::from_secs(5),
        )
        .unwrap()
        .allow_private_hosts(true);

        assert_eq!(
            parser.parse_pdf(&format!("{}/deck.pdf", server.uri())).await,
            None
        );
    }

    #[tokio::test]
    async fn missing_command_yields_none() {
        let server = pdf_server().await;
        let parser = CommandDocumentParser::new(
            "compintel-no-such-parser-binary",
            vec![],
            Duration::from_secs(5),
        )
        .unwrap()
        .allow_private_hosts(true);

        assert_eq!(
            parser.parse_pdf(&format!("{}/deck.pdf", server.uri())).await,
            None
        );
    }

    #[tokio::test]
    async fn download_failure_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let parser = CommandDocumentParser::new("reducto", vec![], Duration::from_secs(5))
            .unwrap()
            .allow_private_hosts(true);
        assert_eq!(
            parser.parse_pdf(&format!("{}/gone.pdf", server.uri())).await,
            None
        );
    }
}
