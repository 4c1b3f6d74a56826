//! Full-text retrieval: download a paper's PDF and extract its text.

use reqwest::redirect::Policy;
use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, ContentConfig, HttpConfig};
use crate::models::{PaperResult, Provider};
use crate::router::{QueryRouter, RouterError};
use crate::sources::SourceError;
use crate::utils::{extract_text_from_bytes, validate_url, HttpClient, InputError, PdfExtractError};

/// Errors from content retrieval
#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    InvalidUrl(#[from] InputError),

    #[error("No PDF available for paper: {0}")]
    NoPdf(String),

    #[error("PDF exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("Download failed: {0}")]
    Download(#[from] SourceError),

    #[error(transparent)]
    Extraction(#[from] PdfExtractError),

    #[error(transparent)]
    Router(#[from] RouterError),
}

impl ContentError {
    /// Whether the caller sent a bad id or URL
    pub fn is_invalid_input(&self) -> bool {
        match self {
            ContentError::InvalidUrl(_) => true,
            ContentError::Router(e) => e.is_validation(),
            _ => false,
        }
    }
}

/// Extracted text of a paper, with its metadata when it was resolved by id
#[derive(Debug, Clone, Serialize)]
pub struct PaperContent {
    pub metadata: Option<PaperResult>,
    pub content: String,
    pub file_size: usize,
    pub source_url: String,
}

/// Redirect hops followed before a download is abandoned
const MAX_REDIRECTS: usize = 10;

/// Downloads PDFs with a size cap and extracts their text
#[derive(Debug, Clone)]
pub struct ContentFetcher {
    client: HttpClient,
    max_bytes: usize,
    allow_private_hosts: bool,
}

impl ContentFetcher {
    /// Build a fetcher with its own client. Unless private hosts are
    /// allowed, every redirect hop is screened like a caller URL.
    pub fn new(http: &HttpConfig, config: &ContentConfig) -> Result<Self, SourceError> {
        let client =
            HttpClient::with_redirect_policy(http, redirect_policy(config.allow_private_hosts))?;

        Ok(Self {
            client,
            max_bytes: config.max_pdf_bytes(),
            allow_private_hosts: config.allow_private_hosts,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        Self::new(&config.http, &config.content)
    }

    /// Resolve a paper's metadata, then download and extract its PDF
    pub async fn fetch_paper(
        &self,
        router: &QueryRouter,
        id: &str,
        provider: Option<Provider>,
    ) -> Result<PaperContent, ContentError> {
        let metadata = router.fetch(id, provider).await?;
        let pdf_url = metadata
            .pdf_url()
            .ok_or_else(|| ContentError::NoPdf(metadata.identifier().to_string()))?
            .to_string();

        // Provider links skip the up-front check; their redirects are still screened
        let (content, file_size) = self.download_and_extract(&pdf_url).await?;

        Ok(PaperContent {
            metadata: Some(metadata),
            content,
            file_size,
            source_url: pdf_url,
        })
    }

    /// Download and extract a PDF from a caller-supplied URL
    pub async fn fetch_url(&self, url: &str) -> Result<PaperContent, ContentError> {
        let url = self.check_url(url)?;
        let (content, file_size) = self.download_and_extract(url.as_str()).await?;

        Ok(PaperContent {
            metadata: None,
            content,
            file_size,
            source_url: url.to_string(),
        })
    }

    fn check_url(&self, url: &str) -> Result<url::Url, InputError> {
        match validate_url(url) {
            Err(InputError::DangerousUrl) if self.allow_private_hosts => {
                url::Url::parse(url.trim()).map_err(|e| InputError::InvalidUrl(e.to_string()))
            }
            other => other,
        }
    }

    async fn download_and_extract(&self, url: &str) -> Result<(String, usize), ContentError> {
        let bytes = self.download(url).await?;
        let file_size = bytes.len();

        let content = tokio::task::spawn_blocking(move || extract_text_from_bytes(&bytes))
            .await
            .map_err(|e| {
                PdfExtractError::ExtractionFailed(format!("extraction task failed: {}", e))
            })??;

        tracing::debug!(url, file_size, chars = content.len(), "extracted PDF text");
        Ok((content, file_size))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ContentError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| match rejected_redirect(&e) {
                Some(reason) => ContentError::InvalidUrl(reason),
                None => ContentError::Download(e.into()),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Api(format!("PDF download returned status: {}", status)).into());
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(ContentError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(SourceError::from)? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(ContentError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(bytes)
    }
}

fn redirect_policy(allow_private_hosts: bool) -> Policy {
    if allow_private_hosts {
        return Policy::limited(MAX_REDIRECTS);
    }

    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if let Err(e) = validate_url(attempt.url().as_str()) {
            tracing::warn!(url = %attempt.url(), error = %e, "refusing redirect");
            attempt.error(e)
        } else {
            attempt.follow()
        }
    })
}

/// The screening error behind a redirect the policy refused, if any
fn rejected_redirect(err: &reqwest::Error) -> Option<InputError> {
    if !err.is_redirect() {
        return None;
    }

    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(reason) = inner.downcast_ref::<InputError>() {
            return Some(reason.clone());
        }
        source = inner.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::make_arxiv_entry;
    use crate::sources::{ArxivEntry, ArxivLink, MockSource, NativeRecord, SourceRegistry};
    use std::sync::Arc;

    const HELLO_PDF: &[u8] = include_bytes!("../tests/fixtures/hello.pdf");

    fn router_with_pdf(id: &str, pdf_url: &str) -> QueryRouter {
        let entry = NativeRecord::Arxiv(ArxivEntry {
            id: format!("http://arxiv.org/abs/{}", id),
            title: Some("Hello world".to_string()),
            links: vec![ArxivLink {
                href: pdf_url.to_string(),
                rel: Some("related".to_string()),
                title: Some("pdf".to_string()),
                media_type: Some("application/pdf".to_string()),
            }],
            ..Default::default()
        });

        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(MockSource::new(Provider::Arxiv).with_fetch(Ok(entry))));
        QueryRouter::new(Arc::new(registry))
    }

    fn fetcher(max_pdf_mb: usize, allow_private_hosts: bool) -> ContentFetcher {
        let config = ContentConfig {
            max_pdf_mb,
            allow_private_hosts,
        };
        ContentFetcher::new(&HttpConfig::default(), &config).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_private_and_bad_urls() {
        let fetcher = fetcher(1, false);

        let err = fetcher.fetch_url("http://127.0.0.1/paper.pdf").await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidUrl(InputError::DangerousUrl)));
        assert!(err.is_invalid_input());

        let err = fetcher.fetch_url("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidUrl(InputError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_rejects_non_pdf_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/paper.pdf")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body>Sign in to continue</body></html>")
            .create_async()
            .await;

        let fetcher = fetcher(1, true);
        let err = fetcher
            .fetch_url(&format!("{}/paper.pdf", server.url()))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, ContentError::Extraction(PdfExtractError::NotPdf)));
    }

    #[tokio::test]
    async fn test_extracts_text_from_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/hello.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body(HELLO_PDF)
            .create_async()
            .await;

        let url = format!("{}/hello.pdf", server.url());
        let paper = fetcher(1, true).fetch_url(&url).await.unwrap();

        mock.assert_async().await;
        assert!(paper.content.contains("Hello Paperclip"), "{:?}", paper.content);
        assert_eq!(paper.file_size, HELLO_PDF.len());
        assert_eq!(paper.source_url, url);
        assert!(paper.metadata.is_none());

        let value = serde_json::to_value(&paper).unwrap();
        assert_eq!(value["file_size"], HELLO_PDF.len());
        assert!(value["metadata"].is_null());
    }

    #[tokio::test]
    async fn test_fetch_paper_extracts_with_metadata() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pdf/2401.00001v1")
            .with_status(200)
            .with_body(HELLO_PDF)
            .create_async()
            .await;

        let pdf_url = format!("{}/pdf/2401.00001v1", server.url());
        let router = router_with_pdf("2401.00001v1", &pdf_url);

        // Provider links are not screened up front, even to a local host
        let paper = fetcher(1, false)
            .fetch_paper(&router, "2401.00001v1", None)
            .await
            .unwrap();

        let metadata = paper.metadata.as_ref().unwrap();
        assert_eq!(metadata.identifier(), "2401.00001v1");
        assert_eq!(metadata.title(), "Hello world");
        assert!(paper.content.contains("Hello Paperclip"));
        assert_eq!(paper.file_size, HELLO_PDF.len());
        assert_eq!(paper.source_url, pdf_url);
    }

    #[tokio::test]
    async fn test_redirect_to_private_host_is_refused() {
        let mut server = mockito::Server::new_async().await;
        let port = server.socket_address().port();
        server
            .mock("GET", "/pdf/2401.00002")
            .with_status(302)
            .with_header(
                "location",
                &format!("http://[::ffff:127.0.0.1]:{}/secret.pdf", port),
            )
            .create_async()
            .await;
        let secret = server
            .mock("GET", "/secret.pdf")
            .with_status(200)
            .with_body(HELLO_PDF)
            .expect(0)
            .create_async()
            .await;

        let router = router_with_pdf("2401.00002", &format!("{}/pdf/2401.00002", server.url()));
        let err = fetcher(1, false)
            .fetch_paper(&router, "2401.00002", None)
            .await
            .unwrap_err();

        secret.assert_async().await;
        assert!(matches!(err, ContentError::InvalidUrl(InputError::DangerousUrl)));
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn test_redirect_followed_when_private_hosts_allowed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/moved.pdf")
            .with_status(301)
            .with_header("location", &format!("{}/hello.pdf", server.url()))
            .create_async()
            .await;
        server
            .mock("GET", "/hello.pdf")
            .with_status(200)
            .with_body(HELLO_PDF)
            .create_async()
            .await;

        let paper = fetcher(1, true)
            .fetch_url(&format!("{}/moved.pdf", server.url()))
            .await
            .unwrap();
        assert!(paper.content.contains("Hello Paperclip"));
    }

    #[tokio::test]
    async fn test_size_cap() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/big.pdf")
            .with_status(200)
            .with_body(vec![b'%'; 2 * 1024 * 1024])
            .create_async()
            .await;

        let fetcher = fetcher(1, true);
        let err = fetcher
            .fetch_url(&format!("{}/big.pdf", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::TooLarge { limit } if limit == 1024 * 1024));
    }

    #[tokio::test]
    async fn test_download_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone.pdf")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = fetcher(1, true);
        let err = fetcher
            .fetch_url(&format!("{}/gone.pdf", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::Download(SourceError::Api(_))));
    }

    #[tokio::test]
    async fn test_paper_without_pdf() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(
            MockSource::new(Provider::Arxiv)
                .with_fetch(Ok(make_arxiv_entry("2401.00001", "No links here"))),
        ));
        let router = QueryRouter::new(Arc::new(registry));

        let err = fetcher(1, false)
            .fetch_paper(&router, "2401.00001", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::NoPdf(id) if id == "2401.00001"));
    }

    #[tokio::test]
    async fn test_paper_lookup_error_is_propagated() {
        let router = QueryRouter::new(Arc::new(SourceRegistry::new()));
        let err = fetcher(1, false)
            .fetch_paper(&router, "", None)
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
    }
}
