//! Remote file validation and retrieval
//!
//! A source URL is first checked with `HEAD` (availability, redirect outcome and
//! declared size), then streamed to transient local storage. The fetcher also
//! fronts content hashing, metadata extraction and removal of the downloaded
//! original so the orchestrator talks to a single capability.

use crate::ssrf::{CheckedUrl, UrlGuard};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use glimpse_core::{
    Config, ImageMetadata, LocalAsset, PipelineError, PipelineResult, SourceReference,
    ValidationResult,
};
use glimpse_processing::{content_hash, extract_metadata};
use glimpse_storage::LocalStorage;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_LENGTH};
use reqwest::{Client, ClientBuilder, Url};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Configuration for the HTTP fetcher
#[derive(Clone, Debug)]
pub struct FetcherConfig {
    pub max_file_size_bytes: u64,
    pub guard: UrlGuard,
    /// Timeout of the availability check
    pub head_timeout: Duration,
    /// Timeout of a whole download
    pub download_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 8_000_000_000,
            guard: UrlGuard::default(),
            head_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(60 * 30),
        }
    }
}

impl From<&Config> for FetcherConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_file_size_bytes: config.max_file_size_bytes(),
            guard: UrlGuard::new(
                config.allow_private_urls(),
                config.url_allowlist().map(<[String]>::to_vec),
            ),
            head_timeout: Duration::from_secs(config.http_timeout_secs()),
            download_timeout: Duration::from_secs(config.download_timeout_secs()),
        }
    }
}

/// Retrieval capability used by the pipeline
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Check that `url` answers a terminal 2xx within the size limit
    async fn validate(&self, url: &str) -> PipelineResult<ValidationResult>;

    /// Stream the validated final URL into local storage and hash it.
    /// `source` only names the stored file.
    async fn retrieve(
        &self,
        source: &SourceReference,
        validated: &ValidationResult,
    ) -> PipelineResult<LocalAsset>;

    /// Dimensions, tags and timestamps of a retrieved original
    async fn extract_metadata(&self, asset: &LocalAsset) -> PipelineResult<ImageMetadata>;

    /// Remove a local file; an already missing file is not an error
    async fn cleanup(&self, path: &Path) -> PipelineResult<()>;
}

/// Fetcher over `reqwest`
#[derive(Clone)]
pub struct HttpFetcher {
    head_client: Client,
    download_client: Client,
    storage: LocalStorage,
    config: FetcherConfig,
}

/// Which of the two transfer profiles a client is built for
#[derive(Clone, Copy)]
enum Transfer {
    Head,
    Download,
}

impl HttpFetcher {
    pub fn new(storage: LocalStorage, config: FetcherConfig) -> Result<Self> {
        let head_client = client_builder(&config, Transfer::Head)
            .build()
            .context("Failed to create HTTP client for source checks")?;

        let download_client = client_builder(&config, Transfer::Download)
            .build()
            .context("Failed to create HTTP client for downloads")?;

        Ok(Self {
            head_client,
            download_client,
            storage,
            config,
        })
    }

    /// Client for `checked`, connecting to its validated address when one was
    /// resolved
    fn client_for(&self, checked: &CheckedUrl, transfer: Transfer) -> reqwest::Result<Client> {
        match checked.pin() {
            Some((host, addr)) => client_builder(&self.config, transfer)
                .resolve(host, addr)
                .build(),
            None => Ok(match transfer {
                Transfer::Head => self.head_client.clone(),
                Transfer::Download => self.download_client.clone(),
            }),
        }
    }

    async fn stream_to(&self, checked: &CheckedUrl, path: &Path) -> PipelineResult<u64> {
        let client = self
            .client_for(checked, Transfer::Download)
            .map_err(|e| PipelineError::download(e.to_string()))?;

        let response = client
            .get(checked.url.clone())
            .send()
            .await
            .map_err(|e| PipelineError::download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::download(format!(
                "source answered {}",
                status
            )));
        }

        let partial = |message: String| PipelineError::download_with_partial(message, path.to_path_buf());

        let mut file = File::create(path)
            .await
            .map_err(|e| partial(e.to_string()))?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| partial(e.to_string()))?;
            if chunk.is_empty() {
                continue;
            }

            written += chunk.len() as u64;
            if written > self.config.max_file_size_bytes {
                return Err(partial(format!(
                    "transfer exceeded the {} byte limit",
                    self.config.max_file_size_bytes
                )));
            }

            file.write_all(&chunk)
                .await
                .map_err(|e| partial(e.to_string()))?;
        }

        file.flush().await.map_err(|e| partial(e.to_string()))?;
        Ok(written)
    }
}

/// Timeouts plus a redirect policy that re-checks every hop against the guard
fn client_builder(config: &FetcherConfig, transfer: Transfer) -> ClientBuilder {
    let builder = Client::builder().redirect(config.guard.redirect_policy());
    match transfer {
        Transfer::Head => builder.timeout(config.head_timeout),
        Transfer::Download => builder
            .connect_timeout(config.head_timeout)
            .timeout(config.download_timeout),
    }
}

/// Name a download is stored under.
///
/// The declared name wins; it borrows the URL's extension when it has none,
/// and the last URL path segment stands in when no name was declared.
fn local_name(source: &SourceReference) -> String {
    let url_name = Url::parse(&source.url)
        .ok()
        .and_then(|url| url.path_segments()?.last().map(str::to_string))
        .filter(|name| !name.is_empty());

    let declared = source.declared_name.trim();
    if declared.is_empty() {
        return url_name.unwrap_or_default();
    }

    if Path::new(declared).extension().is_none() {
        let url_extension = url_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str());
        if let Some(extension) = url_extension {
            return format!("{}.{}", declared, extension);
        }
    }

    declared.to_string()
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[tracing::instrument(skip(self))]
    async fn validate(&self, url: &str) -> PipelineResult<ValidationResult> {
        let url = url.trim();
        if url.is_empty() {
            return Err(PipelineError::MissingUrl);
        }

        let checked = self
            .config
            .guard
            .check_resolved(url)
            .await
            .map_err(PipelineError::InvalidUrl)?;
        let requested = checked.url.clone();

        let client = self
            .client_for(&checked, Transfer::Head)
            .map_err(|e| PipelineError::NotFound {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let response = match client
            .head(requested.clone())
            .header(ACCEPT_ENCODING, "identity")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_redirect() => {
                return Err(PipelineError::RedirectFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                return Err(PipelineError::NotFound {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let status = response.status();
        let redirected = response.url() != &requested;

        if !status.is_success() {
            let reason = format!("status {}", status);
            return Err(if redirected {
                PipelineError::RedirectFailed {
                    url: url.to_string(),
                    reason,
                }
            } else {
                PipelineError::NotFound {
                    url: url.to_string(),
                    reason,
                }
            });
        }

        let size_bytes = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(0);

        if size_bytes > self.config.max_file_size_bytes {
            return Err(PipelineError::TooLarge {
                size: size_bytes,
                limit: self.config.max_file_size_bytes,
            });
        }

        tracing::debug!(
            size_bytes = size_bytes,
            redirected = redirected,
            final_url = %response.url(),
            "Source validated"
        );

        Ok(ValidationResult {
            size_bytes,
            final_url: response.url().to_string(),
        })
    }

    #[tracing::instrument(skip_all, fields(url = %validated.final_url))]
    async fn retrieve(
        &self,
        source: &SourceReference,
        validated: &ValidationResult,
    ) -> PipelineResult<LocalAsset> {
        let start = Instant::now();

        let checked = self
            .config
            .guard
            .check_resolved(&validated.final_url)
            .await
            .map_err(PipelineError::InvalidUrl)?;

        let path: PathBuf = self.storage.download_path(&local_name(source));
        let size_bytes = self.stream_to(&checked, &path).await?;

        let content_hash = content_hash(&path).await.map_err(|e| {
            PipelineError::download_with_partial(format!("unable to hash download: {}", e), path.clone())
        })?;

        tracing::info!(
            path = %path.display(),
            size_bytes = size_bytes,
            content_hash = %content_hash,
            duration_ms = start.elapsed().as_millis(),
            "Source downloaded"
        );

        Ok(LocalAsset { path, content_hash })
    }

    async fn extract_metadata(&self, asset: &LocalAsset) -> PipelineResult<ImageMetadata> {
        extract_metadata(&asset.path, &asset.content_hash).await
    }

    async fn cleanup(&self, path: &Path) -> PipelineResult<()> {
        self.storage.remove(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;
    use tempfile::{tempdir, TempDir};

    async fn fetcher(dir: &TempDir, limit: u64) -> HttpFetcher {
        fetcher_with_guard(dir, limit, UrlGuard::new(true, None)).await
    }

    async fn fetcher_with_guard(dir: &TempDir, limit: u64, guard: UrlGuard) -> HttpFetcher {
        let storage = LocalStorage::new(
            dir.path().join("downloads"),
            dir.path().join("previews"),
            "http://localhost:4000/previews",
        )
        .await
        .unwrap();
        HttpFetcher::new(
            storage,
            FetcherConfig {
                max_file_size_bytes: limit,
                guard,
                ..FetcherConfig::default()
            },
        )
        .unwrap()
    }

    fn validated(source: &SourceReference) -> ValidationResult {
        ValidationResult {
            size_bytes: 0,
            final_url: source.url.clone(),
        }
    }

    /// Guard that only admits the mock server's `127.0.0.1` address
    fn loopback_only() -> UrlGuard {
        UrlGuard::new(true, Some(vec!["127.0.0.1".to_string()]))
    }

    fn downloads(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path().join("downloads")).unwrap().count()
    }

    fn jpeg_bytes() -> Vec<u8> {
        let mut buffer = Vec::new();
        RgbImage::from_pixel(64, 32, Rgb([200, 10, 10]))
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Jpeg)
            .unwrap();
        buffer
    }

    #[tokio::test]
    async fn test_validate_ok() {
        let dir = tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("HEAD", "/cover.jpg")
            .match_header("accept-encoding", "identity")
            .with_status(200)
            .with_header("content-length", "1234")
            .create_async()
            .await;

        let fetcher = fetcher(&dir, 10_000).await;
        let result = fetcher
            .validate(&format!("{}/cover.jpg", server.url()))
            .await
            .unwrap();

        assert_eq!(result.size_bytes, 1234);
        assert!(result.final_url.ends_with("/cover.jpg"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_validate_missing_url() {
        let dir = tempdir().unwrap();
        let fetcher = fetcher(&dir, 10_000).await;
        assert!(matches!(
            fetcher.validate("   ").await,
            Err(PipelineError::MissingUrl)
        ));
    }

    #[tokio::test]
    async fn test_validate_not_found() {
        let dir = tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/missing.jpg")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = fetcher(&dir, 10_000).await;
        let result = fetcher
            .validate(&format!("{}/missing.jpg", server.url()))
            .await;
        assert!(matches!(result, Err(PipelineError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_validate_redirect_to_missing_file() {
        let dir = tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/old.jpg")
            .with_status(307)
            .with_header("location", &format!("{}/new.jpg", server.url()))
            .create_async()
            .await;
        server
            .mock("HEAD", "/new.jpg")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = fetcher(&dir, 10_000).await;
        let result = fetcher.validate(&format!("{}/old.jpg", server.url())).await;
        assert!(matches!(result, Err(PipelineError::RedirectFailed { .. })));
    }

    #[tokio::test]
    async fn test_validate_successful_redirect_reports_final_url() {
        let dir = tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/old.jpg")
            .with_status(307)
            .with_header("location", &format!("{}/new.jpg", server.url()))
            .create_async()
            .await;
        server
            .mock("HEAD", "/new.jpg")
            .with_status(200)
            .with_header("content-length", "10")
            .create_async()
            .await;

        let fetcher = fetcher(&dir, 10_000).await;
        let result = fetcher
            .validate(&format!("{}/old.jpg", server.url()))
            .await
            .unwrap();
        assert!(result.final_url.ends_with("/new.jpg"));
    }

    #[tokio::test]
    async fn test_validate_too_large() {
        let dir = tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/huge.psd")
            .with_status(200)
            .with_header("content-length", "5000")
            .create_async()
            .await;

        let fetcher = fetcher(&dir, 1000).await;
        let result = fetcher.validate(&format!("{}/huge.psd", server.url())).await;
        assert!(matches!(
            result,
            Err(PipelineError::TooLarge {
                size: 5000,
                limit: 1000
            })
        ));
    }

    #[tokio::test]
    async fn test_validate_unreachable_host() {
        let dir = tempdir().unwrap();
        let fetcher = fetcher(&dir, 1000).await;
        let result = fetcher.validate("http://127.0.0.1:1/cover.jpg").await;
        assert!(matches!(result, Err(PipelineError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_validate_rejects_private_hosts_by_default() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), dir.path(), "http://localhost:4000/previews")
            .await
            .unwrap();
        let fetcher = HttpFetcher::new(storage, FetcherConfig::default()).unwrap();
        let result = fetcher.validate("http://127.0.0.1/cover.jpg").await;
        assert!(matches!(result, Err(PipelineError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_retrieve_streams_and_hashes() {
        let dir = tempdir().unwrap();
        let body = jpeg_bytes();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cover.jpg")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        let fetcher = fetcher(&dir, 1_000_000).await;
        let source = SourceReference::new(format!("{}/cover.jpg", server.url()), "My Cover.jpg");
        let asset = fetcher.retrieve(&source, &validated(&source)).await.unwrap();

        assert!(asset.path.starts_with(dir.path().join("downloads")));
        assert!(asset.path.to_str().unwrap().ends_with("_My_Cover.jpg"));
        assert_eq!(asset.extension().as_deref(), Some("jpg"));
        assert_eq!(asset.content_hash.len(), 32);
        assert_eq!(std::fs::read(&asset.path).unwrap(), body);

        let metadata = fetcher.extract_metadata(&asset).await.unwrap();
        assert_eq!((metadata.width, metadata.height), (64, 32));
        assert_eq!(metadata.content_hash, asset.content_hash);

        fetcher.cleanup(&asset.path).await.unwrap();
        assert_eq!(downloads(&dir), 0);
    }

    #[tokio::test]
    async fn test_retrieve_failure_status_leaves_nothing() {
        let dir = tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cover.jpg")
            .with_status(500)
            .create_async()
            .await;

        let fetcher = fetcher(&dir, 1_000_000).await;
        let source = SourceReference::new(format!("{}/cover.jpg", server.url()), "cover.jpg");
        let err = fetcher.retrieve(&source, &validated(&source)).await.unwrap_err();

        assert!(matches!(err, PipelineError::Download { .. }));
        assert_eq!(err.partial_path(), None);
        assert_eq!(downloads(&dir), 0);
    }

    #[tokio::test]
    async fn test_retrieve_enforces_limit_while_streaming() {
        let dir = tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/big.png")
            .with_status(200)
            .with_body(vec![7u8; 4096])
            .create_async()
            .await;

        let fetcher = fetcher(&dir, 1024).await;
        let source = SourceReference::new(format!("{}/big.png", server.url()), "big.png");
        let err = fetcher.retrieve(&source, &validated(&source)).await.unwrap_err();

        let partial = err.partial_path().cloned().unwrap();
        assert!(partial.starts_with(dir.path().join("downloads")));
        fetcher.cleanup(&partial).await.unwrap();
        assert_eq!(downloads(&dir), 0);
    }

    #[tokio::test]
    async fn test_validate_blocks_redirect_off_allowlist() {
        let dir = tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        let port = server.socket_address().port();
        server
            .mock("HEAD", "/pub.jpg")
            .with_status(302)
            .with_header("location", &format!("http://localhost:{}/secret.jpg", port))
            .create_async()
            .await;
        let secret = server
            .mock("HEAD", "/secret.jpg")
            .with_status(200)
            .expect(0)
            .create_async()
            .await;

        let fetcher = fetcher_with_guard(&dir, 10_000, loopback_only()).await;
        let result = fetcher
            .validate(&format!("http://127.0.0.1:{}/pub.jpg", port))
            .await;

        assert!(matches!(result, Err(PipelineError::RedirectFailed { .. })));
        secret.assert_async().await;
    }

    #[tokio::test]
    async fn test_retrieve_blocks_redirect_off_allowlist() {
        let dir = tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        let port = server.socket_address().port();
        server
            .mock("GET", "/pub.jpg")
            .with_status(302)
            .with_header("location", &format!("http://localhost:{}/secret.jpg", port))
            .create_async()
            .await;
        let secret = server
            .mock("GET", "/secret.jpg")
            .with_status(200)
            .with_body(jpeg_bytes())
            .expect(0)
            .create_async()
            .await;

        let fetcher = fetcher_with_guard(&dir, 1_000_000, loopback_only()).await;
        let source = SourceReference::new(format!("http://127.0.0.1:{}/pub.jpg", port), "pub.jpg");
        let err = fetcher
            .retrieve(&source, &validated(&source))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Download { .. }));
        assert_eq!(downloads(&dir), 0);
        secret.assert_async().await;
    }

    #[tokio::test]
    async fn test_retrieve_rejects_final_url_off_allowlist() {
        let dir = tempdir().unwrap();
        let fetcher = fetcher_with_guard(&dir, 1_000_000, loopback_only()).await;
        let source = SourceReference::new("http://127.0.0.1:1/pub.jpg", "pub.jpg");
        let validation = ValidationResult {
            size_bytes: 0,
            final_url: "http://localhost:1/secret.jpg".to_string(),
        };

        let err = fetcher.retrieve(&source, &validation).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidUrl(_)));
        assert_eq!(downloads(&dir), 0);
    }

    #[tokio::test]
    async fn test_retrieve_downloads_validated_final_url() {
        let dir = tempdir().unwrap();
        let body = jpeg_bytes();
        let mut server = mockito::Server::new_async().await;
        let original = server
            .mock("GET", "/old.jpg")
            .with_status(500)
            .expect(0)
            .create_async()
            .await;
        server
            .mock("GET", "/new.jpg")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        let fetcher = fetcher(&dir, 1_000_000).await;
        let source = SourceReference::new(format!("{}/old.jpg", server.url()), "cover.jpg");
        let validation = ValidationResult {
            size_bytes: body.len() as u64,
            final_url: format!("{}/new.jpg", server.url()),
        };

        let asset = fetcher.retrieve(&source, &validation).await.unwrap();
        assert_eq!(std::fs::read(&asset.path).unwrap(), body);
        assert!(asset.path.to_str().unwrap().ends_with("_cover.jpg"));
        original.assert_async().await;
    }

    #[tokio::test]
    async fn test_retrieve_long_declared_name_keeps_extension() {
        let dir = tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cover.jpg")
            .with_status(200)
            .with_body(jpeg_bytes())
            .create_async()
            .await;

        let fetcher = fetcher(&dir, 1_000_000).await;
        let name = format!("{}.jpg", "a".repeat(250));
        let source = SourceReference::new(format!("{}/cover.jpg", server.url()), name);
        let asset = fetcher.retrieve(&source, &validated(&source)).await.unwrap();

        assert_eq!(asset.extension().as_deref(), Some("jpg"));
        fetcher.cleanup(&asset.path).await.unwrap();
    }

    #[test]
    fn test_local_name() {
        let source = SourceReference::new("http://cdn.test/a/b/photo.PNG?x=1", "");
        assert_eq!(local_name(&source), "photo.PNG");

        let source = SourceReference::new("http://cdn.test/a/photo.psd", "cover");
        assert_eq!(local_name(&source), "cover.psd");

        let source = SourceReference::new("http://cdn.test/a/photo.psd", "cover.jpg");
        assert_eq!(local_name(&source), "cover.jpg");

        let source = SourceReference::new("http://cdn.test/", "");
        assert_eq!(local_name(&source), "");
    }
}
