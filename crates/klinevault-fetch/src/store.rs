//! Remote object store abstraction.

use async_trait::async_trait;
use klinevault_types::{KlineVaultError, PipelineConfig, Result};
use tracing::{debug, instrument};

use crate::listing::{DirListing, ListPage};
use crate::url::{listing_page_url, object_url};
use crate::{FetchError, HttpClient};

/// Upper bound on pages followed for one prefix.
const MAX_PAGES: usize = 10_000;

/// A bucket that can be listed one delimited page at a time.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Lists one page of the immediate children of `prefix`, resuming after
    /// `marker` when given.
    async fn list_page(&self, prefix: &str, marker: Option<&str>) -> Result<ListPage>;

    /// Returns the download URL of an object key.
    fn object_url(&self, key: &str) -> String;

    /// Lists every immediate child of `prefix`, following pagination.
    async fn list_dir(&self, prefix: &str) -> Result<DirListing> {
        let mut listing = DirListing::default();
        let mut marker: Option<String> = None;

        for page_index in 0..MAX_PAGES {
            let page = self.list_page(prefix, marker.as_deref()).await?;
            let next = page.next_marker.clone();
            listing.extend(page);

            match next {
                Some(next) if marker.as_deref() != Some(next.as_str()) => {
                    debug!(
                        event_type = "listing_page",
                        prefix = prefix,
                        page = page_index + 1,
                        "Following truncated listing"
                    );
                    marker = Some(next);
                }
                Some(next) => {
                    return Err(KlineVaultError::RemoteUnavailable(format!(
                        "listing of {prefix} did not advance past {next}"
                    )));
                }
                None => return Ok(listing),
            }
        }

        Err(KlineVaultError::RemoteUnavailable(format!(
            "listing of {prefix} exceeded {MAX_PAGES} pages"
        )))
    }
}

/// Binance Vision bucket accessed over HTTP.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: HttpClient,
    listing_url: String,
    base_url: String,
}

impl S3Store {
    /// Creates a store from explicit endpoints.
    #[must_use]
    pub fn new(
        client: HttpClient,
        listing_url: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            listing_url: listing_url.into(),
            base_url: base_url.into(),
        }
    }

    /// Creates a store from the pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::Config`] if the HTTP client cannot be built.
    pub fn from_pipeline(config: &PipelineConfig) -> Result<Self> {
        Ok(Self::new(
            HttpClient::from_pipeline(config)?,
            config.listing_url.clone(),
            config.base_url.clone(),
        ))
    }
}

#[async_trait]
impl RemoteStore for S3Store {
    #[instrument(skip(self), level = "debug")]
    async fn list_page(&self, prefix: &str, marker: Option<&str>) -> Result<ListPage> {
        let url = listing_page_url(&self.listing_url, prefix, marker)?;
        let body = self
            .client
            .get_text(&url)
            .await?
            .ok_or_else(|| FetchError::NotFound(url.clone()))?;
        ListPage::from_xml(&body)
    }

    fn object_url(&self, key: &str) -> String {
        object_url(&self.base_url, key)
    }
}
