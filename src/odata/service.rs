//! Query execution against an OData service
//!
//! [`ODataSource`] is the seam the catalog builder and replication engine
//! depend on. [`DynamicsService`] implements it over HTTP: `$metadata` is
//! fetched once and cached, and collection reads follow `@odata.nextLink`
//! lazily, one page at a time.

use super::metadata::ServiceMetadata;
use super::query::Query;
use crate::auth::AuthConfig;
use crate::config::TapConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig};
use crate::types::Row;
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde::Deserialize;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;

/// Lazy sequence of rows returned by a query
pub type RowStream<'a> = Pin<Box<dyn Stream<Item = Result<Row>> + Send + 'a>>;

/// Read access to an OData service
#[async_trait]
pub trait ODataSource: Send + Sync {
    /// Service model (entity sets and their declared properties)
    async fn metadata(&self) -> Result<&ServiceMetadata>;

    /// Execute a query, yielding rows lazily until the result set is exhausted
    fn query(&self, query: Query) -> RowStream<'_>;

    /// Execute a query and materialize every row
    async fn collect(&self, query: Query) -> Result<Vec<Row>> {
        self.query(query).try_collect().await
    }
}

/// One page of a collection response
#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    value: Vec<Row>,

    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

/// Where the next page comes from
enum Cursor {
    First(Query),
    Next(String),
    Done,
}

/// Dynamics 365 Web API client
#[derive(Debug)]
pub struct DynamicsService {
    client: HttpClient,
    metadata: OnceCell<ServiceMetadata>,
}

impl DynamicsService {
    /// Wrap an HTTP client whose base URL is the service root
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            metadata: OnceCell::new(),
        }
    }

    /// Build an authenticated service from the tap configuration.
    ///
    /// `config_path` receives rotated credentials after each token refresh.
    pub fn from_config(config: &TapConfig, config_path: Option<PathBuf>) -> Result<Self> {
        let service_url = Url::parse(&config.service_url())?;
        info!("Connecting to {}", service_url);

        let client = HttpClient::with_auth(
            HttpClientConfig::from_tap_config(config),
            AuthConfig::from_tap_config(config, config_path),
        )?;
        Ok(Self::new(client))
    }

    async fn fetch_metadata(&self) -> Result<ServiceMetadata> {
        debug!("Fetching service metadata");
        let xml = self.client.get_xml("$metadata").await?;
        let metadata = ServiceMetadata::parse(&xml)?;
        info!("Service exposes {} entity sets", metadata.len());
        Ok(metadata)
    }

    async fn fetch_page(&self, cursor: Cursor) -> Result<Option<(Vec<Row>, Cursor)>> {
        let page: Page = match cursor {
            Cursor::Done => return Ok(None),
            Cursor::First(query) => {
                self.metadata().await?.require(&query.entity_set)?;
                debug!("Querying {}", query);
                self.client
                    .get_json(&query.entity_set, &query.to_params())
                    .await?
            }
            Cursor::Next(url) => {
                debug!("Following next link {}", url);
                self.client.get_json(&url, &[]).await?
            }
        };

        let next = match page.next_link {
            Some(link) => Cursor::Next(link),
            None => Cursor::Done,
        };
        Ok(Some((page.value, next)))
    }
}

#[async_trait]
impl ODataSource for DynamicsService {
    async fn metadata(&self) -> Result<&ServiceMetadata> {
        self.metadata
            .get_or_try_init(|| self.fetch_metadata())
            .await
    }

    fn query(&self, query: Query) -> RowStream<'_> {
        stream::try_unfold(Cursor::First(query), move |cursor| self.fetch_page(cursor))
            .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<Row, Error>)))
            .try_flatten()
            .boxed()
    }
}
