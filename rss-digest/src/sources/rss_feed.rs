use crate::types::{FeedEntry, FeedError, FeedSource, FetchConfig};
use crate::{FeedParser, Fetcher};
use async_trait::async_trait;
use tracing::{info, warn};

/// `FeedSource` over HTTP: download with [`Fetcher`], parse with [`FeedParser`].
pub struct HttpFeedSource {
    fetcher: Fetcher,
    parser: FeedParser,
}

impl HttpFeedSource {
    pub fn new(fetch_config: FetchConfig) -> Result<Self, FeedError> {
        Ok(Self {
            fetcher: Fetcher::new(fetch_config)?,
            parser: FeedParser::new(),
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, FeedError> {
        let content = self.fetcher.fetch_document(url).await?;

        match self.parser.parse_feed(&content) {
            Ok(entries) => {
                info!("Pulled {} entries from {}", entries.len(), url);
                Ok(entries)
            }
            Err(e) => {
                warn!("Could not parse feed {}: {}", url, e);
                Ok(Vec::new())
            }
        }
    }
}
