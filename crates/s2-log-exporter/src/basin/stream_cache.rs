// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use reqwest::Url;

use crate::config::StreamCacheConfig;
use crate::error::DispatchError;
use crate::router::StreamName;

/// Everything needed to append to one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    pub append_url: Url,
}

/// Stream handles keyed by stream name.
///
/// Hour-bucketed names go cold after an hour, so idle entries are evicted
/// and the total is capped.
#[derive(Clone)]
pub struct StreamCache {
    base: Url,
    cache: Cache<String, Arc<StreamHandle>>,
}

impl StreamCache {
    pub fn new(base: Url, max_streams: u64, idle_timeout: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_streams)
            .time_to_idle(idle_timeout)
            .build();
        Self { base, cache }
    }

    pub fn from_config(base: Url, config: &StreamCacheConfig) -> Self {
        Self::new(base, config.max_streams, config.idle_timeout)
    }

    /// Cached handle for `stream`, resolved on first use.
    pub fn get_or_create(&self, stream: &StreamName) -> Result<Arc<StreamHandle>, DispatchError> {
        self.cache
            .try_get_with(stream.as_str().to_string(), || {
                let url = append_url(&self.base, stream)?;
                Ok::<_, String>(Arc::new(StreamHandle { append_url: url }))
            })
            .map_err(|e: Arc<String>| DispatchError::StreamClient(e.to_string()))
    }

    #[must_use]
    pub fn contains(&self, stream: &StreamName) -> bool {
        self.cache.contains_key(stream.as_str())
    }
}

impl std::fmt::Debug for StreamCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCache")
            .field("base", &self.base.as_str())
            .field("cache", &"<moka cache>")
            .finish()
    }
}

/// `{base}/v1/streams/{stream}/records`, with the stream name as a single
/// percent-encoded segment.
fn append_url(base: &Url, stream: &StreamName) -> Result<Url, String> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| format!("{base} cannot be used as a base URL"))?
        .pop_if_empty()
        .extend(["v1", "streams", stream.as_str(), "records"]);
    Ok(url)
}
