//! Top-level webstack client
//!
//! Owns one controller client and one configuration state cache, and hands
//! out domain clients that share them.

use futures::stream::Stream;
use serde_json::Value;
use std::sync::Arc;

use wsc_core::config::ClientConfig;
use wsc_core::error::{ClientError, TransportError};
use wsc_core::traits::{Method, Transport};

use crate::cache::ConfigurationStateCache;
use crate::controller::{CallOptions, ControllerClient};
use crate::dispatcher::SceneTaskDispatcher;
use crate::graph::GraphClient;
use crate::query::{paginate, PageRequest, QueryPage, MAX_QUERY_LIMIT};
use crate::realtime::RealtimePlanningClient;

use super::{BinpickingClient, PlanningClient};

/// Entry point for talking to one controller
#[derive(Clone)]
pub struct WebstackClient {
    controller: ControllerClient,
    dispatcher: SceneTaskDispatcher,
    cache: Arc<ConfigurationStateCache>,
}

impl WebstackClient {
    /// Connect over HTTP using validated configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let controller = ControllerClient::from_config(config)?;
        Ok(Self::with_controller(controller, config))
    }

    /// Use an existing transport, e.g. a custom session or a test double
    pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        Self::with_controller(ControllerClient::new(transport, config), config)
    }

    fn with_controller(controller: ControllerClient, config: &ClientConfig) -> Self {
        let dispatcher = SceneTaskDispatcher::with_poll_config(controller.clone(), config.poll.clone());
        let cache = Arc::new(ConfigurationStateCache::new(controller.clone()));
        Self {
            controller,
            dispatcher,
            cache,
        }
    }

    /// Underlying request primitives
    pub fn controller(&self) -> &ControllerClient {
        &self.controller
    }

    /// Scene task dispatcher shared by the domain clients
    pub fn dispatcher(&self) -> &SceneTaskDispatcher {
        &self.dispatcher
    }

    /// Configuration state cache owned by this client
    pub fn cache(&self) -> &Arc<ConfigurationStateCache> {
        &self.cache
    }

    /// Graph query client
    pub fn graph(&self) -> GraphClient {
        GraphClient::new(self.controller.clone())
    }

    /// Realtime planning client sharing this client's cache
    pub fn realtime_planning(&self) -> RealtimePlanningClient {
        RealtimePlanningClient::with_cache(self.cache.clone(), self.dispatcher.clone())
    }

    /// Binpicking client
    pub fn binpicking(&self) -> BinpickingClient {
        BinpickingClient::new(self.dispatcher.clone())
    }

    /// Planning client for a stored scene
    pub fn planning(&self, scene_uri: impl Into<String>) -> PlanningClient {
        PlanningClient::new(self.dispatcher.clone(), scene_uri)
    }

    /// Check that the controller is reachable and accepts the credentials
    pub async fn ping(&self) -> Result<(), TransportError> {
        let path = format!("/u/{}/", self.controller.username());
        self.controller
            .call_raw(Method::Head, &path, None, CallOptions::idempotent())
            .await?;
        tracing::debug!(path = %path, "Controller answered ping");
        Ok(())
    }

    /// Fetch one page of scenes.
    ///
    /// `limit == 0` requests the largest page the client asks for.
    pub async fn get_scenes(&self, offset: usize, limit: usize) -> Result<QueryPage<Value>, TransportError> {
        let limit = if limit == 0 { MAX_QUERY_LIMIT } else { limit };
        let path = format!(
            "{}?format=json&limit={}&offset={}",
            self.controller.endpoints().scenes,
            limit,
            offset
        );
        let body = self
            .controller
            .call(Method::Get, &path, None, CallOptions::idempotent())
            .await?;
        serde_json::from_value(body)
            .map_err(|e| TransportError::Decode(format!("Invalid scene listing: {}", e)))
    }

    /// Stream scenes across pages.
    ///
    /// `limit == 0` streams everything from `offset` on.
    pub fn iter_scenes(
        &self,
        offset: usize,
        limit: usize,
    ) -> impl Stream<Item = Result<Value, TransportError>> + Send + 'static {
        let client = self.clone();
        let fetch = move |page: PageRequest| {
            let client = client.clone();
            async move {
                let page = client.get_scenes(page.offset, page.limit).await?;
                Ok::<_, TransportError>(page.objects)
            }
        };
        paginate(fetch, offset, limit)
    }
}
