//! Graph query helpers
//!
//! The generated graph API lives outside this crate; these helpers build
//! and send single-operation queries and page through list operations.

mod builder;

pub use builder::{
    build_simple_query, is_scalar_type, stringify_fields, GraphParameter, GraphRequest,
    OperationKind,
};

use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;

use wsc_core::error::TransportError;

use crate::controller::{CallOptions, ControllerClient};
use crate::query::{first_page_limit, paginate, PageRequest};

/// Timeout of graph calls that do not set one
pub const DEFAULT_GRAPH_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends built graph operations through the controller client
#[derive(Clone)]
pub struct GraphClient {
    controller: ControllerClient,
}

/// List operation to page through
#[derive(Debug, Clone)]
pub struct GraphListQuery {
    pub operation_name: String,
    /// Arguments other than the paging options
    pub parameters: Vec<GraphParameter>,
    pub return_type: String,
    pub fields: Value,
    /// Graph type of the `options` argument
    pub options_type: String,
}

impl GraphListQuery {
    pub fn new(operation_name: impl Into<String>, return_type: impl Into<String>, fields: Value) -> Self {
        Self {
            operation_name: operation_name.into(),
            parameters: Vec::new(),
            return_type: return_type.into(),
            fields,
            options_type: "ListOptions".to_string(),
        }
    }

    /// Add an operation argument
    pub fn with_parameter(mut self, parameter: GraphParameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}

impl GraphClient {
    pub fn new(controller: ControllerClient) -> Self {
        Self { controller }
    }

    /// Run one operation and return its value from `data`.
    ///
    /// Queries are retried like other idempotent reads; mutations are sent
    /// once.
    pub async fn call_simple(
        &self,
        kind: OperationKind,
        operation_name: &str,
        parameters: &[GraphParameter],
        return_type: &str,
        fields: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, TransportError> {
        let request = build_simple_query(kind, operation_name, parameters, return_type, fields);
        tracing::trace!(
            variables = %request.variables,
            query = %request.query,
            "Executing graph query"
        );

        let options = match kind {
            OperationKind::Query => CallOptions::idempotent(),
            OperationKind::Mutation => CallOptions::non_idempotent(),
        }
        .with_timeout(timeout.unwrap_or(DEFAULT_GRAPH_TIMEOUT));

        let mut data = self
            .controller
            .call_graph(&request.query, &request.variables, options)
            .await?;
        tracing::trace!(data = %data, "Graph query returned");

        Ok(data
            .get_mut(operation_name)
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    /// Stream the items of a list operation page by page.
    ///
    /// `limit == 0` fetches everything from `offset` on.
    pub fn paginate(
        &self,
        query: GraphListQuery,
        offset: usize,
        limit: usize,
    ) -> impl Stream<Item = Result<Value, TransportError>> + Send + 'static {
        self.pages_from(query, None, offset, limit)
    }

    /// Fetch the first page of a list operation and return it with the
    /// total count the controller reported.
    ///
    /// The listing's stream yields the first page's items and then pages
    /// through the rest like [`GraphClient::paginate`].
    pub async fn list(
        &self,
        query: GraphListQuery,
        offset: usize,
        limit: usize,
    ) -> Result<GraphListing, TransportError> {
        let request = PageRequest {
            offset,
            limit: first_page_limit(limit),
        };
        let first = self.fetch_page(&query, request).await?;
        tracing::debug!(
            operation = %query.operation_name,
            total_count = ?first.total_count,
            received = first.items.len(),
            "Fetched first graph page"
        );

        Ok(GraphListing {
            key_name: first.key_name,
            total_count: first.total_count,
            items: self.pages_from(query, Some(first.items), offset, limit).boxed(),
        })
    }

    fn pages_from(
        &self,
        query: GraphListQuery,
        mut first: Option<Vec<Value>>,
        offset: usize,
        limit: usize,
    ) -> impl Stream<Item = Result<Value, TransportError>> + Send + 'static {
        let client = self.clone();
        let fetch = move |page: PageRequest| {
            let client = client.clone();
            let query = query.clone();
            let prefetched = first.take();
            async move {
                if let Some(items) = prefetched {
                    return Ok(items);
                }
                Ok::<_, TransportError>(client.fetch_page(&query, page).await?.items)
            }
        };
        paginate(fetch, offset, limit)
    }

    async fn fetch_page(
        &self,
        query: &GraphListQuery,
        page: PageRequest,
    ) -> Result<GraphListPage, TransportError> {
        let mut parameters = query.parameters.clone();
        parameters.push(GraphParameter::new(
            "options",
            query.options_type.as_str(),
            json!({"first": page.limit, "offset": page.offset}),
        ));
        let response = self
            .call_simple(
                OperationKind::Query,
                &query.operation_name,
                &parameters,
                &query.return_type,
                Some(&with_total_count(&query.fields)),
                None,
            )
            .await?;
        Ok(GraphListPage::from_response(response))
    }
}

/// First page of a list operation plus a stream over all its items
pub struct GraphListing {
    /// Response key holding the items, such as `bodies`
    pub key_name: Option<String>,
    /// Items available on the controller, when it reported a count
    pub total_count: Option<u64>,
    pub items: BoxStream<'static, Result<Value, TransportError>>,
}

/// One response of a list operation
#[derive(Debug, Clone, PartialEq)]
pub struct GraphListPage {
    pub key_name: Option<String>,
    pub items: Vec<Value>,
    pub total_count: Option<u64>,
}

impl GraphListPage {
    /// Split a response such as `{"bodies": [...], "meta": {"totalCount": 3}}`.
    ///
    /// A response carrying `__typename` yields that type name as its only
    /// item.
    pub fn from_response(response: Value) -> Self {
        let Value::Object(mut map) = response else {
            return Self {
                key_name: None,
                items: Vec::new(),
                total_count: None,
            };
        };

        let total_count = map
            .remove("meta")
            .and_then(|meta| meta.get("totalCount").and_then(Value::as_u64));

        if let Some(typename) = map.remove("__typename") {
            return Self {
                key_name: Some("__typename".to_string()),
                items: vec![typename],
                total_count,
            };
        }

        let (key_name, items) = map
            .into_iter()
            .find_map(|(key, value)| match value {
                Value::Array(items) => Some((Some(key), items)),
                _ => None,
            })
            .unwrap_or_default();
        Self {
            key_name,
            items,
            total_count,
        }
    }
}

/// Ask for `meta { totalCount }` alongside the selected fields
fn with_total_count(fields: &Value) -> Value {
    let mut fields = fields.clone();
    if let Value::Object(map) = &mut fields {
        let meta = map.entry("meta").or_insert_with(|| json!({}));
        if let Value::Object(meta) = meta {
            meta.entry("totalCount").or_insert(Value::Null);
        }
    }
    fields
}
