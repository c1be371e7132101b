//! Per-resource data access: list, detail, create, update, delete.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use parqueo_core::{ListOptions, NormalizedPage, Record};

use crate::cache::{QueryCache, QueryKey};
use crate::error::{Error, Result};
use crate::normalize::normalize;
use crate::schema::ResourceSchema;
use crate::transport::{ApiRequest, Transport};

/// Reads the record identifier (`id`, else `pk`) as text.
pub fn record_id(record: &Value) -> Option<String> {
    let raw = record.get("id").or_else(|| record.get("pk"))?;
    match raw {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Data access for one resource, keyed by its schema.
///
/// Reads are served from the shared [`QueryCache`] when present. Writes go
/// straight to the backend and, on success, invalidate the affected cache
/// entries; nothing is mutated locally.
#[derive(Clone)]
pub struct ResourceClient {
    schema: Arc<ResourceSchema>,
    transport: Arc<dyn Transport>,
    cache: Arc<QueryCache>,
    page_size: u32,
}

impl ResourceClient {
    pub fn new(
        schema: Arc<ResourceSchema>,
        transport: Arc<dyn Transport>,
        cache: Arc<QueryCache>,
        page_size: u32,
    ) -> Self {
        Self {
            schema,
            transport,
            cache,
            page_size,
        }
    }

    pub fn schema(&self) -> &Arc<ResourceSchema> {
        &self.schema
    }

    fn options(&self, search: &str, page: u32) -> ListOptions {
        ListOptions {
            search: Some(search.to_string()),
            page: page.max(1),
            page_size: self.page_size,
        }
    }

    fn list_key(&self, options: &ListOptions) -> QueryKey {
        QueryKey::list(
            &self.schema.key,
            options.search_term().unwrap_or_default(),
            options.page,
        )
    }

    /// One page of the resource, from cache when available.
    pub async fn list(&self, search: &str, page: u32) -> Result<NormalizedPage> {
        let options = self.options(search, page);
        if let Some(body) = self.cache.get(&self.list_key(&options)) {
            return Ok(normalize(body));
        }
        self.fetch_list(options).await
    }

    /// One page of the resource, always from the backend.
    pub async fn refresh_list(&self, search: &str, page: u32) -> Result<NormalizedPage> {
        self.fetch_list(self.options(search, page)).await
    }

    async fn fetch_list(&self, options: ListOptions) -> Result<NormalizedPage> {
        let key = self.list_key(&options);
        let body = self
            .transport
            .send(ApiRequest::get(self.schema.endpoint()).with_query(options.query_pairs()))
            .await?;
        self.cache.put(key, body.clone());
        Ok(normalize(body))
    }

    /// One record. An empty id is rejected before any request is made.
    pub async fn get_one(&self, id: &str) -> Result<Value> {
        let id = require_id(id)?;
        let key = QueryKey::one(&self.schema.key, id);
        if let Some(record) = self.cache.get(&key) {
            return Ok(record);
        }

        let record = self
            .transport
            .send(ApiRequest::get(self.schema.detail_url(id)))
            .await?;
        self.cache.put(key, record.clone());
        Ok(record)
    }

    pub async fn create(&self, payload: Record) -> Result<Value> {
        let created = self
            .transport
            .send(ApiRequest::post(self.schema.endpoint()).with_body(Value::Object(payload)))
            .await?;
        info!("Created {} {}", self.schema.key, record_id(&created).unwrap_or_default());
        self.cache.invalidate(&QueryKey::lists(&self.schema.key));
        Ok(created)
    }

    /// Full replace of one record.
    pub async fn update(&self, id: &str, payload: Record) -> Result<Value> {
        let id = require_id(id)?;
        let updated = self
            .transport
            .send(ApiRequest::put(self.schema.detail_url(id)).with_body(Value::Object(payload)))
            .await?;
        info!("Updated {} {}", self.schema.key, id);
        self.cache.invalidate(&QueryKey::lists(&self.schema.key));
        self.cache.invalidate(&QueryKey::ones(&self.schema.key));
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let id = require_id(id)?;
        self.transport
            .send(ApiRequest::delete(self.schema.detail_url(id)))
            .await?;
        info!("Deleted {} {}", self.schema.key, id);
        self.cache.invalidate(&QueryKey::lists(&self.schema.key));
        self.cache.invalidate(&QueryKey::one(&self.schema.key, id));
        Ok(())
    }
}

fn require_id(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() {
        debug!("Rejected request without id");
        return Err(Error::Validation("id required".into()));
    }
    Ok(id)
}
