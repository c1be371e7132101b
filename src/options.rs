//! Option lists for select fields backed by an endpoint.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use parqueo_core::{OptionValue, SelectOption};

use crate::cache::{QueryCache, QueryKey};
use crate::error::Result;
use crate::normalize::ListShape;
use crate::schema::FieldDescriptor;
use crate::transport::{ApiRequest, Transport};

/// The option set a select control renders right now.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSet {
    pub options: Vec<SelectOption>,
    /// True while the endpoint fetch has not resolved; `options` then holds
    /// the field's static fallback.
    pub loading: bool,
}

/// Resolves and caches endpoint-backed option lists.
///
/// Fetched lists stay fresh for `ttl`; after that the next [`resolve`]
/// fetches again. There is no explicit invalidation.
///
/// [`resolve`]: OptionResolver::resolve
#[derive(Clone)]
pub struct OptionResolver {
    transport: Arc<dyn Transport>,
    cache: Arc<QueryCache>,
    ttl: Duration,
}

impl OptionResolver {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<QueryCache>, ttl: Duration) -> Self {
        Self {
            transport,
            cache,
            ttl,
        }
    }

    fn key(field: &FieldDescriptor, endpoint: &str) -> QueryKey {
        QueryKey::options(endpoint, &field.value_key, &field.label_key)
    }

    /// What the control shows without waiting.
    pub fn peek(&self, field: &FieldDescriptor) -> OptionSet {
        let Some(endpoint) = field.options_endpoint.as_deref() else {
            return OptionSet {
                options: field.options.clone(),
                loading: false,
            };
        };

        match self.cache.get_fresh(&Self::key(field, endpoint), self.ttl) {
            Some(body) => OptionSet {
                options: project(body, &field.value_key, &field.label_key),
                loading: false,
            },
            None => OptionSet {
                options: field.options.clone(),
                loading: true,
            },
        }
    }

    /// The fetched option list, from cache while fresh.
    ///
    /// Fields without an endpoint resolve to their static options.
    pub async fn resolve(&self, field: &FieldDescriptor) -> Result<Vec<SelectOption>> {
        let Some(endpoint) = field.options_endpoint.as_deref() else {
            return Ok(field.options.clone());
        };

        let key = Self::key(field, endpoint);
        let body = match self.cache.get_fresh(&key, self.ttl) {
            Some(body) => body,
            None => {
                debug!("Fetching options for '{}' from {}", field.name, endpoint);
                let body = self.transport.send(ApiRequest::get(endpoint)).await?;
                self.cache.put(key, body.clone());
                body
            }
        };
        Ok(project(body, &field.value_key, &field.label_key))
    }
}

/// Projects a collection body into `(value, label)` candidates.
///
/// The value is read from `value_key`, then `id`, `value`, `pk`; the label
/// from `label_key`, then `label`, then the value's text.
pub fn project(body: Value, value_key: &str, label_key: &str) -> Vec<SelectOption> {
    ListShape::detect(body)
        .into_rows()
        .iter()
        .map(|item| {
            let value = [value_key, "id", "value", "pk"]
                .iter()
                .find_map(|k| present(item, k))
                .map(OptionValue::from_json)
                .unwrap_or_else(|| OptionValue::Text(String::new()));
            let label = [label_key, "label"]
                .iter()
                .find_map(|k| present(item, k))
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| value.to_string());
            SelectOption { value, label }
        })
        .collect()
}

fn present<'a>(item: &'a Value, key: &str) -> Option<&'a Value> {
    item.get(key).filter(|v| !v.is_null())
}
