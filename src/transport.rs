use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::error::Result;

pub mod http;

/// One request against the backend.
///
/// `path` is either relative to the configured base URL or an absolute URL
/// (pagination continuation links can be either).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// The request primitive every controller goes through.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the decoded JSON body (`Null` when empty).
    async fn send(&self, request: ApiRequest) -> Result<Value>;
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use super::*;
    use crate::error::Error;

    #[derive(Debug, Clone)]
    pub(crate) enum Reply {
        Json(Value),
        Backend(u16, Option<&'static str>),
    }

    /// Scripted transport: replies are queued per (method, path); the last
    /// queued reply repeats.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        replies: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn on(&self, method: Method, path: &str, reply: Reply) -> &Self {
            self.replies
                .lock()
                .unwrap()
                .entry((method, path.to_string()))
                .or_default()
                .push_back(reply);
            self
        }

        pub(crate) fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub(crate) fn count(&self, method: Method, path: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.method == method && r.path == path)
                .count()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: ApiRequest) -> Result<Value> {
            let key = (request.method.clone(), request.path.clone());
            self.requests.lock().unwrap().push(request);

            let reply = {
                let mut replies = self.replies.lock().unwrap();
                match replies.get_mut(&key) {
                    Some(queue) if queue.len() > 1 => queue.pop_front(),
                    Some(queue) => queue.front().cloned(),
                    None => None,
                }
            };

            match reply {
                Some(Reply::Json(v)) => Ok(v),
                Some(Reply::Backend(status, detail)) => Err(Error::Backend {
                    status,
                    detail: detail.map(String::from),
                }),
                None => Err(Error::Backend {
                    status: 404,
                    detail: Some("Not found.".into()),
                }),
            }
        }
    }
}
