use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{ApiRequest, Transport};

/// HTTP transport backed by `reqwest`.
///
/// Relative paths and absolute URLs are both resolved against the base URL,
/// so continuation links work whichever form the backend emits. A path
/// prefix on the base URL (`https://host/parqueo/`) is kept.
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| Error::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(path) {
            return Ok(url);
        }
        // Links the backend emits already carry the prefix.
        let prefix = self.base_url.path();
        let relative = path
            .strip_prefix(prefix)
            .unwrap_or_else(|| path.trim_start_matches('/'));
        self.base_url
            .join(relative)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        let url = self.resolve(&request.path)?;
        debug!("{} {}", request.method, url);

        let mut builder = self.client.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|body| body.get("detail").and_then(Value::as_str).map(String::from));
            debug!("{} {} -> {}", request.method, request.path, status);
            return Err(Error::Backend {
                status: status.as_u16(),
                detail,
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_and_absolute_paths() {
        let transport = HttpTransport::new("http://127.0.0.1:8000", None).unwrap();
        assert_eq!(
            transport.resolve("/api/espacios/?page=2").unwrap().as_str(),
            "http://127.0.0.1:8000/api/espacios/?page=2"
        );
        assert_eq!(
            transport
                .resolve("http://10.0.0.5:8000/api/espacios/?page=3")
                .unwrap()
                .as_str(),
            "http://10.0.0.5:8000/api/espacios/?page=3"
        );
    }

    #[test]
    fn keeps_base_url_path_prefix() {
        let transport = HttpTransport::new("https://host/parqueo", None).unwrap();
        assert_eq!(
            transport.resolve("/api/usuarios/7/").unwrap().as_str(),
            "https://host/parqueo/api/usuarios/7/"
        );
        assert_eq!(
            transport
                .resolve("/parqueo/api/espacios/?page=2")
                .unwrap()
                .as_str(),
            "https://host/parqueo/api/espacios/?page=2"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            HttpTransport::new("not a url", None),
            Err(Error::InvalidUrl(_))
        ));
    }
}
