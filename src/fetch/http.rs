//! reqwest-backed [`Fetcher`]

use super::{ByteRequest, Fetcher, ResourceMeta, slice_whole};
use crate::config::HttpConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue, RANGE, REFERER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;

/// HTTP implementation of [`Fetcher`]
///
/// Playlists and HEAD requests use the manifest timeout; binary requests carry
/// their own timeout and cancellation token.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
    manifest_timeout: Duration,
}

impl HttpFetcher {
    /// Build a client with the configured User-Agent and Referer
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(referer) = &config.referer {
            let value = HeaderValue::from_str(referer)
                .map_err(|_| Error::config("http.referer", "referer is not a valid header value"))?;
            headers.insert(REFERER, value);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            manifest_timeout: config.manifest_timeout,
        })
    }

    async fn read_body(&self, request: &ByteRequest) -> Result<Bytes> {
        let mut builder = self.client.get(&request.url);
        if let Some(range) = request.range {
            builder = builder.header(RANGE, range.header_value());
        }
        let mut response = send(builder, &request.url).await?;
        let full_body = response.status() == StatusCode::OK;

        let expected = response.content_length();
        if let (Some(progress), Some(total)) = (&request.progress, expected) {
            progress.set_total(total);
        }

        let mut body = BytesMut::with_capacity(expected.unwrap_or(0).min(64 * 1024 * 1024) as usize);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| classify(e, &request.url))?
        {
            if let Some(progress) = &request.progress {
                progress.add_loaded(chunk.len() as u64);
            }
            body.extend_from_slice(&chunk);
        }
        let body = body.freeze();

        match request.range {
            None => Ok(body),
            // Servers that ignore Range answer 200 with the whole resource
            Some(range) if full_body => slice_whole(body, range, &request.url),
            Some(range) if body.len() as u64 != range.len() => Err(Error::RangeMismatch {
                url: request.url.clone(),
                expected: range.len(),
                received: body.len() as u64,
            }),
            Some(_) => Ok(body),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        let builder = self.client.get(url).timeout(self.manifest_timeout);
        let response = send(builder, url).await?;
        response.text().await.map_err(|e| classify(e, url))
    }

    async fn get_bytes(&self, request: ByteRequest) -> Result<Bytes> {
        tokio::select! {
            biased;
            _ = request.cancel.cancelled() => Err(Error::Aborted),
            result = tokio::time::timeout(request.timeout, self.read_body(&request)) => match result {
                Ok(body) => body,
                Err(_) => Err(Error::Timeout { url: request.url.clone() }),
            },
        }
    }

    async fn head(&self, url: &str) -> Result<ResourceMeta> {
        let builder = self.client.head(url).timeout(self.manifest_timeout);
        let response = send(builder, url).await?;
        let headers = response.headers();

        Ok(ResourceMeta {
            content_length: headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok()),
            content_type: headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string()),
        })
    }
}

async fn send(builder: RequestBuilder, url: &str) -> Result<Response> {
    let response = builder.send().await.map_err(|e| classify(e, url))?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response)
}

fn classify(error: reqwest::Error, url: &str) -> Error {
    if error.is_timeout() {
        Error::Timeout {
            url: url.to_string(),
        }
    } else {
        Error::Network(error)
    }
}
