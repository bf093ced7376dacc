//! Network side of a cache miss: turning a URL into a stream of body bytes.

use std::io;
use std::net::IpAddr;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client as ReqwestClient;
use thiserror::Error;
use url::Url;

use crate::config::FetchSettings;

/// Page body, chunk by chunk, as it arrives.
pub type BodyStream = BoxStream<'static, io::Result<Bytes>>;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Could not resolve URL host: {0}")]
    Resolve(String),

    #[error("URL resolves to a private or reserved address: {0}")]
    Blocked(IpAddr),
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Starts a GET for `url` and returns its body. The response status is
    /// not inspected.
    async fn fetch(&self, url: &str) -> Result<BodyStream, FetchError>;
}

/// [`PageFetcher`] backed by one shared `reqwest` client.
///
/// Redirects follow the client's default policy. The timeout covers the
/// whole exchange including reading the body.
#[derive(Clone, Debug)]
pub struct ReqwestFetcher {
    client: ReqwestClient,
    block_private_addresses: bool,
}

impl ReqwestFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = ReqwestClient::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .build()?;

        Ok(ReqwestFetcher {
            client,
            block_private_addresses: settings.block_private_addresses,
        })
    }

    /// Resolves the host and refuses it if any address is private.
    async fn check_host(&self, url: &Url) -> Result<(), FetchError> {
        let host = url
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl("URL has no host".into()))?;
        let port = url.port_or_known_default().unwrap_or(80);

        let host = host.trim_matches(|c: char| c == '[' || c == ']');
        let addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| FetchError::Resolve(e.to_string()))?;

        for addr in addrs {
            if is_private_ip(addr.ip()) {
                return Err(FetchError::Blocked(addr.ip()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PageFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<BodyStream, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        if self.block_private_addresses {
            self.check_host(&parsed).await?;
        }

        let response = self.client.get(parsed).send().await.map_err(|e| {
            tracing::warn!(error = ?e, url = %url, "Failed to fetch URL for preview");
            FetchError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(
                %status,
                url = %url,
                "Upstream returned an error status; extracting anyway"
            );
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(io::Error::other))
            .boxed())
    }
}

/// Returns `true` if `ip` is a private, loopback, link-local or unspecified
/// address. IPv4-mapped IPv6 addresses are judged by their IPv4 form.
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            matches!(
                o,
                [127, ..]
                    | [10, ..]
                    | [169, 254, ..]
                    | [192, 168, ..]
                    | [0, ..]
                    | [255, 255, 255, 255]
            ) || (o[0] == 172 && (16..=31).contains(&o[1]))
                || (o[0] == 100 && (64..=127).contains(&o[1]))
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_ip(IpAddr::V4(v4));
            }
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00 == 0xfc00)
                || (v6.segments()[0] & 0xffc0 == 0xfe80)
        }
    }
}
