use super::UpstreamSettings;
use anyhow::Result;
use reqwest::{Proxy, redirect::Policy};
use std::time::Duration;

pub type HttpClient = reqwest::Client;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Create the [`HttpClient`] shared by every relayed request.
///
/// Header names are written title-cased on HTTP/1 connections so upstreams that
/// compare them case-sensitively still see `X-Shopify-Access-Token`.
pub fn build_http_client(settings: &UpstreamSettings) -> Result<HttpClient> {
    let mut builder = reqwest::ClientBuilder::default()
        .redirect(Policy::limited(settings.max_redirects))
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .http1_title_case_headers()
        .danger_accept_invalid_certs(settings.allow_invalid_certs)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(settings.request_timeout);
    if let Some(proxy_url) = &settings.request_proxy {
        builder = builder.proxy(Proxy::all(proxy_url.as_str())?);
    }
    Ok(builder.build()?)
}
