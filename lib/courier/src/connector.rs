//! Connectors: direct HTTPS and HTTPS through a CONNECT tunnel.

use http::{HeaderValue, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::{HttpConnector, proxy::Tunnel};
use url::Url;

use crate::{ConfigError, TransportConfig};

/// Connector used when a request names a proxy.
pub(crate) type ProxyConnector = HttpsConnector<Tunnel<HttpConnector>>;

fn tls_config() -> rustls::ClientConfig {
    let root_store: rustls::RootCertStore =
        webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

fn http_connector(config: &TransportConfig) -> HttpConnector {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(config.connect_timeout));
    http
}

/// Create an HTTPS connector with rustls.
///
/// Supports HTTP/1.1 and HTTP/2, with TLS backed by the Mozilla root
/// certificates. Plain `http` URLs are accepted too.
#[must_use]
pub fn https_connector(config: &TransportConfig) -> HttpsConnector<HttpConnector> {
    HttpsConnectorBuilder::new()
        .with_tls_config(tls_config())
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http_connector(config))
}

/// Create a connector that reaches every host through `proxy`.
///
/// Each connection opens a `CONNECT` tunnel, then TLS runs inside it for
/// `https` targets. `authorization` is sent as `Proxy-Authorization`.
pub(crate) fn proxy_connector(
    config: &TransportConfig,
    proxy: &Url,
    authorization: Option<&str>,
) -> Result<ProxyConnector, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidProxy {
        proxy: proxy.to_string(),
        reason,
    };

    // Credentials travel in the CONNECT header, never in the authority.
    let mut address = proxy.clone();
    let _ = address.set_username("");
    let _ = address.set_password(None);

    let uri: Uri = address
        .as_str()
        .parse()
        .map_err(|err: http::uri::InvalidUri| invalid(err.to_string()))?;
    let mut tunnel = Tunnel::new(uri, http_connector(config));
    if let Some(credentials) = authorization {
        let value = HeaderValue::from_str(credentials)
            .map_err(|err| invalid(err.to_string()))?;
        tunnel = tunnel.with_auth(value);
    }

    Ok(HttpsConnectorBuilder::new()
        .with_tls_config(tls_config())
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(tunnel))
}
