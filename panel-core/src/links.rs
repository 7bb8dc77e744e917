//! Share links handed to end users.

use crate::secret::normalize_secret;
use url::form_urlencoded;

/// Where end users reach the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    /// Public hostname or IP.
    pub host: String,
    /// Public port.
    pub port: u16,
}

/// The two link forms understood by Telegram clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyLinks {
    /// `https://t.me/proxy?...`
    pub proxy_link: String,
    /// `tg://proxy?...`
    pub tg_link: String,
}

/// Build share links for a credential string.
pub fn make_proxy_links(endpoint: &ProxyEndpoint, secret: &str) -> ProxyLinks {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("server", &endpoint.host)
        .append_pair("port", &endpoint.port.to_string())
        .append_pair("secret", &normalize_secret(secret))
        .finish();

    ProxyLinks {
        proxy_link: format!("https://t.me/proxy?{query}"),
        tg_link: format!("tg://proxy?{query}"),
    }
}
