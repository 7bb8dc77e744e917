//! Best-effort public IP discovery.
//!
//! The detected address only feeds share links and the status snapshot. A
//! failed lookup is recorded and otherwise ignored.

use crate::config::{IpProviderConfig, IpResponseFormat, PublicIpConfig};
use crate::error::LookupError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Last lookup result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpState {
    /// Most recently detected address.
    pub value: Option<IpAddr>,
    /// When `value` was last refreshed.
    pub last_updated_at: Option<DateTime<Utc>>,
    /// Error of the last failed refresh, cleared on success.
    pub last_error: Option<String>,
}

#[derive(Deserialize)]
struct JsonIpBody {
    ip: String,
}

/// Parse a provider response as an IP address, `None` if it is not one.
pub fn normalize_ip(text: &str) -> Option<IpAddr> {
    text.trim().parse().ok()
}

/// Queries providers in priority order and keeps the latest answer.
#[derive(Debug)]
pub struct PublicIpLookup {
    http: reqwest::Client,
    providers: Vec<IpProviderConfig>,
    state: RwLock<PublicIpState>,
}

impl PublicIpLookup {
    /// Build a lookup with a per-request timeout from `config`.
    pub fn new(config: &PublicIpConfig) -> Result<Self, LookupError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("mtpanel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            providers: config.providers.clone(),
            state: RwLock::new(PublicIpState::default()),
        })
    }

    /// Current state snapshot.
    pub async fn state(&self) -> PublicIpState {
        self.state.read().await.clone()
    }

    /// Most recently detected address.
    pub async fn current(&self) -> Option<IpAddr> {
        self.state.read().await.value
    }

    /// Try every provider in order and record the first valid address.
    ///
    /// On total failure the previous address is kept and the error recorded.
    pub async fn refresh(&self) -> Result<IpAddr, LookupError> {
        for provider in &self.providers {
            match self.query(provider).await {
                Some(ip) => {
                    let mut state = self.state.write().await;
                    state.value = Some(ip);
                    state.last_updated_at = Some(Utc::now());
                    state.last_error = None;
                    tracing::debug!("Public IP {ip} from {}", provider.url);
                    return Ok(ip);
                }
                None => tracing::debug!("Public IP provider {} gave no answer", provider.url),
            }
        }

        let err = LookupError::AllProvidersFailed;
        self.state.write().await.last_error = Some(err.to_string());
        Err(err)
    }

    async fn query(&self, provider: &IpProviderConfig) -> Option<IpAddr> {
        let response = self
            .http
            .get(&provider.url)
            .send()
            .await
            .ok()?
            .error_for_status()
            .ok()?;
        let body = response.text().await.ok()?;

        match provider.format {
            IpResponseFormat::Json => {
                let parsed: JsonIpBody = serde_json::from_str(&body).ok()?;
                normalize_ip(&parsed.ip)
            }
            IpResponseFormat::Text => normalize_ip(&body),
        }
    }
}

/// Spawn the periodic public IP refresh task.
///
/// The first refresh happens one interval after spawning; callers run an
/// initial lookup themselves at startup.
pub fn spawn_public_ip_task(
    lookup: Arc<PublicIpLookup>,
    config: PublicIpConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Public IP refresh disabled");
            return;
        }

        let period = config.refresh_interval();
        tracing::info!("Public IP refresh started (interval: {}s)", period.as_secs());
        refresh_loop(&lookup, period).await;
    })
}

async fn refresh_loop(lookup: &PublicIpLookup, period: Duration) {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        timer.tick().await;
        if let Err(e) = lookup.refresh().await {
            tracing::info!("Public IP refresh: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(providers: Vec<IpProviderConfig>) -> PublicIpConfig {
        PublicIpConfig {
            providers,
            request_timeout_secs: 1,
            ..Default::default()
        }
    }

    fn provider(server: &MockServer, route: &str, format: IpResponseFormat) -> IpProviderConfig {
        IpProviderConfig {
            url: format!("{}{}", server.uri(), route),
            format,
        }
    }

    #[test]
    fn normalize_accepts_v4_and_v6() {
        assert_eq!(normalize_ip(" 203.0.113.9\n"), "203.0.113.9".parse().ok());
        assert_eq!(normalize_ip("2001:db8::1"), "2001:db8::1".parse().ok());
        assert_eq!(normalize_ip("<html>"), None);
        assert_eq!(normalize_ip(""), None);
    }

    #[tokio::test]
    async fn json_provider_answer_is_used() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ip":"198.51.100.4"}"#))
            .mount(&server)
            .await;

        let lookup =
            PublicIpLookup::new(&config_for(vec![provider(&server, "/json", IpResponseFormat::Json)]))
                .unwrap();
        let ip = lookup.refresh().await.unwrap();

        assert_eq!(ip, "198.51.100.4".parse::<IpAddr>().unwrap());
        let state = lookup.state().await;
        assert_eq!(state.value, Some(ip));
        assert!(state.last_updated_at.is_some());
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn falls_through_failing_providers_in_order() {
        let server = MockServer::start().await;
        Mock::given(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not an ip"))
            .mount(&server)
            .await;
        Mock::given(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("192.0.2.1")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;
        Mock::given(path("/text"))
            .respond_with(ResponseTemplate::new(200).set_body_string("192.0.2.77\n"))
            .mount(&server)
            .await;

        let lookup = PublicIpLookup::new(&config_for(vec![
            provider(&server, "/down", IpResponseFormat::Text),
            provider(&server, "/garbage", IpResponseFormat::Text),
            provider(&server, "/slow", IpResponseFormat::Text),
            provider(&server, "/text", IpResponseFormat::Text),
        ]))
        .unwrap();

        assert_eq!(
            lookup.refresh().await.unwrap(),
            "192.0.2.77".parse::<IpAddr>().unwrap()
        );
    }

    #[tokio::test]
    async fn total_failure_keeps_previous_value() {
        let server = MockServer::start().await;
        Mock::given(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("192.0.2.10"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(path("/ok"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let lookup =
            PublicIpLookup::new(&config_for(vec![provider(&server, "/ok", IpResponseFormat::Text)]))
                .unwrap();
        lookup.refresh().await.unwrap();

        let err = lookup.refresh().await.unwrap_err();
        assert!(matches!(err, LookupError::AllProvidersFailed));

        let state = lookup.state().await;
        assert_eq!(state.value, "192.0.2.10".parse().ok());
        assert_eq!(state.last_error.as_deref(), Some("failed to detect public IP"));
    }

    #[tokio::test]
    async fn disabled_task_exits() {
        let lookup = Arc::new(PublicIpLookup::new(&PublicIpConfig::default()).unwrap());
        let config = PublicIpConfig {
            enabled: false,
            ..Default::default()
        };

        let handle = spawn_public_ip_task(lookup, config);
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("Task should complete when disabled")
            .expect("Task should not panic");
    }

    #[tokio::test]
    async fn each_tick_refreshes_after_failure() {
        let server = MockServer::start().await;
        Mock::given(path("/ip"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(path("/ip"))
            .respond_with(ResponseTemplate::new(200).set_body_string("192.0.2.55"))
            .mount(&server)
            .await;

        let lookup = Arc::new(
            PublicIpLookup::new(&config_for(vec![provider(&server, "/ip", IpResponseFormat::Text)]))
                .unwrap(),
        );
        let task = {
            let lookup = lookup.clone();
            tokio::spawn(async move { refresh_loop(&lookup, Duration::from_millis(50)).await })
        };

        for _ in 0..100 {
            if lookup.current().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        task.abort();

        assert_eq!(lookup.current().await, "192.0.2.55".parse().ok());
        assert!(lookup.state().await.last_error.is_none());
        let requests = server.received_requests().await.unwrap();
        assert!(requests.len() >= 2);
    }
}
