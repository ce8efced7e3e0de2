//! Link builder for configuring the subscription transport
//!
//! The `LinkBuilder` provides a fluent API for configuring a
//! [`SubscriptionLink`] before use:
//! - static headers and credentials mode for the stream requests
//! - retry policy and heartbeat window
//! - debug logging or full OpenTelemetry observability
//! - a custom [`StreamConnector`], which is how tests drive the state
//!   machine without a gateway
//!
//! # Examples
//!
//! ```rust,no_run
//! use sselink_client::{LinkBuilder, RetryPolicy};
//! use std::time::Duration;
//!
//! # fn example() -> sselink_core::Result<()> {
//! let link = LinkBuilder::new("https://gateway.local/graphql/stream")
//!     .header("Authorization", "Bearer token")
//!     .retry(RetryPolicy::default().with_attempts(10))
//!     .heartbeat_timeout(Duration::from_secs(90))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::backoff::RetryPolicy;
use crate::config::{self, Credentials, DebugConfig, LinkConfig, LogLevel, DEFAULT_HEARTBEAT_TIMEOUT};
use crate::connector::{HttpConnector, StreamConnector};
use crate::link::SubscriptionLink;
use crate::metrics::LinkMetrics;
use sselink_core::{Error, ObservabilityConfig, Result};
use std::sync::Arc;
use std::time::Duration;

/// Builder for configuring and creating a [`SubscriptionLink`].
pub struct LinkBuilder {
    url: String,
    headers: Vec<(String, String)>,
    credentials: Credentials,
    retry: RetryPolicy,
    heartbeat_timeout: Duration,
    debug: DebugConfig,
    connector: Option<Arc<dyn StreamConnector>>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl LinkBuilder {
    /// Create a new link builder for the given endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            credentials: Credentials::default(),
            retry: RetryPolicy::default(),
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            debug: DebugConfig::default(),
            connector: None,
            observability_config: None,
            service_name: None,
        }
    }

    /// Attach a static header to every stream request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the credentials mode.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the heartbeat window.
    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    /// Enable debug logging at the given level.
    pub fn debug(mut self, log_level: LogLevel) -> Self {
        self.debug = DebugConfig {
            enabled: true,
            log_level,
        };
        self
    }

    /// Use a custom stream connector instead of the HTTP default.
    pub fn connector(mut self, connector: Arc<dyn StreamConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Enable OpenTelemetry observability with custom configuration.
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration.
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled).
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Build the link.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid endpoint URL, and an
    /// internal configuration error if the observability pipeline fails to
    /// initialize.
    pub fn build(self) -> Result<SubscriptionLink> {
        let url = config::parse_endpoint(&self.url)?;

        // Full observability wins over plain debug logging; both install a
        // global tracing subscriber and only one can.
        let metrics = if let Some(mut obs) = self.observability_config {
            if let Some(name) = self.service_name {
                obs.service_name = name;
            }
            let service_name = obs.service_name.clone();
            sselink_core::init_observability(obs).map_err(|e| {
                Error::Config(format!("failed to initialize observability: {}", e))
            })?;
            Some(Arc::new(LinkMetrics::new(service_name)))
        } else {
            if self.debug.enabled {
                sselink_core::init_debug_logging(self.debug.log_level.as_filter());
            }
            None
        };

        let config = LinkConfig {
            url,
            headers: self.headers,
            credentials: self.credentials,
            retry: self.retry,
            heartbeat_timeout: self.heartbeat_timeout,
            debug: self.debug,
        };

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(HttpConnector::new()));

        Ok(SubscriptionLink::from_parts(config, connector, metrics))
    }
}
