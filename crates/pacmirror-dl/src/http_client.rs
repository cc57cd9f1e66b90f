use std::time::Duration;

use ureq::{Agent, Proxy};

pub const DEFAULT_USER_AGENT: &str = concat!("pacmirror/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub user_agent: Option<String>,
    pub proxy: Option<Proxy>,
    /// Applied to connecting and to waiting for the response head of each request.
    pub timeout: Option<Duration>,
    /// Limit on receiving a response body. A mirror that stalls mid-transfer fails
    /// the attempt once it is exceeded.
    pub download_timeout: Option<Duration>,
}

/// Default body transfer limit; generous enough for the largest packages.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

impl Default for ClientConfig {
    /// Creates a default ClientConfig.
    ///
    /// The default sets a `pacmirror/<version>` user agent, picks up a proxy from the
    /// environment when one is set, applies a 30 second request timeout and allows
    /// [`DEFAULT_DOWNLOAD_TIMEOUT`] for each response body.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use pacmirror_dl::http_client::ClientConfig;
    ///
    /// let cfg = ClientConfig::default();
    /// assert!(cfg.user_agent.as_deref().unwrap().starts_with("pacmirror/"));
    /// assert_eq!(cfg.timeout, Some(Duration::from_secs(30)));
    /// ```
    fn default() -> Self {
        Self {
            user_agent: Some(DEFAULT_USER_AGENT.into()),
            proxy: Proxy::try_from_env(),
            timeout: Some(Duration::from_secs(30)),
            download_timeout: Some(DEFAULT_DOWNLOAD_TIMEOUT),
        }
    }
}

impl ClientConfig {
    /// Builds an HTTP `Agent` configured from this `ClientConfig`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pacmirror_dl::http_client::ClientConfig;
    ///
    /// let agent = ClientConfig::default().build();
    /// let _req = agent.get("http://example.com");
    /// ```
    pub fn build(&self) -> Agent {
        let mut config = ureq::Agent::config_builder()
            .proxy(self.proxy.clone())
            .timeout_connect(self.timeout)
            .timeout_recv_response(self.timeout)
            .timeout_recv_body(self.download_timeout);

        if let Some(user_agent) = &self.user_agent {
            config = config.user_agent(user_agent);
        }

        config.build().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.user_agent.as_deref(), Some(DEFAULT_USER_AGENT));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.download_timeout, Some(DEFAULT_DOWNLOAD_TIMEOUT));
    }

    #[test]
    fn test_client_config_build() {
        let config = ClientConfig {
            user_agent: Some("test-agent".to_string()),
            proxy: None,
            timeout: Some(Duration::from_secs(5)),
            download_timeout: Some(Duration::from_secs(5)),
        };
        let agent = config.build();
        let _ = agent.get("https://example.com");
    }
}
