use std::time::Duration;

/// Runtime settings of the lobby server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
    /// Period of the lobby snapshot broadcast
    pub lobby_interval: Duration,
    /// Period of the round-expiry sweep
    pub sweep_interval: Duration,
    /// Idle connections are dropped after this long; `None` disables the check
    pub idle_timeout: Option<Duration>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            max_connections: 256,
            lobby_interval: Duration::from_secs(5),
            sweep_interval: Duration::from_millis(1000),
            idle_timeout: Some(Duration::from_secs(300)),
        }
    }
}
