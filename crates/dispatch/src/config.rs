// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the dispatch core, shaped after `coopmux::config::MuxConfig`:
/// every knob is a `clap::Args` field with an environment-variable fallback
/// and a sane default.
#[derive(Debug, Clone, clap::Args)]
pub struct DispatchConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "IM_DISPATCH_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8900, env = "IM_DISPATCH_PORT")]
    pub port: u16,

    /// HMAC signing secret for agent bearer tokens. Mandatory; the server
    /// refuses to start with an empty or placeholder value (spec §7,
    /// fatal misconfiguration).
    #[arg(long, env = "IM_DISPATCH_TOKEN_SECRET")]
    pub token_secret: String,

    /// Token TTL in seconds.
    #[arg(long, default_value_t = 86_400, env = "IM_DISPATCH_TOKEN_TTL_SECS")]
    pub token_ttl_secs: i64,

    /// Agent liveness TTL in seconds, refreshed by heartbeat.
    #[arg(long, default_value_t = 60, env = "IM_DISPATCH_HEARTBEAT_TTL_SECS")]
    pub heartbeat_ttl_secs: u64,

    /// Heartbeat sweep period in seconds.
    #[arg(long, default_value_t = 30, env = "IM_DISPATCH_HEARTBEAT_SWEEP_SECS")]
    pub heartbeat_sweep_secs: u64,

    /// Waiting-queue drain sweep period in seconds.
    #[arg(long, default_value_t = 60, env = "IM_DISPATCH_WAITING_DRAIN_SECS")]
    pub waiting_drain_secs: u64,

    /// Timeout auto-transfer sweep period in seconds.
    #[arg(long, default_value_t = 60, env = "IM_DISPATCH_TIMEOUT_SWEEP_SECS")]
    pub timeout_sweep_secs: u64,

    /// Minutes of customer-unanswered silence before timeout auto-transfer
    /// considers a conversation a candidate.
    #[arg(long, default_value_t = 2, env = "IM_DISPATCH_TIMEOUT_THRESHOLD_MINUTES")]
    pub timeout_threshold_minutes: i64,

    /// Default per-agent capacity for newly-seen agents.
    #[arg(long, default_value_t = crate::model::DEFAULT_AGENT_CAPACITY, env = "IM_DISPATCH_DEFAULT_CAPACITY")]
    pub default_capacity: i64,

    /// Path to the SQLite database file (`:memory:` for ephemeral/tests).
    #[arg(long, default_value = "im-dispatch.sqlite3", env = "IM_DISPATCH_DB_PATH")]
    pub db_path: String,

    /// Optional Redis URL for the Registry's KV mirror (requires the
    /// `kv-mirror` feature; ignored otherwise).
    #[arg(long, env = "IM_DISPATCH_REDIS_URL")]
    pub redis_url: Option<String>,
}

impl DispatchConfig {
    pub fn heartbeat_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.heartbeat_ttl_secs)
    }

    pub fn heartbeat_sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.heartbeat_sweep_secs)
    }

    pub fn waiting_drain_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.waiting_drain_secs)
    }

    pub fn timeout_sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_sweep_secs)
    }

    /// Startup-time configuration validation (spec §7: fatal misconfiguration
    /// refuses to start). Matches the posture of `coopmux::run` failing fast
    /// on an unreadable credential config.
    pub fn validate(&self) -> anyhow::Result<()> {
        const PLACEHOLDER_SECRETS: &[&str] = &["", "changeme", "secret", "default"];
        if PLACEHOLDER_SECRETS.contains(&self.token_secret.as_str()) {
            anyhow::bail!(
                "IM_DISPATCH_TOKEN_SECRET must be set to a non-default signing secret"
            );
        }
        if self.token_secret.len() < 16 {
            anyhow::bail!("IM_DISPATCH_TOKEN_SECRET must be at least 16 bytes");
        }
        Ok(())
    }
}
