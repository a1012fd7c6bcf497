//! Configuration module for netwatch.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Invalid configuration (empty target set, non-positive counts) is fatal at
//! startup: the monitoring loop refuses to run rather than divide by zero or
//! spin on a zero-length interval.

use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Probe targets, monitored as one pooled set (default: public resolvers)
    pub targets: Vec<String>,
    /// Probes issued per target per run (default: 5)
    pub probes_per_target: u32,
    /// Per-probe timeout (default: 2s)
    pub probe_timeout: Duration,
    /// Interval between monitoring runs (default: 60s)
    pub run_interval: Duration,
    /// Consecutive full-failure runs before automatic remediation (default: 5)
    pub failure_threshold: u32,
    /// Retention horizon for samples and events (default: 14 days)
    pub retention_days: u32,
    /// Monitoring runs between compaction passes (default: 720)
    pub compaction_interval_runs: u32,
    /// Minimum time between two remediation firings (default: 3600s)
    pub cooldown: Duration,
    /// Path to the SQLite database file (default: "netwatch.db")
    pub db_path: String,
    /// Directory holding the durable counter and cooldown files (default: ".")
    pub state_dir: String,
    /// HTTP port for the query/trigger server (default: 8080)
    pub http_port: u16,
    /// Max cached range queries; 0 disables the cache (default: 64)
    pub cache_capacity: u64,
    /// TTL for cached query results (default: 30s)
    pub cache_ttl: Duration,
    /// External power-cycle command; unset leaves remediation unconfigured
    pub power_cycle_command: Option<String>,
    /// Bound on the power-cycle command (default: 120s)
    pub power_cycle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            targets: vec![
                "8.8.8.8".to_string(),
                "1.1.1.1".to_string(),
                "9.9.9.9".to_string(),
            ],
            probes_per_target: 5,
            probe_timeout: Duration::from_secs(2),
            run_interval: Duration::from_secs(60),
            failure_threshold: 5,
            retention_days: 14,
            compaction_interval_runs: 720,
            cooldown: Duration::from_secs(3600),
            db_path: "netwatch.db".to_string(),
            state_dir: ".".to_string(),
            http_port: 8080,
            cache_capacity: 64,
            cache_ttl: Duration::from_secs(30),
            power_cycle_command: None,
            power_cycle_timeout: Duration::from_secs(120),
        }
    }
}

impl Config {
    /// Load configuration from `NETWATCH_*` environment variables.
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(raw) = env::var("NETWATCH_TARGETS") {
            let targets: Vec<String> = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            cfg.targets = targets;
        }

        if let Some(n) = parse_var::<u32>("NETWATCH_PROBES_PER_TARGET") {
            cfg.probes_per_target = n;
        }
        if let Some(secs) = parse_var::<u64>("NETWATCH_PROBE_TIMEOUT_SECS") {
            cfg.probe_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>("NETWATCH_RUN_INTERVAL_SECS") {
            cfg.run_interval = Duration::from_secs(secs);
        }
        if let Some(n) = parse_var::<u32>("NETWATCH_FAILURE_THRESHOLD") {
            cfg.failure_threshold = n;
        }
        if let Some(n) = parse_var::<u32>("NETWATCH_RETENTION_DAYS") {
            cfg.retention_days = n;
        }
        if let Some(n) = parse_var::<u32>("NETWATCH_COMPACTION_INTERVAL_RUNS") {
            cfg.compaction_interval_runs = n;
        }
        if let Some(secs) = parse_var::<u64>("NETWATCH_COOLDOWN_SECS") {
            cfg.cooldown = Duration::from_secs(secs);
        }
        if let Ok(path) = env::var("NETWATCH_DB_PATH") {
            cfg.db_path = path;
        }
        if let Ok(dir) = env::var("NETWATCH_STATE_DIR") {
            cfg.state_dir = dir;
        }
        if let Some(port) = parse_var::<u16>("NETWATCH_HTTP_PORT") {
            cfg.http_port = port;
        }
        if let Some(n) = parse_var::<u64>("NETWATCH_CACHE_CAPACITY") {
            cfg.cache_capacity = n;
        }
        if let Some(secs) = parse_var::<u64>("NETWATCH_CACHE_TTL_SECS") {
            cfg.cache_ttl = Duration::from_secs(secs);
        }
        if let Ok(cmd) = env::var("NETWATCH_POWER_CYCLE_COMMAND") {
            if !cmd.trim().is_empty() {
                cfg.power_cycle_command = Some(cmd);
            }
        }
        if let Some(secs) = parse_var::<u64>("NETWATCH_POWER_CYCLE_TIMEOUT_SECS") {
            cfg.power_cycle_timeout = Duration::from_secs(secs);
        }

        cfg
    }

    /// Validate the configuration. Errors here are fatal at startup.
    pub fn validate(&self) -> Result<(), String> {
        if self.targets.is_empty() {
            return Err("target set is empty".to_string());
        }
        if self.probes_per_target == 0 {
            return Err("probes per target must be positive".to_string());
        }
        if self.probe_timeout.is_zero() {
            return Err("probe timeout must be positive".to_string());
        }
        if self.run_interval.is_zero() {
            return Err("run interval must be positive".to_string());
        }
        if self.failure_threshold == 0 {
            return Err("failure threshold must be positive".to_string());
        }
        if self.compaction_interval_runs == 0 {
            return Err("compaction interval must be positive".to_string());
        }
        Ok(())
    }

    /// Total probes per run; the fixed denominator for all percentage math.
    pub fn probes_per_run(&self) -> u32 {
        self.targets.len() as u32 * self.probes_per_target
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.targets.len(), 3);
        assert_eq!(cfg.probes_per_target, 5);
        assert_eq!(cfg.probe_timeout, Duration::from_secs(2));
        assert_eq!(cfg.failure_threshold, 5);
        assert_eq!(cfg.retention_days, 14);
        assert_eq!(cfg.compaction_interval_runs, 720);
        assert_eq!(cfg.cooldown, Duration::from_secs(3600));
        assert!(cfg.power_cycle_command.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_probes_per_run() {
        let cfg = Config::default();
        assert_eq!(cfg.probes_per_run(), 15);
    }

    #[test]
    fn test_validate_rejects_empty_targets() {
        let cfg = Config {
            targets: vec![],
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_probes() {
        let cfg = Config {
            probes_per_target: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let cfg = Config {
            failure_threshold: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
