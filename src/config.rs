use std::path::PathBuf;

pub const WORKSPACE_ENV: &str = "HORARIOSD_WORKSPACE";
pub const LOG_ENV: &str = "HORARIOSD_LOG";
const DEFAULT_LOG_FILTER: &str = "info";

/// Process-level settings read once at start-up.
#[derive(Debug, Clone, Default)]
pub struct DaemonConfig {
    pub workspace: Option<PathBuf>,
    pub log_filter: Option<String>,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            workspace: non_empty(WORKSPACE_ENV).map(PathBuf::from),
            log_filter: non_empty(LOG_ENV),
        }
    }

    /// `RUST_LOG` wins, then `HORARIOSD_LOG`, then `info`.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let directive = self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER);
            tracing_subscriber::EnvFilter::try_new(directive)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
        })
    }
}
