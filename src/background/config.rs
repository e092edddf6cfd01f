use super::timestamper_job::TimestamperJobConfig;

/// Global background jobs configuration
#[derive(Debug, Clone, Default)]
pub struct BackgroundConfig {
    /// Disable all background jobs (for testing)
    pub disabled: bool,

    pub timestamper: TimestamperJobConfig,
}

impl BackgroundConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self {
            disabled: std::env::var("MSGLOG_BACKGROUND_DISABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            timestamper: TimestamperJobConfig::from_env(),
        }
    }
}
