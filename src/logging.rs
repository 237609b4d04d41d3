//! Log filtering for the service binary.

use tracing_subscriber::EnvFilter;

/// Directives used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_LOG_DIRECTIVES: &str = "rpm_user_service=info,surrealdb=warn";

/// Filter from the given `RUST_LOG` value, else the defaults.
pub fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_DIRECTIVES))
}

/// Filter from the process environment.
pub fn env_filter() -> EnvFilter {
    log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    fn enabled_under(filter: EnvFilter, check: impl FnOnce() -> bool) -> bool {
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
        tracing::subscriber::with_default(subscriber, check)
    }

    #[test]
    fn test_defaults_apply_without_rust_log() {
        assert!(enabled_under(log_filter(None), || {
            tracing::enabled!(target: "rpm_user_service::auth", Level::INFO)
        }));
        assert!(!enabled_under(log_filter(None), || {
            tracing::enabled!(target: "rpm_user_service::auth", Level::DEBUG)
        }));
        assert!(!enabled_under(log_filter(None), || {
            tracing::enabled!(target: "surrealdb::core", Level::INFO)
        }));
        assert!(enabled_under(log_filter(None), || {
            tracing::enabled!(target: "surrealdb::core", Level::WARN)
        }));
    }

    #[test]
    fn test_rust_log_is_honoured() {
        let filter = || log_filter(Some("rpm_user_service=debug"));
        assert!(enabled_under(filter(), || {
            tracing::enabled!(target: "rpm_user_service::api", Level::DEBUG)
        }));
        assert!(!enabled_under(filter(), || {
            tracing::enabled!(target: "surrealdb::core", Level::INFO)
        }));
    }

    #[test]
    fn test_blank_rust_log_falls_back() {
        assert!(!enabled_under(log_filter(Some("  ")), || {
            tracing::enabled!(target: "rpm_user_service::auth", Level::DEBUG)
        }));
    }
}
