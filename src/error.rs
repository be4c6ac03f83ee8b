use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `idlekeeper`.
///
/// Only the open/load edges (config parse, store open) propagate errors;
/// per-sweep operations swallow store failures and return sentinel values so
/// a transient outage never kills a sweep. Internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum EngageError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Store ────────────────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Store errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("open failed: {0}")]
    Open(String),

    #[error("schema migration failed: {0}")]
    Migration(String),

    #[error("query failed: {0}")]
    Query(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, EngageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_displays_correctly() {
        let err = EngageError::Config(ConfigError::Validation("salience threshold".into()));
        assert!(err.to_string().contains("validation failed"));
        assert!(err.to_string().contains("salience threshold"));
    }

    #[test]
    fn store_error_displays_correctly() {
        let err = EngageError::Store(StoreError::Open("bad path".into()));
        assert!(err.to_string().contains("open failed"));
    }

    #[test]
    fn anyhow_interop() {
        let anyhow_err = anyhow::anyhow!("something went wrong");
        let engage_err: EngageError = anyhow_err.into();
        assert!(engage_err.to_string().contains("something went wrong"));
    }
}
