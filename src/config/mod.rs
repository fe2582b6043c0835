//! Process configuration.
//!
//! Every option resolves command line > environment > built-in default.
//! `.env` files are loaded by `main` before parsing, so values placed
//! there behave like environment variables.

use clap::Parser;
use rand::RngCore;

/// Bytes of cryptographic randomness used when no secret key is supplied.
const GENERATED_SECRET_LEN: usize = 16;

#[derive(Parser, Debug, Clone)]
#[command(name = "loyalty-backend", about = "Loyalty-points backend")]
pub struct AppConfig {
    /// HTTP bind address.
    #[arg(short = 'a', long, env = "RUN_ADDRESS", default_value = "localhost:8081")]
    pub run_address: String,

    /// PostgreSQL connection string.
    #[arg(
        short = 'd',
        long,
        env = "DATABASE_URI",
        default_value = "postgres://localhost:5432/loyalty"
    )]
    pub database_uri: String,

    /// Base URL of the external accrual (grading) service.
    #[arg(
        short = 'r',
        long,
        env = "ACCRUAL_SYSTEM_ADDRESS",
        default_value = "http://localhost:8080"
    )]
    pub accrual_address: String,

    /// HMAC secret for session cookies. When absent a random secret is
    /// generated at startup, which invalidates all outstanding sessions.
    #[arg(short = 's', long, env = "SECRET_KEY")]
    pub secret_key: Option<String>,

    /// Accrual service HTTP timeout, seconds.
    #[arg(long, env = "CLIENT_TIMEOUT", default_value_t = 5)]
    pub client_timeout: u64,

    /// Grading worker count. Defaults to the number of available CPUs.
    #[arg(long, env = "GRADER_WORKERS")]
    pub workers: Option<usize>,

    /// Backoff after a rate-limit response from the accrual service, seconds.
    #[arg(long, env = "GRADER_BACKOFF", default_value_t = 10)]
    pub backoff: u64,
}

impl AppConfig {
    pub fn load() -> Self {
        Self::parse()
    }

    /// The session secret: the configured key, or fresh random bytes.
    pub fn session_secret(&self) -> Vec<u8> {
        match &self.secret_key {
            Some(key) => key.clone().into_bytes(),
            None => {
                let mut bytes = vec![0u8; GENERATED_SECRET_LEN];
                rand::thread_rng().fill_bytes(&mut bytes);
                bytes
            }
        }
    }

    /// Worker-pool size, falling back to the CPU count.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_flags() {
        let config = AppConfig::try_parse_from(["loyalty-backend"]).unwrap();
        assert_eq!(config.run_address, "localhost:8081");
        assert_eq!(config.database_uri, "postgres://localhost:5432/loyalty");
        assert_eq!(config.accrual_address, "http://localhost:8080");
        assert_eq!(config.secret_key, None);
        assert_eq!(config.client_timeout, 5);
        assert_eq!(config.backoff, 10);
    }

    #[test]
    fn short_flags_override_defaults() {
        let config = AppConfig::try_parse_from([
            "loyalty-backend",
            "-a",
            "127.0.0.1:9090",
            "-d",
            "postgres://db/points",
            "-r",
            "http://accrual:8080",
            "-s",
            "hunter2",
        ])
        .unwrap();
        assert_eq!(config.run_address, "127.0.0.1:9090");
        assert_eq!(config.database_uri, "postgres://db/points");
        assert_eq!(config.accrual_address, "http://accrual:8080");
        assert_eq!(config.secret_key.as_deref(), Some("hunter2"));
    }

    #[test]
    fn configured_secret_is_used_verbatim() {
        let config =
            AppConfig::try_parse_from(["loyalty-backend", "-s", "hunter2"]).unwrap();
        assert_eq!(config.session_secret(), b"hunter2".to_vec());
    }

    #[test]
    fn generated_secrets_are_random() {
        let config = AppConfig::try_parse_from(["loyalty-backend"]).unwrap();
        let a = config.session_secret();
        let b = config.session_secret();
        assert_eq!(a.len(), GENERATED_SECRET_LEN);
        // Two draws colliding would mean the RNG is broken.
        assert_ne!(a, b);
    }

    #[test]
    fn worker_count_honors_override() {
        let config =
            AppConfig::try_parse_from(["loyalty-backend", "--workers", "3"]).unwrap();
        assert_eq!(config.worker_count(), 3);
        let config = AppConfig::try_parse_from(["loyalty-backend"]).unwrap();
        assert!(config.worker_count() >= 1);
    }
}
