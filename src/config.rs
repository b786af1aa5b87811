use std::env;
use std::num::ParseIntError;
use std::time::Duration;

#[derive(Debug, Clone)]
/// Application configuration loaded from environment variables.
pub struct Config {
    /// Port the HTTP/WebSocket server listens on.
    pub port: u16,
    /// Postgres connection string for the `Store` collaborator.
    pub postgres_url: String,
    /// Redis connection string for the `Cache` collaborator.
    pub redis_url: String,
    /// Origin allowed by CORS and compared against on join.
    pub web_url: String,
    /// How long a room may sit empty before the reaper evicts it.
    pub room_inactivity_threshold: Duration,
    /// Per-user cap on concurrently hosted rooms.
    pub max_rooms_hosted: u32,
    /// Logging level (e.g., "info", "debug").
    pub rust_log: String,
    /// STUN server advertised to SFU peers.
    pub stun_url: String,
}

#[derive(Debug)]
/// Errors that can occur during configuration loading.
pub enum ConfigError {
    MissingVariable(String),
    InvalidPort(String, ParseIntError),
    PortOutOfRange(u16),
    InvalidDuration(String, String),
    InvalidInteger(String, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "{} is required", var),
            ConfigError::InvalidPort(val, err) => {
                write!(
                    f,
                    "{} must be a valid port number (got '{}': {})",
                    val, val, err
                )
            }
            ConfigError::PortOutOfRange(port) => {
                write!(f, "PORT must be between 1 and 65535 (got {})", port)
            }
            ConfigError::InvalidDuration(var, reason) => {
                write!(f, "{} must be a valid duration ({})", var, reason)
            }
            ConfigError::InvalidInteger(var, reason) => {
                write!(f, "{} must be a valid integer ({})", var, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Validates environment variables and returns a Config object.
/// Returns an error if any required variable is missing or invalid.
pub fn validate_env() -> Result<Config, ConfigError> {
    let postgres_url = env::var("POSTGRES_URL")
        .map_err(|_| ConfigError::MissingVariable("POSTGRES_URL".to_string()))?;
    let redis_url =
        env::var("REDIS_URL").map_err(|_| ConfigError::MissingVariable("REDIS_URL".to_string()))?;
    let web_url =
        env::var("WEB_URL").map_err(|_| ConfigError::MissingVariable("WEB_URL".to_string()))?;

    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "6969".to_string())
        .parse()
        .map_err(|e| ConfigError::InvalidPort("PORT".to_string(), e))?;
    if port == 0 {
        return Err(ConfigError::PortOutOfRange(port));
    }

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| {
        eprintln!("RUST_LOG not set, using default: info");
        "info".to_string()
    });

    let stun_url = env::var("STUN_URL")
        .unwrap_or_else(|_| "stun:stun.l.google.com:19302".to_string());

    let room_inactivity_threshold_str =
        env::var("ROOM_INACTIVITY_THRESHOLD").unwrap_or_else(|_| "5m".to_string());
    let room_inactivity_threshold = humantime::parse_duration(&room_inactivity_threshold_str)
        .map_err(|e| {
            ConfigError::InvalidDuration("ROOM_INACTIVITY_THRESHOLD".to_string(), e.to_string())
        })?;

    let max_rooms_hosted: u32 = env::var("MAX_ROOMS_HOSTED")
        .unwrap_or_else(|_| "3".to_string())
        .parse()
        .map_err(|_: std::num::ParseIntError| {
            ConfigError::InvalidInteger(
                "MAX_ROOMS_HOSTED".to_string(),
                "must be a non-negative integer".to_string(),
            )
        })?;

    Ok(Config {
        port,
        postgres_url,
        redis_url,
        web_url,
        room_inactivity_threshold,
        max_rooms_hosted,
        rust_log,
        stun_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    lazy_static::lazy_static! {
        static ref ENV_MUTEX: Mutex<()> = Mutex::new(());
    }

    struct EnvGuard<'a> {
        vars: Vec<String>,
        _guard: std::sync::MutexGuard<'a, ()>,
    }

    impl<'a> EnvGuard<'a> {
        fn new() -> Self {
            let guard = ENV_MUTEX.lock().unwrap();
            EnvGuard {
                vars: Vec::new(),
                _guard: guard,
            }
        }

        fn set(&mut self, key: &str, value: &str) {
            env::set_var(key, value);
            self.vars.push(key.to_string());
        }

        fn unset(&mut self, key: &str) {
            env::remove_var(key);
            self.vars.push(key.to_string());
        }
    }

    impl<'a> Drop for EnvGuard<'a> {
        fn drop(&mut self) {
            for var in &self.vars {
                env::remove_var(var);
            }
        }
    }

    fn set_required(guard: &mut EnvGuard) {
        guard.set("POSTGRES_URL", "postgres://localhost/cybertown");
        guard.set("REDIS_URL", "redis://localhost");
        guard.set("WEB_URL", "http://localhost:3000");
    }

    #[test]
    fn test_validate_env_valid_configuration() {
        let mut guard = EnvGuard::new();
        set_required(&mut guard);
        guard.set("PORT", "8080");
        guard.set("RUST_LOG", "debug");

        let config = validate_env().expect("Expected valid configuration");
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "debug");
    }

    #[test]
    fn test_validate_env_port_defaults() {
        let mut guard = EnvGuard::new();
        set_required(&mut guard);
        guard.unset("PORT");

        let config = validate_env().expect("Expected valid configuration");
        assert_eq!(config.port, 6969);
    }

    #[test]
    fn test_validate_env_missing_postgres_url() {
        let mut guard = EnvGuard::new();
        guard.set("REDIS_URL", "redis://localhost");
        guard.set("WEB_URL", "http://localhost:3000");
        guard.unset("POSTGRES_URL");

        let result = validate_env();
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::MissingVariable(_)
        ));
    }

    #[test]
    fn test_validate_env_invalid_port() {
        let mut guard = EnvGuard::new();
        set_required(&mut guard);
        guard.set("PORT", "not-a-number");

        let result = validate_env();
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::InvalidPort(_, _)));
    }

    #[test]
    fn test_validate_env_port_out_of_range() {
        let mut guard = EnvGuard::new();
        set_required(&mut guard);
        guard.set("PORT", "0");

        let result = validate_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::PortOutOfRange(_)
        ));
    }

    #[test]
    fn test_validate_env_room_inactivity_threshold_parses_compound_duration() {
        let mut guard = EnvGuard::new();
        set_required(&mut guard);
        guard.set("ROOM_INACTIVITY_THRESHOLD", "1h30m");

        let config = validate_env().expect("Expected valid configuration");
        assert_eq!(
            config.room_inactivity_threshold,
            Duration::from_secs(90 * 60)
        );
    }

    #[test]
    fn test_validate_env_invalid_duration() {
        let mut guard = EnvGuard::new();
        set_required(&mut guard);
        guard.set("ROOM_INACTIVITY_THRESHOLD", "soon");

        let result = validate_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidDuration(_, _)
        ));
    }

    #[test]
    fn test_validate_env_max_rooms_hosted_default() {
        let mut guard = EnvGuard::new();
        set_required(&mut guard);
        guard.unset("MAX_ROOMS_HOSTED");

        let config = validate_env().expect("Expected valid configuration");
        assert_eq!(config.max_rooms_hosted, 3);
    }
}
