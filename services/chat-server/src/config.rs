use std::env;

/// Process configuration, loaded once from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub token_secret: String,
    pub log_level: String,
    pub outbound_queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned()),
            token_secret: env::var("CHAT_TOKEN_SECRET").expect("CHAT_TOKEN_SECRET must be set"),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned()),
            outbound_queue_capacity: env::var("CHAT_OUTBOUND_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(256),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_applies_defaults_for_optional_vars() {
        // SAFETY: test runs single-threaded w.r.t. these vars within this process.
        unsafe {
            env::set_var("DATABASE_URL", "postgres://localhost/test");
            env::set_var("CHAT_TOKEN_SECRET", "secret");
            env::remove_var("BIND_ADDR");
            env::remove_var("LOG_LEVEL");
            env::remove_var("CHAT_OUTBOUND_QUEUE_CAPACITY");
        }
        let config = Config::from_env();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.outbound_queue_capacity, 256);
    }

    #[test]
    fn from_env_reads_queue_capacity_override() {
        unsafe {
            env::set_var("DATABASE_URL", "postgres://localhost/test");
            env::set_var("CHAT_TOKEN_SECRET", "secret");
            env::set_var("CHAT_OUTBOUND_QUEUE_CAPACITY", "8");
        }
        let config = Config::from_env();
        assert_eq!(config.outbound_queue_capacity, 8);
        unsafe {
            env::remove_var("CHAT_OUTBOUND_QUEUE_CAPACITY");
        }
    }
}
