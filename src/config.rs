use serde::Deserialize;

/// Upper bound on token lifetime (one year); larger values are capped.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Argon2id work factor. Defaults follow the argon2 crate's recommended parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

/// Input rules applied before anything reaches the store.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationPolicy {
    pub min_email_len: usize,
    pub min_password_len: usize,
    pub min_todo_text_len: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_email_len: 1,
            min_password_len: 6,
            min_todo_text_len: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub enum StoreConfig {
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub jwt: JwtConfig,
    pub hashing: HashingConfig,
    pub validation: ValidationPolicy,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = std::env::var("STORE_BACKEND").unwrap_or_else(|_| "postgres".into());
        let store = match backend.as_str() {
            "memory" => StoreConfig::Memory,
            "postgres" => StoreConfig::Postgres {
                database_url: std::env::var("DATABASE_URL").map_err(|_| {
                    anyhow::anyhow!("DATABASE_URL must be set for the postgres store")
                })?,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            },
            other => anyhow::bail!("unknown STORE_BACKEND {other:?}, expected postgres or memory"),
        };

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "todo-api".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "todo-api-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 24 * 7).clamp(1, MAX_TTL_MINUTES),
        };
        if jwt.secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let defaults = HashingConfig::default();
        let hashing = HashingConfig {
            memory_kib: env_or("HASH_MEMORY_KIB", defaults.memory_kib),
            iterations: env_or("HASH_ITERATIONS", defaults.iterations),
            parallelism: env_or("HASH_PARALLELISM", defaults.parallelism),
        };

        let defaults = ValidationPolicy::default();
        let validation = ValidationPolicy {
            min_email_len: env_or("EMAIL_MIN_LEN", defaults.min_email_len),
            min_password_len: env_or("PASSWORD_MIN_LEN", defaults.min_password_len),
            min_todo_text_len: env_or("TODO_TEXT_MIN_LEN", defaults.min_todo_text_len).max(1),
        };

        Ok(Self {
            store,
            jwt,
            hashing,
            validation,
        })
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            store: StoreConfig::Memory,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            // Cheap parameters keep the hashing tests fast.
            hashing: HashingConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            validation: ValidationPolicy::default(),
        }
    }
}
