use serde::Deserialize;

/// Ten years. Keeps `iat + ttl` well inside timestamp range.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365 * 10;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

impl JwtConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.secret.is_empty(), "JWT_SECRET must not be empty");
        anyhow::ensure!(
            (1..=MAX_TTL_MINUTES).contains(&self.ttl_minutes),
            "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}"
        );
        Ok(())
    }
}

/// Argon2 cost parameters. Defaults match `argon2::Params::default()`.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "marketplace".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "marketplace-users".into()),
            // 30 days
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 24 * 30),
        };
        jwt.validate()?;

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env_or("PASSWORD_MEMORY_KIB", defaults.memory_kib),
            iterations: env_or("PASSWORD_ITERATIONS", defaults.iterations),
            parallelism: env_or("PASSWORD_PARALLELISM", defaults.parallelism),
        };

        Ok(Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            jwt,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_defaults_follow_argon2() {
        let cfg = PasswordConfig::default();
        let params = argon2::Params::default();
        assert_eq!(cfg.memory_kib, params.m_cost());
        assert_eq!(cfg.iterations, params.t_cost());
        assert_eq!(cfg.parallelism, params.p_cost());
    }

    #[test]
    fn jwt_ttl_must_be_positive_and_bounded() {
        let jwt = |ttl_minutes| JwtConfig {
            secret: "s".into(),
            issuer: "i".into(),
            audience: "a".into(),
            ttl_minutes,
        };
        assert!(jwt(60 * 24 * 30).validate().is_ok());
        assert!(jwt(MAX_TTL_MINUTES).validate().is_ok());
        assert!(jwt(0).validate().is_err());
        assert!(jwt(MAX_TTL_MINUTES + 1).validate().is_err());
        assert!(jwt(i64::MAX).validate().is_err());

        let mut empty_secret = jwt(60);
        empty_secret.secret.clear();
        assert!(empty_secret.validate().is_err());
    }

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("MARKETPLACE_TEST_PORT", "not-a-port");
        assert_eq!(env_or::<u16>("MARKETPLACE_TEST_PORT", 8080), 8080);
        std::env::set_var("MARKETPLACE_TEST_PORT", "9000");
        assert_eq!(env_or::<u16>("MARKETPLACE_TEST_PORT", 8080), 9000);
        std::env::remove_var("MARKETPLACE_TEST_PORT");
    }
}
