use serde::Deserialize;

use crate::reconcile::ReconcileMode;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    /// How child ids that don't belong to the parent are treated on update.
    pub reconcile_mode: ReconcileMode,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "fitcore".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "fitcore-users".into()),
        };
        let reconcile_mode = std::env::var("RECONCILE_STRICT_IDS")
            .ok()
            .map(|v| parse_flag(&v))
            .map(ReconcileMode::from_strict)
            .unwrap_or_default();
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = std::env::var("APP_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);
        Ok(Self {
            database_url,
            max_connections,
            jwt,
            reconcile_mode,
            host,
            port,
        })
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsing_accepts_common_truthy_values() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("1"));
        assert!(parse_flag("yes"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn strict_flag_maps_to_reconcile_mode() {
        assert_eq!(ReconcileMode::from_strict(true), ReconcileMode::Strict);
        assert_eq!(ReconcileMode::from_strict(false), ReconcileMode::Lenient);
        assert_eq!(ReconcileMode::default(), ReconcileMode::Lenient);
    }
}
