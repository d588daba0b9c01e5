use config::{Config, ConfigError, Environment, File};
use dotenvy::dotenv;
use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::{postgres::PgConnectOptions, ConnectOptions};

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DATABASE_NAME: &str = "traindb";
pub const DEFAULT_USER: &str = "postgres";
pub const DEFAULT_PASSWORD: &str = "mysecretpassword";

/// Host used when no explicit host is configured and the process runs inside
/// a Kubernetes cluster.
pub const IN_CLUSTER_HOST: &str = "postgres-svc";
pub const LOCAL_HOST: &str = "localhost";

const CONFIGURATION_PATH: &str = "configuration/base";

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    #[serde(rename = "name")]
    pub database_name: String,
    #[serde(rename = "user")]
    pub username: String,
    pub password: Secret<String>,
}

impl DatabaseSettings {
    /// Resolve settings from `DB_*` environment variables layered over an
    /// optional local settings file and fixed defaults. Every field has a
    /// default, so resolution only fails when a provided value cannot be
    /// parsed.
    ///
    /// # Errors
    ///
    /// Will return `ConfigError` if the environment variables and settings
    /// file cannot build a valid `DatabaseSettings`
    pub fn generate_from_environment() -> Result<Self, ConfigError> {
        dotenv().ok();

        let base_path =
            std::env::current_dir().expect("Failed to determine the current directory.");

        let mut settings: Self = Config::builder()
            .set_default("host", "")?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("name", DEFAULT_DATABASE_NAME)?
            .set_default("user", DEFAULT_USER)?
            .set_default("password", DEFAULT_PASSWORD)?
            .add_source(File::from(base_path.join(CONFIGURATION_PATH)).required(false))
            .add_source(Environment::with_prefix("DB"))
            .build()?
            .try_deserialize()?;

        if settings.host.is_empty() {
            settings.host = default_host(running_in_cluster()).to_owned();
        }

        Ok(settings)
    }

    #[must_use]
    pub fn without_db(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(self.password.expose_secret())
    }

    #[must_use]
    pub fn with_db(&self) -> PgConnectOptions {
        let options = self.without_db().database(&self.database_name);
        options.log_statements(tracing::log::LevelFilter::Trace)
    }
}

/// Host fallback when `DB_HOST` is unset or empty: the in-cluster service
/// name under Kubernetes, localhost otherwise.
#[must_use]
pub const fn default_host(in_cluster: bool) -> &'static str {
    if in_cluster {
        IN_CLUSTER_HOST
    } else {
        LOCAL_HOST
    }
}

fn running_in_cluster() -> bool {
    ["KUBERNETES_SERVICE_HOST", "KUBERNETES_PORT"]
        .iter()
        .any(|name| std::env::var(name).is_ok_and(|value| !value.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_host_prefers_cluster_service_name_inside_kubernetes() {
        assert_eq!(default_host(true), IN_CLUSTER_HOST);
    }

    #[test]
    fn default_host_falls_back_to_localhost_outside_kubernetes() {
        assert_eq!(default_host(false), LOCAL_HOST);
    }

    #[test]
    fn port_deserializes_from_environment_style_string() {
        let settings: DatabaseSettings = Config::builder()
            .set_override("host", "db.internal")
            .unwrap()
            .set_override("port", "15432")
            .unwrap()
            .set_override("name", "traindb")
            .unwrap()
            .set_override("user", "reporting")
            .unwrap()
            .set_override("password", "secret")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.port, 15432);
        assert_eq!(settings.database_name, "traindb");
        assert_eq!(settings.username, "reporting");
    }

    #[test]
    fn connect_options_carry_the_database_name() {
        let settings = DatabaseSettings {
            host: "db.internal".to_owned(),
            port: DEFAULT_PORT,
            database_name: "traindb".to_owned(),
            username: "reporting".to_owned(),
            password: Secret::from("secret".to_owned()),
        };

        let options = settings.with_db();

        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), DEFAULT_PORT);
        assert_eq!(options.get_database(), Some("traindb"));
    }
}
