pub mod config {
    use serde::Deserialize;

    #[derive(Deserialize, Debug, Clone)]
    pub struct Config {
        pub db_url: String,
        #[serde(default = "default_port")]
        pub port: u16,
        pub jwt_secret: String,
        /// OAuth client ID that Google ID tokens must be issued for. Google login is
        /// rejected when unset.
        #[serde(default)]
        pub google_client_id: Option<String>,
        #[serde(default = "default_access_token_minutes")]
        pub access_token_minutes: i64,
        #[serde(default = "default_refresh_token_hours")]
        pub refresh_token_hours: i64,
    }

    impl Config {
        /// Loads configuration from environment variables.
        pub fn from_env() -> anyhow::Result<Self> {
            let settings = config::Config::builder()
                .add_source(config::Environment::default())
                .build()?;

            let config: Config = settings.try_deserialize()?;
            Ok(config)
        }
    }

    fn default_port() -> u16 {
        5000
    }

    fn default_access_token_minutes() -> i64 {
        60
    }

    fn default_refresh_token_hours() -> i64 {
        24 * 7
    }
}

pub mod auth;
pub mod entities;
pub mod task;
pub mod user;
pub mod web;
