use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default(
                "checkout_success_url",
                "http://localhost:3000/checkout/success",
            )?
            .set_default(
                "checkout_cancel_url",
                "http://localhost:3000/checkout/cancel",
            )?
            .add_source(config::Environment::default())
            .build()?;

        config.try_deserialize()
    }
}
