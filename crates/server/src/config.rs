use std::env;
use std::path::PathBuf;

use live_analysis::EngineConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Opening corpus in `.eco` format
    pub eco_book_path: PathBuf,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            eco_book_path: env::var("ECO_BOOK_PATH")
                .unwrap_or_else(|_| "data/openings.eco".to_string())
                .into(),
            engine: EngineConfig::from_env()?,
        })
    }
}
