//! Engine configuration from environment variables

use std::env;

use crate::error::AnalysisError;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Path to Stockfish binary
    pub stockfish_path: String,

    /// Target search depth for each analysis session
    pub depth: u32,

    pub threads: u32,

    /// Transposition table size in MB
    pub hash_mb: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stockfish_path: "/usr/local/bin/stockfish".to_string(),
            depth: 20,
            threads: 1,
            hash_mb: 256,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, AnalysisError> {
        let defaults = Self::default();

        let stockfish_path = env::var("STOCKFISH_PATH").unwrap_or(defaults.stockfish_path);

        let depth = env::var("ANALYSIS_DEPTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.depth);
        if depth == 0 {
            return Err(AnalysisError::Config("ANALYSIS_DEPTH must be at least 1"));
        }

        let threads = env::var("ENGINE_THREADS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.threads);

        let hash_mb = env::var("ENGINE_HASH_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.hash_mb);

        Ok(Self {
            stockfish_path,
            depth,
            threads,
            hash_mb,
        })
    }
}
