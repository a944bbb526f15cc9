pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod session;
pub mod sink;
pub mod stockfish;

pub use config::EngineConfig;
pub use coordinator::{AnalysisCoordinator, AnalysisTarget, SessionEnd};
pub use engine::{AnalysisEngine, EngineInfo, RawScore};
pub use error::AnalysisError;
pub use evaluation::Evaluation;
pub use session::GameSession;
pub use sink::{EvaluationSink, TreeSink};
pub use stockfish::StockfishEngine;
