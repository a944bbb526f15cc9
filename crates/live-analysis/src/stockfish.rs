//! UCI engine process driven over piped stdio

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::engine::{AnalysisEngine, EngineInfo, RawScore};
use crate::error::AnalysisError;

/// How long `stop` waits for `bestmove` before killing the process.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A long-lived Stockfish child process.
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    /// A `go` has been sent and its `bestmove` not yet read.
    searching: bool,
    stop_timeout: Duration,
}

impl StockfishEngine {
    /// Spawn a new Stockfish process and initialize UCI
    pub async fn new(config: &EngineConfig) -> Result<Self, AnalysisError> {
        let mut process = Command::new(&config.stockfish_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AnalysisError::Engine(format!("Failed to spawn Stockfish: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| AnalysisError::Engine("Stockfish stdin not captured".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| AnalysisError::Engine("Stockfish stdout not captured".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            searching: false,
            stop_timeout: STOP_TIMEOUT,
        };

        // Initialize UCI
        engine.send("uci").await?;
        engine.wait_for("uciok").await?;

        engine
            .send(&format!("setoption name Threads value {}", config.threads))
            .await?;
        engine
            .send(&format!("setoption name Hash value {}", config.hash_mb))
            .await?;
        engine.send("setoption name UCI_AnalyseMode value true").await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        Ok(engine)
    }

    async fn send(&mut self, cmd: &str) -> Result<(), AnalysisError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| AnalysisError::Engine(format!("Failed to write to Stockfish: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| AnalysisError::Engine(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, AnalysisError> {
        let line = self
            .stdout
            .next_line()
            .await
            .map_err(|e| AnalysisError::Engine(format!("Failed to read from Stockfish: {e}")))?
            .ok_or_else(|| AnalysisError::Engine("Stockfish closed its output".into()))?;
        let trimmed = line.trim().to_string();
        debug!(line = %trimmed, "SF >");
        Ok(trimmed)
    }

    async fn wait_for(&mut self, expected: &str) -> Result<(), AnalysisError> {
        loop {
            if self.read_line().await? == expected {
                return Ok(());
            }
        }
    }

    async fn drain_search(&mut self) -> Result<(), AnalysisError> {
        while self.searching {
            if self.read_line().await?.starts_with("bestmove") {
                self.searching = false;
            }
        }
        Ok(())
    }
}

impl AnalysisEngine for StockfishEngine {
    async fn start(&mut self, fen: &str, depth: u32) -> Result<(), AnalysisError> {
        if self.searching {
            self.stop().await?;
        }
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;
        self.searching = true;
        Ok(())
    }

    async fn next_info(&mut self) -> Result<Option<EngineInfo>, AnalysisError> {
        while self.searching {
            let line = self.read_line().await?;
            if line.starts_with("bestmove") {
                self.searching = false;
            } else if let Some(info) = parse_info(&line) {
                return Ok(Some(info));
            }
        }
        Ok(None)
    }

    async fn stop(&mut self) -> Result<(), AnalysisError> {
        if !self.searching {
            return Ok(());
        }
        self.send("stop").await?;
        match tokio::time::timeout(self.stop_timeout, self.drain_search()).await {
            Ok(drained) => drained,
            Err(_) => {
                warn!(timeout = ?self.stop_timeout, "Stockfish ignored stop, killing it");
                let _ = self.process.start_kill();
                self.searching = false;
                Err(AnalysisError::Engine("Stockfish did not answer stop".into()))
            }
        }
    }

    async fn shutdown(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        let _ = self.process.start_kill();
    }
}

/// Parse an `info` line that carries a score. Other info lines (currmove,
/// strings, hashfull) yield `None`.
fn parse_info(line: &str) -> Option<EngineInfo> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("info") {
        return None;
    }

    let mut depth = None;
    let mut score = None;
    let mut pv = Vec::new();
    while let Some(key) = tokens.next() {
        match key {
            "depth" => depth = tokens.next().and_then(|d| d.parse::<u32>().ok()),
            "score" => {
                let kind = tokens.next();
                let value = tokens.next().and_then(|v| v.parse::<i32>().ok());
                score = match (kind, value) {
                    (Some("cp"), Some(cp)) => Some(RawScore::Cp(cp)),
                    (Some("mate"), Some(n)) => Some(RawScore::Mate(n)),
                    _ => None,
                };
            }
            // The principal variation runs to the end of the line.
            "pv" => {
                pv = tokens.by_ref().map(str::to_string).collect();
            }
            // Free text, may contain anything.
            "string" => return None,
            _ => {}
        }
    }

    Some(EngineInfo {
        depth: depth?,
        score: score?,
        pv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info_centipawns() {
        let line = "info depth 12 seldepth 16 multipv 1 score cp -18 nodes 5120 nps 512000 pv c7c5 g1f3";
        let info = parse_info(line).unwrap();
        assert_eq!(info.depth, 12);
        assert_eq!(info.score, RawScore::Cp(-18));
        assert_eq!(info.pv, vec!["c7c5", "g1f3"]);
    }

    #[test]
    fn test_parse_info_mate() {
        let line = "info depth 27 seldepth 8 score mate -3 nodes 88112 pv g8h8 d1h5 h7h6";
        let info = parse_info(line).unwrap();
        assert_eq!(info.score, RawScore::Mate(-3));
        assert_eq!(info.pv.len(), 3);
    }

    #[test]
    fn test_parse_info_bound_and_missing_pv() {
        let info = parse_info("info depth 9 score cp 41 lowerbound nodes 900").unwrap();
        assert_eq!(info.score, RawScore::Cp(41));
        assert!(info.pv.is_empty());
    }

    #[test]
    fn test_parse_info_skips_scoreless_lines() {
        assert_eq!(parse_info("info depth 5 currmove e2e4 currmovenumber 1"), None);
        assert_eq!(parse_info("info string NNUE evaluation using nn-1111.nnue"), None);
        assert_eq!(parse_info("bestmove e2e4 ponder e7e5"), None);
    }

    /// Answers the handshake, then never finishes a search.
    #[cfg(unix)]
    const DEAF_ENGINE: &str = "#!/bin/sh
while read -r line; do
  case \"$line\" in
    uci) echo uciok ;;
    isready) echo readyok ;;
  esac
done
";

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_kills_engine_that_never_answers() {
        use std::os::unix::fs::PermissionsExt;

        let script = std::env::temp_dir().join(format!("deaf-engine-{}.sh", std::process::id()));
        std::fs::write(&script, DEAF_ENGINE).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = EngineConfig {
            stockfish_path: script.to_string_lossy().into_owned(),
            ..EngineConfig::default()
        };
        let mut engine = StockfishEngine::new(&config).await.unwrap();
        engine.stop_timeout = Duration::from_millis(100);
        engine.start("8/8/8/8/8/8/k7/4K3 w - - 0 1", 10).await.unwrap();

        let stopped = tokio::time::timeout(Duration::from_secs(2), engine.stop())
            .await
            .expect("stop returned within its own deadline");
        assert!(matches!(stopped, Err(AnalysisError::Engine(_))));
        assert!(!engine.searching);

        let _ = std::fs::remove_file(&script);
    }
}
