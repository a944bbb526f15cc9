#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chess_core::{OpeningTrie, TreeView};
use live_analysis::{
    AnalysisCoordinator, AnalysisEngine, AnalysisError, EngineInfo, Evaluation, EvaluationSink,
    RawScore, TreeSink,
};

pub const CORPUS_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/openings.eco");

pub fn load_corpus() -> Arc<OpeningTrie> {
    Arc::new(OpeningTrie::load(CORPUS_PATH).expect("corpus should load"))
}

/// Commands the scripted engine received, e.g. `start <fen> 20`, `stop`.
pub type CommandLog = Arc<Mutex<Vec<String>>>;

/// In-memory engine: for `go depth N` it streams one record per depth
/// 1..=N, scoring `10 * depth` centipawns, after `step` each.
pub struct ScriptedEngine {
    step: Duration,
    /// Return an engine fault instead of the record at this depth.
    fail_at: Option<u32>,
    /// Never produce a record.
    stall: bool,
    queue: VecDeque<EngineInfo>,
    searching: bool,
    log: CommandLog,
}

impl ScriptedEngine {
    pub fn new(step: Duration) -> (Self, CommandLog) {
        let log = CommandLog::default();
        let engine = Self {
            step,
            fail_at: None,
            stall: false,
            queue: VecDeque::new(),
            searching: false,
            log: Arc::clone(&log),
        };
        (engine, log)
    }

    pub fn failing_at(mut self, depth: u32) -> Self {
        self.fail_at = Some(depth);
        self
    }

    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }
}

impl AnalysisEngine for ScriptedEngine {
    async fn start(&mut self, fen: &str, depth: u32) -> Result<(), AnalysisError> {
        self.log.lock().unwrap().push(format!("start {fen} {depth}"));
        self.queue = (1..=depth)
            .map(|d| EngineInfo {
                depth: d,
                score: RawScore::Cp(10 * d as i32),
                pv: vec!["e2e4".into(), "e7e5".into()],
            })
            .collect();
        self.searching = true;
        Ok(())
    }

    async fn next_info(&mut self) -> Result<Option<EngineInfo>, AnalysisError> {
        if self.stall {
            std::future::pending::<()>().await;
        }
        if !self.searching {
            return Ok(None);
        }
        tokio::time::sleep(self.step).await;

        let Some(info) = self.queue.pop_front() else {
            self.searching = false;
            return Ok(None);
        };
        if Some(info.depth) == self.fail_at {
            self.searching = false;
            return Err(AnalysisError::Engine("engine process died".into()));
        }
        Ok(Some(info))
    }

    async fn stop(&mut self) -> Result<(), AnalysisError> {
        self.log.lock().unwrap().push("stop".into());
        self.queue.clear();
        self.searching = false;
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.log.lock().unwrap().push("quit".into());
    }
}

pub fn starts(log: &CommandLog) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|c| c.starts_with("start"))
        .cloned()
        .collect()
}

pub type EvalLog = Arc<Mutex<Vec<Evaluation>>>;

pub fn eval_sink() -> (Arc<dyn EvaluationSink>, EvalLog) {
    let log = EvalLog::default();
    let sink_log = Arc::clone(&log);
    let sink = move |eval: &Evaluation| sink_log.lock().unwrap().push(eval.clone());
    (Arc::new(sink), log)
}

pub type TreeLog = Arc<Mutex<Vec<TreeView>>>;

pub fn tree_sink() -> (Arc<dyn TreeSink>, TreeLog) {
    let log = TreeLog::default();
    let sink_log = Arc::clone(&log);
    let sink = move |tree: &TreeView| sink_log.lock().unwrap().push(tree.clone());
    (Arc::new(sink), log)
}

pub fn coordinator(step: Duration) -> (AnalysisCoordinator<ScriptedEngine>, CommandLog, EvalLog) {
    let (engine, commands) = ScriptedEngine::new(step);
    let (sink, evals) = eval_sink();
    (AnalysisCoordinator::new(engine, sink), commands, evals)
}

/// Poll until `running` reports false.
pub async fn wait_until_idle(mut running: impl FnMut() -> bool) {
    for _ in 0..400 {
        if !running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("analysis did not finish in time");
}

/// Let freshly spawned analysis tasks reach the engine.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(15)).await;
}
