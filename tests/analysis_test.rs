//! Coordinator behavior against a scripted engine.

mod common;

use std::time::Duration;

use chess_core::{rules, Score};
use live_analysis::{AnalysisError, SessionEnd};
use shakmaty::Chess;

use common::{coordinator, starts, wait_until_idle, ScriptedEngine};

fn after(moves: &[&str]) -> Chess {
    moves.iter().fold(Chess::default(), |pos, uci| {
        let mv = rules::parse_uci(uci).unwrap();
        rules::apply(&pos, &mv).unwrap().0
    })
}

#[tokio::test]
async fn test_session_ends_at_target_depth() {
    let (mut analysis, commands, evals) = coordinator(Duration::ZERO);
    analysis.start(&Chess::default(), 5).unwrap();
    wait_until_idle(|| analysis.is_running()).await;

    assert_eq!(analysis.stop().await, Some(SessionEnd::DepthReached));

    let evals = evals.lock().unwrap();
    let depths: Vec<u32> = evals.iter().map(|e| e.depth).collect();
    assert_eq!(depths, vec![1, 2, 3, 4, 5]);
    assert_eq!(evals[4].score, Score::Pawns(0.5));
    assert_eq!(analysis.last_evaluation().as_ref(), evals.last());

    let commands = commands.lock().unwrap();
    assert_eq!(commands.len(), 2);
    assert!(commands[0].ends_with(" 5"));
    assert_eq!(commands[1], "stop");
}

#[tokio::test]
async fn test_restart_never_interleaves_sessions() {
    let (mut analysis, _commands, evals) = coordinator(Duration::from_millis(10));
    let start = Chess::default();
    let e4 = after(&["e2e4"]);
    let start_fen = rules::to_fen(&start);
    let e4_fen = rules::to_fen(&e4);

    analysis.start(&start, 30).unwrap();
    tokio::time::sleep(Duration::from_millis(45)).await;
    analysis.restart(&e4, 3).await.unwrap();
    let at_restart = evals.lock().unwrap().len();

    wait_until_idle(|| analysis.is_running()).await;
    let evals = evals.lock().unwrap();

    assert!(evals[..at_restart].iter().all(|e| e.fen == start_fen));
    assert!(evals[at_restart..].iter().all(|e| e.fen == e4_fen));
    assert_eq!(evals.len() - at_restart, 3);
}

#[tokio::test]
async fn test_restart_targets_new_position() {
    let (mut analysis, commands, _evals) = coordinator(Duration::from_millis(10));
    let e4 = after(&["e2e4"]);

    analysis.start(&Chess::default(), 30).unwrap();
    analysis.restart(&e4, 12).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let target = analysis.target().unwrap();
    assert_eq!(target.fen, rules::to_fen(&e4));
    assert_eq!(target.depth, 12);
    assert_eq!(analysis.stop().await, Some(SessionEnd::Cancelled));

    let commands = commands.lock().unwrap();
    let last_start = commands.iter().rposition(|c| c.starts_with("start")).unwrap();
    assert!(commands[last_start].contains(&rules::to_fen(&e4)));
}

#[tokio::test]
async fn test_start_while_running_is_rejected() {
    let (mut analysis, commands, _evals) = coordinator(Duration::from_millis(10));
    analysis.start(&Chess::default(), 30).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = analysis.start(&after(&["d2d4"]), 30);
    assert!(matches!(second, Err(AnalysisError::SessionActive)));

    analysis.stop().await;
    assert_eq!(starts(&commands).len(), 1);
}

#[tokio::test]
async fn test_stop_without_session() {
    let (mut analysis, commands, _evals) = coordinator(Duration::ZERO);
    assert_eq!(analysis.stop().await, None);
    assert!(!analysis.is_running());
    assert!(commands.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_reaches_a_stalled_engine() {
    let (engine, commands) = ScriptedEngine::new(Duration::ZERO);
    let (sink, evals) = common::eval_sink();
    let mut analysis = live_analysis::AnalysisCoordinator::new(engine.stalled(), sink);

    analysis.start(&Chess::default(), 20).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let end = tokio::time::timeout(Duration::from_secs(1), analysis.stop())
        .await
        .expect("stop should not wait for the engine");
    assert_eq!(end, Some(SessionEnd::Cancelled));
    assert!(evals.lock().unwrap().is_empty());
    assert_eq!(commands.lock().unwrap().last().map(String::as_str), Some("stop"));
}

#[tokio::test]
async fn test_engine_fault_ends_session() {
    let (engine, _commands) = ScriptedEngine::new(Duration::ZERO);
    let (sink, evals) = common::eval_sink();
    let mut analysis = live_analysis::AnalysisCoordinator::new(engine.failing_at(3), sink);

    analysis.start(&Chess::default(), 10).unwrap();
    wait_until_idle(|| analysis.is_running()).await;

    assert_eq!(analysis.stop().await, Some(SessionEnd::Fault));
    assert_eq!(evals.lock().unwrap().len(), 2);

    // The coordinator stays usable after a fault.
    analysis.start(&after(&["e2e4"]), 2).unwrap();
    wait_until_idle(|| analysis.is_running()).await;
    assert_eq!(analysis.stop().await, Some(SessionEnd::DepthReached));
}

#[tokio::test]
async fn test_scores_are_from_whites_point_of_view() {
    let (mut analysis, _commands, evals) = coordinator(Duration::ZERO);
    analysis.start(&after(&["e2e4"]), 2).unwrap();
    wait_until_idle(|| analysis.is_running()).await;

    let scores: Vec<Score> = evals.lock().unwrap().iter().map(|e| e.score).collect();
    assert_eq!(scores, vec![Score::Pawns(-0.1), Score::Pawns(-0.2)]);
}

#[tokio::test]
async fn test_shutdown_quits_engine() {
    let (mut analysis, commands, _evals) = coordinator(Duration::from_millis(10));
    analysis.start(&Chess::default(), 30).unwrap();
    analysis.shutdown().await;

    assert!(!analysis.is_running());
    assert_eq!(commands.lock().unwrap().last().map(String::as_str), Some("quit"));
}
