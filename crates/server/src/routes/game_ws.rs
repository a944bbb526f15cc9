/// WebSocket game route
///
/// Each connection owns one `GameSession`. Requests arrive as JSON frames;
/// tree changes and streamed evaluations are pushed back on the same socket
/// through a writer task, so the analysis task never touches the socket.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use chess_core::{Opening, OpeningTrie, TreeView};
use live_analysis::{
    AnalysisCoordinator, AnalysisError, Evaluation, EvaluationSink, GameSession, StockfishEngine,
    TreeSink,
};

use crate::config::Config;

// ---- Message types ----

/// Server → Client messages
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Tree {
        tree: TreeView,
    },
    Position {
        fen: String,
        /// Moves from the root to the displayed node, UCI
        cursor: Vec<String>,
        opening: Option<Vec<Opening>>,
        pgn: String,
    },
    Evaluation(Evaluation),
    Error {
        message: String,
    },
}

/// Client → Server messages
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Play { uci: String },
    Forward,
    Backward,
    Reset,
    Promote,
    Comment { text: String },
    LoadPgn { pgn: String },
    Pause,
    Resume,
}

type Outbox = mpsc::UnboundedSender<ServerMessage>;

// ---- WebSocket handler ----

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(openings): Extension<Arc<OpeningTrie>>,
    Extension(config): Extension<Config>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, openings, config))
}

async fn handle_socket(socket: WebSocket, openings: Arc<OpeningTrie>, config: Config) {
    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<ServerMessage>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = inbox.recv().await {
            if let Err(e) = send_msg(&mut sender, &msg).await {
                debug!(error = %e, "Client went away");
                break;
            }
        }
    });

    let mut session = open_session(openings, &config, outbox.clone()).await;
    let opened = session.open().await;
    reply(&outbox, &session, opened);

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(request) => {
                let handled = handle_message(&mut session, request).await;
                reply(&outbox, &session, handled);
            }
            Err(e) => {
                let _ = outbox.send(ServerMessage::Error {
                    message: format!("Invalid message: {e}"),
                });
            }
        }
    }

    session.close().await;
    // The session's sinks hold the remaining senders.
    drop(session);
    drop(outbox);
    let _ = writer.await;
    info!("Game connection closed");
}

/// Build a session for one connection. Without a working engine the
/// connection still gets the tree and opening detection.
async fn open_session(
    openings: Arc<OpeningTrie>,
    config: &Config,
    outbox: Outbox,
) -> GameSession<StockfishEngine> {
    let tree_outbox = outbox.clone();
    let tree_sink = move |tree: &TreeView| {
        let _ = tree_outbox.send(ServerMessage::Tree { tree: tree.clone() });
    };
    let tree_sink: Arc<dyn TreeSink> = Arc::new(tree_sink);
    let session = GameSession::new(openings, tree_sink, config.engine.depth);

    match StockfishEngine::new(&config.engine).await {
        Ok(engine) => {
            let eval_sink = move |evaluation: &Evaluation| {
                let _ = outbox.send(ServerMessage::Evaluation(evaluation.clone()));
            };
            let eval_sink: Arc<dyn EvaluationSink> = Arc::new(eval_sink);
            session.with_analysis(AnalysisCoordinator::new(engine, eval_sink))
        }
        Err(e) => {
            warn!(error = %e, "Engine unavailable, continuing without live evaluation");
            session
        }
    }
}

async fn handle_message(
    session: &mut GameSession<StockfishEngine>,
    msg: ClientMessage,
) -> Result<(), AnalysisError> {
    match msg {
        ClientMessage::Play { uci } => {
            session.play(&uci).await?;
        }
        ClientMessage::Forward => {
            session.navigate_forward().await?;
        }
        ClientMessage::Backward => {
            session.navigate_backward().await?;
        }
        ClientMessage::Reset => session.reset().await?,
        ClientMessage::Promote => {
            session.promote().await?;
        }
        ClientMessage::Comment { text } => {
            let comment = Some(text).filter(|t| !t.trim().is_empty());
            session.annotate(comment)?;
        }
        ClientMessage::LoadPgn { pgn } => session.load_pgn(&pgn).await?,
        ClientMessage::Pause => session.pause_analysis().await,
        ClientMessage::Resume => session.resume_analysis().await?,
    }
    Ok(())
}

/// Answer a request with the displayed position, or with the error that
/// rejected it.
fn reply(
    outbox: &Outbox,
    session: &GameSession<StockfishEngine>,
    handled: Result<(), AnalysisError>,
) {
    let msg = match handled.and_then(|()| position_message(session)) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(error = %e, "Request rejected");
            ServerMessage::Error {
                message: e.to_string(),
            }
        }
    };
    let _ = outbox.send(msg);
}

fn position_message(session: &GameSession<StockfishEngine>) -> Result<ServerMessage, AnalysisError> {
    Ok(ServerMessage::Position {
        fen: session.fen()?,
        cursor: session.cursor(),
        opening: session.opening()?,
        pgn: session.pgn()?,
    })
}

// ---- Helper: send message ----

async fn send_msg(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<()> {
    let json = serde_json::to_string(msg)?;
    sender.send(Message::Text(json.into())).await?;
    Ok(())
}
