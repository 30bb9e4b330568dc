//! Evaluation oracles: anything that can score a FEN at a given depth.
//!
//! The production oracle is a UCI engine process (Stockfish or any other
//! engine speaking the protocol). [`UciSession`] is generic over its pipes
//! so the protocol can be driven by in-memory streams as well.

use std::{future::Future, io, path::PathBuf, process::Stdio};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines},
    process::{Child, ChildStdin, ChildStdout, Command},
};
use tracing::{debug, trace};

use crate::{error::RankError, types::Evaluation};

/// A single-user evaluation session.
pub trait EvaluationOracle: Send + 'static {
    /// Score `fen` relative to its side to move, searching `depth` plies.
    fn evaluate(
        &mut self,
        fen: &str,
        depth: u32,
    ) -> impl Future<Output = Result<Evaluation, RankError>> + Send;
}

/// Creates fresh oracle sessions for the pool.
pub trait OracleFactory: Send + Sync + 'static {
    type Session: EvaluationOracle;

    fn spawn(&self) -> impl Future<Output = Result<Self::Session, RankError>> + Send;
}

/// UCI protocol driver over an arbitrary reader/writer pair.
pub struct UciSession<R, W> {
    lines: Lines<BufReader<R>>,
    writer: W,
    name: Option<String>,
}

impl<R, W> UciSession<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Perform the `uci` handshake, apply `options`, and wait until ready.
    pub async fn handshake(
        reader: R,
        writer: W,
        options: &[(String, String)],
    ) -> Result<Self, RankError> {
        let mut session = Self {
            lines: BufReader::new(reader).lines(),
            writer,
            name: None,
        };

        session.send("uci").await?;
        loop {
            let line = session.next_line().await?;
            if let Some(name) = line.strip_prefix("id name ") {
                session.name = Some(name.trim().to_string());
            } else if line.trim() == "uciok" {
                break;
            }
        }

        for (name, value) in options {
            session
                .send(&format!("setoption name {name} value {value}"))
                .await?;
        }
        session.sync().await?;

        debug!(
            engine = session.name.as_deref().unwrap_or("unknown"),
            "UCI handshake complete"
        );
        Ok(session)
    }

    /// Engine name reported during the handshake.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn send(&mut self, command: &str) -> Result<(), RankError> {
        trace!(command, "uci >");
        self.writer
            .write_all(command.as_bytes())
            .await
            .map_err(RankError::OracleUnavailable)?;
        self.writer
            .write_all(b"\n")
            .await
            .map_err(RankError::OracleUnavailable)?;
        self.writer.flush().await.map_err(RankError::OracleUnavailable)
    }

    async fn next_line(&mut self) -> Result<String, RankError> {
        match self.lines.next_line().await {
            Ok(Some(line)) => {
                trace!(line = line.as_str(), "uci <");
                Ok(line)
            }
            Ok(None) => Err(RankError::OracleUnavailable(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "engine closed its output",
            ))),
            Err(e) => Err(RankError::OracleUnavailable(e)),
        }
    }

    /// `isready` / `readyok` round trip.
    async fn sync(&mut self) -> Result<(), RankError> {
        self.send("isready").await?;
        while self.next_line().await?.trim() != "readyok" {}
        Ok(())
    }

    async fn search(&mut self, fen: &str, depth: u32) -> Result<Evaluation, RankError> {
        // Positions are unrelated to each other, so every query starts a new game.
        self.send("ucinewgame").await?;
        self.sync().await?;
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut last = None;
        loop {
            let line = self.next_line().await?;
            if line.starts_with("bestmove") {
                break;
            }
            if let Some(score) = parse_info_score(&line)? {
                last = Some(score);
            }
        }

        last.ok_or_else(|| {
            RankError::OracleProtocol(format!("no score reported for position {fen}"))
        })
    }
}

impl<R, W> EvaluationOracle for UciSession<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn evaluate(
        &mut self,
        fen: &str,
        depth: u32,
    ) -> impl Future<Output = Result<Evaluation, RankError>> + Send {
        self.search(fen, depth)
    }
}

/// Largest score magnitude accepted from an engine, in centipawns or moves.
const MAX_SCORE: u32 = 1_000_000;

/// Extract the score from a UCI `info` line.
///
/// Returns `Ok(None)` for lines without an exact score (no `score` token,
/// or a `lowerbound`/`upperbound` bound). `mate 0` is rejected: it only
/// describes an already mated side, which is resolved before querying.
pub fn parse_info_score(line: &str) -> Result<Option<Evaluation>, RankError> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("info") {
        return Ok(None);
    }
    if !tokens.by_ref().any(|t| t == "score") {
        return Ok(None);
    }

    let kind = tokens.next();
    let value = tokens
        .next()
        .and_then(|v| v.parse::<i32>().ok())
        .ok_or_else(|| RankError::OracleProtocol(format!("malformed score in {line:?}")))?;
    if matches!(tokens.next(), Some("lowerbound" | "upperbound")) {
        return Ok(None);
    }
    if value.unsigned_abs() > MAX_SCORE {
        return Err(RankError::OracleProtocol(format!(
            "score out of range in {line:?}"
        )));
    }

    match kind {
        Some("cp") => Ok(Some(Evaluation::Centipawns(value))),
        Some("mate") if value == 0 => Err(RankError::OracleProtocol(
            "engine reported mate in 0 for a position with legal moves".to_string(),
        )),
        Some("mate") => Ok(Some(Evaluation::Mate(value))),
        _ => Err(RankError::OracleProtocol(format!("unknown score type in {line:?}"))),
    }
}

/// A UCI engine running as a child process.
pub struct UciEngine {
    session: UciSession<ChildStdout, ChildStdin>,
    // Held so the process is killed when the session is dropped.
    _child: Child,
}

impl EvaluationOracle for UciEngine {
    fn evaluate(
        &mut self,
        fen: &str,
        depth: u32,
    ) -> impl Future<Output = Result<Evaluation, RankError>> + Send {
        self.session.search(fen, depth)
    }
}

/// Spawns [`UciEngine`] processes from an executable path.
#[derive(Debug, Clone)]
pub struct UciEngineFactory {
    path: PathBuf,
    options: Vec<(String, String)>,
}

impl UciEngineFactory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: Vec::new(),
        }
    }

    /// Add a `setoption` sent to every spawned engine.
    pub fn with_option(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.options.push((name.into(), value.to_string()));
        self
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl OracleFactory for UciEngineFactory {
    type Session = UciEngine;

    async fn spawn(&self) -> Result<UciEngine, RankError> {
        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(RankError::OracleUnavailable)?;

        let missing = || {
            RankError::OracleUnavailable(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "engine pipes were not captured",
            ))
        };
        let stdin = child.stdin.take().ok_or_else(missing)?;
        let stdout = child.stdout.take().ok_or_else(missing)?;

        let session = UciSession::handshake(stdout, stdin, &self.options).await?;
        debug!(path = %self.path.display(), "spawned engine process");
        Ok(UciEngine {
            session,
            _child: child,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::io::{DuplexStream, duplex};

    /// Plays the engine side of a UCI conversation, replying to `go`
    /// with the given `info` lines.
    pub(crate) async fn scripted_engine(stream: DuplexStream, info: Vec<String>) {
        let (read, mut write) = tokio::io::split(stream);
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let reply = match line.split_whitespace().next() {
                Some("uci") => "id name Scripted\nid author test\nuciok\n".to_string(),
                Some("isready") => "readyok\n".to_string(),
                Some("go") => {
                    let mut out: String = info.iter().map(|l| format!("{l}\n")).collect();
                    out.push_str("bestmove e2e4\n");
                    out
                }
                Some("quit") => break,
                _ => continue,
            };
            if write.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
        }
    }

    async fn connect(
        info: Vec<&str>,
    ) -> UciSession<tokio::io::ReadHalf<DuplexStream>, tokio::io::WriteHalf<DuplexStream>> {
        let (client, server) = duplex(4096);
        tokio::spawn(scripted_engine(
            server,
            info.into_iter().map(String::from).collect(),
        ));
        let (read, write) = tokio::io::split(client);
        UciSession::handshake(read, write, &[("Threads".to_string(), "1".to_string())])
            .await
            .unwrap()
    }

    #[test]
    fn parses_exact_scores() {
        let line = "info depth 12 seldepth 18 multipv 1 score cp 34 nodes 1000 pv e2e4";
        assert_eq!(
            parse_info_score(line).unwrap(),
            Some(Evaluation::Centipawns(34))
        );
        let line = "info depth 5 score mate -2 pv h7h8";
        assert_eq!(parse_info_score(line).unwrap(), Some(Evaluation::Mate(-2)));
    }

    #[test]
    fn skips_bounds_and_scoreless_lines() {
        assert_eq!(
            parse_info_score("info depth 9 score cp 20 lowerbound nodes 5").unwrap(),
            None
        );
        assert_eq!(parse_info_score("info string NNUE enabled").unwrap(), None);
        assert_eq!(parse_info_score("bestmove e2e4").unwrap(), None);
    }

    #[test]
    fn rejects_mate_zero_and_garbage() {
        assert!(matches!(
            parse_info_score("info depth 0 score mate 0"),
            Err(RankError::OracleProtocol(_))
        ));
        assert!(parse_info_score("info depth 3 score cp abc").is_err());
        assert!(parse_info_score("info depth 3 score wdl 10").is_err());
    }

    #[test]
    fn rejects_out_of_range_scores() {
        for line in [
            "info depth 7 score mate -2147483648",
            "info depth 7 score cp -2147483648",
            "info depth 7 score mate 2147483647",
        ] {
            assert!(
                matches!(parse_info_score(line), Err(RankError::OracleProtocol(_))),
                "{line}"
            );
        }
        assert_eq!(
            parse_info_score("info depth 7 score cp -32000").unwrap(),
            Some(Evaluation::Centipawns(-32000))
        );
    }

    #[tokio::test]
    async fn session_reports_last_exact_score() {
        let mut session = connect(vec![
            "info depth 1 score cp 10",
            "info depth 2 score cp 25 upperbound",
            "info depth 2 score cp 18 pv d2d4",
        ])
        .await;
        assert_eq!(session.name(), Some("Scripted"));

        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
        let eval = session.evaluate(fen, 2).await.unwrap();
        assert_eq!(eval, Evaluation::Centipawns(18));

        // The session is reusable.
        let eval = session.evaluate(fen, 2).await.unwrap();
        assert_eq!(eval, Evaluation::Centipawns(18));
    }

    #[tokio::test]
    async fn missing_score_is_a_protocol_error() {
        let mut session = connect(vec!["info string nothing to see"]).await;
        let err = session.evaluate("8/8/8/8/8/8/8/K6k w - - 0 1", 1).await;
        assert!(matches!(err, Err(RankError::OracleProtocol(_))));
    }

    #[tokio::test]
    async fn closed_engine_is_unavailable() {
        let (client, server) = duplex(64);
        drop(server);
        let (read, write) = tokio::io::split(client);
        let result = UciSession::handshake(read, write, &[]).await;
        assert!(matches!(result, Err(RankError::OracleUnavailable(_))));
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let factory = UciEngineFactory::new("/nonexistent/uci-engine");
        assert!(matches!(
            factory.spawn().await,
            Err(RankError::OracleUnavailable(_))
        ));
    }
}
