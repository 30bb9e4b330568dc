//! Post a position to a running `move-ranker` server and print the ranking.
//!
//! cargo run --example analyze -- "<fen>" [depth] [moves]

use serde_json::{Value, json};

const SERVER_URL: &str = "http://127.0.0.1:5000/analyze_fen";
const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let fen = args.next().unwrap_or_else(|| START_FEN.to_string());
    let depth: u32 = args.next().map(|d| d.parse()).transpose()?.unwrap_or(15);
    let moves: u32 = args.next().map(|m| m.parse()).transpose()?.unwrap_or(10);

    println!("Analysing {fen} at depth {depth} ...");
    let response = reqwest::blocking::Client::new()
        .post(SERVER_URL)
        .json(&json!({ "fen": fen, "depth": depth, "moves": moves }))
        .send()?;

    let status = response.status();
    let body: Value = response.json()?;
    if !status.is_success() {
        return Err(format!("server answered {status}: {}", body["error"]).into());
    }

    println!("------------------------------------------------");
    println!("{}", body["result"].as_str().unwrap_or_default());
    Ok(())
}
