//! `chess-repl`: an interactive terminal loop for playing against (or
//! watching) the LLM minimax agents.

use std::io::{self, Write};
use std::path::Path;

use clap::Parser;

use llm_chess_minimax::config::OracleConfig;
use llm_chess_minimax::registry::{AgentRegistry, Descriptor, Model};
use llm_chess_minimax::rules::{apply, endgame, legal_moves, Endgame, GameState, Move, PieceKind, Square};

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum DescriptorArg {
    Human,
    Random,
    Gpt35,
    Gpt4,
}

impl From<DescriptorArg> for Descriptor {
    fn from(d: DescriptorArg) -> Descriptor {
        match d {
            DescriptorArg::Human => Descriptor::Human,
            DescriptorArg::Random => Descriptor::Random,
            DescriptorArg::Gpt35 => Descriptor::Minimax(Model::Gpt35),
            DescriptorArg::Gpt4 => Descriptor::Minimax(Model::Gpt4),
        }
    }
}

/// Play a game of chess, one side at a time, against an agent.
#[derive(Parser, Debug)]
#[command(name = "chess-repl")]
struct Args {
    /// Who plays white.
    #[arg(long, value_enum, default_value = "human")]
    white: DescriptorArg,
    /// Who plays black.
    #[arg(long, value_enum, default_value = "gpt35")]
    black: DescriptorArg,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guards = llm_chess_minimax::logging::init(
        Path::new("logs/oracle_calls.jsonl"),
        Path::new("logs/minimax_iter.jsonl"),
    )?;

    let args = Args::parse();
    let needs_oracle = matches!(args.white, DescriptorArg::Gpt35 | DescriptorArg::Gpt4)
        || matches!(args.black, DescriptorArg::Gpt35 | DescriptorArg::Gpt4);

    let registry = if needs_oracle {
        let config = OracleConfig::from_env()?;
        Some(AgentRegistry::new(config.api_key, config.organization))
    } else {
        None
    };

    let mut state = GameState::initial();
    loop {
        println!("{state}\n");

        match endgame(&state) {
            Endgame::Checkmate(loser) => {
                println!("Checkmate — {} wins.", !loser);
                break;
            }
            Endgame::Draw => {
                println!("Draw.");
                break;
            }
            Endgame::InProgress => {}
        }

        let descriptor: Descriptor = match state.side_to_move {
            llm_chess_minimax::rules::Color::White => args.white.into(),
            llm_chess_minimax::rules::Color::Black => args.black.into(),
        };

        let mv = match descriptor {
            Descriptor::Human => read_human_move(&state)?,
            other => {
                let registry = registry
                    .as_ref()
                    .expect("oracle-backed descriptors were checked for a config above");
                registry.call_agent(&state, other).await?
            }
        };

        println!("{} plays {}\n", state.side_to_move, mv.algebraic);
        state = apply(&state, &mv);
    }

    Ok(())
}

/// Reads one move from stdin as four characters of algebraic
/// coordinates (`e2e4`), or `0-0`/`0-0-0` for castling, and resolves
/// it against the legal moves for the side to move. Loops on bad
/// input rather than failing the whole game.
fn read_human_move(state: &GameState) -> anyhow::Result<Move> {
    let legal = legal_moves(state, state.side_to_move);
    loop {
        print!("{}'s move (e.g. e2e4, or 0-0): ", state.side_to_move);
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            anyhow::bail!("stdin closed");
        }
        let line = line.trim().to_ascii_lowercase();

        let candidates: Vec<&Move> = match line.as_str() {
            "0-0" | "o-o" => legal
                .iter()
                .filter(|m| m.castling == Some(llm_chess_minimax::rules::CastlingSide::KingSide))
                .collect(),
            "0-0-0" | "o-o-o" => legal
                .iter()
                .filter(|m| m.castling == Some(llm_chess_minimax::rules::CastlingSide::QueenSide))
                .collect(),
            _ => {
                if line.len() != 4 {
                    println!("expected four characters like e2e4");
                    continue;
                }
                let (from_s, to_s) = line.split_at(2);
                let (Some(from), Some(to)) =
                    (Square::from_algebraic(from_s), Square::from_algebraic(to_s))
                else {
                    println!("could not parse squares");
                    continue;
                };
                legal.iter().filter(|m| m.from == from && m.to == to).collect()
            }
        };

        match candidates.len() {
            0 => {
                println!("not a legal move");
                continue;
            }
            1 => return Ok(candidates[0].clone()),
            _ => {
                // Ambiguous only on pawn promotion; default to queen.
                let queen = candidates
                    .iter()
                    .find(|m| m.promotion == Some(PieceKind::Queen));
                return Ok((*queen.unwrap_or(&candidates[0])).clone());
            }
        }
    }
}
