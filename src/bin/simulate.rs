use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use rayon::prelude::*;

use machikoro::actions::Action;
use machikoro::catalog::Catalog;
use machikoro::enums::GameConfiguration;
use machikoro::game::Game;
use machikoro::players::{self, BotPlayer};
use machikoro::random::{OsRandomSource, RandomSource, SeededRandomSource};
use machikoro::state::{GameStatus, PlayerSeat};

#[derive(Parser, Debug)]
#[command(name = "simulate", about = "Play bot-only Machi Koro games")]
struct Args {
    /// Number of games to play
    #[arg(short = 'n', long, default_value_t = 1)]
    num_games: usize,

    /// One letter per seat: R = random, G = greedy
    #[arg(short, long, default_value = "RRRR")]
    players: String,

    /// Base seed; game `i` uses `seed + i`
    #[arg(long)]
    seed: Option<u64>,

    /// Submissions after which a game is abandoned
    #[arg(long, default_value_t = 5000)]
    max_actions: usize,

    #[arg(short, long)]
    verbose: bool,
}

enum Outcome {
    Won { winner: usize, rounds: u32 },
    Halted(String),
    Abandoned,
}

fn play_game(
    game_number: usize,
    catalog: Arc<Catalog>,
    random: Arc<dyn RandomSource>,
    bots: &[Box<dyn BotPlayer>],
    max_actions: usize,
    verbose: bool,
) -> Result<Outcome, Box<dyn std::error::Error + Send + Sync>> {
    let seats = bots
        .iter()
        .enumerate()
        .map(|(seat, bot)| PlayerSeat::new(format!("{} {}", bot.name(), seat), format!("bot{seat}")))
        .collect();
    let mut game = Game::new(
        format!("sim-{game_number}"),
        catalog,
        random.clone(),
        GameConfiguration::default(),
        seats,
    )?;

    for _ in 0..max_actions {
        match game.status() {
            GameStatus::Finished { winner } => {
                return Ok(Outcome::Won {
                    winner: *winner,
                    rounds: game.state().turn.round,
                })
            }
            GameStatus::Halted { details } => return Ok(Outcome::Halted(details.clone())),
            GameStatus::InProgress => {}
        }

        let Some(user_name) = game.active_user_name().map(str::to_owned) else {
            return Ok(Outcome::Abandoned);
        };
        let query = game.query();
        let me = query.player_index(game.state(), &user_name)?;
        let playable = query.possible_actions(game.state(), me);
        let action = bots[me].decide(game.state(), game.catalog(), me, &playable, random.as_ref());

        let response = game.submit_action(action, &user_name);
        if verbose {
            for message in response.log_entries.iter().filter_map(|entry| entry.message()) {
                println!("  [{}] {}", game_number, message);
            }
        }
        if !response.accepted {
            log::warn!(
                "⚠️ Game {}: {} rejected ({:?}), forfeiting",
                game_number,
                user_name,
                response.error
            );
            game.submit_action(Action::Forfeit, &user_name);
        }
    }
    Ok(Outcome::Abandoned)
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();
    let args = Args::parse();

    let bots: Vec<Box<dyn BotPlayer>> = args
        .players
        .chars()
        .map(|code| players::from_code(code).ok_or_else(|| format!("unknown bot code '{code}'")))
        .collect::<Result<_, _>>()?;

    println!("🎮 Machi Koro Simulation");
    println!("========================");
    println!("Configuration:");
    println!("  - Players: {} ({})", args.players, bots.len());
    println!("  - Number of games: {}", args.num_games);
    println!("  - Seed: {:?}", args.seed);

    let catalog = Arc::new(Catalog::for_mode(GameConfiguration::default().mode));
    let start = Instant::now();
    let outcomes: Vec<_> = (0..args.num_games)
        .into_par_iter()
        .map(|game_number| {
            let random: Arc<dyn RandomSource> = match args.seed {
                Some(seed) => Arc::new(SeededRandomSource::new(seed.wrapping_add(game_number as u64))),
                None => Arc::new(OsRandomSource),
            };
            play_game(
                game_number,
                catalog.clone(),
                random,
                &bots,
                args.max_actions,
                args.verbose,
            )
        })
        .collect();

    let mut wins = vec![0usize; bots.len()];
    let mut total_rounds = 0u64;
    let mut completed = 0usize;
    for (game_number, outcome) in outcomes.into_iter().enumerate() {
        match outcome? {
            Outcome::Won { winner, rounds } => {
                wins[winner] += 1;
                total_rounds += u64::from(rounds);
                completed += 1;
                if args.num_games > 1 {
                    println!("  Game {}: Player {} won in round {}", game_number, winner, rounds);
                }
            }
            Outcome::Halted(details) => println!("❌ Game {} halted: {}", game_number, details),
            Outcome::Abandoned => println!("⏳ Game {} did not finish", game_number),
        }
    }

    println!("\n📊 Results:");
    println!("===========");
    for (seat, win_count) in wins.iter().enumerate() {
        let win_rate = if completed > 0 {
            (*win_count as f64 / completed as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "Player {} ({}): {} wins ({:.1}%)",
            seat,
            bots[seat].name(),
            win_count,
            win_rate
        );
    }
    println!("Completed games: {}/{}", completed, args.num_games);
    if completed > 0 {
        println!(
            "Average rounds per game: {:.1}",
            total_rounds as f64 / completed as f64
        );
    }
    println!("⏱️ Elapsed: {:.2?}", start.elapsed());
    Ok(())
}
