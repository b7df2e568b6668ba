//! Mastergoal terminal client.
//!
//! Drives the same board controller as the browser build against a live
//! service. The session descriptor is kept per profile in a SQLite file so a
//! game survives between invocations.
//!
//! ```text
//! mastergoal new --level 2 --side right     start a game
//! mastergoal show                           print the board
//! mastergoal play 7,5 6,5                   move a piece (or kick from the ball)
//! mastergoal moves | restart | leave | health | agents
//! ```

mod render;
mod store;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mastergoal_core::config::DEFAULT_BASE_URL;
use mastergoal_core::controller::drive;
use mastergoal_core::http::HttpGameService;
use mastergoal_core::session::{
    Cosmetics, Difficulty, GameMode, MaxTurnSettings, TimerSettings,
};
use mastergoal_core::{
    BoardController, ClientConfig, Command, CoordinateMapper, Orientation, PointerInput,
    Position, SessionConfig, SessionSync, Team,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::store::SqliteSessionStore;

type CliSync = SessionSync<HttpGameService, SqliteSessionStore>;

#[derive(Parser)]
#[command(name = "mastergoal", version, about = "Terminal client for the Mastergoal game service")]
struct Cli {
    /// Service root.
    #[arg(long, env = "MASTERGOAL_API_URL", default_value = DEFAULT_BASE_URL, global = true)]
    api_url: String,
    /// Session slot; each profile keeps its own game.
    #[arg(long, env = "MASTERGOAL_PROFILE", default_value = "default", global = true)]
    profile: String,
    #[arg(long, env = "MASTERGOAL_DB", default_value = "data/mastergoal.db", global = true)]
    db: PathBuf,
    /// Print opponent turns at once instead of replaying them.
    #[arg(long, global = true)]
    no_animate: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the service is up.
    Health,
    /// List the AI agents the service offers.
    Agents,
    /// Start a new game and make it the profile's session.
    New {
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=3))]
        level: u8,
        #[arg(long, value_enum, default_value_t = DifficultyArg::Medium)]
        difficulty: DifficultyArg,
        #[arg(long, value_enum, default_value_t = SideArg::Left)]
        side: SideArg,
        /// Both sides are played from this terminal.
        #[arg(long)]
        pvp: bool,
        /// Per-turn limit in seconds (enforced by the browser client).
        #[arg(long)]
        timer: Option<u32>,
        #[arg(long)]
        max_turns: Option<u32>,
        /// Show the board sideways.
        #[arg(long)]
        rotated: bool,
    },
    /// Print the current board.
    Show,
    /// List legal moves for the side to move.
    Moves,
    /// Play a move given as `row,col` logical cells.
    Play { from: String, to: String },
    /// Reset the current game, keeping its settings.
    Restart,
    /// Forget the profile's session.
    Leave,
}

#[derive(Clone, Copy, ValueEnum)]
enum DifficultyArg {
    Easy,
    Medium,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Left,
    Right,
}

impl From<SideArg> for Team {
    fn from(arg: SideArg) -> Self {
        match arg {
            SideArg::Left => Team::Left,
            SideArg::Right => Team::Right,
        }
    }
}

// ============================================================================
// Session plumbing
// ============================================================================

struct Client {
    controller: BoardController,
    sync: CliSync,
    started: Instant,
    animate: bool,
    running: Arc<AtomicBool>,
}

impl Client {
    fn open(cli: &Cli) -> Result<Client> {
        if let Some(parent) = cli.db.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let store = SqliteSessionStore::open(&cli.db, cli.profile.clone())
            .with_context(|| format!("opening session store {}", cli.db.display()))?;
        debug!(profile = store.profile(), "session store ready");
        let config = ClientConfig::with_base_url(cli.api_url.clone());

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || {
            r.store(false, Ordering::SeqCst);
        })
        .context("installing Ctrl-C handler")?;

        Ok(Client {
            controller: BoardController::new(&config),
            sync: SessionSync::new(HttpGameService::from_config(&config), store),
            started: Instant::now(),
            animate: !cli.no_animate,
            running,
        })
    }

    fn now(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Load the stored session and fetch its state.
    async fn resume(&mut self) -> Result<()> {
        let descriptor = self
            .sync
            .resume()?
            .cloned()
            .ok_or_else(|| anyhow!("no session for this profile; run `mastergoal new` first"))?;
        self.controller.configure(&descriptor.config);
        self.controller
            .set_orientation(Orientation::from_rotated(descriptor.cosmetics.rotated));
        self.run(Some(Command::Refetch)).await;
        if self.controller.snapshot().is_none() {
            bail!("could not load game {} from the service", descriptor.game_id);
        }
        self.settle().await;
        Ok(())
    }

    async fn run(&mut self, command: Option<Command>) {
        let started = self.started;
        drive(&mut self.controller, &mut self.sync, command, move || {
            started.elapsed().as_millis() as u64
        })
        .await;
    }

    /// Replay any opponent turn, one frame per animation step.
    async fn settle(&mut self) {
        let mut rng = rand::rng();
        if !self.animate {
            let later = self.now() + 3_600_000;
            let command = self.controller.tick(later, &mut rng);
            if command.is_some() {
                self.run(command).await;
                let later = self.now() + 3_600_000;
                self.controller.tick(later, &mut rng);
            }
            return;
        }
        let mut last = None;
        while self.controller.is_animating() {
            if !self.running.load(Ordering::SeqCst) {
                println!("  (replay interrupted)");
                self.controller.teardown();
                break;
            }
            if let Some(deadline) = self.controller.next_deadline() {
                let wait = deadline.saturating_sub(self.now());
                tokio::time::sleep(Duration::from_millis(wait)).await;
            }
            let command = self.controller.tick(self.now(), &mut rng);
            if command.is_some() {
                self.run(command).await;
            }
            let line = render::frame(&self.controller.view());
            if line.is_some() && line != last {
                if let Some(text) = &line {
                    println!("{text}");
                }
                last = line;
            }
        }
    }

    fn print_board(&self) {
        println!("{}", render::board(&self.controller.view()));
    }
}

fn parse_cell(text: &str) -> Result<Position> {
    let (row, col) = text
        .split_once(',')
        .ok_or_else(|| anyhow!("expected `row,col`, got `{text}`"))?;
    let row: u8 = row.trim().parse().with_context(|| format!("bad row in `{text}`"))?;
    let col: u8 = col.trim().parse().with_context(|| format!("bad column in `{text}`"))?;
    Ok(Position::new(row, col))
}

// ============================================================================
// Commands
// ============================================================================

async fn new_game(client: &mut Client, config: SessionConfig, rotated: bool) -> Result<()> {
    let cosmetics = Cosmetics {
        rotated,
        ..Cosmetics::default()
    };
    let created = client
        .sync
        .create_session(config, cosmetics)
        .await
        .context("creating game")?;
    let now = client.now();
    client.controller.set_orientation(Orientation::from_rotated(rotated));
    let follow_up = client.controller.apply(Ok(created), now);
    let game_id = client
        .sync
        .game_id()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("the service did not start a game"))?;
    println!("Started game {game_id}\n");
    // the computer opens when the human plays second
    client.run(follow_up).await;
    client.settle().await;
    client.print_board();
    Ok(())
}

async fn play(client: &mut Client, from: Position, to: Position) -> Result<()> {
    client.resume().await?;
    if client.controller.actor().is_none() {
        bail!("it is not your turn");
    }
    let mapper = CoordinateMapper::new(client.controller.orientation());
    let now = client.now();
    client
        .controller
        .pointer(PointerInput::Down(mapper.to_display(from)), now);
    let command = client
        .controller
        .pointer(PointerInput::Up(mapper.to_display(to)), now);
    let Some(command) = command else {
        bail!("{from} -> {to} is not a legal move");
    };
    client.run(Some(command)).await;
    client.settle().await;
    client.print_board();

    // after a goal the computer kicks off once the banner has been shown
    if let Some(follow_up) = client.controller.dismiss_dialog() {
        println!();
        client.run(Some(follow_up)).await;
        client.settle().await;
        client.print_board();
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut client = Client::open(&cli)?;

    match cli.command {
        Commands::Health => {
            let health = client.sync.health().await?;
            println!("status: {}", health.status);
            if let Some(games) = health.active_games {
                println!("active games: {games}");
            }
        }
        Commands::Agents => {
            let agents = client.sync.agents().await?;
            println!("{}", serde_json::to_string_pretty(&agents.agents)?);
        }
        Commands::New {
            level,
            difficulty,
            side,
            pvp,
            timer,
            max_turns,
            rotated,
        } => {
            let config = SessionConfig {
                level,
                difficulty: difficulty.into(),
                player_side: side.into(),
                mode: if pvp { GameMode::Pvp } else { GameMode::Pve },
                timer: TimerSettings {
                    enabled: timer.is_some(),
                    seconds: timer.unwrap_or(TimerSettings::default().seconds),
                },
                max_turns: MaxTurnSettings {
                    enabled: max_turns.is_some(),
                    turns: max_turns,
                },
            };
            new_game(&mut client, config, rotated).await?;
        }
        Commands::Show => {
            client.resume().await?;
            client.print_board();
        }
        Commands::Moves => {
            client.resume().await?;
            let legal = client.sync.legal_moves().await?;
            if legal.is_empty() {
                println!("No legal moves.");
            }
            for mv in legal.as_slice() {
                println!("{mv}");
            }
        }
        Commands::Play { from, to } => {
            let from = parse_cell(&from)?;
            let to = parse_cell(&to)?;
            play(&mut client, from, to).await?;
        }
        Commands::Restart => {
            client.resume().await?;
            let restarted = client.sync.restart().await.context("restarting game")?;
            let now = client.now();
            let follow_up = client.controller.apply(Ok(restarted), now);
            client.run(follow_up).await;
            println!("Game restarted.\n");
            client.print_board();
        }
        Commands::Leave => {
            client.controller.teardown();
            client.sync.leave()?;
            println!("Session for profile `{}` cleared.", cli.profile);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("7,5").unwrap(), Position::new(7, 5));
        assert_eq!(parse_cell(" 14 , 10 ").unwrap(), Position::new(14, 10));
        assert!(parse_cell("7").is_err());
        assert!(parse_cell("a,5").is_err());
        assert!(parse_cell("300,1").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["mastergoal", "new", "--side", "right", "--timer", "20"]).unwrap();
        match cli.command {
            Commands::New {
                level, side, timer, ..
            } => {
                assert_eq!(level, 1);
                assert!(matches!(side, SideArg::Right));
                assert_eq!(timer, Some(20));
            }
            _ => panic!("expected new"),
        }
    }

    #[test]
    fn test_level_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["mastergoal", "new", "--level", "4"]).is_err());
    }
}
