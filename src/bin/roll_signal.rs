use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use roll_signal::api::FeedClient;
use roll_signal::auth::{self, CredentialList, FileSession, SessionStore};
use roll_signal::config::{AppConfig, CONFIG_PATH};
use roll_signal::poller::{Poller, spawn_fetch};
use roll_signal::reporter;
use roll_signal::state::{ApplyOutcome, SignalState};
use roll_signal::types::{PatternStrategy, SignalEvent, TimingStrategy};

#[derive(Parser)]
#[command(name = "roll-signal", about = "Pattern signals for the double roulette feed")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check credentials and store the session marker
    Login {
        /// Username (prompted when omitted)
        #[arg(long)]
        user: Option<String>,
    },
    /// Remove the session marker
    Logout,
    /// Print the logged-in user
    Whoami,
    /// Follow the feed and report color recommendations
    Colors {
        #[arg(long, value_enum, default_value_t = PatternStrategy::Standardized)]
        strategy: PatternStrategy,
    },
    /// Follow the feed and report timed signals on request
    White {
        #[arg(long, value_enum, default_value_t = TimingStrategy::NoRepeat)]
        strategy: TimingStrategy,
    },
}

/// What the poll loop does with the history.
#[derive(Clone, Copy)]
enum View {
    Colors,
    White(TimingStrategy),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(&cli.config)?;
    let mut session = FileSession::new(&config.auth.session_path);

    match cli.command {
        Command::Login { user } => {
            let user = match user {
                Some(u) => u,
                None => prompt_line("Username: ")?,
            };
            if user.is_empty() {
                bail!("username cannot be empty");
            }
            let pass = rpassword::prompt_password("Password: ").context("failed to read password")?;
            let credentials = CredentialList::new(&config.auth)?;
            if !auth::login(&credentials, &mut session, &user, &pass).await? {
                bail!("invalid username or password");
            }
            println!("Logged in as {user}");
        }
        Command::Logout => {
            session.clear()?;
            println!("Logged out");
        }
        Command::Whoami => match session.current_user()? {
            Some(user) => println!("{user}"),
            None => println!("not logged in"),
        },
        Command::Colors { strategy } => {
            require_session(&session)?;
            run_view(&config, strategy, View::Colors).await?;
        }
        Command::White { strategy } => {
            require_session(&session)?;
            run_view(&config, PatternStrategy::default(), View::White(strategy)).await?;
        }
    }

    Ok(())
}

fn require_session(session: &impl SessionStore) -> Result<()> {
    match session.current_user()? {
        Some(user) => {
            info!("Session active for {user}");
            Ok(())
        }
        None => bail!("not logged in, run `roll-signal login` first"),
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim().to_string())
}

/// Poll loop shared by both views.
///
/// Fetches run on their own task so stdin commands stay responsive; at most
/// one is outstanding and late responses are discarded by ticket.
async fn run_view(config: &AppConfig, strategy: PatternStrategy, view: View) -> Result<()> {
    let client = FeedClient::new(&config.feed).context("failed to build feed client")?;
    let mut state = SignalState::new(strategy, config.feed.history_limit);
    let mut poller = Poller::new(&config.feed);
    let mut timing = match view {
        View::White(t) => t,
        View::Colors => TimingStrategy::default(),
    };

    let (tx, mut rx) = mpsc::channel(4);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut clock = tokio::time::interval(Duration::from_secs(1));
    let mut last_clock = String::new();
    let mut reported = false;

    let next_poll = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(next_poll);

    info!(
        "Polling {} every {}ms. Press Ctrl+C to stop.",
        client.url(),
        config.feed.poll_interval_ms
    );
    match view {
        View::Colors => info!("Commands: standardized, continuous, quit"),
        View::White(_) => info!("Commands: signal, no-repeat, precise, quit"),
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = &mut next_poll, if poller.should_start() => {
                let ticket = state.begin_request();
                poller.mark_started();
                spawn_fetch(client.clone(), ticket, tx.clone());
            }
            Some((ticket, batch)) = rx.recv() => {
                poller.finish(&batch);
                next_poll.as_mut().reset(Instant::now() + poller.next_delay());
                match state.apply_batch(ticket, batch) {
                    ApplyOutcome::Stale => debug!("Dropped stale response {:?}", ticket),
                    ApplyOutcome::Empty => debug!("Feed returned no outcomes"),
                    ApplyOutcome::Applied { changed } => {
                        if matches!(view, View::Colors) && (changed || !reported) {
                            reporter::report_event(&reporter::recommendation_event(&state));
                            reported = true;
                        }
                    }
                }
            }
            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        let keep_going = handle_command(line.trim(), view, &mut state, &mut timing);
                        if !keep_going {
                            break;
                        }
                    }
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        warn!("stdin closed: {e}");
                        stdin_open = false;
                    }
                }
            }
            _ = clock.tick() => {
                let label = Local::now().format("%H:%M").to_string();
                if label != last_clock {
                    info!("Clock {label}");
                    last_clock = label;
                }
            }
        }
    }

    Ok(())
}

/// Apply one stdin command. Returns `false` to stop the loop.
fn handle_command(
    command: &str,
    view: View,
    state: &mut SignalState,
    timing: &mut TimingStrategy,
) -> bool {
    match (view, command) {
        (_, "") => {}
        (_, "quit" | "exit") => return false,
        (View::Colors, "standardized" | "continuous") => {
            let strategy = if command == "standardized" {
                PatternStrategy::Standardized
            } else {
                PatternStrategy::Continuous
            };
            state.set_strategy(strategy);
            reporter::report_event(&SignalEvent::StrategySwitched {
                timestamp: Utc::now().to_rfc3339(),
                strategy,
            });
            reporter::report_event(&reporter::recommendation_event(state));
        }
        (View::White(_), "no-repeat" | "precise") => {
            *timing = if command == "precise" {
                TimingStrategy::Precise
            } else {
                TimingStrategy::NoRepeat
            };
            info!("Timing strategy set to {command}");
        }
        (View::White(_), "signal") => {
            if !state.is_loaded() {
                info!("Still loading results");
                return true;
            }
            let event = state
                .request_timed_signal(*timing, &mut rand::rng())
                .map(reporter::timed_event)
                .unwrap_or_else(|| reporter::no_anchor_event(*timing, state));
            reporter::report_event(&event);
        }
        (_, other) => warn!("Unknown command: {other}"),
    }
    true
}
