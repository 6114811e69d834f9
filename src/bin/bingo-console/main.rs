//! Line-oriented Bingo Anytime client.

mod commands;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bingo_anytime::{
    config::ClientConfig,
    dao::gateway::HttpSaveGateway,
    dto::save::SaveRecord,
    services::{
        history::{diff_saves, scoreboard, winners},
        push_client,
        session::{ChannelStatus, GameSession, Intent, SessionHandle, SessionView},
    },
    state::store::{ConsentFlag, GameStateStore, Outcome},
};

use commands::{Command, HELP, Line};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ClientConfig::load();
    let consent = ConsentFlag::new();
    let store = GameStateStore::new(
        config.propositions.clone(),
        config.limits,
        Arc::new(consent.clone()),
    );
    let gateway = HttpSaveGateway::new(&config.api_url, config.request_timeout)
        .context("building save API client")?;
    let (push_rx, _push_task) = push_client::spawn(config.push_channel());

    let (session, handle) = GameSession::new(
        store,
        Arc::new(gateway),
        config.session_settings(),
        Some(push_rx),
    );
    tokio::spawn(session.run());

    handle.bootstrap().await.context("starting the game")?;
    print_view(&handle.current());
    println!("{HELP}");

    let mut history: Vec<SaveRecord> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(raw) = lines.next_line().await.context("reading stdin")? {
        let Line { command, force } = match commands::parse(&raw) {
            Ok(line) => line,
            Err(commands::CommandError::Empty) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        if force {
            consent.arm();
        }
        let keep_going = run(&config, &handle, &mut history, command).await;
        consent.disarm();
        if !keep_going {
            break;
        }
    }

    Ok(())
}

/// Execute one command. Returns `false` when the user asked to quit.
async fn run(
    config: &ClientConfig,
    handle: &SessionHandle,
    history: &mut Vec<SaveRecord>,
    command: Command,
) -> bool {
    let edit = |intent: Intent| async move { report(handle.edit(intent).await, handle) };

    match command {
        Command::Help => println!("{HELP}"),
        Command::Show => print_view(&handle.current()),
        Command::Scores => {
            for standing in scoreboard(&handle.current().board) {
                let crown = if standing.leading { " *" } else { "" };
                println!("{:>3}  {}{crown}", standing.score, standing.name);
            }
        }
        Command::New(count) => edit(Intent::GenerateNewGrids(count)).await,
        Command::AddPlayer => edit(Intent::AddPlayer).await,
        Command::RemovePlayer(index) => edit(Intent::RemovePlayer(index)).await,
        Command::Rename { player, name } => {
            edit(Intent::RenamePlayer {
                index: player,
                name,
            })
            .await
        }
        Command::Check {
            player,
            cell,
            description,
        } => {
            edit(Intent::ValidateItem {
                player,
                item: cell,
                description,
            })
            .await
        }
        Command::Uncheck { player, cell } => {
            edit(Intent::RemoveValidation { player, item: cell }).await
        }
        Command::AddProposition(text) => edit(Intent::AddProposition(text)).await,
        Command::RemoveProposition(id) => edit(Intent::RemoveProposition(id)).await,
        Command::Save => match handle.save().await {
            Ok(()) => println!("saved"),
            Err(err) => println!("save failed: {err}"),
        },
        Command::Cancel => report(handle.cancel_changes().await, handle),
        Command::History => match handle.list_saves().await {
            Ok(saves) => {
                for (position, save) in saves.iter().enumerate() {
                    let names: Vec<&str> = winners(&save.data)
                        .iter()
                        .map(|player| player.name.as_str())
                        .collect();
                    let trophy = if names.is_empty() {
                        String::new()
                    } else {
                        format!("  winners: {}", names.join(", "))
                    };
                    println!(
                        "{:>3}. {}  {} players{trophy}",
                        position + 1,
                        save.date,
                        save.data.players.len()
                    );
                }
                *history = saves;
            }
            Err(err) => println!("could not fetch saves: {err}"),
        },
        Command::LoadSave(index) => match history.get(index) {
            Some(save) => report(handle.load_save(save.data.clone()).await, handle),
            None => println!("no save #{} (run `history` first)", index + 1),
        },
        Command::Diff(index) => match (history.get(index), history.get(index + 1)) {
            (Some(current), Some(previous)) => match diff_saves(&current.data, &previous.data) {
                Some(diff) => println!("{diff:#?}"),
                None => println!("no differences"),
            },
            _ => println!("save #{} has no previous save to compare", index + 1),
        },
        Command::Download if config.show_all_buttons => match handle.download().await {
            Ok(path) => println!("exported to {}", path.display()),
            Err(err) => println!("export failed: {err}"),
        },
        Command::Upload(path) if config.show_all_buttons => {
            report(handle.load_file(path).await, handle)
        }
        Command::Download | Command::Upload(_) => {
            println!("file export and import are disabled (set BINGO_ANYTIME_SHOW_ALL_BUTTONS)")
        }
        Command::Quit => return false,
    }
    true
}

fn report<E: std::fmt::Display>(result: Result<Outcome, E>, handle: &SessionHandle) {
    match result {
        Ok(Outcome::Applied) => print_view(&handle.current()),
        Ok(Outcome::Unchanged) => println!("nothing changed"),
        Ok(Outcome::Declined) => {
            println!("unsaved changes kept; repeat the command with `!` to discard them")
        }
        Err(err) => {
            warn!(error = %err, "command rejected");
            println!("{err}");
        }
    }
}

fn print_view(view: &SessionView) {
    let board = &view.board;
    for (position, player) in board.players.iter().enumerate() {
        println!("{}. {} ({})", position + 1, player.name, player.score());
        for (cell, proposition_id) in player.grid.iter().enumerate() {
            let mark = match player.validated_items.get(&cell) {
                Some(item) => format!("[x] {}", item.description),
                None => "[ ]".to_string(),
            };
            println!(
                "   {}. {mark} {}",
                cell + 1,
                board.proposition_text(proposition_id)
            );
        }
    }

    let flags = view.flags;
    let channel = match view.channel {
        ChannelStatus::Connecting => "connecting",
        ChannelStatus::Online => "online",
        ChannelStatus::Reconnecting => "reconnecting",
        ChannelStatus::Offline => "offline",
    };
    let users = view
        .connected_users
        .map(|count| format!(", {count} connected"))
        .unwrap_or_default();
    println!(
        "-- {channel}{users} | changed: {} | loaded: {} | unsaved: {}",
        flags.is_dirty, flags.is_loaded_game, flags.has_unsaved_changes
    );
}

fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
