use std::path::PathBuf;

use thiserror::Error;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub command: Command,
    /// The verb ended with `!`: discard unsaved changes without asking.
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Show,
    Scores,
    New(Option<usize>),
    AddPlayer,
    RemovePlayer(usize),
    Rename { player: usize, name: String },
    Check {
        player: usize,
        cell: usize,
        description: String,
    },
    Uncheck { player: usize, cell: usize },
    AddProposition(String),
    RemoveProposition(String),
    Save,
    Cancel,
    History,
    LoadSave(usize),
    Diff(usize),
    Download,
    Upload(PathBuf),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("missing argument: {0}")]
    Missing(&'static str),
    #[error("`{0}` is not a positive number")]
    NotANumber(String),
}

pub const HELP: &str = "\
commands (positions start at 1, append ! to a verb to discard unsaved changes):
  show                          board and flags
  scores                        scoreboard
  new [count]                   draw fresh grids
  add | remove <player>         add or remove a player
  rename <player> <name>        rename a player
  check <player> <cell> <text>  validate a cell
  uncheck <player> <cell>       clear a cell
  prop <text> | unprop <id>     add or remove a proposition
  save | cancel                 save now, or reload the last save
  history | load <n> | diff <n> browse previous saves
  download | upload <path>      export or import a game file
  quit";

/// Parse one console line.
pub fn parse(line: &str) -> Result<Line, CommandError> {
    let line = line.trim();
    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map(|(verb, rest)| (verb, rest.trim()))
        .unwrap_or((line, ""));
    if verb.is_empty() {
        return Err(CommandError::Empty);
    }

    let (verb, force) = match verb.strip_suffix('!') {
        Some(verb) => (verb, true),
        None => (verb, false),
    };
    let mut args = rest.split_whitespace();

    let command = match verb {
        "help" | "?" => Command::Help,
        "show" => Command::Show,
        "scores" => Command::Scores,
        "new" => Command::New(args.next().map(number).transpose()?),
        "add" => Command::AddPlayer,
        "remove" => Command::RemovePlayer(position(args.next(), "player")?),
        "rename" => {
            let player = position(args.next(), "player")?;
            Command::Rename {
                player,
                name: tail(rest, 1).ok_or(CommandError::Missing("name"))?,
            }
        }
        "check" => {
            let player = position(args.next(), "player")?;
            let cell = position(args.next(), "cell")?;
            Command::Check {
                player,
                cell,
                description: tail(rest, 2).ok_or(CommandError::Missing("description"))?,
            }
        }
        "uncheck" => Command::Uncheck {
            player: position(args.next(), "player")?,
            cell: position(args.next(), "cell")?,
        },
        "prop" => Command::AddProposition(
            Some(rest.to_string())
                .filter(|text| !text.is_empty())
                .ok_or(CommandError::Missing("text"))?,
        ),
        "unprop" => Command::RemoveProposition(
            args.next()
                .ok_or(CommandError::Missing("proposition id"))?
                .to_string(),
        ),
        "save" => Command::Save,
        "cancel" => Command::Cancel,
        "history" => Command::History,
        "load" => Command::LoadSave(position(args.next(), "save")?),
        "diff" => Command::Diff(position(args.next(), "save")?),
        "download" => Command::Download,
        "upload" => Command::Upload(PathBuf::from(
            args.next().ok_or(CommandError::Missing("path"))?,
        )),
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };

    Ok(Line { command, force })
}

fn number(raw: &str) -> Result<usize, CommandError> {
    raw.parse()
        .map_err(|_| CommandError::NotANumber(raw.to_string()))
}

/// 1-based position typed by the user, returned 0-based.
fn position(raw: Option<&str>, what: &'static str) -> Result<usize, CommandError> {
    let raw = raw.ok_or(CommandError::Missing(what))?;
    match number(raw)? {
        0 => Err(CommandError::NotANumber(raw.to_string())),
        n => Ok(n - 1),
    }
}

/// Text following the first `skip` words of `rest`.
fn tail(rest: &str, skip: usize) -> Option<String> {
    let mut remaining = rest;
    for _ in 0..skip {
        remaining = remaining.trim_start();
        let end = remaining.find(char::is_whitespace)?;
        remaining = &remaining[end..];
    }
    Some(remaining.trim())
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
