//! Line-oriented front end over stdin.
//!
//! User-facing output uses writeln! to the given writer; diagnostics go
//! through tracing.

use std::io::{self, Write};
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::classroom::{PointChange, RosterSort};
use crate::errors::AppError;
use crate::models::{
    avatar_image_url, find_behavior, random_avatar, Student, NEGATIVE_BEHAVIORS,
    POSITIVE_BEHAVIORS, TOTAL_AVATARS,
};
use crate::session::SessionId;
use crate::sync::{RemoteStore, SyncEngine};
use crate::transfer::{export_csv, parse_roster, parse_scores};

const HELP: &str = "\
Commands:
  list [seat|top|low]          show the current class
  classes                      list class groups
  class <name>|all             switch class
  behaviors                    list behavior presets
  award <roll> <amount|label>  add points, e.g. `award 3 Homework Complete`
  set <roll> <points>          set a total
  delete <roll>                remove a student (history stays)
  avatar <roll> [id]           pick an avatar, random when omitted
  history <roll|name>          point history, newest first
  import scores|roster         paste lines, end with an empty line
  export [file]                write the roster as CSV
  clear                        remove every student and all history
  connect [code]               share this classroom under a code
  join <code>                  switch to another session
  share                        print the share link
  status                       sync status
  refresh                      fetch the remote document now
  quit";

/// What a pasted import block contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Scores,
    Roster,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    List(RosterSort),
    Classes,
    Class(Option<String>),
    Behaviors,
    Award { roll: String, what: String },
    Set { roll: String, points: i64 },
    Delete(String),
    Avatar { roll: String, avatar: Option<u32> },
    History(String),
    Import(ImportKind),
    Export(Option<PathBuf>),
    Clear,
    Connect(Option<SessionId>),
    Join(SessionId),
    Share,
    Status,
    Refresh,
    Quit,
}

/// Split off the first word.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (s, ""),
    }
}

fn required<'a>(value: &'a str, usage: &str) -> Result<&'a str, AppError> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("Usage: {}", usage)));
    }
    Ok(value)
}

fn session_code(raw: &str) -> Result<SessionId, AppError> {
    SessionId::parse(raw)
        .ok_or_else(|| AppError::Validation(format!("Invalid session code: {:?}", raw)))
}

impl Command {
    /// Parse one input line. Blank lines give `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, AppError> {
        let (word, rest) = split_word(line);
        if word.is_empty() {
            return Ok(None);
        }

        let command = match word.to_ascii_lowercase().as_str() {
            "help" | "?" => Command::Help,
            "list" | "ls" => {
                let sort = if rest.is_empty() {
                    RosterSort::default()
                } else {
                    rest.parse()?
                };
                Command::List(sort)
            }
            "classes" => Command::Classes,
            "class" => {
                let name = required(rest, "class <name>|all")?;
                if name.eq_ignore_ascii_case("all") {
                    Command::Class(None)
                } else {
                    Command::Class(Some(name.to_string()))
                }
            }
            "behaviors" => Command::Behaviors,
            "award" => {
                let (roll, what) = split_word(rest);
                required(what, "award <roll> <amount|label>")?;
                Command::Award {
                    roll: roll.to_string(),
                    what: what.to_string(),
                }
            }
            "set" => {
                let (roll, points) = split_word(rest);
                let points = required(points, "set <roll> <points>")?
                    .parse()
                    .map_err(|_| AppError::Validation(format!("Not a number: {:?}", points)))?;
                Command::Set {
                    roll: roll.to_string(),
                    points,
                }
            }
            "delete" | "rm" => Command::Delete(required(rest, "delete <roll>")?.to_string()),
            "avatar" => {
                let (roll, avatar) = split_word(rest);
                let roll = required(roll, "avatar <roll> [id]")?;
                let avatar = match avatar {
                    "" => None,
                    raw => match raw.parse() {
                        Ok(id) if (1..=TOTAL_AVATARS).contains(&id) => Some(id),
                        _ => {
                            return Err(AppError::Validation(format!(
                                "Avatar must be between 1 and {}",
                                TOTAL_AVATARS
                            )))
                        }
                    },
                };
                Command::Avatar {
                    roll: roll.to_string(),
                    avatar,
                }
            }
            "history" => Command::History(required(rest, "history <roll|name>")?.to_string()),
            "import" => match rest.to_ascii_lowercase().as_str() {
                "scores" | "score" => Command::Import(ImportKind::Scores),
                "roster" | "students" => Command::Import(ImportKind::Roster),
                _ => return Err(AppError::Validation("Usage: import scores|roster".into())),
            },
            "export" => Command::Export((!rest.is_empty()).then(|| PathBuf::from(rest))),
            "clear" => Command::Clear,
            "connect" => {
                let code = match rest {
                    "" => None,
                    raw => Some(session_code(raw)?),
                };
                Command::Connect(code)
            }
            "join" => Command::Join(session_code(required(rest, "join <code>")?)?),
            "share" => Command::Share,
            "status" => Command::Status,
            "refresh" | "sync" => Command::Refresh,
            "quit" | "exit" => Command::Quit,
            other => {
                return Err(AppError::Validation(format!(
                    "Unknown command {:?}. Type 'help' for commands.",
                    other
                )))
            }
        };
        Ok(Some(command))
    }
}

/// What the input loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Read lines up to an empty one and hand them to [`Console::import`]
    Collect(ImportKind),
    Quit,
}

fn describe_change(name: &str, change: &PointChange) -> String {
    let verb = if change.is_gain() { "gained" } else { "lost" };
    format!(
        "{} {} {} points ({} -> {})",
        name,
        verb,
        change.delta().unsigned_abs(),
        change.old_points,
        change.new_points
    )
}

fn level(points: i64) -> i64 {
    points.div_euclid(10) + 1
}

pub struct Console<'a, R: RemoteStore> {
    engine: &'a SyncEngine<R>,
    class: Option<String>,
}

impl<'a, R: RemoteStore> Console<'a, R> {
    pub fn new(engine: &'a SyncEngine<R>, class: Option<String>) -> Self {
        Self { engine, class }
    }

    fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    async fn find(&self, roll: &str) -> Result<Student, AppError> {
        self.engine
            .classroom()
            .find_by_roll(self.class(), roll)
            .await
            .ok_or_else(|| AppError::NotFound(format!("No student with roll number {:?}", roll)))
    }

    pub async fn execute<W: Write>(
        &mut self,
        command: Command,
        out: &mut W,
    ) -> Result<Flow, AppError> {
        let engine = self.engine;
        let classroom = engine.classroom();

        match command {
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::List(sort) => {
                let students = classroom.roster(self.class(), sort).await;
                let heading = self.class().unwrap_or("All classes");
                writeln!(
                    out,
                    "{} | {} students | {} points",
                    heading,
                    students.len(),
                    classroom.total_points(self.class()).await
                )?;
                for s in &students {
                    writeln!(
                        out,
                        "{:>4}  {:<16} {:>5} pts  Lv.{:<3} #{}",
                        s.roll_number,
                        s.name,
                        s.points,
                        level(s.points),
                        s.avatar_id
                    )?;
                }
            }
            Command::Classes => {
                let groups = classroom.class_groups().await;
                if groups.is_empty() {
                    writeln!(out, "No classes yet.")?;
                }
                for group in groups {
                    let marker = if self.class() == Some(group.as_str()) { "*" } else { " " };
                    writeln!(out, "{} {}", marker, group)?;
                }
            }
            Command::Class(name) => {
                match &name {
                    Some(name) => writeln!(out, "Now showing {}", name)?,
                    None => writeln!(out, "Now showing all classes")?,
                }
                self.class = name;
            }
            Command::Behaviors => {
                for b in POSITIVE_BEHAVIORS.iter().chain(NEGATIVE_BEHAVIORS) {
                    writeln!(out, "{:+3}  {} ({})", b.points, b.label, b.label_zh)?;
                }
            }
            Command::Award { roll, what } => {
                let student = self.find(&roll).await?;
                let (amount, reason) = match what.parse::<i64>() {
                    Ok(amount) => (amount, None),
                    Err(_) => {
                        let behavior = find_behavior(&what).ok_or_else(|| {
                            AppError::Validation(format!("Unknown behavior {:?}", what))
                        })?;
                        (behavior.points, Some(behavior.label))
                    }
                };
                if let Some((change, _)) = classroom.apply_behavior(&student.id, amount, reason).await {
                    writeln!(out, "{}", describe_change(&student.name, &change))?;
                }
            }
            Command::Set { roll, points } => {
                let student = self.find(&roll).await?;
                if let Some(change) = classroom.update_points(&student.id, points).await {
                    writeln!(out, "{}", describe_change(&student.name, &change))?;
                }
            }
            Command::Delete(roll) => {
                let student = self.find(&roll).await?;
                classroom.delete_student(&student.id).await;
                writeln!(out, "Removed {}. Their history is kept.", student.name)?;
            }
            Command::Avatar { roll, avatar } => {
                let student = self.find(&roll).await?;
                let avatar = avatar.unwrap_or_else(random_avatar);
                classroom.set_avatar(&student.id, avatar).await;
                writeln!(out, "{} is now #{} {}", student.name, avatar, avatar_image_url(avatar))?;
            }
            Command::History(who) => {
                let entries = match classroom.find_by_roll(self.class(), &who).await {
                    Some(student) => classroom.history_for(&student.id).await,
                    None => classroom.history_by_name(&who).await,
                };
                if entries.is_empty() {
                    writeln!(out, "No history for {}", who)?;
                }
                let roster = classroom.students().await;
                for entry in &entries {
                    let when = chrono::DateTime::from_timestamp_millis(entry.timestamp)
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    writeln!(
                        out,
                        "{}  {:<16} {:+4}  {}",
                        when,
                        entry.display_name(&roster),
                        entry.amount,
                        entry.reason.as_deref().unwrap_or("")
                    )?;
                }
            }
            Command::Import(kind) => {
                writeln!(out, "Paste lines, then an empty line to finish:")?;
                return Ok(Flow::Collect(kind));
            }
            Command::Export(path) => {
                let students = classroom.roster(self.class(), RosterSort::Seat).await;
                let csv = export_csv(&students);
                match path {
                    Some(path) => {
                        tokio::fs::write(&path, csv).await?;
                        writeln!(out, "Wrote {} students to {}", students.len(), path.display())?;
                    }
                    None => writeln!(out, "{}", csv.trim_start_matches('\u{feff}'))?,
                }
            }
            Command::Clear => {
                classroom.clear().await;
                writeln!(out, "Cleared the roster and history.")?;
            }
            Command::Connect(code) => {
                let (code, status) = self.engine.create_session(code).await;
                writeln!(out, "Sharing as {} ({})", code, status.as_str())?;
                if let Some(link) = self.engine.sessions().share_link().await {
                    writeln!(out, "{}", link)?;
                }
            }
            Command::Join(code) => {
                let status = self.engine.join_session(code.clone()).await;
                writeln!(out, "Joined {} ({})", code, status.as_str())?;
            }
            Command::Share => match self.engine.sessions().share_link().await {
                Some(link) => writeln!(out, "{}", link)?,
                None => writeln!(out, "Not shared yet. Use `connect` first.")?,
            },
            Command::Status => {
                let session = self.engine.sessions().current().await;
                match session {
                    Some(code) => writeln!(out, "LIVE: {} ({})", code, self.engine.status().as_str())?,
                    None => writeln!(out, "Not synced (offline)")?,
                }
            }
            Command::Refresh => {
                let status = self.engine.refresh().await;
                writeln!(out, "{}", status.as_str())?;
            }
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Apply a pasted import block to the current class.
    pub async fn import<W: Write>(
        &mut self,
        kind: ImportKind,
        text: &str,
        out: &mut W,
    ) -> Result<(), AppError> {
        let classroom = self.engine.classroom();
        match kind {
            ImportKind::Scores => {
                let lines = parse_scores(text)?;
                let changes = classroom.import_scores(&lines, self.class()).await;
                writeln!(
                    out,
                    "Updated {} students from {} lines",
                    changes.len(),
                    lines.len()
                )?;
            }
            ImportKind::Roster => {
                let students: Vec<Student> = parse_roster(text)
                    .into_iter()
                    .map(|line| line.into_student(self.class()))
                    .collect();
                if students.is_empty() {
                    return Err(AppError::Validation("No students found in the pasted text".into()));
                }
                let count = students.len();
                classroom.add_students(students).await;
                writeln!(out, "Added {} students", count)?;
            }
        }
        Ok(())
    }
}

/// Read commands from stdin until `quit` or end of input, then publish
/// anything still pending.
pub async fn run<R: RemoteStore>(
    engine: &SyncEngine<R>,
    class: Option<String>,
) -> Result<(), AppError> {
    let mut console = Console::new(engine, class);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = io::stdout();

    writeln!(out, "PokeClass. Type 'help' for commands.")?;
    console.execute(Command::Status, &mut out).await?;

    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                writeln!(out, "{}", e.message())?;
                continue;
            }
        };

        match console.execute(command, &mut out).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Ok(Flow::Collect(kind)) => {
                let mut block = String::new();
                while let Some(line) = lines.next_line().await? {
                    if line.trim().is_empty() {
                        break;
                    }
                    block.push_str(&line);
                    block.push('\n');
                }
                if let Err(e) = console.import(kind, &block, &mut out).await {
                    writeln!(out, "{}", e.message())?;
                }
            }
            Err(e) => writeln!(out, "{}", e.message())?,
        }
        out.flush()?;
    }

    if let Err(e) = engine.flush().await {
        tracing::warn!("Final publish failed, changes are kept on this device: {}", e);
    }
    Ok(())
}
