//! Command dispatch for the `tasknest` CLI.
//!
//! Each invocation loads the stored session, opens a [`TaskCollection`]
//! (hydrate from the mirror, then refresh from the API), runs one command,
//! and prints its result followed by any notifications it produced.

use std::io::Write;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::mpsc;

use tasknest_proto::{FilterUpdate, Task, TaskDraft, TaskId, TaskPatch};

use crate::auth::{AuthClient, AuthError, Session};
use crate::config::{AddArgs, ClientConfig, Command, EditArgs, ListArgs};
use crate::mirror::FileMirror;
use crate::notify::{Level, Notification, Notifier};
use crate::store::http::HttpTaskStore;
use crate::store::{ErrorKind, StoreError};
use crate::tasks::{TaskCollection, TaskError, TaskStats};

/// Capacity of the notification channel for one command.
const NOTIFICATION_BUFFER: usize = 32;

/// Errors surfaced to the CLI user.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Writing output failed.
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),

    /// A due date argument could not be parsed.
    #[error("invalid due date {0:?} (expected RFC 3339 or YYYY-MM-DD)")]
    InvalidDate(String),

    /// `edit` was given no fields.
    #[error("nothing to change")]
    EmptyEdit,
}

impl AppError {
    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(e) => e.kind(),
            Self::Task(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::Io(_) | Self::InvalidDate(_) | Self::EmptyEdit => ErrorKind::Validation,
        }
    }
}

type Collection = TaskCollection<HttpTaskStore, FileMirror>;

/// Runs one CLI command, writing human-readable output to `out`.
///
/// # Errors
///
/// Returns [`AppError`] if the command fails; output written before the
/// failure is kept.
pub async fn run<W: Write>(
    config: &ClientConfig,
    command: Command,
    out: &mut W,
) -> Result<(), AppError> {
    let auth = || AuthClient::new(config.api_url.clone(), config.request_timeout);

    match command {
        Command::Register {
            name,
            email,
            password,
        } => {
            let session = auth()?.register(&name, &email, &password).await?;
            session.save(&config.data_dir)?;
            writeln!(out, "Registered and signed in as {}", describe_user(&session))?;
        }
        Command::Login { email, password } => {
            let session = auth()?.login(&email, &password).await?;
            session.save(&config.data_dir)?;
            writeln!(out, "Signed in as {}", describe_user(&session))?;
        }
        Command::Logout => {
            Session::clear(&config.data_dir)?;
            writeln!(out, "Signed out")?;
        }
        Command::Whoami => {
            let session = Session::load(&config.data_dir)?;
            let user = auth()?.me(&session.token).await?;
            writeln!(out, "{} <{}> ({})", user.name, user.email, user.id)?;
        }
        command => {
            let (mut tasks, mut notes) = open(config).await?;
            let result = run_task_command(&mut tasks, command, out).await;
            print_notifications(&mut notes, out)?;
            result?;
        }
    }
    Ok(())
}

async fn run_task_command<W: Write>(
    tasks: &mut Collection,
    command: Command,
    out: &mut W,
) -> Result<(), AppError> {
    match command {
        Command::List(args) => {
            apply_view(tasks, args);
            print_view(tasks, out)?;
        }
        Command::Show { id } => {
            let task = tasks.get_task(&TaskId::new(id)).await?;
            print_task(&task, out)?;
        }
        Command::Add(args) => {
            let task = tasks.create_task(draft_from(args)?).await?;
            writeln!(out, "Added {}", task.id)?;
        }
        Command::Edit(args) => {
            let id = TaskId::new(args.id.clone());
            let patch = patch_from(args)?;
            if patch.is_empty() {
                return Err(AppError::EmptyEdit);
            }
            let task = tasks.update_task(&id, patch).await?;
            print_task(&task, out)?;
        }
        Command::Toggle { id } => {
            let id = TaskId::new(id);
            match tasks.toggle_task(&id).await? {
                Some(task) => writeln!(
                    out,
                    "{} is now {}",
                    task.title,
                    if task.completed { "completed" } else { "active" }
                )?,
                None => return Err(TaskError::NotFound(id).into()),
            }
        }
        Command::Rm { id } => {
            let id = TaskId::new(id);
            tasks.delete_task(&id).await?;
            writeln!(out, "Deleted {id}")?;
        }
        Command::Move { from, to, view } => {
            apply_view(tasks, view);
            // Positions are 1-based, as printed by `list`.
            let len = tasks.view().len();
            let index = |pos: usize| {
                pos.checked_sub(1)
                    .ok_or(TaskError::InvalidIndex { index: pos, len })
            };
            tasks.reorder_tasks(index(from)?, index(to)?)?;
            print_view(tasks, out)?;
        }
        Command::Tags => {
            for tag in tasks.all_tags() {
                writeln!(out, "{tag}")?;
            }
        }
        Command::Stats(args) => {
            apply_view(tasks, args);
            print_stats(&tasks.stats(), out)?;
        }
        Command::Register { .. } | Command::Login { .. } | Command::Logout | Command::Whoami => {}
    }
    Ok(())
}

/// Builds the collection for the stored session.
///
/// A failed refresh is not fatal: the mirrored tasks stay visible and the
/// failure is reported as a notification.
async fn open(config: &ClientConfig) -> Result<(Collection, mpsc::Receiver<Notification>), AppError> {
    let session = Session::load(&config.data_dir)?;
    let store = HttpTaskStore::new(
        config.api_url.clone(),
        Some(session.token.clone()),
        config.request_timeout,
    )?;
    let mirror = FileMirror::new(&config.data_dir);
    let (notifier, notes) = Notifier::channel(NOTIFICATION_BUFFER);

    let mut tasks =
        TaskCollection::new(store, mirror, notifier).with_max_title_len(config.max_title_len);
    if let Err(e) = tasks.open_session(&session.user.id).await {
        tracing::warn!(error = %e, "showing mirrored tasks");
    }
    Ok((tasks, notes))
}

fn apply_view(tasks: &mut Collection, args: ListArgs) {
    tasks.set_filter(FilterUpdate {
        status: args.status,
        priority: args.priority.map(Some),
        category: args.category.map(Some),
        tag: args.tag.map(Some),
        sort_by: args.sort,
        sort_order: args.order,
    });
    if let Some(term) = args.search {
        tasks.set_search(term);
    }
}

fn draft_from(args: AddArgs) -> Result<TaskDraft, AppError> {
    Ok(TaskDraft {
        title: args.title,
        description: args.description.filter(|d| !d.trim().is_empty()),
        priority: args.priority.unwrap_or_default(),
        category: args.category.filter(|c| !c.trim().is_empty()),
        due_date: args.due.as_deref().map(parse_due).transpose()?,
        tags: args.tags,
    })
}

/// Empty strings clear optional fields.
fn patch_from(args: EditArgs) -> Result<TaskPatch, AppError> {
    let clearable = |value: Option<String>| value.map(|v| Some(v).filter(|v| !v.trim().is_empty()));
    let due_date = match args.due.as_deref().map(str::trim) {
        None => None,
        Some("") => Some(None),
        Some(raw) => Some(Some(parse_due(raw)?)),
    };
    Ok(TaskPatch {
        title: args.title,
        description: clearable(args.description),
        completed: args.completed,
        priority: args.priority,
        category: clearable(args.category),
        tags: args.tags,
        due_date,
        order: None,
    })
}

/// Parses an RFC 3339 timestamp, or a bare date as midnight UTC.
///
/// # Errors
///
/// Returns [`AppError::InvalidDate`] if neither form matches.
pub fn parse_due(raw: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| AppError::InvalidDate(raw.to_string()))
}

fn describe_user(session: &Session) -> String {
    if session.user.name.is_empty() {
        session.user.email.clone()
    } else {
        format!("{} <{}>", session.user.name, session.user.email)
    }
}

fn print_view<W: Write>(tasks: &Collection, out: &mut W) -> std::io::Result<()> {
    let view = tasks.view();
    if view.is_empty() {
        return writeln!(out, "No tasks");
    }
    let now = Utc::now();
    for (pos, task) in view.iter().enumerate() {
        writeln!(out, "{:>3}. {}", pos + 1, summary_line(task, now))?;
    }
    Ok(())
}

/// One-line rendering used by `list`.
#[must_use]
pub fn summary_line(task: &Task, now: DateTime<Utc>) -> String {
    let mut line = format!(
        "[{}] {} ({})",
        if task.completed { "x" } else { " " },
        task.title,
        task.priority
    );
    if let Some(category) = &task.category {
        line.push_str(&format!(" @{category}"));
    }
    if let Some(due) = task.due_date {
        line.push_str(&format!(" due {}", due.format("%Y-%m-%d")));
        if task.is_overdue(now) {
            line.push_str(" OVERDUE");
        }
    }
    for tag in &task.tags {
        line.push_str(&format!(" #{tag}"));
    }
    line.push_str(&format!("  {}", task.id));
    line
}

fn print_task<W: Write>(task: &Task, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "id:          {}", task.id)?;
    writeln!(out, "title:       {}", task.title)?;
    if let Some(description) = &task.description {
        writeln!(out, "description: {description}")?;
    }
    writeln!(
        out,
        "status:      {}",
        if task.completed { "completed" } else { "active" }
    )?;
    writeln!(out, "priority:    {}", task.priority)?;
    if let Some(category) = &task.category {
        writeln!(out, "category:    {category}")?;
    }
    if !task.tags.is_empty() {
        writeln!(out, "tags:        {}", task.tags.join(", "))?;
    }
    if let Some(due) = task.due_date {
        writeln!(out, "due:         {}", due.to_rfc3339())?;
    }
    writeln!(out, "created:     {}", task.created_at.to_rfc3339())?;
    writeln!(out, "updated:     {}", task.updated_at.to_rfc3339())
}

fn print_stats<W: Write>(stats: &TaskStats, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "total:     {}", stats.total)?;
    writeln!(out, "completed: {} ({}%)", stats.completed, stats.completion_rate())?;
    writeln!(out, "active:    {}", stats.active)?;
    writeln!(out, "overdue:   {}", stats.overdue)?;
    for category in stats.categories.iter().filter(|c| c.total > 0) {
        writeln!(
            out,
            "  {:<10} {}/{}",
            category.name, category.completed, category.total
        )?;
    }
    Ok(())
}

fn print_notifications<W: Write>(
    notes: &mut mpsc::Receiver<Notification>,
    out: &mut W,
) -> std::io::Result<()> {
    while let Ok(note) = notes.try_recv() {
        let marker = match note.level {
            Level::Success => "ok",
            Level::Warning => "warn",
            Level::Error => "error",
        };
        writeln!(out, "[{marker}] {note}")?;
    }
    Ok(())
}
