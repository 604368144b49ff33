//! Desktop host for the Remindr core.
//!
//! # Responsibility
//! - Task CRUD from the command line.
//! - `run`: rebuild reminder timers from the store, then print reminders as
//!   they fire until Ctrl+C.

mod cli;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
use clap::Parser;
use cli::{Cli, Command};
use log::info;
use remindr_core::{
    init_stderr_logging, open_db, BootRecovery, Clock, NewTask, NoopWakeLocks,
    NotificationDispatcher, NotificationPayload, NotificationSurface, PermissionFlag,
    PlatformError, Priority, ReminderConfig, ReminderScheduler, SqlitePreferenceStore,
    SqliteTaskRepository, SystemClock, Task, TaskService, TokioAlarmFacility, TriggerEvent,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

/// Prints reminders to stdout.
struct ConsoleNotifier;

impl NotificationSurface for ConsoleNotifier {
    fn show(&self, payload: &NotificationPayload) -> Result<(), PlatformError> {
        println!(
            "[{}] {}: {} (task #{})",
            payload.summary, payload.title, payload.body, payload.open_task_id
        );
        Ok(())
    }

    fn show_fallback(&self, payload: &NotificationPayload) -> Result<(), PlatformError> {
        eprintln!("{}: {}", payload.title, payload.body);
        Ok(())
    }
}

struct App {
    service: TaskService,
    dispatcher: Arc<NotificationDispatcher>,
    boot: BootRecovery,
    triggers: UnboundedReceiver<TriggerEvent>,
    clock: Arc<SystemClock>,
}

impl App {
    fn open(db_path: &Path, config: ReminderConfig) -> Result<Self> {
        let clock = Arc::new(SystemClock);
        let store = Arc::new(SqliteTaskRepository::new(open_db(db_path)?));
        let flags = Arc::new(SqlitePreferenceStore::new(open_db(db_path)?));
        let (alarms, triggers) = TokioAlarmFacility::channel(Handle::current(), clock.clone());

        let dispatcher = Arc::new(NotificationDispatcher::new(
            store.clone(),
            flags,
            Arc::new(ConsoleNotifier),
            Arc::new(PermissionFlag::new(true)),
            Arc::new(NoopWakeLocks),
            clock.clone(),
            config.clone(),
        ));
        let scheduler = Arc::new(ReminderScheduler::new(
            Arc::new(alarms),
            Arc::clone(&dispatcher),
            clock.clone(),
            config.clone(),
        ));
        let service = TaskService::new(
            store.clone(),
            Arc::clone(&scheduler),
            Arc::clone(&dispatcher),
            clock.clone(),
        )?;
        let boot = BootRecovery::new(store, scheduler, clock.clone(), config);

        Ok(Self {
            service,
            dispatcher,
            boot,
            triggers,
            clock,
        })
    }
}

fn default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".remindr").join("remindr.db"))
}

fn load_config(path: Option<&Path>) -> Result<ReminderConfig> {
    match path {
        Some(path) => Ok(ReminderConfig::load(path)?),
        None => Ok(ReminderConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_stderr_logging(&cli.log_level).map_err(anyhow::Error::msg)?;

    if let Command::Ping = cli.command {
        println!("remindr_core ping={}", remindr_core::ping());
        println!("remindr_core version={}", remindr_core::core_version());
        return Ok(());
    }

    let db_path = match cli.db {
        Some(path) => path,
        None => default_db_path()?,
    };
    let config = load_config(cli.config.as_deref())?;
    let app = App::open(&db_path, config)
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    match cli.command {
        Command::Ping => Ok(()),
        Command::Add {
            title,
            description,
            priority,
            date,
            remind_in,
            remind_at,
        } => {
            let Some(priority) = Priority::parse(&priority) else {
                bail!("invalid priority `{priority}`; expected high|medium|low");
            };
            let scheduled_date = match date {
                Some(raw) => parse_date(&raw)?,
                None => Local::now().date_naive(),
            };
            let reminder_at = match (remind_in, remind_at) {
                (Some(minutes), _) => Some(app.clock.now_ms() + i64::from(minutes) * 60_000),
                (None, Some(raw)) => Some(parse_local_time(&raw)?),
                (None, None) => None,
            };
            let task = app
                .service
                .add_task(NewTask {
                    title,
                    description,
                    priority,
                    scheduled_date,
                    reminder_at,
                })
                .await?;
            println!("{}", format_task(&task));
            Ok(())
        }
        Command::List { date } => {
            let tasks = match date {
                Some(raw) => app.service.tasks_for_date(parse_date(&raw)?)?,
                None => app.service.list_tasks()?,
            };
            for task in &tasks {
                println!("{}", format_task(task));
            }
            Ok(())
        }
        Command::Complete { id, undo } => {
            let task = app.service.set_completed(id, !undo).await?;
            println!("{}", format_task(&task));
            Ok(())
        }
        Command::Delete { id } => {
            let task = app.service.delete_task(id).await?;
            println!("deleted #{} {}", task.id, task.title);
            Ok(())
        }
        Command::Run => run(app).await,
    }
}

async fn run(app: App) -> Result<()> {
    let App {
        dispatcher,
        boot,
        mut triggers,
        ..
    } = app;

    let report = boot.run().await;
    println!(
        "watching {} reminder(s); press Ctrl+C to stop",
        report.registered
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            event = triggers.recv() => {
                let Some(event) = event else { break };
                dispatcher.dispatch(event).await;
            }
            _ = &mut shutdown => {
                info!("event=cli_run module=cli status=stopped");
                break;
            }
        }
    }
    Ok(())
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date `{raw}`; expected YYYY-MM-DD"))
}

fn parse_local_time(raw: &str) -> Result<i64> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M")
        .with_context(|| format!("invalid time `{raw}`; expected \"YYYY-MM-DD HH:MM\""))?;
    let Some(local) = Local.from_local_datetime(&naive).single() else {
        bail!("ambiguous or skipped local time `{raw}`");
    };
    Ok(local.timestamp_millis())
}

fn format_task(task: &Task) -> String {
    let check = if task.is_completed { "x" } else { " " };
    let reminder = task
        .reminder_at
        .and_then(|ms| Local.timestamp_millis_opt(ms).single())
        .map(|at| format!("  (remind {})", at.format("%Y-%m-%d %H:%M")))
        .unwrap_or_default();
    format!(
        "{:>4} [{check}] {} {:<6} {}{reminder}",
        task.id,
        task.scheduled_date,
        task.priority.as_str(),
        task.title
    )
}
