//! Command-line front end.
//!
//! ```bash
//! focusflow run --subject physics --note "chapter 4"
//! focusflow status
//! focusflow task add "problem set 3" --subject physics
//! focusflow config set --work 50 --short-break 10
//! focusflow export ~/backups
//! ```

use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::{
    config::AppConfig,
    identity::{self, User},
    models::{Session, SubjectUpdate},
    settings::{minutes_to_secs, Theme, TimerConfig},
    store::{self, commands::Overview},
    timer::{self, format_time, TimerEvent, TimerMode},
    utils::logging,
    AppState,
};

#[derive(Parser)]
#[command(name = "focusflow")]
#[command(about = "FocusFlow - pomodoro timer with subjects, tasks and local stats", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the database
    #[arg(long, global = true, env = "FOCUSFLOW_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Work,
    ShortBreak,
    LongBreak,
}

impl From<ModeArg> for TimerMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Work => TimerMode::Work,
            ModeArg::ShortBreak => TimerMode::ShortBreak,
            ModeArg::LongBreak => TimerMode::LongBreak,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
    System,
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::System => Theme::System,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a countdown in the foreground until it completes (Ctrl-C pauses and exits)
    Run(RunArgs),

    /// Totals, today's sessions and the last seven days
    Status,

    /// Recorded sessions, newest first
    History {
        /// Only sessions credited to this subject
        #[arg(short, long)]
        subject: Option<String>,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Subject management
    #[command(subcommand)]
    Subject(SubjectCommands),

    /// Timer durations
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Application preferences
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Write a backup file into a directory
    Export {
        /// Target directory (default: current directory)
        dir: Option<PathBuf>,
    },

    /// Restore collections from a backup file
    Import { file: PathBuf },

    /// Local accounts
    #[command(subcommand)]
    Account(AccountCommands),
}

#[derive(Args)]
struct RunArgs {
    #[arg(short, long, value_enum, default_value = "work")]
    mode: ModeArg,

    /// Subject to credit (id or name)
    #[arg(short, long)]
    subject: Option<String>,

    /// Note attached to the recorded session
    #[arg(short, long)]
    note: Option<String>,

    /// Minutes added to (or, if negative, removed from) the countdown before starting
    #[arg(long, allow_hyphen_values = true)]
    adjust: Option<i64>,

    /// Run under a throwaway guest identity
    #[arg(long)]
    guest: bool,
}

#[derive(Subcommand)]
enum TaskCommands {
    List {
        #[arg(short, long)]
        subject: Option<String>,
    },
    Add {
        text: String,
        #[arg(short, long)]
        subject: Option<String>,
    },
    Toggle { id: String },
    Delete { id: String },
}

#[derive(Subcommand)]
enum SubjectCommands {
    List,
    Add {
        name: String,
        /// Hex color (#RRGGBB); defaults to the next palette color
        #[arg(short, long)]
        color: Option<String>,
    },
    Update {
        subject: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        color: Option<String>,
    },
    Delete { subject: String },
    /// Make a subject active; without one, return to general focus
    Use { subject: Option<String> },
    /// Set the free-text "working on" label
    Label { text: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    Show,
    /// Durations in minutes
    Set {
        #[arg(long)]
        work: Option<u64>,
        #[arg(long)]
        short_break: Option<u64>,
        #[arg(long)]
        long_break: Option<u64>,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    Show,
    Set {
        #[arg(long)]
        sound: Option<bool>,
        #[arg(long)]
        notifications: Option<bool>,
        #[arg(long)]
        auto_start_breaks: Option<bool>,
        #[arg(long)]
        auto_start_pomodoros: Option<bool>,
        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,
        #[arg(long)]
        rain: Option<bool>,
        #[arg(long)]
        rain_volume: Option<f32>,
        /// Work sessions between long breaks; 0 disables long breaks
        #[arg(long)]
        long_break_interval: Option<u32>,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    Show,
    Signup { username: String, password: String },
    Login { username: String, password: String },
    Logout,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    config.debug |= cli.verbose;
    logging::init(config.debug);

    let (state, events) = AppState::open(config)?;
    let json = cli.json;

    match cli.command {
        Commands::Run(args) => run_timer(&state, events, args, json).await?,
        Commands::Status => {
            let overview = cmd(store::commands::get_overview(&state).await)?;
            output(json, &overview, print_overview)?;
        }
        Commands::History { subject, limit } => {
            let mut sessions = cmd(store::commands::list_sessions(&state, subject).await)?;
            sessions.truncate(limit);
            output(json, &sessions, |sessions| {
                sessions.iter().for_each(print_session)
            })?;
        }
        Commands::Task(command) => run_task_command(&state, command, json).await?,
        Commands::Subject(command) => run_subject_command(&state, command, json).await?,
        Commands::Config(command) => run_config_command(&state, command, json).await?,
        Commands::Settings(command) => run_settings_command(&state, command, json).await?,
        Commands::Export { dir } => {
            let dir = match dir {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            let path = cmd(store::commands::export_data(&state, dir).await)?;
            output(json, &path, |path| println!("Exported to {}", path.display()))?;
        }
        Commands::Import { file } => {
            cmd(store::commands::import_data(&state, &file).await)?;
            if !json {
                println!("Imported {}", file.display());
            }
        }
        Commands::Account(command) => run_account_command(&state, command, json).await?,
    }

    report_storage_warnings(&state).await;
    Ok(())
}

async fn run_timer(
    state: &AppState,
    mut events: mpsc::UnboundedReceiver<TimerEvent>,
    args: RunArgs,
    json: bool,
) -> Result<()> {
    if args.guest {
        let guest = cmd(identity::commands::login_as_guest(state).await)?;
        eprintln!("Running as {} ({})", guest.username, guest.id);
    }
    if let Some(subject) = args.subject {
        cmd(store::commands::set_active_subject(state, Some(subject)).await)?;
    }

    cmd(timer::commands::switch_mode(state, args.mode.into()).await)?;
    if let Some(minutes) = args.adjust {
        cmd(timer::commands::add_time(state, minutes).await)?;
    }
    cmd(timer::commands::set_session_note(state, args.note).await)?;
    cmd(timer::commands::start_timer(state).await)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                let snapshot = cmd(timer::commands::pause_timer(state).await)?;
                if !json {
                    println!("\nPaused with {} left; nothing was recorded", snapshot.formatted_time);
                }
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    TimerEvent::Tick(snapshot) => {
                        if !json {
                            print!(
                                "\r{:<11} {}  {:>5.1}%",
                                snapshot.state.mode.label(),
                                snapshot.formatted_time,
                                snapshot.growth
                            );
                            io::stdout().flush()?;
                        }
                    }
                    TimerEvent::StateChanged(_) => {}
                    TimerEvent::StorageWarning(warning) => eprintln!("\nwarning: {warning}"),
                    TimerEvent::SessionCompleted(done) => {
                        let settings = cmd(store::commands::get_settings(state).await)?;
                        if json {
                            println!("{}", serde_json::to_string(&done)?);
                        } else {
                            let bell = if settings.sound_enabled { "\x07" } else { "" };
                            println!("\n{bell}{} {}", done.title(), done.body());
                        }

                        let chains = match done.mode {
                            TimerMode::Work => settings.auto_start_breaks,
                            TimerMode::ShortBreak | TimerMode::LongBreak => {
                                settings.auto_start_pomodoros
                            }
                        };
                        if !chains {
                            break;
                        }
                    }
                }
            }
        }
    }

    state.timer().shutdown().await;
    Ok(())
}

async fn run_task_command(state: &AppState, command: TaskCommands, json: bool) -> Result<()> {
    match command {
        TaskCommands::List { subject } => {
            let tasks = cmd(store::commands::list_tasks(state, subject).await)?;
            output(json, &tasks, |tasks| {
                for task in tasks {
                    let mark = if task.completed { "x" } else { " " };
                    println!("[{mark}] {}  {}", task.text, task.id);
                }
            })
        }
        TaskCommands::Add { text, subject } => {
            let task = cmd(store::commands::add_task(state, text, subject).await)?;
            output(json, &task, |task| println!("Added task {}", task.id))
        }
        TaskCommands::Toggle { id } => {
            let completed = cmd(store::commands::toggle_task(state, id).await)?;
            output(json, &completed, |completed| {
                println!("{}", if *completed { "Completed" } else { "Reopened" })
            })
        }
        TaskCommands::Delete { id } => cmd(store::commands::delete_task(state, id).await),
    }
}

async fn run_subject_command(
    state: &AppState,
    command: SubjectCommands,
    json: bool,
) -> Result<()> {
    match command {
        SubjectCommands::List => {
            let active = cmd(store::commands::get_overview(state).await)?.active_subject;
            let subjects = cmd(store::commands::list_subjects(state).await)?;
            output(json, &subjects, |subjects| {
                for summary in subjects {
                    let subject = &summary.subject;
                    let marker = match &active {
                        Some(active) if active.id == subject.id => "*",
                        _ => " ",
                    };
                    println!(
                        "{marker} {} {}  {} sessions, {} focused, {} open tasks",
                        subject.color,
                        subject.name,
                        subject.total_sessions,
                        format_duration(subject.total_focus_time),
                        summary.open_tasks
                    );
                }
            })
        }
        SubjectCommands::Add { name, color } => {
            let subject = cmd(store::commands::add_subject(state, name, color).await)?;
            output(json, &subject, |s| println!("Added subject {} ({})", s.name, s.color))
        }
        SubjectCommands::Update {
            subject,
            name,
            color,
        } => {
            let update = SubjectUpdate { name, color };
            let subject = cmd(store::commands::update_subject(state, subject, update).await)?;
            output(json, &subject, |s| println!("Updated {} ({})", s.name, s.color))
        }
        SubjectCommands::Delete { subject } => {
            cmd(store::commands::delete_subject(state, subject).await)
        }
        SubjectCommands::Use { subject } => {
            let active = cmd(store::commands::set_active_subject(state, subject).await)?;
            output(json, &active, |active| match active {
                Some(subject) => println!("Now focusing on {}", subject.name),
                None => println!("Back to general focus"),
            })
        }
        SubjectCommands::Label { text } => {
            cmd(store::commands::set_current_subject(state, text).await)
        }
    }
}

async fn run_config_command(state: &AppState, command: ConfigCommands, json: bool) -> Result<()> {
    let config = match command {
        ConfigCommands::Show => cmd(store::commands::get_timer_config(state).await)?,
        ConfigCommands::Set {
            work,
            short_break,
            long_break,
        } => {
            let current = cmd(store::commands::get_timer_config(state).await)?;
            let next = apply_minutes(current, work, short_break, long_break)?;
            cmd(store::commands::save_timer_config(state, next).await)?
        }
    };

    output(json, &config, |config| {
        for mode in TimerMode::ALL {
            println!("{:<11} {}", mode.label(), format_time(config.duration_for(mode)));
        }
    })
}

async fn run_settings_command(
    state: &AppState,
    command: SettingsCommands,
    json: bool,
) -> Result<()> {
    let settings = match command {
        SettingsCommands::Show => cmd(store::commands::get_settings(state).await)?,
        SettingsCommands::Set {
            sound,
            notifications,
            auto_start_breaks,
            auto_start_pomodoros,
            theme,
            rain,
            rain_volume,
            long_break_interval,
        } => {
            let mut settings = cmd(store::commands::get_settings(state).await)?;
            settings.sound_enabled = sound.unwrap_or(settings.sound_enabled);
            settings.notifications_enabled =
                notifications.unwrap_or(settings.notifications_enabled);
            settings.auto_start_breaks = auto_start_breaks.unwrap_or(settings.auto_start_breaks);
            settings.auto_start_pomodoros =
                auto_start_pomodoros.unwrap_or(settings.auto_start_pomodoros);
            settings.theme = theme.map(Theme::from).unwrap_or(settings.theme);
            settings.rain_sound_enabled = rain.unwrap_or(settings.rain_sound_enabled);
            settings.rain_volume = rain_volume.unwrap_or(settings.rain_volume);
            settings.long_break_interval =
                long_break_interval.unwrap_or(settings.long_break_interval);
            cmd(store::commands::save_settings(state, settings).await)?
        }
    };

    output(json, &settings, |settings| {
        println!("{}", serde_json::to_string_pretty(settings).unwrap_or_default())
    })
}

async fn run_account_command(
    state: &AppState,
    command: AccountCommands,
    json: bool,
) -> Result<()> {
    let user = match command {
        AccountCommands::Show => cmd(identity::commands::current_user(state).await)?,
        AccountCommands::Signup { username, password } => {
            Some(cmd(identity::commands::signup(state, username, password).await)?)
        }
        AccountCommands::Login { username, password } => {
            Some(cmd(identity::commands::login(state, username, password).await)?)
        }
        AccountCommands::Logout => {
            cmd(identity::commands::logout(state).await)?;
            None
        }
    };

    output(json, &user, |user: &Option<User>| match user {
        Some(user) => println!("Signed in as {} ({})", user.username, user.id),
        None => println!("Not signed in; using local data"),
    })
}

async fn report_storage_warnings(state: &AppState) {
    if let Ok(warnings) = store::commands::take_storage_warnings(state).await {
        for warning in warnings {
            eprintln!("warning: {warning}");
        }
    }
}

fn cmd<T>(result: std::result::Result<T, String>) -> Result<T> {
    result.map_err(|e| anyhow!(e))
}

fn output<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn print_overview(overview: &Overview) {
    let stats = &overview.stats;
    let focus = match &overview.active_subject {
        Some(subject) => subject.name.as_str(),
        None => "General Focus",
    };

    println!("Focus     {focus}");
    if !overview.current_subject.is_empty() {
        println!("Label     {}", overview.current_subject);
    }
    println!(
        "Totals    {} sessions, {} focused, {} trees, {} tasks done",
        stats.total_sessions,
        format_duration(stats.total_focus_time),
        stats.trees_grown,
        stats.tasks_completed
    );
    println!("Streak    {} day(s)", stats.current_streak);
    println!("Today     {} session(s)", overview.today.len());
    println!();

    for day in &overview.week {
        let bar = "#".repeat((day.focus_time / 25.0).ceil() as usize);
        println!("{}  {:>5.0}m  {bar}", day.date, day.focus_time);
    }
}

fn print_session(session: &Session) {
    let when = chrono::DateTime::from_timestamp_millis(session.completed_at)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_default();
    let note = session.note.as_deref().unwrap_or("");
    println!(
        "{when}  {:<11} {:>6}  {}  {note}",
        session.mode.label(),
        format_duration(session.duration),
        session.subject_name
    );
}

/// Overrides the given durations, keeping the rest of `current`.
fn apply_minutes(
    current: TimerConfig,
    work: Option<u64>,
    short_break: Option<u64>,
    long_break: Option<u64>,
) -> Result<TimerConfig> {
    let secs = |minutes: Option<u64>, fallback: u64| -> Result<u64> {
        minutes.map(minutes_to_secs).transpose().map(|s| s.unwrap_or(fallback))
    };
    Ok(TimerConfig {
        work: secs(work, current.work)?,
        short_break: secs(short_break, current.short_break)?,
        long_break: secs(long_break, current.long_break)?,
    })
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_negative_adjustment() {
        let cli = Cli::try_parse_from([
            "focusflow", "run", "--mode", "short-break", "--adjust", "-2", "--note", "walk",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(matches!(args.mode, ModeArg::ShortBreak));
        assert_eq!(args.adjust, Some(-2));
        assert_eq!(args.note.as_deref(), Some("walk"));
    }

    #[test]
    fn config_minutes_override_only_given_modes() {
        let config = apply_minutes(TimerConfig::default(), Some(50), None, Some(20)).unwrap();
        assert_eq!(config.work, 3000);
        assert_eq!(config.short_break, 300);
        assert_eq!(config.long_break, 1200);

        assert!(apply_minutes(TimerConfig::default(), Some(u64::MAX), None, None).is_err());
    }

    #[test]
    fn durations_render_in_hours_and_minutes() {
        assert_eq!(format_duration(1500), "25m");
        assert_eq!(format_duration(5400), "1h 30m");
    }
}
