mod app;
mod cli;
mod cloud;
mod collaborator;
mod commands;
mod config;
mod dispatch;
mod error;
mod filter;
mod input;
mod k8s;
mod list;
mod loader;
mod menu;
mod message;
mod model;
mod ui;
mod wizard;

use anyhow::{Context, Result};
use app::{App, AppCommand};
use clap::Parser;
use cli::{CliArgs, Command};
use collaborator::Collaborator;
use commands::CommandContext;
use config::Settings;
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use dispatch::Dispatcher;
use futures::StreamExt;
use k8s::KubeGateway;
use loader::{LoadEvent, Loader, LogEvent, LogFollower};
use message::Message;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Background machinery the event loop hands commands to.
struct Workers {
    loader: Loader,
    follower: LogFollower,
    dispatcher: Dispatcher,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(
        &args.log_filter,
        args.log_file.as_deref(),
        args.command.is_none(),
    )?;

    let mut settings = Settings::load(args.config.as_deref())?;
    if args.all_namespaces && args.namespace.is_some() {
        warn!("both --all-namespaces and --namespace were provided, using all namespaces");
    }
    settings.apply_cli(args.namespace.as_deref(), args.all_namespaces);
    if let Some(source) = &settings.source {
        debug!("loaded settings from {}", source.display());
    }

    match args.command {
        None => run(&settings).await,
        Some(command) => {
            let code = run_command(&settings, command).await?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
    }
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>, tui: bool) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();

    let _ = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            subscriber
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None if tui => subscriber.with_writer(io::sink).try_init(),
        None => subscriber.with_writer(io::stderr).try_init(),
    };

    Ok(())
}

async fn run_command(settings: &Settings, command: Command) -> Result<i32> {
    if matches!(command, Command::Auth) {
        cloud::get_credentials(settings).await?;
        println!("Credentials written; run podnav to connect");
        return Ok(0);
    }

    let gateway = KubeGateway::connect(settings).await?;
    let ctx = CommandContext {
        scope: settings.namespace_scope(gateway.default_namespace()),
        default_namespace: gateway.default_namespace().to_string(),
        grace_period: settings.delete_grace_period_secs,
        collaborator: Arc::new(gateway),
    };
    let mut out = io::stdout().lock();

    match command {
        Command::List { kind } => commands::list(&ctx, kind, &mut out).await,
        Command::Secret { name } => commands::secret(&ctx, &name, &mut out).await,
        Command::Logs {
            pod,
            container,
            follow,
        } => commands::logs(&ctx, &pod, container.as_deref(), follow, &mut out).await,
        Command::Exec {
            pod,
            container,
            command,
        } => commands::exec(&ctx, &pod, container.as_deref(), command).await,
        Command::Delete {
            kind,
            name,
            grace,
            yes,
        } => {
            let mut input = io::stdin().lock();
            commands::delete(&ctx, kind, &name, grace, yes, &mut input, &mut out).await
        }
        Command::Auth => Ok(0),
    }
}

async fn run(settings: &Settings) -> Result<()> {
    let gateway = KubeGateway::connect(settings).await?;
    let scope = settings.namespace_scope(gateway.default_namespace());
    let mut app = App::new(
        gateway.context().to_string(),
        gateway.cluster().to_string(),
        gateway.default_namespace().to_string(),
        scope,
    );
    if let Some(source) = &settings.source {
        app.push_message(Message::info(format!("Using config {}", source.display())));
    }

    let collaborator: Arc<dyn Collaborator> = Arc::new(gateway);
    let (load_tx, load_rx) = mpsc::unbounded_channel();
    let (log_tx, log_rx) = mpsc::unbounded_channel();
    let mut workers = Workers {
        loader: Loader::new(collaborator.clone(), load_tx),
        follower: LogFollower::new(collaborator.clone(), log_tx),
        dispatcher: Dispatcher::new(collaborator, settings.delete_grace_period_secs),
    };

    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(
        &mut terminal,
        &mut app,
        &mut workers,
        load_rx,
        log_rx,
        settings,
    )
    .await;
    workers.loader.abort();
    workers.follower.stop();
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    workers: &mut Workers,
    mut load_rx: UnboundedReceiver<LoadEvent>,
    mut log_rx: UnboundedReceiver<LogEvent>,
    settings: &Settings,
) -> Result<()> {
    let mut reader = EventStream::new();
    let mut spinner = interval(settings.spinner_interval());
    spinner.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        if !app.running() {
            info!("leaving podnav");
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::resolve(app.mode(), key) {
                            debug!("action={action:?}");
                            let command = app.apply_action(action);
                            terminal
                                .draw(|frame| ui::render(frame, app))
                                .context("failed to render terminal frame")?;
                            execute_command(terminal, app, workers, command).await?;
                        }
                    }
                    Some(Ok(Event::Resize(_, _))) => {}
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        app.push_message(Message::error(format!("terminal event error: {error}")));
                    }
                    None => {
                        warn!("terminal event stream closed");
                        break;
                    }
                }
            }
            _ = spinner.tick(), if app.is_loading() => {
                app.tick_spinner();
            }
            Some(event) = load_rx.recv() => {
                app.apply_load_event(event);
            }
            Some(event) = log_rx.recv() => {
                app.apply_log_event(event);
            }
        }
    }

    Ok(())
}

/// Runs a command and every follow-up command it produces, in order.
async fn execute_command(
    terminal: &mut TuiTerminal,
    app: &mut App,
    workers: &mut Workers,
    command: AppCommand,
) -> Result<()> {
    let mut pending = VecDeque::from([command]);
    while let Some(command) = pending.pop_front() {
        match command {
            AppCommand::None => {}
            AppCommand::Batch(commands) => {
                for command in commands.into_iter().rev() {
                    pending.push_front(command);
                }
            }
            AppCommand::Load { epoch, kind, scope } => workers.loader.spawn(epoch, kind, scope),
            AppCommand::CancelLoad => workers.loader.abort(),
            AppCommand::Dispatch {
                request,
                confirmation,
            } => {
                let outcome = if request.operation.needs_terminal() {
                    suspend_terminal_for_subprocess(terminal)?;
                    let outcome = workers.dispatcher.dispatch(&request, confirmation).await;
                    resume_terminal_after_subprocess(terminal)?;
                    outcome
                } else {
                    workers.dispatcher.dispatch(&request, confirmation).await
                };
                pending.push_front(app.apply_dispatch_outcome(outcome));
            }
            AppCommand::Follow {
                id,
                namespace,
                pod,
                container,
            } => workers.follower.start(id, namespace, pod, container),
            AppCommand::StopFollow => workers.follower.stop(),
        }
    }
    Ok(())
}

fn suspend_terminal_for_subprocess(terminal: &mut TuiTerminal) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode for subprocess")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen for subprocess")?;
    terminal
        .show_cursor()
        .context("failed to show cursor for subprocess")?;
    Ok(())
}

fn resume_terminal_after_subprocess(terminal: &mut TuiTerminal) -> Result<()> {
    enable_raw_mode().context("failed to re-enable raw mode after subprocess")?;
    execute!(terminal.backend_mut(), EnterAlternateScreen)
        .context("failed to re-enter alternate screen after subprocess")?;
    terminal
        .clear()
        .context("failed to clear terminal after subprocess")?;
    Ok(())
}
