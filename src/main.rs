mod actions;
mod app;
mod cli;
mod config;
mod debug_pod;
mod input;
mod kubectl;
mod model;
mod ui;

use anyhow::{Context, Result};
use app::{App, AppCommand};
use chrono::Local;
use clap::Parser;
use cli::CliArgs;
use config::Config;
use crossterm::event::{Event, EventStream, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use debug_pod::DebugPodManager;
use futures::StreamExt;
use kubectl::KubectlGateway;
use model::{LaunchContext, ResourceKind, ResourceTable};
use ratatui::backend::CrosstermBackend;
use ratatui::{Terminal, TerminalOptions, Viewport};
use std::io::{self, IsTerminal, Stdout};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::actions::{ActionOutcome, Dispatcher, InteractiveCmd};

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

const INLINE_PICKER_HEIGHT: u16 = 14;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum ScreenMode {
    FullScreen,
    Inline,
}

/// How one picker session ended.
enum SessionEnd {
    /// Cancelled or quit; dashboard mode returns to the kind chooser.
    Quit,
    /// An action completed; Direct mode prints the payload raw and exits.
    Done(Option<String>),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter)?;
    let config = Config::load()?;

    let gateway = KubectlGateway::new(
        config.kubectl.clone(),
        args.namespace.clone(),
        args.all_namespaces,
    );

    let piped_stdin = !io::stdin().is_terminal();
    let launch = if args.resource.is_none() && !piped_stdin {
        LaunchContext::Dashboard
    } else {
        LaunchContext::Direct
    };
    debug!("launch context: {launch:?}, piped stdin: {piped_stdin}");

    match launch {
        LaunchContext::Direct => run_direct(&args, &config, &gateway, piped_stdin).await,
        LaunchContext::Dashboard => run_dashboard(&args, &config, &gateway).await,
    }
}

fn init_tracing(level_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    // diagnostics must never write over the picker
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::sink)
        .try_init();

    Ok(())
}

/// Direct launch: one kind, one picker, one action, raw output, exit.
async fn run_direct(
    args: &CliArgs,
    config: &Config,
    gateway: &KubectlGateway,
    piped_stdin: bool,
) -> Result<()> {
    let kind_token = args.resource.as_deref().unwrap_or("pods");
    let kind = ResourceKind::new(config.resolve_kind_alias(kind_token));

    // piped input is the row source; no fetch is issued at all
    let table = if piped_stdin {
        KubectlGateway::table_from_reader(io::stdin().lock())
    } else {
        gateway.fetch_table(&kind, args.wide).await?
    };

    let mut app = App::new(kind, table, args.initial_query());
    let mut terminal = init_terminal(ScreenMode::Inline)?;
    let session = run_picker_session(
        &mut terminal,
        &mut app,
        gateway,
        config,
        LaunchContext::Direct,
        ScreenMode::Inline,
    )
    .await;
    let restore = restore_terminal(&mut terminal, ScreenMode::Inline);

    let session = merge_results(session, restore)?;
    if let SessionEnd::Done(Some(output)) = session {
        println!("{output}");
    }
    Ok(())
}

/// Dashboard launch: kind chooser -> picker -> action -> picker, with the
/// fetched row set cached across actions.
async fn run_dashboard(args: &CliArgs, config: &Config, gateway: &KubectlGateway) -> Result<()> {
    let mut terminal = init_terminal(ScreenMode::FullScreen)?;
    let result = dashboard_loop(&mut terminal, args, config, gateway).await;
    let restore = restore_terminal(&mut terminal, ScreenMode::FullScreen);
    merge_results(result, restore)
}

async fn dashboard_loop(
    terminal: &mut TuiTerminal,
    args: &CliArgs,
    config: &Config,
    gateway: &KubectlGateway,
) -> Result<()> {
    loop {
        let kinds = gateway.api_resource_kinds().await.unwrap_or_default();
        let Some(kind_token) = choose_kind(terminal, kinds).await? else {
            return Ok(());
        };
        let kind = ResourceKind::new(config.resolve_kind_alias(&kind_token));

        let table = gateway.fetch_table(&kind, args.wide).await?;
        let mut app = App::new(kind, table, args.initial_query());
        // in dashboard launches the session only ends by cancelling back
        // to the kind chooser
        run_picker_session(
            terminal,
            &mut app,
            gateway,
            config,
            LaunchContext::Dashboard,
            ScreenMode::FullScreen,
        )
        .await?;
    }
}

/// Fuzzy pick over the kinds the cluster reports; only confirm and cancel
/// are meaningful here.
async fn choose_kind(terminal: &mut TuiTerminal, kinds: Vec<String>) -> Result<Option<String>> {
    let lines = std::iter::once("KIND".to_string()).chain(kinds);
    let table = ResourceTable::from_lines(lines, Local::now());
    let mut app = App::new(ResourceKind::new("resource kinds"), table, String::new());
    if app.row_count() == 0 {
        app.set_status("kind discovery failed; is the cluster reachable?");
    }

    let mut reader = EventStream::new();
    loop {
        terminal
            .draw(|frame| ui::render(frame, &mut app))
            .context("failed to render terminal frame")?;

        let Some(event) = reader.next().await else {
            return Ok(None);
        };
        let key = match event {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
            Ok(_) => continue,
            Err(error) => {
                app.set_status(format!("terminal event error: {error}"));
                continue;
            }
        };
        let Some(action) = input::map_key(app.mode(), key) else {
            continue;
        };
        match app.apply_action(action) {
            AppCommand::Cancelled => return Ok(None),
            AppCommand::Dispatch(actions::ActionKey::Confirm) => {
                return Ok(app.selection().first().map(|row| row.name.clone()));
            }
            AppCommand::Dispatch(_) => {
                app.set_status("pick a kind first; actions apply to its resources");
            }
            _ => {}
        }
    }
}

async fn run_picker_session(
    terminal: &mut TuiTerminal,
    app: &mut App,
    gateway: &KubectlGateway,
    config: &Config,
    launch: LaunchContext,
    screen: ScreenMode,
) -> Result<SessionEnd> {
    let mut reader = EventStream::new();

    loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        let Some(event) = reader.next().await else {
            return Ok(SessionEnd::Quit);
        };
        let key = match event {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
            Ok(_) => continue,
            Err(error) => {
                app.set_status(format!("terminal event error: {error}"));
                continue;
            }
        };
        let Some(action) = input::map_key(app.mode(), key) else {
            continue;
        };

        let dispatcher = Dispatcher::new(gateway, config);
        let outcome = match app.apply_action(action) {
            AppCommand::None => continue,
            AppCommand::Cancelled => return Ok(SessionEnd::Quit),
            AppCommand::Dispatch(action_key) => {
                let selection = app.selection();
                if selection.is_empty() {
                    app.set_status("nothing to act on");
                    continue;
                }
                let kind = app.kind().clone();
                let result = dispatcher.execute(action_key, &kind, &selection).await;
                match result {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        app.set_status(format!("{error:#}"));
                        continue;
                    }
                }
            }
            AppCommand::ContainerChosen {
                action,
                row,
                container,
            } => dispatcher.continue_with_container(action, row, Some(container)),
            AppCommand::CommandSubmitted {
                row,
                container,
                line,
            } => {
                let result = dispatcher
                    .run_command_line(&row, container.as_deref(), &line)
                    .await;
                match result {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        app.set_status(format!("{error:#}"));
                        continue;
                    }
                }
            }
        };

        match outcome {
            ActionOutcome::Output { title, body } => {
                if launch.paged() {
                    app.show_pager(title, body);
                } else {
                    return Ok(SessionEnd::Done(Some(body)));
                }
            }
            ActionOutcome::Status(status) => {
                if launch.paged() {
                    app.set_status(status);
                } else {
                    return Ok(SessionEnd::Done(Some(status)));
                }
            }
            ActionOutcome::Interactive(cmd) => {
                let status = run_interactive(terminal, screen, gateway, config, cmd).await?;
                if launch.paged() {
                    app.set_status(status);
                } else {
                    return Ok(SessionEnd::Done(None));
                }
            }
            ActionOutcome::NeedContainers {
                action,
                row,
                containers,
            } => app.set_container_picker(action, row, containers),
            ActionOutcome::NeedCommandLine { row, container } => {
                app.start_command_prompt(row, container)
            }
            ActionOutcome::None => {
                if launch.paged() {
                    app.set_status("nothing to act on");
                } else {
                    return Ok(SessionEnd::Done(None));
                }
            }
        }
    }
}

/// Runs a terminal-inheriting command with the TUI suspended around it.
async fn run_interactive(
    terminal: &mut TuiTerminal,
    screen: ScreenMode,
    gateway: &KubectlGateway,
    config: &Config,
    cmd: InteractiveCmd,
) -> Result<String> {
    suspend_terminal(terminal, screen)?;

    let run_result = match cmd {
        InteractiveCmd::PodShell {
            namespace,
            pod,
            container,
        } => gateway
            .exec_shell(
                namespace.as_deref(),
                &pod,
                container.as_deref(),
                &config.shell,
            )
            .await
            .map(|status| format!("shell for {pod} ended ({status})")),
        InteractiveCmd::FollowLogs {
            namespace,
            pod,
            container,
        } => gateway
            .follow_logs(
                namespace.as_deref(),
                &pod,
                container.as_deref(),
                config.log_tail,
            )
            .await
            .map(|status| format!("log stream for {pod} ended ({status})")),
        InteractiveCmd::Edit { kind, groups } => {
            let mut result = Ok("edit ended".to_string());
            for (namespace, names) in &groups {
                match gateway.edit(&kind, namespace.as_deref(), names).await {
                    Ok(status) => result = Ok(format!("edit ended ({status})")),
                    Err(error) => {
                        result = Err(error);
                        break;
                    }
                }
            }
            result
        }
        InteractiveCmd::NodeShell { node } => {
            println!("provisioning debug pod on {node}...");
            let manager = DebugPodManager::new(gateway, &config.debug_pod);
            manager
                .shell_session(&node, &config.shell)
                .await
                .map(|()| format!("debug pod session on {node} ended"))
        }
    };
    let resume_result = resume_terminal(terminal, screen);

    let status = match (run_result, resume_result) {
        (Err(run_error), Err(resume_error)) => {
            return Err(anyhow::anyhow!(
                "{run_error:#}\nterminal resume error: {resume_error:#}"
            ));
        }
        (Err(error), Ok(())) => format!("{error:#}"),
        (Ok(_), Err(error)) => return Err(error),
        (Ok(status), Ok(())) => status,
    };
    Ok(status)
}

fn init_terminal(screen: ScreenMode) -> Result<TuiTerminal> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    match screen {
        ScreenMode::FullScreen => {
            execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
            let backend = CrosstermBackend::new(stdout);
            let mut terminal =
                Terminal::new(backend).context("failed to create terminal backend")?;
            terminal.clear().context("failed to clear terminal")?;
            Ok(terminal)
        }
        ScreenMode::Inline => {
            let backend = CrosstermBackend::new(stdout);
            Terminal::with_options(
                backend,
                TerminalOptions {
                    viewport: Viewport::Inline(INLINE_PICKER_HEIGHT),
                },
            )
            .context("failed to create inline terminal backend")
        }
    }
}

fn restore_terminal(terminal: &mut TuiTerminal, screen: ScreenMode) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    if screen == ScreenMode::FullScreen {
        execute!(terminal.backend_mut(), LeaveAlternateScreen)
            .context("failed to leave alternate screen")?;
    } else {
        terminal
            .clear()
            .context("failed to clear inline viewport")?;
    }
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

fn suspend_terminal(terminal: &mut TuiTerminal, screen: ScreenMode) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode for subprocess")?;
    if screen == ScreenMode::FullScreen {
        execute!(terminal.backend_mut(), LeaveAlternateScreen)
            .context("failed to leave alternate screen for subprocess")?;
    }
    terminal
        .show_cursor()
        .context("failed to show cursor for subprocess")?;
    Ok(())
}

fn resume_terminal(terminal: &mut TuiTerminal, screen: ScreenMode) -> Result<()> {
    enable_raw_mode().context("failed to re-enable raw mode after subprocess")?;
    if screen == ScreenMode::FullScreen {
        execute!(terminal.backend_mut(), EnterAlternateScreen)
            .context("failed to re-enter alternate screen after subprocess")?;
    }
    terminal
        .clear()
        .context("failed to clear terminal after subprocess")?;
    Ok(())
}

fn merge_results<T>(run: Result<T>, restore: Result<()>) -> Result<T> {
    match (run, restore) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(value), Ok(())) => Ok(value),
    }
}
