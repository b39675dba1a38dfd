use std::{fs::OpenOptions, io, io::Write, path::Path, time::Duration};

use anyhow::{Context, Result};
use blobplay_core::{ControllerEvent, FfmpegWidget, PlayerConfig, PlayerController, widget};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend, style::Color};

mod app;
mod cli;
mod commands;
mod events; // Contains event utility functions
mod ui;

use app::{App, Focus};
use events::event_utils;

// ~30 FPS for UI and video
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Route the log facade to a file; the terminal belongs to the UI
fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let datetime = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            let thread_id = std::thread::current().id();
            writeln!(
                buf,
                "[{} {:?} {} {}] {}",
                datetime,
                thread_id,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .context("Failed to initialize logger")?;
    Ok(())
}

/// Set up clean terminal restoration on panic
fn install_panic_hook() {
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);

        log::error!("PANIC: {}\n    at {}", panic_info, std::backtrace::Backtrace::capture());

        orig_hook(panic_info);
    }));
}

enum Step {
    Frame,
    Controller(ControllerEvent),
    Input(Event),
    InputClosed,
}

fn handle_input(app: &mut App, event: Event) {
    match event {
        Event::Key(key) => {
            if !event_utils::is_key_press(&key) {
                return;
            }
            log::debug!("EVENT: Key {:?} with modifiers {:?}", key.code, key.modifiers);

            if app.is_command_mode() && key.code == KeyCode::Enter {
                let cmd = app.get_command_buffer().to_string();
                app.exit_command_mode();
                if let Err(e) = commands::handle_command(app, &cmd) {
                    log::warn!("Command error: {}", e);
                    app.set_status(format!("Error: {}", e), Color::Red);
                }
            } else if !app.is_command_mode()
                && app.focus != Focus::Url
                && event_utils::is_command_prompt_key(&key)
            {
                log::debug!("Entering command mode");
                app.enter_command_mode();
            } else if let Err(e) = app.handle_key_event(key) {
                log::warn!("Key handler error: {}", e);
                app.set_status(format!("Key error: {}", e), Color::Red);
            }
        }
        Event::Mouse(mouse) => {
            if let Err(e) = app.handle_mouse_event(mouse) {
                log::warn!("Mouse handler error: {}", e);
                app.set_status(format!("Mouse error: {}", e), Color::Red);
            }
        }
        Event::Resize(w, h) => log::debug!("Resize event: {}x{}", w, h),
        _ => {}
    }
}

async fn run<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let mut input = EventStream::new();
    let mut frame_tick = tokio::time::interval(FRAME_INTERVAL);
    frame_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    while !app.should_quit {
        let step = tokio::select! {
            _ = frame_tick.tick() => Step::Frame,
            Some(event) = app.controller_events.recv() => Step::Controller(event),
            maybe_event = input.next() => match maybe_event {
                Some(Ok(event)) => Step::Input(event),
                Some(Err(e)) => {
                    log::warn!("Error reading event: {}", e);
                    continue;
                }
                None => Step::InputClosed,
            },
        };

        match step {
            Step::Frame => {
                app.update();
                terminal.draw(|f| {
                    if let Err(e) = ui::draw_ui(f, app) {
                        log::error!("UI draw function error: {}", e);
                    }
                })?;
            }
            Step::Controller(event) => app.handle_controller_event(event),
            Step::Input(event) if event_utils::is_terminate_event(&event) => {
                log::info!("Quit key pressed, exiting application");
                app.should_quit = true;
            }
            Step::Input(event) => handle_input(app, event),
            Step::InputClosed => {
                log::warn!("Terminal input closed");
                app.should_quit = true;
            }
        }
    }

    Ok(())
}

fn restore_terminal<B>(terminal: &mut Terminal<CrosstermBackend<B>>) -> Result<()>
where
    B: io::Write,
{
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_logging(&args.log_file)?;
    log::info!("Application starting");

    let mut config = PlayerConfig::load(args.config.as_deref()).context("Failed to load config")?;
    args.apply(&mut config);
    let (width, height) = (config.widget_width, config.widget_height);

    let (mut controller, controller_events) =
        PlayerController::new(config).context("Invalid configuration")?;
    let engine = FfmpegWidget::new(width, height).context("Failed to start the video decoder")?;
    controller.mount(widget::shared(engine));
    let mut app = App::new(controller, controller_events);

    install_panic_hook();
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen, EnableMouseCapture) {
        let _ = disable_raw_mode();
        return Err(e).context("Failed to setup terminal");
    }
    let mut terminal = match Terminal::new(CrosstermBackend::new(stdout)) {
        Ok(terminal) => terminal,
        Err(e) => {
            let _ = disable_raw_mode();
            return Err(e).context("Failed to create terminal");
        }
    };
    log::debug!("Terminal setup complete");

    if args.autoplay {
        app.start_load();
    }

    let result = run(&mut terminal, &mut app).await;

    log::info!("Shutting down application");
    app.controller.unmount();

    if let Err(e) = restore_terminal(&mut terminal) {
        log::error!("Error during cleanup: {}", e);
        eprintln!("Error during cleanup: {}", e);
    }

    if let Err(e) = &result {
        log::error!("Main loop failed: {:#}", e);
    }
    result
}
