use anyhow::Result;
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use std::io;
use std::path::PathBuf;

mod config;
mod profile;
mod ui;
mod utils;

use crate::{
    profile::{load_profile, save_profile, Profile},
    ui::{ChatUI, ToastKind, UiCommand},
};
use lounge_chat::{
    directory::demo_directory,
    media::{FsSourceResolver, SimulatedCapture, TokioTicker},
    Collaborators, MediaKind, SessionManager,
};

/// Command line arguments for the lounge chat client
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Terminal chat client for the poker lounge.",
    long_about = "Terminal chat client for the poker lounge.\n\n\
    Conversations, voice notes and image attachments are kept in memory for the\n\
    length of the session.\n\
    Use -h or --help to see all options."
)]
struct Args {
    /// Directory for config.json, profile.json and the log file
    #[arg(long, value_name = "PATH")]
    config_dir: Option<PathBuf>,

    /// Sign in as this user instead of the cached profile
    #[arg(long, value_name = "NAME")]
    user: Option<String>,

    /// Log level (error, warn, info, debug, trace); overrides config.json
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<LevelFilter>,

    /// Behave as if microphone access was refused
    #[arg(long)]
    deny_microphone: bool,
}

/// Use the cached profile, or ask for a username and cache it
fn resolve_profile(dir: &std::path::Path, user: Option<String>) -> Result<Profile> {
    if let Some(name) = user {
        return Profile::new(&name);
    }

    if let Some(profile) = load_profile(dir)? {
        return Ok(profile);
    }

    eprintln!("Enter a username:");
    let profile = Profile::new(&utils::read_line()?)?;
    if let Err(e) = save_profile(dir, &profile) {
        eprintln!("Warning: Failed to save profile: {}", e);
    }
    Ok(profile)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(dir) = &args.config_dir {
        config::set_config_dir_override(dir.clone());
    }
    let config_dir = config::get_config_dir()?;
    let app_config = config::load_or_init(&config_dir)?;

    let log_path = app_config.log_path(&config_dir);
    let level = args.log_level.unwrap_or_else(|| app_config.log_level());
    utils::setup_logging(Some(&log_path), level)?;

    info!("Lounge chat starting up");
    info!("System information: {} {}", std::env::consts::OS, std::env::consts::ARCH);
    info!("Logging to file: {}", log_path.display());

    let profile = resolve_profile(&config_dir, args.user)?;

    let capture = if args.deny_microphone {
        SimulatedCapture::denying()
    } else {
        SimulatedCapture::granting()
    };
    let mut session = SessionManager::sign_in(
        profile.identity(),
        Collaborators {
            directory: Box::new(demo_directory(app_config.seed_demo_history)),
            capture: Box::new(capture),
            resolver: Box::new(FsSourceResolver),
            ticker: Box::new(TokioTicker::current()?),
        },
    )?;
    session.auto_select_first()?;

    let mut chat_ui = ChatUI::new();
    let mut terminal = ui::setup_terminal()?;

    let result = run_main_loop(
        &mut chat_ui,
        &mut terminal,
        &mut session,
        app_config.toast_seconds,
    )
    .await;

    // Always give the terminal back, even when the loop failed
    if let Err(e) = ui::restore_terminal(terminal) {
        error!("Failed to restore terminal: {}", e);
    }
    session.sign_out();

    if let Err(e) = &result {
        error!("Main loop failed: {}", e);
    }
    info!("Lounge chat shut down");
    result
}

/// Run the main event loop
async fn run_main_loop(
    chat_ui: &mut ChatUI,
    terminal: &mut ui::Terminal<ui::CrosstermBackend<io::Stdout>>,
    session: &mut SessionManager,
    toast_seconds: i64,
) -> Result<()> {
    loop {
        let view = session.view();
        chat_ui.sync(&view);
        terminal.draw(|f| chat_ui.draw(f, &view))?;

        chat_ui.clean_toasts(toast_seconds);

        let command = match chat_ui.handle_input()? {
            Some(command) => command,
            None => {
                // Give the recording ticker a chance to run
                tokio::task::yield_now().await;
                continue;
            }
        };

        let outcome = match command {
            UiCommand::Quit => {
                info!("Quit requested");
                return Ok(());
            }
            UiCommand::DraftChanged(text) => {
                session.update_draft_text(&text);
                Ok(())
            }
            UiCommand::SelectContact(id) => session.select_contact(&id),
            UiCommand::Send => session.send_message().map(|message| {
                info!("Message {} sent", message.id);
                chat_ui.clear_input();
                chat_ui.show_toast("Message sent", ToastKind::Success);
            }),
            UiCommand::AttachImage { source, text } => {
                // The /attach command itself is not part of the message
                session.update_draft_text(&text);
                session
                    .begin_attachment(MediaKind::Image, &source)
                    .map(|()| chat_ui.show_toast("Image attached", ToastKind::Info))
            }
            UiCommand::ToggleRecording => {
                if session.is_recording() {
                    session.stop_recording()
                } else {
                    session
                        .start_recording()
                        .map(|()| chat_ui.show_toast("Recording...", ToastKind::Info))
                }
            }
            UiCommand::CancelAttachment => {
                session.cancel_attachment();
                Ok(())
            }
        };

        if let Err(e) = outcome {
            warn!("Operation rejected: {}", e);
            chat_ui.show_toast(&e.to_string(), ToastKind::Error);
        }
    }
}
