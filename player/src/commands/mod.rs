use anyhow::{Result, anyhow};
use blobplay_core::MediaType;
use ratatui::style::Color;

use crate::app::App;

/// Command handler for the application
pub struct CommandHandler;

impl CommandHandler {
    /// Parse and execute a command
    pub fn execute(app: &mut App, command_str: &str) -> Result<()> {
        let parts: Vec<&str> = command_str.trim().splitn(2, ' ').collect();
        let cmd = parts[0].to_lowercase();
        let args = parts.get(1).map(|s| s.trim()).filter(|s| !s.is_empty());

        match cmd.as_str() {
            "open" | "o" => {
                let Some(url) = args else {
                    return Err(anyhow!("Open command requires a URL argument"));
                };
                app.set_url(url.to_string());
                app.start_load();
            }
            "type" | "ty" => {
                let Some(args) = args else {
                    return Err(anyhow!(
                        "Type command requires one of: {}",
                        MediaType::ALL.map(|t| t.as_str()).join(", ")
                    ));
                };
                let media_type = args.parse::<MediaType>().map_err(|e| anyhow!(e))?;
                app.controller.set_media_type(media_type);
                app.set_status(format!("Media type set to {}", media_type), Color::Green);
            }
            "play" | "p" => app.start_load(),
            "toggle" | "t" | "pause" => app.toggle_pause(),
            "seek" | "s" => {
                let Some(args) = args else {
                    return Err(anyhow!("Seek command requires a position argument"));
                };
                let position = args
                    .parse::<f64>()
                    .map_err(|_| anyhow!("Invalid position: {}", args))?;
                app.controller.seek_to(position)?;
            }
            "help" | "h" | "?" => app.show_help = true,
            "quit" | "exit" | "q" => app.should_quit = true,
            "" => {
                // Empty command, do nothing
            }
            _ => return Err(anyhow!("Unknown command: {}", cmd)),
        }

        Ok(())
    }
}

/// Handle a command string entered by the user
pub fn handle_command(app: &mut App, command: &str) -> Result<()> {
    log::debug!("Executing command: {}", command);
    CommandHandler::execute(app, command)
}
