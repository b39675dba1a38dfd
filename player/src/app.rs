use std::time::Instant;

use anyhow::Result;
use blobplay_core::{ControllerEvent, PlayerController, PlayerError, SeekBar};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::style::Color;
use tokio::sync::mpsc;

use crate::ui::{self, PageLayout};

/// Focusable controls, in Tab order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Url,
    MediaType,
    Play,
    Toggle,
}

impl Focus {
    const ORDER: [Focus; 4] = [Focus::Url, Focus::MediaType, Focus::Play, Focus::Toggle];

    pub fn next(self) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(idx + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(idx + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

// App state
pub struct App {
    /// Playback controller owning the widget
    pub controller: PlayerController,
    /// Outcomes of background loads
    pub controller_events: mpsc::UnboundedReceiver<ControllerEvent>,
    /// Cursor position in the URL field, in characters
    pub input_cursor: usize,
    /// Focused control
    pub focus: Focus,
    /// Regions of the last drawn frame
    pub layout: Option<PageLayout>,
    /// When the current load started, for the spinner
    pub load_started: Option<Instant>,
    /// Status message to display
    pub status_message: Option<(String, Instant, Color)>,
    /// Whether the app should exit
    pub should_quit: bool,
    /// Help dialog visibility
    pub show_help: bool,
    /// Whether command mode is active
    pub command_mode: bool,
    /// Command buffer for command mode
    pub command_buffer: String,
}

impl App {
    pub fn new(
        controller: PlayerController,
        controller_events: mpsc::UnboundedReceiver<ControllerEvent>,
    ) -> Self {
        let input_cursor = controller.source().url.chars().count();
        Self {
            controller,
            controller_events,
            input_cursor,
            focus: Focus::Url,
            layout: None,
            load_started: None,
            status_message: None,
            should_quit: false,
            show_help: false,
            command_mode: false,
            command_buffer: String::new(),
        }
    }

    /// Set a status message with a color
    pub fn set_status(&mut self, message: impl Into<String>, color: Color) {
        let message_string = message.into();
        log::debug!("Status message: {} ({})", message_string, color);
        self.status_message = Some((message_string, Instant::now(), color));
    }

    /// Trigger the load pipeline for the current URL and media type
    pub fn start_load(&mut self) {
        match self.controller.play() {
            Ok(()) if self.controller.is_loading() => {
                self.load_started = Some(Instant::now());
                self.set_status("Downloading...", Color::Yellow);
            }
            Ok(()) => self.set_status("Player is not ready yet", Color::Yellow),
            Err(PlayerError::UnsupportedMediaType(media_type)) => {
                self.set_status(
                    format!("{} playback is not supported, select mp4", media_type),
                    Color::Red,
                );
            }
            Err(e) => self.set_status(format!("Error: {}", e), Color::Red),
        }
    }

    pub fn toggle_pause(&mut self) {
        if let Err(e) = self.controller.toggle() {
            // Engine errors are also logged by the widget watcher
            log::warn!("Toggle failed: {}", e);
        }
    }

    /// Apply an outcome reported by the controller
    pub fn handle_controller_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::LoadStarted { url } => log::debug!("Load started: {}", url),
            ControllerEvent::Downloaded { bytes } => {
                self.set_status(format!("Downloaded {} KiB, preparing playback...", bytes / 1024), Color::Yellow);
            }
            ControllerEvent::Ready { duration_secs } => {
                self.load_started = None;
                self.set_status(
                    format!("Playing ({})", ui::format_duration(duration_secs as f64)),
                    Color::Green,
                );
            }
            ControllerEvent::LoadFailed(e) => {
                self.load_started = None;
                self.set_status(format!("Load failed: {}", e), Color::Red);
            }
        }
    }

    /// Advance the widget clock
    pub fn update(&mut self) {
        if let Some(widget) = self.controller.widget() {
            if let Err(e) = widget.lock().tick() {
                log::debug!("Widget tick failed: {}", e);
            }
        }
    }

    /// Handle key event
    pub fn handle_key_event(&mut self, key: KeyEvent) -> Result<()> {
        if self.is_command_mode() {
            match key.code {
                KeyCode::Char(c) => self.add_to_command_buffer(c),
                KeyCode::Backspace => self.remove_from_command_buffer(),
                KeyCode::Esc => self.exit_command_mode(),
                _ => {}
            }
            return Ok(());
        }

        match key.code {
            KeyCode::F(1) => {
                self.show_help = !self.show_help;
                return Ok(());
            }
            KeyCode::Esc if self.show_help => {
                self.show_help = false;
                return Ok(());
            }
            KeyCode::Tab => {
                self.focus = self.focus.next();
                return Ok(());
            }
            KeyCode::BackTab => {
                self.focus = self.focus.prev();
                return Ok(());
            }
            _ => {}
        }

        match self.focus {
            Focus::Url => self.handle_url_key(key),
            Focus::MediaType => match key.code {
                KeyCode::Left | KeyCode::Up => self.select_media_type(false),
                KeyCode::Right | KeyCode::Down => self.select_media_type(true),
                KeyCode::Enter => self.start_load(),
                KeyCode::Char(' ') => self.toggle_pause(),
                _ => {}
            },
            Focus::Play => match key.code {
                KeyCode::Enter | KeyCode::Char(' ') => self.start_load(),
                _ => {}
            },
            Focus::Toggle => match key.code {
                KeyCode::Enter | KeyCode::Char(' ') => self.toggle_pause(),
                _ => {}
            },
        }

        Ok(())
    }

    fn handle_url_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if key.code == KeyCode::Char('u') {
                self.set_url(String::new());
            }
            return;
        }

        match key.code {
            KeyCode::Char(c) => self.insert_char(c),
            KeyCode::Backspace => self.delete_char_before_cursor(),
            KeyCode::Delete => self.delete_char_at_cursor(),
            KeyCode::Left => self.input_cursor = self.input_cursor.saturating_sub(1),
            KeyCode::Right => {
                self.input_cursor = (self.input_cursor + 1).min(self.url_len());
            }
            KeyCode::Home => self.input_cursor = 0,
            KeyCode::End => self.input_cursor = self.url_len(),
            KeyCode::Enter => self.start_load(),
            _ => {}
        }
    }

    fn select_media_type(&mut self, forward: bool) {
        let current = self.controller.source().media_type;
        let next = if forward { current.next() } else { current.prev() };
        self.controller.set_media_type(next);
        log::debug!("Media type set to {}", next);
    }

    fn url_len(&self) -> usize {
        self.controller.source().url.chars().count()
    }

    /// Replace the URL and move the cursor to its end
    pub fn set_url(&mut self, url: String) {
        self.input_cursor = url.chars().count();
        self.controller.set_url(url);
    }

    fn byte_offset(url: &str, char_idx: usize) -> usize {
        url.char_indices().nth(char_idx).map_or(url.len(), |(i, _)| i)
    }

    fn insert_char(&mut self, c: char) {
        let mut url = self.controller.source().url.clone();
        let at = Self::byte_offset(&url, self.input_cursor);
        url.insert(at, c);
        self.controller.set_url(url);
        self.input_cursor += 1;
    }

    fn delete_char_before_cursor(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        let mut url = self.controller.source().url.clone();
        let at = Self::byte_offset(&url, self.input_cursor - 1);
        url.remove(at);
        self.controller.set_url(url);
        self.input_cursor -= 1;
    }

    fn delete_char_at_cursor(&mut self) {
        let mut url = self.controller.source().url.clone();
        if self.input_cursor >= url.chars().count() {
            return;
        }
        let at = Self::byte_offset(&url, self.input_cursor);
        url.remove(at);
        self.controller.set_url(url);
    }

    /// Handle mouse event against the last drawn layout
    pub fn handle_mouse_event(&mut self, mouse: MouseEvent) -> Result<()> {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return Ok(());
        }
        let Some(layout) = self.layout else {
            return Ok(());
        };
        let (column, row) = (mouse.column, mouse.row);

        if ui::contains(layout.seek_bar, column, row) {
            let track = layout.seek_track();
            let bar = SeekBar::new(track.x as f64, track.width as f64);
            match self.controller.seek_click(column as f64, bar) {
                Ok(Some(target)) => log::debug!("Seek to {:.2}s", target),
                Ok(None) => {}
                Err(e) => log::warn!("Seek failed: {}", e),
            }
        } else if ui::contains(layout.play, column, row) {
            self.focus = Focus::Play;
            self.start_load();
        } else if ui::contains(layout.toggle, column, row) {
            self.focus = Focus::Toggle;
            self.toggle_pause();
        } else if ui::contains(layout.media_type, column, row) {
            self.focus = Focus::MediaType;
            self.select_media_type(true);
        } else if ui::contains(layout.url, column, row) {
            self.focus = Focus::Url;
            // The field may be scrolled to keep the cursor visible
            let inner_x = layout.url.x + 1;
            let cursor = self.input_cursor.min(self.url_len());
            let skip = ui::app::url_scroll(cursor, layout.url.width.saturating_sub(2));
            let clicked = skip + column.saturating_sub(inner_x) as usize;
            self.input_cursor = clicked.min(self.url_len());
        }

        Ok(())
    }

    pub fn is_command_mode(&self) -> bool {
        self.command_mode
    }

    pub fn enter_command_mode(&mut self) {
        self.command_mode = true;
        self.command_buffer.clear();
    }

    pub fn exit_command_mode(&mut self) {
        self.command_mode = false;
    }

    pub fn get_command_buffer(&self) -> &str {
        &self.command_buffer
    }

    fn add_to_command_buffer(&mut self, c: char) {
        self.command_buffer.push(c);
    }

    fn remove_from_command_buffer(&mut self) {
        if self.command_buffer.pop().is_none() {
            self.exit_command_mode();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobplay_core::{MediaType, PlayerConfig};
    use crossterm::event::KeyEventKind;
    use ratatui::layout::Rect;

    fn app() -> App {
        let (controller, events) = PlayerController::new(PlayerConfig::default()).unwrap();
        App::new(controller, events)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, KeyEventKind::Press)
    }

    fn click(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[tokio::test]
    async fn test_typing_edits_url_at_cursor() {
        let mut app = app();
        app.set_url("http://host/a.mp4".to_string());
        app.handle_key_event(key(KeyCode::Home)).unwrap();
        app.handle_key_event(key(KeyCode::Delete)).unwrap();
        app.handle_key_event(key(KeyCode::Char('H'))).unwrap();
        assert_eq!(app.controller.source().url, "Http://host/a.mp4");

        app.handle_key_event(key(KeyCode::End)).unwrap();
        app.handle_key_event(key(KeyCode::Backspace)).unwrap();
        assert_eq!(app.controller.source().url, "Http://host/a.mp");
        assert_eq!(app.input_cursor, 16);
    }

    #[tokio::test]
    async fn test_tab_cycles_focus_and_selector_changes_type() {
        let mut app = app();
        app.handle_key_event(key(KeyCode::Tab)).unwrap();
        assert_eq!(app.focus, Focus::MediaType);

        app.handle_key_event(key(KeyCode::Right)).unwrap();
        assert_eq!(app.controller.source().media_type, MediaType::M3u8);

        app.handle_key_event(key(KeyCode::BackTab)).unwrap();
        assert_eq!(app.focus, Focus::Url);
    }

    #[tokio::test]
    async fn test_play_before_mount_reports_not_ready() {
        let mut app = app();
        app.start_load();
        let (message, _, color) = app.status_message.clone().unwrap();
        assert_eq!(message, "Player is not ready yet");
        assert_eq!(color, Color::Yellow);
    }

    #[tokio::test]
    async fn test_command_mode_buffer() {
        let mut app = app();
        app.enter_command_mode();
        app.handle_key_event(key(KeyCode::Char('p'))).unwrap();
        assert_eq!(app.get_command_buffer(), "p");
        app.handle_key_event(key(KeyCode::Backspace)).unwrap();
        app.handle_key_event(key(KeyCode::Backspace)).unwrap();
        assert!(!app.is_command_mode());
    }

    #[tokio::test]
    async fn test_load_failure_is_shown() {
        let mut app = app();
        app.load_started = Some(Instant::now());
        app.handle_controller_event(ControllerEvent::LoadFailed(PlayerError::Network {
            status: 404,
            status_text: "Not Found".into(),
        }));

        let (message, _, color) = app.status_message.clone().unwrap();
        assert!(message.contains("404"));
        assert_eq!(color, Color::Red);
        assert!(app.load_started.is_none());
    }

    #[tokio::test]
    async fn test_click_in_scrolled_url_lands_on_visible_character() {
        let mut app = app();
        let layout = PageLayout::new(Rect::new(0, 0, 80, 24));
        app.layout = Some(layout);
        let url = format!("http://media.example/{}.mp4", "a".repeat(60));
        app.set_url(url.clone());
        assert_eq!(app.input_cursor, url.chars().count());

        // The field shows the tail of the URL; click its sixth visible cell
        let skip = ui::app::url_scroll(app.input_cursor, layout.url.width - 2);
        assert!(skip > 0);
        app.handle_mouse_event(click(layout.url.x + 1 + 5, layout.url.y + 1)).unwrap();

        assert_eq!(app.focus, Focus::Url);
        assert_eq!(app.input_cursor, skip + 5);
    }

    #[tokio::test]
    async fn test_click_in_short_url_maps_directly() {
        let mut app = app();
        let layout = PageLayout::new(Rect::new(0, 0, 80, 24));
        app.layout = Some(layout);
        app.set_url("http://h/a.mp4".to_string());

        app.handle_mouse_event(click(layout.url.x + 1 + 3, layout.url.y + 1)).unwrap();
        assert_eq!(app.input_cursor, 3);

        app.handle_mouse_event(click(layout.url.x + layout.url.width - 2, layout.url.y + 1)).unwrap();
        assert_eq!(app.input_cursor, 14);
    }
}
