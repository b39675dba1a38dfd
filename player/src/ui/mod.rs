pub mod app;
pub mod components;

pub use components::*;

use crate::app::App;
use anyhow::Result;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
};

/// Screen regions of the player page, kept for mouse hit-testing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    pub video: Rect,
    pub seek_bar: Rect,
    pub url: Rect,
    pub media_type: Rect,
    pub play: Rect,
    pub toggle: Rect,
    pub status: Rect,
}

impl PageLayout {
    pub fn new(area: Rect) -> Self {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(6),    // Video
                Constraint::Length(3), // Seek bar
                Constraint::Length(3), // URL, type, buttons
                Constraint::Length(1), // Status line
            ])
            .split(area);

        let controls = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Min(20),
                Constraint::Length(22),
                Constraint::Length(10),
                Constraint::Length(16),
            ])
            .split(rows[2]);

        Self {
            video: rows[0],
            seek_bar: rows[1],
            url: controls[0],
            media_type: controls[1],
            play: controls[2],
            toggle: controls[3],
            status: rows[3],
        }
    }

    /// Columns of the seek bar's fill, inside its border
    pub fn seek_track(&self) -> Rect {
        Rect {
            x: self.seek_bar.x.saturating_add(1),
            y: self.seek_bar.y,
            width: self.seek_bar.width.saturating_sub(2),
            height: self.seek_bar.height,
        }
    }
}

/// Whether a terminal cell lies inside `rect`
pub fn contains(rect: Rect, column: u16, row: u16) -> bool {
    column >= rect.x && column < rect.x + rect.width && row >= rect.y && row < rect.y + rect.height
}

/// Draw the main UI
pub fn draw_ui(f: &mut Frame, app: &mut App) -> Result<()> {
    let layout = PageLayout::new(f.area());
    app.layout = Some(layout);

    app::draw_player_page(f, app, &layout);

    if app.is_command_mode() {
        app::draw_command_prompt(f, app.get_command_buffer(), layout.status);
    } else if let Some((msg, time, color)) = &app.status_message {
        f.render_widget(StatusMessage::new(msg, *color, time.elapsed()), layout.status);
    }

    if app.show_help {
        app::draw_help_dialog(f);
    }

    Ok(())
}
