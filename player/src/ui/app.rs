use super::PageLayout;
use crate::app::{App, Focus};
use crate::ui::components::*;
use blobplay_core::{MediaType, PlayerState};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
};

/// Draw the player page: video, seek bar and the control row
pub fn draw_player_page(f: &mut Frame, app: &App, layout: &PageLayout) {
    draw_video(f, app, layout.video);

    let status = app.controller.status();
    let paused = app
        .controller
        .widget()
        .is_none_or(|widget| widget.lock().paused());
    let seek_bar = SeekBarView::new(status.progress, status.duration_secs)
        .paused(paused)
        .title(Some(state_label(app.controller.state())));
    f.render_widget(seek_bar, layout.seek_bar);

    draw_url_input(f, app, layout.url);
    draw_media_type_selector(f, app, layout.media_type);

    let mounted = app.controller.widget().is_some();
    f.render_widget(
        Button::new("Play")
            .focused(app.focus == Focus::Play)
            .enabled(mounted),
        layout.play,
    );
    f.render_widget(
        Button::new("Toggle Pause")
            .focused(app.focus == Focus::Toggle)
            .enabled(mounted),
        layout.toggle,
    );
}

fn state_label(state: PlayerState) -> &'static str {
    match state {
        PlayerState::Uninitialized => "Starting",
        PlayerState::Idle => "Idle",
        PlayerState::Loading => "Loading",
        PlayerState::Playing => "Playing",
        PlayerState::Paused => "Paused",
    }
}

fn draw_video(f: &mut Frame, app: &App, area: Rect) {
    if app.controller.is_loading() {
        let elapsed_ms = app
            .load_started
            .map_or(0, |started| started.elapsed().as_millis());
        let spinner = get_spinner_frame(elapsed_ms);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(45),
                Constraint::Length(1),
                Constraint::Percentage(45),
            ])
            .split(area);

        f.render_widget(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .style(Style::default().bg(Color::Black)),
            area,
        );
        f.render_widget(
            Paragraph::new(Text::from(format!("{} Downloading media, please wait... {}", spinner, spinner)))
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            rows[1],
        );
        return;
    }

    match app.controller.widget() {
        Some(widget) => {
            let widget = widget.lock();
            f.render_widget(VideoView::new(widget.current_frame()), area);
        }
        None => f.render_widget(VideoView::new(None).placeholder("Player not ready"), area),
    }
}

fn draw_url_input(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Url;
    let border = if focused { Color::Yellow } else { Color::White };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(" URL ");
    let inner = block.inner(area);

    let url = &app.controller.source().url;
    let cursor = app.input_cursor.min(url.chars().count());
    let visible = inner.width.saturating_sub(1) as usize;
    let skip = url_scroll(cursor, inner.width);
    let shown: String = url.chars().skip(skip).take(visible.max(1)).collect();

    f.render_widget(Paragraph::new(Text::from(shown)).block(block), area);

    if focused && !app.is_command_mode() {
        f.set_cursor_position(((inner.x + (cursor - skip) as u16).min(inner.right()), inner.y));
    }
}

/// Characters scrolled off the left of a URL field `inner_width` cells wide,
/// keeping the cursor visible
pub fn url_scroll(cursor: usize, inner_width: u16) -> usize {
    cursor.saturating_sub(inner_width.saturating_sub(1) as usize)
}

fn draw_media_type_selector(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::MediaType;
    let selected = app.controller.source().media_type;

    let spans: Vec<Span> = MediaType::ALL
        .iter()
        .flat_map(|media_type| {
            let mut style = if media_type.is_supported() {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            if *media_type == selected {
                style = style.add_modifier(Modifier::REVERSED);
            }
            [Span::styled(format!(" {} ", media_type), style), Span::raw(" ")]
        })
        .collect();

    let title = if selected.is_supported() {
        " Type ◀▶ ".to_string()
    } else {
        " Type (unsupported) ".to_string()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Yellow } else { Color::White }))
        .title(title);

    f.render_widget(
        Paragraph::new(Line::from(spans))
            .alignment(Alignment::Center)
            .block(block),
        area,
    );
}

/// Command prompt shown in place of the status line
pub fn draw_command_prompt(f: &mut Frame, command: &str, area: Rect) {
    let prompt = Paragraph::new(Line::from(vec![
        Span::styled(":", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::raw(command),
    ]))
    .style(Style::default().bg(Color::DarkGray));

    f.render_widget(Clear, area);
    f.render_widget(prompt, area);
    f.set_cursor_position((area.x + 1 + command.chars().count() as u16, area.y));
}

pub fn draw_help_dialog(f: &mut Frame) {
    let area = centered_rect(60, 60, f.area());
    f.render_widget(HelpOverlay, area);
}

/// Rectangle of the given percentage size centered in `r`
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
