use blobplay_core::VideoFrame;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Widget, Wrap},
};
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

/// Format duration as HH:MM:SS
pub fn format_duration(duration: f64) -> String {
    let total_seconds = if duration.is_finite() && duration > 0.0 {
        duration.round() as u64
    } else {
        0
    };
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Clickable seek bar: a gauge whose fill is the progress fraction
pub struct SeekBarView<'a> {
    progress: f64,
    duration_secs: u64,
    is_paused: bool,
    title: Option<&'a str>,
}

impl<'a> SeekBarView<'a> {
    pub fn new(progress: f64, duration_secs: u64) -> Self {
        Self {
            progress,
            duration_secs,
            is_paused: true,
            title: None,
        }
    }

    pub fn paused(mut self, is_paused: bool) -> Self {
        self.is_paused = is_paused;
        self
    }

    pub fn title(mut self, title: Option<&'a str>) -> Self {
        self.title = title;
        self
    }
}

impl Widget for SeekBarView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let ratio = if self.progress.is_finite() {
            self.progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let duration = self.duration_secs as f64;
        let label = format!(
            "{} / {}",
            format_duration(ratio * duration),
            format_duration(duration)
        );

        let display_title = match (self.is_paused, self.title) {
            (true, Some(title)) => format!("⏸  {} ", title),
            (false, Some(title)) => format!("▶  {} ", title),
            (true, None) => "⏸  Paused ".to_string(),
            (false, None) => "▶  Playing ".to_string(),
        };

        Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(display_title))
            .gauge_style(
                Style::default()
                    .fg(Color::Blue)
                    .bg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            )
            .ratio(ratio)
            .label(label)
            .render(area, buf);
    }
}

/// Paints a video frame with half blocks: one cell holds two stacked pixels
pub struct VideoView<'a> {
    frame: Option<&'a VideoFrame>,
    placeholder: &'a str,
}

impl<'a> VideoView<'a> {
    pub fn new(frame: Option<&'a VideoFrame>) -> Self {
        Self {
            frame,
            placeholder: "No media loaded",
        }
    }

    pub fn placeholder(mut self, text: &'a str) -> Self {
        self.placeholder = text;
        self
    }
}

impl Widget for VideoView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .style(Style::default().bg(Color::Black));
        let inner = block.inner(area);
        block.render(area, buf);

        let Some(frame) = self.frame else {
            Paragraph::new(Text::from(self.placeholder))
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray))
                .render(inner, buf);
            return;
        };
        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let fitted = frame.fit_within(inner.width as u32, inner.height as u32 * 2);
        let img = fitted.image.to_rgba8();
        let width = img.width().min(inner.width as u32);
        let rows = img.height().div_ceil(2).min(inner.height as u32);

        // Center the picture inside the view
        let x0 = inner.x + (inner.width - width as u16) / 2;
        let y0 = inner.y + (inner.height - rows as u16) / 2;

        for y in 0..rows {
            for x in 0..width {
                let top = img.get_pixel(x, y * 2).0;
                let bottom = if y * 2 + 1 < img.height() {
                    img.get_pixel(x, y * 2 + 1).0
                } else {
                    [0, 0, 0, 255]
                };

                buf[(x0 + x as u16, y0 + y as u16)]
                    .set_symbol("▀")
                    .set_fg(Color::Rgb(top[0], top[1], top[2]))
                    .set_bg(Color::Rgb(bottom[0], bottom[1], bottom[2]));
            }
        }
    }
}

/// Bordered push button
pub struct Button<'a> {
    label: &'a str,
    focused: bool,
    enabled: bool,
}

impl<'a> Button<'a> {
    pub fn new(label: &'a str) -> Self {
        Self {
            label,
            focused: false,
            enabled: true,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Widget for Button<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = if !self.enabled {
            Style::default().fg(Color::DarkGray)
        } else if self.focused {
            Style::default()
                .fg(Color::White)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };

        Paragraph::new(Line::from(Span::styled(self.label, style)))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(if self.focused { style } else { Style::default() }),
            )
            .render(area, buf);
    }
}

/// How long a non-error status message stays visible
const STATUS_MAX_AGE: Duration = Duration::from_secs(4);

/// Display a status message with fade effect
pub struct StatusMessage<'a> {
    message: &'a str,
    color: Color,
    age: Duration,
}

impl<'a> StatusMessage<'a> {
    pub fn new(message: &'a str, color: Color, age: Duration) -> Self {
        Self { message, color, age }
    }
}

impl Widget for StatusMessage<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Errors stay until replaced
        if self.color != Color::Red && self.age > STATUS_MAX_AGE {
            return;
        }

        let fade = 1.0 - (self.age.as_secs_f32() / STATUS_MAX_AGE.as_secs_f32());
        let color = match (self.color, fade) {
            (Color::Red, _) => Color::Red,
            (_, f) if f > 0.5 => self.color,
            _ => Color::DarkGray,
        };

        let width = (self.message.width() as u16).min(area.width);
        let line_area = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y,
            width,
            height: area.height.min(1),
        };

        Paragraph::new(Text::from(self.message))
            .style(Style::default().fg(color))
            .render(line_area, buf);
    }
}

/// Simple help overlay widget
pub struct HelpOverlay;

impl Widget for HelpOverlay {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let key = |k: &'static str, text: &'static str| {
            Line::from(vec![
                Span::styled(k, Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(text),
            ])
        };

        let help_text = vec![
            Line::from(Span::styled(
                "Keyboard Controls",
                Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            )),
            Line::from(""),
            key("Tab / Shift+Tab", " - Move focus"),
            key("Enter", " - Download and play the URL"),
            key("Space", " - Toggle pause (outside the URL field)"),
            key("←/→", " - Change media type when the selector is focused"),
            key("Click seek bar", " - Jump to that position"),
            key(":", " - Command mode (open, type, play, toggle, seek, quit)"),
            key("F1", " - Toggle help"),
            key("Ctrl+Q / Ctrl+C", " - Quit"),
        ];

        Clear.render(area, buf);
        Paragraph::new(Text::from(help_text))
            .block(Block::default().title("Help").borders(Borders::ALL))
            .style(Style::default().fg(Color::White).bg(Color::Black))
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true })
            .render(area, buf);
    }
}

/// Get a spinner frame for loading animations
pub fn get_spinner_frame(duration_ms: u128) -> &'static str {
    const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"];
    let frame_idx = (duration_ms / 80) % SPINNER_FRAMES.len() as u128;
    SPINNER_FRAMES[frame_idx as usize]
}
