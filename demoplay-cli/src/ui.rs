use demoplay_lib::visualizer::{ParentLayout, Rgb, SharedStage, Surface};
use log::Level;
use ratatui::{
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Terminal,
};

use crate::controls::StatusSnapshot;
use crate::logging::{LogLine, LogSource};

const TITLE: &str = "demoplay";
const CONTROLS: &str =
    "space=play/pause  ←/→=seek 5s  ↑/↓=volume  m=mute  v=visualizer  n=next  q=quit";

/// Draws a [`Surface`] with one half-block glyph per two pixel rows.
pub struct SurfaceWidget<'a> {
    surface: &'a Surface,
}

impl<'a> SurfaceWidget<'a> {
    pub fn new(surface: &'a Surface) -> Self {
        Self { surface }
    }
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

impl Widget for SurfaceWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for row in 0..area.height {
            for col in 0..area.width {
                let x = col as usize;
                let upper = self
                    .surface
                    .get(x, row as usize * 2)
                    .unwrap_or(Rgb::BLACK);
                let lower = self
                    .surface
                    .get(x, row as usize * 2 + 1)
                    .unwrap_or(Rgb::BLACK);
                buf.get_mut(area.x + col, area.y + row)
                    .set_char('▀')
                    .set_fg(to_color(upper))
                    .set_bg(to_color(lower));
            }
        }
    }
}

/// Pixel layout for a visualizer panel: half-block cells are two pixels tall.
pub fn panel_layout(inner: Rect) -> ParentLayout {
    ParentLayout::new(inner.width as f32, inner.height as f32 * 2.0)
}

pub fn level_color(level: Level) -> Color {
    match level {
        Level::Error => Color::Red,
        Level::Warn => Color::Yellow,
        Level::Info => Color::Gray,
        Level::Debug | Level::Trace => Color::DarkGray,
    }
}

fn log_line(line: &LogLine) -> Line<'static> {
    let source_style = match line.source {
        LogSource::Backend => Style::default().fg(Color::Magenta),
        _ => Style::default().fg(Color::Cyan),
    };
    Line::from(vec![
        Span::styled(
            format!("{:<5} ", line.level),
            Style::default().fg(level_color(line.level)),
        ),
        Span::styled(format!("{:<10} ", line.source.label()), source_style),
        Span::raw(line.message.clone()),
    ])
}

pub fn draw_status(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    status: &StatusSnapshot,
    stage: &SharedStage,
    log_lines: &[LogLine],
) {
    let _ = terminal.draw(|f| {
        let status_height = status.text.lines().count() as u16 + 2;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Length(status_height),
                Constraint::Min(6),
                Constraint::Length(6),
            ])
            .split(f.size());

        let title = Paragraph::new(TITLE).style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
        f.render_widget(title, chunks[0]);

        let controls = Paragraph::new(CONTROLS)
            .style(Style::default().fg(Color::Blue))
            .block(Block::default().borders(Borders::ALL).title("Controls"));
        f.render_widget(controls, chunks[1]);

        let status_widget = Paragraph::new(status.text.as_str())
            .style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .block(Block::default().borders(Borders::ALL).title("Playback"));
        f.render_widget(status_widget, chunks[2]);

        let mut stage = stage.lock().unwrap();
        let frame_block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Visualizer: {}", stage.kind()));
        let inner = frame_block.inner(chunks[3]);
        f.render_widget(frame_block, chunks[3]);
        stage.set_parent_layout(panel_layout(inner));
        f.render_widget(SurfaceWidget::new(stage.surface()), inner);
        drop(stage);

        let log_height = chunks[4].height.saturating_sub(2) as usize;
        let start = log_lines.len().saturating_sub(log_height);
        let log_text: Vec<Line> = if log_lines.is_empty() {
            vec![Line::from("No logs yet.")]
        } else {
            log_lines[start..].iter().map(log_line).collect()
        };
        let log_widget = Paragraph::new(log_text)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title("Logs"));
        f.render_widget(log_widget, chunks[4]);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_blocks_carry_two_pixel_rows() {
        let mut surface = Surface::new(2, 4);
        surface.set(0, 0, Rgb::new(255, 0, 0));
        surface.set(0, 1, Rgb::new(0, 0, 255));
        let area = Rect::new(0, 0, 2, 2);
        let mut buf = Buffer::empty(area);
        SurfaceWidget::new(&surface).render(area, &mut buf);

        let cell = buf.get(0, 0);
        assert_eq!(cell.symbol(), "▀");
        assert_eq!(cell.fg, Color::Rgb(255, 0, 0));
        assert_eq!(cell.bg, Color::Rgb(0, 0, 255));
        assert_eq!(buf.get(1, 1).fg, Color::Rgb(0, 0, 0));
    }

    #[test]
    fn panel_layout_doubles_rows() {
        let layout = panel_layout(Rect::new(3, 4, 40, 10));
        assert_eq!(layout.pixel_size(), (40, 20));
    }

    #[test]
    fn backend_errors_stand_out_in_the_log() {
        let line = log_line(&LogLine {
            level: Level::Error,
            source: LogSource::Backend,
            message: "ALSA write failed".to_string(),
        });
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[0].style.fg, Some(Color::Red));
        assert_eq!(line.spans[1].style.fg, Some(Color::Magenta));
        assert_eq!(line.spans[1].content.trim_end(), "backend");
        assert_eq!(line.spans[2].content, "ALSA write failed");
    }
}
