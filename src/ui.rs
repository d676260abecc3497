use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use flashgrid::board::{BoardRenderer, Grid, Tile, TileId};

use crate::{key_for_tile, App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

pub fn draw(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

fn sections(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(3), // status
            Constraint::Min(4),    // board
            Constraint::Length(2), // help + notice
        ])
        .split(area)
}

/// Part of the terminal the tiles are drawn into.
pub fn board_area(area: Rect) -> Rect {
    sections(area)[1]
}

/// Row-major tile rectangles, centered in `board`, with a one-cell gutter.
pub fn tile_rects(board: Rect, grid: &Grid) -> Vec<Rect> {
    let (cols, rows) = (grid.cols(), grid.rows());
    if cols == 0 || rows == 0 {
        return Vec::new();
    }

    let cell_w = board.width / cols;
    let cell_h = board.height / rows;
    let x0 = board.x + (board.width - cell_w * cols) / 2;
    let y0 = board.y + (board.height - cell_h * rows) / 2;

    (0..rows)
        .flat_map(|row| {
            (0..cols).map(move |col| {
                Rect::new(
                    x0 + col * cell_w,
                    y0 + row * cell_h,
                    cell_w.saturating_sub(1),
                    cell_h.saturating_sub(1),
                )
            })
        })
        .collect()
}

/// Tile under a terminal cell, for mouse and touch input.
pub fn tile_at(area: Rect, grid: &Grid, column: u16, row: u16) -> Option<TileId> {
    let pos = Position::new(column, row);
    tile_rects(board_area(area), grid)
        .iter()
        .position(|r| r.contains(pos))
        .map(TileId)
}

fn tile_style(tile: Tile) -> (Style, &'static str) {
    if tile.is_error {
        (Style::default().bg(Color::Red).fg(Color::White), "✗")
    } else if tile.is_target {
        (
            Style::default()
                .bg(Color::Yellow)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
            "",
        )
    } else if tile.is_resolved {
        (
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::DIM),
            "✓",
        )
    } else {
        (Style::default().add_modifier(Modifier::DIM), "")
    }
}

fn render_board(grid: &Grid, area: Rect, buf: &mut Buffer) {
    for (idx, rect) in tile_rects(area, grid).into_iter().enumerate() {
        if rect.width < 2 || rect.height < 2 {
            continue;
        }
        let Some(tile) = grid.tile(TileId(idx)) else {
            continue;
        };
        let col = idx as u16 % grid.cols();
        let row = idx as u16 / grid.cols();

        let (style, mark) = tile_style(tile);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .style(style);
        let inner = block.inner(rect);
        block.render(rect, buf);

        let label = match key_for_tile(col, row) {
            Some(k) if mark.is_empty() => k.to_string(),
            _ => mark.to_string(),
        };
        if inner.height > 0 {
            let middle = Rect::new(inner.x, inner.y + inner.height / 2, inner.width, 1);
            Paragraph::new(label)
                .alignment(Alignment::Center)
                .style(style)
                .render(middle, buf);
        }
    }
}

fn status_line(app: &App) -> Line<'static> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);
    let settings = &app.settings;

    match app.state {
        AppState::Playing => {
            let ctl = &app.controller;
            Line::from(vec![
                Span::styled("Score ", dim),
                Span::styled(ctl.score().to_string(), bold.fg(Color::Green)),
                Span::raw("   "),
                Span::styled(format!("{} ", ctl.config().mode.clock_label()), dim),
                Span::styled(format!("{}s", ctl.clock_seconds()), bold),
                Span::raw("   "),
                Span::styled(
                    match ctl.config().mode {
                        flashgrid::GameMode::ScoreTarget => {
                            format!("target {}", ctl.config().target_score)
                        }
                        flashgrid::GameMode::TimeLimit => {
                            format!("of {}s", ctl.config().duration_secs)
                        }
                    },
                    dim,
                ),
            ])
        }
        AppState::Setup | AppState::Summary => Line::from(vec![
            Span::styled("Mode ", dim),
            Span::styled(settings.mode.to_string(), bold),
            Span::raw("   "),
            Span::styled("Time ", dim),
            Span::styled(format!("{}s", settings.duration_secs), bold),
            Span::raw("   "),
            Span::styled("Target ", dim),
            Span::styled(settings.target_score.to_string(), bold),
            Span::raw("   "),
            Span::styled("Grid ", dim),
            Span::styled(
                format!(
                    "{}×{}",
                    app.controller.board().cols(),
                    app.controller.board().rows()
                ),
                bold,
            ),
            Span::raw("   "),
            Span::styled("Sound ", dim),
            Span::styled(if settings.sound { "on" } else { "off" }, bold),
        ]),
    }
}

fn help_line(app: &App) -> Line<'static> {
    let text = match app.state {
        AppState::Setup => {
            "enter start · m mode · ←/→ time · ↓/↑ target · -/+ grid · s sound · esc quit"
        }
        AppState::Playing => "click the lit tile (or press its key) · esc quit",
        AppState::Summary => "enter play again · any key settings · esc quit",
    };
    Line::from(Span::styled(
        text,
        Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC),
    ))
}

fn render_summary(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(summary) = &app.summary else {
        return;
    };
    let message = summary.message();
    let detail = format!(
        "{} · {} · {}",
        summary.mode,
        summary.reason,
        summary.finished_at.format("%H:%M:%S")
    );

    let width = (message.width().max(detail.width()) as u16 + 6).min(area.width);
    let height = 5.min(area.height);
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );

    let color = if summary.success {
        Color::Green
    } else {
        Color::Red
    };
    Clear.render(popup, buf);
    Paragraph::new(vec![
        Line::from(Span::styled(
            message,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            detail,
            Style::default().add_modifier(Modifier::DIM),
        )),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Double)
            .border_style(Style::default().fg(color)),
    )
    .render(popup, buf);
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = sections(area);

        Paragraph::new(vec![
            Line::from(Span::styled(
                "flashgrid",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::default(),
            status_line(self),
        ])
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        render_board(self.controller.board(), chunks[1], buf);

        let mut footer = vec![help_line(self)];
        if let Some(notice) = &self.notice {
            footer.push(Line::from(Span::styled(
                notice.clone(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
        } else if let Some(cue) = self.controller.feedback().last_cue() {
            if self.state == AppState::Playing {
                footer.push(Line::from(Span::styled(
                    format!("♪ {cue}"),
                    Style::default().fg(Color::Magenta),
                )));
            }
        }
        Paragraph::new(footer)
            .alignment(Alignment::Center)
            .render(chunks[2], buf);

        if self.state == AppState::Summary {
            render_summary(self, chunks[1], buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashgrid::config::Config;
    use ratatui::{backend::TestBackend, Terminal};
    use std::io;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn tile_rects_cover_every_tile_without_overlap() {
        let grid = Grid::square(4);
        let board = Rect::new(5, 4, 70, 20);
        let rects = tile_rects(board, &grid);
        assert_eq!(rects.len(), 16);

        for (i, a) in rects.iter().enumerate() {
            assert!(a.width > 0 && a.height > 0);
            for b in rects.iter().skip(i + 1) {
                assert!(!a.intersects(*b));
            }
        }
    }

    #[test]
    fn tile_at_maps_centers_and_gutters() {
        let grid = Grid::square(4);
        let area = Rect::new(0, 0, 80, 30);
        let rects = tile_rects(board_area(area), &grid);

        for (idx, r) in rects.iter().enumerate() {
            let hit = tile_at(area, &grid, r.x + r.width / 2, r.y + r.height / 2);
            assert_eq!(hit, Some(TileId(idx)));
        }
        // gutter column right of the first tile
        let first = rects[0];
        assert_eq!(tile_at(area, &grid, first.x + first.width, first.y), None);
        assert_eq!(tile_at(area, &grid, 0, 0), None);
    }

    #[test]
    fn empty_grid_has_no_rects() {
        assert!(tile_rects(Rect::new(0, 0, 10, 10), &Grid::new(0, 0)).is_empty());
    }

    #[test]
    fn setup_screen_shows_settings_and_notice() {
        let mut app = App::new(
            Config {
                sound: false,
                ..Config::default()
            },
            Box::new(io::sink()),
        );
        app.notice = Some("Enter valid values".to_string());

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| draw(&app, f)).unwrap();
        let text = buffer_text(&terminal);

        assert!(text.contains("Score target"));
        assert!(text.contains("60s"));
        assert!(text.contains("Enter valid values"));
        assert!(text.contains("off"));
    }

    #[test]
    fn playing_screen_shows_clock_label() {
        let mut app = App::new(
            Config {
                sound: false,
                mode: flashgrid::GameMode::TimeLimit,
                ..Config::default()
            },
            Box::new(io::sink()),
        );
        app.start();

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| draw(&app, f)).unwrap();
        let text = buffer_text(&terminal);

        assert!(text.contains("Time left"));
        assert!(text.contains("60s"));
    }

    #[test]
    fn tiny_terminal_does_not_panic() {
        let app = App::new(Config::default(), Box::new(io::sink()));
        let mut terminal = Terminal::new(TestBackend::new(12, 6)).unwrap();
        terminal.draw(|f| draw(&app, f)).unwrap();
    }
}
