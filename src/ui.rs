use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::app::{App, PickerMode};

const BG: Color = Color::Rgb(9, 15, 25);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const MARK: Color = Color::Rgb(96, 165, 250);

pub fn render(frame: &mut Frame, app: &mut App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    app.set_page_size(root[2].height as usize);

    render_title(frame, root[0], app);
    render_table_header(frame, root[1], app);
    render_list(frame, root[2], app);
    render_query(frame, root[3], app);
    render_status(frame, root[4], app);

    match app.mode() {
        PickerMode::Pager => render_pager(frame, app),
        PickerMode::ContainerPick => render_container_picker(frame, app),
        PickerMode::Prompt => render_prompt(frame, app),
        PickerMode::List => {}
    }
}

fn render_title(frame: &mut Frame, area: Rect, app: &App) {
    let marks = if app.mark_count() > 0 {
        format!("  {} marked", app.mark_count())
    } else {
        String::new()
    };
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", app.kind()),
            Style::default()
                .fg(Color::Black)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}/{}{}", app.match_count(), app.row_count(), marks),
            Style::default().fg(MUTED),
        ),
    ]);
    frame.render_widget(Paragraph::new(line).style(Style::default().bg(BG)), area);
}

fn render_table_header(frame: &mut Frame, area: Rect, app: &App) {
    frame.render_widget(
        Paragraph::new(format!("   {}", app.display_header())).style(
            Style::default()
                .bg(BG)
                .fg(MUTED)
                .add_modifier(Modifier::BOLD),
        ),
        area,
    );
}

fn render_list(frame: &mut Frame, area: Rect, app: &App) {
    let height = area.height as usize;
    let cursor = app.cursor();
    // keep the cursor inside the viewport
    let top = cursor.saturating_sub(height.saturating_sub(1));

    let mut lines = Vec::with_capacity(height);
    for (position, filtered) in app.filtered().iter().enumerate().skip(top).take(height) {
        let is_cursor = position == cursor;
        let is_marked = app.is_marked(filtered.row_index);

        let mut spans = Vec::new();
        spans.push(if is_cursor {
            Span::styled("▌ ", Style::default().fg(ACCENT))
        } else {
            Span::raw("  ")
        });
        spans.push(if is_marked {
            Span::styled("+", Style::default().fg(MARK).add_modifier(Modifier::BOLD))
        } else {
            Span::raw(" ")
        });

        let base = if is_cursor {
            Style::default()
                .fg(Color::White)
                .bg(Color::Rgb(16, 27, 44))
                .add_modifier(Modifier::BOLD)
        } else if is_marked {
            Style::default().fg(MARK)
        } else {
            Style::default().fg(Color::White)
        };
        spans.extend(highlight_spans(
            app.display_line(filtered.row_index),
            &filtered.highlights,
            base,
        ));
        lines.push(Line::from(spans));
    }

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "  (nothing to select)",
            Style::default().fg(MUTED),
        )));
    }

    frame.render_widget(
        Paragraph::new(lines).style(Style::default().bg(BG)),
        area,
    );
}

/// Splits a display line into styled spans, brightening fuzzy-match hits.
fn highlight_spans(line: &str, highlights: &[usize], base: Style) -> Vec<Span<'static>> {
    let hit = base.fg(WARN).add_modifier(Modifier::BOLD);
    let mut spans = Vec::new();
    let mut run = String::new();
    let mut run_is_hit = false;

    for (index, c) in line.chars().enumerate() {
        let is_hit = highlights.binary_search(&index).is_ok();
        if is_hit != run_is_hit && !run.is_empty() {
            spans.push(Span::styled(
                std::mem::take(&mut run),
                if run_is_hit { hit } else { base },
            ));
        }
        run_is_hit = is_hit;
        run.push(c);
    }
    if !run.is_empty() {
        spans.push(Span::styled(run, if run_is_hit { hit } else { base }));
    }
    spans
}

fn render_query(frame: &mut Frame, area: Rect, app: &App) {
    let line = Line::from(vec![
        Span::styled("> ", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
        Span::styled(app.query().to_string(), Style::default().fg(Color::White)),
        Span::styled("█", Style::default().fg(ACCENT)),
    ]);
    frame.render_widget(Paragraph::new(line).style(Style::default().bg(BG)), area);
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let text = if app.status().is_empty() {
        "tab mark  ctrl-a all  enter copy  ctrl-d desc  ctrl-s shell  esc quit".to_string()
    } else {
        app.status().to_string()
    };
    frame.render_widget(
        Paragraph::new(text).style(Style::default().bg(BG).fg(MUTED)),
        area,
    );
}

fn render_pager(frame: &mut Frame, app: &App) {
    let area = inset(frame.area(), 1, 1);
    let (title, text, scroll) = app.pager();
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(text.to_string())
            .scroll((scroll, 0))
            .style(Style::default().bg(BG).fg(Color::White))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(ACCENT))
                    .title(format!(" {title} (j/k scroll, q close) ")),
            ),
        area,
    );
}

fn render_container_picker(frame: &mut Frame, app: &App) {
    let (containers, cursor) = app.containers();
    let height = (containers.len() as u16 + 2).min(frame.area().height);
    let area = centered(frame.area(), 40, height);

    let lines: Vec<Line> = containers
        .iter()
        .enumerate()
        .map(|(index, name)| {
            if index == cursor {
                Line::from(Span::styled(
                    format!("▌ {name}"),
                    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(Span::styled(
                    format!("  {name}"),
                    Style::default().fg(Color::White),
                ))
            }
        })
        .collect();

    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines)
            .style(Style::default().bg(BG))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(ACCENT))
                    .title(" container "),
            ),
        area,
    );
}

fn render_prompt(frame: &mut Frame, app: &App) {
    let area = centered(frame.area(), 60, 3);
    let line = Line::from(vec![
        Span::styled("$ ", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
        Span::styled(app.prompt().to_string(), Style::default().fg(Color::White)),
        Span::styled("█", Style::default().fg(ACCENT)),
    ]);
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(line)
            .style(Style::default().bg(BG))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(WARN))
                    .title(" command to run in container "),
            ),
        area,
    );
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn inset(area: Rect, dx: u16, dy: u16) -> Rect {
    Rect {
        x: area.x + dx.min(area.width / 2),
        y: area.y + dy.min(area.height / 2),
        width: area.width.saturating_sub(dx * 2),
        height: area.height.saturating_sub(dy * 2),
    }
}
