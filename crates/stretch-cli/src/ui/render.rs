use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph},
};
use stretch_core::params::Control;
use stretch_core::probe::AudioInfo;

use super::app::App;

pub(crate) fn draw(f: &mut ratatui::Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Length(11),
            Constraint::Min(5),
            Constraint::Length(4),
        ])
        .split(f.area());

    let header = Paragraph::new(vec![
        Line::from(app.version_line.clone()),
        Line::from(format!(
            "input:  {}  [{}]",
            app.session.input().display(),
            info_label(app.input_info.as_ref())
        )),
        Line::from(format!(
            "output: {}  [{}]",
            app.session.output().display(),
            info_label(app.output_info.as_ref())
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title("stretch"));
    f.render_widget(header, chunks[0]);

    draw_controls(f, app, chunks[1]);

    let status_block = Block::default().borders(Borders::ALL).title("Status");
    let inner = status_block.inner(chunks[2]);
    let lines: Vec<Line> = app.session.surface().text.lines().map(Line::from).collect();
    let scroll = lines.len().saturating_sub(inner.height as usize);
    let status = Paragraph::new(lines)
        .block(status_block)
        .scroll((scroll.min(u16::MAX as usize) as u16, 0));
    f.render_widget(status, chunks[2]);

    let footer_block = Block::default().borders(Borders::ALL);
    let footer_inner = footer_block.inner(chunks[3]);
    f.render_widget(footer_block, chunks[3]);
    let footer_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(footer_inner);
    f.render_widget(Paragraph::new(Line::from(busy_line(app))), footer_chunks[0]);
    f.render_widget(
        Paragraph::new(Line::from(
            "keys: ↑/↓ select | ←/→ ±1 | Shift+←/→ or [/] ±10 | r reset | Enter process | c cancel | l logs | q quit",
        )),
        footer_chunks[1],
    );

    if app.logs_open {
        let area = centered_rect(90, 80, f.area());
        f.render_widget(Clear, area);
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Logs (Esc to close, ↑/↓ scroll)");
        let inner = block.inner(area);
        let height = inner.height as usize;
        let total = app.logs.len();
        let end = total.saturating_sub(app.logs_scroll);
        let start = end.saturating_sub(height);
        let mut items = Vec::new();
        for line in app.logs.iter().skip(start).take(end.saturating_sub(start)) {
            items.push(ListItem::new(line.clone()));
        }
        if items.is_empty() {
            items.push(ListItem::new("<no logs>"));
        }
        let list = List::new(items).block(block);
        f.render_widget(list, area);
    }
}

fn draw_controls(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Controls");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(inner);

    for (control, row) in Control::ALL.into_iter().zip(rows.iter()) {
        let range = app.controls.range(control);
        let value = app.value(control);
        let label = app.session.params().label(control).to_string();
        let selected = app.selected == control;
        let title = if selected {
            format!("▶ {}", title_for(control))
        } else {
            title_for(control).to_string()
        };
        let color = if selected { Color::Yellow } else { Color::White };
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(title))
            .gauge_style(Style::default().fg(color).bg(Color::Black))
            .ratio(slider_ratio(value, range.min, range.max))
            .label(label);
        let gauge = if selected {
            gauge.style(Style::default().add_modifier(Modifier::BOLD))
        } else {
            gauge
        };
        f.render_widget(gauge, *row);
    }
}

fn title_for(control: Control) -> &'static str {
    match control {
        Control::Tempo => "Tempo (%)",
        Control::Pitch => "Pitch (semitones)",
        Control::Speed => "Speed",
    }
}

fn busy_line(app: &App) -> String {
    match app.session.in_flight() {
        Some(id) => {
            let queued = app.session.queued();
            if queued > 0 {
                format!("processing {id} ({queued} queued)")
            } else {
                format!("processing {id}")
            }
        }
        None => "idle".to_string(),
    }
}

fn info_label(info: Option<&AudioInfo>) -> String {
    info.map(|i| i.to_string()).unwrap_or_else(|| "not found".to_string())
}

/// Position of `value` within `min..=max`, clamped to `0.0..=1.0`.
fn slider_ratio(value: i32, min: i32, max: i32) -> f64 {
    if max <= min {
        return 1.0;
    }
    ((value as f64 - min as f64) / (max as f64 - min as f64)).clamp(0.0, 1.0)
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1]);
    horizontal[1]
}
