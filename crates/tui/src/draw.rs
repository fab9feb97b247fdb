//! ratatui rendering for the whole screen.

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use ratatui::Frame;

use crate::app::{App, Screen};
use crate::view::ListFrame;

const ACCENT: Color = Color::Cyan;
const MUTED: Color = Color::DarkGray;

pub fn draw(frame: &mut Frame, app: &mut App) {
    let bar_height = if app.command().is_active() { 2 } else { 1 };
    let [header, body, footer] =
        Layout::vertical([Constraint::Length(2), Constraint::Min(1), Constraint::Length(bar_height)]).areas(frame.area());
    draw_header(frame, app, header);
    match app.screen().clone() {
        Screen::List => {
            let active = app.active_resource().to_string();
            let list = app.registry_mut().get(&active).map(|c| c.render(body.width, body.height));
            match list {
                Some(list) => {
                    draw_list(frame, &list, body);
                    if !app.command().is_active() {
                        draw_status(frame, app.flash().unwrap_or(&list.status), footer);
                    }
                }
                None => draw_status(frame, &format!("unknown resource: {active}"), body),
            }
        }
        Screen::Detail(_) => {
            if let Some(pane) = app.pane_mut() {
                let title = format!(" {} ", pane.title());
                let loading = pane.is_loading();
                let text: Vec<Line> = if loading {
                    vec![Line::styled("Loading...", Style::default().fg(MUTED))]
                } else {
                    pane.render(body.height).iter().map(|l| Line::raw(l.clone())).collect()
                };
                let status = pane.status_line();
                let block = Block::default().borders(Borders::ALL).title(title);
                frame.render_widget(Paragraph::new(text).block(block), body);
                if !app.command().is_active() {
                    draw_status(frame, app.flash().unwrap_or(&status), footer);
                }
            }
        }
    }
    if app.command().is_active() {
        draw_command_bar(frame, app, footer);
    }
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let h = app.header();
    let field = |label: &'static str, value: String| {
        vec![
            Span::styled(label, Style::default().fg(MUTED)),
            Span::styled(value, Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
            Span::raw("  "),
        ]
    };
    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    let mut first = Vec::new();
    first.extend(field("Cluster: ", or_dash(&h.cluster_name)));
    first.extend(field("Kubernetes: ", or_dash(&h.version)));
    first.extend(field("Control plane: ", h.control_plane_nodes.to_string()));
    first.extend(field("Workers: ", h.worker_nodes.to_string()));
    let lines = vec![Line::from(first), Line::styled(app.action_text(), Style::default().fg(Color::Yellow))];
    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_list(frame: &mut Frame, list: &ListFrame, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(list.title.clone());
    if let Some(msg) = &list.empty_message {
        frame.render_widget(Paragraph::new(Line::styled(msg.clone(), Style::default().fg(MUTED))).block(block), area);
        return;
    }
    let header = Row::new(list.columns.iter().map(|c| Cell::from(c.label)))
        .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD));
    let rows = list.rows.iter().map(|r| Row::new(r.iter().map(|c| Cell::from(c.clone()))));
    let widths: Vec<Constraint> = list.columns.iter().map(|c| Constraint::Min(c.width)).collect();
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD));
    let mut state = TableState::default();
    state.select(list.selected);
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_status(frame: &mut Frame, text: &str, area: Rect) {
    frame.render_widget(Paragraph::new(Line::styled(text.to_string(), Style::default().fg(MUTED))), area);
}

fn draw_command_bar(frame: &mut Frame, app: &App, area: Rect) {
    let bar = app.command();
    let [input, hints] = Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(area);
    frame.render_widget(
        Paragraph::new(Line::from(vec![Span::styled(":", Style::default().fg(ACCENT)), Span::raw(bar.input().to_string())])),
        input,
    );
    let selected = bar.selected_suggestion();
    let spans: Vec<Span> = bar
        .suggestions()
        .iter()
        .flat_map(|s| {
            let style = if Some(s.as_str()) == selected {
                Style::default().fg(Color::Black).bg(ACCENT)
            } else {
                Style::default().fg(MUTED)
            };
            [Span::styled(s.clone(), style), Span::raw(" ")]
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(spans)), hints);
    let x = input.x.saturating_add(1).saturating_add(bar.cursor() as u16);
    frame.set_cursor_position((x.min(input.right().saturating_sub(1)), input.y));
}
