use crate::color::{DEFAULT_BASE_COLOR, base_color_or_default, color_for, to_color};
use crate::data::{DatasetKind, UnitProps};
use crate::map_draw::HoverEvent;
use crate::search::EntryKind;
use crate::state::{AppState, Panel};
use crate::stats::StatKind;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap, canvas::Canvas,
    },
};

const LEGEND_SWATCHES: usize = 24;

pub fn draw(f: &mut Frame<'_>, state: &mut AppState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(60),
            Constraint::Percentage(20),
        ])
        .split(f.area());

    draw_left(f, state, chunks[0]);
    draw_map(f, state, chunks[1]);
    draw_right(f, state, chunks[2]);
    draw_tooltip(f, state);
}

fn panel_block(title: String, focused: bool) -> Block<'static> {
    let block = Block::default().borders(Borders::ALL).title(title);
    if focused {
        block.border_style(Style::default().fg(Color::Yellow))
    } else {
        block
    }
}

fn draw_left(f: &mut Frame<'_>, state: &AppState, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Percentage(50),
            Constraint::Min(5),
        ])
        .split(area);

    let tabs = Tabs::new(DatasetKind::ALL.map(DatasetKind::label).to_vec())
        .block(Block::default().borders(Borders::ALL).title("Dataset"))
        .select(DatasetKind::ALL.iter().position(|k| *k == state.dataset).unwrap_or(0))
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, rows[0]);

    let items: Vec<ListItem> = state
        .candidate_rows
        .iter()
        .map(|&idx| {
            let candidate = &state.candidates[idx];
            let swatch = to_color(base_color_or_default(&candidate.color));
            ListItem::new(Line::from(vec![
                Span::styled("■ ", Style::default().fg(swatch)),
                Span::raw(candidate.name.clone()),
            ]))
        })
        .collect();
    let mut list_state = ListState::default();
    list_state.select(Some(state.selected_row));
    let list = List::new(items)
        .block(panel_block("Candidates".to_string(), state.active_panel == Panel::Candidates))
        .highlight_symbol(">> ")
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_stateful_widget(list, rows[1], &mut list_state);

    draw_search(f, state, rows[2]);
}

fn draw_search(f: &mut Frame<'_>, state: &AppState, area: Rect) {
    let focused = state.active_panel == Panel::Search;
    let title = if state.search_text.is_empty() {
        "Search".to_string()
    } else {
        format!("Search ({} found)", state.search_results.len())
    };

    let mut lines = Vec::with_capacity(state.search_results.len() + 1);
    let cursor = if focused { "▌" } else { "" };
    lines.push(Line::from(format!("> {}{}", state.search_text, cursor)));
    for (i, entry) in state.search_results.iter().enumerate() {
        let marker = match entry.kind {
            EntryKind::Municipality => "◆ ",
            EntryKind::Barangay => "· ",
        };
        let mut style = Style::default();
        if focused && i == state.search_cursor {
            style = style.fg(Color::Yellow).add_modifier(Modifier::BOLD);
        }
        lines.push(Line::from(Span::styled(format!("{marker}{}", entry.label), style)));
    }

    let block = panel_block(title, focused);
    let paragraph = Paragraph::new(lines).block(block);
    f.render_widget(paragraph, area);
}

fn draw_map(f: &mut Frame<'_>, state: &mut AppState, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);

    let title = map_title(state);
    let block = panel_block(title, state.active_panel == Panel::Map);

    if state.layer.is_empty() {
        let placeholder = Paragraph::new("Dataset contains no drawable units")
            .block(block)
            .wrap(Wrap { trim: true });
        f.render_widget(placeholder, rows[0]);
    } else {
        let inner = block.inner(rows[0]);
        state.apply_pending_fit(inner);
        let x_bounds = state.viewport.x_bounds(inner.width as f64);
        let y_bounds = state.viewport.y_bounds(inner.height as f64);
        let layer = &state.layer;
        let canvas = Canvas::default()
            .block(block)
            .marker(Marker::Braille)
            .x_bounds(x_bounds)
            .y_bounds(y_bounds)
            .paint(|ctx| layer.paint(ctx, x_bounds, y_bounds, inner.width));
        f.render_widget(canvas, rows[0]);
    }

    f.render_widget(legend_line(state), rows[1]);
}

fn map_title(state: &AppState) -> String {
    let candidate = state
        .active_candidate()
        .map(|c| c.name.as_str())
        .unwrap_or("no candidate");
    format!(
        " {} · {} · {} ",
        candidate,
        state.stat_kind.label(),
        state.color_mode.label()
    )
}

// One-line color ramp from zero to the current maximum.
fn legend_line(state: &AppState) -> Paragraph<'static> {
    let base = state
        .active_candidate()
        .map(|c| base_color_or_default(&c.color))
        .unwrap_or(DEFAULT_BASE_COLOR);
    let mut spans = vec![Span::raw(" 0 ")];
    for i in 0..LEGEND_SWATCHES {
        let value = i as f64 / (LEGEND_SWATCHES - 1) as f64;
        let rgb = color_for(value, state.color_mode, base);
        spans.push(Span::styled("█", Style::default().fg(to_color(rgb))));
    }
    spans.push(Span::raw(format!(" {}", format_stat(state.max_stat(), state.stat_kind))));
    Paragraph::new(Line::from(spans))
}

fn format_stat(value: f64, kind: StatKind) -> String {
    match kind {
        StatKind::Votes => format!("{}", value.round() as u64),
        StatKind::Share | StatKind::Turnout => format!("{:.1}%", value * 100.0),
    }
}

fn draw_right(f: &mut Frame<'_>, state: &AppState, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(35),
            Constraint::Percentage(25),
        ])
        .split(area);

    let totals = state.totals();
    let summary = format!(
        "{}\n{} units\nRegistered: {}\nBallots cast: {}\nVotes: {}",
        state.dataset.label(),
        totals.units,
        totals.registered_voters,
        totals.actual_voters,
        totals.votes,
    );
    let summary_paragraph = Paragraph::new(summary)
        .block(Block::default().borders(Borders::ALL).title("Summary"))
        .wrap(Wrap { trim: true });
    f.render_widget(summary_paragraph, rows[0]);

    let candidate_id = state.active_candidate().map(|c| c.id.as_str()).unwrap_or("");
    let unit_text = match (&state.hover, &state.selection) {
        (Some(hover), _) => unit_detail(&hover.props, candidate_id),
        (None, Some(entry)) => format!("Selected:\n{}", entry.label),
        (None, None) => "Hover a unit for details\n\nUse / to search for a\nmunicipality or barangay".to_string(),
    };
    let unit_paragraph = Paragraph::new(unit_text)
        .block(Block::default().borders(Borders::ALL).title("Unit"))
        .wrap(Wrap { trim: true });
    f.render_widget(unit_paragraph, rows[1]);

    let help_paragraph = Paragraph::new(AppState::HELP_TEXT)
        .block(Block::default().borders(Borders::ALL).title("Keys"))
        .style(Style::default().fg(Color::Gray))
        .wrap(Wrap { trim: true });
    f.render_widget(help_paragraph, rows[2]);
}

fn unit_detail(props: &UnitProps, candidate_id: &str) -> String {
    let votes = props.votes.get(candidate_id).copied().unwrap_or(0);
    let share = if props.actual_voters > 0 {
        votes as f64 / props.actual_voters as f64
    } else {
        0.0
    };
    let turnout = if props.registered_voters > 0 {
        props.actual_voters as f64 / props.registered_voters as f64
    } else {
        0.0
    };
    format!(
        "{}\n{}, {}\nVotes: {}  Share: {:.1}%\nTurnout: {:.1}%  ({}/{})",
        props.barangay,
        props.municipality,
        props.province,
        votes,
        share * 100.0,
        turnout * 100.0,
        props.actual_voters,
        props.registered_voters,
    )
}

// Floating unit card next to the pointer, clamped to the frame.
fn draw_tooltip(f: &mut Frame<'_>, state: &AppState) {
    let Some(hover) = &state.hover else { return };
    let area = tooltip_rect(hover, f.area());
    if area.width < 8 || area.height < 4 {
        return;
    }

    let candidate_id = state.active_candidate().map(|c| c.id.as_str()).unwrap_or("");
    f.render_widget(Clear, area);
    let card = Paragraph::new(unit_detail(&hover.props, candidate_id))
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(card, area);
}

fn tooltip_rect(hover: &HoverEvent, frame: Rect) -> Rect {
    let width = 36.min(frame.width);
    let height = 6.min(frame.height);
    let (px, py) = hover.pointer;
    let x = if px + 2 + width <= frame.x + frame.width {
        px + 2
    } else {
        px.saturating_sub(width + 1).max(frame.x)
    };
    let y = if py + 1 + height <= frame.y + frame.height {
        py + 1
    } else {
        py.saturating_sub(height).max(frame.y)
    };
    Rect::new(x, y, width, height).intersection(frame)
}
