use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::ledger::format_currency;
use crate::ui::app::{App, InputMode};
use crate::ui::theme;
use crate::ui::util::truncate;

pub(crate) fn render_form(f: &mut Frame, area: Rect, app: &App) {
    let editing = app.input_mode == InputMode::Editing;
    let state = app.ledger.state();

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(24)])
        .split(area);

    let value_block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::border_style(editing))
        .title(Span::styled(" Amount ", theme::dim_style()));
    let value_line = if state.new_item_value.is_empty() && !editing {
        Line::from(Span::styled("press a to add", theme::dim_style()))
    } else {
        Line::from(Span::styled(&state.new_item_value, theme::normal_style()))
    };
    f.render_widget(Paragraph::new(value_line).block(value_block), cols[0]);

    let category_block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::border_style(editing))
        .title(Span::styled(" Category ", theme::dim_style()));
    let category_line = Line::from(vec![
        Span::styled("‹ ", theme::dim_style()),
        Span::styled(
            truncate(&state.new_item_category, 16),
            Style::default()
                .fg(theme::YELLOW)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" ›", theme::dim_style()),
    ]);
    f.render_widget(
        Paragraph::new(category_line).centered().block(category_block),
        cols[1],
    );

    if editing {
        let offset = state.new_item_value.chars().count() as u16;
        let max = cols[0].width.saturating_sub(2);
        f.set_cursor_position((cols[0].x + 1 + offset.min(max), cols[0].y + 1));
    }
}

pub(crate) fn render_items(f: &mut Frame, area: Rect, app: &App) {
    let items = app.ledger.items();
    if items.is_empty() {
        let msg = vec![
            Line::from(""),
            Line::from(Span::styled("No items yet", theme::dim_style())),
            Line::from(""),
            Line::from(Span::styled(
                "Press a, type an amount (negative for spending), Enter to add",
                theme::dim_style(),
            )),
        ];
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme::OVERLAY))
            .title(Span::styled(
                " Items (0) ",
                Style::default()
                    .fg(theme::TEXT_DIM)
                    .add_modifier(Modifier::BOLD),
            ));
        f.render_widget(Paragraph::new(msg).centered().block(block), area);
        return;
    }

    let header_cells = ["Added", "Category", "Amount"]
        .iter()
        .map(|h| Cell::from(*h).style(theme::header_style()));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = items
        .iter()
        .enumerate()
        .skip(app.item_scroll)
        .take(area.height.saturating_sub(3) as usize)
        .map(|(i, item)| {
            let style = if i == app.item_index && app.input_mode == InputMode::Normal {
                theme::selected_style()
            } else if i % 2 == 1 {
                theme::alt_row_style()
            } else {
                theme::normal_style()
            };

            let added = item.created_label();
            Row::new(vec![
                Cell::from(if added.is_empty() { "—".to_string() } else { added }),
                Cell::from(truncate(&item.category, 18)),
                Cell::from(Span::styled(
                    format_currency(item.value),
                    theme::amount_style(item.value),
                )),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(18),
        Constraint::Min(12),
        Constraint::Length(14),
    ];

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme::OVERLAY))
            .title(Span::styled(
                format!(" Items ({}) ", items.len()),
                Style::default()
                    .fg(theme::TEXT_DIM)
                    .add_modifier(Modifier::BOLD),
            )),
    );

    f.render_widget(table, area);
}
