use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Gauge, Padding, Paragraph, Row, Table, Wrap,
};

use super::super::AppContext;
use super::super::catalog::Series;
use super::super::format::{format_position, seen_summary, truncate};
use super::super::listing_rows;
use super::super::playback::{INTRO_END, PlaybackController, PlaybackState, RECAP_END};
use super::{FALLBACK_NOTICE, ListingView, NOT_FOUND, PlayerView, Screen};

const ACCENT: Color = Color::Rgb(110, 170, 255);
const MUTED: Color = Color::Rgb(185, 195, 210);

pub(super) fn draw_tui(frame: &mut Frame, ctx: &AppContext, screen: &mut Screen, status: &str) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    match screen {
        Screen::Listing(view) => {
            if let Some(series) = ctx.catalog.series(&view.slug) {
                draw_listing(frame, &chunks, series, view);
            }
        }
        Screen::Player(view) => {
            if let Some(series) = ctx.catalog.series(&view.slug) {
                draw_player(frame, &chunks, series, view);
            }
        }
    }

    let status_widget = Paragraph::new(status.to_string())
        .style(status_style(status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[3]);

    if let Screen::Listing(view) = screen
        && view.pending_reset
        && let Some(series) = ctx.catalog.series(&view.slug)
    {
        let popup_text = format!(
            "Clear watched episodes?\n\n{}\n\n{}\n\n[y / Enter] Clear   [n / Esc] Cancel",
            truncate(&series.title, 56),
            seen_summary(view.seen.len(), series.episodes.len())
        );
        let popup_area = popup_rect_for_text(frame.area(), &popup_text);
        render_popup_shadow(frame, popup_area);
        frame.render_widget(Clear, popup_area);
        let popup = Paragraph::new(popup_text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(modal_block("Confirm Clear"));
        frame.render_widget(popup, popup_area);
    }
}

fn header_line(series: &Series, detail: String) -> Paragraph<'static> {
    Paragraph::new(Line::from(vec![
        Span::styled(
            "VISTOS",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(series.title.clone(), Style::default().fg(MUTED)),
        Span::styled("   ", Style::default()),
        Span::styled(detail, Style::default().fg(Color::Yellow)),
    ]))
    .alignment(Alignment::Center)
}

fn draw_listing(frame: &mut Frame, chunks: &[Rect], series: &Series, view: &mut ListingView) {
    let summary = seen_summary(view.seen.len(), series.episodes.len());
    frame.render_widget(
        header_line(series, summary).block(panel_block("Catalog")),
        chunks[0],
    );

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(64), Constraint::Percentage(36)])
        .split(chunks[1]);
    let details_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(3)])
        .split(body_chunks[1]);

    let listing = listing_rows(series, &view.seen);
    let rows: Vec<Row> = listing
        .iter()
        .map(|row| {
            Row::new(vec![
                Cell::from(row.id.to_string()),
                Cell::from(row.title.clone()),
                Cell::from(if row.seen { "✓" } else { "" }),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Min(20),
            Constraint::Length(6),
        ],
    )
    .header(
        Row::new(vec!["#", "Episode", "Seen"])
            .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
    )
    .block(panel_block("Episodes"))
    .row_highlight_style(
        Style::default()
            .bg(ACCENT)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, body_chunks[0], &mut view.table_state);

    let mut selection_text = match view.table_state.selected().and_then(|idx| listing.get(idx)) {
        Some(row) => format!(
            "Episode\n{}. {}\n\nWatched\n{}\n\nThumbnail\n{}",
            row.id,
            truncate(&row.title, 40),
            if row.seen { "yes" } else { "no" },
            row.thumbnail.as_deref().unwrap_or("-"),
        ),
        None => "This series has no episodes.".to_string(),
    };
    if let Some(subtitle) = series.subtitle.as_deref() {
        selection_text = format!("{}\n\n{selection_text}", truncate(subtitle, 40));
    }
    let selection = Paragraph::new(selection_text)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .wrap(Wrap { trim: false })
        .block(panel_block("Selected"));
    frame.render_widget(selection, details_chunks[0]);

    let percent = series.progress_percent(view.seen.len());
    let progress = Gauge::default()
        .block(panel_block("Progress"))
        .gauge_style(
            Style::default()
                .fg(Color::Rgb(130, 190, 255))
                .bg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .label(format!("{percent}%"))
        .percent(percent.min(100) as u16);
    frame.render_widget(progress, details_chunks[1]);

    let mut controls = vec![
        Span::styled("↑/↓ move  Enter play  Space toggle  c clear", Style::default().fg(MUTED)),
    ];
    if series.switch_to.is_some() {
        controls.push(Span::styled("  Tab switch series", Style::default().fg(MUTED)));
    }
    controls.push(Span::styled("  q quit", Style::default().fg(MUTED)));
    frame.render_widget(
        Paragraph::new(Line::from(controls))
            .alignment(Alignment::Center)
            .block(panel_block("Controls")),
        chunks[2],
    );
}

fn draw_player(frame: &mut Frame, chunks: &[Rect], series: &Series, view: &PlayerView) {
    let autoplay = view
        .controller
        .as_ref()
        .is_some_and(PlaybackController::autoplay);
    let detail = if autoplay {
        format!("episode {}  autoplay", view.route.episode_id)
    } else {
        format!("episode {}", view.route.episode_id)
    };
    frame.render_widget(
        header_line(series, detail).block(panel_block("Player")),
        chunks[0],
    );

    let Some(controller) = view.controller.as_ref() else {
        let text = format!(
            "{NOT_FOUND}\n\n{}\n\nPress Esc or b to go back to the listing.",
            view.route
        );
        let popup = Paragraph::new(text)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Rgb(255, 145, 120)))
            .block(panel_block("Episode"));
        frame.render_widget(popup, chunks[1]);
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "Esc/b back  q quit",
                Style::default().fg(MUTED),
            )))
            .alignment(Alignment::Center)
            .block(panel_block("Controls")),
            chunks[2],
        );
        return;
    };

    let body_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(3), Constraint::Length(3)])
        .split(chunks[1]);

    let episode_title = series
        .episode(controller.episode_id())
        .map(|episode| episode.title.as_str())
        .unwrap_or("-");
    let source_text = match controller.state() {
        PlaybackState::Trying { candidate_index } => format!(
            "Source {} of {}\n{}",
            candidate_index + 1,
            controller.sources().candidates.len(),
            controller.current_source().unwrap_or("-")
        ),
        PlaybackState::FallbackFrame => {
            format!("Preview\n{}\n\n{FALLBACK_NOTICE}", controller.sources().preview_src)
        }
    };
    let info = Paragraph::new(format!(
        "{}. {}\n\n{source_text}",
        controller.episode_id(),
        truncate(episode_title, 60)
    ))
    .style(Style::default().fg(Color::Rgb(230, 230, 230)))
    .wrap(Wrap { trim: false })
    .block(panel_block("Now Playing"));
    frame.render_widget(info, body_chunks[0]);

    let position = controller.position();
    let progress = Gauge::default()
        .block(panel_block("Position"))
        .gauge_style(Style::default().fg(Color::Rgb(130, 190, 255)).bg(Color::Black))
        .label(format_position(position))
        .ratio((position / RECAP_END).clamp(0.0, 1.0));
    frame.render_widget(progress, body_chunks[1]);

    frame.render_widget(
        Paragraph::new(skip_line(controller))
            .alignment(Alignment::Center)
            .block(panel_block("Skip")),
        body_chunks[2],
    );

    frame.render_widget(
        Paragraph::new(navigation_line(controller))
            .alignment(Alignment::Center)
            .block(panel_block("Controls")),
        chunks[2],
    );
}

fn skip_line(controller: &PlaybackController) -> Line<'static> {
    let overlay = controller.overlay();
    if controller.state() == PlaybackState::FallbackFrame {
        return Line::from(Span::styled(FALLBACK_NOTICE, Style::default().fg(MUTED)));
    }
    let mut spans = Vec::new();
    if overlay.intro_visible {
        spans.push(Span::styled(
            format!(" [i] SALTAR INTRO {} ", format_position(INTRO_END)),
            pill_active(),
        ));
    }
    if overlay.recap_visible {
        if !spans.is_empty() {
            spans.push(Span::raw(" "));
        }
        spans.push(Span::styled(
            format!(" [r] SALTAR RESUMEN {} ", format_position(RECAP_END)),
            pill_active(),
        ));
    }
    if spans.is_empty() {
        spans.push(Span::styled("-", Style::default().fg(MUTED)));
    }
    Line::from(spans)
}

fn nav_pill(label: &'static str, enabled: bool) -> Span<'static> {
    Span::styled(label, if enabled { pill_active() } else { pill_inactive() })
}

fn navigation_line(controller: &PlaybackController) -> Line<'static> {
    Line::from(vec![
        nav_pill(" ← ANTERIOR ", controller.has_previous()),
        Span::raw(" "),
        nav_pill(" SIGUIENTE → ", controller.has_next()),
        Span::styled(
            "   o browser  Enter reopen  Esc/b back  q quit",
            Style::default().fg(MUTED),
        ),
    ])
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn pill_active() -> Style {
    Style::default()
        .bg(ACCENT)
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

fn pill_inactive() -> Style {
    Style::default()
        .bg(Color::Rgb(72, 82, 96))
        .fg(Color::Rgb(230, 235, 242))
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Rgb(205, 165, 255))
    }
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    frame.render_widget(
        Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24))),
        shadow,
    );
}

fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let widest = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let available_width = area.width.saturating_sub(2).max(1);
    let width = widest
        .saturating_add(12)
        .clamp(48.min(available_width), 72.min(available_width));

    let available_height = area.height.saturating_sub(2).max(1);
    let height = (text.lines().count() as u16)
        .saturating_add(6)
        .clamp(10.min(available_height), 18.min(available_height));

    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}
