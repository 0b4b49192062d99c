//! UI module: View components for the TUI.

pub mod form;
pub mod result;

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::application::InvokerState;
use crate::domain::EncodingMode;
use crate::tui::styles::{MedicalTheme, LOGO_SMALL};

/// Title bar with model status.
pub fn render_header(f: &mut Frame, area: Rect, model_state: InvokerState, mode: EncodingMode) {
    let mut spans = vec![
        Span::styled(format!(" {LOGO_SMALL}"), MedicalTheme::title()),
        Span::styled(
            " │ Unplanned Return to OR after Growth-Friendly Surgery",
            MedicalTheme::text_secondary(),
        ),
        Span::styled("   model: ", MedicalTheme::text_muted()),
        Span::styled(model_state.to_string(), MedicalTheme::model_state(model_state)),
    ];
    if mode == EncodingMode::Strict {
        spans.push(Span::styled("  strict encoding", MedicalTheme::warning()));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(header, area);
}

/// Key hints plus the form's status message, if any.
pub fn render_footer(f: &mut Frame, area: Rect, message: Option<&str>) {
    let hints = Line::from(vec![
        Span::styled("[↑↓] ", MedicalTheme::key_hint()),
        Span::styled("Field  ", MedicalTheme::key_desc()),
        Span::styled("[←→] ", MedicalTheme::key_hint()),
        Span::styled("Option  ", MedicalTheme::key_desc()),
        Span::styled("[Enter] ", MedicalTheme::key_hint()),
        Span::styled("Calculate  ", MedicalTheme::key_desc()),
        Span::styled("[S] ", MedicalTheme::key_hint()),
        Span::styled("Sample  ", MedicalTheme::key_desc()),
        Span::styled("[N] ", MedicalTheme::key_hint()),
        Span::styled("New  ", MedicalTheme::key_desc()),
        Span::styled("[Esc] ", MedicalTheme::key_hint()),
        Span::styled("Quit", MedicalTheme::key_desc()),
    ]);

    let mut lines = vec![hints];
    if let Some(message) = message {
        lines.push(Line::from(Span::styled(message.to_string(), MedicalTheme::danger())));
    }

    let footer = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(footer, area);
}

pub fn render_disclaimer(f: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(vec![Span::styled(
            "DISCLAIMER: This tool provides indicative estimates and does not replace clinical judgment.",
            MedicalTheme::text_muted(),
        )]),
        Line::from(vec![Span::styled(
            "Entered values stay on this machine and are cleared after each result.",
            MedicalTheme::text_muted(),
        )]),
    ];

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(MedicalTheme::border());

    let p = Paragraph::new(text).block(block).wrap(Wrap { trim: true });

    f.render_widget(p, area);
}
