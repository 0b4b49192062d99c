//! Single-line prediction result panel.

use ratatui::{
    layout::{Alignment, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::domain::Prediction;
use crate::tui::styles::MedicalTheme;

/// Result panel state
///
/// A failed load or run goes back to `Idle`: the line is left blank and the
/// reason is reported in the footer.
#[derive(Debug, Clone, Default)]
pub enum ResultState {
    /// Nothing to show; the line stays blank
    #[default]
    Idle,
    /// Model is being loaded
    Loading,
    /// Model is running on the submitted record
    Running,
    /// Completed with result
    Complete { prediction: Prediction },
}

impl ResultState {
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Loading | Self::Running)
    }

    /// Text of the result line.
    #[must_use]
    pub fn line_text(&self) -> String {
        match self {
            Self::Idle => String::new(),
            Self::Loading => "Loading model...".to_string(),
            Self::Running => "Running model...".to_string(),
            Self::Complete { prediction } => prediction.display_line(),
        }
    }
}

pub fn render_result(f: &mut Frame, area: Rect, state: &ResultState) {
    let style = match state {
        ResultState::Idle => MedicalTheme::text(),
        ResultState::Loading | ResultState::Running => MedicalTheme::info(),
        ResultState::Complete { .. } => MedicalTheme::result(),
    };

    let mut lines = vec![Line::from(Span::styled(state.line_text(), style))];
    if let ResultState::Complete { prediction } = state {
        lines.push(Line::from(Span::styled(
            format!("computed {}", prediction.computed_at.format("%Y-%m-%d %H:%M:%S UTC")),
            MedicalTheme::text_muted(),
        )));
    }

    let block = Block::default()
        .title(Span::styled(" Result ", MedicalTheme::subtitle()))
        .borders(Borders::ALL)
        .border_style(MedicalTheme::border_focused());

    f.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(block),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_line_is_blank() {
        assert_eq!(ResultState::default().line_text(), "");
        assert!(!ResultState::Idle.is_busy());
    }

    #[test]
    fn test_complete_line() {
        let state = ResultState::Complete {
            prediction: Prediction::new(0.27),
        };
        assert_eq!(state.line_text(), "Predicted Risk: 27%");
    }

    #[test]
    fn test_busy_states() {
        assert!(ResultState::Loading.is_busy());
        assert!(ResultState::Running.is_busy());
    }
}
