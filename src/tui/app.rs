//! Main TUI application state machine.
//!
//! Handles:
//! - Input event handling
//! - Submission gating (validate and encode before any model work)
//! - Async load and inference via background worker

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};

use crate::adapters::LogisticEngine;
use crate::application::{InvokerState, RiskCalculator};
use crate::config::AppConfig;
use crate::ports::InferenceEngine;
use crate::UpriskError;

use super::ui::{
    form::{render_form, FormState},
    render_disclaimer, render_footer, render_header,
    result::{render_result, ResultState},
};
use super::worker::{InferenceProgress, InferenceWorker, InferenceWorkerHandle};

/// Main application state
pub struct App<E: InferenceEngine + 'static = LogisticEngine> {
    /// Whether the app should quit
    should_quit: bool,

    /// Prediction pipeline, shared with the background worker
    calculator: Arc<RiskCalculator<E>>,

    form_state: FormState,

    result_state: ResultState,

    /// Pending inference worker (if running)
    pending_worker: Option<InferenceWorkerHandle>,
}

impl App<LogisticEngine> {
    /// Create the application with the bundled logistic engine.
    ///
    /// The model is not touched here; it is loaded on the first submission.
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        tracing::info!(
            model = %config.model_path.display(),
            mode = %config.encoding_mode,
            "Calculator configured"
        );
        Self::with_calculator(Arc::new(RiskCalculator::from_config(
            LogisticEngine::new(),
            config,
        )))
    }
}

impl<E: InferenceEngine + 'static> App<E> {
    /// Create application with an injected calculator (Composition Root pattern).
    pub fn with_calculator(calculator: Arc<RiskCalculator<E>>) -> Self {
        Self {
            should_quit: false,
            calculator,
            form_state: FormState::default(),
            result_state: ResultState::default(),
            pending_worker: None,
        }
    }

    /// Run the main application loop.
    ///
    /// # Errors
    /// Returns error if terminal operations fail.
    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.main_loop(&mut terminal);

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        // Never leave entered values behind.
        self.form_state.clear_sensitive();

        result
    }

    fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        loop {
            self.poll_worker();

            terminal.draw(|f| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(2), // Header
                        Constraint::Min(0),    // Form
                        Constraint::Length(4), // Result
                        Constraint::Length(3), // Footer
                        Constraint::Length(3), // Disclaimer
                    ])
                    .split(f.area());

                render_header(
                    f,
                    chunks[0],
                    self.calculator.model_state(),
                    self.calculator.encoding_mode(),
                );
                render_form(f, chunks[1], &self.form_state);
                render_result(f, chunks[2], &self.result_state);
                render_footer(f, chunks[3], self.form_state.message.as_deref());
                render_disclaimer(f, chunks[4]);
            })?;

            // Handle input (short poll to stay responsive)
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key(key.code, key.modifiers);
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Poll the background worker for progress updates.
    fn poll_worker(&mut self) {
        while let Some(progress) = self
            .pending_worker
            .as_ref()
            .and_then(InferenceWorkerHandle::try_recv)
        {
            match progress {
                InferenceProgress::Loading => self.result_state = ResultState::Loading,
                InferenceProgress::Running => self.result_state = ResultState::Running,
                InferenceProgress::Complete(prediction) => {
                    self.result_state = ResultState::Complete { prediction };
                    self.pending_worker = None;
                    // The record was consumed by this run; start the next one empty.
                    self.form_state.clear_sensitive();
                }
                InferenceProgress::Error(message) => {
                    // No number is shown for a failed run; the reason goes to the footer.
                    self.result_state = ResultState::Idle;
                    self.form_state.message = Some(format!("No result: {message}"));
                    self.pending_worker = None;
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        if key == KeyCode::Char('q') && modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match key {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Up | KeyCode::BackTab => self.form_state.prev_field(),
            KeyCode::Down | KeyCode::Tab => self.form_state.next_field(),
            KeyCode::Left => self.form_state.prev_option(),
            KeyCode::Right => self.form_state.next_option(),
            KeyCode::Char('s') | KeyCode::Char('S') => self.form_state.load_sample_data(),
            KeyCode::Char('n') | KeyCode::Char('N') => self.new_form(),
            KeyCode::Char(c) => self.form_state.input_char(c),
            KeyCode::Backspace => self.form_state.delete_char(),
            KeyCode::Delete => self.form_state.clear_field(),
            KeyCode::Enter => self.submit_form(),
            _ => {}
        }
    }

    fn new_form(&mut self) {
        self.form_state.clear_sensitive();
        if self.pending_worker.is_none() {
            self.result_state = ResultState::Idle;
        }
    }

    /// Validate and encode synchronously, then hand the encoded inputs to a worker.
    fn submit_form(&mut self) {
        if self.pending_worker.is_some() {
            self.form_state.message = Some("A prediction is already running".to_string());
            return;
        }

        let mut record = self.form_state.to_record();
        let prepared = self.calculator.prepare(&record);
        record.reset();

        let inputs = match prepared {
            Ok(inputs) => inputs,
            Err(UpriskError::Validation(errors)) => {
                let keys: Vec<&str> = errors.keys().collect();
                tracing::debug!(fields = ?keys, "Submission rejected by validation");
                self.form_state.apply_errors(&errors);
                return;
            }
            Err(e) => {
                tracing::warn!("Submission could not be encoded: {}", e);
                self.form_state.message = Some(e.to_string());
                return;
            }
        };

        // A resubmission is the user's explicit retry of a failed load.
        if self.calculator.model_state() == InvokerState::Failed {
            self.calculator.reset_failed_load();
        }

        self.result_state = if self.calculator.model_state() == InvokerState::Ready {
            ResultState::Running
        } else {
            ResultState::Loading
        };
        self.form_state.message = None;
        self.pending_worker = Some(InferenceWorker::spawn(Arc::clone(&self.calculator), inputs));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::MockEngine;
    use crate::domain::{EncodingMode, FIELD_COUNT};
    use crate::ports::{EngineError, InferenceSession};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Engine whose load panics, taking the worker thread down with it.
    #[derive(Default)]
    struct PanickingEngine {
        loads: Arc<AtomicUsize>,
    }

    impl InferenceEngine for PanickingEngine {
        fn load(&self, _location: &Path) -> Result<Arc<dyn InferenceSession>, EngineError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            panic!("engine crashed while loading");
        }
    }

    fn app_with<E: InferenceEngine + 'static>(engine: E) -> App<E> {
        App::with_calculator(Arc::new(RiskCalculator::new(
            engine,
            "model.json",
            EncodingMode::Lenient,
        )))
    }

    fn wait_for_worker<E: InferenceEngine + 'static>(app: &mut App<E>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.pending_worker.is_some() && Instant::now() < deadline {
            app.poll_worker();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(app.pending_worker.is_none(), "worker did not finish");
    }

    #[test]
    fn test_invalid_submission_never_reaches_model() {
        let engine = MockEngine::returning(vec![0.73, 0.27]);
        let loads = Arc::clone(&engine.loads);
        let mut app = app_with(engine);

        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);

        assert!(app.pending_worker.is_none());
        assert_eq!(app.form_state.errors.len(), FIELD_COUNT);
        assert!(matches!(app.result_state, ResultState::Idle));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_submission_shows_result_and_clears_form() {
        let mut app = app_with(MockEngine::returning(vec![0.73, 0.27]));
        app.handle_key(KeyCode::Char('s'), KeyModifiers::NONE);
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert!(app.result_state.is_busy());

        wait_for_worker(&mut app);

        assert_eq!(app.result_state.line_text(), "Predicted Risk: 27%");
        assert_eq!(app.form_state.to_record().unset_count(), FIELD_COUNT);
    }

    #[test]
    fn test_second_submission_rejected_while_running() {
        let mut engine = MockEngine::returning(vec![0.5, 0.5]);
        engine.delay = Duration::from_millis(200);
        let loads = Arc::clone(&engine.loads);
        let mut app = app_with(engine);

        app.handle_key(KeyCode::Char('s'), KeyModifiers::NONE);
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(
            app.form_state.message.as_deref(),
            Some("A prediction is already running")
        );

        wait_for_worker(&mut app);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_shows_no_number_and_resubmit_retries() {
        let engine = MockEngine::returning(vec![0.73, 0.27]);
        engine.fail.store(true, Ordering::SeqCst);
        let fail = Arc::clone(&engine.fail);
        let mut app = app_with(engine);

        app.handle_key(KeyCode::Char('s'), KeyModifiers::NONE);
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        wait_for_worker(&mut app);

        assert!(matches!(app.result_state, ResultState::Idle));
        assert_eq!(app.result_state.line_text(), "");
        let message = app.form_state.message.clone().unwrap_or_default();
        assert!(message.starts_with("No result:"), "footer was {message:?}");
        assert!(!message.contains('%'));
        assert_eq!(app.calculator.model_state(), InvokerState::Failed);
        // Values are kept so the user can resubmit.
        assert_eq!(app.form_state.to_record().unset_count(), 0);

        fail.store(false, Ordering::SeqCst);
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        wait_for_worker(&mut app);
        assert_eq!(app.result_state.line_text(), "Predicted Risk: 27%");
    }

    #[test]
    fn test_worker_panic_releases_submission() {
        let engine = PanickingEngine::default();
        let loads = Arc::clone(&engine.loads);
        let mut app = app_with(engine);

        app.handle_key(KeyCode::Char('s'), KeyModifiers::NONE);
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        wait_for_worker(&mut app);

        assert!(!app.result_state.is_busy());
        assert_eq!(app.result_state.line_text(), "");
        assert!(app
            .form_state
            .message
            .as_deref()
            .is_some_and(|m| m.starts_with("No result:")));
        assert_eq!(app.calculator.model_state(), InvokerState::Failed);

        // The next submission is accepted and retries the load.
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert!(app.pending_worker.is_some());
        assert!(app.form_state.message.is_none());
        wait_for_worker(&mut app);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_quit_keys() {
        let mut app = app_with(MockEngine::returning(vec![0.5, 0.5]));
        app.handle_key(KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert!(app.should_quit);

        let mut app = app_with(MockEngine::returning(vec![0.5, 0.5]));
        app.handle_key(KeyCode::Esc, KeyModifiers::NONE);
        assert!(app.should_quit);
    }
}
