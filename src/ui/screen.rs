use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};

use crate::app::{App, AppState};
use crate::ui::render_feedback;

/// A UI Screen boundary: responsible for rendering one app state
pub trait Screen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer);
}

/// Question screen - calibration self-report or practice choices via the App widget
pub struct QuestionScreen;

impl Screen for QuestionScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        app.render(area, buf);
    }
}

/// Feedback screen - explanation for a missed question
pub struct FeedbackScreen;

impl Screen for FeedbackScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        render_feedback(app, area, buf);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: AppState) -> Box<dyn Screen> {
    match state {
        AppState::Asking => Box::new(QuestionScreen),
        AppState::Feedback => Box::new(FeedbackScreen),
    }
}
