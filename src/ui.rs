pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Notice};
use crate::progression::Outcome;
use crate::session::PhaseKind;
use screen::Screen;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;
const CHOICE_ROWS: u16 = crate::questions::CHOICES as u16;

fn header_line(app: &App) -> Line<'static> {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let mut spans = vec![Span::styled(app.level_text(), bold_style.fg(Color::Cyan))];

    if let Some(progress) = app.session.progression() {
        let config = app.session.config();
        let streak_style = if progress.is_turbo(config) {
            bold_style.fg(Color::Magenta)
        } else {
            Style::default()
        };
        let turbo = if progress.is_turbo(config) { " TURBO" } else { "" };
        spans.push(Span::raw("   "));
        spans.push(Span::styled(
            format!("streak {}{}", progress.streak(), turbo),
            streak_style,
        ));
        if let Some(accuracy) = progress.accuracy() {
            spans.push(Span::raw(format!("   {:.0}% acc", accuracy * 100.0)));
        }
        if let Some(pace) = progress.mean_speed() {
            spans.push(Span::styled(
                format!("   {:.0}% pace", pace * 100.0),
                Style::default().add_modifier(Modifier::DIM),
            ));
        }
    }

    Line::from(spans)
}

fn notice_span(notice: Option<Notice>, max_level: f64) -> Span<'static> {
    match notice {
        Some(Notice::Correct { turbo: true }) => Span::styled(
            "Correct! On a roll.",
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        ),
        Some(Notice::Correct { turbo: false }) => {
            Span::styled("Correct!", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        }
        Some(Notice::TimedOut) => Span::styled("Time's up.", Style::default().fg(Color::Yellow)),
        Some(Notice::Calibrated { level }) if level >= max_level => Span::styled(
            "Calibration done: starting at the top level.",
            Style::default().fg(Color::Cyan),
        ),
        Some(Notice::Calibrated { level }) => Span::styled(
            format!("Calibration done: starting at level {level:.1}."),
            Style::default().fg(Color::Cyan),
        ),
        None => Span::raw(""),
    }
}

fn prompt_lines(prompt: &str, width: u16) -> u16 {
    let width = width.max(1) as usize;
    prompt.width().div_ceil(width).max(1) as u16
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let Some(current) = &self.current else {
            return;
        };
        let inner_width = area.width.saturating_sub(HORIZONTAL_MARGIN * 2);
        let prompt_height = prompt_lines(&current.question.prompt, inner_width);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1),             // header
                Constraint::Length(1),             // notice
                Constraint::Min(1),                // padding
                Constraint::Length(prompt_height), // prompt
                Constraint::Length(1),             // padding
                Constraint::Length(CHOICE_ROWS),   // choices or countdown
                Constraint::Min(1),                // padding
                Constraint::Length(1),             // legend
            ])
            .split(area);

        Paragraph::new(header_line(self)).render(chunks[0], buf);
        Paragraph::new(notice_span(self.notice, self.session.config().max_level))
            .render(chunks[1], buf);

        Paragraph::new(Span::styled(current.question.prompt.clone(), bold_style))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[3], buf);

        let legend = match current.ticket.phase {
            PhaseKind::Calibration => {
                let mut lines = vec![Line::from(Span::styled(
                    "Do you know how to solve this?",
                    italic_style,
                ))];
                if let Some(secs) = self.seconds_remaining() {
                    lines.push(Line::from(Span::styled(format!("{secs:.1}"), dim_style)));
                }
                Paragraph::new(lines)
                    .alignment(Alignment::Center)
                    .render(chunks[5], buf);
                "(y)es / (n)o / (?) not sure / (esc)ape"
            }
            PhaseKind::Practice => {
                let lines: Vec<Line> = current
                    .question
                    .choices
                    .iter()
                    .enumerate()
                    .map(|(idx, choice)| Line::from(format!("{}) {}", idx + 1, choice)))
                    .collect();
                Paragraph::new(lines)
                    .alignment(Alignment::Center)
                    .render(chunks[5], buf);
                "(1-4) answer / (0) I don't know / (esc)ape"
            }
        };

        Paragraph::new(Span::styled(legend, italic_style))
            .alignment(Alignment::Center)
            .render(chunks[7], buf);
    }
}

/// Explanation shown after a missed or skipped practice question.
pub fn render_feedback(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(feedback) = &app.feedback else {
        return;
    };
    let bold_style = Style::default().add_modifier(Modifier::BOLD);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(header_line(app)).render(chunks[0], buf);

    let verdict = match feedback.report.outcome {
        Outcome::Unknown => Span::styled("No problem, here is how it works:", bold_style.fg(Color::Yellow)),
        _ => Span::styled("Not quite.", bold_style.fg(Color::Red)),
    };
    let mut lines = vec![
        Line::from(verdict),
        Line::from(""),
        Line::from(Span::styled(feedback.question.prompt.clone(), bold_style)),
    ];
    if let Some(chosen) = feedback.chosen.and_then(|idx| feedback.question.choices.get(idx)) {
        lines.push(Line::from(Span::styled(
            format!("Your answer: {chosen}"),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(Span::styled(
        format!("Answer: {}", feedback.question.correct_answer()),
        Style::default().fg(Color::Green),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(feedback.question.explanation.clone()));

    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Explanation"))
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        "(enter) next question / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);
}

/// Full-frame render for the current state.
pub fn draw(app: &App, area: Rect, buf: &mut Buffer) {
    screen::current_screen(app.state).render(app, area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::questions::ArithmeticSource;
    use crate::session::{PracticeMode, Session};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use rand::{rngs::StdRng, SeedableRng};

    fn rendered(app: &App, width: u16, height: u16) -> String {
        let area = Rect::new(0, 0, width, height);
        let mut buffer = Buffer::empty(area);
        draw(app, area, &mut buffer);
        buffer.content.iter().map(|c| c.symbol()).collect()
    }

    fn app(session: Session) -> App {
        let mut app = App::new(session, Box::new(ArithmeticSource), StdRng::seed_from_u64(7));
        app.start();
        app
    }

    #[test]
    fn test_practice_screen_shows_choices() {
        let mut config = Config::default();
        config.review.deterministic = true;
        let app = app(Session::resume(config, PracticeMode::Learning, 3.0, 0));

        let content = rendered(&app, 80, 24);
        assert!(content.contains("I don't know"));
        for choice in &app.current.as_ref().unwrap().question.choices {
            assert!(content.contains(choice.as_str()));
        }
    }

    #[test]
    fn test_header_shows_pace_after_correct_answer() {
        let mut config = Config::default();
        config.review.deterministic = true;
        let mut app = app(Session::resume(config, PracticeMode::Learning, 3.0, 0));
        assert!(!rendered(&app, 80, 24).contains("pace"));

        let correct = app.current.as_ref().unwrap().question.correct;
        let key = char::from(b'1' + correct as u8);
        app.on_key(KeyEvent::new(KeyCode::Char(key), KeyModifiers::NONE));

        let content = rendered(&app, 80, 24);
        assert!(content.contains("100% acc"));
        assert!(content.contains("100% pace"));
    }

    #[test]
    fn test_calibration_screen_asks_for_self_report() {
        let app = app(Session::calibrate(Config::default(), PracticeMode::Learning));
        let content = rendered(&app, 80, 24);
        assert!(content.contains("Do you know how to solve this?"));
        assert!(content.contains("Finding your level"));
    }

    #[test]
    fn test_feedback_screen_shows_explanation() {
        let mut config = Config::default();
        config.review.deterministic = true;
        let mut app = app(Session::resume(config, PracticeMode::Learning, 3.0, 0));
        app.on_key(KeyEvent::new(KeyCode::Char('0'), KeyModifiers::NONE));

        let content = rendered(&app, 100, 24);
        assert!(content.contains("Explanation"));
        assert!(content.contains("Answer:"));
    }

    #[test]
    fn test_renders_in_tiny_area_without_panic() {
        let app = app(Session::calibrate(Config::default(), PracticeMode::Worksheet));
        for (w, h) in [(1, 1), (10, 3), (20, 40), (200, 5)] {
            rendered(&app, w, h);
        }
    }

    #[test]
    fn test_prompt_lines() {
        assert_eq!(prompt_lines("abcd", 2), 2);
        assert_eq!(prompt_lines("", 10), 1);
        assert_eq!(prompt_lines("abc", 0), 3);
    }
}
