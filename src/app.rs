use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use rand::rngs::StdRng;

use crate::calibration::CalibrationAction;
use crate::deadline::{start_deadline, DeadlineHandle};
use crate::display::{format_level, DisplayMode};
use crate::progression::{Outcome, OutcomeReport};
use crate::question_log::QuestionLog;
use crate::questions::{Question, QuestionSource, CHOICES};
use crate::runtime::PracticeEvent;
use crate::session::{PhaseKind, QuestionTicket, Session, SessionError, SessionUpdate};
use crate::stats::{AnswerRecord, ProgressDb};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Asking,
    /// Explanation for a missed or skipped practice question, dismissed with Enter.
    Feedback,
}

/// The question on screen and the ticket it answers.
#[derive(Debug, Clone)]
pub struct ActiveQuestion {
    pub ticket: QuestionTicket,
    pub question: Question,
    pub asked_at: Instant,
}

#[derive(Debug, Clone)]
pub struct Feedback {
    pub question: Question,
    pub chosen: Option<usize>,
    pub report: OutcomeReport,
}

/// Short status line carried over to the next question.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notice {
    Correct { turbo: bool },
    TimedOut,
    Calibrated { level: f64 },
}

pub struct App {
    pub session: Session,
    pub state: AppState,
    pub display_mode: DisplayMode,
    pub current: Option<ActiveQuestion>,
    pub feedback: Option<Feedback>,
    pub notice: Option<Notice>,
    pub should_quit: bool,
    source: Box<dyn QuestionSource>,
    log: QuestionLog,
    rng: StdRng,
    db: Option<ProgressDb>,
    events: Option<Sender<PracticeEvent>>,
    deadline: Option<DeadlineHandle>,
}

impl App {
    pub fn new(session: Session, source: Box<dyn QuestionSource>, rng: StdRng) -> Self {
        let display_mode = session.config().display_mode;
        Self {
            session,
            state: AppState::Asking,
            display_mode,
            current: None,
            feedback: None,
            notice: None,
            should_quit: false,
            source,
            log: QuestionLog::new(),
            rng,
            db: None,
            events: None,
            deadline: None,
        }
    }

    pub fn with_db(mut self, db: ProgressDb) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_display_mode(mut self, mode: DisplayMode) -> Self {
        self.display_mode = mode;
        self
    }

    /// Calibration deadlines post [`PracticeEvent::DeadlineExpired`] here. Without a
    /// sender no deadline runs.
    pub fn with_events(mut self, events: Sender<PracticeEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn db(&self) -> Option<&ProgressDb> {
        self.db.as_ref()
    }

    /// Put the first question on screen.
    pub fn start(&mut self) {
        if self.current.is_none() {
            self.ask_next();
        }
    }

    fn ask_next(&mut self) {
        let ticket = self.session.next_question(&mut self.rng);
        let config = self.session.config();

        let mut levels = vec![ticket.level];
        if ticket.phase == PhaseKind::Practice {
            levels.extend(
                [ticket.level - 1.0, ticket.level + 1.0]
                    .into_iter()
                    .filter(|l| (config.min_level..=config.max_level).contains(l)),
            );
        }

        let source = &self.source;
        let rng = &mut self.rng;
        let question = self
            .log
            .pick(&levels, |level| source.question_at(level, rng), Question::signature)
            .unwrap_or_else(|| source.question_at(ticket.level, rng));

        if ticket.phase == PhaseKind::Calibration {
            self.arm_deadline(ticket);
        }

        self.current = Some(ActiveQuestion {
            ticket,
            question,
            asked_at: Instant::now(),
        });
        self.feedback = None;
        self.state = AppState::Asking;
    }

    fn arm_deadline(&mut self, ticket: QuestionTicket) {
        self.disarm_deadline();
        let Some(events) = self.events.clone() else {
            return;
        };
        let secs = self.session.config().calibration.deadline_secs;
        let duration = Duration::try_from_secs_f64(secs).unwrap_or(Duration::from_secs(15));
        self.deadline = Some(start_deadline(duration, move || {
            let _ = events.send(PracticeEvent::DeadlineExpired(ticket.id));
        }));
    }

    fn disarm_deadline(&mut self) {
        if let Some(handle) = self.deadline.take() {
            handle.cancel();
        }
    }

    /// Seconds left on the calibration countdown.
    pub fn seconds_remaining(&self) -> Option<f64> {
        let current = self.current.as_ref()?;
        if current.ticket.phase != PhaseKind::Calibration || self.events.is_none() {
            return None;
        }
        let deadline = self.session.config().calibration.deadline_secs;
        Some((deadline - current.asked_at.elapsed().as_secs_f64()).max(0.0))
    }

    /// Learner-facing level text for the current display mode.
    pub fn level_text(&self) -> String {
        let config = self.session.config();
        match self.session.calibration() {
            Some(cal) => format!("Finding your level ({:.1}-{:.1})", cal.low(), cal.high()),
            None => {
                let accuracy = self.session.progression().and_then(|p| p.accuracy());
                format_level(self.display_mode, self.session.level(), config.max_level, accuracy)
            }
        }
    }

    pub fn on_event(&mut self, event: PracticeEvent) {
        match event {
            PracticeEvent::Key(key) => self.on_key(key),
            PracticeEvent::DeadlineExpired(id) => match self.session.expire(id) {
                Ok(update) => {
                    self.deadline = None;
                    let secs = self.session.config().calibration.deadline_secs;
                    self.after_calibration(CalibrationAction::Fail, secs, update);
                    if self.notice.is_none() {
                        self.notice = Some(Notice::TimedOut);
                    }
                }
                Err(err) => tracing::debug!(%err, "ignoring deadline expiry"),
            },
            PracticeEvent::Tick | PracticeEvent::Resize => {}
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            self.quit();
            return;
        }

        match self.state {
            AppState::Feedback => {
                if key.code == KeyCode::Enter {
                    self.ask_next();
                }
            }
            AppState::Asking => {
                let Some(phase) = self.current.as_ref().map(|c| c.ticket.phase) else {
                    return;
                };
                let KeyCode::Char(c) = key.code else {
                    return;
                };
                match phase {
                    PhaseKind::Calibration => {
                        let action = match c {
                            'y' | 'Y' => CalibrationAction::Pass,
                            'n' | 'N' => CalibrationAction::Fail,
                            '?' => CalibrationAction::Doubt,
                            _ => return,
                        };
                        self.answer_calibration(action);
                    }
                    PhaseKind::Practice => match c {
                        '0' => self.answer_practice(None),
                        '1'..='9' => {
                            let idx = c as usize - '1' as usize;
                            if idx < CHOICES {
                                self.answer_practice(Some(idx));
                            }
                        }
                        _ => {}
                    },
                }
            }
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.current
            .as_ref()
            .map(|c| c.asked_at.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn answer_calibration(&mut self, action: CalibrationAction) {
        let Some(id) = self.current.as_ref().map(|c| c.ticket.id) else {
            return;
        };
        let secs = self.elapsed_secs();
        match self.session.respond_calibration(id, action, secs) {
            Ok(update) => {
                self.disarm_deadline();
                self.after_calibration(action, secs, update);
            }
            Err(err) => log_rejected(err),
        }
    }

    fn after_calibration(&mut self, action: CalibrationAction, secs: f64, update: SessionUpdate) {
        let known = match action {
            CalibrationAction::Pass => Some(true),
            CalibrationAction::Fail => Some(false),
            CalibrationAction::Doubt => None,
        };
        self.notice = None;
        self.record(PhaseKind::Calibration, action.to_string(), secs, known);

        if let SessionUpdate::CalibrationFinished { level } = update {
            self.notice = Some(Notice::Calibrated { level });
            self.save_snapshot();
        }
        self.ask_next();
    }

    /// `None` is "I don't know".
    pub fn answer_practice(&mut self, choice: Option<usize>) {
        let Some(current) = self.current.as_ref() else {
            return;
        };
        let id = current.ticket.id;
        let correct = choice.is_some_and(|c| current.question.is_correct(c));
        let outcome = Outcome::from_flags(correct, choice.is_none());
        let secs = self.elapsed_secs();

        let report = match self.session.respond(id, outcome, secs) {
            Ok(SessionUpdate::Practiced(report)) => report,
            Ok(other) => {
                tracing::warn!(?other, "unexpected update for a practice answer");
                return;
            }
            Err(err) => {
                log_rejected(err);
                return;
            }
        };

        let graded = match outcome {
            Outcome::Unknown => None,
            _ => Some(correct),
        };
        self.record(PhaseKind::Practice, outcome.to_string(), secs, graded);
        self.save_snapshot();

        if report.show_explanation {
            let question = self.current.as_ref().map(|c| c.question.clone());
            if let Some(question) = question {
                self.feedback = Some(Feedback {
                    question,
                    chosen: choice,
                    report,
                });
            }
            self.notice = None;
            self.state = AppState::Feedback;
        } else {
            self.notice = Some(Notice::Correct {
                turbo: report.turbo,
            });
            self.ask_next();
        }
    }

    fn record(&mut self, phase: PhaseKind, response: String, secs: f64, correct: Option<bool>) {
        let Some(current) = self.current.as_ref() else {
            return;
        };
        self.log.record(&current.question.signature(), correct);

        if let Some(db) = &self.db {
            let answer = AnswerRecord {
                recorded_at: Local::now(),
                phase: phase.to_string(),
                question_level: current.ticket.level,
                prompt: current.question.prompt.clone(),
                response,
                time_taken_secs: secs,
                level_after: self.session.level(),
            };
            if let Err(err) = db.record_answer(&answer) {
                tracing::warn!(%err, "failed to record answer");
            }
        }
    }

    fn save_snapshot(&self) {
        let (Some(db), Some(progress)) = (&self.db, self.session.progression()) else {
            return;
        };
        if let Err(err) = db.save_snapshot(progress.level(), progress.streak()) {
            tracing::warn!(%err, "failed to save progress snapshot");
        }
    }

    pub fn quit(&mut self) {
        self.disarm_deadline();
        self.should_quit = true;
    }
}

fn log_rejected(err: SessionError) {
    tracing::debug!(%err, "answer rejected");
}
