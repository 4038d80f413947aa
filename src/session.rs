use crate::calibration::{CalibrationAction, CalibrationOutcome, CalibrationState};
use crate::config::Config;
use crate::progression::{Outcome, OutcomeReport, ProgressionState};
use crate::selector::{self, CurrentLevelSelector, LevelSelector};
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuestionId(u64);

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PracticeMode {
    /// Level adapts per answer and earlier levels come back for review.
    #[default]
    Learning,
    /// Level still adapts, but questions are always asked at the current level.
    Worksheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PhaseKind {
    Calibration,
    Practice,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Calibrating(CalibrationState),
    Practicing(ProgressionState),
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Calibrating(_) => PhaseKind::Calibration,
            Phase::Practicing(_) => PhaseKind::Practice,
        }
    }
}

/// The question currently awaiting an answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuestionTicket {
    pub id: QuestionId,
    pub level: f64,
    pub phase: PhaseKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionUpdate {
    Calibrating { next_level: f64 },
    /// Calibration ended on this answer; practice starts at `level`.
    CalibrationFinished { level: f64 },
    Practiced(OutcomeReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no question is waiting for an answer")]
    NoPendingQuestion,
    #[error("question {got} is not the pending question {expected}")]
    StaleQuestion { expected: QuestionId, got: QuestionId },
    #[error("{actual} is active, this input belongs to {expected}")]
    WrongPhase { expected: PhaseKind, actual: PhaseKind },
}

/// Owns the active phase for one learner session and hands calibration's level to practice.
pub struct Session {
    config: Config,
    mode: PracticeMode,
    phase: Phase,
    selector: Box<dyn LevelSelector>,
    pending: Option<QuestionTicket>,
    next_id: u64,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("phase", &self.phase)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl Session {
    fn with_phase(config: Config, mode: PracticeMode, phase: Phase) -> Self {
        let selector: Box<dyn LevelSelector> = match mode {
            PracticeMode::Learning => selector::for_practice(&config),
            PracticeMode::Worksheet => Box::new(CurrentLevelSelector),
        };
        Self {
            config,
            mode,
            phase,
            selector,
            pending: None,
            next_id: 0,
        }
    }

    /// Fresh session starting with calibration.
    pub fn calibrate(config: Config, mode: PracticeMode) -> Self {
        let config = config.normalized();
        let state = CalibrationState::new(&config);
        Self::with_phase(config, mode, Phase::Calibrating(state))
    }

    /// Skip calibration, e.g. from a stored level.
    pub fn resume(config: Config, mode: PracticeMode, level: f64, streak: u32) -> Self {
        let config = config.normalized();
        let state = ProgressionState::with_streak(level, streak, &config);
        Self::with_phase(config, mode, Phase::Practicing(state))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> PracticeMode {
        self.mode
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn calibration(&self) -> Option<&CalibrationState> {
        match &self.phase {
            Phase::Calibrating(state) => Some(state),
            Phase::Practicing(_) => None,
        }
    }

    pub fn progression(&self) -> Option<&ProgressionState> {
        match &self.phase {
            Phase::Practicing(state) => Some(state),
            Phase::Calibrating(_) => None,
        }
    }

    /// Calibration candidate while calibrating, the learner's level afterwards.
    pub fn level(&self) -> f64 {
        match &self.phase {
            Phase::Calibrating(state) => state.current_level(),
            Phase::Practicing(state) => state.level(),
        }
    }

    pub fn pending(&self) -> Option<&QuestionTicket> {
        self.pending.as_ref()
    }

    /// Issue the next question, or hand back the one still waiting for an answer.
    pub fn next_question(&mut self, rng: &mut dyn RngCore) -> QuestionTicket {
        if let Some(ticket) = self.pending {
            return ticket;
        }

        let level = match &self.phase {
            Phase::Calibrating(state) => state.current_level(),
            Phase::Practicing(state) => self.selector.select_level(state.level(), rng),
        };
        self.next_id += 1;
        let ticket = QuestionTicket {
            id: QuestionId(self.next_id),
            level,
            phase: self.phase.kind(),
        };
        self.pending = Some(ticket);
        ticket
    }

    fn claim(&mut self, id: QuestionId, expected: PhaseKind) -> Result<QuestionTicket, SessionError> {
        let ticket = self.pending.ok_or(SessionError::NoPendingQuestion)?;
        if ticket.id != id {
            return Err(SessionError::StaleQuestion {
                expected: ticket.id,
                got: id,
            });
        }
        let actual = self.phase.kind();
        if actual != expected {
            return Err(SessionError::WrongPhase { expected, actual });
        }
        self.pending = None;
        Ok(ticket)
    }

    pub fn respond_calibration(
        &mut self,
        id: QuestionId,
        action: CalibrationAction,
        time_taken_secs: f64,
    ) -> Result<SessionUpdate, SessionError> {
        self.claim(id, PhaseKind::Calibration)?;
        Ok(self.calibration_step(|state, config| state.record_response(action, time_taken_secs, config)))
    }

    /// The calibration deadline for `id` passed without an answer.
    pub fn expire(&mut self, id: QuestionId) -> Result<SessionUpdate, SessionError> {
        self.claim(id, PhaseKind::Calibration)?;
        tracing::info!(question = %id, "calibration question timed out");
        Ok(self.calibration_step(|state, config| state.record_timeout(config)))
    }

    pub fn respond(
        &mut self,
        id: QuestionId,
        outcome: Outcome,
        time_taken_secs: f64,
    ) -> Result<SessionUpdate, SessionError> {
        self.claim(id, PhaseKind::Practice)?;
        match &mut self.phase {
            Phase::Practicing(state) => Ok(SessionUpdate::Practiced(state.apply_outcome(
                outcome,
                time_taken_secs,
                &self.config,
            ))),
            Phase::Calibrating(_) => Err(SessionError::WrongPhase {
                expected: PhaseKind::Practice,
                actual: PhaseKind::Calibration,
            }),
        }
    }

    fn calibration_step<F>(&mut self, step: F) -> SessionUpdate
    where
        F: FnOnce(&mut CalibrationState, &Config) -> CalibrationOutcome,
    {
        let outcome = match &mut self.phase {
            Phase::Calibrating(state) => step(state, &self.config),
            // claim() already checked the phase
            Phase::Practicing(state) => return SessionUpdate::CalibrationFinished { level: state.level() },
        };

        match outcome {
            CalibrationOutcome::InProgress { next_level } => SessionUpdate::Calibrating { next_level },
            CalibrationOutcome::Terminated { level } => {
                self.phase = Phase::Practicing(ProgressionState::new(level, &self.config));
                tracing::info!(level, "calibration handed off to practice");
                SessionUpdate::CalibrationFinished { level }
            }
        }
    }
}
