use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

pub const CHOICES: usize = 4;

/// A multiple-choice question. The engine never looks inside; it only sees the graded outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub level: f64,
    pub prompt: String,
    pub choices: Vec<String>,
    pub correct: usize,
    pub explanation: String,
}

impl Question {
    /// Identity used for repeat avoidance within a session.
    pub fn signature(&self) -> String {
        format!("{}_{}", self.prompt, self.correct_answer())
    }

    pub fn correct_answer(&self) -> &str {
        &self.choices[self.correct]
    }

    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct
    }
}

/// Produces a question for a difficulty level.
pub trait QuestionSource {
    fn question_at(&self, level: f64, rng: &mut dyn RngCore) -> Question;
}

/// Small built-in generator so the app is usable without a content pack.
/// Difficulty band is the rounded level; operands grow with it.
pub struct ArithmeticSource;

impl ArithmeticSource {
    fn build(level: f64, prompt: String, answer: i64, explanation: String, rng: &mut dyn RngCore) -> Question {
        let mut values = vec![answer];
        let mut offsets: Vec<i64> = vec![-10, -3, -2, -1, 1, 2, 3, 10];
        offsets.shuffle(&mut *rng);
        for offset in offsets {
            if values.len() == CHOICES {
                break;
            }
            let candidate = answer + offset;
            if !values.contains(&candidate) {
                values.push(candidate);
            }
        }
        values.shuffle(&mut *rng);

        let correct = values.iter().position(|&v| v == answer).unwrap_or(0);
        Question {
            level,
            prompt,
            choices: values.into_iter().map(|v| v.to_string()).collect(),
            correct,
            explanation,
        }
    }
}

impl QuestionSource for ArithmeticSource {
    fn question_at(&self, level: f64, rng: &mut dyn RngCore) -> Question {
        let band = level.round().max(1.0) as i64;
        let span = 5 * band;

        match band {
            1..=3 => {
                let (a, b) = (rng.gen_range(1..=span), rng.gen_range(1..=span));
                Self::build(
                    level,
                    format!("{a} + {b} = ?"),
                    a + b,
                    format!("Add the two numbers: {a} + {b} = {}.", a + b),
                    rng,
                )
            }
            4..=8 => {
                let (a, b) = (rng.gen_range(2..=band + 4), rng.gen_range(2..=12));
                Self::build(
                    level,
                    format!("{a} × {b} = ?"),
                    a * b,
                    format!("{a} groups of {b} make {}.", a * b),
                    rng,
                )
            }
            9..=16 => {
                let x = rng.gen_range(-band..=band);
                let a = rng.gen_range(2..=band / 2 + 2);
                let b = rng.gen_range(-span..=span);
                let c = a * x + b;
                Self::build(
                    level,
                    format!("Solve for x: {a}x + ({b}) = {c}"),
                    x,
                    format!("Subtract {b} from both sides to get {a}x = {}, then divide by {a}.", c - b),
                    rng,
                )
            }
            _ => {
                let r1 = rng.gen_range(1..=band);
                let r2 = rng.gen_range(-band..r1);
                let (s, p) = (r1 + r2, r1 * r2);
                Self::build(
                    level,
                    format!("Larger root of x² - ({s})x + ({p}) = 0"),
                    r1,
                    format!("It factors as (x - {r1})(x - ({r2})), so the roots are {r1} and {r2}."),
                    rng,
                )
            }
        }
    }
}
