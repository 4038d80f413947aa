use std::collections::HashMap;

/// Questions missed within this many asks are always allowed back.
const RECENT_WINDOW: u64 = 5;
/// Redraws at one level before falling back to a neighbour.
pub const MAX_REDRAWS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Entry {
    asked: u32,
    correct: u32,
    incorrect: u32,
    last_asked: u64,
}

/// Per-session record of asked questions, keyed by signature.
#[derive(Debug, Default)]
pub struct QuestionLog {
    entries: HashMap<String, Entry>,
    asked_total: u64,
}

impl QuestionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asked_total(&self) -> u64 {
        self.asked_total
    }

    /// `correct` is `None` for answers that are not graded (e.g. "don't know").
    pub fn record(&mut self, signature: &str, correct: Option<bool>) {
        self.asked_total += 1;
        let entry = self.entries.entry(signature.to_string()).or_default();
        entry.asked += 1;
        entry.last_asked = self.asked_total;
        match correct {
            Some(true) => entry.correct += 1,
            Some(false) => entry.incorrect += 1,
            None => {}
        }
    }

    fn is_frequent(&self, signature: &str) -> bool {
        self.entries
            .get(signature)
            .is_some_and(|e| e.correct > e.incorrect)
    }

    fn is_recently_missed(&self, signature: &str) -> bool {
        self.entries.get(signature).is_some_and(|e| {
            e.incorrect > 0 && self.asked_total.saturating_sub(e.last_asked) <= RECENT_WINDOW
        })
    }

    /// A question the learner keeps getting right is skipped, unless they missed it lately.
    pub fn should_skip(&self, signature: &str) -> bool {
        self.is_frequent(signature) && !self.is_recently_missed(signature)
    }

    /// Draw up to [`MAX_REDRAWS`] candidates from each level in order, returning the first
    /// that should not be skipped; if all are stale, the first draw at the first level.
    pub fn pick<Q, F>(&self, levels: &[f64], mut draw: F, signature: impl Fn(&Q) -> String) -> Option<Q>
    where
        F: FnMut(f64) -> Q,
    {
        let mut fallback = None;
        for &level in levels {
            for _ in 0..MAX_REDRAWS {
                let candidate = draw(level);
                if !self.should_skip(&signature(&candidate)) {
                    return Some(candidate);
                }
                if fallback.is_none() {
                    fallback = Some(candidate);
                }
            }
        }
        fallback
    }
}
