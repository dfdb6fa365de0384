use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod catalog;
pub mod loader;
pub mod parser;

/// Category used for quizzes that live directly in the quiz directory and for
/// quizzes added by the administrator.
pub const DEFAULT_CATEGORY: &str = "General";

/// One question with exactly one correct answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "question")]
    text: String,
    correct: String,
    #[serde(default)]
    incorrect: Vec<String>,
}

impl Question {
    pub fn new(text: impl Into<String>, correct: impl Into<String>, incorrect: Vec<String>) -> Self {
        Self {
            text: text.into(),
            correct: correct.into(),
            incorrect,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn correct(&self) -> &str {
        &self.correct
    }

    pub fn incorrect(&self) -> &[String] {
        &self.incorrect
    }

    /// A question can be played only if there is something to choose between.
    pub fn is_playable(&self) -> bool {
        !self.incorrect.is_empty()
    }

    /// Correct answer first, then the incorrect ones in file order.
    pub fn options(&self) -> Vec<String> {
        let mut options = Vec::with_capacity(self.incorrect.len() + 1);
        options.push(self.correct.clone());
        options.extend(self.incorrect.iter().cloned());
        options
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.text)?;
        writeln!(f, "+{}", self.correct)?;
        for option in &self.incorrect {
            writeln!(f, "-{}", option)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuizId(Uuid);

impl QuizId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Compact form used inside callback data.
    pub fn encode(&self) -> String {
        self.0.simple().to_string()
    }

    pub fn decode(s: &str) -> Option<Self> {
        Uuid::try_parse(s).ok().map(Self)
    }
}

impl Default for QuizId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named, ordered list of questions filed under a category.
#[derive(Debug, Clone)]
pub struct Quiz {
    id: QuizId,
    name: String,
    category: String,
    questions: Vec<Question>,
}

impl Quiz {
    pub fn new(name: impl Into<String>, category: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            id: QuizId::new(),
            name: name.into(),
            category: category.into(),
            questions,
        }
    }

    pub fn id(&self) -> QuizId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
