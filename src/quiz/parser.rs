//! Plain-text quiz format.
//!
//! ```text
//! 2+2=?
//! +4
//! -3
//! -5
//! ```
//!
//! A line starting with `+` is the correct answer of the current question, a
//! line starting with `-` is an incorrect option, any other non-blank line
//! starts a new question. Blank lines carry no meaning.

use super::Question;

#[derive(Debug, Default)]
struct Draft {
    text: String,
    correct: Option<String>,
    incorrect: Vec<String>,
}

impl Draft {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            ..Default::default()
        }
    }

    /// Drafts without a correct answer are dropped. A bare `+` does not count.
    fn finish(self) -> Option<Question> {
        let correct = self.correct.filter(|c| !c.is_empty())?;
        Some(Question::new(self.text, correct, self.incorrect))
    }
}

pub fn parse_questions(content: &str) -> Vec<Question> {
    let mut questions = Vec::new();
    let mut current: Option<Draft> = None;

    for line in content.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }

        if let Some(answer) = line.strip_prefix('+') {
            if let Some(draft) = current.as_mut() {
                draft.correct = Some(answer.trim().to_owned());
            }
        } else if let Some(option) = line.strip_prefix('-') {
            if let Some(draft) = current.as_mut() {
                draft.incorrect.push(option.trim().to_owned());
            }
        } else {
            questions.extend(current.take().and_then(Draft::finish));
            current = Some(Draft::new(line));
        }
    }

    questions.extend(current.and_then(Draft::finish));
    questions
}
