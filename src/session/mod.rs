use std::{fmt, sync::Arc};

use rand::{seq::SliceRandom, Rng};
use uuid::Uuid;

use crate::{
    error::QuizError,
    notifier::{EndReport, EndStatus},
    quiz::Quiz,
    timer::TimerHandle,
};

pub mod store;

/// Chat a session belongs to. One session per chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey(pub i64);

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Distinguishes consecutive sessions of the same chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn encode(&self) -> String {
        self.0.simple().to_string()
    }

    pub fn decode(s: &str) -> Option<Self> {
        Uuid::try_parse(s).ok().map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Points at one question of one session. Answers and timers carry it so that
/// they can only ever act on the question they were issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuestionRef {
    pub key: SessionKey,
    pub session: SessionId,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: i64,
    pub name: String,
    pub username: Option<String>,
}

impl fmt::Display for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.username {
            Some(username) => write!(f, "{} (@{})", self.name, username),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A question ready to be shown, options already shuffled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub question: QuestionRef,
    pub total: usize,
    pub text: String,
    pub options: Vec<String>,
    pub correct: usize,
}

impl Prompt {
    pub fn header(&self) -> String {
        format!("({}/{}) {}", self.question.index + 1, self.total, self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect { chosen: String },
    TimedOut,
}

/// A question that has been answered or has run out of time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedQuestion {
    pub question: QuestionRef,
    pub correct_answer: String,
    pub verdict: Verdict,
}

impl ClosedQuestion {
    pub fn is_correct(&self) -> bool {
        self.verdict == Verdict::Correct
    }
}

/// State of the question currently on screen.
#[derive(Debug)]
struct Turn {
    index: usize,
    options: Vec<String>,
    correct: usize,
    /// Set by whichever of answer or timeout gets here first.
    answered: bool,
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    quiz: Arc<Quiz>,
    user: UserInfo,
    index: usize,
    score: usize,
    turn: Option<Turn>,
    timer: Option<TimerHandle>,
}

impl Session {
    pub fn new(quiz: Arc<Quiz>, user: UserInfo) -> Self {
        Self {
            id: SessionId::new(),
            quiz,
            user,
            index: 0,
            score: 0,
            turn: None,
            timer: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn quiz(&self) -> &Arc<Quiz> {
        &self.quiz
    }

    pub fn user(&self) -> &UserInfo {
        &self.user
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn total(&self) -> usize {
        self.quiz.len()
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.quiz.len()
    }

    /// Whether answers or a timeout for `question` can still be accepted.
    pub fn is_awaiting(&self, question: &QuestionRef) -> bool {
        question.session == self.id
            && self
                .turn
                .as_ref()
                .is_some_and(|turn| turn.index == question.index && !turn.answered)
    }

    /// Shuffles the options of the current question and opens a turn for it.
    /// Returns `None` once every question has been asked.
    pub fn next_turn<R: Rng + ?Sized>(&mut self, key: SessionKey, rng: &mut R) -> Option<Prompt> {
        let question = self.quiz.questions().get(self.index)?;

        let mut options: Vec<(bool, String)> = std::iter::once((true, question.correct().to_owned()))
            .chain(question.incorrect().iter().map(|o| (false, o.clone())))
            .collect();
        options.shuffle(rng);
        let correct = options.iter().position(|(is_correct, _)| *is_correct).unwrap_or(0);
        let options: Vec<String> = options.into_iter().map(|(_, text)| text).collect();

        self.turn = Some(Turn {
            index: self.index,
            options: options.clone(),
            correct,
            answered: false,
        });

        Some(Prompt {
            question: QuestionRef {
                key,
                session: self.id,
                index: self.index,
            },
            total: self.total(),
            text: question.text().to_owned(),
            options,
            correct,
        })
    }

    fn claim(&mut self, question: &QuestionRef) -> Option<&mut Turn> {
        if !self.is_awaiting(question) {
            return None;
        }
        let turn = self.turn.as_mut()?;
        turn.answered = true;
        Some(turn)
    }

    /// Accepts the answer at most once per question.
    pub fn claim_answer(
        &mut self,
        question: &QuestionRef,
        option: usize,
    ) -> Result<ClosedQuestion, QuizError> {
        let valid = self
            .turn
            .as_ref()
            .is_some_and(|turn| option < turn.options.len());
        if !valid {
            return Err(QuizError::AnswerNotAccepted);
        }
        let turn = self.claim(question).ok_or(QuizError::AnswerNotAccepted)?;
        let correct_answer = turn.options[turn.correct].clone();
        let verdict = if option == turn.correct {
            Verdict::Correct
        } else {
            Verdict::Incorrect {
                chosen: turn.options[option].clone(),
            }
        };
        Ok(ClosedQuestion {
            question: *question,
            correct_answer,
            verdict,
        })
    }

    /// Closes the question on timeout unless an answer got there first.
    pub fn claim_timeout(&mut self, question: &QuestionRef) -> Option<ClosedQuestion> {
        let turn = self.claim(question)?;
        Some(ClosedQuestion {
            question: *question,
            correct_answer: turn.options[turn.correct].clone(),
            verdict: Verdict::TimedOut,
        })
    }

    /// Moves past a claimed question, scoring it. Score and index change together.
    pub fn advance(&mut self, closed: &ClosedQuestion) -> bool {
        let claimed = closed.question.session == self.id
            && self
                .turn
                .as_ref()
                .is_some_and(|turn| turn.index == closed.question.index && turn.answered);
        if !claimed {
            return false;
        }
        if closed.is_correct() {
            self.score += 1;
        }
        self.index += 1;
        self.turn = None;
        true
    }

    /// Keeps the timer of the open question; a timer for anything else is
    /// cancelled right away.
    pub fn set_timer(&mut self, question: &QuestionRef, handle: TimerHandle) {
        if self.is_awaiting(question) {
            if let Some(previous) = self.timer.replace(handle) {
                previous.cancel();
            }
        } else {
            handle.cancel();
        }
    }

    pub fn take_timer(&mut self) -> Option<TimerHandle> {
        self.timer.take()
    }

    pub fn report(&self, key: SessionKey, status: EndStatus) -> EndReport {
        EndReport {
            key,
            user: self.user.clone(),
            quiz_name: self.quiz.name().to_owned(),
            score: self.score,
            answered: self.index,
            total: self.total(),
            status,
        }
    }
}
