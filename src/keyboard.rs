use std::{fmt, str::FromStr};

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::{
    quiz::{Quiz, QuizId},
    session::{Prompt, QuestionRef, SessionId, SessionKey},
};

/// Everything a button can ask for. Encoded into at most 64 bytes of
/// callback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackData {
    MainMenu,
    Category(usize),
    QuizInfo(QuizId),
    StartQuiz(QuizId),
    Answer {
        session: SessionId,
        index: usize,
        option: usize,
    },
}

impl CallbackData {
    /// The question an answer button belongs to, in the chat it was pressed in.
    pub fn answer(&self, key: SessionKey) -> Option<(QuestionRef, usize)> {
        match *self {
            CallbackData::Answer {
                session,
                index,
                option,
            } => Some((QuestionRef { key, session, index }, option)),
            _ => None,
        }
    }
}

impl fmt::Display for CallbackData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackData::MainMenu => write!(f, "menu"),
            CallbackData::Category(i) => write!(f, "cat:{}", i),
            CallbackData::QuizInfo(id) => write!(f, "info:{}", id.encode()),
            CallbackData::StartQuiz(id) => write!(f, "go:{}", id.encode()),
            CallbackData::Answer {
                session,
                index,
                option,
            } => write!(f, "ans:{}:{}:{}", session.encode(), index, option),
        }
    }
}

impl FromStr for CallbackData {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let data = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("menu"), None, _, _) => CallbackData::MainMenu,
            (Some("cat"), Some(i), None, _) => CallbackData::Category(i.parse().map_err(|_| ())?),
            (Some("info"), Some(id), None, _) => CallbackData::QuizInfo(QuizId::decode(id).ok_or(())?),
            (Some("go"), Some(id), None, _) => CallbackData::StartQuiz(QuizId::decode(id).ok_or(())?),
            (Some("ans"), Some(session), Some(index), Some(option)) => CallbackData::Answer {
                session: SessionId::decode(session).ok_or(())?,
                index: index.parse().map_err(|_| ())?,
                option: option.parse().map_err(|_| ())?,
            },
            _ => return Err(()),
        };
        if parts.next().is_some() {
            return Err(());
        }
        Ok(data)
    }
}

fn button(text: impl Into<String>, data: CallbackData) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, data.to_string())
}

pub(crate) fn categories_keyboard(categories: &[String]) -> InlineKeyboardMarkup {
    let keyboard = categories
        .iter()
        .enumerate()
        .map(|(i, category)| vec![button(category, CallbackData::Category(i))]);

    InlineKeyboardMarkup::new(keyboard)
}

pub(crate) fn quizzes_keyboard<'a>(quizzes: impl IntoIterator<Item = &'a Quiz>) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = quizzes
        .into_iter()
        .map(|quiz| vec![button(quiz.name(), CallbackData::QuizInfo(quiz.id()))])
        .collect();
    keyboard.push(vec![button("🔙 Back to main menu", CallbackData::MainMenu)]);

    InlineKeyboardMarkup::new(keyboard)
}

pub(crate) fn quiz_info_keyboard(quiz: QuizId, category: usize) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("🚀 Start the quiz", CallbackData::StartQuiz(quiz))],
        vec![button("🔙 Back to quizzes", CallbackData::Category(category))],
    ])
}

pub(crate) fn answers_keyboard(prompt: &Prompt) -> InlineKeyboardMarkup {
    let keyboard = prompt.options.iter().enumerate().map(|(option, text)| {
        vec![button(
            text,
            CallbackData::Answer {
                session: prompt.question.session,
                index: prompt.question.index,
                option,
            },
        )]
    });

    InlineKeyboardMarkup::new(keyboard)
}
