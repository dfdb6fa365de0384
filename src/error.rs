use std::{io, path::PathBuf};

use thiserror::Error;

/// Problems with the environment. The only errors that stop the bot.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} should be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// A quiz file that could not be turned into a quiz. Never fatal.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("{path} contains no playable questions")]
    NoQuestions { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("quiz '{0}' not found")]
    UnknownQuiz(String),
    #[error("quiz '{0}' is loaded from the quiz directory and can't be changed")]
    ReadOnly(String),
    #[error("quiz '{0}' has no playable questions")]
    NoQuestions(String),
    #[error("quiz name is empty")]
    EmptyName,
    #[error("catalog file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("catalog file {path} is malformed: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

/// Mistakes a user can make while taking a quiz. Reported back as short messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("This quiz is no longer available.")]
    QuizNotFound,
    #[error("You are already in the middle of '{0}'. Finish it first or send /cancel.")]
    AlreadyInProgress(String),
    #[error("There is no active quiz. Send /start to pick one.")]
    NoActiveSession,
    #[error("This question has already been answered.")]
    AnswerNotAccepted,
    #[error("The quiz was stopped because a question couldn't be delivered.")]
    Interrupted,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Request(#[from] teloxide::RequestError),
    #[error("recipient {0} is unreachable")]
    Unreachable(i64),
}
