use std::{net::SocketAddr, ops::RangeInclusive, path::PathBuf, str::FromStr, time::Duration};

use url::Url;

use crate::error::ConfigError;

const DEFAULT_QUIZ_DIR: &str = "quizzes";
const DEFAULT_CATALOG_FILE: &str = "quizzes.json";
const DEFAULT_QUESTION_TIMEOUT_SECS: u64 = 45;

/// Open periods Telegram accepts for a poll.
pub const POLL_OPEN_PERIOD_SECS: RangeInclusive<u64> = 5..=600;

/// How answer options are put in front of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnswerMode {
    #[default]
    Buttons,
    Poll,
}

impl FromStr for AnswerMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buttons" | "button" | "inline" => Ok(AnswerMode::Buttons),
            "poll" | "polls" => Ok(AnswerMode::Poll),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Webhook {
    pub url: Url,
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub admin_id: Option<i64>,
    pub quiz_dir: PathBuf,
    pub catalog_file: PathBuf,
    pub question_timeout: Option<Duration>,
    pub answer_mode: AnswerMode,
    pub log_level: String,
    pub json_logs: bool,
    pub webhook: Option<Webhook>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let token = var("TELOXIDE_TOKEN").ok_or(ConfigError::Missing("TELOXIDE_TOKEN"))?;
        let admin_id = var("ADMIN_ID").map(|v| parse("ADMIN_ID", &v)).transpose()?;
        let timeout_secs = var("QUESTION_TIMEOUT_SECS")
            .map(|v| parse("QUESTION_TIMEOUT_SECS", &v))
            .transpose()?
            .unwrap_or(DEFAULT_QUESTION_TIMEOUT_SECS);
        let answer_mode = var("ANSWER_MODE")
            .map(|v| parse("ANSWER_MODE", &v))
            .transpose()?
            .unwrap_or_default();
        // A poll closes after its open period, so the question timer has to fit in it.
        if answer_mode == AnswerMode::Poll
            && timeout_secs > 0
            && !POLL_OPEN_PERIOD_SECS.contains(&timeout_secs)
        {
            return Err(ConfigError::Invalid {
                name: "QUESTION_TIMEOUT_SECS",
                value: timeout_secs.to_string(),
            });
        }

        let webhook = match (var("WEBHOOK_URL"), var("WEBHOOK_ADDR")) {
            (Some(url), Some(addr)) => Some(Webhook {
                url: parse("WEBHOOK_URL", &url)?,
                addr: parse("WEBHOOK_ADDR", &addr)?,
            }),
            _ => None,
        };

        Ok(Self {
            token,
            admin_id,
            quiz_dir: var("QUIZ_DIR").unwrap_or_else(|| DEFAULT_QUIZ_DIR.into()).into(),
            catalog_file: var("CATALOG_FILE")
                .unwrap_or_else(|| DEFAULT_CATALOG_FILE.into())
                .into(),
            question_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            answer_mode,
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            json_logs: var("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
            webhook,
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_id == Some(user_id)
    }
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_owned(),
    })
}
