//! Stand-ins for Telegram and the clock.

use std::{collections::HashSet, sync::Mutex, time::Duration};

use crate::{
    error::DeliveryError,
    session::{ClosedQuestion, Prompt, QuestionRef},
    timer::{Scheduler, TimerHandle},
    transport::Transport,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Question(Prompt),
    Closed(ClosedQuestion),
    Text { chat: i64, text: String },
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    unreachable: HashSet<i64>,
    fail_questions: bool,
}

impl RecordingTransport {
    pub fn unreachable(chats: impl IntoIterator<Item = i64>) -> Self {
        Self {
            unreachable: chats.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn failing_questions() -> Self {
        Self {
            fail_questions: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Question(prompt) => Some(prompt),
                _ => None,
            })
            .collect()
    }

    pub fn last_prompt(&self) -> Option<Prompt> {
        self.prompts().pop()
    }

    pub fn closed(&self) -> Vec<ClosedQuestion> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Closed(closed) => Some(closed),
                _ => None,
            })
            .collect()
    }

    pub fn texts_to(&self, chat: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { chat: to, text } if to == chat => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

impl Transport for RecordingTransport {
    async fn send_question(&self, prompt: &Prompt) -> Result<(), DeliveryError> {
        if self.fail_questions || self.unreachable.contains(&prompt.question.key.0) {
            return Err(DeliveryError::Unreachable(prompt.question.key.0));
        }
        self.record(Sent::Question(prompt.clone()));
        Ok(())
    }

    async fn close_question(&self, closed: &ClosedQuestion) -> Result<(), DeliveryError> {
        self.record(Sent::Closed(closed.clone()));
        Ok(())
    }

    async fn send_text(&self, chat: i64, text: &str) -> Result<(), DeliveryError> {
        if self.unreachable.contains(&chat) {
            return Err(DeliveryError::Unreachable(chat));
        }
        self.record(Sent::Text {
            chat,
            text: text.to_owned(),
        });
        Ok(())
    }
}

/// Remembers what was scheduled; tests fire the timeouts themselves.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    scheduled: Mutex<Vec<(QuestionRef, Duration)>>,
}

impl ManualScheduler {
    pub fn scheduled(&self) -> Vec<(QuestionRef, Duration)> {
        self.scheduled.lock().unwrap().clone()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, question: QuestionRef, after: Duration) -> TimerHandle {
        self.scheduled.lock().unwrap().push((question, after));
        TimerHandle::detached()
    }
}
