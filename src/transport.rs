use std::{collections::HashMap, future::Future, time::Duration};

use teloxide::{
    payloads::{SendMessageSetters, SendPollSetters},
    prelude::Requester,
    types::{ChatId, MessageId, PollType},
    Bot,
};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::{
    config::{AnswerMode, POLL_OPEN_PERIOD_SECS},
    error::DeliveryError,
    keyboard::answers_keyboard,
    session::{ClosedQuestion, Prompt, QuestionRef, SessionKey, Verdict},
};

/// Outbound side of the bot as seen by the quiz driver.
pub trait Transport: Send + Sync + 'static {
    fn send_question(&self, prompt: &Prompt) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    /// Shows the outcome of a question that will take no more answers.
    fn close_question(
        &self,
        closed: &ClosedQuestion,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    fn send_text(&self, chat: i64, text: &str) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

pub fn verdict_text(closed: &ClosedQuestion) -> String {
    match &closed.verdict {
        Verdict::Correct => "✅ Correct!".to_owned(),
        Verdict::Incorrect { chosen } => format!(
            "❌ '{}' is wrong. Correct answer: {}",
            chosen, closed.correct_answer
        ),
        Verdict::TimedOut => format!("⏰ Time is up! Correct answer: {}", closed.correct_answer),
    }
}

#[derive(Debug)]
struct SentQuestion {
    question: QuestionRef,
    message_id: MessageId,
    header: String,
    poll_id: Option<String>,
}

/// A later question of the same session is already on record.
fn is_superseded(records: &HashMap<SessionKey, SentQuestion>, sent: &SentQuestion) -> bool {
    records.get(&sent.question.key).is_some_and(|current| {
        current.question.session == sent.question.session
            && current.question.index > sent.question.index
    })
}

/// Talks to Telegram, either with inline answer buttons or with native quiz polls.
pub struct TelegramTransport {
    bot: Bot,
    mode: AnswerMode,
    open_period: Option<Duration>,
    sent: Mutex<HashMap<SessionKey, SentQuestion>>,
    polls: Mutex<HashMap<String, QuestionRef>>,
}

impl TelegramTransport {
    pub fn new(bot: Bot, mode: AnswerMode, open_period: Option<Duration>) -> Self {
        Self {
            bot,
            mode,
            open_period,
            sent: Mutex::default(),
            polls: Mutex::default(),
        }
    }

    pub fn mode(&self) -> AnswerMode {
        self.mode
    }

    /// The question a poll was sent for, while that question is open.
    pub async fn resolve_poll(&self, poll_id: &str) -> Option<QuestionRef> {
        self.polls.lock().await.get(poll_id).copied()
    }

    async fn send_buttons(&self, prompt: &Prompt) -> Result<SentQuestion, DeliveryError> {
        let header = prompt.header();
        let message = self
            .bot
            .send_message(ChatId(prompt.question.key.0), header.clone())
            .reply_markup(answers_keyboard(prompt))
            .await?;
        Ok(SentQuestion {
            question: prompt.question,
            message_id: message.id,
            header,
            poll_id: None,
        })
    }

    async fn send_poll(&self, prompt: &Prompt) -> Result<SentQuestion, DeliveryError> {
        let header = prompt.header();
        let mut request = self
            .bot
            .send_poll(ChatId(prompt.question.key.0), header.clone(), prompt.options.clone())
            .type_(PollType::Quiz)
            .correct_option_id(prompt.correct as u8)
            .is_anonymous(false);
        if let Some(period) = self.open_period {
            let secs = period
                .as_secs()
                .clamp(*POLL_OPEN_PERIOD_SECS.start(), *POLL_OPEN_PERIOD_SECS.end());
            request = request.open_period(secs as u16);
        }
        let message = request.await?;

        Ok(SentQuestion {
            question: prompt.question,
            message_id: message.id,
            header,
            poll_id: message.poll().map(|poll| poll.id.to_string()),
        })
    }
}

impl Transport for TelegramTransport {
    #[instrument(level = "debug", skip(self))]
    async fn send_question(&self, prompt: &Prompt) -> Result<(), DeliveryError> {
        let sent = match self.mode {
            AnswerMode::Buttons => self.send_buttons(prompt).await?,
            AnswerMode::Poll => self.send_poll(prompt).await?,
        };
        let mut records = self.sent.lock().await;
        if is_superseded(&records, &sent) {
            debug!("{:?} was closed before its message was recorded", sent.question);
            return Ok(());
        }
        // Polls resolve only once the message is on record, so closing always finds it.
        if let Some(poll_id) = &sent.poll_id {
            self.polls.lock().await.insert(poll_id.clone(), sent.question);
        }
        records.insert(sent.question.key, sent);
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn close_question(&self, closed: &ClosedQuestion) -> Result<(), DeliveryError> {
        let sent = {
            let mut sent = self.sent.lock().await;
            match sent.get(&closed.question.key) {
                Some(s) if s.question == closed.question => sent.remove(&closed.question.key),
                _ => None,
            }
        };
        let Some(sent) = sent else {
            debug!("No message on record for {:?}", closed.question);
            return Ok(());
        };
        let chat_id = ChatId(closed.question.key.0);

        match sent.poll_id {
            Some(poll_id) => {
                self.polls.lock().await.remove(&poll_id);
                // Telegram closes timed out polls by itself.
                if closed.verdict != Verdict::TimedOut {
                    self.bot.stop_poll(chat_id, sent.message_id).await?;
                }
            }
            None => {
                self.bot
                    .edit_message_text(
                        chat_id,
                        sent.message_id,
                        format!("{}\n\n{}", sent.header, verdict_text(closed)),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn send_text(&self, chat: i64, text: &str) -> Result<(), DeliveryError> {
        self.bot.send_message(ChatId(chat), text).await?;
        Ok(())
    }
}
