use std::time::Duration;

use tokio::{sync::mpsc::UnboundedSender, task::AbortHandle};
use tracing::debug;

use crate::{driver::QuizEvent, session::QuestionRef};

/// Handle of a pending timeout. Cancelling is best effort: a timer that is
/// already firing still delivers its event, which the session then ignores.
#[derive(Debug)]
pub struct TimerHandle(Option<AbortHandle>);

impl TimerHandle {
    /// A handle with nothing behind it.
    pub fn detached() -> Self {
        Self(None)
    }

    pub fn cancel(self) {
        if let Some(handle) = self.0 {
            handle.abort();
        }
    }
}

pub trait Scheduler: Send + Sync + 'static {
    /// Arranges for `QuizEvent::TimerFired(question)` after `after`.
    fn schedule(&self, question: QuestionRef, after: Duration) -> TimerHandle;
}

/// Sleeps on the tokio runtime and feeds the timeout into the event channel.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    events: UnboundedSender<QuizEvent>,
}

impl TokioScheduler {
    pub fn new(events: UnboundedSender<QuizEvent>) -> Self {
        Self { events }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, question: QuestionRef, after: Duration) -> TimerHandle {
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if events.send(QuizEvent::TimerFired(question)).is_err() {
                debug!("Event loop is gone, dropping timeout for {:?}", question);
            }
        });
        TimerHandle(Some(task.abort_handle()))
    }
}
