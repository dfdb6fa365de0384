use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::{mpsc::UnboundedReceiver, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    error::QuizError,
    notifier::{EndReport, EndStatus, Notifier},
    quiz::{catalog::Catalog, QuizId},
    session::{store::SessionStore, ClosedQuestion, Prompt, QuestionRef, Session, SessionId, SessionKey, UserInfo},
    timer::{Scheduler, TimerHandle},
    transport::Transport,
};

/// Everything that can happen to a session.
#[derive(Debug, Clone)]
pub enum QuizEvent {
    StartQuiz {
        key: SessionKey,
        quiz: QuizId,
        user: UserInfo,
    },
    AnswerSelected {
        question: QuestionRef,
        option: usize,
    },
    Cancel {
        key: SessionKey,
    },
    TimerFired(QuestionRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Started,
    /// The next question is on screen.
    Advanced,
    /// The event lost a race or refers to a session that is gone.
    Ignored,
    Ended(EndReport),
}

enum Step {
    Ask(Prompt),
    Finished(Session),
    Gone,
}

fn open_turn(sessions: &mut HashMap<SessionKey, Session>, key: SessionKey, id: SessionId) -> Step {
    let Some(session) = sessions.get_mut(&key).filter(|s| s.id() == id) else {
        return Step::Gone;
    };
    if let Some(prompt) = session.next_turn(key, &mut rand::thread_rng()) {
        return Step::Ask(prompt);
    }
    sessions.remove(&key).map_or(Step::Gone, Step::Finished)
}

/// Runs quiz sessions: presents questions, takes answers and timeouts, and
/// reports when a session ends.
pub struct Driver<T, S> {
    catalog: Arc<RwLock<Catalog>>,
    sessions: SessionStore,
    transport: T,
    scheduler: S,
    notifier: Notifier,
    question_timeout: Option<Duration>,
}

impl<T: Transport, S: Scheduler> Driver<T, S> {
    pub fn new(
        catalog: Arc<RwLock<Catalog>>,
        transport: T,
        scheduler: S,
        notifier: Notifier,
        question_timeout: Option<Duration>,
    ) -> Self {
        Self {
            catalog,
            sessions: SessionStore::new(),
            transport,
            scheduler,
            notifier,
            question_timeout,
        }
    }

    pub fn catalog(&self) -> &Arc<RwLock<Catalog>> {
        &self.catalog
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn question_timeout(&self) -> Option<Duration> {
        self.question_timeout
    }

    #[instrument(level = "info", skip(self))]
    pub async fn handle(&self, event: QuizEvent) -> Result<Outcome, QuizError> {
        match event {
            QuizEvent::StartQuiz { key, quiz, user } => self.start(key, quiz, user).await,
            QuizEvent::AnswerSelected { question, option } => self.answer(question, option).await,
            QuizEvent::Cancel { key } => self.cancel(key).await,
            QuizEvent::TimerFired(question) => Ok(self.timeout(question).await),
        }
    }

    async fn start(&self, key: SessionKey, quiz: QuizId, user: UserInfo) -> Result<Outcome, QuizError> {
        let quiz = self
            .catalog
            .read()
            .await
            .get(quiz)
            .ok_or(QuizError::QuizNotFound)?;
        let id = self.sessions.begin(key, Session::new(quiz.clone(), user.clone())).await?;
        info!("{} starts quiz '{}' in chat {}", user, quiz.name(), key);

        let intro = format!(
            "Let's start '{}'! {} question(s).\n\nSend /cancel to stop at any time.",
            quiz.name(),
            quiz.len()
        );
        if let Err(e) = self.transport.send_text(key.0, &intro).await {
            warn!("Failed to announce quiz in chat {}: {}", key, e);
        }

        match self.present(key, id).await? {
            Outcome::Advanced => Ok(Outcome::Started),
            other => Ok(other),
        }
    }

    /// Shows the current question, or ends the session when none is left.
    async fn present(&self, key: SessionKey, id: SessionId) -> Result<Outcome, QuizError> {
        let step = open_turn(&mut *self.sessions.lock().await, key, id);
        let prompt = match step {
            Step::Ask(prompt) => prompt,
            Step::Finished(session) => return Ok(self.finish(key, session, EndStatus::Completed).await),
            Step::Gone => return Ok(Outcome::Ignored),
        };

        debug!("Asking question #{} in chat {}", prompt.question.index + 1, key);
        if let Err(e) = self.transport.send_question(&prompt).await {
            error!("Failed to send question to chat {}: {}", key, e);
            let mut sessions = self.sessions.lock().await;
            if sessions.get(&key).is_some_and(|s| s.id() == id) {
                if let Some(timer) = sessions.remove(&key).and_then(|mut s| s.take_timer()) {
                    timer.cancel();
                }
            }
            return Err(QuizError::Interrupted);
        }

        if let Some(after) = self.question_timeout {
            let handle = self.scheduler.schedule(prompt.question, after);
            self.attach_timer(&prompt.question, handle).await;
        }
        Ok(Outcome::Advanced)
    }

    async fn attach_timer(&self, question: &QuestionRef, handle: TimerHandle) {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&question.key).filter(|s| s.id() == question.session) {
            Some(session) => session.set_timer(question, handle),
            None => handle.cancel(),
        }
    }

    async fn answer(&self, question: QuestionRef, option: usize) -> Result<Outcome, QuizError> {
        let (closed, timer) = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .get_mut(&question.key)
                .ok_or(QuizError::NoActiveSession)?;
            let closed = session.claim_answer(&question, option)?;
            (closed, session.take_timer())
        };
        if let Some(timer) = timer {
            timer.cancel();
        }
        info!(
            "Chat {} answered question #{}: {:?}",
            question.key,
            question.index + 1,
            closed.verdict
        );
        self.close_and_advance(closed).await
    }

    async fn timeout(&self, question: QuestionRef) -> Outcome {
        let claimed = self
            .sessions
            .with_session(question.key, question.session, |s| {
                s.claim_timeout(&question).map(|closed| (closed, s.take_timer()))
            })
            .await
            .flatten();
        let Some((closed, _firing)) = claimed else {
            debug!("Timeout for {:?} arrived after the question was closed", question);
            return Outcome::Ignored;
        };
        info!("Question #{} timed out in chat {}", question.index + 1, question.key);
        match self.close_and_advance(closed).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Quiz in chat {} stopped after timeout: {}", question.key, e);
                Outcome::Ignored
            }
        }
    }

    async fn close_and_advance(&self, closed: ClosedQuestion) -> Result<Outcome, QuizError> {
        if let Err(e) = self.transport.close_question(&closed).await {
            warn!("Failed to close question in chat {}: {}", closed.question.key, e);
        }
        let question = closed.question;
        let advanced = self
            .sessions
            .with_session(question.key, question.session, |s| s.advance(&closed))
            .await
            .unwrap_or(false);
        if !advanced {
            return Ok(Outcome::Ignored);
        }
        self.present(question.key, question.session).await
    }

    async fn cancel(&self, key: SessionKey) -> Result<Outcome, QuizError> {
        let session = self
            .sessions
            .remove(key)
            .await
            .ok_or(QuizError::NoActiveSession)?;
        info!("Chat {} cancelled quiz '{}'", key, session.quiz().name());
        Ok(self.finish(key, session, EndStatus::Cancelled).await)
    }

    async fn finish(&self, key: SessionKey, mut session: Session, status: EndStatus) -> Outcome {
        if let Some(timer) = session.take_timer() {
            timer.cancel();
        }
        let report = session.report(key, status);
        info!(
            "{} {} quiz '{}' with {}/{}",
            report.user, report.status, report.quiz_name, report.score, report.total
        );
        self.notifier.deliver(&self.transport, &report).await;
        Outcome::Ended(report)
    }
}

/// Feeds queued events (timeouts) into the driver, one task per event.
pub async fn run_events<T: Transport, S: Scheduler>(
    driver: Arc<Driver<T, S>>,
    mut events: UnboundedReceiver<QuizEvent>,
) {
    while let Some(event) = events.recv().await {
        let driver = driver.clone();
        tokio::spawn(async move {
            if let Err(e) = driver.handle(event).await {
                warn!("Queued event failed: {}", e);
            }
        });
    }
    debug!("Event channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        quiz::{parser::parse_questions, DEFAULT_CATEGORY},
        session::Verdict,
        testing::{ManualScheduler, RecordingTransport},
        timer::TokioScheduler,
    };
    use tokio::sync::mpsc;

    const KEY: SessionKey = SessionKey(1001);
    const ADMIN: i64 = 9;
    const ARITHMETIC: &str = "2+2=?\n+4\n-3\n-5\nCapital of Egypt?\n+Cairo\n-Alexandria\n";

    type TestDriver = Driver<RecordingTransport, ManualScheduler>;

    fn user() -> UserInfo {
        UserInfo {
            id: KEY.0,
            name: "Alan Turing".into(),
            username: Some("alan".into()),
        }
    }

    fn catalog_with(content: &str) -> (Arc<RwLock<Catalog>>, QuizId) {
        let mut catalog = Catalog::new();
        let quiz = catalog.insert(DEFAULT_CATEGORY, "Arithmetic", parse_questions(content));
        (Arc::new(RwLock::new(catalog)), quiz.id())
    }

    fn driver_with(transport: RecordingTransport, timeout: Option<Duration>) -> (TestDriver, QuizId) {
        let (catalog, quiz) = catalog_with(ARITHMETIC);
        let driver = Driver::new(
            catalog,
            transport,
            ManualScheduler::default(),
            Notifier::new(Some(ADMIN)),
            timeout,
        );
        (driver, quiz)
    }

    fn driver() -> (TestDriver, QuizId) {
        driver_with(RecordingTransport::default(), Some(Duration::from_secs(45)))
    }

    async fn start(driver: &TestDriver, quiz: QuizId) -> Result<Outcome, QuizError> {
        driver
            .handle(QuizEvent::StartQuiz {
                key: KEY,
                quiz,
                user: user(),
            })
            .await
    }

    fn current(driver: &TestDriver) -> Prompt {
        driver.transport().last_prompt().unwrap()
    }

    async fn answer_with(driver: &TestDriver, text: &str) -> Result<Outcome, QuizError> {
        let prompt = current(driver);
        let option = prompt.options.iter().position(|o| o == text).unwrap();
        driver
            .handle(QuizEvent::AnswerSelected {
                question: prompt.question,
                option,
            })
            .await
    }

    async fn progress(driver: &TestDriver) -> Option<(usize, usize)> {
        let sessions = driver.sessions().lock().await;
        sessions.get(&KEY).map(|s| (s.index(), s.score()))
    }

    #[tokio::test]
    async fn perfect_run_scores_two_of_two() {
        let (driver, quiz) = driver();

        assert_eq!(start(&driver, quiz).await, Ok(Outcome::Started));
        assert_eq!(current(&driver).header(), "(1/2) 2+2=?");
        assert_eq!(answer_with(&driver, "4").await, Ok(Outcome::Advanced));
        assert_eq!(current(&driver).header(), "(2/2) Capital of Egypt?");

        let Ok(Outcome::Ended(report)) = answer_with(&driver, "Cairo").await else {
            panic!("quiz should be over");
        };
        assert_eq!(report.status, EndStatus::Completed);
        assert_eq!((report.score, report.total), (2, 2));
        assert!(!driver.sessions().contains(KEY).await);

        let transport = driver.transport();
        assert!(transport.texts_to(KEY.0).iter().any(|t| t.contains("2 / 2")));
        assert!(transport.texts_to(ADMIN)[0].contains("Status: completed"));
        assert!(transport.closed().iter().all(ClosedQuestion::is_correct));
    }

    #[tokio::test]
    async fn wrong_answer_is_not_scored() {
        let (driver, quiz) = driver();
        start(&driver, quiz).await.unwrap();

        answer_with(&driver, "5").await.unwrap();
        assert_eq!(progress(&driver).await, Some((1, 0)));
        assert_eq!(
            driver.transport().closed()[0].verdict,
            Verdict::Incorrect { chosen: "5".into() }
        );
    }

    #[tokio::test]
    async fn start_with_active_session_is_refused() {
        let (driver, quiz) = driver();
        start(&driver, quiz).await.unwrap();
        answer_with(&driver, "4").await.unwrap();

        assert_eq!(
            start(&driver, quiz).await,
            Err(QuizError::AlreadyInProgress("Arithmetic".into()))
        );
        assert_eq!(progress(&driver).await, Some((1, 1)));
        assert_eq!(driver.transport().prompts().len(), 2);
    }

    #[tokio::test]
    async fn unknown_quiz_is_reported() {
        let (driver, _) = driver();

        assert_eq!(start(&driver, QuizId::new()).await, Err(QuizError::QuizNotFound));
        assert!(driver.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn cancel_reports_cancelled_and_drops_session() {
        let content = "A?\n+a\n-x\nB?\n+b\n-x\nC?\n+c\n-x\n";
        let (catalog, quiz) = catalog_with(content);
        let driver = Driver::new(
            catalog,
            RecordingTransport::default(),
            ManualScheduler::default(),
            Notifier::new(Some(ADMIN)),
            None,
        );
        start(&driver, quiz).await.unwrap();
        answer_with(&driver, "a").await.unwrap();

        let Ok(Outcome::Ended(report)) = driver.handle(QuizEvent::Cancel { key: KEY }).await else {
            panic!("cancel should end the quiz");
        };
        assert_eq!(report.status, EndStatus::Cancelled);
        assert_eq!((report.score, report.answered, report.total), (1, 1, 3));
        assert!(!driver.sessions().contains(KEY).await);
        assert!(driver.transport().texts_to(ADMIN)[0].contains("Status: cancelled"));

        assert_eq!(
            driver.handle(QuizEvent::Cancel { key: KEY }).await,
            Err(QuizError::NoActiveSession)
        );
    }

    #[tokio::test]
    async fn double_answer_is_accepted_once() {
        let (driver, quiz) = driver();
        start(&driver, quiz).await.unwrap();
        let prompt = current(&driver);
        let event = QuizEvent::AnswerSelected {
            question: prompt.question,
            option: prompt.correct,
        };

        assert_eq!(driver.handle(event.clone()).await, Ok(Outcome::Advanced));
        assert_eq!(driver.handle(event).await, Err(QuizError::AnswerNotAccepted));
        assert_eq!(progress(&driver).await, Some((1, 1)));
    }

    #[tokio::test]
    async fn timeout_reveals_and_moves_on() {
        let (driver, quiz) = driver();
        start(&driver, quiz).await.unwrap();
        let prompt = current(&driver);

        let scheduled = driver.scheduler.scheduled();
        assert_eq!(scheduled, vec![(prompt.question, Duration::from_secs(45))]);

        assert_eq!(
            driver.handle(QuizEvent::TimerFired(prompt.question)).await,
            Ok(Outcome::Advanced)
        );
        let closed = driver.transport().closed();
        assert_eq!(closed[0].verdict, Verdict::TimedOut);
        assert_eq!(closed[0].correct_answer, "4");
        assert_eq!(progress(&driver).await, Some((1, 0)));
    }

    #[tokio::test]
    async fn answer_then_timeout_has_one_effect() {
        let (driver, quiz) = driver();
        start(&driver, quiz).await.unwrap();
        let prompt = current(&driver);

        driver
            .handle(QuizEvent::AnswerSelected {
                question: prompt.question,
                option: prompt.correct,
            })
            .await
            .unwrap();
        assert_eq!(
            driver.handle(QuizEvent::TimerFired(prompt.question)).await,
            Ok(Outcome::Ignored)
        );
        assert_eq!(progress(&driver).await, Some((1, 1)));
        assert_eq!(driver.transport().closed().len(), 1);
    }

    #[tokio::test]
    async fn timeout_then_answer_has_one_effect() {
        let (driver, quiz) = driver();
        start(&driver, quiz).await.unwrap();
        let prompt = current(&driver);

        driver.handle(QuizEvent::TimerFired(prompt.question)).await.unwrap();
        assert_eq!(
            driver
                .handle(QuizEvent::AnswerSelected {
                    question: prompt.question,
                    option: prompt.correct,
                })
                .await,
            Err(QuizError::AnswerNotAccepted)
        );
        assert_eq!(progress(&driver).await, Some((1, 0)));
        assert_eq!(driver.transport().closed().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_answer_and_timeout_resolve_once() {
        for _ in 0..50 {
            let (driver, quiz) = driver();
            let driver = Arc::new(driver);
            start(&driver, quiz).await.unwrap();
            let prompt = current(&driver);

            let answering = {
                let driver = driver.clone();
                tokio::spawn(async move {
                    driver
                        .handle(QuizEvent::AnswerSelected {
                            question: prompt.question,
                            option: prompt.correct,
                        })
                        .await
                })
            };
            let firing = {
                let driver = driver.clone();
                tokio::spawn(async move { driver.handle(QuizEvent::TimerFired(prompt.question)).await })
            };
            let answered = answering.await.unwrap();
            let fired = firing.await.unwrap();

            let winners = [answered.is_ok(), fired == Ok(Outcome::Advanced)];
            assert_eq!(winners.iter().filter(|w| **w).count(), 1, "{:?} / {:?}", answered, fired);
            let (index, score) = progress(&driver).await.unwrap();
            assert_eq!(index, 1);
            assert_eq!(score, usize::from(answered.is_ok()));
            assert_eq!(driver.transport().closed().len(), 1);
        }
    }

    #[tokio::test]
    async fn stale_events_from_a_previous_session_are_ignored() {
        let (driver, quiz) = driver();
        start(&driver, quiz).await.unwrap();
        let old = current(&driver);
        driver.handle(QuizEvent::Cancel { key: KEY }).await.unwrap();
        start(&driver, quiz).await.unwrap();

        assert_eq!(
            driver.handle(QuizEvent::TimerFired(old.question)).await,
            Ok(Outcome::Ignored)
        );
        assert_eq!(
            driver
                .handle(QuizEvent::AnswerSelected {
                    question: old.question,
                    option: old.correct,
                })
                .await,
            Err(QuizError::AnswerNotAccepted)
        );
        assert_eq!(progress(&driver).await, Some((0, 0)));
    }

    #[tokio::test]
    async fn score_never_exceeds_index() {
        let (driver, quiz) = driver();
        start(&driver, quiz).await.unwrap();
        let mut last_score = 0;

        for text in ["4", "Cairo"] {
            let (index, score) = progress(&driver).await.unwrap();
            assert!(score <= index);
            assert!(score >= last_score);
            last_score = score;
            answer_with(&driver, text).await.unwrap();
        }
    }

    #[tokio::test]
    async fn undeliverable_question_stops_the_quiz() {
        let (driver, quiz) = driver_with(RecordingTransport::failing_questions(), None);

        assert_eq!(start(&driver, quiz).await, Err(QuizError::Interrupted));
        assert!(!driver.sessions().contains(KEY).await);
    }

    #[tokio::test]
    async fn unreachable_admin_leaves_user_flow_intact() {
        let (driver, quiz) = driver_with(RecordingTransport::unreachable([ADMIN]), None);
        start(&driver, quiz).await.unwrap();
        answer_with(&driver, "4").await.unwrap();

        let outcome = answer_with(&driver, "Cairo").await.unwrap();
        assert!(matches!(outcome, Outcome::Ended(_)));
        assert!(driver.transport().texts_to(KEY.0).iter().any(|t| t.contains("2 / 2")));
        assert!(driver.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn untimed_quiz_schedules_nothing() {
        let (driver, quiz) = driver_with(RecordingTransport::default(), None);
        start(&driver, quiz).await.unwrap();

        assert!(driver.scheduler.scheduled().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn real_timer_is_cancelled_by_answer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (catalog, quiz) = catalog_with(ARITHMETIC);
        let driver = Driver::new(
            catalog,
            RecordingTransport::default(),
            TokioScheduler::new(tx),
            Notifier::default(),
            Some(Duration::from_secs(45)),
        );
        driver
            .handle(QuizEvent::StartQuiz {
                key: KEY,
                quiz,
                user: user(),
            })
            .await
            .unwrap();
        let first = driver.transport().last_prompt().unwrap();
        driver
            .handle(QuizEvent::AnswerSelected {
                question: first.question,
                option: first.correct,
            })
            .await
            .unwrap();

        // Only the second question's timer may fire.
        let Some(QuizEvent::TimerFired(fired)) = rx.recv().await else {
            panic!("expected a timeout");
        };
        assert_eq!(fired.index, 1);
        let Ok(Outcome::Ended(report)) = driver.handle(QuizEvent::TimerFired(fired)).await else {
            panic!("quiz should be over");
        };
        assert_eq!((report.score, report.total), (1, 2));
    }
}
