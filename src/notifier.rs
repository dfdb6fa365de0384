use std::fmt;

use tracing::{error, info, instrument};

use crate::{
    session::{SessionKey, UserInfo},
    transport::Transport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndStatus {
    Completed,
    Cancelled,
}

impl fmt::Display for EndStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndStatus::Completed => write!(f, "completed"),
            EndStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Final state of a session, built just before it is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndReport {
    pub key: SessionKey,
    pub user: UserInfo,
    pub quiz_name: String,
    pub score: usize,
    /// Questions that were answered or timed out.
    pub answered: usize,
    pub total: usize,
    pub status: EndStatus,
}

impl EndReport {
    pub fn summary(&self) -> String {
        match self.status {
            EndStatus::Completed => format!(
                "🎉 Quiz '{}' is over!\n\nYour final score: {} / {}.\n\nSend /start to take another quiz.",
                self.quiz_name, self.score, self.total
            ),
            EndStatus::Cancelled => format!(
                "✅ Quiz '{}' cancelled after {} of {} questions.\n\nYour score: {} / {}.",
                self.quiz_name, self.answered, self.total, self.score, self.total
            ),
        }
    }

    pub fn admin_notification(&self) -> String {
        format!(
            "📊 Quiz result\n\nUser: {}\nID: {}\nQuiz: {}\nScore: {} / {}\nStatus: {}",
            self.user, self.user.id, self.quiz_name, self.score, self.total, self.status
        )
    }
}

/// Tells the user how it went and, when configured, the administrator too.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    admin: Option<i64>,
}

impl Notifier {
    pub fn new(admin: Option<i64>) -> Self {
        Self { admin }
    }

    pub fn admin(&self) -> Option<i64> {
        self.admin
    }

    /// Delivery failures are logged, never returned.
    #[instrument(level = "info", skip(self, transport))]
    pub async fn deliver<T: Transport>(&self, transport: &T, report: &EndReport) {
        if let Err(e) = transport.send_text(report.key.0, &report.summary()).await {
            error!("Failed to send summary to {}: {}", report.key, e);
        }

        let Some(admin) = self.admin else {
            return;
        };
        match transport.send_text(admin, &report.admin_notification()).await {
            Ok(()) => info!("Reported '{}' result of {} to admin", report.quiz_name, report.user),
            Err(e) => error!("Failed to send notification to admin: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingTransport, Sent};

    fn report(status: EndStatus) -> EndReport {
        EndReport {
            key: SessionKey(100),
            user: UserInfo {
                id: 100,
                name: "Grace Hopper".into(),
                username: Some("grace".into()),
            },
            quiz_name: "Capitals".into(),
            score: 1,
            answered: 1,
            total: 3,
            status,
        }
    }

    #[test]
    fn completed_and_cancelled_summaries_differ() {
        let completed = report(EndStatus::Completed).summary();
        let cancelled = report(EndStatus::Cancelled).summary();

        assert!(completed.contains("1 / 3"));
        assert!(cancelled.contains("1 / 3"));
        assert!(cancelled.contains("cancelled"));
        assert_ne!(completed, cancelled);
    }

    #[test]
    fn admin_notification_names_everything() {
        let text = report(EndStatus::Cancelled).admin_notification();

        assert!(text.contains("Grace Hopper (@grace)"));
        assert!(text.contains("ID: 100"));
        assert!(text.contains("Quiz: Capitals"));
        assert!(text.contains("Score: 1 / 3"));
        assert!(text.contains("Status: cancelled"));
    }

    #[tokio::test]
    async fn without_admin_only_the_user_hears() {
        let transport = RecordingTransport::default();
        Notifier::new(None)
            .deliver(&transport, &report(EndStatus::Completed))
            .await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Sent::Text { chat: 100, .. }));
    }

    #[tokio::test]
    async fn unreachable_admin_does_not_affect_user_summary() {
        let transport = RecordingTransport::unreachable([555]);
        Notifier::new(Some(555))
            .deliver(&transport, &report(EndStatus::Completed))
            .await;

        assert_eq!(transport.texts_to(100).len(), 1);
        assert!(transport.texts_to(555).is_empty());
    }

    #[tokio::test]
    async fn admin_receives_a_separate_notification() {
        let transport = RecordingTransport::default();
        Notifier::new(Some(555))
            .deliver(&transport, &report(EndStatus::Completed))
            .await;

        let admin = transport.texts_to(555);
        assert_eq!(admin.len(), 1);
        assert!(admin[0].contains("Status: completed"));
    }
}
