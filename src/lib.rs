pub mod admin;
pub mod commands;
pub mod config;
pub mod driver;
pub mod error;
pub mod keyboard;
pub mod notifier;
pub mod quiz;
pub mod runner;
pub mod schema;
pub mod session;
pub mod timer;
pub mod transport;

#[cfg(test)]
mod testing;

/// The driver as wired to Telegram and the tokio clock.
pub type QuizDriver = driver::Driver<transport::TelegramTransport, timer::TokioScheduler>;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;
