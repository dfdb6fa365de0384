use std::sync::Arc;

use teloxide::{prelude::Requester, types::Message, Bot};
use tracing::{error, info, instrument, warn};

use crate::{
    config::Config,
    error::CatalogError,
    quiz::{catalog::save_custom, parser::parse_questions},
    HandlerResult, QuizDriver,
};

const ADMIN_ONLY: &str = "This command is only available to the administrator.";
const ADD_QUIZ_USAGE: &str =
    "Usage: /addquiz <name>, then the questions on the following lines:\n\nQuestion?\n+correct answer\n-wrong answer";

/// Splits `/addquiz` input into the quiz name (first line) and its body.
pub(crate) fn split_quiz_text(text: &str) -> Option<(&str, &str)> {
    let (name, body) = text.split_once('\n').unwrap_or((text, ""));
    let name = name.trim();
    (!name.is_empty() && !body.trim().is_empty()).then_some((name, body))
}

fn is_admin(msg: &Message, config: &Config) -> bool {
    msg.from
        .as_ref()
        .is_some_and(|user| config.is_admin(user.id.0 as i64))
}

/// Writes the admin-added quizzes back to the catalog file.
async fn persist(driver: &QuizDriver, config: &Config) -> Result<(), CatalogError> {
    let json = driver
        .catalog()
        .read()
        .await
        .custom_json()
        .map_err(|source| CatalogError::Json {
            path: config.catalog_file.clone(),
            source,
        })?;
    save_custom(&config.catalog_file, json).await
}

#[instrument(level = "info", skip(bot, msg, text, config, driver), fields(chat = %msg.chat.id))]
pub(crate) async fn add_quiz(
    bot: Bot,
    msg: Message,
    text: String,
    config: Arc<Config>,
    driver: Arc<QuizDriver>,
) -> HandlerResult {
    if !is_admin(&msg, &config) {
        warn!("Refused /addquiz from a non-admin in chat {}", msg.chat.id);
        bot.send_message(msg.chat.id, ADMIN_ONLY).await?;
        return Ok(());
    }
    let Some((name, body)) = split_quiz_text(&text) else {
        bot.send_message(msg.chat.id, ADD_QUIZ_USAGE).await?;
        return Ok(());
    };

    let added = driver
        .catalog()
        .write()
        .await
        .add_custom(name, parse_questions(body));
    let reply = match added {
        Ok(quiz) => match persist(&driver, &config).await {
            Ok(()) => {
                info!("Admin added quiz '{}' with {} questions", quiz.name(), quiz.len());
                format!("✅ Quiz '{}' saved with {} question(s).", quiz.name(), quiz.len())
            }
            Err(e) => {
                error!("Failed to save catalog: {}", e);
                format!(
                    "⚠️ Quiz '{}' is available now but could not be saved: {}",
                    quiz.name(),
                    e
                )
            }
        },
        Err(e) => format!("❌ {}", e),
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

#[instrument(level = "info", skip(bot, msg, config, driver), fields(chat = %msg.chat.id))]
pub(crate) async fn delete_quiz(
    bot: Bot,
    msg: Message,
    name: String,
    config: Arc<Config>,
    driver: Arc<QuizDriver>,
) -> HandlerResult {
    if !is_admin(&msg, &config) {
        warn!("Refused /deletequiz from a non-admin in chat {}", msg.chat.id);
        bot.send_message(msg.chat.id, ADMIN_ONLY).await?;
        return Ok(());
    }

    let removed = driver.catalog().write().await.remove_custom(&name);
    let reply = match removed {
        Ok(()) => match persist(&driver, &config).await {
            Ok(()) => {
                info!("Admin deleted quiz '{}'", name.trim());
                format!("🗑️ Quiz '{}' deleted.", name.trim())
            }
            Err(e) => {
                error!("Failed to save catalog: {}", e);
                format!("⚠️ Quiz '{}' removed for now but could not be saved: {}", name.trim(), e)
            }
        },
        Err(e) => format!("❌ {}", e),
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}
