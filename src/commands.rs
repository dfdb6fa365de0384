use std::sync::Arc;

use teloxide::{
    payloads::SendMessageSetters,
    prelude::Requester,
    types::{Message, User},
    utils::command::BotCommands,
    Bot,
};
use tracing::{info, instrument, warn};

use crate::{
    driver::{Outcome, QuizEvent},
    error::QuizError,
    keyboard::categories_keyboard,
    session::{SessionKey, UserInfo},
    HandlerResult, QuizDriver,
};

#[derive(Debug, Clone, BotCommands)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "display this text.")]
    Help,
    #[command(description = "choose a quiz.")]
    Start,
    #[command(description = "stop the running quiz.")]
    Cancel,
    #[command(description = "show the id of this chat.")]
    ChatId,
    #[command(description = "(admin) add a quiz: name on the first line, questions below.")]
    AddQuiz(String),
    #[command(description = "(admin) delete an added quiz.")]
    DeleteQuiz(String),
}

pub(crate) fn user_info(user: &User) -> UserInfo {
    UserInfo {
        id: user.id.0 as i64,
        name: user.full_name(),
        username: user.username.clone(),
    }
}

pub(crate) const MAIN_MENU_TEXT: &str = "👋 Welcome! Please choose a category:";
pub(crate) const NO_QUIZZES_TEXT: &str = "There are no quizzes available right now. 😕";

pub(crate) async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

#[instrument(level = "info", skip(bot, msg, driver), fields(chat = %msg.chat.id))]
pub(crate) async fn start(bot: Bot, msg: Message, driver: Arc<QuizDriver>) -> HandlerResult {
    let key = SessionKey(msg.chat.id.0);
    if let Some(quiz) = driver.sessions().active_quiz(key).await {
        info!("Chat {} asked for the menu during '{}'", key, quiz);
        bot.send_message(msg.chat.id, QuizError::AlreadyInProgress(quiz).to_string())
            .await?;
        return Ok(());
    }

    let categories = driver.catalog().read().await.categories();
    if categories.is_empty() {
        bot.send_message(msg.chat.id, NO_QUIZZES_TEXT).await?;
    } else {
        bot.send_message(msg.chat.id, MAIN_MENU_TEXT)
            .reply_markup(categories_keyboard(&categories))
            .await?;
    }
    Ok(())
}

#[instrument(level = "info", skip(bot, msg, driver), fields(chat = %msg.chat.id))]
pub(crate) async fn cancel(bot: Bot, msg: Message, driver: Arc<QuizDriver>) -> HandlerResult {
    let key = SessionKey(msg.chat.id.0);
    match driver.handle(QuizEvent::Cancel { key }).await {
        Ok(Outcome::Ended(report)) => info!("Cancelled '{}' in chat {}", report.quiz_name, key),
        Ok(_) => {}
        Err(e) => {
            bot.send_message(msg.chat.id, e.to_string()).await?;
        }
    }
    Ok(())
}

/// Reports the id of the current chat. In groups the id goes to the requester
/// privately and to the log.
#[instrument(level = "info", skip(bot, msg))]
pub(crate) async fn chat_id(bot: Bot, msg: Message) -> HandlerResult {
    let chat = &msg.chat;
    if chat.is_private() {
        bot.send_message(chat.id, format!("The id of this chat is {}", chat.id))
            .await?;
        return Ok(());
    }

    let title = chat.title().unwrap_or_default();
    info!("Group '{}' has id {}", title, chat.id);
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    info!("Requested by {} (id {})", user.full_name(), user.id);

    let text = format!(
        "Hi {}!\nThe id of the group '{}' is:\n{}",
        user.first_name, title, chat.id
    );
    match bot.send_message(user.id, text).await {
        Ok(_) => info!("Sent the id of {} to {} privately", chat.id, user.id),
        Err(e) => warn!(
            "Failed to message {} privately ({}). They have to start a chat with the bot first; the id is logged above.",
            user.id, e
        ),
    }
    Ok(())
}
