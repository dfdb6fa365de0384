use std::{sync::Arc, time::Duration};

use teloxide::{
    dispatching::dialogue::GetChatId,
    payloads::{AnswerCallbackQuerySetters, EditMessageTextSetters, SendMessageSetters},
    prelude::Requester,
    types::{CallbackQuery, ChatId, InlineKeyboardMarkup, MessageId, PollAnswer},
    Bot,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    commands::{user_info, MAIN_MENU_TEXT, NO_QUIZZES_TEXT},
    driver::QuizEvent,
    keyboard::{categories_keyboard, quiz_info_keyboard, quizzes_keyboard, CallbackData},
    quiz::{Quiz, QuizId},
    session::SessionKey,
    HandlerResult, QuizDriver,
};

pub(crate) fn quiz_info_text(quiz: &Quiz, timeout: Option<Duration>) -> String {
    let time = match timeout {
        Some(timeout) => format!("{} seconds", timeout.as_secs()),
        None => "no limit".to_owned(),
    };
    format!(
        "📖 Quiz: {}\n🔢 Questions: {}\n⏱️ Time per question: {}\n\nAre you ready?",
        quiz.name(),
        quiz.len(),
        time
    )
}

#[instrument(level = "info", skip(bot, q, driver), fields(data = ?q.data))]
pub(crate) async fn on_callback(bot: Bot, q: CallbackQuery, driver: Arc<QuizDriver>) -> HandlerResult {
    let data = q.data.as_deref().and_then(|d| d.parse::<CallbackData>().ok());
    let (Some(data), Some(chat_id)) = (data, q.chat_id()) else {
        debug!("Ignoring callback {:?}", q.data);
        bot.answer_callback_query(&q.id).await?;
        return Ok(());
    };
    let message_id = q.message.as_ref().map(|m| m.id());

    match data {
        CallbackData::MainMenu => {
            bot.answer_callback_query(&q.id).await?;
            show_categories(&bot, chat_id, message_id, &driver).await?;
        }
        CallbackData::Category(index) => {
            bot.answer_callback_query(&q.id).await?;
            show_category(&bot, chat_id, message_id, &driver, index).await?;
        }
        CallbackData::QuizInfo(quiz) => {
            bot.answer_callback_query(&q.id).await?;
            show_quiz_info(&bot, chat_id, message_id, &driver, quiz).await?;
        }
        CallbackData::StartQuiz(quiz) => {
            let event = QuizEvent::StartQuiz {
                key: SessionKey(chat_id.0),
                quiz,
                user: user_info(&q.from),
            };
            match driver.handle(event).await {
                Ok(_) => {
                    bot.answer_callback_query(&q.id).await?;
                    if let Some(message_id) = message_id {
                        if let Err(e) = bot.edit_message_reply_markup(chat_id, message_id).await {
                            debug!("Failed to remove the start button: {}", e);
                        }
                    }
                }
                Err(e) => {
                    info!("Chat {} could not start a quiz: {}", chat_id, e);
                    bot.answer_callback_query(&q.id)
                        .text(e.to_string())
                        .show_alert(true)
                        .await?;
                }
            }
        }
        CallbackData::Answer { .. } => {
            let Some((question, option)) = data.answer(SessionKey(chat_id.0)) else {
                return Ok(());
            };
            match driver.handle(QuizEvent::AnswerSelected { question, option }).await {
                Ok(_) => {
                    bot.answer_callback_query(&q.id).await?;
                }
                Err(e) => {
                    debug!("Answer in chat {} not taken: {}", chat_id, e);
                    bot.answer_callback_query(&q.id).text(e.to_string()).await?;
                }
            }
        }
    }
    Ok(())
}

/// Edits the menu message in place, or sends a new one when there is none.
async fn show(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    text: String,
    markup: Option<InlineKeyboardMarkup>,
) -> HandlerResult {
    if let Some(message_id) = message_id {
        let mut request = bot.edit_message_text(chat_id, message_id, text.clone());
        if let Some(markup) = markup.clone() {
            request = request.reply_markup(markup);
        }
        match request.await {
            Ok(_) => return Ok(()),
            Err(e) => warn!("Failed to edit menu in chat {}: {}", chat_id, e),
        }
    }
    let mut request = bot.send_message(chat_id, text);
    if let Some(markup) = markup {
        request = request.reply_markup(markup);
    }
    request.await?;
    Ok(())
}

async fn show_categories(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    driver: &QuizDriver,
) -> HandlerResult {
    let categories = driver.catalog().read().await.categories();
    if categories.is_empty() {
        return show(bot, chat_id, message_id, NO_QUIZZES_TEXT.to_owned(), None).await;
    }
    show(
        bot,
        chat_id,
        message_id,
        MAIN_MENU_TEXT.to_owned(),
        Some(categories_keyboard(&categories)),
    )
    .await
}

async fn show_category(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    driver: &QuizDriver,
    index: usize,
) -> HandlerResult {
    let listing = {
        let catalog = driver.catalog().read().await;
        catalog
            .categories()
            .get(index)
            .map(|category| (category.clone(), catalog.in_category(category)))
    };
    let Some((category, quizzes)) = listing else {
        return show(
            bot,
            chat_id,
            message_id,
            "Sorry, this category is no longer available.".to_owned(),
            None,
        )
        .await;
    };
    show(
        bot,
        chat_id,
        message_id,
        format!("📚 Category: {}\n\nPlease choose a quiz:", category),
        Some(quizzes_keyboard(quizzes.iter().map(|q| q.as_ref()))),
    )
    .await
}

async fn show_quiz_info(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    driver: &QuizDriver,
    id: QuizId,
) -> HandlerResult {
    let (quiz, category) = {
        let catalog = driver.catalog().read().await;
        let quiz = catalog.get(id);
        let category = quiz
            .as_ref()
            .and_then(|q| catalog.categories().iter().position(|c| c == q.category()));
        (quiz, category)
    };
    let Some(quiz) = quiz else {
        return show(
            bot,
            chat_id,
            message_id,
            "Sorry, this quiz is no longer available.".to_owned(),
            None,
        )
        .await;
    };
    show(
        bot,
        chat_id,
        message_id,
        quiz_info_text(&quiz, driver.question_timeout()),
        Some(quiz_info_keyboard(quiz.id(), category.unwrap_or_default())),
    )
    .await
}

/// Answers to native quiz polls.
#[instrument(level = "info", skip(answer, driver), fields(poll = %answer.poll_id))]
pub(crate) async fn on_poll_answer(answer: PollAnswer, driver: Arc<QuizDriver>) -> HandlerResult {
    let Some(question) = driver.transport().resolve_poll(&answer.poll_id.to_string()).await else {
        debug!("Answer to a poll that is no longer tracked");
        return Ok(());
    };
    let Some(&option) = answer.option_ids.first() else {
        debug!("Vote retracted");
        return Ok(());
    };
    let event = QuizEvent::AnswerSelected {
        question,
        option: option as usize,
    };
    if let Err(e) = driver.handle(event).await {
        debug!("Poll answer in chat {} not taken: {}", question.key, e);
    }
    Ok(())
}
