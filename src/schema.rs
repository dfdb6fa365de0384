use std::error::Error;

use teloxide::{
    dispatching::{UpdateFilterExt, UpdateHandler},
    dptree,
    prelude::Requester,
    types::{Message, Update},
    Bot,
};
use tracing::{info, instrument};

use crate::{
    admin,
    commands::{cancel, chat_id, help, start, Command},
    runner, HandlerResult,
};

pub fn schema() -> UpdateHandler<Box<dyn Error + Send + Sync + 'static>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Help].endpoint(help))
        .branch(case![Command::Start].endpoint(start))
        .branch(case![Command::Cancel].endpoint(cancel))
        .branch(case![Command::ChatId].endpoint(chat_id))
        .branch(case![Command::AddQuiz(text)].endpoint(admin::add_quiz))
        .branch(case![Command::DeleteQuiz(name)].endpoint(admin::delete_quiz));

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(dptree::filter(|msg: Message| msg.chat.is_private()).endpoint(invalid_input));

    dptree::entry()
        .branch(message_handler)
        .branch(Update::filter_callback_query().endpoint(runner::on_callback))
        .branch(Update::filter_poll_answer().endpoint(runner::on_poll_answer))
}

#[instrument(level = "info", skip(bot, msg), fields(chat = %msg.chat.id))]
async fn invalid_input(bot: Bot, msg: Message) -> HandlerResult {
    info!("Unexpected input {:?}", msg.text());
    bot.send_message(
        msg.chat.id,
        "Unable to handle the message. Send /start to pick a quiz or /help to see all commands.",
    )
    .await?;
    Ok(())
}
