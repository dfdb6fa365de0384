use std::{error::Error, sync::Arc};

use dotenvy::dotenv;
use teloxide::{
    error_handlers::LoggingErrorHandler,
    prelude::*,
    update_listeners::webhooks::{self, Options},
};
use tg_quizbot::{
    config::Config,
    driver::{run_events, Driver},
    notifier::Notifier,
    quiz::{
        catalog::{load_custom, Catalog, CustomQuizzes},
        loader::load_dir,
    },
    schema::schema,
    timer::TokioScheduler,
    transport::TelegramTransport,
    QuizDriver,
};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

type BoxError = Box<dyn Error + Send + Sync + 'static>;

fn init_tracing(config: &Config) -> Result<(), BoxError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level)?)
        .with_line_number(true)
        .with_target(false);
    if config.json_logs {
        let subscriber = builder.json().with_span_events(FmtSpan::ENTER).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    // teloxide logs through the `log` crate.
    tracing_log::LogTracer::init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenv().ok();
    let config = Config::from_env().inspect_err(|e| eprintln!("Configuration error: {}", e))?;
    init_tracing(&config)?;

    let custom = load_custom(&config.catalog_file).unwrap_or_else(|e| {
        error!("{}; starting without admin-added quizzes", e);
        CustomQuizzes::new()
    });
    let catalog = Catalog::from_sources(load_dir(&config.quiz_dir), custom);
    info!(
        "Catalog ready: {} quiz(zes) in {} categories",
        catalog.len(),
        catalog.categories().len()
    );
    if config.admin_id.is_none() {
        warn!("ADMIN_ID is not set, admin notifications and commands are disabled");
    }

    let bot = Bot::new(&config.token);
    info!("Starting bot in {:?} mode...", config.answer_mode);

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let driver: Arc<QuizDriver> = Arc::new(Driver::new(
        Arc::new(RwLock::new(catalog)),
        TelegramTransport::new(bot.clone(), config.answer_mode, config.question_timeout),
        TokioScheduler::new(events_tx),
        Notifier::new(config.admin_id),
        config.question_timeout,
    ));
    tokio::spawn(run_events(driver.clone(), events_rx));

    let config = Arc::new(config);
    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![driver, config.clone()])
        .default_handler(|update| async move {
            debug!("Unhandled update {:?}", update.id);
        })
        .enable_ctrlc_handler()
        .build();

    match &config.webhook {
        Some(webhook) => {
            info!("Listening for webhook calls on {}", webhook.addr);
            let listener = webhooks::axum(bot, Options::new(webhook.addr, webhook.url.clone())).await?;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        }
        None => dispatcher.dispatch().await,
    }

    Ok(())
}
