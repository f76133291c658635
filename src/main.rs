use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod services;
mod utils;

use config::Config;
use services::display::DisplayServer;
use services::scene::TokioAnimator;
use services::{
    create_display, CompMgr, DisplayBackend, DryRunScenario, EventSource, Session, TaskSwitcher,
};

#[derive(Parser, Debug)]
#[command(name = "hd-compositor")]
#[command(about = "Композитный менеджер мобильной оболочки: эффекты окон и гибернация приложений")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "hd-compositor.toml")]
    config: String,

    /// Режим сухого запуска (без X-сервера, окна эмулируются сценарием)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (перекрывает значение из конфигурации)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let config = Arc::new(Config::load(&args.config)?);

    // Инициализация системы логирования
    init_tracing(&config, args.log_level.as_deref())?;

    info!("Запуск hd-compositor v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - X-сервер не используется");
    } else {
        utils::display_env::check_display_env()?;
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let switcher = TaskSwitcher::new(config.switcher_button());

    let (display, source): (Box<dyn DisplayServer>, Box<dyn EventSource>) =
        match create_display(&config, tx.clone(), args.dry_run)? {
            DisplayBackend::X11 { display, pump } => (Box::new(display), Box::new(pump)),
            DisplayBackend::DryRun(display) => {
                let scenario = DryRunScenario::new(
                    config.clone(),
                    display.clone(),
                    switcher.clone(),
                    tx.clone(),
                );
                (Box::new(display), Box::new(scenario))
            }
        };

    let animator = TokioAnimator::new(tx, config.frame_interval());
    let mut manager = CompMgr::new(
        config.clone(),
        display,
        Box::new(animator),
        Box::new(switcher.clone()),
    );

    // Ошибки активации фатальны: без области ввода композитор бесполезен
    manager.turn_on()?;
    info!("Композитор активирован");

    let session = Session::new(manager, switcher, rx);
    let (stop, shutdown) = oneshot::channel();

    let source_handle = tokio::spawn(async move {
        if let Err(e) = source.run().await {
            error!("Ошибка в источнике событий: {}", e);
        }
    });
    let session_handle = tokio::spawn(session.run(shutdown));

    info!("Все сервисы запущены");

    // Ожидание сигнала завершения
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Получен сигнал завершения (Ctrl+C)");
        }
        Err(err) => {
            error!("Ошибка при ожидании сигнала завершения: {}", err);
        }
    }

    info!("Завершение работы...");

    if stop.send(()).is_err() {
        warn!("Цикл событий уже остановлен");
    }

    // Ожидаем завершения задач (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        match session_handle.await {
            Ok(Err(e)) => error!("Цикл событий завершился с ошибкой: {}", e),
            Err(e) => error!("Задача цикла событий аварийно завершилась: {}", e),
            Ok(Ok(())) => {}
        }
        // Очередь закрыта вместе с сессией, источник выходит сам
        let _ = source_handle.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("hd-compositor завершил работу");
    Ok(())
}

fn init_tracing(config: &Config, level_override: Option<&str>) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let directives = match level_override {
        Some(level) => level.to_string(),
        None if config.logging.filter.is_empty() => config.logging.level.clone(),
        None => format!("{},{}", config.logging.level, config.logging.filter),
    };

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(directives))?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "full" {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }

    Ok(())
}
