use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rach::{
    logging::init_logging,
    network::{
        banner::{print_banner, print_startup_log, BannerInfo},
        run_server,
    },
    service::ServiceRegistry,
    Dispatcher, Settings,
};
use tokio::sync::watch;
use tracing::{error, info};

/// Брокер pub/sub и RPC поверх WebSocket.
#[derive(Parser, Debug)]
#[command(name = "rach")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rach - pub/sub and RPC broker over WebSocket", long_about = None)]
struct Cli {
    /// Путь к TOML-файлу настроек
    #[arg(short, long, env = "RACH_CONFIG")]
    config: Option<PathBuf>,
    /// Адрес прослушивания (перекрывает настройки)
    #[arg(short, long)]
    listen: Option<String>,
    /// Пускать клиентов без проверки учётных данных
    #[arg(long)]
    allow_anonymous: bool,
    /// Не печатать баннер
    #[arg(long)]
    no_banner: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(listen) = cli.listen {
        settings.server.listen_addr = listen;
    }
    if cli.allow_anonymous {
        settings.auth.allow_anonymous = true;
    }
    settings.validate()?;

    let logging = init_logging(&settings.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    let services = ServiceRegistry::builder()
        .with_builtins()
        .timeout(settings.service_timeout())
        .build();

    let auth = settings.build_auth()?;
    let auth_mode = match (&auth, settings.auth.allow_anonymous) {
        (None, _) => "closed",
        (Some(_), true) => "anonymous",
        (Some(_), false) => "password",
    };

    let mut builder = Dispatcher::builder().services(services);
    if let Some(predicate) = auth {
        builder = builder.auth_arc(predicate);
    }
    let dispatcher = builder.build();

    if !cli.no_banner {
        print_banner(&BannerInfo {
            listen: &settings.server.listen_addr,
            auth: auth_mode,
            services: dispatcher.services().len(),
        });
        print_startup_log();
    }

    let (signal, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            signal.send_replace(true);
        }
    });

    let result = run_server(&settings, dispatcher, shutdown).await;
    if let Err(e) = &result {
        error!(error = %e, "server stopped with error");
    }
    logging.shutdown();
    result
}
