//! CLI клиент Rach
//!
//! Подписка на топик, публикация и вызов сервисов на запущенном брокере.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rach::client::{ClientConfig, RachClient};
use serde_json::Value;
use tracing::debug;

#[derive(Parser)]
#[command(name = "rach-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rach CLI - command line client for the Rach broker", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Адрес брокера
    #[arg(
        short = 'u',
        long,
        default_value = "ws://127.0.0.1:9000/",
        env = "RACH_URL"
    )]
    url: String,
    /// Имя пользователя
    #[arg(long, env = "RACH_USERNAME")]
    username: Option<String>,
    /// Пароль
    #[arg(long, env = "RACH_PASSWORD")]
    password: Option<String>,
    /// Пространство имён для относительных топиков
    #[arg(short, long, default_value = "/")]
    namespace: String,
    /// Таймаут ответа `auth` в секундах
    #[arg(long, default_value = "5")]
    timeout: u64,
    /// Подробный вывод (debug)
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Подписаться и печатать публикации до Ctrl-C
    Sub { topic: String },
    /// Опубликовать JSON-значение
    Pub { topic: String, data: String },
    /// Вызвать сервис с JSON-аргументами
    Call { service: String, args: Vec<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = ClientConfig::new(&cli.url);
    config.username = cli.username.clone();
    config.password = cli.password.clone();
    config.namespace = cli.namespace.clone();
    config.auth_timeout = Duration::from_secs(cli.timeout);

    let client = RachClient::connect(config)
        .await
        .with_context(|| format!("Failed to connect to {}", cli.url))?;
    debug!(id = ?client.id(), "connected");

    let outcome = run(&client, cli.command).await;
    client.stop();
    outcome
}

async fn run(
    client: &RachClient,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Sub { topic } => {
            client
                .subscribe(&topic, |p| {
                    println!("{} <- {}: {}", p.topic, p.source_topic, p.data);
                })
                .await?;
            println!("subscribed to {}", client.resolve_topic(&topic));
            tokio::signal::ctrl_c().await?;
        }
        Commands::Pub { topic, data } => {
            let data = parse_json(&data)?;
            let publisher = client.add_publisher(&topic).await?;
            publisher.publish(data)?;
            publisher.close().await?;
        }
        Commands::Call { service, args } => {
            let args = args
                .iter()
                .map(|a| parse_json(a))
                .collect::<Result<Vec<_>>>()?;
            let result = client.call(&service, args).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}

/// Невалидный JSON трактуется как строка.
fn parse_json(raw: &str) -> Result<Value> {
    Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if verbose { "debug" } else { "error" };
    fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
