use std::sync::Arc;

use anyhow::Context;

use print_quote::bot::QuoteBot;
use print_quote::channels::{Channel, CliChannel, TelegramChannel};
use print_quote::config::{BotConfig, ChannelKind};
use print_quote::dialogue::Dialogue;
use print_quote::error::StartupError;
use print_quote::guard;
use print_quote::logging;
use print_quote::pricing::{PricingTable, format_price};
use print_quote::session::InMemorySessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export TELEGRAM_BOT_TOKEN=123456:ABC...  (or PRINT_QUOTE_CHANNEL=cli)");
        std::process::exit(1);
    });

    let _log_guard = logging::init_tracing(&config.log_dir)
        .with_context(|| format!("failed to set up logging in {}", config.log_dir.display()))?;

    // Refuse to start next to another poller on the same token.
    let guard = guard::from_config(&config.lock);
    let _instance = match guard.acquire() {
        Ok(lock) => {
            tracing::info!(lock = lock.resource(), "Instance lock acquired");
            lock
        }
        Err(StartupError::TransportConflict { resource }) => {
            tracing::error!(%resource, "Another instance is already running");
            eprintln!("Error: another instance is already running ({resource})");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("failed to acquire instance lock"),
    };

    let table = match &config.prices_path {
        Some(path) => PricingTable::load(path)
            .with_context(|| format!("failed to load prices from {}", path.display()))?,
        None => PricingTable::default(),
    };

    eprintln!("🖨️  Print Quote v{}", env!("CARGO_PKG_VERSION"));
    for material in table.materials() {
        for (name, price) in price_lines(material) {
            eprintln!("   {name}: {} руб./м²", format_price(price));
        }
    }
    eprintln!(
        "   Size: {}–{} m, quantity: {}–{}",
        config.limits.min_size,
        config.limits.max_size,
        config.limits.min_quantity,
        config.limits.max_quantity
    );

    let channel: Arc<dyn Channel> = match config.channel {
        ChannelKind::Cli => {
            eprintln!("   Channel: cli (type /start, Ctrl+C to exit)\n");
            Arc::new(CliChannel::new())
        }
        ChannelKind::Telegram => {
            let telegram = config
                .telegram
                .context("telegram channel selected without credentials")?;
            eprintln!("   Channel: telegram\n");
            Arc::new(TelegramChannel::new(
                telegram.bot_token,
                telegram.allowed_users,
            ))
        }
    };

    channel
        .health_check()
        .await
        .with_context(|| format!("{} channel health check failed", channel.name()))?;

    let dialogue = Dialogue::new(table, config.limits);
    let bot = Arc::new(QuoteBot::new(
        dialogue,
        Arc::new(InMemorySessionStore::new()),
        channel,
    ));

    bot.run().await?;
    Ok(())
}

/// `(display name, price per m²)` for each priced variant of a material.
fn price_lines(material: &print_quote::pricing::Material) -> Vec<(String, rust_decimal::Decimal)> {
    use print_quote::pricing::MaterialPricing;

    match &material.pricing {
        MaterialPricing::Flat(price) => vec![(material.label.clone(), *price)],
        MaterialPricing::Subtypes(subtypes) => subtypes
            .iter()
            .map(|s| (material.display_name(Some(s.key.as_str())), s.price))
            .collect(),
    }
}
