use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use snark_agent::openai::OpenAiProvider;
use snark_agent::report::{ErrorReporter, PanicReport, TracingReporter};
use snark_agent::Relay;
use snark_core::RelayConfig;
use snark_discord::DiscordAdapter;

/// Discord ↔ OpenAI chat relay.
#[derive(Debug, Parser)]
#[command(name = "snark-bot", version)]
struct Args {
    /// TOML config file (falls back to $SNARK_CONFIG, then ./snark.toml).
    /// Env vars (DISCORD_TOKEN, OPENAI_API_KEY, CHANNEL_ID, ...) override it.
    #[arg(long)]
    config: Option<String>,

    /// Load and validate the configuration, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snark_bot=info,snark_discord=info,snark_agent=info".into()),
        )
        .init();

    let reporter: Arc<dyn ErrorReporter> = Arc::new(TracingReporter);
    install_panic_hook(Arc::clone(&reporter));

    let args = Args::parse();
    let config = RelayConfig::load(args.config.as_deref())?;
    info!(
        model = %config.openai_model,
        channels = config.channels.len(),
        foreign_users = ?config.foreign_users,
        "configuration loaded"
    );

    if args.check {
        return Ok(());
    }

    let provider = Arc::new(OpenAiProvider::new(
        config.openai_api_key.clone(),
        Some(config.openai_base_url.clone()),
    ));
    let relay = Arc::new(Relay::new(&config, provider, reporter));

    let adapter = DiscordAdapter::new(&config.discord_token, relay)?;

    tokio::select! {
        _ = adapter.run() => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received, exiting");
        }
    }

    Ok(())
}

/// Send panics to the error reporter instead of losing them. A panic inside an
/// event task kills only that task; the gateway keeps running.
fn install_panic_hook(reporter: Arc<dyn ErrorReporter>) {
    std::panic::set_hook(Box::new(move |info| {
        let report = PanicReport::from_payload(info.payload(), info.location());
        reporter.report("panic", &report);
    }));
}
