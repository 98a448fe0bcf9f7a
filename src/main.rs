//! Basehound - Dual-Strategy DEX Trading Engine for Base

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use basehound::adapters::cli::{
    BlacklistCmd, BuyCmd, CliApp, Command, PositionsCmd, RunCmd, SellCmd, StatusCmd,
};
use basehound::adapters::{
    build_venues, EvmChainFeed, EvmClient, EvmConfig, HttpIndicatorSource, HttpSecurityOracle,
    LogNotifier, NoIndicators, OracleConfig, TelegramConfig, TelegramNotifier,
};
use basehound::application::Orchestrator;
use basehound::config::{load_config, Config};
use basehound::domain::{Side, StrategyId, TokenAddress};
use basehound::persistence::{EngineState, RecoveryStatus};
use basehound::ports::{ChainFeed, IndicatorSource, Notifier, SecurityOracle};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present (secrets go here, not in config.toml)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    init_logging(app.verbose, app.debug);

    match app.command {
        Command::Run(cmd) => run_command(cmd).await,
        Command::Status(cmd) => status_command(cmd),
        Command::Buy(cmd) => buy_command(cmd).await,
        Command::Sell(cmd) => sell_command(cmd).await,
        Command::Positions(cmd) => positions_command(cmd),
        Command::Blacklist(cmd) => blacklist_command(cmd).await,
    }
}

fn init_logging(verbose: bool, debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).init();
}

/// Build the engine from config with the real adapter set.
async fn build_engine(config: Config, rpc_override: Option<String>) -> Result<Arc<Orchestrator>> {
    config.validate().context("Invalid configuration")?;

    let rpc_url = rpc_override.unwrap_or_else(|| config.chain.get_rpc_url());
    let client = Arc::new(
        EvmClient::new(EvmConfig {
            rpc_url,
            wallet_address: config.chain.wallet_address.clone(),
            timeout: HTTP_TIMEOUT,
            max_retries: 3,
        })
        .context("Failed to create RPC client")?,
    );

    let feed: Arc<dyn ChainFeed> = Arc::new(EvmChainFeed::new(
        Arc::clone(&client),
        config.monitor.factory_addresses.clone(),
        Duration::from_secs(config.monitor.poll_interval_secs),
    ));

    let indicators: Arc<dyn IndicatorSource> = match &config.altcoin.indicator_api_url {
        Some(url) => Arc::new(
            HttpIndicatorSource::new(url.clone(), HTTP_TIMEOUT)
                .context("Failed to create indicator client")?,
        ),
        None => Arc::new(NoIndicators),
    };

    let oracle: Arc<dyn SecurityOracle> = Arc::new(
        HttpSecurityOracle::new(OracleConfig {
            honeypot_api_url: config.risk.honeypot_api_url.clone(),
            explorer_api_url: config.chain.explorer_api_url.clone(),
            explorer_api_key: config.chain.get_explorer_api_key(),
            timeout: Duration::from_secs(config.risk.check_timeout_secs),
        })
        .context("Failed to create security oracle")?,
    );

    let venues = build_venues(
        &config.execution.venues,
        &client,
        Duration::from_secs(config.execution.order_ttl_secs),
    );
    if venues.is_empty() {
        bail!("No known venues configured");
    }

    let notifier: Arc<dyn Notifier> = match config.telegram.get_bot_token() {
        Some(bot_token) if config.telegram.enabled => Arc::new(
            TelegramNotifier::new(TelegramConfig {
                bot_token,
                chat_id: config.telegram.chat_id.clone(),
                timeout: HTTP_TIMEOUT,
            })
            .context("Failed to create Telegram notifier")?,
        ),
        _ => Arc::new(LogNotifier),
    };

    let engine =
        Orchestrator::bootstrap(config, feed, indicators, oracle, venues, client, notifier)
            .await
            .context("Failed to bootstrap engine")?;
    Ok(Arc::new(engine))
}

async fn run_command(cmd: RunCmd) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    let engine = build_engine(config, cmd.rpc_url).await?;

    let handle = Arc::clone(&engine);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        handle.shutdown();
    });

    engine.run().await?;
    Ok(())
}

/// Read the state file directly; status never needs a node connection.
fn load_state(config: &Config) -> Result<Option<EngineState>> {
    match EngineState::load(Path::new(&config.chain.expanded_state_file())) {
        RecoveryStatus::Fresh => Ok(None),
        RecoveryStatus::Recovered(state) => Ok(Some(state)),
        RecoveryStatus::Corrupted(reason) => bail!("State file is corrupted: {reason}"),
    }
}

fn status_command(cmd: StatusCmd) -> Result<()> {
    let config = load_config(&cmd.config)?;
    let Some(state) = load_state(&config)? else {
        println!("No engine state yet; run `basehound run` first.");
        return Ok(());
    };
    println!("State saved at: {}", state.saved_at);
    for strategy in [StrategyId::Memecoin, StrategyId::Altcoin] {
        let account = state.ledger.account(strategy);
        println!(
            "{strategy}: available ${} / ceiling ${} (allocated ${}, realized P&L ${})",
            account.available, account.ceiling, account.allocated, account.realized_pnl
        );
    }
    let live = state.positions.iter().filter(|p| p.is_live()).count();
    println!("Open positions: {live}");
    println!("Blacklisted tokens: {}", state.blacklist.len());
    Ok(())
}

fn positions_command(cmd: PositionsCmd) -> Result<()> {
    let config = load_config(&cmd.config)?;
    let Some(state) = load_state(&config)? else {
        println!("No engine state yet.");
        return Ok(());
    };
    let mut any = false;
    for position in state.positions.iter().filter(|p| p.is_live()) {
        any = true;
        println!(
            "{} [{}] {} {:?}: entry ${:.8}, qty {:.4}, target ${:.8}, stop ${:.8}",
            position.id,
            position.strategy,
            position.token.address,
            position.state,
            position.entry_price,
            position.quantity,
            position.profit_target_price,
            position.stop_loss_price,
        );
    }
    if !any {
        println!("No open positions.");
    }
    Ok(())
}

fn parse_strategy(raw: &str) -> Result<StrategyId> {
    match raw.to_lowercase().as_str() {
        "memecoin" | "meme" => Ok(StrategyId::Memecoin),
        "altcoin" | "alt" => Ok(StrategyId::Altcoin),
        other => bail!("Unknown strategy '{other}' (expected memecoin or altcoin)"),
    }
}

async fn buy_command(cmd: BuyCmd) -> Result<()> {
    let config = load_config(&cmd.config)?;
    let token = TokenAddress::new(&cmd.token)?;
    let strategy = parse_strategy(&cmd.strategy)?;
    let engine = build_engine(config, None).await?;
    engine
        .submit_manual_order(token.clone(), strategy, Side::Buy)
        .await?;
    println!("Buy order for {token} filled.");
    Ok(())
}

async fn sell_command(cmd: SellCmd) -> Result<()> {
    let config = load_config(&cmd.config)?;
    let token = TokenAddress::new(&cmd.token)?;
    let engine = build_engine(config, None).await?;
    // The position's own strategy governs the sell; the flag is not needed.
    let strategy = engine
        .open_positions()
        .await
        .iter()
        .find(|p| p.token.address == token)
        .map(|p| p.strategy)
        .unwrap_or(StrategyId::Memecoin);
    engine
        .submit_manual_order(token.clone(), strategy, Side::Sell)
        .await?;
    println!("Position in {token} closed.");
    Ok(())
}

async fn blacklist_command(cmd: BlacklistCmd) -> Result<()> {
    let config = load_config(&cmd.config)?;
    let token = TokenAddress::new(&cmd.token)?;
    let engine = build_engine(config, None).await?;
    if engine.blacklist_token(token.clone()).await {
        println!("Blacklisted {token}.");
    } else {
        println!("{token} was already blacklisted.");
    }
    Ok(())
}
