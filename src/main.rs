use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use coinbank::application::{AccountView, DepositService, StatsNotifier};
use coinbank::domain::{
    format_amount, truncate_payment_request, DepositMethod, DepositStep, PaymentSession, Settlement,
};
use coinbank::infrastructure::{BankApiAdapter, DepositMonitor};
use coinbank::shared::LoggingUtils;
use coinbank::AppConfig;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about = "Deposit into a coinbank account", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Request a network payment for AMOUNT and wait until it is paid or expires
    Deposit { amount: String },
    /// Redeem a bearer token into the account
    Redeem { token: String },
    /// Show the signed-in account's balance
    Balance,
    /// Show aggregate bank figures
    Stats,
    /// Show mint metadata
    Info,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = LoggingUtils::initialize(&config.logging.level, &config.logging.format) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config, cli.command).await {
        error!("{:#}", e);
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: AppConfig, command: Command) -> anyhow::Result<()> {
    let api = Arc::new(BankApiAdapter::new(&config.api)?);

    match command {
        Command::Deposit { amount } => deposit(&config, api, DepositMethod::Network, &amount).await,
        Command::Redeem { token } => deposit(&config, api, DepositMethod::Token, &token).await,
        Command::Balance => {
            let snapshot = api.get_account_snapshot().await?;
            println!("{} @ {}: {}", snapshot.username, snapshot.bank_name, snapshot.display_balance());
            Ok(())
        }
        Command::Stats => {
            let stats = api.get_stats().await?;
            println!("accounts:    {}", stats.total_accounts);
            println!("assets:      {}", format_amount(stats.total_assets, &stats.currency_symbol));
            println!("liabilities: {}", format_amount(stats.total_liabilities, &stats.currency_symbol));
            Ok(())
        }
        Command::Info => {
            let mint = api.get_mint_info().await?;
            println!("{}", serde_json::to_string_pretty(&mint)?);
            Ok(())
        }
    }
}

/// Run one deposit session to a terminal step, closing it on Ctrl-C
async fn deposit(
    config: &AppConfig,
    api: Arc<BankApiAdapter>,
    method: DepositMethod,
    input: &str,
) -> anyhow::Result<()> {
    let view = Arc::new(AccountView::new());
    let symbol = match view.refresh(&api).await {
        Ok(snapshot) => snapshot.currency_symbol,
        Err(e) => {
            warn!(error = %e, "Could not load account snapshot");
            String::new()
        }
    };

    let notifier = StatsNotifier::default();
    let monitor = Arc::new(DepositMonitor::new()?);
    let service = DepositService::new(&config.deposit, api, view.clone(), notifier, monitor.clone());
    let mut updates = service.subscribe();

    service.choose_method(method)?;
    let session = match method {
        DepositMethod::Network => service.submit_amount(input).await?,
        DepositMethod::Token => service.submit_token(input).await?,
    };
    render(&session, &symbol);

    let mut session = session;
    while !session.step.is_terminal() {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                session = updates.borrow_and_update().clone();
                render(&session, &symbol);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing deposit session");
                service.close();
                break;
            }
        }
    }

    info!(
        poll_ticks = monitor.poll_ticks(),
        settlements = monitor.settlements(),
        "Deposit session finished"
    );
    deposit_outcome(&service.session())?;

    if let Some(balance) = view.balance() {
        println!("Balance: {}", format_amount(balance, &symbol));
    }
    Ok(())
}

/// Only a settled session counts as a successful deposit
fn deposit_outcome(session: &PaymentSession) -> anyhow::Result<Settlement> {
    match &session.step {
        DepositStep::Success(settlement) => Ok(*settlement),
        DepositStep::Error | DepositStep::Expired => match &session.last_error {
            Some(message) => bail!("{}: {}", session.step.title(), message),
            None => bail!("{}", session.step.title()),
        },
        step => bail!("Deposit closed before it settled (at {})", step.name()),
    }
}

fn render(session: &PaymentSession, symbol: &str) {
    match &session.step {
        DepositStep::AwaitingNetworkSettlement { amount, quote } => {
            println!("{}: {}", session.step.title(), format_amount(*amount, symbol));
            println!("  {}", truncate_payment_request(&quote.payment_request));
            println!("  full request: {}", quote.payment_request);
            println!("  expires {}", quote.expires_at.to_rfc3339());
            println!("  waiting for payment...");
        }
        DepositStep::Success(settlement) => {
            println!("{}", session.step.title());
            println!("  credited {}", format_amount(settlement.settled_amount, symbol));
        }
        DepositStep::Error | DepositStep::Expired => {
            println!("{}", session.step.title());
            if let Some(message) = &session.last_error {
                println!("  {}", message);
            }
        }
        _ => println!("{}", session.step.title()),
    }
}
