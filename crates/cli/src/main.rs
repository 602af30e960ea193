//! Wallet-Scope — strategy reconstruction for prediction-market wallets
//!
//! Usage:
//!   wallet-scope analyze --wallet 0x...         — Run the full pipeline
//!   wallet-scope analyze --export report.json   — Also write the JSON report
//!   wallet-scope stats                          — Show collected data counts

use clap::{Parser, Subcommand};
use tracing::{error, info};

use engine::{pipeline, AnalysisConfig, FullReport};
use persistence::repository::{
    FillRepository, MarketRepository, OnchainRepository, PositionRepository,
};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "wallet-scope")]
#[command(about = "Reconstructs a wallet's trading strategy from its fill history", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// SQLite database path (overrides WALLET_SCOPE_DB_PATH)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis pipeline over a collected database
    Analyze {
        /// Wallet address under analysis (annotates the report)
        #[arg(long, default_value = "")]
        wallet: String,
        /// Permutation-test seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Optional JSON export path
        #[arg(long)]
        export: Option<String>,
    },
    /// Print row counts for the collected tables
    Stats,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,wallet_scope=debug")
    } else {
        EnvFilter::new("info,engine=info,wallet_scope=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn db_path(cli_path: &Option<String>) -> String {
    cli_path.clone().unwrap_or_else(|| {
        std::env::var("WALLET_SCOPE_DB_PATH").unwrap_or_else(|_| "data/wallet.db".to_string())
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    let path = db_path(&cli.db);
    match cli.command {
        Commands::Analyze {
            wallet,
            seed,
            export,
        } => {
            cmd_analyze(&path, wallet, seed, export).await?;
        }
        Commands::Stats => {
            cmd_stats(&path).await?;
        }
    }

    Ok(())
}

async fn cmd_analyze(
    path: &str,
    wallet: String,
    seed: u64,
    export: Option<String>,
) -> anyhow::Result<()> {
    info!("Wallet-Scope v{} starting...", APP_VERSION);

    let db = persistence::Database::new(path).await.map_err(|e| {
        error!("Failed to open database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database opened: {}", path);

    let config = AnalysisConfig {
        wallet,
        permutation_seed: seed,
        ..AnalysisConfig::default()
    };

    let report = pipeline::run(&db, &config)
        .await
        .map_err(|e| anyhow::anyhow!("Analysis failed: {}", e))?;
    print_report(&report);

    if let Some(export_path) = export {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&export_path, &json)?;
        println!("\nReport exported to {}", export_path);
    }

    Ok(())
}

fn print_report(report: &FullReport) {
    let head = &report.synthesis.headline;
    let fp = &report.synthesis.fingerprint;

    println!("\n=== Wallet-Scope v{} ===", APP_VERSION);
    if !report.wallet.is_empty() {
        println!("Wallet: {}", report.wallet);
    }
    println!(
        "Data: {} trades, {} markets, {} positions, {} on-chain fills",
        report.counts.trades, report.counts.markets, report.counts.positions,
        report.counts.onchain_fills
    );

    println!("\nStrategy: {}", report.synthesis.classification.label);
    println!(
        "  Markets: {} traded, {} both-sided, {} resolved",
        head.markets_traded, head.both_sided, report.pnl.summary.resolved_markets
    );
    println!(
        "  Mean spread: {:.2}c | mean balance: {:.2}",
        head.mean_spread * 100.0,
        report.synthesis.classification.mean_balance_ratio
    );

    println!("\nP&L decomposition:");
    println!("  {:<24} {:>12}", "Trade P&L", format_usd(head.trade_pnl));
    println!(
        "  {:<24} {:>12}",
        "  completeness spread",
        format_usd(report.pnl.summary.total_completeness_spread_pnl)
    );
    println!(
        "  {:<24} {:>12}",
        "  directional drag",
        format_usd(head.directional_drag)
    );
    println!("  {:<24} {:>12}", "  sell P&L", format_usd(head.sell_pnl));
    println!(
        "  Capture rate: {:.1}% of {} theoretical",
        head.capture_rate * 100.0,
        format_usd(head.theoretical_edge)
    );

    println!("\nRisk:");
    println!(
        "  Sharpe {:.1} | max DD {} | win rate {:.1}% | streaks +{}/-{}",
        head.sharpe_annualized,
        format_usd(head.max_drawdown),
        head.win_rate * 100.0,
        head.max_win_streak,
        head.max_loss_streak
    );

    println!("\nFingerprint:");
    println!(
        "  Entry {:.0}s median | leg gap {:.0}s | peak exposure {} over {} markets",
        fp.entry_speed_median_secs,
        fp.leg_gap_median_secs,
        format_usd(fp.peak_exposure),
        fp.peak_concurrent_markets
    );
    println!(
        "  Prediction: {:?} (symmetric z {:.2}, permutation p {:.3})",
        report.prediction.conclusion,
        report.prediction.symmetric.z,
        report.prediction.permutation.p_value
    );

    if !report.synthesis.limitations.is_empty() {
        println!("\nLimitations:");
        for lim in &report.synthesis.limitations {
            println!("  - {}", lim);
        }
    }
}

fn format_usd(v: f64) -> String {
    if v < 0.0 {
        format!("-${:.2}", -v)
    } else {
        format!("${:.2}", v)
    }
}

async fn cmd_stats(path: &str) -> anyhow::Result<()> {
    let db = persistence::Database::new(path)
        .await
        .map_err(|e| anyhow::anyhow!("Database initialization failed: {}", e))?;
    let pool = db.pool();

    let trades = FillRepository::new(pool).trade_count().await?;
    let markets = MarketRepository::new(pool).market_count().await?;
    let positions = PositionRepository::new(pool).position_count().await?;
    let onchain = OnchainRepository::new(pool).onchain_fill_count().await?;

    println!("Database: {}", path);
    println!("  trades:        {}", trades);
    println!("  markets:       {}", markets);
    println!("  positions:     {}", positions);
    println!("  onchain_fills: {}", onchain);
    Ok(())
}
