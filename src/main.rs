use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::Parser;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

use folio::benchmark;
use folio::cli::{Cli, Commands, MappingsCommands, PriceCommands};
use folio::config::Config;
use folio::db;
use folio::importers;
use folio::pricing::provider;
use folio::reports::{cashflow, portfolio, rebalance};
use folio::utils::{format_amount, format_money, format_quantity};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Import { file, dry_run } => handle_import(&file, dry_run).await,

        Commands::Mappings { action } => match action {
            MappingsCommands::Load { file } => handle_mappings_load(&file),
            MappingsCommands::List => handle_mappings_list(cli.json),
        },

        Commands::Prices { action } => match action {
            PriceCommands::Update => handle_prices_update().await,
            PriceCommands::Quote { ticker } => handle_prices_quote(&ticker).await,
            PriceCommands::History { ticker, from, to } => {
                handle_prices_history(&ticker, &from, &to).await
            }
        },

        Commands::Portfolio => handle_portfolio(cli.json),

        Commands::Benchmark { ticker, trades } => handle_benchmark(ticker, trades, cli.json).await,

        Commands::Cashflow => handle_cashflow(cli.json),

        Commands::Rebalance => handle_rebalance(cli.json),
    }
}

/// Handle import command
async fn handle_import(file_path: &str, dry_run: bool) -> Result<()> {
    info!("Importing transactions from: {}", file_path);

    let raw_transactions = importers::import_file(file_path)?;

    println!(
        "\n{} Found {} transactions\n",
        "✓".green().bold(),
        raw_transactions.len()
    );

    #[derive(Tabled)]
    struct TransactionPreview {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Product")]
        product: String,
        #[tabled(rename = "ISIN")]
        isin: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Local value")]
        local_value: String,
        #[tabled(rename = "Ccy")]
        currency: String,
    }

    let preview: Vec<TransactionPreview> = raw_transactions
        .iter()
        .take(10)
        .map(|tx| TransactionPreview {
            date: tx.trade_date.format("%Y-%m-%d").to_string(),
            product: tx.product.clone(),
            isin: tx.isin.clone(),
            quantity: format_quantity(tx.quantity),
            local_value: format_amount(tx.local_value),
            currency: tx.currency.clone(),
        })
        .collect();

    let table = Table::new(preview).with(Style::rounded()).to_string();
    println!("{}", table);

    if raw_transactions.len() > 10 {
        println!("\n... and {} more transactions", raw_transactions.len() - 10);
    }

    if dry_run {
        println!("\n{} Dry run - no changes saved", "ℹ".blue().bold());
        return Ok(());
    }

    db::init_database(None)?;
    let conn = db::open_db(None)?;

    let mut imported = 0;
    let mut skipped = 0;
    let mut errors = 0;

    for raw_tx in &raw_transactions {
        let transaction = raw_tx.to_transaction("CSV");

        match db::insert_transaction(&conn, &transaction) {
            Ok(true) => imported += 1,
            Ok(false) => skipped += 1,
            Err(e) => {
                eprintln!("Error inserting transaction: {}", e);
                errors += 1;
            }
        }
    }

    // Stored inputs changed; memoized simulation runs are stale
    benchmark::cache::clear();

    println!("\n{} Import complete!", "✓".green().bold());
    println!("  Imported: {}", imported.to_string().green());
    if skipped > 0 {
        println!("  Skipped (duplicates): {}", skipped.to_string().yellow());
    }
    if errors > 0 {
        println!("  Errors: {}", errors.to_string().red());
    }

    Ok(())
}

fn handle_mappings_load(file_path: &str) -> Result<()> {
    let mappings = importers::mapping_csv::parse_mapping_csv(file_path)?;
    if mappings.is_empty() {
        return Err(anyhow!("No usable mappings found in {}", file_path));
    }

    db::init_database(None)?;
    let mut conn = db::open_db(None)?;
    db::replace_mappings(&mut conn, &mappings)?;

    println!(
        "{} Saved {} mappings (previous set replaced)",
        "✓".green().bold(),
        mappings.len()
    );
    Ok(())
}

fn handle_mappings_list(json: bool) -> Result<()> {
    db::init_database(None)?;
    let conn = db::open_db(None)?;
    let mappings = db::get_mappings(&conn)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&mappings)?);
        return Ok(());
    }

    if mappings.is_empty() {
        println!("No mappings saved. Load one with: folio mappings load <file.csv>");
        return Ok(());
    }

    #[derive(Tabled)]
    struct MappingRow {
        #[tabled(rename = "ISIN")]
        isin: String,
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "Category")]
        category: String,
    }

    let rows: Vec<MappingRow> = mappings
        .iter()
        .map(|m| MappingRow {
            isin: m.isin.clone(),
            ticker: m.ticker.clone(),
            category: m.category.as_str().to_string(),
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

async fn handle_prices_update() -> Result<()> {
    db::init_database(None)?;
    let conn = db::open_db(None)?;

    let mappings = db::get_mappings(&conn)?;
    if mappings.is_empty() {
        println!("No mappings saved; nothing to update.");
        return Ok(());
    }

    let today = chrono::Local::now().date_naive();
    let earliest_tx = db::get_earliest_transaction_date(&conn)?;
    let mut total_stored = 0;

    for mapping in &mappings {
        let from = match db::get_latest_price_date_for(&conn, &mapping.ticker)? {
            Some(last) => last.succ_opt().unwrap_or(last),
            None => match earliest_tx {
                Some(date) => date,
                None => {
                    println!(
                        "  {} no transactions yet, skipping {}",
                        "ℹ".blue(),
                        mapping.ticker
                    );
                    continue;
                }
            },
        };

        if from > today {
            continue;
        }

        match provider::fetch_historical_prices(&mapping.ticker, from, today).await {
            Ok(series) => {
                let mut stored = 0;
                for price in &series.prices {
                    db::insert_price_observation(
                        &conn,
                        &db::PriceObservation {
                            id: None,
                            ticker: mapping.ticker.clone(),
                            price_date: price.date,
                            close_price: price.close,
                            source: "PROVIDER".to_string(),
                            created_at: chrono::Utc::now(),
                        },
                    )?;
                    stored += 1;
                }
                total_stored += stored;
                println!("  {} {}: {} observations", "✓".green(), mapping.ticker, stored);
            }
            Err(e) => {
                println!("  {} {}: {}", "✗".red(), mapping.ticker, e);
            }
        }
    }

    benchmark::cache::clear();

    println!(
        "\n{} Price update complete: {} observations stored",
        "✓".green().bold(),
        total_stored
    );
    Ok(())
}

async fn handle_prices_quote(ticker: &str) -> Result<()> {
    let price = folio::pricing::fetch_price(ticker).await?;
    println!("{}: {}", ticker.bold(), format_amount(price));
    Ok(())
}

async fn handle_prices_history(ticker: &str, from: &str, to: &str) -> Result<()> {
    let from = parse_date_arg(from)?;
    let to = parse_date_arg(to)?;

    db::init_database(None)?;
    let conn = db::open_db(None)?;

    let series = provider::fetch_historical_prices(ticker, from, to).await?;

    for price in &series.prices {
        db::insert_price_observation(
            &conn,
            &db::PriceObservation {
                id: None,
                ticker: ticker.to_string(),
                price_date: price.date,
                close_price: price.close,
                source: "PROVIDER".to_string(),
                created_at: chrono::Utc::now(),
            },
        )?;
    }

    benchmark::cache::clear();

    println!(
        "{} Stored {} observations for {} ({})",
        "✓".green().bold(),
        series.prices.len(),
        ticker,
        series.currency
    );
    Ok(())
}

fn handle_portfolio(json: bool) -> Result<()> {
    db::init_database(None)?;
    let conn = db::open_db(None)?;
    let config = Config::load(None)?;

    let report = portfolio::calculate_portfolio(&conn)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.positions.is_empty() {
        println!("No open positions. Import transactions with: folio import <file.csv>");
        return Ok(());
    }

    #[derive(Tabled)]
    struct PositionRow {
        #[tabled(rename = "Product")]
        product: String,
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "Qty")]
        quantity: String,
        #[tabled(rename = "Invested")]
        invested: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "P&L")]
        pl: String,
        #[tabled(rename = "P&L %")]
        pl_pct: String,
    }

    let rows: Vec<PositionRow> = report
        .positions
        .iter()
        .map(|p| PositionRow {
            product: p.product.clone(),
            ticker: p.ticker.clone().unwrap_or_else(|| "-".to_string()),
            quantity: format_quantity(p.quantity),
            invested: format_amount(p.net_invested),
            value: p.current_value.map(format_amount).unwrap_or_else(|| "-".to_string()),
            pl: p
                .unrealized_pl
                .map(|pl| {
                    let s = format_amount(pl);
                    if pl < rust_decimal::Decimal::ZERO {
                        s.red().to_string()
                    } else {
                        s.green().to_string()
                    }
                })
                .unwrap_or_else(|| "-".to_string()),
            pl_pct: p
                .unrealized_pl_pct
                .map(|pct| format!("{:.2}%", pct))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));
    println!(
        "\n  Invested: {}   Value: {}   P&L: {} ({:.2}%)",
        format_money(report.total_invested, &config.home_currency),
        format_money(report.total_value, &config.home_currency),
        format_money(report.total_pl, &config.home_currency),
        report.total_pl_pct
    );
    Ok(())
}

async fn handle_benchmark(ticker: Option<String>, show_trades: bool, json: bool) -> Result<()> {
    db::init_database(None)?;
    let conn = db::open_db(None)?;
    let config = Config::load(None)?;

    let ticker = ticker
        .or_else(|| config.default_benchmark.clone())
        .ok_or_else(|| {
            anyhow!("No benchmark ticker given and no default_benchmark configured")
        })?;

    let report = benchmark::run_benchmark(&conn, &config, &ticker).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.points.is_empty() {
        println!("No capital deployed in the period; nothing to compare.");
        return Ok(());
    }

    let first = report.points.first().unwrap();
    let last = report.points.last().unwrap();

    println!(
        "\n{} Benchmark {} ({}, home {})",
        "✓".green().bold(),
        report.ticker,
        report.reference_currency,
        report.home_currency
    );
    println!(
        "  Period: {} to {} ({} days, {} synthetic trades, {} units held)",
        first.day,
        last.day,
        report.points.len(),
        report.trades.len(),
        format_quantity(report.final_units)
    );
    println!(
        "  Final:  portfolio {}   benchmark {}",
        format_money(last.real_value, &config.home_currency).bold(),
        format_money(last.reference_value, &config.home_currency).bold()
    );

    #[derive(Tabled)]
    struct PointRow {
        #[tabled(rename = "Day")]
        day: String,
        #[tabled(rename = "Portfolio")]
        real: String,
        #[tabled(rename = "Benchmark")]
        reference: String,
    }

    let tail: Vec<PointRow> = report
        .points
        .iter()
        .rev()
        .take(10)
        .rev()
        .map(|p| PointRow {
            day: p.day.to_string(),
            real: format_amount(p.real_value),
            reference: format_amount(p.reference_value),
        })
        .collect();

    println!("\nLast {} days (full series via --json):", tail.len());
    println!("{}", Table::new(tail).with(Style::rounded()));

    if show_trades {
        #[derive(Tabled)]
        struct TradeRow {
            #[tabled(rename = "Day")]
            day: String,
            #[tabled(rename = "Kind")]
            kind: String,
            #[tabled(rename = "Cash")]
            cash: String,
            #[tabled(rename = "Quantity")]
            quantity: String,
            #[tabled(rename = "Price")]
            price: String,
            #[tabled(rename = "Ccy")]
            currency: String,
        }

        let rows: Vec<TradeRow> = report
            .trades
            .iter()
            .map(|t| TradeRow {
                day: t.day.to_string(),
                kind: benchmark::ShadowTrade::KIND.to_string(),
                cash: format_amount(t.cash_amount),
                quantity: format_quantity(t.quantity),
                price: format_amount(t.price),
                currency: t.currency.clone(),
            })
            .collect();

        println!("\nSynthetic trades:");
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    Ok(())
}

fn handle_cashflow(json: bool) -> Result<()> {
    db::init_database(None)?;
    let conn = db::open_db(None)?;

    let flows = cashflow::monthly_cash_flows(&conn)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&flows)?);
        return Ok(());
    }

    if flows.is_empty() {
        println!("No transactions recorded.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct FlowRow {
        #[tabled(rename = "Month")]
        month: String,
        #[tabled(rename = "Invested")]
        invested: String,
        #[tabled(rename = "Returned")]
        returned: String,
        #[tabled(rename = "Net")]
        net: String,
    }

    let rows: Vec<FlowRow> = flows
        .iter()
        .map(|f| FlowRow {
            month: format!("{}-{:02}", f.year, f.month),
            invested: format_amount(f.invested),
            returned: format_amount(f.returned),
            net: format_amount(f.net),
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

fn handle_rebalance(json: bool) -> Result<()> {
    db::init_database(None)?;
    let conn = db::open_db(None)?;
    let config = Config::load(None)?;

    let report = portfolio::calculate_portfolio(&conn)?;
    let entries = rebalance::calculate_rebalance(&report, &config.targets)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct RebalanceRow {
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Current %")]
        current_pct: String,
        #[tabled(rename = "Target %")]
        target_pct: String,
        #[tabled(rename = "Action")]
        action: String,
    }

    let rows: Vec<RebalanceRow> = entries
        .iter()
        .map(|e| {
            let action = if e.delta > rust_decimal::Decimal::ZERO {
                format!("buy {}", format_amount(e.delta)).green().to_string()
            } else if e.delta < rust_decimal::Decimal::ZERO {
                format!("sell {}", format_amount(-e.delta)).red().to_string()
            } else {
                "-".to_string()
            };
            RebalanceRow {
                category: e.category.clone(),
                value: format_amount(e.current_value),
                current_pct: format!("{:.1}%", e.current_pct),
                target_pct: format!("{:.1}%", e.target_pct),
                action,
            }
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

fn parse_date_arg(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid date '{}', expected YYYY-MM-DD", value))
}
