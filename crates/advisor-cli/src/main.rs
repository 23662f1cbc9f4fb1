//! Interactive stock advisor
//!
//! Wires the engine, the agent bench, the portfolio evaluator and the
//! schedule driver to a terminal session. Talks to an OpenAI-compatible
//! model endpoint and a market data REST service.
//!
//! ```bash
//! export OPENAI_API_BASE="http://localhost:1234/v1"
//! export OPENAI_MODEL="your-model-name"
//! advisor --debug
//! ```

mod inference;
mod market;
mod repl;
mod transport;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use advisor_core::{
    AdvisorConfig, Holding, MarketData, MemoryStorage, Query, ScheduleConfig, Storage,
};
use advisor_engine::{AdvisorEngine, EngineResponse};
use advisor_portfolio::{EvaluationRunner, PortfolioEvaluator, Scheduler};
use chrono::Utc;
use clap::Parser;

use crate::inference::{ChatConfig, ChatInference};
use crate::market::HttpMarketData;
use crate::repl::LocalCommand;
use crate::transport::StdoutTransport;

#[derive(Parser)]
#[command(name = "advisor", about = "Interactive stock advisor", version)]
struct Cli {
    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_API_BASE", default_value = "http://localhost:1234/v1")]
    api_base: String,

    /// API key for the model endpoint
    #[arg(long, env = "OPENAI_API_KEY", default_value = "not-needed", hide_env_values = true)]
    api_key: String,

    /// Model name
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// Market data REST service base URL
    #[arg(long, env = "MARKET_DATA_API_BASE", default_value = "http://localhost:9000")]
    market_data_base: String,

    /// User id for this session
    #[arg(long, default_value_t = 1)]
    user_id: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "debug"
    } else {
        "warn,advisor=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string()),
        )
        .init();

    let config = Arc::new(AdvisorConfig::default());
    config.validate()?;

    let inference = Arc::new(ChatInference::new(ChatConfig::new(
        &cli.api_base,
        &cli.api_key,
        &cli.model,
    ))?);
    let market_data: Arc<dyn MarketData> = Arc::new(HttpMarketData::new(&cli.market_data_base)?);
    let storage = Arc::new(MemoryStorage::new());
    let registry = Arc::new(advisor_agents::full_registry(inference));

    let engine = Arc::new(AdvisorEngine::new(
        registry,
        Arc::clone(&market_data),
        Arc::clone(&config),
    )?);
    let evaluator = Arc::new(PortfolioEvaluator::new(
        Arc::clone(&engine),
        market_data,
        Arc::clone(&storage) as Arc<dyn Storage>,
    ));

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&storage) as Arc<dyn Storage>,
        Arc::new(StdoutTransport),
        Arc::clone(&evaluator) as Arc<dyn EvaluationRunner>,
        config.scheduler,
    ));
    tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.run().await }
    });

    println!("Stock advisor ready. /help for commands, /exit to quit.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                eprintln!("input error: {err}");
                continue;
            }
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match repl::parse_local(input) {
            Some(Ok(LocalCommand::Exit)) => break,
            Some(Ok(command)) => {
                let reply = run_local(command, cli.user_id, &storage).await;
                println!("{reply}\n");
            }
            Some(Err(usage)) => println!("{usage}\n"),
            None => {
                let query = Query::new(cli.user_id, input);
                match engine.handle_query(&query).await {
                    EngineResponse::Text(text) => println!("{text}\n"),
                    EngineResponse::PortfolioRequested => {
                        match evaluator.evaluate_and_render(cli.user_id).await {
                            Ok(report) => println!("{report}\n"),
                            Err(err) => {
                                tracing::warn!(%err, "portfolio evaluation failed");
                                println!("{}\n", err.user_message());
                            }
                        }
                    }
                }
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

async fn run_local(command: LocalCommand, user_id: i64, storage: &Arc<MemoryStorage>) -> String {
    match command {
        LocalCommand::Add {
            ticker,
            quantity,
            price,
        } => {
            let holding = Holding {
                ticker: ticker.clone(),
                quantity,
                average_cost: price,
                acquired_on: Utc::now(),
            };
            match storage.add_holding(user_id, holding).await {
                Ok(()) => format!("Added {quantity} x {ticker} @ {price:.2}"),
                Err(err) => err.user_message(),
            }
        }
        LocalCommand::Remove { ticker, quantity } => {
            match storage.remove_holding(user_id, &ticker, quantity).await {
                Ok(()) => match quantity {
                    Some(quantity) => format!("Removed {quantity} from {ticker}"),
                    None => format!("Removed {ticker}"),
                },
                Err(err) => err.user_message(),
            }
        }
        LocalCommand::ScheduleOn {
            fire_time,
            utc_offset_minutes,
        } => {
            let config = ScheduleConfig {
                user_id,
                enabled: true,
                fire_time,
                utc_offset_minutes,
            };
            match storage.set_schedule_config(config).await {
                Ok(()) => format!("Daily evaluation scheduled at {fire_time}"),
                Err(err) => err.user_message(),
            }
        }
        LocalCommand::ScheduleOff => {
            let existing = match storage.schedule_config(user_id).await {
                Ok(existing) => existing,
                Err(err) => return err.user_message(),
            };
            match existing {
                Some(mut config) => {
                    config.enabled = false;
                    match storage.set_schedule_config(config).await {
                        Ok(()) => "Scheduled evaluation disabled".to_string(),
                        Err(err) => err.user_message(),
                    }
                }
                None => "No schedule configured".to_string(),
            }
        }
        // Exit never reaches here; the loop breaks on it first.
        LocalCommand::Exit => String::new(),
    }
}
