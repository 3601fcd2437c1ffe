use std::{fs::File, io, path::PathBuf, sync::Arc};

use coin_ledger::{
    CatalogSeed, CoinEconomy, Error, LedgerConfig, dlq::TracingDlq, engine::Engine,
    ingestion::CsvReader, logging, report,
};
use pico_args::Arguments;

const HELP: &str = "\
Replay a coin ledger journal and print balances and withdrawals

USAGE:
  coin_ledger [OPTIONS] <JOURNAL.csv>

OPTIONS:
  --catalog    PATH        JSON catalog seed (plans, slabs, message costs, gifts)

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  RUST_LOG                 Log filter, logs go to stderr  [default: info]
  MIN_WITHDRAWAL_COINS, MAX_WITHDRAWAL_COINS,
  DAILY_WITHDRAWAL_LIMIT_COINS, WEEKLY_WITHDRAWAL_LIMIT_COINS,
  LEDGER_LOCK_TIMEOUT_MS, LEDGER_MAX_ATTEMPTS, LEDGER_RETRY_BACKOFF_MS,
  CATALOG_CACHE_TTL_SECS
";

struct Args {
    catalog: Option<PathBuf>,
    journal: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let args = Args {
        catalog: pargs.opt_value_from_str("--catalog")?,
        journal: pargs.free_from_str()?,
    };

    logging::init();

    let config = LedgerConfig::from_env().map_err(|e| Error::Config(e.to_string()))?;
    let seed = match &args.catalog {
        Some(path) => CatalogSeed::from_path(path)?,
        None => CatalogSeed::default(),
    };
    let economy = Arc::new(CoinEconomy::in_memory(&config, seed)?);

    let file = File::open(&args.journal)?;
    let ingestion = CsvReader::new(file)?;
    let mut engine = Engine::new(ingestion, economy.clone(), TracingDlq::default());
    engine.process().await?;

    report::write_report(
        io::stdout().lock(),
        &economy.accounts(),
        &economy.withdrawals().all(),
    )?;

    Ok(())
}
