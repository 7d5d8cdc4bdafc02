use std::path::PathBuf;

use clap::{ArgAction, Parser};

use capital_gain_tax_sweden::{
    compute_report,
    config::{ErrorPolicy, RateSourceConfig, ReportConfig},
    provider::{CachedProvider, RateProvider, RiksbankClient, RIKSBANK_API_URL, SEK_USD_SERIES},
    report::{print_report, write_detail_as_csv},
    schwab::read_export,
    Result,
};

/// Capital gains tax on Schwab share sales, converted to SEK with Riksbank rates.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Transaction history exported from Schwab Equity Award Center (JSON).
    #[arg(long)]
    file: PathBuf,

    /// File keeping fetched exchange rates between runs.
    #[arg(long, env = "CGT_RATES_CACHE", default_value = "rates.json")]
    rates_cache: PathBuf,

    /// Always fetch rates, without reading or writing the cache.
    #[arg(long, conflicts_with = "refresh")]
    no_cache: bool,

    /// Fetch rates even if the cache covers the sales.
    #[arg(long)]
    refresh: bool,

    /// Riksbank series of the exchange rate.
    #[arg(long, env = "CGT_RATE_SERIES", default_value = SEK_USD_SERIES)]
    series: String,

    #[arg(long, env = "CGT_RATES_URL", default_value = RIKSBANK_API_URL)]
    rates_url: String,

    /// Whether a lot that cannot be read or priced fails the run or is left out.
    #[arg(long, value_enum, default_value_t = ErrorPolicy::Abort)]
    on_error: ErrorPolicy,

    /// Also write every lot with its rates and figures to this CSV file.
    #[arg(long)]
    detail_csv: Option<PathBuf>,

    /// Show each lot (-v) and debug output (-vv).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn configs(self) -> (PathBuf, RateSourceConfig, ReportConfig) {
        let rates = RateSourceConfig {
            base_url: self.rates_url,
            series: self.series,
            cache_path: (!self.no_cache).then_some(self.rates_cache),
            refresh: self.refresh,
        };
        let report = ReportConfig {
            verbosity: self.verbose,
            error_policy: self.on_error,
            detail_csv: self.detail_csv,
        };
        (self.file, rates, report)
    }
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn rate_provider(config: RateSourceConfig) -> Box<dyn RateProvider> {
    let client = RiksbankClient::new(config.base_url, config.series);
    match config.cache_path {
        Some(path) => Box::new(CachedProvider::new(client, path).refresh(config.refresh)),
        None => Box::new(client),
    }
}

fn main() -> Result<()> {
    let (file, rates, config) = Cli::parse().configs();
    init_logger(config.verbosity);

    let records = read_export(&file)?;
    let provider = rate_provider(rates);
    let report = compute_report(&records, provider.as_ref(), config.error_policy)?;

    if let Some(path) = &config.detail_csv {
        write_detail_as_csv(&report.results, path)?;
    }
    print_report(&report, &config)?;

    Ok(())
}
