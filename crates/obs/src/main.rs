use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use obs_core::export::{write_csv, write_parquet};
use obs_core::sources::elkhorn_gis::{self, ElkhornGisQuery};
use obs_core::sources::lobo::{self, LoboQuery};
use obs_core::sources::mlml::{self, MlmlDataset, MlmlQuery};
use obs_core::sources::nerr::{self, NerrQuery};
use obs_core::sources::noaa_tides::{self, TideProduct, TideQuery};
use obs_core::sources::ocean_color::{self, OceanColorQuery};
use obs_core::{Endpoints, HttpFetcher};
use obs_parser::{parse_payload, NoaaTideConfig, ParseOptions, Provider, ProviderConfig, Table};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fetch and normalize coastal ocean observations", long_about = None)]
struct Cli {
    /// Escalate the first malformed row to an error instead of skipping it
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize a payload already on disk
    Parse(ParseArgs),
    /// Moss Landing Marine Labs shore station
    Mlml(MlmlArgs),
    /// LOBO mooring
    Lobo(LoboArgs),
    /// NERR SWMP station
    Nerr(NerrArgs),
    /// Elkhorn Slough GIS layer
    Elkhorn(ElkhornArgs),
    /// NOAA CO-OPS station
    Tides(TidesArgs),
    /// Save one raw NOAA CSV per year
    TidesDownload(TidesDownloadArgs),
    /// NASA Ocean Color Level-3 subset
    OceanColor(OceanColorArgs),
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Write the table to a .csv or .parquet file instead of printing it
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ParseArgs {
    #[arg(long)]
    provider: Provider,
    input: PathBuf,
    /// NOAA payload times are POSIX seconds
    #[arg(long)]
    epoch_seconds: bool,
    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Args, Debug)]
struct MlmlArgs {
    #[arg(long, default_value = "seawater", value_parser = parse_dataset)]
    dataset: MlmlDataset,
    #[arg(long)]
    begin: NaiveDate,
    #[arg(long)]
    end: NaiveDate,
    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Args, Debug)]
struct LoboArgs {
    #[arg(long)]
    node: String,
    #[arg(long)]
    begin: NaiveDate,
    #[arg(long)]
    end: NaiveDate,
    #[arg(long = "variable")]
    variables: Vec<String>,
    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Args, Debug)]
struct NerrArgs {
    #[arg(long)]
    station: String,
    #[arg(long)]
    begin: NaiveDate,
    #[arg(long)]
    end: NaiveDate,
    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Args, Debug)]
struct ElkhornArgs {
    #[arg(long)]
    layer: String,
    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Args, Debug)]
struct TidesArgs {
    #[arg(long)]
    station: String,
    #[arg(long)]
    begin: NaiveDate,
    #[arg(long)]
    end: NaiveDate,
    #[arg(long, default_value = "water_level")]
    product: TideProduct,
    #[arg(long, default_value = "STND")]
    datum: String,
    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Args, Debug)]
struct TidesDownloadArgs {
    #[arg(long)]
    station: String,
    #[arg(long, num_args = 1.., required = true)]
    years: Vec<i32>,
    #[arg(long)]
    out_dir: PathBuf,
    #[arg(long, default_value = "water_level")]
    product: TideProduct,
    #[arg(long, default_value = "STND")]
    datum: String,
}

#[derive(Args, Debug)]
struct OceanColorArgs {
    #[arg(long)]
    first_year: i32,
    /// Defaults to the first year
    #[arg(long)]
    last_year: Option<i32>,
    #[arg(long)]
    start_day: Option<u32>,
    #[arg(long)]
    end_day: Option<u32>,
    #[arg(long, num_args = 2, allow_negative_numbers = true, value_names = ["MIN", "MAX"])]
    lat: Vec<f64>,
    #[arg(long, num_args = 2, allow_negative_numbers = true, value_names = ["MIN", "MAX"])]
    lon: Vec<f64>,
    #[arg(long, default_value = "chl_ocx")]
    variable: String,
    #[arg(long, default_value = "CHL")]
    category: String,
    #[command(flatten)]
    out: OutputArgs,
}

fn parse_dataset(raw: &str) -> Result<MlmlDataset, String> {
    match raw.to_ascii_lowercase().as_str() {
        "seawater" => Ok(MlmlDataset::Seawater),
        "weather" => Ok(MlmlDataset::Weather),
        other => Err(format!("unknown MLML dataset '{other}'")),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let options = ParseOptions { strict: cli.strict };

    let endpoints = Endpoints::from_env().context("failed to load endpoint configuration")?;
    let fetcher = HttpFetcher::new(endpoints.timeout()).context("failed to build HTTP client")?;

    let (table, out) = match cli.command {
        Command::Parse(args) => (parse_local(&args, &options)?, args.out),
        Command::Mlml(args) => {
            let query = MlmlQuery {
                dataset: args.dataset,
                begin: args.begin,
                end: args.end,
            };
            (mlml::fetch(&fetcher, &endpoints, &query, &options)?, args.out)
        }
        Command::Lobo(args) => {
            let query = LoboQuery {
                node: args.node,
                begin: args.begin,
                end: args.end,
                variables: args.variables,
            };
            (lobo::fetch(&fetcher, &endpoints, &query, &options)?, args.out)
        }
        Command::Nerr(args) => {
            let query = NerrQuery {
                station: args.station,
                begin: args.begin,
                end: args.end,
            };
            (nerr::fetch(&fetcher, &endpoints, &query, &options)?, args.out)
        }
        Command::Elkhorn(args) => {
            let query = ElkhornGisQuery { layer: args.layer };
            (elkhorn_gis::fetch(&fetcher, &endpoints, &query, &options)?, args.out)
        }
        Command::Tides(args) => {
            let mut query =
                TideQuery::new(args.station, args.begin, args.end).with_product(args.product);
            query.datum = args.datum;
            (noaa_tides::fetch(&fetcher, &endpoints, &query, &options)?, args.out)
        }
        Command::TidesDownload(args) => {
            let written = noaa_tides::download_multiyear_csv(
                &fetcher,
                &endpoints,
                &args.out_dir,
                &args.years,
                &args.station,
                args.product,
                &args.datum,
            )?;
            info!(files = written.len(), "tide download finished");
            for path in written {
                println!("{}", path.display());
            }
            return Ok(());
        }
        Command::OceanColor(args) => {
            let (Some(lat), Some(lon)) = (extent(&args.lat), extent(&args.lon)) else {
                bail!("--lat and --lon each take MIN MAX");
            };
            let years = (args.first_year, args.last_year.unwrap_or(args.first_year));
            let mut query = OceanColorQuery::new(years, lat, lon);
            query.start_day = args.start_day;
            query.end_day = args.end_day;
            query.variable.name = args.variable;
            query.variable.category = args.category;
            (ocean_color::fetch(&fetcher, &endpoints, &query, &options)?, args.out)
        }
    };

    emit(&table, &out)
}

fn extent(values: &[f64]) -> Option<(f64, f64)> {
    match values {
        [min, max] => Some((*min, *max)),
        _ => None,
    }
}

fn parse_local(args: &ParseArgs, options: &ParseOptions) -> Result<Table> {
    let content = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let config = match args.provider {
        Provider::NoaaTides if args.epoch_seconds => {
            ProviderConfig::NoaaTides(NoaaTideConfig::epoch_seconds())
        }
        provider => ProviderConfig::default_for(provider),
    };
    parse_payload(&config, &content, options)
        .with_context(|| format!("failed to parse {}", args.input.display()))
}

fn emit(table: &Table, out: &OutputArgs) -> Result<()> {
    if !table.skipped.is_empty() {
        info!(
            provider = %table.provider,
            skipped = table.skipped_count(),
            "rows skipped while parsing"
        );
    }
    match out.output.as_deref() {
        Some(path) => write_table(table, path),
        None => {
            println!("{}", table.df);
            Ok(())
        }
    }
}

fn write_table(table: &Table, path: &Path) -> Result<()> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("parquet") => write_parquet(table, path)?,
        Some("csv") | None => write_csv(table, path)?,
        Some(other) => bail!("unsupported output extension '.{other}'"),
    }
    info!(path = %path.display(), rows = table.height(), "table written");
    Ok(())
}
