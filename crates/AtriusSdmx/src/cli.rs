//! # SDMX Feature CLI
//!
//! Command-line access to an SDMX provider snapshot: list the dataflows it
//! publishes, inspect their feature schemas and export observations or
//! dimension codes as CSV, JSON or NDJSON.
//!
//! ## Command Line Options
//!
//! ```text
//! -s, --fixture <FIXTURE>        Provider snapshot (path or file:// URL) [env: SDMX_FIXTURE]
//!     --name <NAME>              Provider display name [default: ABS]
//!     --namespace <NAMESPACE>    Namespace of the exposed types [default: http://aurin.org.au]
//!     --endpoint <ENDPOINT>      Provider endpoint (defaults to the snapshot's)
//!     --log-level <LEVEL>        Log level when RUST_LOG is unset [env: SDMX_LOG_LEVEL] [default: info]
//!
//! list [--dimensions]            Dataflow type names, optionally with their code-list types
//! schema <TYPE>                  Columns of a dataflow or code-list type
//! read <TYPE> [-q FILTER] [-f FORMAT] [-o FILE] [--limit N]
//! codes <DATAFLOW> <DIMENSION> [-f FORMAT] [-o FILE]
//! ```
//!
//! ## Usage Examples
//!
//! ```bash
//! atrius-sdmx-cli -s abs.json list --dimensions
//! atrius-sdmx-cli -s abs.json schema ABS_CENSUS2011_T04
//! atrius-sdmx-cli -s abs.json read ABS_CENSUS2011_T04 \
//!     -q "MSTP='TOT' and AGE='TOT' and REGION in ('1','2','3','4')" -f ndjson
//! atrius-sdmx-cli -s abs.json codes ABS_CENSUS2011_T04 REGION -f json -o regions.json
//! ```
//!
//! Logs go to stderr so that exported records can be piped from stdout.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use atrius_sdmx::fixture::JsonFixtureClient;
use atrius_sdmx::{ContentType, SdmxDataStore, StoreConfig, parse_filter, write_records};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "atrius-sdmx-cli")]
#[command(about = "Browse and export SDMX dataflows as flat feature records")]
struct Args {
    /// Provider snapshot: a local path or file:// URL
    #[arg(long, short = 's', env = "SDMX_FIXTURE")]
    fixture: String,

    /// Provider display name
    #[arg(long, default_value = "ABS")]
    name: String,

    /// Namespace of the exposed type names
    #[arg(long, default_value = "http://aurin.org.au")]
    namespace: String,

    /// Provider endpoint, defaults to the one recorded in the snapshot
    #[arg(long)]
    endpoint: Option<String>,

    /// Log level used when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, env = "SDMX_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List dataflow type names
    List {
        /// Also list the code-list type of every dimension
        #[arg(long)]
        dimensions: bool,
    },

    /// Print the columns of a dataflow or code-list type
    Schema { type_name: String },

    /// Export features of a dataflow or code-list type
    Read {
        type_name: String,

        /// ECQL filter, e.g. "AGE='TOT' and REGION in ('1','2')"
        #[arg(long, short = 'q')]
        filter: Option<String>,

        /// Output format (csv, json, ndjson, or a MIME type)
        #[arg(long, short = 'f', default_value = "csv")]
        format: String,

        /// Output file path (defaults to stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Stop after this many records
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Export the codes of one dimension of a dataflow
    Codes {
        dataflow: String,
        dimension: String,

        #[arg(long, short = 'f', default_value = "csv")]
        format: String,

        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

fn open_output(output: Option<&PathBuf>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    })
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = format!("atrius_sdmx={},atrius_sdmx_cli={}", args.log_level, args.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with_writer(io::stderr)
        .init();

    let client = JsonFixtureClient::from_source(&args.fixture)
        .with_context(|| format!("loading snapshot {}", args.fixture))?;
    let endpoint = args
        .endpoint
        .clone()
        .unwrap_or_else(|| client.endpoint_url().to_string());
    let config = StoreConfig::new(&args.name, &args.namespace, &endpoint)?;
    info!("Using provider '{}' at {}", config.name, config.endpoint);
    let store = SdmxDataStore::new(config, Arc::new(client));

    match args.command {
        Command::List { dimensions } => {
            let mut out = io::stdout().lock();
            for type_name in store.type_names()? {
                writeln!(out, "{}", type_name)?;
                if dimensions {
                    for dimension_type in store.dimension_type_names(&type_name)? {
                        writeln!(out, "  {}", dimension_type)?;
                    }
                }
            }
        }
        Command::Schema { type_name } => {
            let schema = store.schema(&type_name)?;
            let mut out = io::stdout().lock();
            for attribute in schema.attributes() {
                writeln!(out, "{}\t{:?}", attribute.name, attribute.binding)?;
            }
        }
        Command::Read {
            type_name,
            filter,
            format,
            output,
            limit,
        } => {
            let content_type = ContentType::from_string(&format)?;
            let filter = filter.as_deref().map(parse_filter).transpose()?;
            let mut stream = store.read_type(&type_name, filter.as_ref())?;
            let schema = stream.feature_type()?;
            let writer = open_output(output.as_ref())?;
            let records = stream.by_ref().take(limit.unwrap_or(usize::MAX));
            let written = write_records(&schema, records, content_type, writer)?;
            info!("Wrote {} records of '{}'", written, type_name);
        }
        Command::Codes {
            dataflow,
            dimension,
            format,
            output,
        } => {
            let content_type = ContentType::from_string(&format)?;
            let mut stream = store.read_codes(&dataflow, &dimension)?;
            let schema = stream.feature_type()?;
            let writer = open_output(output.as_ref())?;
            let written = write_records(&schema, stream.by_ref(), content_type, writer)?;
            info!("Wrote {} codes of '{}.{}'", written, dataflow, dimension);
        }
    }

    Ok(())
}
