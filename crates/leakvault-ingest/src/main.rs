//! leakvault-ingest - leaked-credential dump ingestion

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use leakvault_common::logging::{init_logging, LogConfig, LogLevel};
use leakvault_ingest::config::IngestConfig;
use leakvault_ingest::event::S3Event;
use leakvault_ingest::fetch::{LocalFetcher, ObjectFetcher, ObjectLocation, S3Fetcher};
use leakvault_ingest::job::IngestJob;
use leakvault_ingest::lookup::{lookup, CredentialLookup, LookupQuery, DEFAULT_LOOKUP_LIMIT};
use leakvault_ingest::sink::{CredentialSink, DynamoSink, JsonLinesSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "leakvault-ingest")]
#[command(author, version, about = "Ingest leaked-credential dumps into the credential store")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Credential store to write to or read from
    #[arg(long, value_enum, default_value_t = SinkKind::Dynamodb, global = true)]
    sink: SinkKind,

    /// Table name (dynamodb) or output file (jsonl); overrides LEAKVAULT_TABLE_NAME
    #[arg(long, global = true)]
    destination: Option<String>,

    /// Parallel insert workers
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Lines per batch
    #[arg(long, global = true)]
    batch_size: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a local dump file
    File {
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Ingest one S3 object
    S3 {
        #[arg(long)]
        bucket: String,

        #[arg(long)]
        key: String,
    },

    /// Ingest every object named in an S3 event notification (JSON file)
    Event {
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Print stored credentials matching an email or domain as JSON
    Lookup {
        #[arg(long)]
        email: Option<String>,

        /// Ignored when --email is given
        #[arg(long)]
        domain: Option<String>,

        /// Maximum records when neither filter is given
        #[arg(long, default_value_t = DEFAULT_LOOKUP_LIMIT)]
        limit: usize,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SinkKind {
    Dynamodb,
    Jsonl,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("leakvault-ingest")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    let mut config = IngestConfig::from_env();
    if let Some(destination) = cli.destination.clone() {
        config.destination = Some(destination);
    }
    if let Some(workers) = cli.workers {
        config.pipeline.workers = workers;
    }
    if let Some(batch_size) = cli.batch_size {
        config.pipeline.batch_size = batch_size;
    }
    config.validate()?;
    let destination = config.destination()?.to_string();

    if let Command::Lookup {
        email,
        domain,
        limit,
    } = &cli.command
    {
        let query = LookupQuery::new(email.clone(), domain.clone(), *limit)?;
        return match cli.sink {
            SinkKind::Dynamodb => {
                print_lookup(&DynamoSink::from_config(&config.aws, destination).await, &query).await
            },
            SinkKind::Jsonl => print_lookup(&JsonLinesSink::open(&destination).await?, &query).await,
        };
    }

    let fetcher: Arc<dyn ObjectFetcher> = match &cli.command {
        Command::File { .. } => Arc::new(LocalFetcher),
        _ => Arc::new(S3Fetcher::new(config.aws.s3_client().await)),
    };

    match cli.sink {
        SinkKind::Dynamodb => {
            let sink = Arc::new(DynamoSink::from_config(&config.aws, destination).await);
            run(&config, fetcher, sink, &cli.command).await?;
        },
        SinkKind::Jsonl => {
            let sink = Arc::new(JsonLinesSink::open(&destination).await?);
            run(&config, fetcher, Arc::clone(&sink), &cli.command).await?;
            sink.flush().await?;
        },
    }

    info!("Ingestion complete");
    Ok(())
}

async fn print_lookup<L: CredentialLookup>(store: &L, query: &LookupQuery) -> Result<()> {
    let records = lookup(store, query).await?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

async fn run<S: CredentialSink + 'static>(
    config: &IngestConfig,
    fetcher: Arc<dyn ObjectFetcher>,
    sink: Arc<S>,
    command: &Command,
) -> Result<()> {
    let job = IngestJob::new(config, fetcher, sink)?;

    match command {
        Command::File { path } => {
            job.ingest(&ObjectLocation::Local(path.clone())).await?;
        },
        Command::S3 { bucket, key } => {
            job.ingest(&ObjectLocation::s3(bucket, key)).await?;
        },
        Command::Event { path } => {
            let event = S3Event::from_path(path).await?;
            job.handle_event(&event).await?;
        },
        Command::Lookup { .. } => {},
    }

    Ok(())
}
