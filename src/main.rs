//! Command-line interface for kafka-messaging
//!
//! # Usage Examples
//!
//! ```bash
//! # Send a record; key and value are encoded with the topic's registered schemas
//! kafka-messaging --brokers localhost:9092 --schema-registry-url http://localhost:8081 \
//!   send orders --key order-1 --value '{"id":1,"total":12.5}' --header source=cli
//!
//! # Read the 20 newest records of partition 0, keeping only large orders
//! kafka-messaging --brokers localhost:9092 \
//!   poll orders --seek-type offset --seek 0=100 --backward --limit 20 \
//!   --filter 'function filter(key, content) { return JSON.parse(content).total > 10; }'
//! ```
//!
//! Every poll event is printed as one JSON line.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use kafka_messages::{
    ConsumerPosition, OutboundRecord, PollLimit, SeekDirection, SeekType, StreamEvent,
};
use kafka_messaging::{parse_duration, Config, MessagesService};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kafka-messaging", version, about = "Send and poll Kafka messages")]
struct Cli {
    /// Read settings from a TOML file instead of the flags below
    #[arg(long)]
    config_file: Option<PathBuf>,

    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce one record
    Send {
        topic: String,
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        value: Option<String>,
        /// Header as name=value; may be repeated
        #[arg(long = "header")]
        headers: Vec<String>,
        #[arg(long)]
        partition: Option<i32>,
    },
    /// Stream records as JSON lines
    Poll {
        topic: String,
        #[arg(long, value_enum, default_value_t = SeekArg::Beginning)]
        seek_type: SeekArg,
        /// Seek point as partition=offset or partition=epoch-millis; may be repeated
        #[arg(long = "seek")]
        seek_to: Vec<String>,
        /// Read newest records first
        #[arg(long)]
        backward: bool,
        /// JavaScript filter source
        #[arg(long, conflicts_with = "filter_file")]
        filter: Option<String>,
        #[arg(long)]
        filter_file: Option<PathBuf>,
        /// Stop after this many messages
        #[arg(long)]
        limit: Option<usize>,
        /// Stop after this long, e.g. "30s"
        #[arg(long)]
        duration: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SeekArg {
    Beginning,
    Offset,
    Timestamp,
}

impl From<SeekArg> for SeekType {
    fn from(arg: SeekArg) -> Self {
        match arg {
            SeekArg::Beginning => SeekType::Beginning,
            SeekArg::Offset => SeekType::Offset,
            SeekArg::Timestamp => SeekType::Timestamp,
        }
    }
}

fn parse_pairs(pairs: &[String], what: &str) -> anyhow::Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .with_context(|| format!("Expected {what} as name=value, got '{pair}'"))
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kafka_messaging::init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config_file {
        Some(path) => Config::from_toml_file(path)?,
        None => cli.config.clone(),
    };
    let service = MessagesService::connect(&config)?;

    match cli.command {
        Commands::Send {
            topic,
            key,
            value,
            headers,
            partition,
        } => {
            let record = OutboundRecord {
                key,
                value,
                headers: parse_pairs(&headers, "header")?.into_iter().collect(),
                partition,
            };
            let result = service
                .send(&topic, record)
                .await
                .with_context(|| format!("Failed to send to topic '{topic}'"))?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Commands::Poll {
            topic,
            seek_type,
            seek_to,
            backward,
            filter,
            filter_file,
            limit,
            duration,
        } => {
            let seek_to = parse_pairs(&seek_to, "seek point")?
                .into_iter()
                .map(|(partition, value)| {
                    Ok((
                        partition.parse::<i32>().context("Invalid partition")?,
                        value.parse::<i64>().context("Invalid seek value")?,
                    ))
                })
                .collect::<anyhow::Result<BTreeMap<i32, i64>>>()?;

            let position = ConsumerPosition {
                seek_type: seek_type.into(),
                seek_to,
                direction: if backward {
                    SeekDirection::Backward
                } else {
                    SeekDirection::Forward
                },
            };

            let filter = match filter_file {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read filter {}", path.display()))?,
                ),
                None => filter,
            };

            let limit = PollLimit {
                max_messages: limit,
                max_duration: duration.as_deref().map(parse_duration).transpose()?,
            };

            let mut stream = service.poll(&topic, position, filter, limit);
            let mut failed = false;
            while let Some(event) = stream.next().await {
                println!("{}", serde_json::to_string(&event)?);
                if let StreamEvent::Error(error) = &event {
                    failed |= event.is_terminal();
                    tracing::debug!(kind = ?error.kind(), "Poll error event");
                }
            }
            if failed {
                anyhow::bail!("Poll of topic '{topic}' ended with an error");
            }
        }
    }

    Ok(())
}
