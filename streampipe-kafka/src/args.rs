use clap::{error::ErrorKind, Command, CommandFactory, Parser};
use std::{ffi::OsString, process::ExitCode, time::Duration};

use streampipe_group::{EX_OK, EX_USAGE};
use streampipe_types::{
    split_list, ConfigErr, ConsumerGroup, IdleMode, OffsetPolicy, RelayOptions, SessionConfig,
    Topic,
};

use crate::{Batcher, BROKERS_ENV, DEFAULT_BATCH_PAUSE, DEFAULT_BATCH_SIZE};

#[derive(Debug, Parser)]
#[command(
    name = "streampipe-consumer",
    version,
    about = "Joins a Kafka consumer group and writes every record to stdout, one line each"
)]
pub struct ConsumerArgs {
    #[arg(long, help = "REQUIRED: The shared consumer group name")]
    pub group: Option<String>,
    #[arg(
        long,
        env = BROKERS_ENV,
        help = "The comma separated list of brokers in the Kafka cluster"
    )]
    pub brokers: Option<String>,
    #[arg(
        long,
        visible_alias = "topic",
        help = "REQUIRED: The comma separated list of topics to consume"
    )]
    pub topics: Option<String>,
    #[arg(
        long,
        default_value = "newest",
        help = "The offset to start with. Can be `oldest`, `newest`"
    )]
    pub offset: String,
    #[arg(long, help = "Turn on librdkafka debug logging")]
    pub verbose: bool,
    #[arg(
        long,
        default_value_t = 5000,
        help = "Shut down after this many milliseconds without a record"
    )]
    pub idle_timeout: u64,
    #[arg(
        long,
        default_value = "activity",
        help = "`activity`: records and assignments reset the idle timer; `fixed`: they don't"
    )]
    pub idle_mode: String,
}

#[derive(Debug, Parser)]
#[command(
    name = "streampipe-producer",
    version,
    about = "Reads from stdin and loads each line into Kafka"
)]
pub struct ProducerArgs {
    #[arg(
        long,
        env = BROKERS_ENV,
        default_value = "localhost:9092",
        help = "The comma separated list of brokers in the Kafka cluster"
    )]
    pub brokers: String,
    #[arg(long, help = "REQUIRED: The topic to produce to")]
    pub topic: Option<String>,
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, help = "Number of lines per batch")]
    pub batch_size: usize,
    #[arg(
        long,
        default_value_t = DEFAULT_BATCH_PAUSE.as_secs(),
        help = "Seconds to pause between batches"
    )]
    pub pause: u64,
    #[arg(long, help = "Turn on librdkafka debug logging")]
    pub verbose: bool,
}

impl ConsumerArgs {
    pub fn into_config(self) -> Result<(SessionConfig, RelayOptions), ConfigErr> {
        let group = self
            .group
            .filter(|g| !g.trim().is_empty())
            .ok_or(ConfigErr::GroupNotSet)?;
        let brokers = split_list(&self.brokers.ok_or(ConfigErr::BrokersNotSet)?);
        let topics = split_list(&self.topics.ok_or(ConfigErr::TopicsNotSet)?)
            .into_iter()
            .map(Topic::new)
            .collect::<Result<Vec<_>, _>>()?;

        let mut config = SessionConfig::new(ConsumerGroup::new(group.trim()), brokers, topics)?;
        config
            .set_offset_policy(self.offset.parse()?)
            .set_verbose(self.verbose);

        let mut options = RelayOptions::default();
        options
            .set_idle_timeout(Duration::from_millis(self.idle_timeout))?
            .set_idle_mode(self.idle_mode.parse::<IdleMode>()?);
        Ok((config, options))
    }
}

impl ProducerArgs {
    pub fn topic(&self) -> Result<Topic, ConfigErr> {
        match self.topic.as_deref().map(str::trim) {
            Some(topic) if !topic.is_empty() => Ok(Topic::new(topic)?),
            _ => Err(ConfigErr::TopicNotSet),
        }
    }

    /// Comma separated, blanks removed.
    pub fn broker_list(&self) -> Result<String, ConfigErr> {
        let brokers = split_list(&self.brokers);
        if brokers.is_empty() {
            return Err(ConfigErr::BrokersNotSet);
        }
        Ok(brokers.join(","))
    }

    pub fn batcher(&self) -> Batcher {
        Batcher::new(self.batch_size, Duration::from_secs(self.pause))
    }
}

/// Rewrite Go style single dash flags (`-group g1`, `-topics=t`) into `--group g1`.
/// Only names `command` knows as long flags or aliases are rewritten.
pub fn normalize_args<I, T>(command: &Command, args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut longs: Vec<String> = vec!["help".to_owned(), "version".to_owned()];
    for arg in command.get_arguments() {
        longs.extend(arg.get_long().map(ToOwned::to_owned));
        if let Some(aliases) = arg.get_all_aliases() {
            longs.extend(aliases.into_iter().map(ToOwned::to_owned));
        }
    }

    let mut escaped = false;
    args.into_iter()
        .map(Into::into)
        .map(|arg: OsString| {
            if escaped {
                return arg;
            }
            let rewritten = match arg.to_str() {
                Some("--") => {
                    escaped = true;
                    None
                }
                Some(s) if s.starts_with('-') && !s.starts_with("--") && s.len() > 2 => {
                    let name = s[1..].split('=').next().unwrap_or_default();
                    if longs.iter().any(|l| l == name) {
                        Some(OsString::from(format!("-{s}")))
                    } else {
                        None
                    }
                }
                _ => None,
            };
            rewritten.unwrap_or(arg)
        })
        .collect()
}

/// Parse the command line, accepting single dash flags.
pub fn parse_args<P, I, T>(args: I) -> Result<P, clap::Error>
where
    P: Parser,
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    P::try_parse_from(normalize_args(&P::command(), args))
}

/// Report a command line error on stderr, the way data loaders expect it.
pub fn usage_error<P: CommandFactory>(message: &str) -> ExitCode {
    let mut command = P::command();
    eprintln!("ERROR: {message}");
    eprintln!();
    eprintln!("Available command line options:");
    eprintln!("{}", command.render_help());
    exit_code(EX_USAGE)
}

/// `--help` and `--version` succeed; anything else is a usage error.
pub fn clap_error<P: CommandFactory>(err: clap::Error) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            err.print().ok();
            exit_code(EX_OK)
        }
        _ => {
            let rendered = err.to_string();
            let message = rendered
                .lines()
                .next()
                .unwrap_or_default()
                .trim_start_matches("error: ");
            usage_error::<P>(message)
        }
    }
}

pub fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Logs go to stderr. `RUST_LOG` takes precedence over `verbose`.
pub fn init_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}
