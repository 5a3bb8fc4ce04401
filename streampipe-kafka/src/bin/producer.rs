use anyhow::{Context, Result};
use std::{io::BufReader, process::ExitCode};

use streampipe_group::{EX_OK, EX_SOFTWARE, EX_UNAVAILABLE};
use streampipe_kafka::{
    clap_error, create_producer, exit_code, init_logger, parse_args, read_lines, usage_error,
    Batcher, KafkaProducer, ProducerArgs,
};

// seq 1 10 | cargo run --bin streampipe-producer -- -brokers localhost:9092 -topic hello
#[tokio::main]
async fn main() -> ExitCode {
    let args: ProducerArgs = match parse_args(std::env::args_os()) {
        Ok(args) => args,
        Err(err) => return clap_error::<ProducerArgs>(err),
    };
    init_logger(args.verbose);

    let (brokers, topic) = match args.broker_list().and_then(|b| Ok((b, args.topic()?))) {
        Ok(parts) => parts,
        Err(err) => return usage_error::<ProducerArgs>(&err.to_string()),
    };

    let producer = match create_producer(&brokers, topic, args.verbose) {
        Ok(producer) => producer,
        Err(err) => {
            eprintln!("ERROR: Failed to open the producer: {err}");
            eprintln!();
            return exit_code(EX_UNAVAILABLE);
        }
    };

    match produce(&producer, args.batcher()).await {
        Ok(sent) => {
            log::info!("Sent {sent} records to {}", producer.topic());
            exit_code(EX_OK)
        }
        Err(err) => {
            log::error!("{err:?}");
            exit_code(EX_SOFTWARE)
        }
    }
}

/// Returns the number of records delivered. Failed sends are logged and skipped.
async fn produce(producer: &KafkaProducer, mut batcher: Batcher) -> Result<usize> {
    let lines = read_lines(BufReader::new(std::io::stdin()));
    let mut sent = 0;
    while let Ok(line) = lines.recv_async().await {
        match producer.send(&line).await {
            Ok((partition, offset)) => {
                sent += 1;
                log::trace!("Sent to {partition}@{offset}");
            }
            Err(err) => log::error!("FAILED to produce message: {err}"),
        }
        if let Some(pause) = batcher.tick() {
            log::debug!("{} lines read, pausing for {pause:?}", batcher.count());
            tokio::time::sleep(pause).await;
        }
    }
    producer
        .flush()
        .await
        .context("Failed to flush pending records")?;
    Ok(sent)
}
