use std::process::ExitCode;

use streampipe_group::{Coordinator, Supervisor, EX_UNAVAILABLE};
use streampipe_kafka::{
    clap_error, exit_code, init_logger, parse_args, usage_error, watch_signals, ConsumerArgs,
    KafkaSession,
};

// cargo run --bin streampipe-consumer -- -group g1 -brokers localhost:9092 -topics hello -offset oldest
#[tokio::main]
async fn main() -> ExitCode {
    let args: ConsumerArgs = match parse_args(std::env::args_os()) {
        Ok(args) => args,
        Err(err) => return clap_error::<ConsumerArgs>(err),
    };
    init_logger(args.verbose);

    let (config, options) = match args.into_config() {
        Ok(config) => config,
        Err(err) => return usage_error::<ConsumerArgs>(&err.to_string()),
    };

    let supervisor = Supervisor::new(options);
    let _signals = watch_signals(supervisor.switch());

    let coordinator =
        match Coordinator::<KafkaSession, _>::open(&config, std::io::stdout(), supervisor).await {
            Ok(coordinator) => coordinator,
            Err(err) => {
                eprintln!("ERROR: Failed to start consumer: {err}");
                eprintln!();
                return exit_code(EX_UNAVAILABLE);
            }
        };

    let report = coordinator.run().await;
    exit_code(report.exit_code())
}
