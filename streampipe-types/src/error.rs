use thiserror::Error;

/// Type alias of the [`Result`] type specific to `streampipe`.
pub type PipeResult<T, E> = std::result::Result<T, PipeErr<E>>;

#[derive(Error, Debug)]
/// Common errors that may occur, generic over the error type of the broker client.
pub enum PipeErr<E: std::error::Error> {
    #[error("Config error: {0}")]
    Config(#[from] ConfigErr),
    #[error("Connection Error: {0}")]
    Connect(String),
    #[error("Backend error: {0}")]
    Backend(E),
    #[error("Runtime error: {0}")]
    Runtime(Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// Errors in the command line or session configuration. These are always fatal at startup.
pub enum ConfigErr {
    #[error("You have to provide a -group name.")]
    GroupNotSet,
    #[error("You have to provide -brokers as a comma-separated list, or set the KAFKA_PEERS environment variable.")]
    BrokersNotSet,
    #[error("You have to provide -topics as a comma-separated list.")]
    TopicsNotSet,
    #[error("You have to provide a -topic to produce to.")]
    TopicNotSet,
    #[error("-offset should be `oldest` or `newest`, got `{0}`")]
    InvalidOffsetPolicy(String),
    #[error("-idle-mode should be `activity` or `fixed`, got `{0}`")]
    InvalidIdleMode(String),
    #[error("-idle-timeout must be greater than zero")]
    ZeroIdleTimeout,
    #[error("{0}")]
    Topic(#[from] TopicErr),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// Errors that may happen when handling a topic name
pub enum TopicErr {
    #[error("Invalid topic `{0}`: valid pattern is [a-zA-Z0-9._-]{{1, 249}}")]
    InvalidTopic(String),
}

/// Function to construct a [`PipeErr::Runtime`] error variant.
pub fn runtime_error<T: std::error::Error, E: std::error::Error + Send + Sync + 'static>(
    e: E,
) -> PipeErr<T> {
    PipeErr::Runtime(Box::new(e))
}
