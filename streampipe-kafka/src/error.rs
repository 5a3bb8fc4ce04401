/// Re-export of [`rdkafka::error::KafkaError`].
pub use rdkafka::error::KafkaError as KafkaErr;
use rdkafka::types::RDKafkaErrorCode;
use streampipe_types::{PipeErr, PipeResult, Severity};

/// Alias for `PipeResult<T, KafkaErr>`.
pub type KafkaResult<T> = PipeResult<T, KafkaErr>;

pub(crate) fn stream_err(err: KafkaErr) -> PipeErr<KafkaErr> {
    PipeErr::Backend(err)
}

/// Everything librdkafka reports while running is retried internally, except for
/// corrupted data, protocol mismatches and errors it flags as fatal itself.
pub fn classify(err: &KafkaErr) -> Severity {
    match err.rdkafka_error_code() {
        Some(
            RDKafkaErrorCode::BadMessage
            | RDKafkaErrorCode::BadCompression
            | RDKafkaErrorCode::InvalidMessage
            | RDKafkaErrorCode::InvalidMessageSize
            | RDKafkaErrorCode::UnknownProtocol
            | RDKafkaErrorCode::UnsupportedVersion
            | RDKafkaErrorCode::InvalidRequest
            | RDKafkaErrorCode::Fatal,
        ) => Severity::Fatal,
        Some(_) => Severity::Retryable,
        None => match err {
            KafkaErr::ClientCreation(_) | KafkaErr::Subscription(_) => Severity::Fatal,
            _ => Severity::Retryable,
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_classify() {
        let transport = KafkaErr::Global(RDKafkaErrorCode::BrokerTransportFailure);
        assert_eq!(classify(&transport), Severity::Retryable);
        let all_down = KafkaErr::Global(RDKafkaErrorCode::AllBrokersDown);
        assert_eq!(classify(&all_down), Severity::Retryable);
        let timeout = KafkaErr::MessageConsumption(RDKafkaErrorCode::RequestTimedOut);
        assert_eq!(classify(&timeout), Severity::Retryable);

        let corrupt = KafkaErr::MessageConsumption(RDKafkaErrorCode::BadMessage);
        assert_eq!(classify(&corrupt), Severity::Fatal);
        let fatal = KafkaErr::Global(RDKafkaErrorCode::Fatal);
        assert_eq!(classify(&fatal), Severity::Fatal);
        let subscription = KafkaErr::Subscription("no such topic".to_owned());
        assert_eq!(classify(&subscription), Severity::Fatal);
    }
}
