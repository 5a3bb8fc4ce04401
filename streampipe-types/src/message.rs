use crate::{Offset, Partition, Topic, TopicPartition};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// A record delivered by the broker client. Immutable once delivered.
pub struct Record {
    topic: Topic,
    partition: Partition,
    offset: Offset,
    payload: Vec<u8>,
}

impl Record {
    pub fn new(topic: Topic, partition: Partition, offset: Offset, payload: Vec<u8>) -> Self {
        Self {
            topic,
            partition,
            offset,
            payload,
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }

    /// The raw bytes as received. A record without value has an empty payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}
