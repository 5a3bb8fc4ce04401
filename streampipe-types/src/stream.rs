use std::{fmt::Display, str::FromStr, sync::Arc};

use crate::TopicErr;

/// Maximum string length of a topic name.
pub const MAX_TOPIC_LEN: usize = 249;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Identifies a topic. It is cheap to clone.
pub struct Topic {
    name: Arc<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Identifies a partition within a topic.
pub struct Partition {
    id: i32,
}

/// Position of a record within a partition. Offsets are strictly increasing in delivery order.
pub type Offset = i64;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// The unit of ownership in a consumer group.
pub struct TopicPartition {
    topic: Topic,
    partition: Partition,
}

impl Topic {
    pub fn new<S: Into<String>>(name: S) -> Result<Self, TopicErr> {
        let name = name.into();
        if is_valid_topic(name.as_str()) {
            Ok(Self {
                name: Arc::new(name),
            })
        } else {
            Err(TopicErr::InvalidTopic(name))
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Partition {
    pub const fn new(id: i32) -> Self {
        Self { id }
    }

    pub fn id(&self) -> i32 {
        self.id
    }
}

impl TopicPartition {
    pub fn new(topic: Topic, partition: Partition) -> Self {
        Self { topic, partition }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }
}

impl Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl Display for TopicPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.topic, self.partition)
    }
}

impl FromStr for Topic {
    type Err = TopicErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::new(s)
    }
}

pub fn is_valid_topic(s: &str) -> bool {
    !s.is_empty() && s.len() <= MAX_TOPIC_LEN && s.chars().all(is_valid_topic_char)
}

/// Returns true if this character can be used in a topic name.
pub fn is_valid_topic_char(c: char) -> bool {
    // https://stackoverflow.com/questions/37062904/what-are-apache-kafka-topic-name-limitations
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_topic_name() {
        assert!(Topic::new("pos_trans").is_ok());
        assert!(Topic::new("chicago.crimes-2024").is_ok());
        assert!(matches!(Topic::new(""), Err(TopicErr::InvalidTopic(_))));
        assert!(Topic::new("a b").is_err());
        assert!(Topic::new("a".repeat(MAX_TOPIC_LEN)).is_ok());
        assert!(Topic::new("a".repeat(MAX_TOPIC_LEN + 1)).is_err());
    }

    #[test]
    fn test_display() {
        let tp = TopicPartition::new(Topic::new("t").unwrap(), Partition::new(3));
        assert_eq!(tp.to_string(), "t/3");
    }
}
