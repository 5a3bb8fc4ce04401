use std::{fmt::Display, str::FromStr, time::Duration};

use crate::{ConfigErr, Topic};

/// Idle window used when none is configured.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Used to identify a group of consumers.
pub struct ConsumerGroup {
    name: String,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
/// Where to start reading a partition that has no committed offset for the group.
pub enum OffsetPolicy {
    /// Start from the earliest record retained by the broker.
    Oldest,
    /// Only records produced after the partition is assigned.
    #[default]
    Newest,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
/// How the idle timer is armed.
pub enum IdleMode {
    /// The deadline moves forward on every relayed record and on every partition assignment.
    #[default]
    Activity,
    /// The deadline is fixed once the session is established, regardless of traffic.
    Fixed,
}

#[derive(Debug, Clone)]
/// Everything needed to open a consumer group session.
pub struct SessionConfig {
    group: ConsumerGroup,
    brokers: Vec<String>,
    topics: Vec<Topic>,
    offset_policy: OffsetPolicy,
    verbose: bool,
}

#[derive(Debug, Clone)]
/// Behaviour of the relay loop itself.
pub struct RelayOptions {
    idle_timeout: Duration,
    idle_mode: IdleMode,
}

impl ConsumerGroup {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for ConsumerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl OffsetPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oldest => "oldest",
            Self::Newest => "newest",
        }
    }
}

impl FromStr for OffsetPolicy {
    type Err = ConfigErr;

    /// Accepts the Kafka spelling (`earliest` / `latest`) as well.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oldest" | "earliest" => Ok(Self::Oldest),
            "newest" | "latest" => Ok(Self::Newest),
            other => Err(ConfigErr::InvalidOffsetPolicy(other.to_owned())),
        }
    }
}

impl IdleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Fixed => "fixed",
        }
    }
}

impl FromStr for IdleMode {
    type Err = ConfigErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activity" => Ok(Self::Activity),
            "fixed" => Ok(Self::Fixed),
            other => Err(ConfigErr::InvalidIdleMode(other.to_owned())),
        }
    }
}

impl SessionConfig {
    /// Blank broker addresses are discarded. Fails if the group name is empty, or if no broker
    /// or no topic remains.
    pub fn new<B, S>(group: ConsumerGroup, brokers: B, topics: Vec<Topic>) -> Result<Self, ConfigErr>
    where
        B: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if group.name().trim().is_empty() {
            return Err(ConfigErr::GroupNotSet);
        }
        let brokers: Vec<String> = brokers
            .into_iter()
            .map(|b| b.as_ref().trim().to_owned())
            .filter(|b| !b.is_empty())
            .collect();
        if brokers.is_empty() {
            return Err(ConfigErr::BrokersNotSet);
        }
        if topics.is_empty() {
            return Err(ConfigErr::TopicsNotSet);
        }
        Ok(Self {
            group,
            brokers,
            topics,
            offset_policy: Default::default(),
            verbose: false,
        })
    }

    pub fn group(&self) -> &ConsumerGroup {
        &self.group
    }

    pub fn brokers(&self) -> &[String] {
        &self.brokers
    }

    /// Broker list in the `host:port,host:port` form
    pub fn broker_list(&self) -> String {
        self.brokers.join(",")
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Applies only to partitions without a committed offset for this group.
    ///
    /// If unset, defaults to Newest
    pub fn set_offset_policy(&mut self, v: OffsetPolicy) -> &mut Self {
        self.offset_policy = v;
        self
    }
    pub fn offset_policy(&self) -> OffsetPolicy {
        self.offset_policy
    }

    /// Turn on the client library's own diagnostics.
    pub fn set_verbose(&mut self, v: bool) -> &mut Self {
        self.verbose = v;
        self
    }
    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            idle_mode: Default::default(),
        }
    }
}

impl RelayOptions {
    /// The loop shuts down once this window passes without the idle timer being reset.
    pub fn set_idle_timeout(&mut self, v: Duration) -> Result<&mut Self, ConfigErr> {
        if v.is_zero() {
            return Err(ConfigErr::ZeroIdleTimeout);
        }
        self.idle_timeout = v;
        Ok(self)
    }
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn set_idle_mode(&mut self, v: IdleMode) -> &mut Self {
        self.idle_mode = v;
        self
    }
    pub fn idle_mode(&self) -> IdleMode {
        self.idle_mode
    }
}

/// Split a comma separated list, dropping blank items.
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_offset_policy() {
        assert_eq!("oldest".parse::<OffsetPolicy>(), Ok(OffsetPolicy::Oldest));
        assert_eq!("earliest".parse::<OffsetPolicy>(), Ok(OffsetPolicy::Oldest));
        assert_eq!("newest".parse::<OffsetPolicy>(), Ok(OffsetPolicy::Newest));
        assert_eq!(
            "middle".parse::<OffsetPolicy>(),
            Err(ConfigErr::InvalidOffsetPolicy("middle".to_owned()))
        );
        assert_eq!(OffsetPolicy::default(), OffsetPolicy::Newest);
    }

    #[test]
    fn test_session_config() {
        let topics = vec![Topic::new("t").unwrap()];
        let config = SessionConfig::new(
            ConsumerGroup::new("g1"),
            split_list(" a:9092, ,b:9092,"),
            topics.clone(),
        )
        .unwrap();
        assert_eq!(config.brokers(), ["a:9092", "b:9092"]);
        assert_eq!(config.broker_list(), "a:9092,b:9092");
        assert_eq!(config.offset_policy(), OffsetPolicy::Newest);

        assert_eq!(
            SessionConfig::new(ConsumerGroup::new(""), ["a:9092"], topics.clone()).unwrap_err(),
            ConfigErr::GroupNotSet
        );
        assert_eq!(
            SessionConfig::new(ConsumerGroup::new("g1"), [" "], topics).unwrap_err(),
            ConfigErr::BrokersNotSet
        );
        assert_eq!(
            SessionConfig::new(ConsumerGroup::new("g1"), ["a:9092"], vec![]).unwrap_err(),
            ConfigErr::TopicsNotSet
        );
    }

    #[test]
    fn test_relay_options() {
        let mut options = RelayOptions::default();
        assert_eq!(options.idle_timeout(), DEFAULT_IDLE_TIMEOUT);
        assert_eq!(options.idle_mode(), IdleMode::Activity);
        assert_eq!(
            options.set_idle_timeout(Duration::ZERO).unwrap_err(),
            ConfigErr::ZeroIdleTimeout
        );
        options
            .set_idle_timeout(Duration::from_millis(250))
            .unwrap()
            .set_idle_mode("fixed".parse().unwrap());
        assert_eq!(options.idle_timeout(), Duration::from_millis(250));
        assert_eq!(options.idle_mode(), IdleMode::Fixed);
    }
}
