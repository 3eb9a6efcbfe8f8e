use crate::errors::MqttError;
use rumqttc::QoS;
use rumqttc::SubscribeFilter;

/// An MQTT topic a message is published on.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Topic {
    pub name: String,
}

impl Topic {
    /// Check that the name is a valid publish topic (no wildcards) and build it.
    pub fn new(name: impl Into<String>) -> Result<Topic, MqttError> {
        let name = name.into();
        if rumqttc::valid_topic(&name) {
            Ok(Topic { name })
        } else {
            Err(MqttError::InvalidTopic { name })
        }
    }

    /// Build a topic assuming the name is valid, as when it is received from the broker.
    pub fn new_unchecked(name: impl Into<String>) -> Topic {
        Topic { name: name.into() }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A set of MQTT topic filters subscribed to together, all at the same QoS.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct TopicFilter {
    patterns: Vec<String>,
}

impl TopicFilter {
    pub fn empty() -> TopicFilter {
        TopicFilter { patterns: vec![] }
    }

    pub fn new(pattern: impl Into<String>) -> Result<TopicFilter, MqttError> {
        let pattern = pattern.into();
        if rumqttc::valid_filter(&pattern) {
            Ok(TopicFilter {
                patterns: vec![pattern],
            })
        } else {
            Err(MqttError::InvalidFilter { pattern })
        }
    }

    pub fn add(&mut self, pattern: impl Into<String>) -> Result<(), MqttError> {
        let pattern = pattern.into();
        if rumqttc::valid_filter(&pattern) {
            self.patterns.push(pattern);
            Ok(())
        } else {
            Err(MqttError::InvalidFilter { pattern })
        }
    }

    /// Merge another filter set into this one.
    pub fn add_all(&mut self, other: TopicFilter) {
        self.patterns.extend(other.patterns);
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The list expected by `rumqttc::AsyncClient::subscribe_many`, all at the given QoS.
    pub fn as_subscribe_filters(&self, qos: QoS) -> Vec<SubscribeFilter> {
        self.patterns
            .iter()
            .map(|path| SubscribeFilter {
                path: path.clone(),
                qos,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_topics_are_accepted() {
        assert!(Topic::new("temp").is_ok());
        assert!(Topic::new("foris-controller/ABCD/schema").is_ok());
    }

    #[test]
    fn wildcard_topics_are_rejected() {
        assert!(Topic::new("temp/+").is_err());
        assert!(Topic::new("temp/#").is_err());
    }

    #[test]
    fn valid_filters_are_accepted() {
        assert!(TopicFilter::new("a/b/+").is_ok());
        assert!(TopicFilter::new("a/b/#").is_ok());
    }

    #[test]
    fn invalid_filters_are_rejected() {
        assert!(TopicFilter::new("").is_err());
        assert!(TopicFilter::new("/a/#/b").is_err());
    }

    #[test]
    fn add_all_merges_patterns() {
        let mut a = TopicFilter::new("a/1").unwrap();
        let b = TopicFilter::new("b/1").unwrap();
        a.add_all(b);
        assert_eq!(a.patterns(), &["a/1", "b/1"]);
    }
}
