use crate::topics::Topic;
use rumqttc::Publish;
use rumqttc::QoS;

/// A message forwarded between buses: the topic and the raw payload bytes,
/// relayed unchanged.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Message {
    pub topic: Topic,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl Message {
    pub fn new(topic: Topic, payload: impl Into<Vec<u8>>) -> Message {
        Message {
            topic,
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
        }
    }
}

impl From<Publish> for Message {
    fn from(msg: Publish) -> Self {
        Message {
            topic: Topic::new_unchecked(msg.topic),
            payload: msg.payload.to_vec(),
            qos: msg.qos,
            retain: msg.retain,
        }
    }
}
