//! MQTT topic layout

use crate::error::InputError;

/// Topics derived from the base topic and the vendor namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicLayout {
    base: String,
    vendor: String,
}

impl TopicLayout {
    pub fn new(base: impl Into<String>, vendor: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            vendor: vendor.into().trim_matches('/').to_string(),
        }
    }

    /// `<base>/<vendor>/`
    pub fn request_prefix(&self) -> String {
        format!("{}/{}/", self.base, self.vendor)
    }

    /// Subscription filter for every addressed request
    pub fn request_filter(&self) -> String {
        format!("{}/{}/#", self.base, self.vendor)
    }

    pub fn devices_topic(&self) -> String {
        format!("{}/bridge/devices", self.base)
    }

    pub fn zcl_request_topic(&self) -> String {
        format!("{}/bridge/request/zcl", self.base)
    }

    pub fn zcl_response_topic(&self) -> String {
        format!("{}/bridge/response/zcl", self.base)
    }

    pub fn log_topic(&self) -> String {
        format!("{}/bridge/log", self.base)
    }

    pub fn response_topic(&self, friendly_name: &str, action: &str) -> String {
        format!(
            "{}/bridge/response/{}/{}/{}",
            self.base, self.vendor, friendly_name, action
        )
    }

    pub fn is_request(&self, topic: &str) -> bool {
        topic.starts_with(&self.request_prefix())
    }

    /// Split a request topic into friendly name and action suffix.
    ///
    /// Friendly names may contain `/`, so the action is the last segment.
    pub fn parse_request<'t>(&self, topic: &'t str) -> Result<(&'t str, &'t str), InputError> {
        let rest = topic
            .strip_prefix(self.request_prefix().as_str())
            .ok_or_else(|| InputError::InvalidTopic(topic.to_string()))?;

        match rest.rsplit_once('/') {
            Some((name, action)) if !name.is_empty() && !action.is_empty() => Ok((name, action)),
            _ => Err(InputError::InvalidTopic(topic.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics() {
        let topics = TopicLayout::new("zigbee2mqtt/", "ubisys");

        assert_eq!(topics.request_filter(), "zigbee2mqtt/ubisys/#");
        assert_eq!(topics.devices_topic(), "zigbee2mqtt/bridge/devices");
        assert_eq!(topics.zcl_request_topic(), "zigbee2mqtt/bridge/request/zcl");
        assert_eq!(topics.log_topic(), "zigbee2mqtt/bridge/log");
        assert_eq!(
            topics.response_topic("blinds", "get_j1"),
            "zigbee2mqtt/bridge/response/ubisys/blinds/get_j1"
        );
    }

    #[test]
    fn test_parse_request_with_nested_name() {
        let topics = TopicLayout::new("zigbee2mqtt", "ubisys");

        let (name, action) = topics
            .parse_request("zigbee2mqtt/ubisys/first floor/living/blinds/configure_j1")
            .unwrap();
        assert_eq!(name, "first floor/living/blinds");
        assert_eq!(action, "configure_j1");
    }

    #[test]
    fn test_parse_request_rejects_other_topics() {
        let topics = TopicLayout::new("zigbee2mqtt", "ubisys");

        assert!(topics.parse_request("zigbee2mqtt/bridge/devices").is_err());
        assert!(topics.parse_request("zigbee2mqtt/ubisys/configure_j1").is_err());
        assert!(topics.parse_request("zigbee2mqtt/ubisys/blinds/").is_err());
        assert!(!topics.is_request("zigbee2mqtt/bridge/log"));
        assert!(topics.is_request("zigbee2mqtt/ubisys/blinds/get_j1"));
    }
}
