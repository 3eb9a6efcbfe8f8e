use crate::configuration::ControllerId;
use forward_mqtt::TopicFilter;

const APP: &str = "foris-controller";

/// Messages the forwarder wants from the host bus, to relay to the subordinate.
pub fn host_side_filters(controller_id: &ControllerId) -> TopicFilter {
    let mut filter = TopicFilter::new(format!("{APP}/{controller_id}/request/+/action/+")).unwrap();
    filter
        .add(format!("{APP}/{controller_id}/request/+/list"))
        .unwrap();
    filter.add(format!("{APP}/{controller_id}/list")).unwrap();
    filter.add(format!("{APP}/{controller_id}/schema")).unwrap();
    filter
}

/// Messages the forwarder wants from the subordinate bus, to relay back to the host.
pub fn subordinate_side_filters(controller_id: &ControllerId) -> TopicFilter {
    let mut filter =
        TopicFilter::new(format!("{APP}/{controller_id}/notification/+/action/+")).unwrap();
    filter.add(format!("{APP}/{controller_id}/reply/+")).unwrap();
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn host_side_filters_cover_all_four_patterns() {
        let id = ControllerId::from_str("ABCDEF0123456789").unwrap();
        let filters = host_side_filters(&id);
        assert_eq!(filters.patterns().len(), 4);
        assert!(filters
            .patterns()
            .contains(&"foris-controller/ABCDEF0123456789/schema".to_string()));
    }

    #[test]
    fn subordinate_side_filters_cover_both_patterns() {
        let id = ControllerId::from_str("ABCDEF0123456789").unwrap();
        let filters = subordinate_side_filters(&id);
        assert_eq!(filters.patterns().len(), 2);
    }
}
