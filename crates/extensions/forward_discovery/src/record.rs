use regex::Regex;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::OnceLock;

const TYPE_OLD: &str = "_mqtt._tcp.local.";
const TYPE_NEW: &str = "_fosquitto._tcp.local.";
const SERVICE_NAME: &str = "foris-controller";

pub enum EventKind {
    Added,
    Updated,
    Removed,
}

/// The shape a zeroconf/mDNS crate's service callback would hand over. The
/// discovery transport itself is an external collaborator; this crate only
/// interprets the event it raises.
pub struct RawServiceEvent {
    pub kind: EventKind,
    pub service_type: String,
    pub name: String,
    pub properties: HashMap<Vec<u8>, Vec<u8>>,
    pub addresses: Vec<Ipv4Addr>,
    pub port: u16,
}

/// A subordinate announcement, normalized across both schema generations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRecord {
    pub controller_id: String,
    pub addresses: Vec<Ipv4Addr>,
    pub port: u16,
}

fn legacy_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"^([^.]+)\.{}\.{}$", regex::escape(SERVICE_NAME), regex::escape(TYPE_OLD))).unwrap()
    })
}

fn current_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{16}$").unwrap())
}

fn current_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"^([0-9a-fA-F]{{16}})\.{}$", regex::escape(TYPE_NEW))).unwrap()
    })
}

/// Extract just the controller id, when that's all a `remove` event needs.
pub fn extract_controller_id(event: &RawServiceEvent) -> Option<String> {
    if event.service_type == TYPE_NEW {
        if let Some(id) = event
            .properties
            .get(b"id".as_slice())
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
        {
            if current_id_pattern().is_match(id) {
                return Some(id.to_ascii_uppercase());
            }
        }
        if let Some(captures) = current_name_pattern().captures(&event.name) {
            return Some(captures[1].to_ascii_uppercase());
        }
    }

    legacy_name_pattern()
        .captures(&event.name)
        .map(|captures| captures[1].to_string())
}

/// Extract a full record (controller id + addresses + port), required for
/// `add`/`update` events. Returns `None` if either schema can't supply all
/// three fields.
pub fn extract_record(event: &RawServiceEvent) -> Option<DiscoveryRecord> {
    if event.service_type == TYPE_NEW {
        let id = event
            .properties
            .get(b"id".as_slice())
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .filter(|id| current_id_pattern().is_match(id))?;

        if event.addresses.is_empty() || event.port == 0 {
            return None;
        }

        return Some(DiscoveryRecord {
            controller_id: id.to_ascii_uppercase(),
            addresses: event.addresses.clone(),
            port: event.port,
        });
    }

    let controller_id = legacy_name_pattern().captures(&event.name).map(|c| c[1].to_string())?;

    let addresses = event
        .properties
        .get(b"addresses".as_slice())
        .and_then(|bytes| serde_json::from_slice::<Vec<String>>(bytes).ok())
        .map(|raw| {
            raw.iter()
                .filter_map(|ip| ip.parse::<Ipv4Addr>().ok())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if addresses.is_empty() || event.port == 0 {
        return None;
    }

    Some(DiscoveryRecord {
        controller_id,
        addresses,
        port: event.port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_schema_event(id: &str, addresses: Vec<Ipv4Addr>, port: u16) -> RawServiceEvent {
        let mut properties = HashMap::new();
        properties.insert(b"id".to_vec(), id.as_bytes().to_vec());
        RawServiceEvent {
            kind: EventKind::Added,
            service_type: TYPE_NEW.to_string(),
            name: format!("{id}.{TYPE_NEW}"),
            properties,
            addresses,
            port,
        }
    }

    fn legacy_schema_event(id: &str, addresses: Vec<Ipv4Addr>, port: u16) -> RawServiceEvent {
        let mut properties = HashMap::new();
        let json = serde_json::to_vec(&addresses.iter().map(|a| a.to_string()).collect::<Vec<_>>()).unwrap();
        properties.insert(b"addresses".to_vec(), json);
        RawServiceEvent {
            kind: EventKind::Added,
            service_type: TYPE_OLD.to_string(),
            name: format!("{id}.{SERVICE_NAME}.{TYPE_OLD}"),
            properties,
            addresses: vec![],
            port,
        }
    }

    #[test]
    fn extracts_current_schema_record() {
        let event = current_schema_event("abcdef0123456789", vec![Ipv4Addr::new(192, 168, 1, 5)], 11884);
        let record = extract_record(&event).unwrap();
        assert_eq!(record.controller_id, "ABCDEF0123456789");
        assert_eq!(record.port, 11884);
    }

    #[test]
    fn extracts_legacy_schema_record() {
        let event = legacy_schema_event("ABCDEF0123456789", vec![Ipv4Addr::new(10, 0, 0, 1)], 11884);
        let record = extract_record(&event).unwrap();
        assert_eq!(record.controller_id, "ABCDEF0123456789");
        assert_eq!(record.addresses, vec![Ipv4Addr::new(10, 0, 0, 1)]);
    }

    #[test]
    fn rejects_event_with_no_addresses() {
        let event = current_schema_event("ABCDEF0123456789", vec![], 11884);
        assert!(extract_record(&event).is_none());
    }

    #[test]
    fn rejects_unrelated_service_type() {
        let event = RawServiceEvent {
            kind: EventKind::Added,
            service_type: "_http._tcp.local.".to_string(),
            name: "printer._http._tcp.local.".to_string(),
            properties: HashMap::new(),
            addresses: vec![Ipv4Addr::new(10, 0, 0, 1)],
            port: 80,
        };
        assert!(extract_record(&event).is_none());
    }

    #[test]
    fn current_schema_wins_when_both_would_match() {
        // A name that happens to also look like the legacy pattern, but with
        // a current-schema service_type and id property, must resolve via
        // the current schema.
        let event = current_schema_event("ABCDEF0123456789", vec![Ipv4Addr::new(192, 168, 1, 5)], 11884);
        assert_eq!(extract_controller_id(&event).as_deref(), Some("ABCDEF0123456789"));
    }

    #[test]
    fn extract_controller_id_falls_back_for_removal() {
        let event = RawServiceEvent {
            kind: EventKind::Removed,
            service_type: TYPE_NEW.to_string(),
            name: "ABCDEF0123456789.".to_string() + TYPE_NEW,
            properties: HashMap::new(),
            addresses: vec![],
            port: 0,
        };
        assert_eq!(extract_controller_id(&event).as_deref(), Some("ABCDEF0123456789"));
    }
}
