use crate::record::extract_controller_id;
use crate::record::extract_record;
use crate::record::EventKind;
use crate::record::RawServiceEvent;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use tracing::debug;
use tracing::info;

type AddOrUpdateHandler = Box<dyn Fn(&str, &[Ipv4Addr], u16) + Send + Sync>;
type RemoveHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Dispatches discovery events from an (external, opaque) service-discovery
/// transport to whichever handlers the [`crate::Listener`] owner has installed.
#[derive(Default)]
pub struct Listener {
    on_add: Mutex<Option<AddOrUpdateHandler>>,
    on_update: Mutex<Option<AddOrUpdateHandler>>,
    on_remove: Mutex<Option<RemoveHandler>>,
}

impl Listener {
    pub fn new() -> Listener {
        info!("Starting discovery listener");
        Listener::default()
    }

    pub fn set_add_service_handler(&self, handler: impl Fn(&str, &[Ipv4Addr], u16) + Send + Sync + 'static) {
        *self.on_add.lock().unwrap() = Some(Box::new(handler));
    }

    pub fn set_update_service_handler(&self, handler: impl Fn(&str, &[Ipv4Addr], u16) + Send + Sync + 'static) {
        *self.on_update.lock().unwrap() = Some(Box::new(handler));
    }

    pub fn set_remove_service_handler(&self, handler: impl Fn(&str) + Send + Sync + 'static) {
        *self.on_remove.lock().unwrap() = Some(Box::new(handler));
    }

    /// Entry point the discovery transport calls into for every service
    /// event it observes. May be invoked from any thread.
    pub fn dispatch(&self, event: RawServiceEvent) {
        match event.kind {
            EventKind::Added => {
                let Some(record) = extract_record(&event) else {
                    debug!("Ignoring add event for '{}': no usable record", event.name);
                    return;
                };
                if let Some(handler) = self.on_add.lock().unwrap().as_ref() {
                    handler(&record.controller_id, &record.addresses, record.port);
                }
            }
            EventKind::Updated => {
                let Some(record) = extract_record(&event) else {
                    debug!("Ignoring update event for '{}': no usable record", event.name);
                    return;
                };
                if let Some(handler) = self.on_update.lock().unwrap().as_ref() {
                    handler(&record.controller_id, &record.addresses, record.port);
                }
            }
            EventKind::Removed => {
                let Some(controller_id) = extract_controller_id(&event) else {
                    debug!("Ignoring remove event for '{}': no controller id", event.name);
                    return;
                };
                if let Some(handler) = self.on_remove.lock().unwrap().as_ref() {
                    handler(&controller_id);
                }
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        debug!("Terminating discovery listener");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;

    fn event_with_id(id: &str, addresses: Vec<Ipv4Addr>, port: u16) -> RawServiceEvent {
        let mut properties = HashMap::new();
        properties.insert(b"id".to_vec(), id.as_bytes().to_vec());
        RawServiceEvent {
            kind: EventKind::Added,
            service_type: "_fosquitto._tcp.local.".to_string(),
            name: format!("{id}._fosquitto._tcp.local."),
            properties,
            addresses,
            port,
        }
    }

    #[test]
    fn dispatches_add_event_to_handler() {
        let listener = Listener::new();
        let seen = Arc::new(StdMutex::new(None));
        let seen2 = seen.clone();
        listener.set_add_service_handler(move |id, addrs, port| {
            *seen2.lock().unwrap() = Some((id.to_string(), addrs.to_vec(), port));
        });

        listener.dispatch(event_with_id("ABCDEF0123456789", vec![Ipv4Addr::new(10, 0, 0, 1)], 11884));

        let captured = seen.lock().unwrap().clone().unwrap();
        assert_eq!(captured.0, "ABCDEF0123456789");
        assert_eq!(captured.2, 11884);
    }

    #[test]
    fn ignores_events_with_no_extractable_record() {
        let listener = Listener::new();
        let called = Arc::new(StdMutex::new(false));
        let called2 = called.clone();
        listener.set_add_service_handler(move |_, _, _| *called2.lock().unwrap() = true);

        listener.dispatch(event_with_id("ABCDEF0123456789", vec![], 0));
        assert!(!*called.lock().unwrap());
    }
}
