use crate::configuration::Configuration;
use crate::forwarder::Forwarder;
use crate::supervisor::Supervisor;
use forward_discovery::Listener;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;
use tracing::warn;

/// How often the main tick loop calls [`Supervisor::check`] on every
/// supervisor.
pub const WAIT_LOOP_PERIOD: Duration = Duration::from_millis(200);

static INSTANCE_CREATED: OnceLock<()> = OnceLock::new();

/// The process-wide application: owns the static configuration, one
/// [`Supervisor`] (and its [`Forwarder`]) per enabled subordinate, and the
/// discovery listener feeding endpoint updates to them.
///
/// At most one `Application` may exist per process; a second construction
/// returns an error rather than silently sharing state with the first.
pub struct Application {
    configuration: Configuration,
    supervisors: Arc<Mutex<HashMap<String, Supervisor>>>,
    listener: Arc<Listener>,
}

impl Application {
    pub fn new(configuration: Configuration) -> Result<Application, &'static str> {
        if INSTANCE_CREATED.set(()).is_err() {
            return Err("an Application instance already exists in this process");
        }

        Ok(Application {
            configuration,
            supervisors: Arc::new(Mutex::new(HashMap::new())),
            listener: Arc::new(Listener::new()),
        })
    }

    /// Build one Forwarder+Supervisor per enabled subordinate, wire discovery
    /// callbacks to their supervisors, then run the tick loop forever.
    pub async fn run(&mut self) -> Result<(), forward_mqtt::MqttError> {
        let host = self.configuration.host();

        for (controller_id, subordinate) in self.configuration.subordinates() {
            if !subordinate.enabled {
                continue;
            }

            let subsubordinates: Vec<_> = self
                .configuration
                .subsubordinates()
                .into_values()
                .filter(|s| s.via == controller_id && s.enabled)
                .collect();

            let (forwarder, host_rx, subordinate_rx) =
                Forwarder::new(&host, &subordinate, subsubordinates)?;
            forwarder.start(host_rx, subordinate_rx);

            let supervisor = Supervisor::new(forwarder, subordinate, tokio::time::Instant::now().into_std());
            self.supervisors
                .lock()
                .await
                .insert(controller_id.to_string(), supervisor);
        }

        self.wire_discovery();

        let mut interval = tokio::time::interval(WAIT_LOOP_PERIOD);
        loop {
            interval.tick().await;
            let now = tokio::time::Instant::now().into_std();
            let mut supervisors = self.supervisors.lock().await;
            for supervisor in supervisors.values_mut() {
                supervisor.check(now).await;
            }
        }
    }

    fn wire_discovery(&self) {
        let supervisors = self.supervisors.clone();
        let handler_for = move |id: &str, ips: &[Ipv4Addr], port: u16| {
            let id = id.to_string();
            let ips = ips.to_vec();
            let now = std::time::Instant::now();
            // The discovery transport invokes this handler synchronously,
            // possibly from its own thread, so the tick loop's async lock is
            // taken via its blocking variant here.
            let mut supervisors = supervisors.blocking_lock();
            if let Some(supervisor) = supervisors.get_mut(&id) {
                supervisor.zconf_update(&ips, port, now);
            } else {
                info!("Discovered unknown controller id {id}, ignoring");
            }
        };

        let handler_for_add = handler_for.clone();
        self.listener
            .set_add_service_handler(move |id, ips, port| handler_for_add(id, ips, port));
        self.listener
            .set_update_service_handler(move |id, ips, port| handler_for(id, ips, port));
    }

    pub async fn shutdown(&self) {
        for supervisor in self.supervisors.lock().await.values() {
            supervisor.terminate();
        }
        warn!("Application shutting down");
    }
}
