use crate::configuration::Subordinate;
use crate::forwarder::Forwarder;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;
use tracing::debug;
use tracing::warn;

/// How long a Supervisor waits on a non-responsive endpoint before trying
/// the next-best candidate.
pub const NEXT_IP_TIMEOUT: Duration = Duration::from_secs(30);

/// Caps the number of discovered endpoints retained per subordinate.
const ZCONF_BUFFER_COUNT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointScore {
    pub fail_count: u32,
    pub when: Instant,
}

impl EndpointScore {
    fn new(fail_count: u32, when: Instant) -> EndpointScore {
        EndpointScore { fail_count, when }
    }
}

/// Best-first ordering: lowest `fail_count` first, ties broken by the most
/// recently updated (largest `when`) winning.
fn better(a: &EndpointScore, b: &EndpointScore) -> std::cmp::Ordering {
    a.fail_count.cmp(&b.fail_count).then(b.when.cmp(&a.when))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub ip: Ipv4Addr,
    pub port: u16,
}

struct State {
    candidates: HashMap<Endpoint, EndpointScore>,
    current: Endpoint,
    current_started_at: Instant,
    subordinate: Subordinate,
}

/// Owns one [`Forwarder`] and shepherds its subordinate's endpoint selection:
/// scoring discovered candidates, and triggering a reload to the best-scoring
/// one when the current endpoint has stopped responding.
pub struct Supervisor {
    forwarder: Forwarder,
    state: Mutex<State>,
}

impl Supervisor {
    pub fn new(forwarder: Forwarder, subordinate: Subordinate, now: Instant) -> Supervisor {
        let current = Endpoint {
            ip: subordinate.address,
            port: subordinate.port,
        };
        let mut candidates = HashMap::new();
        candidates.insert(current, EndpointScore::new(0, now));

        Supervisor {
            forwarder,
            state: Mutex::new(State {
                candidates,
                current,
                current_started_at: now,
                subordinate,
            }),
        }
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }

    pub fn forwarder_mut(&mut self) -> &mut Forwarder {
        &mut self.forwarder
    }

    /// Merge newly discovered addresses into the candidate set, keeping each
    /// endpoint's existing fail count. Afterwards the set is sorted best-first
    /// and truncated to [`ZCONF_BUFFER_COUNT`] entries.
    pub fn zconf_update(&self, ips: &[Ipv4Addr], port: u16, now: Instant) {
        debug!("Got {} addresses from discovery", ips.len());
        let mut state = self.state.lock().unwrap();

        for ip in ips {
            let endpoint = Endpoint { ip: *ip, port };
            let fail_count = state
                .candidates
                .get(&endpoint)
                .map(|score| score.fail_count)
                .unwrap_or(0);
            state
                .candidates
                .insert(endpoint, EndpointScore::new(fail_count, now));
        }

        if state.candidates.len() > ZCONF_BUFFER_COUNT {
            let mut ranked: Vec<_> = state.candidates.iter().map(|(e, s)| (*e, *s)).collect();
            ranked.sort_by(|(_, a), (_, b)| better(a, b));
            ranked.truncate(ZCONF_BUFFER_COUNT);
            state.candidates = ranked.into_iter().collect();
        }
    }

    fn best_candidate(state: &State) -> Endpoint {
        state
            .candidates
            .iter()
            .map(|(e, s)| (*e, *s))
            .min_by(|(_, a), (_, b)| better(a, b))
            .map(|(e, _)| e)
            .unwrap_or(state.current)
    }

    /// Called periodically. If the subordinate side is connected, refresh the
    /// current endpoint's score to keep a working address ranked high.
    /// Otherwise, once the current endpoint has been unresponsive for
    /// [`NEXT_IP_TIMEOUT`], pick the best-scoring alternative and reload the
    /// forwarder's subordinate client against it.
    pub async fn check(&mut self, now: Instant) {
        if self.forwarder.subordinate_connected() {
            let mut state = self.state.lock().unwrap();
            state.current_started_at = now;
            let current = state.current;
            if let Some(score) = state.candidates.get_mut(&current) {
                score.fail_count = 0;
                score.when = now;
            }
            return;
        }

        let reload_target = {
            let mut state = self.state.lock().unwrap();
            if now.duration_since(state.current_started_at) < NEXT_IP_TIMEOUT {
                return;
            }

            let current = state.current;
            if let Some(score) = state.candidates.get_mut(&current) {
                score.fail_count += 1;
            }

            let next = Supervisor::best_candidate(&state);
            state.current = next;
            state.current_started_at = now;
            state.subordinate = state.subordinate.clone_with_address(next.ip, Some(next.port));
            state.subordinate.clone()
        };

        warn!(
            "Subordinate unresponsive for {:?}, trying endpoint {}:{}",
            NEXT_IP_TIMEOUT, reload_target.address, reload_target.port
        );
        if let Err(error) = self.forwarder.reload_subordinate(&reload_target).await {
            warn!("Failed to reload subordinate connection: {error}");
        }
    }

    /// Delegates to [`Forwarder::reload_subordinate`] — used when the static
    /// configuration itself changes the subordinate (e.g. certificate rotation).
    pub async fn subordinate_config_update(&mut self, new_subordinate: Subordinate) {
        let mut state = self.state.lock().unwrap();
        state.subordinate = new_subordinate.clone();
        drop(state);

        if let Err(error) = self.forwarder.reload_subordinate(&new_subordinate).await {
            warn!("Failed to apply subordinate configuration update: {error}");
        }
    }

    pub fn terminate(&self) {
        self.forwarder.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn better_prefers_lower_fail_count() {
        let now = Instant::now();
        let good = EndpointScore::new(0, now);
        let bad = EndpointScore::new(3, now);
        assert_eq!(better(&good, &bad), std::cmp::Ordering::Less);
    }

    #[test]
    fn better_prefers_most_recent_on_tie() {
        let earlier = Instant::now();
        let later = earlier + Duration::from_secs(1);
        let a = EndpointScore::new(1, later);
        let b = EndpointScore::new(1, earlier);
        assert_eq!(better(&a, &b), std::cmp::Ordering::Less);
    }
}
