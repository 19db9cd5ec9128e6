//! Metrics collection.
//!
//! Recorded through the `metrics` facade; the embedding process decides
//! whether and where to export them.
//!
//! # Metrics
//! - `balancer_selections_total` (counter): picks by tier
//! - `balancer_no_available_total` (counter): `next` calls that found nothing
//! - `balancer_transitions_total` (counter): up/down transitions
//! - `balancer_server_up` (gauge): 1=up, 0=down, per server
//! - `balancer_primary_online` (gauge): primaries currently up

use crate::load_balancer::{ServerEvent, ServerId, Tier};

pub fn record_selection(tier: Tier) {
    metrics::counter!("balancer_selections_total", "tier" => tier.as_str()).increment(1);
}

pub fn record_no_available() {
    metrics::counter!("balancer_no_available_total").increment(1);
}

pub fn record_transition(event: ServerEvent, server: ServerId) {
    metrics::counter!("balancer_transitions_total", "event" => event.as_str()).increment(1);
    let value = match event {
        ServerEvent::Up => 1.0,
        ServerEvent::Down => 0.0,
    };
    metrics::gauge!("balancer_server_up", "server" => server.to_string()).set(value);
}

/// Publish the initial `balancer_server_up` value for a newly added,
/// health-tracked server so it has a series before its first transition.
pub fn record_server_registered(server: ServerId) {
    metrics::gauge!("balancer_server_up", "server" => server.to_string()).set(1.0);
}

pub fn record_primary_online(count: usize) {
    metrics::gauge!("balancer_primary_online").set(count as f64);
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use metrics::{
        Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };

    use crate::load_balancer::{LoadBalancer, ServerOptions};

    type GaugeLog = Arc<Mutex<Vec<(String, f64)>>>;

    struct GaugeCapture {
        key: String,
        log: GaugeLog,
    }

    impl GaugeFn for GaugeCapture {
        fn increment(&self, _value: f64) {}

        fn decrement(&self, _value: f64) {}

        fn set(&self, value: f64) {
            self.log.lock().unwrap().push((self.key.clone(), value));
        }
    }

    #[derive(Default)]
    struct CaptureRecorder {
        gauges: GaugeLog,
    }

    impl Recorder for CaptureRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            let labels: Vec<String> = key
                .labels()
                .map(|l| format!("{}={}", l.key(), l.value()))
                .collect();
            Gauge::from_arc(Arc::new(GaugeCapture {
                key: format!("{}{{{}}}", key.name(), labels.join(",")),
                log: self.gauges.clone(),
            }))
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_tracked_servers_get_up_series_on_add() {
        let recorder = CaptureRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            let lb = LoadBalancer::new();
            lb.add(ServerOptions::primary(1), "tracked").unwrap();
            lb.add(ServerOptions::primary(1).with_max_fails(0), "untracked").unwrap();
            lb.add(ServerOptions::backup(1), "spare").unwrap();
        });

        let up: Vec<(String, f64)> = recorder
            .gauges
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with("balancer_server_up"))
            .cloned()
            .collect();
        assert_eq!(up, vec![("balancer_server_up{server=primary#0}".to_string(), 1.0)]);
    }
}
