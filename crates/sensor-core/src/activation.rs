//! Reference-counted activation and per-client interval bookkeeping.

use crate::error::SensorError;
use crate::ids::{ClientId, SensorId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

/// Who placed an interval request on a sensor: the client itself, or a
/// virtual sensor forwarding that client's request upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntervalOrigin {
    Direct,
    Via(SensorId),
}

/// Effective interval before and after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalChange {
    pub before: Option<u32>,
    pub after: Option<u32>,
}

impl IntervalChange {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

#[derive(Debug, Default)]
struct ActivationState {
    clients: u32,
    intervals: BTreeMap<(ClientId, IntervalOrigin), u32>,
}

impl ActivationState {
    fn min_interval(&self) -> Option<u32> {
        self.intervals.values().copied().min()
    }
}

/// Start/stop reference count plus the interval table of one sensor.
///
/// The hooks passed to [`Activation::start`] and [`Activation::stop`] run with
/// the state lock held, so concurrent starts observe a single `on_start`.
#[derive(Debug, Default)]
pub struct Activation {
    state: Mutex<ActivationState>,
}

impl Activation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the reference count, running `on_start` on the 0 -> 1 edge.
    /// Returns whether this call activated the sensor.
    pub fn start<F>(&self, on_start: F) -> Result<bool, SensorError>
    where
        F: FnOnce() -> Result<(), SensorError>,
    {
        let mut state = self.state.lock();
        if state.clients == 0 {
            on_start()?;
        }
        state.clients += 1;
        Ok(state.clients == 1)
    }

    /// Decrements the reference count, running `on_stop` on the 1 -> 0 edge.
    /// Stopping an idle sensor is a no-op.
    pub fn stop<F>(&self, on_stop: F) -> Result<bool, SensorError>
    where
        F: FnOnce() -> Result<(), SensorError>,
    {
        let mut state = self.state.lock();
        match state.clients {
            0 => Ok(false),
            1 => {
                state.clients = 0;
                on_stop()?;
                Ok(true)
            }
            _ => {
                state.clients -= 1;
                Ok(false)
            }
        }
    }

    pub fn client_count(&self) -> u32 {
        self.state.lock().clients
    }

    pub fn is_started(&self) -> bool {
        self.client_count() > 0
    }

    pub fn add_interval(&self, client: ClientId, origin: IntervalOrigin, interval_ms: u32) -> IntervalChange {
        let mut state = self.state.lock();
        let before = state.min_interval();
        state.intervals.insert((client, origin), interval_ms);
        IntervalChange {
            before,
            after: state.min_interval(),
        }
    }

    pub fn delete_interval(&self, client: ClientId, origin: IntervalOrigin) -> IntervalChange {
        let mut state = self.state.lock();
        let before = state.min_interval();
        state.intervals.remove(&(client, origin));
        IntervalChange {
            before,
            after: state.min_interval(),
        }
    }

    /// Minimum requested interval across all entries.
    pub fn interval(&self) -> Option<u32> {
        self.state.lock().min_interval()
    }

    /// Minimum over the entries one client placed, whatever their origin.
    pub fn client_interval(&self, client: ClientId) -> Option<u32> {
        self.state
            .lock()
            .intervals
            .iter()
            .filter(|((c, _), _)| *c == client)
            .map(|(_, ms)| *ms)
            .min()
    }
}

/// Virtual sensors currently started, kept in dependency (topological) order
/// so upstream synthesizers run before their consumers.
#[derive(Debug, Default)]
pub struct ActiveSensors {
    inner: Mutex<BTreeSet<(usize, SensorId)>>,
}

impl ActiveSensors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&self, rank: usize, id: SensorId) {
        self.inner.lock().insert((rank, id));
    }

    pub fn deactivate(&self, rank: usize, id: SensorId) {
        self.inner.lock().remove(&(rank, id));
    }

    pub fn contains(&self, id: SensorId) -> bool {
        self.inner.lock().iter().any(|(_, active)| *active == id)
    }

    /// Ids in dependency order. The lock is released before returning.
    pub fn snapshot(&self) -> Vec<SensorId> {
        self.inner.lock().iter().map(|(_, id)| *id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SensorType;
    use std::cell::Cell;

    #[test]
    fn start_and_stop_hooks_run_on_edges_only() {
        let activation = Activation::new();
        let starts = Cell::new(0);
        let stops = Cell::new(0);

        assert!(activation.start(|| { starts.set(starts.get() + 1); Ok(()) }).unwrap());
        assert!(!activation.start(|| { starts.set(starts.get() + 1); Ok(()) }).unwrap());
        assert_eq!(starts.get(), 1);
        assert_eq!(activation.client_count(), 2);

        assert!(!activation.stop(|| { stops.set(stops.get() + 1); Ok(()) }).unwrap());
        assert!(activation.is_started());
        assert!(activation.stop(|| { stops.set(stops.get() + 1); Ok(()) }).unwrap());
        assert_eq!(stops.get(), 1);
        assert!(!activation.is_started());

        // Extra stop is ignored.
        assert!(!activation.stop(|| { stops.set(stops.get() + 1); Ok(()) }).unwrap());
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn failed_start_leaves_sensor_idle() {
        let activation = Activation::new();
        let err = activation.start(|| Err(SensorError::NoData));
        assert!(err.is_err());
        assert!(!activation.is_started());
    }

    #[test]
    fn interval_is_minimum_over_origins() {
        let activation = Activation::new();
        let via = IntervalOrigin::Via(SensorId::new(SensorType::Gravity, 0));

        let change = activation.add_interval(1, IntervalOrigin::Direct, 100);
        assert_eq!(change, IntervalChange { before: None, after: Some(100) });

        // Same client through a derived sensor does not overwrite its direct entry.
        let change = activation.add_interval(1, via, 20);
        assert!(change.changed());
        assert_eq!(activation.interval(), Some(20));

        assert_eq!(activation.client_interval(1), Some(20));
        assert_eq!(activation.client_interval(2), None);

        let change = activation.delete_interval(1, via);
        assert_eq!(change.after, Some(100));
        let change = activation.delete_interval(1, IntervalOrigin::Direct);
        assert_eq!(change.after, None);
    }

    #[test]
    fn active_set_is_rank_ordered() {
        let active = ActiveSensors::new();
        let gravity = SensorId::new(SensorType::Gravity, 0);
        let fusion = SensorId::new(SensorType::Fusion, 0);
        active.activate(5, gravity);
        active.activate(1, fusion);
        assert_eq!(active.snapshot(), vec![fusion, gravity]);
        assert!(active.contains(gravity));
        active.deactivate(5, gravity);
        assert!(!active.contains(gravity));
    }
}
