use parking_lot::Mutex;
use sensor_core::{Event, EventType, SensorType};
use std::collections::{HashMap, HashSet};

/// Last dispatched event of each recorded type, replayed to late joiners.
pub struct EventCache {
    recorded: HashSet<EventType>,
    slots: Mutex<HashMap<EventType, Event>>,
}

impl EventCache {
    /// Records the CHANGE_STATE stream of each listed sensor type.
    pub fn new(record_types: &[SensorType]) -> Self {
        Self {
            recorded: record_types.iter().map(|t| t.change_event()).collect(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_recorded(&self, event_type: EventType) -> bool {
        self.recorded.contains(&event_type)
    }

    /// Overwrites the slot if the type is recorded. Returns whether it was.
    pub fn record(&self, event: &Event) -> bool {
        if !self.is_recorded(event.event_type) {
            return false;
        }
        self.slots.lock().insert(event.event_type, *event);
        true
    }

    pub fn last(&self, event_type: EventType) -> Option<Event> {
        self.slots.lock().get(&event_type).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_core::{Accuracy, Sample, SensorId};

    fn proximity(ts: u64, value: f32) -> Event {
        Event::new(
            SensorId::new(SensorType::Proximity, 0),
            SensorType::Proximity.change_event(),
            Sample::new(ts, Accuracy::Good, &[value]),
        )
    }

    #[test]
    fn keeps_only_latest_recorded_event() {
        let cache = EventCache::new(&[SensorType::Proximity]);
        assert!(cache.record(&proximity(1, 5.0)));
        assert!(cache.record(&proximity(2, 0.0)));
        let last = cache.last(SensorType::Proximity.change_event()).unwrap();
        assert_eq!(last.data.values(), &[0.0]);

        let raw = Event::new(
            SensorId::new(SensorType::Accelerometer, 0),
            SensorType::Accelerometer.raw_event(),
            Sample::new(3, Accuracy::Good, &[0.0, 0.0, 9.8]),
        );
        assert!(!cache.record(&raw));
        assert!(cache.last(raw.event_type).is_none());
    }
}
