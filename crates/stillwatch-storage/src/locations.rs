use uuid::Uuid;

use crate::kv::KvStore;
use crate::models::LocationPoint;

/// Store namespace holding the location history.
pub const LOCATIONS_NAMESPACE: &str = "locations";

const LOCATIONS_KEY: &str = "userLocations";

/// Append-ordered location history.
///
/// Points keep their recording order; edits change coordinates in place and
/// never reorder or restamp. Like [`crate::SettingsStore`], the in-memory
/// sequence is authoritative and the KV store is a best-effort mirror.
pub struct LocationStore {
    kv: KvStore,
    points: Vec<LocationPoint>,
}

impl LocationStore {
    /// Load the persisted history, falling back to an empty sequence when
    /// nothing is stored or the stored record does not parse.
    #[must_use]
    pub fn load(kv: KvStore) -> Self {
        let points = match kv.get_string(LOCATIONS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::error!("Stored locations are unreadable, starting empty: {e}");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::error!("Failed to read stored locations, starting empty: {e}");
                Vec::new()
            }
        };
        Self { kv, points }
    }

    /// All recorded points, oldest first.
    #[must_use]
    pub fn points(&self) -> &[LocationPoint] {
        &self.points
    }

    /// Record a point at the given coordinates, stamped with the current
    /// time. Returns the stored point.
    pub fn add(&mut self, latitude: f64, longitude: f64) -> LocationPoint {
        let point = LocationPoint::new(latitude, longitude);
        self.insert(point.clone());
        point
    }

    /// Append an already-built point (explicit timestamps included).
    pub fn insert(&mut self, point: LocationPoint) {
        self.points.push(point);
        self.persist();
    }

    /// Remove the point with the given id. Returns whether anything was
    /// removed; unknown ids are a no-op.
    pub fn delete(&mut self, id: Uuid) -> bool {
        let before = self.points.len();
        self.points.retain(|p| p.id != id);
        let removed = self.points.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    /// Replace the coordinates of the point with the given id, keeping its
    /// id, timestamp and position in the sequence. Returns whether a point
    /// was updated; unknown ids are a no-op.
    pub fn edit(&mut self, id: Uuid, latitude: f64, longitude: f64) -> bool {
        let Some(point) = self.points.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        point.latitude = latitude;
        point.longitude = longitude;
        self.persist();
        true
    }

    fn persist(&self) {
        match serde_json::to_string(&self.points) {
            Ok(raw) => {
                if let Err(e) = self.kv.set(LOCATIONS_KEY, &raw) {
                    log::error!("Failed to save locations: {e}");
                }
            }
            Err(e) => log::error!("Failed to serialize locations: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn memory_store() -> LocationStore {
        LocationStore::load(KvStore::in_memory().unwrap())
    }

    #[test]
    fn test_starts_empty() {
        assert!(memory_store().points().is_empty());
    }

    #[test]
    fn test_add_appends_in_order() {
        let mut store = memory_store();
        let first = store.add(10.0, 20.0);
        let second = store.add(30.0, 40.0);

        let points = store.points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].id, first.id);
        assert_eq!(points[1].id, second.id);
        assert_ne!(first.id, second.id);
        assert!(points[0].timestamp_ms <= points[1].timestamp_ms);
    }

    #[test]
    fn test_points_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let added = {
            let kv = KvStore::open(dir.path(), LOCATIONS_NAMESPACE).unwrap();
            let mut store = LocationStore::load(kv);
            store.add(52.52, 13.405)
        };

        let kv = KvStore::open(dir.path(), LOCATIONS_NAMESPACE).unwrap();
        let reloaded = LocationStore::load(kv);
        assert_eq!(reloaded.points(), &[added]);
    }

    #[test]
    fn test_delete_removes_only_the_matching_point() {
        let mut store = memory_store();
        let keep = store.add(1.0, 1.0);
        let victim = store.add(2.0, 2.0);

        assert!(store.delete(victim.id));
        assert_eq!(store.points(), &[keep]);
    }

    #[test]
    fn test_delete_unknown_id_is_a_noop() {
        let mut store = memory_store();
        store.add(1.0, 1.0);

        assert!(!store.delete(Uuid::new_v4()));
        assert_eq!(store.points().len(), 1);
    }

    #[test]
    fn test_edit_replaces_coordinates_and_nothing_else() {
        let mut store = memory_store();
        store.add(0.0, 0.0);
        let original = store.points()[0].clone();

        assert!(store.edit(original.id, 48.8584, 2.2945));

        let edited = &store.points()[0];
        assert_eq!(edited.id, original.id);
        assert_eq!(edited.timestamp_ms, original.timestamp_ms);
        assert!((edited.latitude - 48.8584).abs() < f64::EPSILON);
        assert!((edited.longitude - 2.2945).abs() < f64::EPSILON);
    }

    #[test]
    fn test_edit_unknown_id_is_a_noop() {
        let mut store = memory_store();
        let point = store.add(5.0, 6.0);

        assert!(!store.edit(Uuid::new_v4(), 9.0, 9.0));
        assert_eq!(store.points(), &[point]);
    }

    #[test]
    fn test_insert_keeps_explicit_timestamp() {
        let mut store = memory_store();
        store.insert(LocationPoint::with_timestamp(1.0, 2.0, 42));
        assert_eq!(store.points()[0].timestamp_ms, 42);
    }

    #[test]
    fn test_malformed_stored_record_falls_back_to_empty() {
        let kv = KvStore::in_memory().unwrap();
        kv.set("userLocations", "[{\"broken\":").unwrap();

        let store = LocationStore::load(kv);
        assert!(store.points().is_empty());
    }
}
