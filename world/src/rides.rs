//! Ride table.

use std::{collections::BTreeMap, sync::Arc};

use parkscript_core::{RideId, RideObject};

/// Maximum number of rides that may exist at once.
pub const MAX_RIDES: u16 = 255;

/// A ride or stall built in the park.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ride {
    id: RideId,
    object: Arc<RideObject>,
    ride_type: u8,
    name: String,
    excitement: i32,
    intensity: i32,
    nausea: i32,
    total_customers: u32,
}

impl Ride {
    fn new(id: RideId, object: Arc<RideObject>, ride_type: u8, name: String) -> Self {
        Self {
            id,
            object,
            ride_type,
            name,
            excitement: 0,
            intensity: 0,
            nausea: 0,
            total_customers: 0,
        }
    }

    /// Identifier of the ride.
    #[must_use]
    pub const fn id(&self) -> RideId {
        self.id
    }

    /// Immutable object the ride was built from.
    #[must_use]
    pub fn object(&self) -> &RideObject {
        &self.object
    }

    /// Built-in ride type identifier.
    #[must_use]
    pub const fn ride_type(&self) -> u8 {
        self.ride_type
    }

    /// Changes the ride type.
    pub fn set_ride_type(&mut self, ride_type: u8) {
        self.ride_type = ride_type;
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the ride.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Excitement rating with two implied decimals.
    #[must_use]
    pub const fn excitement(&self) -> i32 {
        self.excitement
    }

    /// Intensity rating with two implied decimals.
    #[must_use]
    pub const fn intensity(&self) -> i32 {
        self.intensity
    }

    /// Nausea rating with two implied decimals.
    #[must_use]
    pub const fn nausea(&self) -> i32 {
        self.nausea
    }

    /// Replaces all three ratings at once.
    pub fn set_ratings(&mut self, excitement: i32, intensity: i32, nausea: i32) {
        self.excitement = excitement;
        self.intensity = intensity;
        self.nausea = nausea;
    }

    /// Number of guests that have ridden.
    #[must_use]
    pub const fn total_customers(&self) -> u32 {
        self.total_customers
    }

    /// Overrides the customer counter.
    pub fn set_total_customers(&mut self, total_customers: u32) {
        self.total_customers = total_customers;
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct RideTable {
    rides: BTreeMap<RideId, Ride>,
}

impl RideTable {
    /// Creates a ride under the lowest free identifier.
    pub(crate) fn allocate(
        &mut self,
        object: Arc<RideObject>,
        ride_type: u8,
        name: String,
    ) -> Option<RideId> {
        let id = (0..MAX_RIDES)
            .map(RideId::new)
            .find(|candidate| !self.rides.contains_key(candidate))?;
        let _ = self
            .rides
            .insert(id, Ride::new(id, object, ride_type, name));
        Some(id)
    }

    pub(crate) fn remove(&mut self, id: RideId) -> Option<Ride> {
        self.rides.remove(&id)
    }

    pub(crate) fn get(&self, id: RideId) -> Option<&Ride> {
        self.rides.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: RideId) -> Option<&mut Ride> {
        self.rides.get_mut(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Ride> {
        self.rides.values()
    }

    pub(crate) fn clear(&mut self) {
        self.rides.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object() -> Arc<RideObject> {
        Arc::new(RideObject {
            identifier: "TESTRIDE".to_owned(),
            name: "Test Ride".to_owned(),
            description: String::new(),
            capacity: "4 passengers".to_owned(),
        })
    }

    #[test]
    fn identifiers_are_reused_lowest_first() {
        let mut table = RideTable::default();
        let first = table.allocate(object(), 1, "A".to_owned());
        let second = table.allocate(object(), 1, "B".to_owned());
        let third = table.allocate(object(), 1, "C".to_owned());
        assert_eq!(
            (first, second, third),
            (Some(RideId::new(0)), Some(RideId::new(1)), Some(RideId::new(2)))
        );

        let _ = table.remove(RideId::new(1));
        assert_eq!(
            table.allocate(object(), 1, "D".to_owned()),
            Some(RideId::new(1))
        );
    }

    #[test]
    fn allocation_stops_at_capacity() {
        let mut table = RideTable::default();
        for _ in 0..MAX_RIDES {
            assert!(table.allocate(object(), 0, String::new()).is_some());
        }
        assert_eq!(table.allocate(object(), 0, String::new()), None);
    }
}
