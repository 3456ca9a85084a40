//! Movable things: ride vehicles, ducks and guests.

use std::collections::BTreeMap;

use parkscript_core::{Coord3, ThingId, ThingType};

/// Maximum number of things that may exist at once.
pub const MAX_THINGS: u16 = 10_000;

/// Clothing colours carried by guests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PeepAppearance {
    /// T-shirt colour index.
    pub tshirt_colour: u8,
    /// Trousers colour index.
    pub trousers_colour: u8,
}

/// A movable entity positioned in game units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Thing {
    id: ThingId,
    kind: ThingType,
    position: Coord3,
    peep: Option<PeepAppearance>,
}

impl Thing {
    /// Identifier of the thing. Identifiers are reused after removal.
    #[must_use]
    pub const fn id(&self) -> ThingId {
        self.id
    }

    /// Kind of the thing.
    #[must_use]
    pub const fn kind(&self) -> ThingType {
        self.kind
    }

    /// Current game-unit position.
    #[must_use]
    pub const fn position(&self) -> Coord3 {
        self.position
    }

    /// Guest clothing, present only for peeps.
    #[must_use]
    pub const fn peep(&self) -> Option<&PeepAppearance> {
        self.peep.as_ref()
    }

    /// Mutable guest clothing, present only for peeps.
    pub fn peep_mut(&mut self) -> Option<&mut PeepAppearance> {
        self.peep.as_mut()
    }

    pub(crate) fn move_to(&mut self, position: Coord3) {
        self.position = position;
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct ThingTable {
    things: BTreeMap<ThingId, Thing>,
}

impl ThingTable {
    pub(crate) fn spawn(&mut self, kind: ThingType, position: Coord3) -> Option<ThingId> {
        let id = (0..MAX_THINGS)
            .map(ThingId::new)
            .find(|candidate| !self.things.contains_key(candidate))?;
        let peep = (kind == ThingType::Peep).then(PeepAppearance::default);
        let _ = self.things.insert(
            id,
            Thing {
                id,
                kind,
                position,
                peep,
            },
        );
        Some(id)
    }

    pub(crate) fn remove(&mut self, id: ThingId) -> Option<Thing> {
        self.things.remove(&id)
    }

    pub(crate) fn get(&self, id: ThingId) -> Option<&Thing> {
        self.things.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ThingId) -> Option<&mut Thing> {
        self.things.get_mut(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Thing> {
        self.things.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.things.len()
    }

    pub(crate) fn clear(&mut self) {
        self.things.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_peeps_carry_clothing() {
        let mut table = ThingTable::default();
        let duck = table
            .spawn(ThingType::Duck, Coord3::new(0, 0, 0))
            .expect("capacity");
        let peep = table
            .spawn(ThingType::Peep, Coord3::new(32, 32, 112))
            .expect("capacity");
        assert!(table.get(duck).and_then(Thing::peep).is_none());
        assert!(table.get(peep).and_then(Thing::peep).is_some());
    }

    #[test]
    fn removed_identifiers_are_reused() {
        let mut table = ThingTable::default();
        let first = table.spawn(ThingType::Car, Coord3::default());
        let _ = table.spawn(ThingType::Car, Coord3::default());
        let _ = table.remove(ThingId::new(0));
        assert_eq!(table.spawn(ThingType::Duck, Coord3::default()), first);
        assert_eq!(table.len(), 2);
    }
}
