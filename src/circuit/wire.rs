//! Wires and the net list.
//!
//! The graph is an arena keyed by dense indices: wires and gates reference
//! each other by [`WireId`]/[`GateId`] only, never by direct reference, so
//! the scheduler queues hold plain values that can always be reconstructed
//! from the immutable load result. Textual register names are kept solely
//! for diagnostics.

use std::{collections::HashMap, fmt, ops::Deref};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WireId(pub usize);

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Deref for WireId {
    type Target = usize;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<usize> for WireId {
    fn from(v: usize) -> Self {
        WireId(v)
    }
}

impl From<WireId> for usize {
    fn from(w: WireId) -> usize {
        w.0
    }
}

/// Load-order sequence number of a gate; doubles as its arena index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GateId(pub usize);

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for GateId {
    fn from(v: usize) -> Self {
        GateId(v)
    }
}

impl From<GateId> for usize {
    fn from(g: GateId) -> usize {
        g.0
    }
}

/// Interned register names, first-appearance order.
#[derive(Debug, Default, Clone)]
pub struct WireTable {
    names: Vec<String>,
    index: HashMap<String, WireId>,
}

impl WireTable {
    pub fn intern(&mut self, name: &str) -> WireId {
        if let Some(id) = self.index.get(name) {
            return *id;
        }
        let id = WireId(self.names.len());
        self.names.push(name.to_owned());
        self.index.insert(name.to_owned(), id);
        id
    }

    pub fn get(&self, name: &str) -> Option<WireId> {
        self.index.get(name).copied()
    }

    pub fn name(&self, id: WireId) -> &str {
        &self.names[id.0]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = WireId> + '_ {
        (0..self.names.len()).map(WireId)
    }
}

/// Wire → consumer-gates mapping, built once at load and immutable after.
#[derive(Debug, Default, Clone)]
pub struct NetList {
    consumers: Vec<Vec<GateId>>,
}

impl NetList {
    pub fn new(n_wires: usize) -> Self {
        Self {
            consumers: vec![Vec::new(); n_wires],
        }
    }

    pub fn add_consumer(&mut self, wire: WireId, gate: GateId) {
        self.consumers[wire.0].push(gate);
    }

    pub fn fanout(&self, wire: WireId) -> &[GateId] {
        &self.consumers[wire.0]
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

/// A live wire on the active queue: one bit, its ciphertext when encrypted
/// mode is on, and the gates still waiting to consume it.
#[derive(Debug, Clone)]
pub struct Wire<Ct> {
    pub id: WireId,
    pub value: Option<bool>,
    pub ct: Option<Ct>,
    pub fanout: Vec<GateId>,
}

impl<Ct> Wire<Ct> {
    pub fn new(id: WireId, fanout: Vec<GateId>) -> Self {
        Self {
            id,
            value: None,
            ct: None,
            fanout,
        }
    }

    /// Drop every fanout entry for `gate`. A gate that consumes the same
    /// wire on both inputs appears twice but captures both slots in one
    /// sweep, so all occurrences retire together.
    pub fn remove_fanout(&mut self, gate: GateId) {
        self.fanout.retain(|g| *g != gate);
    }

    pub fn is_drained(&self) -> bool {
        self.fanout.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let mut table = WireTable::default();
        let a = table.intern("R:1");
        let b = table.intern("R:2");
        assert_eq!(table.intern("R:1"), a);
        assert_ne!(a, b);
        assert_eq!(table.name(b), "R:2");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn fanout_removal_clears_duplicates() {
        let mut w: Wire<()> = Wire::new(WireId(0), vec![GateId(3), GateId(5), GateId(3)]);
        w.remove_fanout(GateId(3));
        assert_eq!(w.fanout, vec![GateId(5)]);
        w.remove_fanout(GateId(5));
        assert!(w.is_drained());
    }
}
