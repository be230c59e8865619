//! The abstract store threaded through a control-flow graph.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::trace;

use crate::aloc::ALoc;
use crate::value_set::ValueSet;
use crate::RegisterId;

/// One program point's abstract state: the value-set held by every a-loc
/// and every register.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbstractStore {
    alocs: BTreeMap<ALoc, ValueSet>,
    registers: BTreeMap<RegisterId, ValueSet>,
}

impl AbstractStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aloc(&self, aloc: &ALoc) -> Option<&ValueSet> {
        self.alocs.get(aloc)
    }

    pub fn register(&self, register: RegisterId) -> Option<&ValueSet> {
        self.registers.get(&register)
    }

    pub fn set_aloc(&mut self, aloc: ALoc, value: ValueSet) {
        self.alocs.insert(aloc, value);
    }

    pub fn set_register(&mut self, register: RegisterId, value: ValueSet) {
        self.registers.insert(register, value);
    }

    pub fn alocs(&self) -> impl Iterator<Item = (&ALoc, &ValueSet)> {
        self.alocs.iter()
    }

    pub fn registers(&self) -> impl Iterator<Item = (RegisterId, &ValueSet)> {
        self.registers.iter().map(|(register, value)| (*register, value))
    }

    /// Join pointwise; keys present only in `rhs` are inserted.
    pub fn join_with(&mut self, rhs: &AbstractStore) {
        for (aloc, value) in &rhs.alocs {
            match self.alocs.entry(*aloc) {
                Entry::Occupied(mut entry) => {
                    entry.get_mut().join_with(value);
                    trace!("{} now holds {}", aloc, entry.get());
                }
                Entry::Vacant(entry) => {
                    entry.insert(value.clone());
                }
            }
        }

        for (register, value) in &rhs.registers {
            match self.registers.entry(*register) {
                Entry::Occupied(mut entry) => entry.get_mut().join_with(value),
                Entry::Vacant(entry) => {
                    entry.insert(value.clone());
                }
            }
        }
    }

    /// Widen pointwise over the keys present on both sides.
    pub fn widen_with(&mut self, rhs: &AbstractStore) {
        for (aloc, value) in &mut self.alocs {
            if let Some(other) = rhs.alocs.get(aloc) {
                value.widen_with(other);
            }
        }

        for (register, value) in &mut self.registers {
            if let Some(other) = rhs.registers.get(register) {
                value.widen_with(other);
            }
        }
    }

    /// Narrow pointwise over the keys present on both sides.
    pub fn narrow_with(&mut self, rhs: &AbstractStore) {
        for (aloc, value) in &mut self.alocs {
            if let Some(other) = rhs.alocs.get(aloc) {
                value.narrow_with(other);
            }
        }

        for (register, value) in &mut self.registers {
            if let Some(other) = rhs.registers.get(register) {
                value.narrow_with(other);
            }
        }
    }
}
