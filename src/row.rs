//! [`RLookup`]/[`RLookupKey`]: the schema-resolution structure mapping field names to typed
//! slots in a result row, and [`RowData`], the per-result value buffer those slots index into.

use std::collections::HashMap;

use crate::value::RValue;

/// flags on an [`RLookupKeyId`]'s definition.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RLookupKeyFlags(u8);

impl RLookupKeyFlags {
    pub const NONE: Self = Self(0);
    /// skip this key during field serialization.
    pub const HIDDEN: Self = Self(1 << 0);
    /// this key's value lives in a result's packed sort-vector, not its general row map.
    pub const SORT_VECTOR_SOURCE: Self = Self(1 << 1);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl core::ops::BitOr for RLookupKeyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// an intrusively-ordered, named slot into a result's [`RowData`].
///
/// identity is positional: two keys with the same name defined in two different [`RLookup`]
/// scopes are distinct ids. keys remain in the insertion order of the scope that defined them,
/// which is the order field serialization walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RLookupKeyId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) struct RLookupKeyDef {
    pub(crate) name: Box<str>,
    pub(crate) flags: RLookupKeyFlags,
    /// index into a result's sort-vector, set only when `flags` carries `SORT_VECTOR_SOURCE`.
    pub(crate) svidx: Option<usize>,
}

/// one resolution scope: the set of named keys a compiled plan's stages reference, in
/// definition order. real engines nest multiple scopes as a pipeline composes; this crate
/// models a single scope per request, which is sufficient for the field-serialization
/// contract (§4.3's "iterate the last lookup scope's keys") since there is never more than one.
#[derive(Debug, Default, Clone)]
pub struct RLookup {
    keys: Vec<RLookupKeyDef>,
}

impl RLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// define a new key and return its id. does not check for duplicate names: callers that
    /// want field shadowing semantics can define the same name twice, as the real schema
    /// resolver permits for derived/computed fields.
    pub fn define(&mut self, name: impl Into<Box<str>>, flags: RLookupKeyFlags) -> RLookupKeyId {
        let id = RLookupKeyId(self.keys.len());
        self.keys.push(RLookupKeyDef {
            name: name.into(),
            flags,
            svidx: None,
        });
        id
    }

    /// define a key backed by a sort-vector slot rather than the general row map.
    pub fn define_sort_vector(&mut self, name: impl Into<Box<str>>, svidx: usize) -> RLookupKeyId {
        let id = RLookupKeyId(self.keys.len());
        self.keys.push(RLookupKeyDef {
            name: name.into(),
            flags: RLookupKeyFlags::SORT_VECTOR_SOURCE,
            svidx: Some(svidx),
        });
        id
    }

    pub fn contains(&self, id: RLookupKeyId) -> bool {
        id.0 < self.keys.len()
    }

    pub fn name(&self, id: RLookupKeyId) -> &str {
        &self.keys[id.0].name
    }

    pub(crate) fn flags(&self, id: RLookupKeyId) -> RLookupKeyFlags {
        self.keys[id.0].flags
    }

    pub(crate) fn svidx(&self, id: RLookupKeyId) -> Option<usize> {
        self.keys[id.0].svidx
    }

    /// keys in insertion order, skipping `HIDDEN` ones. this is the order and filter field
    /// serialization uses.
    pub fn visible_fields(&self) -> impl Iterator<Item = RLookupKeyId> + '_ {
        self.keys
            .iter()
            .enumerate()
            .filter(|(_, k)| !k.flags.contains(RLookupKeyFlags::HIDDEN))
            .map(|(i, _)| RLookupKeyId(i))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// the per-result typed value buffer indexed by [`RLookupKeyId`]. sparse: a key with no entry
/// serializes as null, matching "missing values emit null".
#[derive(Debug, Default, Clone)]
pub struct RowData {
    values: HashMap<RLookupKeyId, RValue>,
}

impl RowData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: RLookupKeyId) -> Option<&RValue> {
        self.values.get(&id)
    }

    pub fn set(&mut self, id: RLookupKeyId, value: RValue) {
        self.values.insert(id, value);
    }

    /// drop all values, preparing this buffer for reuse by the next `Next` call.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}
