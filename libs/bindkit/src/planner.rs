//! Planning: groups binding records that can be served by one fetch.

use std::collections::HashSet;

use crate::collector::BindingRecord;
use crate::declaration::TypeTag;
use crate::key::KeyValue;
use crate::options::BindingOptions;

/// Records sharing key type, entity type and options, with the union of their
/// keys. One group is one receiver call.
#[derive(Debug, Clone)]
pub struct ResolutionGroup {
    key_type: TypeTag,
    entity_type: TypeTag,
    options: BindingOptions,
    keys: Vec<KeyValue>,
    members: Vec<usize>,
}

impl ResolutionGroup {
    pub fn key_type(&self) -> TypeTag {
        self.key_type
    }

    pub fn entity_type(&self) -> TypeTag {
        self.entity_type
    }

    pub fn options(&self) -> &BindingOptions {
        &self.options
    }

    /// Distinct keys across all members, in first-seen order.
    pub fn keys(&self) -> &[KeyValue] {
        &self.keys
    }

    /// Indices of the member records in the collected record list.
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    fn accepts(&self, record: &BindingRecord<'_>) -> bool {
        self.key_type == record.key_type()
            && self.entity_type == record.entity_type()
            && self.options == *record.options()
    }
}

/// Partition `records` into resolution groups.
///
/// Groups keep the order in which they were first seen. Groups whose key union
/// is empty are dropped, since there is nothing to fetch.
pub fn plan(records: &[BindingRecord<'_>]) -> Vec<ResolutionGroup> {
    let mut groups: Vec<(ResolutionGroup, HashSet<KeyValue>)> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let slot = match groups.iter().position(|(g, _)| g.accepts(record)) {
            Some(pos) => pos,
            None => {
                groups.push((
                    ResolutionGroup {
                        key_type: record.key_type(),
                        entity_type: record.entity_type(),
                        options: record.options().clone(),
                        keys: Vec::new(),
                        members: Vec::new(),
                    },
                    HashSet::new(),
                ));
                groups.len() - 1
            }
        };

        let (group, seen) = &mut groups[slot];
        group.members.push(index);
        for key in record.keys() {
            if seen.insert(key.clone()) {
                group.keys.push(key.clone());
            }
        }
    }

    groups
        .into_iter()
        .map(|(group, _)| group)
        .filter(|group| !group.keys.is_empty())
        .collect()
}
