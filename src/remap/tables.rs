use std::collections::BTreeMap;

use crate::error::Error;

/// Member renames keyed by owner, old name and descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct MemberTable {
    owners: BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>,
}

impl MemberTable {
    pub(crate) fn get(&self, owner: &str, descriptor: &str, name: &str) -> Option<&str> {
        self.owners
            .get(owner)?
            .get(name)?
            .get(descriptor)
            .map(String::as_str)
    }

    /// Inserts or replaces a rename, returning the previous new name.
    pub(crate) fn insert(
        &mut self,
        owner: &str,
        descriptor: &str,
        name: &str,
        new_name: &str,
    ) -> Option<String> {
        self.owners
            .entry(owner.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default()
            .insert(descriptor.to_string(), new_name.to_string())
    }

    /// Inserts a rename, refusing to replace a different existing one.
    pub(crate) fn insert_unique(
        &mut self,
        owner: &str,
        descriptor: &str,
        name: &str,
        new_name: &str,
    ) -> Result<(), Error> {
        if let Some(existing) = self.get(owner, descriptor, name) {
            if existing == new_name {
                return Ok(());
            }
            return Err(Error::ConflictingMapping {
                owner: owner.to_string(),
                descriptor: descriptor.to_string(),
                name: name.to_string(),
                existing: existing.to_string(),
                requested: new_name.to_string(),
            });
        }
        self.insert(owner, descriptor, name, new_name);
        Ok(())
    }

    pub(crate) fn remove(&mut self, owner: &str, descriptor: &str, name: &str) -> Option<String> {
        let names = self.owners.get_mut(owner)?;
        let descriptors = names.get_mut(name)?;
        let removed = descriptors.remove(descriptor);
        if descriptors.is_empty() {
            names.remove(name);
        }
        if names.is_empty() {
            self.owners.remove(owner);
        }
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.owners.clear();
    }

    #[allow(dead_code)]
    pub(crate) fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.iter().count()
    }

    /// Entries as `(owner, descriptor, old name, new name)`, ordered by owner then name.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &str, &str, &str)> {
        self.owners.iter().flat_map(|(owner, names)| {
            names.iter().flat_map(move |(name, descriptors)| {
                descriptors.iter().map(move |(descriptor, new_name)| {
                    (
                        owner.as_str(),
                        descriptor.as_str(),
                        name.as_str(),
                        new_name.as_str(),
                    )
                })
            })
        })
    }
}
