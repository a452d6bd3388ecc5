// This file is part of vpklib.
//
// vpklib is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// vpklib is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with vpklib.  If not, see <https://www.gnu.org/licenses/>.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::entry::Entry;
use crate::result::{Error, Result};

/// String comparison used by the sorted lookup mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasePolicy {
    Ordinal,
    OrdinalIgnoreCase,
}

impl CasePolicy {
    #[inline]
    fn cmp_str(self, a: &str, b: &str) -> Ordering {
        match self {
            CasePolicy::Ordinal => a.cmp(b),
            CasePolicy::OrdinalIgnoreCase => a
                .bytes()
                .map(|byte| byte.to_ascii_lowercase())
                .cmp(b.bytes().map(|byte| byte.to_ascii_lowercase())),
        }
    }
}

/// Total order of entries within one extension. Lengths come first so a
/// lookup can reject most candidates without comparing the strings; sorted
/// archives stay binary-searchable across implementations only if this
/// exact order is kept.
fn cmp_keys(policy: CasePolicy, a: (&str, &str), b: (&str, &str)) -> Ordering {
    a.0.len()
        .cmp(&b.0.len())
        .then_with(|| a.1.len().cmp(&b.1.len()))
        .then_with(|| policy.cmp_str(a.0, b.0))
        .then_with(|| policy.cmp_str(a.1, b.1))
}

/// Entries grouped by extension. Each per-extension list preserves its
/// ingest order until `optimize` puts the store into sorted mode; a key is
/// dropped as soon as its list empties.
pub(crate) struct EntryStore {
    map: HashMap<String, Vec<Entry>>,
    order: Vec<String>,
    policy: Option<CasePolicy>,
}

impl EntryStore {
    pub(crate) fn new() -> Self {
        EntryStore {
            map: HashMap::new(),
            order: Vec::new(),
            policy: None,
        }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub(crate) fn file_count(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }

    #[inline]
    pub(crate) fn policy(&self) -> Option<CasePolicy> {
        self.policy
    }

    /// Switches to sorted mode. Must happen before any entry exists.
    pub(crate) fn optimize(&mut self, policy: CasePolicy) -> Result<()> {
        if !self.map.is_empty() {
            return Err(Error::invalid_state(
                "optimize must be called before entries are read or added",
            ));
        }

        self.policy = Some(policy);
        Ok(())
    }

    fn resolve_key(&self, type_name: &str) -> Option<String> {
        if self.map.contains_key(type_name) {
            return Some(type_name.to_owned());
        }

        if let Some(CasePolicy::OrdinalIgnoreCase) = self.policy {
            return self
                .order
                .iter()
                .find(|key| key.eq_ignore_ascii_case(type_name))
                .cloned();
        }

        None
    }

    fn list_for(&self, type_name: &str) -> Option<&Vec<Entry>> {
        if let Some(list) = self.map.get(type_name) {
            return Some(list);
        }

        if let Some(CasePolicy::OrdinalIgnoreCase) = self.policy {
            if let Some(key) = self
                .order
                .iter()
                .find(|key| key.eq_ignore_ascii_case(type_name))
            {
                return self.map.get(key);
            }
        }

        None
    }

    fn list_for_insert(&mut self, type_name: &str) -> &mut Vec<Entry> {
        let key = self
            .resolve_key(type_name)
            .unwrap_or_else(|| type_name.to_owned());

        if !self.map.contains_key(&key) {
            self.map.insert(key.clone(), Vec::new());
            self.order.push(key.clone());
        }

        self.map.get_mut(&key).unwrap()
    }

    /// Appends an entry during the tree walk, keeping on-disk order.
    pub(crate) fn push_parsed(&mut self, entry: Entry) {
        self.list_for_insert(&entry.type_name).push(entry);
    }

    /// Sorts the ingested lists once when the store is in sorted mode.
    pub(crate) fn finish_ingest(&mut self) {
        if let Some(policy) = self.policy {
            for list in self.map.values_mut() {
                list.sort_by(|a, b| {
                    cmp_keys(
                        policy,
                        (&a.file_name, &a.directory),
                        (&b.file_name, &b.directory),
                    )
                });
            }
        }
    }

    /// Inserts an entry, at the comparator position in sorted mode.
    pub(crate) fn add(&mut self, entry: Entry) {
        let policy = self.policy;
        let list = self.list_for_insert(&entry.type_name);

        match policy {
            Some(policy) => {
                let index = list
                    .binary_search_by(|probe| {
                        cmp_keys(
                            policy,
                            (&probe.file_name, &probe.directory),
                            (&entry.file_name, &entry.directory),
                        )
                    })
                    .unwrap_or_else(|index| index);
                list.insert(index, entry);
            }
            None => list.push(entry),
        }
    }

    pub(crate) fn find(&self, directory: &str, file_name: &str, type_name: &str) -> Option<&Entry> {
        let list = self.list_for(type_name)?;

        match self.policy {
            Some(policy) => list
                .binary_search_by(|probe| {
                    cmp_keys(
                        policy,
                        (&probe.file_name, &probe.directory),
                        (file_name, directory),
                    )
                })
                .ok()
                .map(|index| &list[index]),
            None => list
                .iter()
                .find(|entry| entry.file_name == file_name && entry.directory == directory),
        }
    }

    pub(crate) fn remove(
        &mut self,
        directory: &str,
        file_name: &str,
        type_name: &str,
    ) -> Option<Entry> {
        let policy = self.policy;
        let key = self.resolve_key(type_name)?;
        let list = self.map.get_mut(&key)?;

        let index = match policy {
            Some(policy) => list
                .binary_search_by(|probe| {
                    cmp_keys(
                        policy,
                        (&probe.file_name, &probe.directory),
                        (file_name, directory),
                    )
                })
                .ok()?,
            None => list
                .iter()
                .position(|entry| entry.file_name == file_name && entry.directory == directory)?,
        };

        let entry = list.remove(index);
        if list.is_empty() {
            self.map.remove(&key);
            self.order.retain(|other| other != &key);
        }

        Some(entry)
    }

    /// Extensions in insertion order.
    pub(crate) fn extensions(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub(crate) fn entries_for(&self, type_name: &str) -> Option<&[Entry]> {
        self.list_for(type_name).map(Vec::as_slice)
    }

    /// All entries, extension by extension in insertion order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.order
            .iter()
            .filter_map(move |key| self.map.get(key))
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::DIR_INDEX;

    fn entry(directory: &str, file_name: &str, type_name: &str) -> Entry {
        Entry {
            type_name: type_name.to_owned(),
            directory: directory.to_owned(),
            file_name: file_name.to_owned(),
            crc32: 0,
            length: 0,
            offset: 0,
            chunk_index: DIR_INDEX,
            small_data: Vec::new(),
        }
    }

    #[test]
    fn linear_lookup_is_case_sensitive() {
        let mut store = EntryStore::new();
        store.add(entry("maps", "de_dust", "bsp"));

        assert!(store.find("maps", "de_dust", "bsp").is_some());
        assert!(store.find("maps", "DE_DUST", "bsp").is_none());
        assert!(store.find("maps", "de_dust", "BSP").is_none());
    }

    #[test]
    fn comparator_orders_by_length_first() {
        let policy = CasePolicy::Ordinal;
        // Shorter file name sorts first even if it is lexicographically
        // larger.
        assert_eq!(
            cmp_keys(policy, ("zz", "dir"), ("aaa", "dir")),
            Ordering::Less
        );
        // Same name lengths: shorter directory first.
        assert_eq!(
            cmp_keys(policy, ("aa", "zzzz"), ("aa", "z")),
            Ordering::Greater
        );
        // Same lengths: fall back to the string order.
        assert_eq!(cmp_keys(policy, ("ab", "d"), ("aa", "d")), Ordering::Greater);
    }

    #[test]
    fn sorted_mode_sorts_ingested_lists() {
        let mut store = EntryStore::new();
        store.optimize(CasePolicy::Ordinal).unwrap();

        store.push_parsed(entry("dir", "charlie", "txt"));
        store.push_parsed(entry("dir", "al", "txt"));
        store.push_parsed(entry("dir", "bob", "txt"));
        store.finish_ingest();

        let names: Vec<&str> = store.iter().map(|e| e.file_name()).collect();
        assert_eq!(names, ["al", "bob", "charlie"]);

        assert!(store.find("dir", "bob", "txt").is_some());
        assert!(store.find("dir", "nobody", "txt").is_none());
    }

    #[test]
    fn ignore_case_policy_applies_to_all_parts() {
        let mut store = EntryStore::new();
        store.optimize(CasePolicy::OrdinalIgnoreCase).unwrap();
        store.add(entry("Addons/Chess", "Chess", "VDF"));

        assert!(store.find("addons/chess", "chess", "vdf").is_some());
        assert!(store.find("ADDONS/CHESS", "CHESS", "vdf").is_some());
    }

    #[test]
    fn optimize_after_ingest_is_rejected() {
        let mut store = EntryStore::new();
        store.add(entry(" ", "hello", "txt"));

        assert!(store.optimize(CasePolicy::Ordinal).is_err());
    }

    #[test]
    fn removing_the_last_entry_drops_the_extension() {
        let mut store = EntryStore::new();
        store.add(entry(" ", "hello", "txt"));
        store.add(entry(" ", "other", "vdf"));

        assert!(store.remove(" ", "hello", "txt").is_some());
        assert!(store.remove(" ", "hello", "txt").is_none());
        assert_eq!(store.extensions().collect::<Vec<_>>(), ["vdf"]);
        assert_eq!(store.file_count(), 1);
    }
}
