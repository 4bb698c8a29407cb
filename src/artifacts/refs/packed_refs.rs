//! The `packed-refs` file
//!
//! ```text
//! # pack-refs with: peeled fully-peeled sorted
//! <hex> <name>
//! ^<hex>            peeled value of the annotated tag above
//! ```

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::refs::ref_name::RefName;
use crate::errors::{Error, Result};
use std::collections::BTreeMap;

pub const PACKED_REFS_HEADER: &str = "# pack-refs with: peeled fully-peeled sorted ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedRef {
    pub oid: ObjectId,
    pub peeled: Option<ObjectId>,
}

/// Parsed `packed-refs` content, kept sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedRefs {
    entries: BTreeMap<RefName, PackedRef>,
}

impl PackedRefs {
    pub fn parse(content: &[u8]) -> Result<Self> {
        let corrupt = |line: usize, reason: &str| {
            Error::corrupt("packed-refs", format!("line {}: {reason}", line + 1))
        };
        let content =
            std::str::from_utf8(content).map_err(|_| Error::corrupt("packed-refs", "not utf-8"))?;

        let mut entries = BTreeMap::new();
        let mut last: Option<RefName> = None;

        for (number, line) in content.lines().enumerate() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(peeled) = line.strip_prefix('^') {
                let peeled =
                    ObjectId::try_parse(peeled).map_err(|_| corrupt(number, "bad peeled id"))?;
                let entry: &mut PackedRef = last
                    .as_ref()
                    .and_then(|name| entries.get_mut(name))
                    .ok_or_else(|| corrupt(number, "peeled line without a reference"))?;
                entry.peeled = Some(peeled);
                continue;
            }

            let (hex, name) = line
                .split_once(' ')
                .ok_or_else(|| corrupt(number, "missing reference name"))?;
            let oid = ObjectId::try_parse(hex).map_err(|_| corrupt(number, "bad object id"))?;
            let name = RefName::try_parse(name).map_err(|_| corrupt(number, "bad reference name"))?;

            if entries
                .insert(name.clone(), PackedRef { oid, peeled: None })
                .is_some()
            {
                return Err(corrupt(number, "duplicate reference"));
            }
            last = Some(name);
        }

        Ok(PackedRefs { entries })
    }

    pub fn serialize(&self) -> String {
        let mut out = format!("{PACKED_REFS_HEADER}\n");
        for (name, entry) in &self.entries {
            out.push_str(&format!("{} {}\n", entry.oid, name));
            if let Some(peeled) = entry.peeled {
                out.push_str(&format!("^{peeled}\n"));
            }
        }
        out
    }

    pub fn get(&self, name: &RefName) -> Option<&PackedRef> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &RefName) -> bool {
        self.entries.contains_key(name)
    }

    pub fn insert(&mut self, name: RefName, entry: PackedRef) -> Option<PackedRef> {
        self.entries.insert(name, entry)
    }

    pub fn remove(&mut self, name: &RefName) -> Option<PackedRef> {
        self.entries.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RefName, &PackedRef)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
