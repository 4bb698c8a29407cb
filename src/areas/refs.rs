//! Git references (branches, HEAD, tags)
//!
//! This module manages Git references which are human-readable names pointing to objects.
//! References can be:
//! - Direct: Containing an object id
//! - Symbolic: Pointing to another reference (e.g., HEAD -> refs/heads/master)
//!
//! ## Storage
//!
//! - Loose: one file per reference under the git directory
//! - Packed: every consolidated reference in the single `packed-refs` file
//!
//! A loose reference shadows a packed one with the same name.
//!
//! ## Locking
//!
//! Every mutation takes `<file>.lock` exclusively, writes the new content there
//! and renames it into place. Readers never wait on a lock.

use crate::artifacts::core::lockfile::{LOCK_SUFFIX, Lockfile};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::signature::Signature;
use crate::artifacts::refs::packed_refs::{PackedRef, PackedRefs};
use crate::artifacts::refs::ref_name::RefName;
use crate::artifacts::refs::reference::{RefTarget, Reference};
use crate::artifacts::refs::reflog::{self, ReflogEntry, ReflogWriter};
use crate::artifacts::refs::{
    HEAD_REF_NAME, HEADS_PREFIX, MAX_SYMREF_DEPTH, NOTES_PREFIX, REMOTES_PREFIX,
};
use crate::errors::{Error, Result};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

pub const PACKED_REFS_FILE: &str = "packed-refs";
const LOGS_DIR: &str = "logs";

/// Which reference updates are recorded in a reflog (`core.logAllRefUpdates`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogPolicy {
    /// HEAD, branches, remote-tracking refs, notes, and refs that already have a log
    #[default]
    Default,
    Always,
    Never,
}

/// Identity and message recorded in the reflog for one mutation
#[derive(Debug, Clone)]
pub struct RefLogMessage<'a> {
    pub committer: &'a Signature,
    pub message: &'a str,
}

impl<'a> RefLogMessage<'a> {
    pub fn new(committer: &'a Signature, message: &'a str) -> Self {
        RefLogMessage { committer, message }
    }
}

/// Git references manager
#[derive(Debug)]
pub struct Refs {
    /// Path to the git directory
    path: PathBuf,
    log_policy: LogPolicy,
}

impl Refs {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Refs {
            path: path.into(),
            log_policy: LogPolicy::Default,
        }
    }

    pub fn with_log_policy(mut self, log_policy: LogPolicy) -> Self {
        self.log_policy = log_policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn head_path(&self) -> PathBuf {
        self.path.join(HEAD_REF_NAME)
    }

    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }

    pub fn packed_refs_path(&self) -> PathBuf {
        self.path.join(PACKED_REFS_FILE)
    }

    fn ref_path(&self, name: &RefName) -> PathBuf {
        self.path.join(name.as_ref_path())
    }

    pub fn log_path(&self, name: &RefName) -> PathBuf {
        self.path.join(LOGS_DIR).join(name.as_ref_path())
    }

    fn read_loose(&self, name: &RefName) -> Result<Option<RefTarget>> {
        let path = self.ref_path(name);
        match std::fs::read(&path) {
            Ok(content) => RefTarget::parse(&content, name.as_str()).map(Some),
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound
                        | std::io::ErrorKind::IsADirectory
                        | std::io::ErrorKind::NotADirectory
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(Error::io(&path, e)),
        }
    }

    pub fn read_packed(&self) -> Result<PackedRefs> {
        let path = self.packed_refs_path();
        match std::fs::read(&path) {
            Ok(content) => PackedRefs::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PackedRefs::default()),
            Err(e) => Err(Error::io(&path, e)),
        }
    }

    fn find(&self, name: &RefName) -> Result<Option<Reference>> {
        if let Some(target) = self.read_loose(name)? {
            return Ok(Some(Reference::new(name.clone(), target)));
        }

        Ok(self.read_packed()?.get(name).map(|packed| {
            Reference::new(name.clone(), RefTarget::Direct(packed.oid)).with_peeled(packed.peeled)
        }))
    }

    /// Read `name` without following symbolic references
    pub fn lookup(&self, name: &str) -> Result<Reference> {
        let name = RefName::try_parse(name)?;
        self.find(&name)?
            .ok_or_else(|| Error::not_found(format!("reference {name}")))
    }

    /// Follow symbolic references from `name` to a direct one
    pub fn resolve(&self, name: &str) -> Result<Reference> {
        let mut reference = self.lookup(name)?;

        for _ in 0..MAX_SYMREF_DEPTH {
            let Some(target) = reference.symbolic_target().cloned() else {
                return Ok(reference);
            };
            reference = self
                .find(&target)?
                .ok_or_else(|| Error::UnbornBranch(target.to_string()))?;
        }

        if reference.is_symbolic() {
            return Err(Error::invalid_spec(format!(
                "reference {name} is too deeply nested or cyclic"
            )));
        }
        Ok(reference)
    }

    /// Object id `name` resolves to
    pub fn resolve_oid(&self, name: &str) -> Result<ObjectId> {
        let reference = self.resolve(name)?;
        reference
            .oid()
            .copied()
            .ok_or_else(|| Error::invalid_spec(format!("reference {name} is symbolic")))
    }

    /// Name that a write through `name` lands on, following symbolic links
    ///
    /// The final name need not exist yet (an unborn branch).
    fn final_name(&self, name: &RefName) -> Result<RefName> {
        let mut current = name.clone();
        for _ in 0..=MAX_SYMREF_DEPTH {
            match self.read_loose(&current)? {
                Some(RefTarget::Symbolic(target)) => current = target,
                _ => return Ok(current),
            }
        }
        Err(Error::invalid_spec(format!(
            "reference {name} is too deeply nested or cyclic"
        )))
    }

    /// Names under `refs/`, loose and packed, deduplicated and sorted
    ///
    /// Only names starting with `prefix` are returned when it is given.
    pub fn list(&self, prefix: Option<&str>) -> Result<Vec<RefName>> {
        let mut names = BTreeSet::new();

        for entry in WalkDir::new(self.refs_path()) {
            let entry = match entry {
                Ok(entry) => entry,
                // pruned by a concurrent delete
                Err(e) if e.io_error().map(|io| io.kind()) == Some(std::io::ErrorKind::NotFound) => {
                    continue;
                }
                Err(e) => {
                    let path = e.path().unwrap_or(self.path.as_path()).to_path_buf();
                    return Err(Error::io(path, e.into()));
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.path) else {
                continue;
            };
            let relative = relative.to_string_lossy();
            if relative.ends_with(LOCK_SUFFIX) {
                continue;
            }
            if let Ok(name) = RefName::try_parse(relative.as_ref()) {
                names.insert(name);
            }
        }

        names.extend(self.read_packed()?.iter().map(|(name, _)| name.clone()));

        Ok(names
            .into_iter()
            .filter(|name| prefix.is_none_or(|prefix| name.as_str().starts_with(prefix)))
            .collect())
    }

    /// Every reference under `refs/` with its stored value
    pub fn references(&self, prefix: Option<&str>) -> Result<Vec<Reference>> {
        self.list(prefix)?
            .into_iter()
            .filter_map(|name| self.find(&name).transpose())
            .collect()
    }

    fn check_free(&self, name: &RefName) -> Result<()> {
        let path = self.ref_path(name);
        if path.is_dir() {
            return Err(Error::exists(format!(
                "{name} (a reference hierarchy with this name exists)"
            )));
        }
        for ancestor in path.ancestors().skip(1) {
            if ancestor == self.path {
                break;
            }
            if ancestor.is_file() {
                return Err(Error::exists(format!(
                    "{name} (reference {} is in the way)",
                    ancestor.strip_prefix(&self.path).unwrap_or(ancestor).display()
                )));
            }
        }

        let packed = self.read_packed()?;
        for (other, _) in packed.iter() {
            if other.is_ancestor_of(name) {
                return Err(Error::exists(format!("{name} (reference {other} is in the way)")));
            }
            if name.is_ancestor_of(other) {
                return Err(Error::exists(format!(
                    "{name} (a reference hierarchy with this name exists)"
                )));
            }
        }
        Ok(())
    }

    fn write_locked(mut lock: Lockfile, target: &RefTarget) -> Result<()> {
        lock.write_all(target.to_file_content().as_bytes())
            .map_err(|e| Error::io(lock.lock_path(), e))?;
        lock.commit()
    }

    /// Write a new reference; fails with `Exists` unless `force` is set
    pub fn create(
        &self,
        name: &str,
        oid: ObjectId,
        force: bool,
        log: RefLogMessage<'_>,
    ) -> Result<Reference> {
        let name = RefName::try_parse(name)?;
        self.check_free(&name)?;
        let lock = Lockfile::acquire(self.ref_path(&name))?;

        let previous = self.find(&name)?;
        if previous.is_some() && !force {
            return Err(Error::exists(format!("reference {name}")));
        }
        let old_oid = previous.as_ref().and_then(|r| r.oid().copied());

        let journal = self.open_log(&name)?;
        let target = RefTarget::Direct(oid);
        Self::write_locked(lock, &target)?;
        tracing::debug!("created reference {} -> {}", name, oid);

        Self::record(journal, old_oid.unwrap_or(ObjectId::ZERO), oid, &log)?;
        Ok(Reference::new(name, target))
    }

    /// Write a symbolic reference pointing at `target`
    pub fn create_symbolic(
        &self,
        name: &str,
        target: &str,
        force: bool,
        log: RefLogMessage<'_>,
    ) -> Result<Reference> {
        let name = RefName::try_parse(name)?;
        let target = RefName::try_parse(target)?;
        self.check_free(&name)?;
        let lock = Lockfile::acquire(self.ref_path(&name))?;

        if self.find(&name)?.is_some() && !force {
            return Err(Error::exists(format!("reference {name}")));
        }
        let old_oid = self.resolve(name.as_str()).ok().and_then(|r| r.oid().copied());
        let new_oid = self.resolve(target.as_str()).ok().and_then(|r| r.oid().copied());
        let journal = match new_oid {
            Some(_) => self.open_log(&name)?,
            None => None,
        };

        let value = RefTarget::Symbolic(target.clone());
        Self::write_locked(lock, &value)?;
        tracing::debug!("created symbolic reference {} -> {}", name, target);

        if let Some(new_oid) = new_oid {
            Self::record(journal, old_oid.unwrap_or(ObjectId::ZERO), new_oid, &log)?;
        }
        Ok(Reference::new(name, value))
    }

    /// Compare-and-swap the value of `name`
    ///
    /// `expected_old` of `None` requires the reference not to exist yet. A
    /// symbolic `name` updates the reference it finally points at and both
    /// names get a reflog record.
    pub fn update(
        &self,
        name: &str,
        new_oid: ObjectId,
        expected_old: Option<&ObjectId>,
        log: RefLogMessage<'_>,
    ) -> Result<()> {
        let requested = RefName::try_parse(name)?;
        let name = self.final_name(&requested)?;
        self.check_free(&name)?;
        let lock = Lockfile::acquire(self.ref_path(&name))?;

        let current = match self.find(&name)? {
            Some(reference) => Some(*reference.oid().ok_or_else(|| {
                Error::invalid_spec(format!("reference {name} is symbolic"))
            })?),
            None => None,
        };

        if current.as_ref() != expected_old {
            let describe = |oid: Option<&ObjectId>| {
                oid.map_or_else(|| "nothing".to_string(), ObjectId::to_hex)
            };
            return Err(Error::NotFastForward {
                name: name.to_string(),
                expected: describe(expected_old),
                actual: describe(current.as_ref()),
            });
        }

        let journal = self.open_log(&name)?;
        let requested_journal = if requested != name {
            self.open_log(&requested)?
        } else {
            None
        };

        Self::write_locked(lock, &RefTarget::Direct(new_oid))?;
        tracing::debug!("updated reference {} to {}", name, new_oid);

        let old_oid = current.unwrap_or(ObjectId::ZERO);
        Self::record(journal, old_oid, new_oid, &log)?;
        Self::record(requested_journal, old_oid, new_oid, &log)
    }

    /// Remove `name` from the loose and packed stores along with its reflog
    pub fn delete(&self, name: &str) -> Result<()> {
        let name = RefName::try_parse(name)?;
        let loose_path = self.ref_path(&name);
        let loose_lock = Lockfile::acquire(&loose_path)?;

        let has_loose = self.read_loose(&name)?.is_some();
        let mut packed = self.read_packed()?;
        let has_packed = packed.contains(&name);
        if !has_loose && !has_packed {
            return Err(Error::not_found(format!("reference {name}")));
        }

        if has_packed {
            let mut packed_lock = Lockfile::acquire(self.packed_refs_path())?;
            // reread under the lock
            packed = self.read_packed()?;
            packed.remove(&name);
            packed_lock
                .write_all(packed.serialize().as_bytes())
                .map_err(|e| Error::io(packed_lock.lock_path(), e))?;
            packed_lock.commit()?;
        }

        if has_loose {
            std::fs::remove_file(&loose_path).map_err(|e| Error::io(&loose_path, e))?;
        }
        loose_lock.rollback()?;

        let log_path = self.log_path(&name);
        match std::fs::remove_file(&log_path) {
            Ok(()) => self.prune_empty_parent_dirs(&log_path, &self.path.join(LOGS_DIR))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(&log_path, e)),
        }
        self.prune_empty_parent_dirs(&loose_path, &self.refs_path())?;

        tracing::debug!("deleted reference {}", name);
        Ok(())
    }

    /// Move every direct loose reference into `packed-refs`
    ///
    /// `peel` returns the object an annotated tag finally points at, or
    /// `None` for anything else. Loose files are removed one at a time under
    /// their own lock, and only if they still hold the packed value.
    pub fn pack_all(&self, peel: impl Fn(&ObjectId) -> Result<Option<ObjectId>>) -> Result<()> {
        let mut packed_lock = Lockfile::acquire(self.packed_refs_path())?;
        let mut packed = self.read_packed()?;

        let mut loose = Vec::new();
        for name in self.list(None)? {
            if let Some(RefTarget::Direct(oid)) = self.read_loose(&name)? {
                loose.push((name, oid));
            }
        }

        for (name, oid) in &loose {
            let peeled = match packed.get(name) {
                Some(existing) if existing.oid == *oid => existing.peeled,
                _ => peel(oid)?,
            };
            packed.insert(name.clone(), PackedRef { oid: *oid, peeled });
        }

        packed_lock
            .write_all(packed.serialize().as_bytes())
            .map_err(|e| Error::io(packed_lock.lock_path(), e))?;
        packed_lock.commit()?;

        for (name, oid) in &loose {
            let path = self.ref_path(name);
            let lock = match Lockfile::acquire(&path) {
                Ok(lock) => lock,
                // someone is updating it; the loose value stays authoritative
                Err(Error::Locked(_)) => continue,
                Err(e) => return Err(e),
            };
            if self.read_loose(name)? == Some(RefTarget::Direct(*oid)) {
                std::fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
            }
            lock.rollback()?;
            self.prune_empty_parent_dirs(&path, &self.refs_path())?;
        }

        tracing::debug!("packed {} references", loose.len());
        Ok(())
    }

    pub fn reflog_read(&self, name: &str) -> Result<Vec<ReflogEntry>> {
        let name = RefName::try_parse(name)?;
        reflog::read(&self.log_path(&name))
    }

    /// Record an update of `name` regardless of the log policy
    pub fn reflog_append(
        &self,
        name: &str,
        old_oid: ObjectId,
        new_oid: ObjectId,
        log: RefLogMessage<'_>,
    ) -> Result<()> {
        let name = RefName::try_parse(name)?;
        let entry = ReflogEntry::new(old_oid, new_oid, log.committer.clone(), log.message);
        reflog::append(&self.log_path(&name), &entry)
    }

    fn should_log(&self, name: &RefName) -> bool {
        match self.log_policy {
            LogPolicy::Never => false,
            LogPolicy::Always => true,
            LogPolicy::Default => {
                name.as_str() == HEAD_REF_NAME
                    || [HEADS_PREFIX, REMOTES_PREFIX, NOTES_PREFIX]
                        .iter()
                        .any(|prefix| name.as_str().starts_with(prefix))
                    || self.log_path(name).is_file()
            }
        }
    }

    /// Log of `name` opened ahead of the write, if the policy records it
    ///
    /// A log that cannot be opened fails the update before the reference moves.
    fn open_log(&self, name: &RefName) -> Result<Option<ReflogWriter>> {
        if !self.should_log(name) {
            return Ok(None);
        }
        ReflogWriter::open(&self.log_path(name)).map(Some)
    }

    fn record(
        journal: Option<ReflogWriter>,
        old_oid: ObjectId,
        new_oid: ObjectId,
        log: &RefLogMessage<'_>,
    ) -> Result<()> {
        let Some(mut journal) = journal else {
            return Ok(());
        };
        journal.append(&ReflogEntry::new(
            old_oid,
            new_oid,
            log.committer.clone(),
            log.message,
        ))
    }

    /// Point HEAD at the branch `target`, which need not exist yet
    pub fn set_head(&self, target: &str, log: RefLogMessage<'_>) -> Result<()> {
        let target = RefName::try_parse(target)?;
        let head = RefName::try_parse(HEAD_REF_NAME)?;
        let lock = Lockfile::acquire(self.head_path())?;

        let old_oid = self.resolve(HEAD_REF_NAME).ok().and_then(|r| r.oid().copied());
        let new_oid = self.resolve(target.as_str()).ok().and_then(|r| r.oid().copied());
        let journal = match new_oid {
            Some(_) => self.open_log(&head)?,
            None => None,
        };

        Self::write_locked(lock, &RefTarget::Symbolic(target.clone()))?;
        tracing::debug!("HEAD now points at {}", target);

        match new_oid {
            Some(new_oid) => Self::record(journal, old_oid.unwrap_or(ObjectId::ZERO), new_oid, &log),
            None => Ok(()),
        }
    }

    /// Store `oid` directly in HEAD
    pub fn set_head_detached(&self, oid: ObjectId, log: RefLogMessage<'_>) -> Result<()> {
        let head = RefName::try_parse(HEAD_REF_NAME)?;
        let lock = Lockfile::acquire(self.head_path())?;

        let old_oid = self.resolve(HEAD_REF_NAME).ok().and_then(|r| r.oid().copied());
        let journal = self.open_log(&head)?;
        Self::write_locked(lock, &RefTarget::Direct(oid))?;
        tracing::debug!("HEAD detached at {}", oid);

        Self::record(journal, old_oid.unwrap_or(ObjectId::ZERO), oid, &log)
    }

    /// Remove a lock on `name` left behind by a crashed writer
    ///
    /// Only locks older than `max_age` are taken over. Returns whether a lock
    /// was removed.
    pub fn repair_stale_lock(&self, name: &str, max_age: Duration) -> Result<bool> {
        let name = RefName::try_parse(name)?;
        Lockfile::break_stale(&self.ref_path(&name), max_age)
    }

    fn prune_empty_parent_dirs(&self, path: &Path, stop_at: &Path) -> Result<()> {
        let keep = [
            self.refs_path().join("heads"),
            self.refs_path().join("tags"),
        ];

        let mut current = path.parent();
        while let Some(parent) = current {
            if parent == stop_at || !parent.starts_with(stop_at) || keep.iter().any(|k| k == parent)
            {
                break;
            }
            let is_empty = match parent.read_dir() {
                Ok(mut entries) => entries.next().is_none(),
                Err(_) => false,
            };
            if !is_empty {
                break;
            }
            std::fs::remove_dir(parent).map_err(|e| Error::io(parent, e))?;
            current = parent.parent();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    struct Store {
        dir: TempDir,
        refs: Refs,
        committer: Signature,
    }

    impl Store {
        fn log(&self) -> RefLogMessage<'_> {
            RefLogMessage::new(&self.committer, "test")
        }
    }

    #[fixture]
    fn store() -> Store {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
        std::fs::create_dir_all(dir.path().join("refs/tags")).unwrap();
        std::fs::write(dir.path().join("HEAD"), "ref: refs/heads/master\n").unwrap();
        let refs = Refs::new(dir.path());
        let committer = Signature::new("Tester", "test@example.com", 1700000000, 0).unwrap();
        Store {
            dir,
            refs,
            committer,
        }
    }

    fn oid(n: u8) -> ObjectId {
        ObjectId::from_bytes([n; 20])
    }

    #[rstest]
    fn unborn_head_resolves_to_unborn_branch(store: Store) {
        let err = store.refs.resolve("HEAD").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnbornBranch);
        assert!(store.refs.lookup("HEAD").unwrap().is_symbolic());
    }

    #[rstest]
    fn create_refuses_to_overwrite_without_force(store: Store) {
        store.refs.create("refs/heads/main", oid(1), false, store.log()).unwrap();
        let err = store
            .refs
            .create("refs/heads/main", oid(2), false, store.log())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Exists);

        store.refs.create("refs/heads/main", oid(2), true, store.log()).unwrap();
        assert_eq!(store.refs.resolve_oid("refs/heads/main").unwrap(), oid(2));
    }

    #[rstest]
    fn update_through_head_moves_the_branch(store: Store) {
        store.refs.update("HEAD", oid(1), None, store.log()).unwrap();

        assert_eq!(store.refs.resolve_oid("refs/heads/master").unwrap(), oid(1));
        assert_eq!(store.refs.reflog_read("HEAD").unwrap().len(), 1);
        assert_eq!(store.refs.reflog_read("refs/heads/master").unwrap().len(), 1);
    }

    #[rstest]
    fn update_with_stale_expectation_is_rejected(store: Store) {
        store.refs.update("refs/heads/main", oid(1), None, store.log()).unwrap();
        let err = store
            .refs
            .update("refs/heads/main", oid(3), None, store.log())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFastForward);
        assert_eq!(store.refs.resolve_oid("refs/heads/main").unwrap(), oid(1));
    }

    #[rstest]
    fn update_fails_while_locked(store: Store) {
        let _held = Lockfile::acquire(store.dir.path().join("refs/heads/main")).unwrap();
        let err = store
            .refs
            .update("refs/heads/main", oid(1), None, store.log())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Locked);
    }

    #[rstest]
    fn stale_lock_can_be_repaired(store: Store) {
        let lock_path = store.dir.path().join("refs/heads/main.lock");
        std::fs::write(&lock_path, "").unwrap();

        assert!(!store.refs.repair_stale_lock("refs/heads/main", Duration::from_secs(3600)).unwrap());
        assert!(store.refs.repair_stale_lock("refs/heads/main", Duration::ZERO).unwrap());
        store.refs.update("refs/heads/main", oid(1), None, store.log()).unwrap();
    }

    #[rstest]
    fn tags_are_not_logged_by_default(store: Store) {
        store.refs.create("refs/tags/v1", oid(1), false, store.log()).unwrap();
        assert!(store.refs.reflog_read("refs/tags/v1").unwrap().is_empty());

        let always = Refs::new(store.dir.path()).with_log_policy(LogPolicy::Always);
        always.create("refs/tags/v2", oid(1), false, store.log()).unwrap();
        assert_eq!(always.reflog_read("refs/tags/v2").unwrap().len(), 1);
    }

    #[rstest]
    fn list_merges_loose_and_packed(store: Store) {
        store.refs.create("refs/heads/b", oid(1), false, store.log()).unwrap();
        store.refs.create("refs/tags/v1", oid(2), false, store.log()).unwrap();
        store.refs.pack_all(|_| Ok(None)).unwrap();
        store.refs.create("refs/heads/a", oid(3), false, store.log()).unwrap();
        store.refs.create("refs/heads/b", oid(4), true, store.log()).unwrap();

        let names: Vec<_> = store.refs.list(None).unwrap().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["refs/heads/a", "refs/heads/b", "refs/tags/v1"]);
        assert_eq!(store.refs.resolve_oid("refs/heads/b").unwrap(), oid(4));

        let heads = store.refs.list(Some("refs/heads/")).unwrap();
        assert_eq!(heads.len(), 2);
    }

    #[rstest]
    fn list_reports_unreadable_directories(store: Store) {
        use std::os::unix::fs::PermissionsExt;

        store.refs.create("refs/heads/team/x", oid(1), false, store.log()).unwrap();
        let team = store.dir.path().join("refs/heads/team");
        std::fs::set_permissions(&team, std::fs::Permissions::from_mode(0o000)).unwrap();
        let readable = std::fs::read_dir(&team).is_ok();

        let result = store.refs.list(None);
        std::fs::set_permissions(&team, std::fs::Permissions::from_mode(0o755)).unwrap();

        // permission bits do not bind a privileged user
        if !readable {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::Io);
        }
    }

    #[rstest]
    fn delete_removes_packed_and_loose_copies(store: Store) {
        store.refs.create("refs/heads/topic/x", oid(1), false, store.log()).unwrap();
        store.refs.pack_all(|_| Ok(None)).unwrap();
        store.refs.create("refs/heads/topic/x", oid(2), true, store.log()).unwrap();

        store.refs.delete("refs/heads/topic/x").unwrap();

        assert_eq!(
            store.refs.lookup("refs/heads/topic/x").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(!store.dir.path().join("refs/heads/topic").exists());
        assert!(store.dir.path().join("refs/heads").exists());
        assert!(!store.dir.path().join("logs/refs/heads/topic").exists());
        assert_eq!(
            store.refs.delete("refs/heads/topic/x").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[rstest]
    fn file_and_directory_names_conflict(store: Store) {
        store.refs.create("refs/heads/a", oid(1), false, store.log()).unwrap();
        let err = store
            .refs
            .create("refs/heads/a/b", oid(1), false, store.log())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Exists);
    }

    #[rstest]
    #[case("refs/heads/a", "refs/heads/a/b")]
    #[case("refs/heads/a/b", "refs/heads/a")]
    fn packed_names_block_conflicting_hierarchies(
        store: Store,
        #[case] packed: &str,
        #[case] wanted: &str,
    ) {
        store.refs.create(packed, oid(1), false, store.log()).unwrap();
        store.refs.pack_all(|_| Ok(None)).unwrap();

        let err = store.refs.create(wanted, oid(2), false, store.log()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Exists);
        let err = store.refs.update(wanted, oid(2), None, store.log()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Exists);
        assert!(!store.dir.path().join(wanted).exists());
        assert_eq!(store.refs.list(None).unwrap().len(), 1);
    }

    #[rstest]
    fn unwritable_reflog_leaves_the_reference_alone(store: Store) {
        store.refs.create("refs/heads/main", oid(1), false, store.log()).unwrap();
        let log_path = store.dir.path().join("logs/refs/heads/main");
        std::fs::remove_file(&log_path).unwrap();
        std::fs::create_dir_all(&log_path).unwrap();

        let err = store
            .refs
            .update("refs/heads/main", oid(2), Some(&oid(1)), store.log())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(store.refs.resolve_oid("refs/heads/main").unwrap(), oid(1));
        assert!(!store.dir.path().join("refs/heads/main.lock").exists());

        let err = store.refs.create("refs/heads/main", oid(3), true, store.log()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(store.refs.resolve_oid("refs/heads/main").unwrap(), oid(1));
    }

    #[rstest]
    fn set_head_and_detach(store: Store) {
        store.refs.create("refs/heads/main", oid(1), false, store.log()).unwrap();
        store.refs.set_head("refs/heads/main", store.log()).unwrap();
        assert_eq!(store.refs.resolve_oid("HEAD").unwrap(), oid(1));

        store.refs.set_head_detached(oid(2), store.log()).unwrap();
        let head = store.refs.lookup("HEAD").unwrap();
        assert_eq!(head.oid(), Some(&oid(2)));

        let log = store.refs.reflog_read("HEAD").unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!((log[1].old_oid, log[1].new_oid), (oid(1), oid(2)));
    }
}
