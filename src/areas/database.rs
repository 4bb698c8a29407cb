//! Object database
//!
//! Binds the loose and pack backends under `objects/` and fronts them with an
//! in-memory cache. Packs are discovered on first use and rediscovered when a
//! lookup misses and the pack directory has changed since.

use crate::artifacts::core::temp_name;
use crate::artifacts::database::cache::ObjectCache;
use crate::artifacts::database::loose::{LooseStore, ObjectWriter};
use crate::artifacts::database::pack::Pack;
use crate::artifacts::database::pack_writer::PackWriter;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::{Commit, SlimCommit};
use crate::artifacts::objects::object::{hash_object, Object, ObjectBox, RawObject};
use crate::artifacts::objects::object_id::{ObjectId, ObjectIdPrefix};
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::errors::{Error, Result};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Shortest abbreviation accepted by prefix lookups
pub const MIN_PREFIX_LENGTH: usize = 4;

/// How many candidates an ambiguous lookup reports at most
const MAX_AMBIGUOUS_CANDIDATES: usize = 16;

#[derive(Debug, Default)]
struct PackSet {
    packs: Vec<Pack>,
    loaded: bool,
    dir_mtime: Option<SystemTime>,
}

#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    loose: LooseStore,
    packs: RefCell<PackSet>,
    cache: RefCell<ObjectCache>,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Database {
            loose: LooseStore::new(&path),
            path,
            packs: RefCell::new(PackSet::default()),
            cache: RefCell::new(ObjectCache::default()),
        }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    pub fn pack_dir(&self) -> PathBuf {
        self.path.join("pack")
    }

    fn pack_dir_mtime(&self) -> Option<SystemTime> {
        std::fs::metadata(self.pack_dir())
            .and_then(|metadata| metadata.modified())
            .ok()
    }

    fn load_packs(&self) -> Result<Vec<Pack>> {
        let pack_dir = self.pack_dir();
        let entries = match std::fs::read_dir(&pack_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&pack_dir, e)),
        };

        let mut pack_paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::io(&pack_dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "pack") {
                pack_paths.push(path);
            }
        }
        pack_paths.sort();

        let mut packs = Vec::with_capacity(pack_paths.len());
        for path in pack_paths {
            match Pack::open(&path) {
                Ok(pack) => packs.push(pack),
                Err(e) => tracing::warn!("skipping unreadable pack {:?}: {}", path, e),
            }
        }
        tracing::debug!("discovered {} packs in {:?}", packs.len(), pack_dir);
        Ok(packs)
    }

    /// Load packs on first use; afterwards reload only when the directory changed
    ///
    /// Returns whether the set of packs was (re)loaded.
    fn refresh_packs(&self, force: bool) -> Result<bool> {
        let mtime = self.pack_dir_mtime();
        {
            let set = self.packs.borrow();
            if set.loaded && !force && set.dir_mtime == mtime {
                return Ok(false);
            }
        }

        let packs = self.load_packs()?;
        let mut set = self.packs.borrow_mut();
        set.packs = packs;
        set.loaded = true;
        set.dir_mtime = mtime;
        Ok(true)
    }

    fn ensure_packs(&self) -> Result<()> {
        if !self.packs.borrow().loaded {
            self.refresh_packs(true)?;
        }
        Ok(())
    }

    /// Run `lookup`, retrying once after a pack rescan if it found nothing
    fn with_rescan<T>(&self, lookup: impl Fn(&Self) -> Result<Option<T>>) -> Result<Option<T>> {
        self.ensure_packs()?;
        if let Some(found) = lookup(self)? {
            return Ok(Some(found));
        }
        if self.refresh_packs(false)? {
            return lookup(self);
        }
        Ok(None)
    }

    pub fn exists(&self, oid: &ObjectId) -> Result<bool> {
        if self.cache.borrow().get(oid).is_some() {
            return Ok(true);
        }
        let found = self.with_rescan(|db| {
            let in_pack = db.packs.borrow().packs.iter().any(|pack| pack.contains(oid));
            Ok((in_pack || db.loose.exists(oid)).then_some(()))
        })?;
        Ok(found.is_some())
    }

    /// Expand an abbreviated object name to the single object it denotes
    pub fn exists_prefix(&self, prefix: &str) -> Result<ObjectId> {
        if prefix.len() < MIN_PREFIX_LENGTH {
            return Err(Error::invalid_spec(format!(
                "object prefix {prefix:?} is shorter than {MIN_PREFIX_LENGTH} characters"
            )));
        }
        let prefix = ObjectIdPrefix::try_parse(prefix)?;

        if prefix.len() == OBJECT_ID_LENGTH {
            let oid = prefix.min_oid();
            return match self.exists(&oid)? {
                true => Ok(oid),
                false => Err(Error::not_found(format!("object {oid}"))),
            };
        }

        let candidates = self
            .with_rescan(|db| {
                let candidates = db.prefix_candidates(&prefix)?;
                Ok((!candidates.is_empty()).then_some(candidates))
            })?
            .unwrap_or_default();

        let mut candidates = candidates.into_iter();
        match (candidates.next(), candidates.len()) {
            (None, _) => Err(Error::not_found(format!("object {prefix}"))),
            (Some(oid), 0) => Ok(oid),
            (Some(first), _) => Err(Error::Ambiguous {
                prefix: prefix.to_hex(),
                candidates: std::iter::once(first).chain(candidates).collect(),
            }),
        }
    }

    fn prefix_candidates(&self, prefix: &ObjectIdPrefix) -> Result<BTreeSet<ObjectId>> {
        let mut candidates = BTreeSet::new();
        for pack in &self.packs.borrow().packs {
            candidates.extend(pack.matching(prefix, MAX_AMBIGUOUS_CANDIDATES)?);
        }
        candidates.extend(self.loose.matching(prefix, MAX_AMBIGUOUS_CANDIDATES)?);
        Ok(candidates)
    }

    fn read_uncached(&self, oid: &ObjectId) -> Result<Option<RawObject>> {
        for pack in &self.packs.borrow().packs {
            if let Some(raw) = pack.read(oid)? {
                return Ok(Some(raw));
            }
        }
        self.loose.read(oid)
    }

    /// Read an object's kind and payload
    pub fn read(&self, oid: &ObjectId) -> Result<RawObject> {
        if let Some(raw) = self.cache.borrow().get(oid) {
            return Ok(raw);
        }

        let raw = self
            .with_rescan(|db| db.read_uncached(oid))?
            .ok_or_else(|| Error::not_found(format!("object {oid}")))?;
        self.cache.borrow_mut().insert(*oid, &raw);
        Ok(raw)
    }

    /// Read an object's kind and size without reconstructing it
    pub fn read_header(&self, oid: &ObjectId) -> Result<(ObjectType, u64)> {
        if let Some(raw) = self.cache.borrow().get(oid) {
            return Ok((raw.kind, raw.len() as u64));
        }

        self.with_rescan(|db| {
            for pack in &db.packs.borrow().packs {
                if let Some(header) = pack.read_header(oid)? {
                    return Ok(Some(header));
                }
            }
            db.loose.read_header(oid)
        })?
        .ok_or_else(|| Error::not_found(format!("object {oid}")))
    }

    /// Store a payload of the given kind, returning its object id
    pub fn write(&self, kind: ObjectType, data: &[u8]) -> Result<ObjectId> {
        let oid = hash_object(kind, data);
        if self.exists(&oid)? {
            return Ok(oid);
        }

        let written = self.loose.write(&RawObject::new(kind, data.to_vec()))?;
        tracing::debug!("stored {} {}", kind, written);
        Ok(written)
    }

    pub fn store(&self, object: &impl Object) -> Result<ObjectId> {
        let payload = object.serialize()?;
        self.write(object.object_type(), &payload)
    }

    /// Stream an object of `size` payload bytes into the database
    pub fn open_write_stream(&self, kind: ObjectType, size: u64) -> Result<ObjectWriter> {
        self.loose.open_writer(kind, size)
    }

    pub fn parse_object(&self, oid: &ObjectId) -> Result<ObjectBox> {
        ObjectBox::parse(self.read(oid)?)
    }

    pub fn parse_object_as_blob(&self, oid: &ObjectId) -> Result<Blob> {
        self.parse_object(oid)?.into_blob()
    }

    pub fn parse_object_as_tree(&self, oid: &ObjectId) -> Result<Tree> {
        self.parse_object(oid)?.into_tree()
    }

    pub fn parse_object_as_commit(&self, oid: &ObjectId) -> Result<Commit> {
        self.parse_object(oid)?.into_commit()
    }

    pub fn parse_object_as_tag(&self, oid: &ObjectId) -> Result<Tag> {
        self.parse_object(oid)?.into_tag()
    }

    pub fn load_slim_commit(&self, oid: &ObjectId) -> Result<SlimCommit> {
        Ok(self.parse_object_as_commit(oid)?.to_slim(*oid))
    }

    /// Follow tags (and a commit to its tree) until an object of `kind` is reached
    ///
    /// With `kind` of `None` only tags are stripped.
    pub fn peel(&self, oid: &ObjectId, kind: Option<ObjectType>) -> Result<ObjectId> {
        let mut current = *oid;
        loop {
            let (actual, _) = self.read_header(&current)?;
            match (actual, kind) {
                (actual, Some(wanted)) if actual == wanted => return Ok(current),
                (ObjectType::Tag, _) => current = *self.parse_object_as_tag(&current)?.target(),
                (_, None) => return Ok(current),
                (ObjectType::Commit, Some(ObjectType::Tree)) => {
                    current = *self.parse_object_as_commit(&current)?.tree_oid();
                }
                (actual, Some(wanted)) => {
                    return Err(Error::invalid_spec(format!(
                        "object {} is a {actual} and cannot be peeled to a {wanted}",
                        current.to_short_oid()
                    )));
                }
            }
        }
    }

    /// Write the given objects into a new pack under `objects/pack`
    ///
    /// Returns the path of the `.pack` file. The `.idx` is renamed into place
    /// after the pack so readers never see an index without its pack.
    pub fn write_pack(&self, oids: &[ObjectId], writer: PackWriter) -> Result<PathBuf> {
        let objects = oids
            .iter()
            .map(|oid| self.read(oid))
            .collect::<Result<Vec<_>>>()?;
        let written = writer.write(&objects)?;

        let pack_dir = self.pack_dir();
        std::fs::create_dir_all(&pack_dir).map_err(|e| Error::io(&pack_dir, e))?;
        let pack_path = pack_dir.join(format!("pack-{}.pack", written.checksum));
        let index_path = pack_path.with_extension("idx");

        for (path, data) in [(&pack_path, &written.pack), (&index_path, &written.index)] {
            let temp_path = pack_dir.join(temp_name("tmp-pack"));
            std::fs::write(&temp_path, data).map_err(|e| Error::io(&temp_path, e))?;
            std::fs::File::open(&temp_path)
                .and_then(|file| file.sync_all())
                .map_err(|e| Error::io(&temp_path, e))?;
            std::fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;
        }

        tracing::debug!("wrote pack {:?} with {} objects", pack_path, objects.len());
        self.refresh_packs(true)?;
        Ok(pack_path)
    }

    /// Verify every pack currently known to the database
    pub fn verify_packs(&self) -> Result<()> {
        self.refresh_packs(false)?;
        for pack in &self.packs.borrow().packs {
            pack.verify()?;
        }
        Ok(())
    }

    pub fn pack_count(&self) -> Result<usize> {
        self.ensure_packs()?;
        Ok(self.packs.borrow().packs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::database::pack_writer::DeltaBase;
    use crate::errors::ErrorKind;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn database() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let database = Database::new(dir.path().join("objects"));
        (dir, database)
    }

    #[rstest]
    fn round_trips_written_objects(database: (TempDir, Database)) {
        let (_dir, database) = database;
        let oid = database.write(ObjectType::Blob, b"hello\n").unwrap();

        assert_eq!(oid.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
        assert!(database.exists(&oid).unwrap());
        assert_eq!(database.read(&oid).unwrap(), RawObject::new(ObjectType::Blob, "hello\n"));
        assert_eq!(database.read_header(&oid).unwrap(), (ObjectType::Blob, 6));
    }

    #[rstest]
    fn rewriting_an_object_is_idempotent(database: (TempDir, Database)) {
        let (_dir, database) = database;
        let first = database.write(ObjectType::Blob, b"same").unwrap();
        let second = database.write(ObjectType::Blob, b"same").unwrap();
        assert_eq!(first, second);
    }

    #[rstest]
    fn prefix_lookup_rejects_short_and_missing_prefixes(database: (TempDir, Database)) {
        let (_dir, database) = database;
        database.write(ObjectType::Blob, b"hello\n").unwrap();

        assert_eq!(database.exists_prefix("ce0").unwrap_err().kind(), ErrorKind::InvalidSpec);
        assert_eq!(database.exists_prefix("ffff").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            database.exists_prefix("ce01").unwrap().to_hex(),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
    }

    #[rstest]
    fn packed_objects_are_found_after_loose_files_are_gone(database: (TempDir, Database)) {
        let (_dir, database) = database;
        let base = "content\n".repeat(100);
        let oids: Vec<_> = (0..3)
            .map(|i| database.write(ObjectType::Blob, format!("{base}{i}").as_bytes()).unwrap())
            .collect();

        database
            .write_pack(&oids, PackWriter::with_deltas(DeltaBase::Offset))
            .unwrap();
        for oid in &oids {
            std::fs::remove_file(database.objects_path().join(oid.to_path())).unwrap();
        }

        let fresh = Database::new(database.objects_path());
        assert_eq!(fresh.pack_count().unwrap(), 1);
        for (i, oid) in oids.iter().enumerate() {
            let raw = fresh.read(oid).unwrap();
            assert_eq!(raw.data, format!("{base}{i}").into_bytes());
            assert_eq!(fresh.read_header(oid).unwrap().1, raw.len() as u64);
        }
        fresh.verify_packs().unwrap();
    }

    #[rstest]
    fn typed_accessor_rejects_other_kinds(database: (TempDir, Database)) {
        let (_dir, database) = database;
        let oid = database.write(ObjectType::Blob, b"x").unwrap();
        assert_eq!(
            database.parse_object_as_commit(&oid).unwrap_err().kind(),
            ErrorKind::InvalidSpec
        );
    }
    #[rstest]
    fn peel_follows_tags_and_commits(database: (TempDir, Database)) {
        let (_dir, database) = database;
        let tree = database.store(&Tree::empty()).unwrap();
        let who = crate::artifacts::objects::signature::Signature::new("A", "a@x", 1700000000, 0).unwrap();
        let commit = database
            .store(&Commit::new(tree, vec![], who.clone(), who.clone(), "root\n"))
            .unwrap();
        let tag = database
            .store(&Tag::new(commit, ObjectType::Commit, "v1", Some(who), "release\n").unwrap())
            .unwrap();

        assert_eq!(database.peel(&tag, None).unwrap(), commit);
        assert_eq!(database.peel(&tag, Some(ObjectType::Commit)).unwrap(), commit);
        assert_eq!(database.peel(&tag, Some(ObjectType::Tree)).unwrap(), tree);
        assert_eq!(database.peel(&tag, Some(ObjectType::Tag)).unwrap(), tag);
        assert_eq!(
            database.peel(&tree, Some(ObjectType::Commit)).unwrap_err().kind(),
            ErrorKind::InvalidSpec
        );
    }
}
