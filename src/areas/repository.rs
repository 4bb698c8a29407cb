//! A repository on disk
//!
//! Binds a git directory (and, unless bare, a working tree) to the object
//! database, the reference store, the index and the configuration. The index
//! and configuration are loaded on first use and cached for the lifetime of
//! the handle.

use crate::areas::config::Config;
use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::refs::{LogPolicy, RefLogMessage, Refs};
use crate::areas::workspace::Workspace;
use crate::artifacts::core::lockfile::Lockfile;
use crate::artifacts::log::rev_list::{RevWalk, Sort};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::signature::Signature;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree_builder::TreeBuilder;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::refs::reference::{RefTarget, Reference};
use crate::artifacts::refs::reflog::ReflogEntry;
use crate::artifacts::refs::ref_name::RefName;
use crate::artifacts::refs::revision::Revision;
use crate::artifacts::refs::{HEAD_REF_NAME, HEADS_PREFIX};
use crate::artifacts::status::file_change::StatusFlags;
use crate::artifacts::status::status_info::{Status, StatusInfo, StatusOptions};
use crate::errors::{Error, ErrorKind, Result};
use bytes::Bytes;
use std::cell::{OnceCell, Ref, RefCell, RefMut};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const GIT_DIR_NAME: &str = ".git";
pub const DEFAULT_BRANCH: &str = "master";
const GITDIR_PREFIX: &str = "gitdir:";
const SUPPORTED_FORMAT_VERSION: i64 = 0;

/// An object looked up by id or abbreviated id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    pub oid: ObjectId,
    pub object: ObjectBox,
}

impl ObjectHandle {
    pub fn object_type(&self) -> ObjectType {
        self.object.object_type()
    }
}

#[derive(Debug)]
pub struct Repository {
    git_dir: PathBuf,
    database: Database,
    refs: Refs,
    workspace: Option<Workspace>,
    index: OnceCell<RefCell<Index>>,
    config: OnceCell<RefCell<Config>>,
}

fn cached<T>(cell: &OnceCell<RefCell<T>>, load: impl FnOnce() -> Result<T>) -> Result<&RefCell<T>> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = load()?;
    Ok(cell.get_or_init(|| RefCell::new(value)))
}

fn is_git_dir(path: &Path) -> bool {
    path.join(HEAD_REF_NAME).is_file() && path.join("objects").is_dir() && path.join("refs").is_dir()
}

/// Follow a `.git` file of the form `gitdir: <path>`
fn read_gitdir_file(path: &Path) -> Result<PathBuf> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let target = content
        .trim_end()
        .strip_prefix(GITDIR_PREFIX)
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .ok_or_else(|| Error::corrupt(path.display().to_string(), "expected 'gitdir: <path>'"))?;

    let base = path.parent().unwrap_or(Path::new("."));
    Ok(base.join(target))
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::not_found(format!("{}", path.display())),
        _ => Error::io(path, e),
    })
}

fn log_policy(config: &Config) -> Result<LogPolicy> {
    let key = "core.logAllRefUpdates";
    if config
        .get_str(key)
        .ok()
        .flatten()
        .is_some_and(|value| value.eq_ignore_ascii_case("always"))
    {
        return Ok(LogPolicy::Always);
    }
    Ok(match config.get_bool(key)? {
        Some(false) => LogPolicy::Never,
        _ => LogPolicy::Default,
    })
}

impl Repository {
    /// Create an empty repository at `path`
    ///
    /// A bare repository uses `path` itself as the git directory, otherwise
    /// `path/.git` is created. HEAD points at the unborn `master` branch.
    pub fn init(path: impl AsRef<Path>, bare: bool) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;
        let path = canonicalize(path)?;
        let git_dir = if bare { path.clone() } else { path.join(GIT_DIR_NAME) };

        if git_dir.join(HEAD_REF_NAME).exists() {
            return Err(Error::exists(format!("repository at {}", git_dir.display())));
        }

        for dir in ["objects/info", "objects/pack", "refs/heads", "refs/tags", "info"] {
            let dir = git_dir.join(dir);
            std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }

        let mut config = Config::new(git_dir.join("config"));
        config.set_int("core.repositoryformatversion", SUPPORTED_FORMAT_VERSION)?;
        config.set_bool("core.filemode", true)?;
        config.set_bool("core.bare", bare)?;
        if !bare {
            config.set_bool("core.logallrefupdates", true)?;
        }
        config.write()?;

        let head = RefTarget::Symbolic(RefName::branch(DEFAULT_BRANCH)?);
        let mut lock = Lockfile::acquire(git_dir.join(HEAD_REF_NAME))?;
        lock.write_all(head.to_file_content().as_bytes())
            .map_err(|e| Error::io(lock.lock_path(), e))?;
        lock.commit()?;

        tracing::debug!("initialized {} repository in {:?}", if bare { "bare" } else { "empty" }, git_dir);
        Self::open_git_dir(git_dir, (!bare).then_some(path))
    }

    /// Open the repository whose working tree or git directory is `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = canonicalize(path.as_ref())?;
        let dot_git = path.join(GIT_DIR_NAME);

        if dot_git.is_dir() {
            return Self::open_git_dir(dot_git, Some(path));
        }
        if dot_git.is_file() {
            let git_dir = canonicalize(&read_gitdir_file(&dot_git)?)?;
            return Self::open_git_dir(git_dir, Some(path));
        }
        if is_git_dir(&path) {
            let workdir = match path.file_name() {
                Some(name) if name == GIT_DIR_NAME => path.parent().map(Path::to_path_buf),
                _ => None,
            };
            return Self::open_git_dir(path, workdir);
        }

        Err(Error::not_found(format!("git repository at {}", path.display())))
    }

    /// Open the repository containing `start`, looking upwards
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let start = canonicalize(start.as_ref())?;
        for dir in start.ancestors() {
            if dir.join(GIT_DIR_NAME).exists() || is_git_dir(dir) {
                tracing::trace!("discovered repository at {:?}", dir);
                return Self::open(dir);
            }
        }
        Err(Error::not_found(format!(
            "git repository in {} or any parent",
            start.display()
        )))
    }

    fn open_git_dir(git_dir: PathBuf, workdir: Option<PathBuf>) -> Result<Self> {
        if !is_git_dir(&git_dir) {
            return Err(Error::not_found(format!("git repository at {}", git_dir.display())));
        }

        let config = Config::load(git_dir.join("config"))?;
        let version = config.get_int("core.repositoryformatversion")?.unwrap_or(0);
        if version != SUPPORTED_FORMAT_VERSION {
            return Err(Error::invalid_spec(format!(
                "unsupported repository format version {version}"
            )));
        }

        let bare = config.get_bool("core.bare")?.unwrap_or(workdir.is_none());
        let workspace = if bare { None } else { workdir.map(Workspace::new) };
        let refs = Refs::new(&git_dir).with_log_policy(log_policy(&config)?);

        Ok(Repository {
            database: Database::new(git_dir.join("objects")),
            refs,
            workspace,
            index: OnceCell::new(),
            config: OnceCell::from(RefCell::new(config)),
            git_dir,
        })
    }

    /// The git directory
    pub fn path(&self) -> &Path {
        &self.git_dir
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.workspace.as_ref().map(Workspace::path)
    }

    pub fn is_bare(&self) -> bool {
        self.workspace.is_none()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn workspace(&self) -> Result<&Workspace> {
        self.workspace
            .as_ref()
            .ok_or_else(|| Error::BareRepo(self.git_dir.display().to_string()))
    }

    fn index_cell(&self) -> Result<&RefCell<Index>> {
        self.workspace()?;
        cached(&self.index, || Index::open(self.git_dir.join("index")))
    }

    /// The staging area, read from disk on first use
    pub fn index(&self) -> Result<RefMut<'_, Index>> {
        let cell = self.index_cell()?;
        cell.try_borrow_mut()
            .map_err(|_| Error::Locked(self.git_dir.join("index")))
    }

    fn config_cell(&self) -> Result<&RefCell<Config>> {
        cached(&self.config, || Config::load(self.git_dir.join("config")))
    }

    pub fn config(&self) -> Result<Ref<'_, Config>> {
        self.config_cell()?
            .try_borrow()
            .map_err(|_| Error::Locked(self.git_dir.join("config")))
    }

    pub fn config_mut(&self) -> Result<RefMut<'_, Config>> {
        self.config_cell()?
            .try_borrow_mut()
            .map_err(|_| Error::Locked(self.git_dir.join("config")))
    }

    /// Identity for new commits, tags and reflog records
    ///
    /// `user.name` and `user.email` from the configuration, falling back to
    /// `GIT_AUTHOR_*` and then `GIT_COMMITTER_*` in the environment.
    pub fn default_signature(&self) -> Result<Signature> {
        {
            let config = self.config()?;
            if let (Some(name), Some(email)) =
                (config.get_str("user.name")?, config.get_str("user.email")?)
            {
                return Signature::now(name, email);
            }
        }
        for role in ["AUTHOR", "COMMITTER"] {
            if let Some(signature) = Signature::load_from_env(role)? {
                return Ok(signature);
            }
        }
        Err(Error::not_found("user.name and user.email are not configured"))
    }

    /// HEAD resolved to the direct reference it finally names
    pub fn head(&self) -> Result<Reference> {
        self.refs.resolve(HEAD_REF_NAME)
    }

    /// The commit HEAD points at, `None` on an unborn branch
    pub fn head_oid(&self) -> Result<Option<ObjectId>> {
        match self.refs.resolve_oid(HEAD_REF_NAME) {
            Ok(oid) => Ok(Some(oid)),
            Err(e) if e.kind() == ErrorKind::UnbornBranch => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn is_head_unborn(&self) -> Result<bool> {
        Ok(self.head_oid()?.is_none())
    }

    pub fn is_head_detached(&self) -> Result<bool> {
        Ok(!self.refs.lookup(HEAD_REF_NAME)?.is_symbolic())
    }

    fn head_tree(&self) -> Result<Option<ObjectId>> {
        self.head_oid()?
            .map(|oid| self.database.peel(&oid, Some(ObjectType::Tree)))
            .transpose()
    }

    /// Read the object named by a full or abbreviated id
    ///
    /// With `kind`, an object of another kind is an `InvalidSpec` error.
    pub fn lookup_object(&self, oid_or_prefix: &str, kind: Option<ObjectType>) -> Result<ObjectHandle> {
        let oid = if oid_or_prefix.len() == OBJECT_ID_LENGTH {
            ObjectId::try_parse(oid_or_prefix)?
        } else {
            self.database.exists_prefix(oid_or_prefix)?
        };

        let object = self.database.parse_object(&oid)?;
        if let Some(kind) = kind
            && object.object_type() != kind
        {
            return Err(Error::invalid_spec(format!(
                "{} is a {}, not a {kind}",
                oid.to_short_oid(),
                object.object_type()
            )));
        }
        Ok(ObjectHandle { oid, object })
    }

    /// Evaluate a revision expression such as `main~2` or `v1.0^{tree}`
    pub fn revparse_single(&self, spec: &str) -> Result<ObjectId> {
        Revision::try_parse(spec)?.resolve(&self.refs, &self.database)
    }

    pub fn peel(&self, oid: &ObjectId, kind: Option<ObjectType>) -> Result<ObjectId> {
        self.database.peel(oid, kind)
    }

    /// A walker with no start points
    pub fn walker(&self) -> RevWalk<'_> {
        RevWalk::new(&self.database, &self.refs)
    }

    /// A walker over `from` and its ancestry
    pub fn walk(&self, from: &ObjectId, sort: Sort) -> Result<RevWalk<'_>> {
        let mut walk = self.walker();
        walk.sort(sort)?;
        walk.push(from)?;
        Ok(walk)
    }

    pub fn create_blob(&self, data: &[u8]) -> Result<ObjectId> {
        self.database.write(ObjectType::Blob, data)
    }

    /// Store the working tree file at `path` as a blob
    pub fn create_blob_from_workdir(&self, path: &[u8]) -> Result<ObjectId> {
        let blob: Blob = self.workspace()?.parse_blob(path)?;
        self.database.write(ObjectType::Blob, blob.content())
    }

    /// A builder seeded with the entries of `base`, or empty
    pub fn create_tree_builder(&self, base: Option<&ObjectId>) -> Result<TreeBuilder> {
        match base {
            Some(oid) => Ok(TreeBuilder::from_tree(&self.database.parse_object_as_tree(oid)?)),
            None => Ok(TreeBuilder::new()),
        }
    }

    fn expect_kind(&self, oid: &ObjectId, kind: ObjectType) -> Result<()> {
        let (actual, _) = self.database.read_header(oid)?;
        if actual != kind {
            return Err(Error::invalid_spec(format!(
                "{} is a {actual}, not a {kind}",
                oid.to_short_oid()
            )));
        }
        Ok(())
    }

    /// Write a commit and optionally move `update_ref` to it
    ///
    /// The reference must currently point at the first parent (or not exist
    /// for a root commit); otherwise `NotFastForward` is returned and the
    /// commit object is left unreferenced.
    pub fn create_commit(
        &self,
        update_ref: Option<&str>,
        author: &Signature,
        committer: &Signature,
        message: impl Into<Bytes>,
        tree: &ObjectId,
        parents: &[ObjectId],
    ) -> Result<ObjectId> {
        self.expect_kind(tree, ObjectType::Tree)?;
        for parent in parents {
            self.expect_kind(parent, ObjectType::Commit)?;
        }

        let commit = Commit::new(*tree, parents.to_vec(), author.clone(), committer.clone(), message);
        let oid = self.database.store(&commit)?;

        if let Some(name) = update_ref {
            let kind = match parents.len() {
                0 => "commit (initial)",
                1 => "commit",
                _ => "commit (merge)",
            };
            let message = format!("{kind}: {}", String::from_utf8_lossy(commit.short_message()));
            self.refs.update(name, oid, parents.first(), RefLogMessage::new(committer, &message))?;
        }
        Ok(oid)
    }

    /// Write an annotated tag object and `refs/tags/<name>` pointing at it
    pub fn create_tag(
        &self,
        name: &str,
        target: &ObjectId,
        tagger: &Signature,
        message: impl Into<Bytes>,
        force: bool,
    ) -> Result<ObjectId> {
        let ref_name = RefName::tag(name)?;
        if !force && self.refs.lookup(ref_name.as_str()).is_ok() {
            return Err(Error::exists(format!("tag {name}")));
        }

        let (kind, _) = self.database.read_header(target)?;
        let tag = Tag::new(*target, kind, name, Some(tagger.clone()), message)?;
        let oid = self.database.store(&tag)?;

        let log = format!("tag: {name}");
        self.refs
            .create(ref_name.as_str(), oid, force, RefLogMessage::new(tagger, &log))?;
        Ok(oid)
    }

    /// `refs/tags/<name>` pointing straight at `target`
    pub fn create_lightweight_tag(&self, name: &str, target: &ObjectId, force: bool) -> Result<Reference> {
        let ref_name = RefName::tag(name)?;
        self.database.read_header(target)?;
        let signature = self.default_signature()?;
        self.refs.create(
            ref_name.as_str(),
            *target,
            force,
            RefLogMessage::new(&signature, &format!("tag: {name}")),
        )
    }

    pub fn find_reference(&self, name: &str) -> Result<Reference> {
        self.refs.lookup(name)
    }

    pub fn resolve_reference(&self, name: &str) -> Result<Reference> {
        self.refs.resolve(name)
    }

    pub fn references(&self, prefix: Option<&str>) -> Result<Vec<Reference>> {
        self.refs.references(prefix)
    }

    /// Branch names without the `refs/heads/` prefix
    pub fn branches(&self) -> Result<Vec<String>> {
        Ok(self
            .refs
            .list(Some(HEADS_PREFIX))?
            .iter()
            .map(|name| name.shorthand().to_string())
            .collect())
    }

    pub fn create_reference(&self, name: &str, oid: &ObjectId, force: bool, message: &str) -> Result<Reference> {
        self.database.read_header(oid)?;
        let signature = self.default_signature()?;
        self.refs
            .create(name, *oid, force, RefLogMessage::new(&signature, message))
    }

    pub fn create_symbolic_reference(
        &self,
        name: &str,
        target: &str,
        force: bool,
        message: &str,
    ) -> Result<Reference> {
        let signature = self.default_signature()?;
        self.refs
            .create_symbolic(name, target, force, RefLogMessage::new(&signature, message))
    }

    /// Compare-and-swap `name` from `expected_old` to `new_oid`
    pub fn update_reference(
        &self,
        name: &str,
        new_oid: &ObjectId,
        expected_old: Option<&ObjectId>,
        message: &str,
    ) -> Result<()> {
        self.database.read_header(new_oid)?;
        let signature = self.default_signature()?;
        self.refs.update(
            name,
            *new_oid,
            expected_old,
            RefLogMessage::new(&signature, message),
        )
    }

    pub fn delete_reference(&self, name: &str) -> Result<()> {
        self.refs.delete(name)
    }

    /// Move every loose reference into `packed-refs`, recording peeled tags
    pub fn pack_refs(&self) -> Result<()> {
        self.refs.pack_all(|oid| {
            let (kind, _) = self.database.read_header(oid)?;
            if kind != ObjectType::Tag {
                return Ok(None);
            }
            self.database.peel(oid, None).map(Some)
        })
    }

    pub fn reflog(&self, name: &str) -> Result<Vec<ReflogEntry>> {
        self.refs.reflog_read(name)
    }

    pub fn set_head(&self, target: &str) -> Result<()> {
        let signature = self.default_signature()?;
        let message = format!("checkout: moving to {target}");
        self.refs
            .set_head(target, RefLogMessage::new(&signature, &message))
    }

    pub fn set_head_detached(&self, oid: &ObjectId) -> Result<()> {
        self.database.read_header(oid)?;
        let signature = self.default_signature()?;
        let message = format!("checkout: moving to {oid}");
        self.refs
            .set_head_detached(*oid, RefLogMessage::new(&signature, &message))
    }

    /// Status of every path that is not current, with default options
    pub fn status(&self) -> Result<StatusInfo> {
        self.status_with_options(StatusOptions::default())
    }

    /// Refreshed stat information of clean entries is written back to the index
    pub fn status_with_options(&self, options: StatusOptions) -> Result<StatusInfo> {
        let workspace = self.workspace()?;
        let head_tree = self.head_tree()?;
        let mut index = self.index()?;

        let info = Status::new(&self.database, workspace)
            .with_exclude_file(self.git_dir.join("info").join("exclude"))
            .with_options(options)
            .initialize(&mut index, head_tree.as_ref())?;

        if index.is_changed() {
            index.write()?;
        }
        Ok(info)
    }

    pub fn status_file(&self, path: &str) -> Result<StatusFlags> {
        let workspace = self.workspace()?;
        let head_tree = self.head_tree()?;
        let index = self.index()?;

        Status::new(&self.database, workspace)
            .with_exclude_file(self.git_dir.join("info").join("exclude"))
            .file(&index, head_tree.as_ref(), path.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn signature() -> Signature {
        Signature::new("A U Thor", "author@example.com", 1_700_000_000, 0).unwrap()
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn init_then_open(#[case] bare: bool) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path(), bare).unwrap();
        assert_eq!(repo.is_bare(), bare);
        assert_eq!(repo.head().unwrap_err().kind(), ErrorKind::UnbornBranch);
        assert!(repo.is_head_unborn().unwrap());

        let reopened = Repository::open(dir.path()).unwrap();
        assert_eq!(reopened.path(), repo.path());
        assert_eq!(reopened.workdir(), repo.workdir());
    }

    #[test]
    fn init_twice_is_refused() {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path(), false).unwrap();
        assert_eq!(
            Repository::init(dir.path(), false).unwrap_err().kind(),
            ErrorKind::Exists
        );
    }

    #[test]
    fn discover_walks_upwards_and_follows_gitdir_files() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.child("real").path(), true).unwrap();

        dir.child("work/.git")
            .write_str(&format!("gitdir: {}\n", repo.path().display()))
            .unwrap();
        dir.child("work/sub/deeper").create_dir_all().unwrap();

        let found = Repository::discover(dir.child("work/sub/deeper").path()).unwrap();
        assert_eq!(found.path(), repo.path());
        assert!(found.workdir().is_none());
    }

    #[test]
    fn newer_format_versions_are_refused() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path(), true).unwrap();
        {
            let mut config = repo.config_mut().unwrap();
            config.set_int("core.repositoryformatversion", 1).unwrap();
            config.write().unwrap();
        }
        assert_eq!(Repository::open(dir.path()).unwrap_err().kind(), ErrorKind::InvalidSpec);
    }

    #[test]
    fn bare_repositories_have_no_index() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path(), true).unwrap();
        assert_eq!(repo.index().unwrap_err().kind(), ErrorKind::BareRepo);
        assert_eq!(repo.status().unwrap_err().kind(), ErrorKind::BareRepo);
    }

    #[test]
    fn commit_moves_the_current_branch() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path(), true).unwrap();
        let tree = repo.create_tree_builder(None).unwrap().write(repo.database()).unwrap();

        let root = repo
            .create_commit(Some("HEAD"), &signature(), &signature(), "root\n", &tree, &[])
            .unwrap();
        assert_eq!(repo.head().unwrap().oid(), Some(&root));

        // a stale parent loses the race
        let child = repo
            .create_commit(Some("HEAD"), &signature(), &signature(), "child\n", &tree, &[root])
            .unwrap();
        let err = repo
            .create_commit(Some("HEAD"), &signature(), &signature(), "again\n", &tree, &[root])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFastForward);
        assert_eq!(repo.revparse_single("master").unwrap(), child);
        assert_eq!(repo.revparse_single("HEAD~1").unwrap(), root);
    }

    #[test]
    fn commits_need_a_tree_and_commit_parents() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path(), true).unwrap();
        let blob = repo.create_blob(b"data").unwrap();

        let err = repo
            .create_commit(None, &signature(), &signature(), "m", &blob, &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSpec);
    }

    #[test]
    fn lookup_by_prefix_with_kind() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path(), true).unwrap();
        let oid = repo.create_blob(b"hello\n").unwrap();

        let found = repo.lookup_object(&oid.to_hex()[..7], None).unwrap();
        assert_eq!(found.oid, oid);
        assert_eq!(found.object_type(), ObjectType::Blob);
        assert_eq!(
            repo.lookup_object(&oid.to_hex(), Some(ObjectType::Tree)).unwrap_err().kind(),
            ErrorKind::InvalidSpec
        );
    }
}
