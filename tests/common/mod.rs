#![allow(dead_code)]

use assert_fs::TempDir;
use assert_fs::fixture::{FileWriteStr, PathChild};
use bit_core::{ObjectId, Repository, Signature};
use fake::Fake;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const EPOCH: i64 = 1_700_000_000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A random identity stamped `offset` seconds after `EPOCH`
pub fn signature_at(offset: i64) -> Signature {
    let name: String = Name().fake();
    let email: String = SafeEmail().fake();
    Signature::new(name, email, EPOCH + offset, 0).expect("generated identity is valid")
}

pub struct TestRepo {
    pub dir: TempDir,
    pub repo: Repository,
}

impl TestRepo {
    pub fn new(bare: bool) -> Self {
        init_tracing();
        let dir = TempDir::new().expect("temp dir");
        let repo = Repository::init(dir.path(), bare).expect("init repository");
        TestRepo { dir, repo }
    }

    pub fn with_identity(bare: bool) -> Self {
        let test = Self::new(bare);
        {
            let mut config = test.repo.config_mut().expect("config");
            config.set_str("user.name", "Test User").expect("set name");
            config.set_str("user.email", "test@example.com").expect("set email");
            config.write().expect("write config");
        }
        test
    }

    pub fn write_file(&self, path: &str, content: &str) {
        self.dir.child(path).write_str(content).expect("write file");
    }

    pub fn stage(&self, path: &str) -> ObjectId {
        let mut index = self.repo.index().expect("index");
        let oid = index
            .add_by_path(
                self.repo.workspace().expect("workspace"),
                self.repo.database(),
                path.as_bytes(),
            )
            .expect("stage file");
        index.write().expect("write index");
        oid
    }

    /// Commit the index on top of HEAD, `time` seconds after `EPOCH`
    pub fn commit(&self, message: &str, time: i64) -> ObjectId {
        let tree = self
            .repo
            .index()
            .expect("index")
            .write_tree(self.repo.database())
            .expect("write tree");
        let parents: Vec<ObjectId> = self.repo.head_oid().expect("head").into_iter().collect();
        let signature = signature_at(time);
        self.repo
            .create_commit(Some("HEAD"), &signature, &signature, message.to_string(), &tree, &parents)
            .expect("commit")
    }
}

/// Commit `tree` with `parents` without touching any reference
pub fn commit_with(repo: &Repository, tree: &ObjectId, parents: &[ObjectId], time: i64) -> ObjectId {
    let signature = signature_at(time);
    repo.create_commit(None, &signature, &signature, format!("commit at {time}\n"), tree, parents)
        .expect("commit")
}

pub fn empty_tree(repo: &Repository) -> ObjectId {
    repo.create_tree_builder(None)
        .and_then(|builder| builder.write(repo.database()))
        .expect("empty tree")
}

/// Hexdump used to make byte-level mismatches readable
pub fn to_hexdump(data: &[u8]) -> String {
    let mut result = String::new();
    for (i, chunk) in data.chunks(16).enumerate() {
        result.push_str(&format!("{:08x}: ", i * 16));
        for byte in chunk {
            result.push_str(&format!("{byte:02x} "));
        }
        result.push_str(&"   ".repeat(16 - chunk.len()));
        result.push('|');
        for byte in chunk {
            result.push(if byte.is_ascii_graphic() { *byte as char } else { '.' });
        }
        result.push_str("|\n");
    }
    result
}
