use bit_core::artifacts::objects::object::{Packable, Unpackable, hash_object};
use bit_core::artifacts::objects::tree::{Tree, TreeEntry};
use bit_core::artifacts::objects::tree_builder::TreeBuilder;
use bit_core::{EntryMode, ErrorKind, ObjectBox, ObjectId, ObjectType, Repository};
use common::{TestResult, TestRepo, empty_tree, signature_at};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashMap;
use std::io::Write;

mod common;

#[test]
fn blob_written_to_a_bare_repository_reads_back() -> TestResult {
    let test = TestRepo::new(true);

    let oid = test.repo.create_blob(b"hello\n")?;
    assert_eq!(oid.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");

    let raw = test.repo.database().read(&oid)?;
    assert_eq!(raw.kind, ObjectType::Blob);
    assert_eq!(&raw.data[..], b"hello\n");

    let loose = test.repo.path().join("objects/ce/013625030ba8dba906f756967f9e9ca394464a");
    assert!(loose.is_file());
    Ok(())
}

#[test]
fn trees_sort_canonically_whatever_the_insertion_order() -> TestResult {
    let test = TestRepo::new(true);
    let readme = test.repo.create_blob(b"read me\n")?;
    let sub = {
        let mut builder = test.repo.create_tree_builder(None)?;
        builder.insert("lib.rs", test.repo.create_blob(b"fn main() {}\n")?, EntryMode::REGULAR)?;
        builder.write(test.repo.database())?
    };

    let build = |repo: &Repository| -> bit_core::Result<ObjectId> {
        let mut builder = repo.create_tree_builder(None)?;
        builder.insert("src", sub, EntryMode::Directory)?;
        builder.insert("README", readme, EntryMode::REGULAR)?;
        builder.write(repo.database())
    };

    let first = build(&test.repo)?;
    let other = TestRepo::new(true);
    other.repo.create_blob(b"read me\n")?;
    let second = build(&other.repo)?;
    assert_eq!(first, second);

    let tree = test.repo.database().parse_object_as_tree(&first)?;
    let names: Vec<_> = tree.entries().iter().map(|e| e.name_lossy()).collect();
    assert_eq!(names, vec!["README", "src"]);
    Ok(())
}

#[test]
fn directory_names_sort_as_if_followed_by_a_slash() -> TestResult {
    let test = TestRepo::new(true);
    let blob = test.repo.create_blob(b"x")?;
    let dir = empty_tree(&test.repo);

    let mut builder = test.repo.create_tree_builder(None)?;
    builder.insert("foo", dir, EntryMode::Directory)?;
    builder.insert("foo.txt", blob, EntryMode::REGULAR)?;
    builder.insert("foo-bar", blob, EntryMode::REGULAR)?;
    let tree = test.repo.database().parse_object_as_tree(&builder.write(test.repo.database())?)?;

    // '-' (0x2d) < '.' (0x2e) < '/' (0x2f)
    let names: Vec<_> = tree.entries().iter().map(|e| e.name_lossy()).collect();
    assert_eq!(names, vec!["foo-bar", "foo.txt", "foo"]);
    Ok(())
}

#[test]
fn commit_and_tag_decode_to_their_variants() -> TestResult {
    let test = TestRepo::with_identity(true);
    let tree = empty_tree(&test.repo);
    let author = signature_at(0);
    let commit = test
        .repo
        .create_commit(Some("HEAD"), &author, &author, "root\n", &tree, &[])?;
    let tag = test
        .repo
        .create_tag("v1.0", &commit, &signature_at(10), "release\n", false)?;

    match test.repo.lookup_object(&commit.to_hex(), None)?.object {
        ObjectBox::Commit(decoded) => {
            assert_eq!(decoded.tree_oid(), &tree);
            assert_eq!(decoded.author(), &author);
            assert_eq!(decoded.message(), b"root\n");
        }
        other => panic!("expected a commit, got {:?}", other.object_type()),
    }

    let decoded = test.repo.database().parse_object_as_tag(&tag)?;
    assert_eq!(decoded.target(), &commit);
    assert_eq!(decoded.target_kind(), ObjectType::Commit);
    assert_eq!(test.repo.peel(&tag, Some(ObjectType::Tree))?, tree);
    assert_eq!(test.repo.revparse_single("v1.0^{}")?, commit);
    assert_eq!(test.repo.revparse_single("v1.0")?, tag);
    Ok(())
}

#[test]
fn lightweight_tags_point_straight_at_their_target() -> TestResult {
    let test = TestRepo::with_identity(true);
    let blob = test.repo.create_blob(b"payload")?;
    let reference = test.repo.create_lightweight_tag("data", &blob, false)?;

    assert_eq!(reference.oid(), Some(&blob));
    assert_eq!(
        test.repo.create_lightweight_tag("data", &blob, false).unwrap_err().kind(),
        ErrorKind::Exists
    );
    assert!(test.repo.create_lightweight_tag("data", &blob, true).is_ok());
    Ok(())
}

/// Two payloads whose blob ids share the first seven hex digits
fn colliding_blobs() -> (Vec<u8>, Vec<u8>, String) {
    let mut seen: HashMap<String, Vec<u8>> = HashMap::new();
    for n in 0u64.. {
        let data = format!("collision candidate {n}\n").into_bytes();
        let prefix = hash_object(ObjectType::Blob, &data).to_hex()[..7].to_string();
        if let Some(previous) = seen.insert(prefix.clone(), data.clone()) {
            return (previous, data, prefix);
        }
    }
    unreachable!()
}

#[test]
fn shared_prefix_is_ambiguous_until_it_is_long_enough() -> TestResult {
    let test = TestRepo::new(true);
    let (a, b, prefix) = colliding_blobs();
    let a = test.repo.create_blob(&a)?;
    let b = test.repo.create_blob(&b)?;

    match test.repo.database().exists_prefix(&prefix) {
        Err(bit_core::Error::Ambiguous { candidates, .. }) => {
            assert!(candidates.contains(&a) && candidates.contains(&b));
        }
        other => panic!("expected an ambiguous prefix, got {other:?}"),
    }

    assert_eq!(test.repo.database().exists_prefix(&a.to_hex())?, a);
    assert_eq!(test.repo.database().exists_prefix(&b.to_hex())?, b);

    // every longer prefix of `a` either finds it or is ambiguous with it
    for len in prefix.len()..=40 {
        match test.repo.database().exists_prefix(&a.to_hex()[..len]) {
            Ok(found) => assert_eq!(found, a),
            Err(bit_core::Error::Ambiguous { candidates, .. }) => assert!(candidates.contains(&a)),
            Err(e) => panic!("unexpected error for length {len}: {e}"),
        }
    }
    Ok(())
}

#[test]
fn tampered_loose_object_is_corrupt() -> TestResult {
    let test = TestRepo::new(true);
    let oid = test.repo.create_blob(b"original")?;
    let path = test.repo.path().join("objects").join(oid.to_path());

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    std::io::Write::write_all(&mut encoder, b"blob 8\0tampered")?;
    std::fs::write(&path, encoder.finish()?)?;

    let reopened = Repository::open(test.dir.path())?;
    assert_eq!(reopened.database().read(&oid).unwrap_err().kind(), ErrorKind::Corrupt);
    Ok(())
}

#[test]
fn streamed_blob_matches_a_direct_write() -> TestResult {
    let test = TestRepo::new(true);
    let data = b"streamed in two pieces\n";

    let mut stream = test.repo.database().open_write_stream(ObjectType::Blob, data.len() as u64)?;
    stream.write_all(&data[..8])?;
    stream.write_all(&data[8..])?;
    let streamed = stream.finish()?;
    assert_eq!(streamed, hash_object(ObjectType::Blob, data));
    assert_eq!(&test.repo.database().read(&streamed)?.data[..], &data[..]);

    let short = test.repo.database().open_write_stream(ObjectType::Blob, 100)?;
    assert_eq!(short.finish().unwrap_err().kind(), ErrorKind::InvalidSpec);
    Ok(())
}

fn entry_strategy() -> impl Strategy<Value = (String, bool, [u8; 20])> {
    ("[a-zA-Z0-9_.-]{1,12}", any::<bool>(), any::<[u8; 20]>())
        .prop_filter("not a dot name", |(name, _, _)| name != "." && name != "..")
}

fn build_tree<'a>(entries: impl Iterator<Item = &'a (String, bool, [u8; 20])>) -> bytes::Bytes {
    let mut builder = TreeBuilder::new();
    for (name, is_dir, raw) in entries {
        let mode = if *is_dir { EntryMode::Directory } else { EntryMode::REGULAR };
        builder.insert(name.as_str(), ObjectId::from_bytes(*raw), mode).unwrap();
    }
    builder.build().unwrap().serialize().unwrap()
}

proptest! {
    #[test]
    fn written_objects_read_back_with_their_digest(kind in 0usize..4, data in prop::collection::vec(any::<u8>(), 0..512)) {
        let test = TestRepo::new(true);
        let kind = [ObjectType::Blob, ObjectType::Tree, ObjectType::Commit, ObjectType::Tag][kind];
        let oid = test.repo.database().write(kind, &data).unwrap();
        let raw = test.repo.database().read(&oid).unwrap();
        prop_assert_eq!(raw.kind, kind);
        prop_assert_eq!(&raw.data[..], &data[..]);
        prop_assert_eq!(hash_object(kind, &data), oid);
    }

    #[test]
    fn tree_payload_round_trips_bit_exact(entries in prop::collection::btree_map("[a-zA-Z0-9_-]{1,12}", (any::<bool>(), any::<[u8; 20]>()), 0..12)) {
        let entries = entries.into_iter().map(|(name, (is_dir, raw))| {
            let mode = if is_dir { EntryMode::Directory } else { EntryMode::REGULAR };
            TreeEntry::new(mode, name.into_bytes(), ObjectId::from_bytes(raw))
        });
        let tree = Tree::from_entries(entries).unwrap();
        let payload = tree.serialize().unwrap();
        let decoded = Tree::deserialize(payload.clone()).unwrap();
        prop_assert_eq!(decoded.serialize().unwrap(), payload);
        prop_assert_eq!(decoded, tree);
    }

    #[test]
    fn tree_builder_ignores_insertion_order(entries in prop::collection::vec(entry_strategy(), 1..8)) {
        let unique: Vec<_> = entries
            .into_iter()
            .map(|entry| (entry.0.clone(), entry))
            .collect::<HashMap<_, _>>()
            .into_values()
            .collect();
        prop_assert_eq!(build_tree(unique.iter()), build_tree(unique.iter().rev()));
    }
}
