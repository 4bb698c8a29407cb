use bit_core::artifacts::database::pack_writer::{DeltaBase, PackWriter};
use bit_core::{ErrorKind, ObjectId, ObjectType, Repository};
use common::{TestRepo, TestResult};
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

/// Blobs that differ by a line each, so deltas pay off
fn similar_blobs(repo: &Repository, count: usize) -> bit_core::Result<Vec<ObjectId>> {
    let base: String = (0..200).map(|n| format!("line number {n}\n")).collect();
    (0..count)
        .map(|n| repo.create_blob(format!("{base}tail {n}\n").as_bytes()))
        .collect()
}

fn remove_loose(repo: &Repository, oids: &[ObjectId]) -> TestResult {
    for oid in oids {
        std::fs::remove_file(repo.path().join("objects").join(oid.to_path()))?;
    }
    Ok(())
}

#[rstest]
#[case::whole(PackWriter::new())]
#[case::offset_deltas(PackWriter::with_deltas(DeltaBase::Offset))]
#[case::ref_deltas(PackWriter::with_deltas(DeltaBase::ObjectId))]
fn packed_objects_replace_loose_ones(#[case] writer: PackWriter) -> TestResult {
    let test = TestRepo::new(true);
    let oids = similar_blobs(&test.repo, 5)?;
    let contents = oids
        .iter()
        .map(|oid| test.repo.database().read(oid).map(|raw| raw.data))
        .collect::<bit_core::Result<Vec<_>>>()?;

    let pack = test.repo.database().write_pack(&oids, writer)?;
    assert!(pack.with_extension("idx").is_file());
    remove_loose(&test.repo, &oids)?;

    let reopened = Repository::open(test.dir.path())?;
    assert_eq!(reopened.database().pack_count()?, 1);
    reopened.database().verify_packs()?;
    for (oid, content) in oids.iter().zip(&contents) {
        let raw = reopened.database().read(oid)?;
        assert_eq!(raw.kind, ObjectType::Blob);
        assert_eq!(&raw.data, content);
        assert_eq!(reopened.database().read_header(oid)?, (ObjectType::Blob, content.len() as u64));
    }
    Ok(())
}

#[test]
fn deltas_shrink_similar_content() -> TestResult {
    let test = TestRepo::new(true);
    let oids = similar_blobs(&test.repo, 8)?;

    let whole = test.repo.database().write_pack(&oids, PackWriter::new())?;
    let delta = test.repo.database().write_pack(&oids, PackWriter::with_deltas(DeltaBase::Offset))?;
    assert!(std::fs::metadata(&delta)?.len() < std::fs::metadata(&whole)?.len());
    assert_eq!(test.repo.database().pack_count()?, 2);
    Ok(())
}

#[test]
fn history_reads_from_a_pack() -> TestResult {
    let test = TestRepo::with_identity(false);
    test.write_file("notes.txt", "first\n");
    test.stage("notes.txt");
    let first = test.commit("first\n", 0);
    test.write_file("notes.txt", "second\n");
    test.stage("notes.txt");
    let second = test.commit("second\n", 10);

    let mut objects = Vec::new();
    for commit in [first, second] {
        let decoded = test.repo.database().parse_object_as_commit(&commit)?;
        let tree = test.repo.database().parse_object_as_tree(decoded.tree_oid())?;
        objects.push(commit);
        objects.push(*decoded.tree_oid());
        objects.extend(tree.entries().iter().map(|entry| entry.oid));
    }
    objects.sort();
    objects.dedup();
    test.repo.database().write_pack(&objects, PackWriter::with_deltas(DeltaBase::ObjectId))?;
    remove_loose(&test.repo, &objects)?;

    let reopened = Repository::open(test.dir.path())?;
    let order = reopened
        .walk(&second, bit_core::Sort::TIME)?
        .collect::<bit_core::Result<Vec<_>>>()?;
    assert_eq!(order, vec![second, first]);
    assert_eq!(reopened.revparse_single("HEAD~1")?, first);
    assert!(reopened.status()?.is_clean());
    assert_eq!(reopened.database().exists_prefix(&second.to_hex()[..8])?, second);
    Ok(())
}

#[test]
fn damaged_pack_fails_verification() -> TestResult {
    let test = TestRepo::new(true);
    let oids = similar_blobs(&test.repo, 3)?;
    let pack = test.repo.database().write_pack(&oids, PackWriter::new())?;

    let mut bytes = std::fs::read(&pack)?;
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xff;
    std::fs::write(&pack, bytes)?;

    let reopened = Repository::open(test.dir.path())?;
    assert_eq!(reopened.database().verify_packs().unwrap_err().kind(), ErrorKind::Corrupt);
    Ok(())
}
