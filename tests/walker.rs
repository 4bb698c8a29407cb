use bit_core::{ErrorKind, ObjectId, Sort, WalkState};
use common::{TestRepo, TestResult, commit_with, empty_tree};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashMap;

mod common;

#[test]
fn head_walk_lists_newest_first() -> TestResult {
    let test = TestRepo::with_identity(false);
    test.write_file("a.txt", "one\n");
    test.stage("a.txt");
    let c1 = test.commit("first\n", 0);
    test.write_file("a.txt", "two\n");
    test.stage("a.txt");
    let c2 = test.commit("second\n", 60);

    let head = test.repo.head_oid()?.ok_or("unborn HEAD")?;
    let order = test.repo.walk(&head, Sort::TIME)?.collect::<bit_core::Result<Vec<_>>>()?;
    assert_eq!(order, vec![c2, c1]);

    let log = test.repo.reflog("HEAD")?;
    assert_eq!(log.len(), 2);
    assert!(log[0].message_lossy().starts_with("commit (initial): first"));
    Ok(())
}

#[test]
fn ranges_and_tags_resolve_through_the_repository() -> TestResult {
    let test = TestRepo::with_identity(true);
    let tree = empty_tree(&test.repo);
    let base = commit_with(&test.repo, &tree, &[], 0);
    let left = commit_with(&test.repo, &tree, &[base], 10);
    let right = commit_with(&test.repo, &tree, &[base], 20);
    let merge = commit_with(&test.repo, &tree, &[left, right], 30);
    test.repo.create_reference("refs/heads/master", &merge, false, "merge")?;
    test.repo.create_tag("base", &base, &common::signature_at(40), "base\n", false)?;

    let mut walk = test.repo.walker();
    walk.push_range("base..master")?;
    let order = walk.collect::<bit_core::Result<Vec<_>>>()?;
    assert_eq!(order, vec![merge, right, left]);

    let mut walk = test.repo.walker();
    walk.sort(Sort::TOPOLOGICAL | Sort::REVERSE)?;
    walk.push_head()?;
    walk.hide(&left)?;
    let order = walk.collect::<bit_core::Result<Vec<_>>>()?;
    assert_eq!(order, vec![right, merge]);
    Ok(())
}

#[test]
fn unsorted_walk_never_puts_a_parent_before_its_child() -> TestResult {
    let test = TestRepo::new(true);
    let tree = empty_tree(&test.repo);
    let base = commit_with(&test.repo, &tree, &[], 50);
    let left = commit_with(&test.repo, &tree, &[base], 100);
    let right = commit_with(&test.repo, &tree, &[base], 10);
    let tip = commit_with(&test.repo, &tree, &[left, right], 1);

    let order = test.repo.walk(&tip, Sort::NONE)?.collect::<bit_core::Result<Vec<_>>>()?;
    assert_eq!(order.len(), 4);
    let position = |oid: &ObjectId| order.iter().position(|o| o == oid);
    assert_eq!(position(&tip), Some(0));
    assert!(position(&left) < position(&base));
    assert!(position(&right) < position(&base));
    Ok(())
}

#[test]
fn walking_a_blob_is_refused() -> TestResult {
    let test = TestRepo::new(true);
    let blob = test.repo.create_blob(b"not a commit")?;
    let mut walk = test.repo.walker();
    assert_eq!(walk.push(&blob).unwrap_err().kind(), ErrorKind::InvalidSpec);
    assert_eq!(walk.state(), WalkState::Fresh);
    Ok(())
}

/// Parent choices for commit `i`, each indexing an earlier commit
fn dag() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..12).prop_flat_map(|len| {
        (0..len)
            .map(|i| {
                if i == 0 {
                    Just(Vec::new()).boxed()
                } else {
                    prop::collection::vec(0..i, 1..=2.min(i)).boxed()
                }
            })
            .collect::<Vec<_>>()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn walks_emit_children_before_parents(
        parents in dag(),
        skew in prop::collection::vec(-50i64..50, 12),
    ) {
        let test = TestRepo::new(true);
        let tree = empty_tree(&test.repo);

        let mut commits: Vec<ObjectId> = Vec::new();
        for (i, choice) in parents.iter().enumerate() {
            let mut ids: Vec<_> = choice.iter().map(|&p| commits[p]).collect();
            ids.dedup();
            // timestamps deliberately disagree with the graph
            commits.push(commit_with(&test.repo, &tree, &ids, skew[i]));
        }

        let tip = *commits.last().unwrap();
        for sort in [Sort::TOPOLOGICAL, Sort::NONE] {
            let order = test
                .repo
                .walk(&tip, sort)
                .unwrap()
                .collect::<bit_core::Result<Vec<_>>>()
                .unwrap();
            let position: HashMap<_, _> = order.iter().enumerate().map(|(i, oid)| (*oid, i)).collect();
            prop_assert_eq!(position.len(), order.len());

            for oid in &order {
                for parent in test.repo.database().load_slim_commit(oid).unwrap().parents {
                    prop_assert!(position[oid] < position[&parent]);
                }
            }
        }
    }
}
