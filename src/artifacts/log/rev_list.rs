//! Revision walking
//!
//! A `RevWalk` yields the commits reachable from its start points minus
//! those reachable from hidden ones, in the order its `Sort` asks for.

use crate::areas::database::Database;
use crate::areas::refs::Refs;
use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::refs::HEAD_REF_NAME;
use crate::artifacts::refs::revision::Revision;
use crate::errors::{Error, Result};
use bitflags::bitflags;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

bitflags! {
    /// Output order of a walk; `TIME` and `TOPOLOGICAL` may be combined with `REVERSE`
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Sort: u8 {
        const NONE = 0b000;
        const TOPOLOGICAL = 0b001;
        const TIME = 0b010;
        const REVERSE = 0b100;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    /// Nothing pushed yet
    Fresh,
    /// Start points recorded, iteration not begun
    Primed,
    Running,
    Done,
}

/// A commit waiting in the queue, newest committer time first
#[derive(Debug)]
struct Pending {
    commit: SlimCommit,
    /// Discovery order; breaks ties between equal timestamps
    seq: u64,
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.commit
            .timestamp
            .cmp(&other.commit.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

/// Cursor over the commits reachable from the pushed start points
///
/// Commits reachable from a hidden commit are never emitted. A `TIME` walk
/// is lazy: each step pops the newest pending commit and queues its parents.
/// Every other mode emits a commit only after all of its children, so the
/// walk collects the whole reachable set when iteration begins. `REVERSE`
/// also buffers everything.
pub struct RevWalk<'r> {
    database: &'r Database,
    refs: &'r Refs,
    state: WalkState,
    sort: Sort,
    roots: Vec<ObjectId>,
    hidden: Vec<ObjectId>,
    queue: BinaryHeap<Pending>,
    seen: HashSet<ObjectId>,
    uninteresting: HashSet<ObjectId>,
    next_seq: u64,
    /// Precomputed output for the eager modes
    buffered: Option<VecDeque<ObjectId>>,
}

impl<'r> RevWalk<'r> {
    pub fn new(database: &'r Database, refs: &'r Refs) -> Self {
        RevWalk {
            database,
            refs,
            state: WalkState::Fresh,
            sort: Sort::NONE,
            roots: Vec::new(),
            hidden: Vec::new(),
            queue: BinaryHeap::new(),
            seen: HashSet::new(),
            uninteresting: HashSet::new(),
            next_seq: 0,
            buffered: None,
        }
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    fn ensure_not_started(&self) -> Result<()> {
        match self.state {
            WalkState::Fresh | WalkState::Primed => Ok(()),
            WalkState::Running | WalkState::Done => Err(Error::invalid_spec(
                "the walk has already started; reset it first",
            )),
        }
    }

    /// Start points are peeled so that annotated tags walk their commit
    fn peel_to_commit(&self, oid: &ObjectId) -> Result<ObjectId> {
        self.database.peel(oid, Some(ObjectType::Commit))
    }

    /// Emit `oid` and its ancestry
    pub fn push(&mut self, oid: &ObjectId) -> Result<()> {
        self.ensure_not_started()?;
        let commit = self.peel_to_commit(oid)?;
        self.roots.push(commit);
        self.state = WalkState::Primed;
        Ok(())
    }

    /// Suppress `oid` and its ancestry
    pub fn hide(&mut self, oid: &ObjectId) -> Result<()> {
        self.ensure_not_started()?;
        let commit = self.peel_to_commit(oid)?;
        self.hidden.push(commit);
        self.state = WalkState::Primed;
        Ok(())
    }

    pub fn push_ref(&mut self, name: &str) -> Result<()> {
        let oid = self.refs.resolve_oid(name)?;
        self.push(&oid)
    }

    pub fn hide_ref(&mut self, name: &str) -> Result<()> {
        let oid = self.refs.resolve_oid(name)?;
        self.hide(&oid)
    }

    pub fn push_head(&mut self) -> Result<()> {
        self.push_ref(HEAD_REF_NAME)
    }

    /// Walk `a..b`: commits reachable from `b` but not from `a`
    ///
    /// Either side may be empty and then means `HEAD`.
    pub fn push_range(&mut self, range: &str) -> Result<()> {
        let (from, to) = range
            .split_once("..")
            .filter(|(_, to)| !to.starts_with('.'))
            .ok_or_else(|| Error::invalid_spec(format!("not a revision range: {range:?}")))?;
        let side = |revision: &str| {
            let revision = if revision.is_empty() { HEAD_REF_NAME } else { revision };
            Revision::try_parse(revision)?.resolve(self.refs, self.database)
        };

        let hidden = side(from)?;
        let pushed = side(to)?;
        self.hide(&hidden)?;
        self.push(&pushed)
    }

    pub fn sort(&mut self, sort: Sort) -> Result<()> {
        self.ensure_not_started()?;
        self.sort = sort;
        Ok(())
    }

    /// Forget every start point and return to `Fresh`; the sort mode is kept
    pub fn reset(&mut self) {
        self.state = WalkState::Fresh;
        self.roots.clear();
        self.hidden.clear();
        self.queue.clear();
        self.seen.clear();
        self.uninteresting.clear();
        self.next_seq = 0;
        self.buffered = None;
    }

    fn load(&self, oid: &ObjectId) -> Result<SlimCommit> {
        self.database.load_slim_commit(oid)
    }

    fn mark_uninteresting(&mut self) -> Result<()> {
        let mut stack = self.hidden.clone();
        while let Some(oid) = stack.pop() {
            if !self.uninteresting.insert(oid) {
                continue;
            }
            stack.extend(self.load(&oid)?.parents);
        }
        Ok(())
    }

    fn enqueue(&mut self, oid: &ObjectId) -> Result<()> {
        if self.uninteresting.contains(oid) || !self.seen.insert(*oid) {
            return Ok(());
        }
        let commit = self.load(oid)?;
        self.queue.push(Pending {
            commit,
            seq: self.next_seq,
        });
        self.next_seq += 1;
        Ok(())
    }

    fn next_by_time(&mut self) -> Result<Option<ObjectId>> {
        let Some(Pending { commit, .. }) = self.queue.pop() else {
            return Ok(None);
        };
        for parent in &commit.parents {
            self.enqueue(parent)?;
        }
        Ok(Some(commit.oid))
    }

    /// Kahn's algorithm over the reachable set: a commit is released once all
    /// of its children have been emitted, newest released commit first
    fn children_first_order(&mut self) -> Result<VecDeque<ObjectId>> {
        let mut commits: HashMap<ObjectId, (SlimCommit, u64)> = HashMap::new();
        let mut stack: Vec<ObjectId> = self.roots.iter().rev().copied().collect();
        while let Some(oid) = stack.pop() {
            if self.uninteresting.contains(&oid) || commits.contains_key(&oid) {
                continue;
            }
            let commit = self.load(&oid)?;
            stack.extend(commit.parents.iter().rev().copied());
            commits.insert(oid, (commit, self.next_seq));
            self.next_seq += 1;
        }

        let mut children: HashMap<ObjectId, usize> = HashMap::new();
        for (commit, _) in commits.values() {
            for parent in commit.parents.iter().filter(|p| commits.contains_key(p)) {
                *children.entry(*parent).or_default() += 1;
            }
        }

        let mut ready: BinaryHeap<Pending> = commits
            .iter()
            .filter(|(oid, _)| !children.contains_key(oid))
            .map(|(_, (commit, seq))| Pending {
                commit: commit.clone(),
                seq: *seq,
            })
            .collect();

        let mut order = VecDeque::with_capacity(commits.len());
        while let Some(Pending { commit, .. }) = ready.pop() {
            for parent in &commit.parents {
                let Some(remaining) = children.get_mut(parent) else {
                    continue;
                };
                *remaining -= 1;
                if *remaining == 0 {
                    children.remove(parent);
                    if let Some((parent_commit, seq)) = commits.get(parent) {
                        ready.push(Pending {
                            commit: parent_commit.clone(),
                            seq: *seq,
                        });
                    }
                }
            }
            order.push_back(commit.oid);
        }
        Ok(order)
    }

    fn start(&mut self) -> Result<()> {
        self.state = WalkState::Running;
        self.mark_uninteresting()?;

        // clock skew must not let a parent overtake its child
        if self.sort.contains(Sort::TOPOLOGICAL) || !self.sort.contains(Sort::TIME) {
            let order = self.children_first_order()?;
            self.buffered = Some(order);
        } else {
            for root in self.roots.clone() {
                self.enqueue(&root)?;
            }
        }

        if self.sort.contains(Sort::REVERSE) {
            let mut all = Vec::new();
            while let Some(oid) = self.step()? {
                all.push(oid);
            }
            all.reverse();
            self.buffered = Some(all.into());
        }

        tracing::debug!(
            "walk started from {} commits, {} hidden, sort {:?}",
            self.roots.len(),
            self.hidden.len(),
            self.sort
        );
        Ok(())
    }

    fn step(&mut self) -> Result<Option<ObjectId>> {
        match self.buffered.as_mut() {
            Some(buffered) => Ok(buffered.pop_front()),
            None => self.next_by_time(),
        }
    }

    fn advance(&mut self) -> Result<Option<ObjectId>> {
        match self.state {
            WalkState::Fresh | WalkState::Done => return Ok(None),
            WalkState::Primed => self.start()?,
            WalkState::Running => {}
        }
        let next = self.step()?;
        if next.is_none() {
            self.state = WalkState::Done;
        }
        Ok(next)
    }
}

impl Iterator for RevWalk<'_> {
    type Item = Result<ObjectId>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(oid)) => {
                tracing::trace!("walk emitted {}", oid);
                Some(Ok(oid))
            }
            Ok(None) => None,
            Err(e) => {
                self.state = WalkState::Done;
                Some(Err(e))
            }
        }
    }
}
