//! The event graph and the document it replays into (spec.md §4.4, §4.5).

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::event::{ApplyError, Event};
use crate::hash::Hash;
use crate::state::{Primitive, State};

/// Errors navigating or replaying an `EventGraph` (spec.md §7).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("event {0} is not registered")]
    NotFound(Hash),
    #[error("event {0}'s parent {1} is not registered")]
    MissingParent(Hash, Hash),
    #[error("events {0} and {1} share no common ancestor")]
    NoCommonAncestor(Hash, Hash),
    #[error("event {0} failed to apply during replay")]
    ReplayFailed(Hash),
    #[error("cycle detected in ancestor chain at event {0}")]
    Cycle(Hash),
}

/// An append-only, content-addressed graph of events.
///
/// Registration is idempotent: registering the same event (by hash) twice
/// is a no-op, not an error. The graph never removes an event once
/// registered except via explicit `unregister`.
#[derive(Clone, Debug, Default)]
pub struct EventGraph {
    by_hash: HashMap<Hash, Event>,
    by_parent: HashMap<Hash, HashSet<Hash>>,
}

impl EventGraph {
    pub fn new() -> Self {
        Self {
            by_hash: HashMap::new(),
            by_parent: HashMap::new(),
        }
    }

    /// Register `event` under `hash`. Idempotent.
    pub fn register(&mut self, hash: Hash, event: Event) {
        if self.by_hash.contains_key(&hash) {
            return;
        }
        if let Some(parent) = parent_hash(&event) {
            self.by_parent.entry(parent).or_default().insert(hash);
        }
        self.by_hash.insert(hash, event);
    }

    /// Remove `hash` from the graph, if present. Idempotent.
    pub fn unregister(&mut self, hash: &Hash) {
        if let Some(event) = self.by_hash.remove(hash) {
            if let Some(parent) = parent_hash(&event) {
                if let Some(children) = self.by_parent.get_mut(&parent) {
                    children.remove(hash);
                    if children.is_empty() {
                        self.by_parent.remove(&parent);
                    }
                }
            }
        }
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<&Event> {
        self.by_hash.get(hash)
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    /// Hashes of every event directly registered with `hash` as its parent.
    pub fn get_children(&self, hash: &Hash) -> Vec<Hash> {
        self.by_parent
            .get(hash)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Walk from `hash` up to its chain root.
    ///
    /// Guards against a parent cycle with a visited set: a cycle is
    /// unreachable under normal operation (hashes are content-addressed,
    /// so an event cannot be its own ancestor), but a malicious or
    /// corrupt peer could still register one.
    pub fn get_root(&self, hash: &Hash) -> Result<Hash, GraphError> {
        let mut current = *hash;
        let mut visited = HashSet::new();
        loop {
            if !visited.insert(current) {
                return Err(GraphError::Cycle(current));
            }
            let event = self
                .by_hash
                .get(&current)
                .ok_or(GraphError::NotFound(current))?;
            match parent_hash(event) {
                None => return Ok(current),
                Some(parent) => current = parent,
            }
        }
    }

    /// The full ancestor chain of `hash`, from `hash` itself up to (and
    /// including) its root.
    fn ancestors(&self, hash: &Hash) -> Result<Vec<Hash>, GraphError> {
        let mut chain = vec![*hash];
        let mut current = *hash;
        let mut visited = HashSet::new();
        visited.insert(current);
        loop {
            let event = self
                .by_hash
                .get(&current)
                .ok_or(GraphError::NotFound(current))?;
            match parent_hash(event) {
                None => return Ok(chain),
                Some(parent) => {
                    if !self.by_hash.contains_key(&parent) {
                        return Err(GraphError::MissingParent(current, parent));
                    }
                    if !visited.insert(parent) {
                        return Err(GraphError::Cycle(parent));
                    }
                    chain.push(parent);
                    current = parent;
                }
            }
        }
    }

    /// The most recent event that is an ancestor of (or equal to) both
    /// `a` and `b`.
    pub fn get_common_ancestor(&self, a: &Hash, b: &Hash) -> Result<Hash, GraphError> {
        if a == b {
            return Ok(*a);
        }
        let chain_a = self.ancestors(a)?;
        let chain_b: HashSet<Hash> = self.ancestors(b)?.into_iter().collect();
        chain_a
            .into_iter()
            .find(|candidate| chain_b.contains(candidate))
            .ok_or(GraphError::NoCommonAncestor(*a, *b))
    }

    /// Whether `a` and `b` share a common ancestor (including being equal,
    /// or one a direct ancestor of the other).
    pub fn compatible_with(&self, a: &Hash, b: &Hash) -> bool {
        self.get_common_ancestor(a, b).is_ok()
    }

    /// The chain from `root` down to `tip`, inclusive, in replay order.
    /// Errors exactly as `get_root`/`get_common_ancestor` do when an
    /// ancestor is missing — used directly by `publish_history`'s
    /// `root-not-found` case.
    pub fn chain_to(&self, tip: &Hash) -> Result<Vec<Hash>, GraphError> {
        let mut chain = self.ancestors(tip)?;
        chain.reverse();
        Ok(chain)
    }
}

fn parent_hash(event: &Event) -> Option<Hash> {
    if event.is_root() {
        None
    } else {
        Hash::from_hex(&event.parent).ok()
    }
}

/// A graph of events plus the state it replays into, kept in sync at a
/// single "tip" event (spec.md §4.5).
#[derive(Clone, Debug)]
pub struct Document {
    graph: EventGraph,
    state: State,
    tip: Option<Hash>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            graph: EventGraph::new(),
            state: State::new(),
            tip: None,
        }
    }

    pub fn graph(&self) -> &EventGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut EventGraph {
        &mut self.graph
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn tip(&self) -> Option<Hash> {
        self.tip
    }

    pub fn set_tip(&mut self, tip: Hash) {
        self.tip = Some(tip);
    }

    pub fn export(&self) -> crate::json::Json {
        self.state.export()
    }

    /// Register an event, computing its hash, and return that hash.
    pub fn register(&mut self, event: Event) -> serde_json::Result<Hash> {
        let hash = event.hash()?;
        self.graph.register(hash, event);
        Ok(hash)
    }

    /// Reset state to empty and replay every event from the chain root
    /// down to `target`, applying each primitive through `on_primitive` as
    /// it is derived. Moves `tip` to `target` only on full success.
    ///
    /// Replay always begins with an implicit `Set([], {})` so a chain
    /// whose root event is not itself a `SET` still starts from a clean
    /// empty document (spec.md §4.5). If the chain itself cannot be
    /// located (a missing root or ancestor), `self.state` is left
    /// untouched. If the chain is found but a primitive along it fails to
    /// apply, `self.state` is left exactly as partial replay produced it
    /// and `self.tip` does not advance — callers are expected to discard
    /// the document or `goto` a known-good tip (spec.md §7).
    pub fn goto(
        &mut self,
        target: Hash,
        mut on_primitive: impl FnMut(&Primitive),
    ) -> Result<(), GraphError> {
        let chain = self.graph.chain_to(&target)?;

        self.state.reset();
        let seed = Primitive::Set {
            path: Vec::new(),
            value: crate::json::empty_object(),
        };
        on_primitive(&seed);
        self.state
            .apply(&seed)
            .expect("empty Set on a freshly reset State cannot fail");

        for hash in &chain {
            let event = self.graph.get(hash).expect("hash came from this graph's own chain");
            let primitives = event
                .get_primitives()
                .map_err(|_| GraphError::ReplayFailed(*hash))?;
            for primitive in &primitives {
                on_primitive(primitive);
                self.state
                    .apply(primitive)
                    .map_err(|_| GraphError::ReplayFailed(*hash))?;
            }
        }

        self.tip = Some(target);
        Ok(())
    }

    /// Apply `event`'s primitives directly to the current state, without
    /// touching `tip` or replaying from root. Used when an event is known
    /// to be a direct, in-order extension of the current tip.
    pub fn apply(&mut self, event: &Event) -> Result<(), ApplyError> {
        event.apply(&mut self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set_event(parent: Option<&Event>, path: &[&str], value: serde_json::Value) -> Event {
        let mut event = Event::new("SET");
        let path = path
            .iter()
            .map(|s| crate::json::PathSegment::Key(s.to_string()))
            .collect();
        event.args = crate::event::set_args(path, value);
        if let Some(parent) = parent {
            event.set_parent(parent).unwrap();
        }
        event
    }

    #[test]
    fn register_is_idempotent() {
        let mut graph = EventGraph::new();
        let event = Event::new("SET");
        let hash = event.hash().unwrap();
        graph.register(hash, event.clone());
        graph.register(hash, event);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn unregister_removes_from_both_indices() {
        let mut graph = EventGraph::new();
        let root = Event::new("SET");
        let root_hash = root.hash().unwrap();
        let mut child = Event::new("SET");
        child.set_parent(&root).unwrap();
        let child_hash = child.hash().unwrap();
        graph.register(root_hash, root);
        graph.register(child_hash, child);

        graph.unregister(&child_hash);
        assert!(!graph.contains(&child_hash));
        assert!(graph.get_children(&root_hash).is_empty());
    }

    #[test]
    fn get_common_ancestor_self() {
        let mut graph = EventGraph::new();
        let root = Event::new("SET");
        let hash = root.hash().unwrap();
        graph.register(hash, root);
        assert_eq!(graph.get_common_ancestor(&hash, &hash).unwrap(), hash);
    }

    #[test]
    fn get_common_ancestor_finds_shared_root() {
        let mut graph = EventGraph::new();
        let root = Event::new("root");
        let root_hash = root.hash().unwrap();
        graph.register(root_hash, root.clone());

        let mut left = Event::new("left");
        left.set_parent(&root).unwrap();
        let left_hash = left.hash().unwrap();
        graph.register(left_hash, left);

        let mut right = Event::new("right");
        right.set_parent(&root).unwrap();
        let right_hash = right.hash().unwrap();
        graph.register(right_hash, right);

        assert_eq!(
            graph.get_common_ancestor(&left_hash, &right_hash).unwrap(),
            root_hash
        );
    }

    #[test]
    fn get_common_ancestor_missing_parent_is_an_error() {
        let mut graph = EventGraph::new();
        let root = Event::new("root");
        let mut child = Event::new("child");
        child.set_parent(&root).unwrap();
        let child_hash = child.hash().unwrap();
        graph.register(child_hash, child);

        let other = Event::new("other");
        let other_hash = other.hash().unwrap();
        graph.register(other_hash, other);

        assert!(graph.get_common_ancestor(&child_hash, &other_hash).is_err());
    }

    #[test]
    fn get_common_ancestor_no_shared_history_is_an_error() {
        let mut graph = EventGraph::new();
        let a = Event::new("a");
        let a_hash = a.hash().unwrap();
        graph.register(a_hash, a);
        let b = Event::new("b");
        let b_hash = b.hash().unwrap();
        graph.register(b_hash, b);
        assert_eq!(
            graph.get_common_ancestor(&a_hash, &b_hash).unwrap_err(),
            GraphError::NoCommonAncestor(a_hash, b_hash)
        );
    }

    #[test]
    fn get_common_ancestor_root_vs_far_child() {
        let mut graph = EventGraph::new();
        let root = Event::new("root");
        let root_hash = root.hash().unwrap();
        graph.register(root_hash, root.clone());

        let mut mid = Event::new("mid");
        mid.set_parent(&root).unwrap();
        let mid_hash = mid.hash().unwrap();
        graph.register(mid_hash, mid.clone());

        let mut far = Event::new("far");
        far.set_parent(&mid).unwrap();
        let far_hash = far.hash().unwrap();
        graph.register(far_hash, far);

        assert_eq!(
            graph.get_common_ancestor(&root_hash, &far_hash).unwrap(),
            root_hash
        );
    }

    #[test]
    fn get_root_follows_chain_to_root() {
        let mut graph = EventGraph::new();
        let root = Event::new("root");
        let root_hash = root.hash().unwrap();
        graph.register(root_hash, root.clone());
        let mut child = Event::new("child");
        child.set_parent(&root).unwrap();
        let child_hash = child.hash().unwrap();
        graph.register(child_hash, child);
        assert_eq!(graph.get_root(&child_hash).unwrap(), root_hash);
    }

    /// A genuine parent cycle cannot arise from well-formed, content-addressed
    /// registration (an event's hash can never equal one of its own
    /// ancestors' parent fields by construction), so this fabricates one
    /// directly via `register`'s explicit-hash parameter, the way a
    /// corrupt or malicious peer's registrations might.
    fn fabricate_cycle() -> (EventGraph, Hash) {
        let mut graph = EventGraph::new();
        let hash_a = Hash::from_hex("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        let hash_b = Hash::from_hex("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap();
        let mut a = Event::new("a");
        a.parent = hash_b.to_hex();
        let mut b = Event::new("b");
        b.parent = hash_a.to_hex();
        graph.register(hash_a, a);
        graph.register(hash_b, b);
        (graph, hash_a)
    }

    #[test]
    fn get_root_detects_cycle() {
        let (graph, hash_a) = fabricate_cycle();
        assert!(matches!(graph.get_root(&hash_a), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn chain_to_detects_cycle() {
        let (graph, hash_a) = fabricate_cycle();
        assert!(matches!(graph.chain_to(&hash_a), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn compatible_with_true_for_shared_ancestor_false_otherwise() {
        let mut graph = EventGraph::new();
        let root = Event::new("root");
        let root_hash = root.hash().unwrap();
        graph.register(root_hash, root.clone());
        let mut left = Event::new("left");
        left.set_parent(&root).unwrap();
        let left_hash = left.hash().unwrap();
        graph.register(left_hash, left);
        let unrelated = Event::new("unrelated");
        let unrelated_hash = unrelated.hash().unwrap();
        graph.register(unrelated_hash, unrelated);

        assert!(graph.compatible_with(&root_hash, &left_hash));
        assert!(!graph.compatible_with(&left_hash, &unrelated_hash));
    }

    #[test]
    fn document_apply_extends_state_without_advancing_tip() {
        let mut doc = Document::new();
        let event = set_event(None, &["hello"], json!("world"));
        doc.apply(&event).unwrap();
        assert_eq!(doc.export(), json!({"hello": "world"}));
        assert_eq!(doc.tip(), None);
    }

    #[test]
    fn document_apply_fails_fast_and_leaves_state_unchanged() {
        let mut doc = Document::new();
        let bad = Event::new("DELETE");
        assert!(doc.apply(&bad).is_err());
        assert_eq!(doc.export(), json!({}));
    }

    #[test]
    fn goto_replays_from_root_with_implicit_seed() {
        let mut doc = Document::new();
        let root = set_event(None, &["hello"], json!("world"));
        let root_hash = doc.register(root.clone()).unwrap();
        let child = set_event(Some(&root), &["goodbye"], json!("moon"));
        let child_hash = doc.register(child).unwrap();

        let mut seen = Vec::new();
        doc.goto(child_hash, |p| seen.push(p.clone())).unwrap();

        assert_eq!(
            doc.export(),
            json!({"hello": "world", "goodbye": "moon"})
        );
        assert_eq!(doc.tip(), Some(child_hash));
        // implicit seed + root SET + child SET
        assert_eq!(seen.len(), 3);
        let _ = root_hash;
    }

    #[test]
    fn goto_missing_parent_is_an_error() {
        let mut doc = Document::new();
        let root = Event::new("root");
        let mut child = Event::new("child");
        child.set_parent(&root).unwrap();
        let child_hash = doc.register(child).unwrap();
        assert!(doc.goto(child_hash, |_| {}).is_err());
    }

    #[test]
    fn goto_bad_primitive_leaves_tip_unmoved() {
        let mut doc = Document::new();
        let bad = Event::new("DELETE");
        let bad_hash = doc.register(bad).unwrap();
        assert!(doc.goto(bad_hash, |_| {}).is_err());
        assert_eq!(doc.tip(), None);
    }
}
