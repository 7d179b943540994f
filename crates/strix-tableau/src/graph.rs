//! The completion graph
//!
//! Nodes and arcs are allocated from arenas; callers hold ids only. Every
//! mutation made under a branching level is either covered by arena
//! truncation, by a per-node save record, or by the rare-event log, so
//! `restore(level)` rewinds the whole graph in one pass.

use strix_core::{Bp, DepSet, IndividualId, RoleId};
use strix_roles::RoleBox;
use tracing::trace;

/// Index of a node in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Index of an arc in the arc arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArcId(pub usize);

/// Blockable nodes are branch-local tree nodes; nominal nodes are permanent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Blockable,
    Nominal(IndividualId),
}

/// A concept label together with its justification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptWDep {
    pub bp: Bp,
    pub dep: DepSet,
}

/// Snapshot of a node's mutable lengths at one branching level
#[derive(Debug, Clone, Copy)]
struct NodeSave {
    level: usize,
    label_len: usize,
    parents_len: usize,
    children_len: usize,
    inequal_len: usize,
}

/// A completion-graph node
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// concept labels with dependency sets
    pub label: Vec<ConceptWDep>,
    /// arcs towards predecessors
    pub parents: Vec<ArcId>,
    /// arcs towards successors
    pub children: Vec<ArcId>,
    /// nodes this one must stay distinct from
    pub inequal: Vec<(NodeId, DepSet)>,
    /// purge state: merged into the given node under the given dependencies
    pub pblocked: Option<(NodeId, DepSet)>,
    saves: Vec<NodeSave>,
}

impl Node {
    fn init(&mut self, kind: NodeKind) {
        self.kind = kind;
        self.label.clear();
        self.parents.clear();
        self.children.clear();
        self.inequal.clear();
        self.pblocked = None;
        self.saves.clear();
    }

    pub fn is_nominal(&self) -> bool {
        matches!(self.kind, NodeKind::Nominal(_))
    }

    pub fn is_blockable(&self) -> bool {
        matches!(self.kind, NodeKind::Blockable)
    }

    pub fn is_pblocked(&self) -> bool {
        self.pblocked.is_some()
    }

    /// Find a label entry by pointer
    pub fn find_label(&self, bp: Bp) -> Option<&ConceptWDep> {
        self.label.iter().find(|c| c.bp == bp)
    }

    pub fn has_label(&self, bp: Bp) -> bool {
        self.find_label(bp).is_some()
    }

    /// The set of concept pointers, used for equality blocking
    fn label_set(&self) -> Vec<Bp> {
        let mut set: Vec<Bp> = self.label.iter().map(|c| c.bp).collect();
        set.sort();
        set
    }

    fn save(&mut self, level: usize) -> bool {
        if level == 0 {
            return false;
        }
        if self.saves.last().map(|s| s.level) == Some(level) {
            return false;
        }
        self.saves.push(NodeSave {
            level,
            label_len: self.label.len(),
            parents_len: self.parents.len(),
            children_len: self.children.len(),
            inequal_len: self.inequal.len(),
        });
        true
    }

    /// Rewind to the state recorded just before `level` was entered
    fn restore(&mut self, level: usize) {
        let mut snapshot: Option<NodeSave> = None;
        while let Some(s) = self.saves.last() {
            if s.level >= level {
                snapshot = self.saves.pop();
            } else {
                break;
            }
        }
        if let Some(s) = snapshot {
            self.label.truncate(s.label_len);
            self.parents.truncate(s.parents_len);
            self.children.truncate(s.children_len);
            self.inequal.truncate(s.inequal_len);
        }
    }
}

/// A directed arc; always created together with its reverse
#[derive(Debug, Clone)]
pub struct Arc {
    pub role: RoleId,
    pub dep: DepSet,
    /// the node this arc leads to
    pub end: NodeId,
    pub reverse: ArcId,
    pub valid: bool,
}

/// Infrequent mutations that arena truncation cannot undo
#[derive(Debug, Clone)]
enum RareOp {
    SetPBlocked { node: NodeId },
    InvalidateEdge { arc: ArcId },
}

#[derive(Debug, Clone, Copy)]
struct SaveState {
    level: usize,
    end_used: usize,
    saved_len: usize,
    arcs_len: usize,
    rare_len: usize,
}

/// Arena-backed completion graph with LIFO save/restore
#[derive(Debug, Default)]
pub struct CompletionGraph {
    nodes: Vec<Node>,
    arcs: Vec<Arc>,
    /// nodes `0..end_used` are alive; slots above are reusable corpses
    end_used: usize,
    /// touch log since the oldest save point
    saved_nodes: Vec<NodeId>,
    rare: Vec<(usize, RareOp)>,
    stack: Vec<SaveState>,
    branching_level: usize,
}

impl CompletionGraph {
    pub fn new() -> CompletionGraph {
        CompletionGraph::default()
    }

    pub fn branching_level(&self) -> usize {
        self.branching_level
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn arc(&self, id: ArcId) -> &Arc {
        &self.arcs[id.0]
    }

    /// Ids of the currently alive nodes
    pub fn active_nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.end_used).map(NodeId)
    }

    pub fn n_active(&self) -> usize {
        self.end_used
    }

    fn touch(&mut self, id: NodeId) {
        let level = self.branching_level;
        if self.nodes[id.0].save(level) {
            self.saved_nodes.push(id);
        }
    }

    /// Allocate a node, reusing a slot freed by a restore when possible
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.end_used);
        if self.end_used < self.nodes.len() {
            self.nodes[id.0].init(kind);
            self.nodes[id.0].id = id;
        } else {
            self.nodes.push(Node {
                id,
                kind,
                label: Vec::new(),
                parents: Vec::new(),
                children: Vec::new(),
                inequal: Vec::new(),
                pblocked: None,
                saves: Vec::new(),
            });
        }
        self.end_used += 1;
        id
    }

    /// Add a label entry; duplicates are ignored unless the new dependency
    /// set is a strict subset of the recorded one
    ///
    /// Returns whether the label set changed.
    pub fn add_label(&mut self, id: NodeId, bp: Bp, dep: &DepSet) -> bool {
        if let Some(existing) = self.nodes[id.0].label.iter_mut().find(|c| c.bp == bp) {
            if dep.is_subset_of(&existing.dep) && existing.dep != *dep {
                existing.dep = dep.clone();
            }
            return false;
        }
        self.touch(id);
        self.nodes[id.0].label.push(ConceptWDep { bp, dep: dep.clone() });
        true
    }

    /// Record `a ≠ b` symmetrically
    pub fn add_inequality(&mut self, a: NodeId, b: NodeId, dep: &DepSet) {
        if a == b {
            return;
        }
        if self.nodes[a.0].inequal.iter().any(|(n, _)| *n == b) {
            return;
        }
        self.touch(a);
        self.touch(b);
        self.nodes[a.0].inequal.push((b, dep.clone()));
        self.nodes[b.0].inequal.push((a, dep.clone()));
    }

    /// Look up an inequality between two nodes
    pub fn inequality(&self, a: NodeId, b: NodeId) -> Option<&DepSet> {
        self.nodes[a.0].inequal.iter().find(|(n, _)| *n == b).map(|(_, d)| d)
    }

    /// Create the paired arcs `from → to` and `to → from`
    pub fn create_edge(&mut self, from: NodeId, to: NodeId, role: RoleId, dep: &DepSet) -> ArcId {
        self.touch(from);
        self.touch(to);
        let forward = ArcId(self.arcs.len());
        let backward = ArcId(self.arcs.len() + 1);
        self.arcs.push(Arc {
            role,
            dep: dep.clone(),
            end: to,
            reverse: backward,
            valid: true,
        });
        self.arcs.push(Arc {
            role: role.inverse(),
            dep: dep.clone(),
            end: from,
            reverse: forward,
            valid: true,
        });
        self.nodes[from.0].children.push(forward);
        self.nodes[to.0].parents.push(backward);
        trace!(from = from.0, to = to.0, role = role.0, "edge created");
        forward
    }

    /// Clear both directions of an arc; the arena slot stays but is ignored
    pub fn invalidate_edge(&mut self, arc: ArcId) {
        if !self.arcs[arc.0].valid {
            return;
        }
        let rev = self.arcs[arc.0].reverse;
        self.arcs[arc.0].valid = false;
        self.arcs[rev.0].valid = false;
        self.rare.push((self.branching_level, RareOp::InvalidateEdge { arc }));
    }

    /// Valid neighbour arcs of a node, parents first
    pub fn neighbour_arcs(&self, id: NodeId) -> Vec<ArcId> {
        self.nodes[id.0]
            .parents
            .iter()
            .chain(self.nodes[id.0].children.iter())
            .copied()
            .filter(|a| self.arcs[a.0].valid)
            .collect()
    }

    /// Valid successor arcs whose role is subsumed by `role`
    pub fn successors_by_role(&self, id: NodeId, role: RoleId, roles: &RoleBox) -> Vec<ArcId> {
        self.neighbour_arcs(id)
            .into_iter()
            .filter(|a| {
                let arc = &self.arcs[a.0];
                !self.nodes[arc.end.0].is_pblocked() && roles.is_sub_role(arc.role, role)
            })
            .collect()
    }

    /// Resolve a node through completed merges
    pub fn resolve(&self, mut id: NodeId) -> (NodeId, DepSet) {
        let mut dep = DepSet::empty();
        while let Some((target, d)) = &self.nodes[id.0].pblocked {
            dep.union_with(d);
            id = *target;
        }
        (id, dep)
    }

    // merging

    /// Merge `from` into `to`; newly created arcs are appended to `out_edges`
    ///
    /// Label copying is the engine's business (it must run clash detection);
    /// this handles edges, the inequality relation and purging, in that
    /// order.
    pub fn merge(
        &mut self,
        from: NodeId,
        to: NodeId,
        dep: &DepSet,
        roles: &RoleBox,
        out_edges: &mut Vec<ArcId>,
    ) {
        trace!(from = from.0, to = to.0, "merging nodes");
        // 1. predecessors of `from` become predecessors of `to`; loop arcs
        //    on `from` are dropped, the label copy recreates their effect
        for arc in self.nodes[from.0].parents.clone() {
            if self.arcs[arc.0].end == from {
                self.invalidate_edge(arc);
                continue;
            }
            if let Some(moved) = self.move_edge(to, arc, true, dep, roles) {
                out_edges.push(moved);
            }
        }
        // 2. nominal successors of `from` become successors of `to`;
        //    blockable successors are left for the purge
        for arc in self.nodes[from.0].children.clone() {
            if let Some(moved) = self.move_edge(to, arc, false, dep, roles) {
                out_edges.push(moved);
            }
        }
        // 3. everything distinct from `from` is distinct from `to`
        for (n, d) in self.nodes[from.0].inequal.clone() {
            self.add_inequality(to, n, &d.union(dep));
        }
        // 4. purge `from`
        self.purge(from, to, dep);
    }

    /// Redirect one arc of a merged node onto `to`
    ///
    /// Skips already-purged arcs, reflexive arcs (they are recreated by the
    /// label copy) and, in the successor direction, everything that is not a
    /// nominal node. An existing parallel edge with a subsuming role is
    /// reused instead of duplicated.
    fn move_edge(
        &mut self,
        to: NodeId,
        arc: ArcId,
        is_uplink: bool,
        dep: &DepSet,
        roles: &RoleBox,
    ) -> Option<ArcId> {
        if !self.arcs[arc.0].valid {
            return None;
        }
        let other = self.arcs[arc.0].end;
        if !is_uplink && !self.nodes[other.0].is_nominal() {
            return None;
        }
        let mut created = None;
        // reflexive arcs disappear with the merged node
        if other != to {
            let role = if is_uplink {
                // a parent arc of the merged node carries the inverse role,
                // seen from the merged node; recreate the original direction
                self.arcs[arc.0].role.inverse()
            } else {
                self.arcs[arc.0].role
            };
            let moved_dep = self.arcs[arc.0].dep.union(dep);
            let duplicate = self.neighbour_arcs(to).into_iter().any(|a| {
                let existing = &self.arcs[a.0];
                existing.end == other
                    && if is_uplink {
                        roles.is_sub_role(existing.role.inverse(), role)
                    } else {
                        roles.is_sub_role(existing.role, role)
                    }
            });
            if !duplicate {
                created = Some(if is_uplink {
                    // recreate as other → to
                    self.create_edge(other, to, role, &moved_dep)
                } else {
                    self.create_edge(to, other, role, &moved_dep)
                });
            }
        }
        self.invalidate_edge(arc);
        created
    }

    /// Mark a node merged away and recursively purge its blockable subtree
    pub fn purge(&mut self, id: NodeId, root: NodeId, dep: &DepSet) {
        if self.nodes[id.0].is_pblocked() {
            return;
        }
        self.nodes[id.0].pblocked = Some((root, dep.clone()));
        self.rare.push((self.branching_level, RareOp::SetPBlocked { node: id }));
        for arc in self.nodes[id.0].children.clone() {
            if !self.arcs[arc.0].valid {
                continue;
            }
            let end = self.arcs[arc.0].end;
            if self.nodes[end.0].is_blockable() {
                self.purge(end, root, dep);
            } else {
                self.invalidate_edge(arc);
            }
        }
    }

    // blocking

    /// Parent node of a blockable node, if any
    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0]
            .parents
            .iter()
            .find(|a| self.arcs[a.0].valid)
            .map(|a| self.arcs[a.0].end)
    }

    /// Direct (equality) blocker of a blockable node
    pub fn direct_blocker(&self, id: NodeId) -> Option<NodeId> {
        if !self.nodes[id.0].is_blockable() {
            return None;
        }
        let own = self.nodes[id.0].label_set();
        let mut current = self.parent_of(id);
        while let Some(a) = current {
            if self.nodes[a.0].is_blockable() && self.nodes[a.0].label_set() == own {
                return Some(a);
            }
            current = self.parent_of(a);
        }
        None
    }

    /// A node is blocked when it or any ancestor has a direct blocker
    pub fn is_blocked(&self, id: NodeId) -> bool {
        if self.nodes[id.0].is_pblocked() {
            return true;
        }
        let mut current = Some(id);
        while let Some(a) = current {
            if !self.nodes[a.0].is_blockable() {
                return false;
            }
            if self.direct_blocker(a).is_some() {
                return true;
            }
            current = self.parent_of(a);
        }
        false
    }

    // save/restore

    /// Open a new branching level; returns it
    pub fn save(&mut self) -> usize {
        self.branching_level += 1;
        self.stack.push(SaveState {
            level: self.branching_level,
            end_used: self.end_used,
            saved_len: self.saved_nodes.len(),
            arcs_len: self.arcs.len(),
            rare_len: self.rare.len(),
        });
        self.branching_level
    }

    /// Rewind to the state just before `level` was opened
    pub fn restore(&mut self, level: usize) {
        debug_assert!(level >= 1);
        let mut snapshot = None;
        while let Some(s) = self.stack.last() {
            if s.level >= level {
                snapshot = self.stack.pop();
            } else {
                break;
            }
        }
        let s = match snapshot {
            Some(s) => s,
            None => return,
        };
        // undo rare mutations newest-first
        while self.rare.len() > s.rare_len {
            let (_, op) = self.rare.pop().unwrap();
            match op {
                RareOp::SetPBlocked { node } => {
                    self.nodes[node.0].pblocked = None;
                }
                RareOp::InvalidateEdge { arc } => {
                    let rev = self.arcs[arc.0].reverse;
                    self.arcs[arc.0].valid = true;
                    self.arcs[rev.0].valid = true;
                }
            }
        }
        self.end_used = s.end_used;
        for i in s.saved_len..self.saved_nodes.len() {
            let id = self.saved_nodes[i];
            // nodes past the watermark are dead anyway
            if id.0 < self.end_used {
                self.nodes[id.0].restore(level);
            }
        }
        self.saved_nodes.truncate(s.saved_len);
        self.arcs.truncate(s.arcs_len);
        self.branching_level = level - 1;
        trace!(level, nodes = self.end_used, "graph restored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strix_core::Bp;

    fn roles_with(n: usize) -> RoleBox {
        let mut rb = RoleBox::new();
        for i in 0..n {
            rb.add_role(&format!("r{}", i));
        }
        rb.finalize().unwrap();
        rb
    }

    fn dep(level: usize) -> DepSet {
        DepSet::single(level)
    }

    #[test]
    fn test_create_edge_pairs_arcs() {
        let roles = roles_with(1);
        let mut g = CompletionGraph::new();
        let a = g.create_node(NodeKind::Blockable);
        let b = g.create_node(NodeKind::Blockable);
        let arc = g.create_edge(a, b, RoleId(0), &DepSet::empty());
        let rev = g.arc(arc).reverse;
        assert_eq!(g.arc(arc).end, b);
        assert_eq!(g.arc(rev).end, a);
        assert_eq!(g.arc(rev).role, RoleId(0).inverse());
        assert_eq!(g.successors_by_role(a, RoleId(0), &roles).len(), 1);
    }

    #[test]
    fn test_add_label_idempotent_with_subset_replacement() {
        let mut g = CompletionGraph::new();
        let a = g.create_node(NodeKind::Blockable);
        assert!(g.add_label(a, Bp::pos(5), &dep(2)));
        assert!(!g.add_label(a, Bp::pos(5), &dep(2)));
        // a smaller dependency set replaces the recorded one
        assert!(!g.add_label(a, Bp::pos(5), &DepSet::empty()));
        assert!(g.node(a).find_label(Bp::pos(5)).unwrap().dep.is_empty());
    }

    #[test]
    fn test_save_restore_roundtrip() {
        let roles = roles_with(2);
        let mut g = CompletionGraph::new();
        let a = g.create_node(NodeKind::Blockable);
        g.add_label(a, Bp::pos(3), &DepSet::empty());

        let level = g.save();
        let b = g.create_node(NodeKind::Blockable);
        g.create_edge(a, b, RoleId(0), &dep(level));
        g.add_label(a, Bp::pos(4), &dep(level));
        g.add_label(b, Bp::pos(5), &dep(level));
        g.add_inequality(a, b, &dep(level));

        g.restore(level);
        assert_eq!(g.n_active(), 1);
        assert_eq!(g.node(a).label.len(), 1);
        assert!(g.node(a).has_label(Bp::pos(3)));
        assert!(g.node(a).children.is_empty());
        assert!(g.node(a).inequal.is_empty());
        assert_eq!(g.successors_by_role(a, RoleId(0), &roles).len(), 0);
    }

    #[test]
    fn test_nested_restore_skips_levels() {
        let mut g = CompletionGraph::new();
        let a = g.create_node(NodeKind::Blockable);
        let l1 = g.save();
        g.add_label(a, Bp::pos(2), &dep(l1));
        let l2 = g.save();
        g.add_label(a, Bp::pos(3), &dep(l2));
        let l3 = g.save();
        g.add_label(a, Bp::pos(4), &dep(l3));
        // jump over level 3 straight back to the state before level 2
        g.restore(l2);
        assert!(g.node(a).has_label(Bp::pos(2)));
        assert!(!g.node(a).has_label(Bp::pos(3)));
        assert!(!g.node(a).has_label(Bp::pos(4)));
        assert_eq!(g.branching_level(), l1);
    }

    #[test]
    fn test_merge_redirects_predecessors_and_purges() {
        let roles = roles_with(2);
        let mut g = CompletionGraph::new();
        let x = g.create_node(NodeKind::Blockable);
        let from = g.create_node(NodeKind::Blockable);
        let to = g.create_node(NodeKind::Nominal(IndividualId(0)));
        let child = g.create_node(NodeKind::Blockable);
        g.create_edge(x, from, RoleId(0), &DepSet::empty());
        g.create_edge(from, child, RoleId(2), &DepSet::empty());

        let mut out = Vec::new();
        g.merge(from, to, &dep(1), &roles, &mut out);

        // predecessor arc now reaches `to`
        assert_eq!(g.successors_by_role(x, RoleId(0), &roles).len(), 1);
        let arc = g.successors_by_role(x, RoleId(0), &roles)[0];
        assert_eq!(g.arc(arc).end, to);
        // the merged node and its blockable subtree are purged
        assert!(g.node(from).is_pblocked());
        assert!(g.node(child).is_pblocked());
        assert_eq!(g.resolve(from).0, to);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_merge_restore_undoes_purge() {
        let roles = roles_with(1);
        let mut g = CompletionGraph::new();
        let from = g.create_node(NodeKind::Blockable);
        let to = g.create_node(NodeKind::Nominal(IndividualId(0)));
        let level = g.save();
        let mut out = Vec::new();
        g.merge(from, to, &dep(level), &roles, &mut out);
        assert!(g.node(from).is_pblocked());
        g.restore(level);
        assert!(!g.node(from).is_pblocked());
    }

    #[test]
    fn test_equality_blocking() {
        let mut g = CompletionGraph::new();
        let root = g.create_node(NodeKind::Blockable);
        let child = g.create_node(NodeKind::Blockable);
        let grandchild = g.create_node(NodeKind::Blockable);
        g.create_edge(root, child, RoleId(0), &DepSet::empty());
        g.create_edge(child, grandchild, RoleId(0), &DepSet::empty());
        g.add_label(root, Bp::pos(7), &DepSet::empty());
        g.add_label(child, Bp::pos(7), &DepSet::empty());
        g.add_label(child, Bp::pos(8), &DepSet::empty());
        g.add_label(grandchild, Bp::pos(7), &DepSet::empty());
        g.add_label(grandchild, Bp::pos(8), &DepSet::empty());
        // grandchild's label equals child's label: blocked
        assert_eq!(g.direct_blocker(grandchild), Some(child));
        assert!(g.is_blocked(grandchild));
        assert!(!g.is_blocked(child));
        // a descendant of a blocked node is indirectly blocked
        let below = g.create_node(NodeKind::Blockable);
        g.create_edge(grandchild, below, RoleId(0), &DepSet::empty());
        assert!(g.is_blocked(below));
    }

    #[test]
    fn test_invalidate_edge_clears_both_directions() {
        let roles = roles_with(1);
        let mut g = CompletionGraph::new();
        let a = g.create_node(NodeKind::Blockable);
        let b = g.create_node(NodeKind::Blockable);
        let arc = g.create_edge(a, b, RoleId(0), &DepSet::empty());
        g.invalidate_edge(arc);
        assert!(g.successors_by_role(a, RoleId(0), &roles).is_empty());
        assert!(g.successors_by_role(b, RoleId(0).inverse(), &roles).is_empty());
    }
}
