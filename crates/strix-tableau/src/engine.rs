//! Tableau expansion engine
//!
//! One engine instance runs one satisfiability or consistency query. Labels
//! are expanded off a todo queue; disjunctions and merge choices open branch
//! points; a clash carries the union of the dependency sets that produced
//! it and the engine backtracks straight to the deepest level named there,
//! flipping the choice or propagating the clash outward when the branch is
//! exhausted.

use crate::graph::{ArcId, CompletionGraph, NodeId, NodeKind};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strix_core::{Bp, ConceptId, DagEntry, DepSet, IndividualId, RoleId, TermDag};
use strix_data::{DataEntry, DataTypeReasoner};
use strix_roles::{RoleAutomaton, RoleBox};
use tracing::{debug, trace};

/// Result of a tableau run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// saturation succeeded: the graph is a model witness
    Sat,
    /// every branch clashed
    Unsat,
    /// the caller's interrupt flag was raised
    Cancelled,
}

/// Lazy-unfolding entry for a named concept
#[derive(Debug, Clone)]
pub struct Unfolding {
    /// primitive concepts unfold on positive occurrences only
    pub primitive: bool,
    pub definition: Bp,
}

/// What a branch point chooses between
#[derive(Debug, Clone)]
pub enum BranchKind {
    /// pick one disjunct to add to a node
    Or {
        node: NodeId,
        choices: Vec<Bp>,
        /// node whose labels must be re-examined after each pick
        watch: Option<NodeId>,
    },
    /// pick one pair of successors to merge for a ≤ restriction
    Merge { pairs: Vec<(NodeId, NodeId)> },
}

#[derive(Debug)]
struct BranchContext {
    level: usize,
    kind: BranchKind,
    /// justification of the branching fact itself
    base_dep: DepSet,
    next: usize,
    /// clash sets accumulated from failed alternatives
    branch_dep: DepSet,
}

impl BranchContext {
    fn total(&self) -> usize {
        match &self.kind {
            BranchKind::Or { choices, .. } => choices.len(),
            BranchKind::Merge { pairs } => pairs.len(),
        }
    }

    fn has_next(&self) -> bool {
        self.next < self.total()
    }
}

/// The tableau engine proper
pub struct TableauEngine<'a> {
    dag: &'a mut TermDag,
    roles: &'a RoleBox,
    unfolding: &'a HashMap<ConceptId, Unfolding>,
    /// internalized general axioms, added to every node; ⊤ when absent
    gci: Bp,
    graph: CompletionGraph,
    dtr: DataTypeReasoner,
    todo: VecDeque<(NodeId, Bp)>,
    /// generating-rule entries postponed on blocked nodes
    backlog: Vec<(NodeId, Bp)>,
    branches: Vec<BranchContext>,
    nominal_nodes: HashMap<IndividualId, NodeId>,
    interrupt: Arc<AtomicBool>,
    rule_applications: usize,
}

impl<'a> TableauEngine<'a> {
    pub fn new(
        dag: &'a mut TermDag,
        roles: &'a RoleBox,
        unfolding: &'a HashMap<ConceptId, Unfolding>,
        gci: Bp,
        interrupt: Arc<AtomicBool>,
    ) -> TableauEngine<'a> {
        TableauEngine {
            dag,
            roles,
            unfolding,
            gci,
            graph: CompletionGraph::new(),
            dtr: DataTypeReasoner::new(),
            todo: VecDeque::new(),
            backlog: Vec::new(),
            branches: Vec::new(),
            nominal_nodes: HashMap::new(),
            interrupt: interrupt.clone(),
            rule_applications: 0,
        }
    }

    pub fn graph(&self) -> &CompletionGraph {
        &self.graph
    }

    pub fn rule_applications(&self) -> usize {
        self.rule_applications
    }

    // initialisation

    /// Root node for a plain satisfiability test
    pub fn init_root(&mut self, bps: &[Bp]) -> Result<NodeId, DepSet> {
        let root = self.graph.create_node(NodeKind::Blockable);
        for bp in bps {
            self.add_label(root, *bp, &DepSet::empty())?;
        }
        self.add_gci(root, &DepSet::empty())?;
        Ok(root)
    }

    /// Permanent node for a named individual
    pub fn init_nominal(&mut self, ind: IndividualId, labels: &[Bp]) -> Result<NodeId, DepSet> {
        let node = self.nominal_node(ind);
        for bp in labels {
            self.add_label(node, *bp, &DepSet::empty())?;
        }
        Ok(node)
    }

    /// Asserted relation between two individuals
    pub fn assert_related(
        &mut self,
        from: IndividualId,
        role: RoleId,
        to: IndividualId,
    ) -> Result<(), DepSet> {
        let f = self.nominal_node(from);
        let t = self.nominal_node(to);
        self.add_edge(f, t, role, &DepSet::empty())?;
        Ok(())
    }

    /// Asserted concrete value: a fresh data successor carrying the literal
    pub fn assert_data(
        &mut self,
        from: IndividualId,
        role: RoleId,
        value: Bp,
    ) -> Result<(), DepSet> {
        let f = self.nominal_node(from);
        let d = self.graph.create_node(NodeKind::Blockable);
        self.add_edge(f, d, role, &DepSet::empty())?;
        self.add_label(d, value, &DepSet::empty())?;
        Ok(())
    }

    /// Asserted distinctness of two individuals
    pub fn assert_different(&mut self, a: IndividualId, b: IndividualId) {
        let na = self.nominal_node(a);
        let nb = self.nominal_node(b);
        self.graph.add_inequality(na, nb, &DepSet::empty());
    }

    /// Cached nominal node, if it survived all restores
    fn live_nominal(&self, ind: IndividualId) -> Option<NodeId> {
        let id = *self.nominal_nodes.get(&ind)?;
        if id.0 < self.graph.n_active() && self.graph.node(id).kind == NodeKind::Nominal(ind) {
            Some(id)
        } else {
            None
        }
    }

    fn nominal_node(&mut self, ind: IndividualId) -> NodeId {
        if let Some(id) = self.live_nominal(ind) {
            return id;
        }
        let node = self.graph.create_node(NodeKind::Nominal(ind));
        self.nominal_nodes.insert(ind, node);
        let iname = self.dag.intern(&strix_core::Expr::Individual(ind));
        // deterministic facts: empty dependency set
        let _ = self.add_label(node, iname, &DepSet::empty());
        let _ = self.add_gci(node, &DepSet::empty());
        node
    }

    // the main loop

    /// Saturate the graph; `Sat` leaves the model in place for inspection
    pub fn run(&mut self) -> Outcome {
        loop {
            if self.interrupt.load(Ordering::Relaxed) {
                debug!("tableau interrupted");
                return Outcome::Cancelled;
            }
            let item = match self.todo.pop_front() {
                Some(item) => item,
                None => {
                    debug!(
                        nodes = self.graph.n_active(),
                        rules = self.rule_applications,
                        "saturation complete"
                    );
                    return Outcome::Sat;
                }
            };
            if let Err(clash) = self.apply(item.0, item.1) {
                trace!(%clash, "clash detected");
                if !self.backjump(clash) {
                    return Outcome::Unsat;
                }
            }
        }
    }

    // label handling

    /// Add a label, detecting an immediate clash against the complement
    fn add_label(&mut self, node: NodeId, bp: Bp, dep: &DepSet) -> Result<(), DepSet> {
        if bp == Bp::TOP {
            return Ok(());
        }
        if bp == Bp::BOTTOM {
            return Err(dep.clone());
        }
        if let Some(existing) = self.graph.node(node).find_label(bp.negate()) {
            return Err(existing.dep.union(dep));
        }
        if self.graph.add_label(node, bp, dep) {
            self.todo.push_back((node, bp));
            // a label change anywhere can unblock a postponed node
            self.flush_backlog();
        }
        Ok(())
    }

    fn add_gci(&mut self, node: NodeId, dep: &DepSet) -> Result<(), DepSet> {
        if self.gci != Bp::TOP {
            self.add_label(node, self.gci, dep)?;
        }
        Ok(())
    }

    fn flush_backlog(&mut self) {
        for item in std::mem::take(&mut self.backlog) {
            self.todo.push_back(item);
        }
    }

    /// Re-queue every label of a node for rule dispatch
    fn requeue_node(&mut self, node: NodeId) {
        let bps: Vec<Bp> = self.graph.node(node).label.iter().map(|c| c.bp).collect();
        for bp in bps {
            self.todo.push_back((node, bp));
        }
    }

    /// Rebuild the queue from scratch after a restore
    fn reset_todo(&mut self) {
        self.todo.clear();
        self.backlog.clear();
        let nodes: Vec<NodeId> = self.graph.active_nodes().collect();
        for node in nodes {
            if !self.graph.node(node).is_pblocked() {
                self.requeue_node(node);
            }
        }
    }

    // edge handling

    /// Create an edge and fire everything a new edge implies: the role's
    /// domain and range, topmost-functional vertices on both ends, and a
    /// role-disjointness check against the parallel edges
    fn add_edge(&mut self, from: NodeId, to: NodeId, role: RoleId, dep: &DepSet) -> Result<ArcId, DepSet> {
        let role = self.roles.resolve(role);
        // disjoint roles may not connect the same pair of nodes
        for a in self.graph.neighbour_arcs(from) {
            let arc = self.graph.arc(a);
            if arc.end == to && self.roles.are_disjoint(arc.role, role) {
                return Err(arc.dep.union(dep));
            }
        }
        let arc = self.graph.create_edge(from, to, role, dep);
        self.fire_edge(arc, dep)?;
        Ok(arc)
    }

    fn fire_edge(&mut self, arc: ArcId, dep: &DepSet) -> Result<(), DepSet> {
        let to = self.graph.arc(arc).end;
        let from = self.graph.arc(self.graph.arc(arc).reverse).end;
        let role = self.roles.resolve(self.graph.arc(arc).role);
        let inv = self.roles.resolve(role.inverse());

        let domain = self.roles.role(role).bp_domain;
        if domain.is_valid() && domain != Bp::TOP {
            self.add_label(from, domain, dep)?;
        }
        let range = self.roles.role(inv).bp_domain;
        if range.is_valid() && range != Bp::TOP {
            self.add_label(to, range, dep)?;
        }
        // functionality fires on the origin of every sub-role edge
        for f in self.roles.role(role).top_func.clone() {
            let fbp = self.roles.role(f).functional_bp;
            if fbp.is_valid() {
                self.add_label(from, fbp, dep)?;
            }
        }
        for f in self.roles.role(inv).top_func.clone() {
            let fbp = self.roles.role(f).functional_bp;
            if fbp.is_valid() {
                self.add_label(to, fbp, dep)?;
            }
        }
        // universal restrictions on both ends see a new neighbour
        self.requeue_node(from);
        self.requeue_node(to);
        Ok(())
    }

    // rule dispatch

    fn apply(&mut self, node: NodeId, bp: Bp) -> Result<(), DepSet> {
        let dep = match self.graph.node(node).find_label(bp) {
            Some(e) => e.dep.clone(),
            None => return Ok(()),
        };
        if self.graph.node(node).is_pblocked() {
            return Ok(());
        }
        self.rule_applications += 1;
        let entry = self.dag.entry(bp).clone();
        match (bp.is_positive(), entry) {
            (_, DagEntry::Invalid) | (_, DagEntry::Top) => Ok(()),
            (true, DagEntry::And(children)) => {
                for c in children {
                    self.add_label(node, c, &dep)?;
                }
                Ok(())
            }
            (false, DagEntry::And(children)) => self.apply_or(node, &children, &dep),
            (true, DagEntry::Forall { role, state, concept }) => {
                if self.dag.is_functional_vertex(bp) {
                    self.apply_functional(node, role, &dep)
                } else {
                    self.apply_forall(node, role, state, concept, &dep)
                }
            }
            (false, DagEntry::Forall { role, concept, .. }) => {
                self.apply_exists(node, bp, role, concept.negate(), &dep)
            }
            (true, DagEntry::AtLeast { n, role, concept }) => {
                self.apply_at_least(node, bp, n, role, concept, &dep)
            }
            (false, DagEntry::AtLeast { n, role, concept }) => {
                self.apply_at_most(node, n - 1, role, concept, &dep)
            }
            (true, DagEntry::CName(id)) => {
                if let Some(u) = self.unfolding.get(&id) {
                    let def = u.definition;
                    if def.is_valid() {
                        self.add_label(node, def, &dep)?;
                    }
                }
                Ok(())
            }
            (false, DagEntry::CName(id)) => {
                if let Some(u) = self.unfolding.get(&id) {
                    if !u.primitive && u.definition.is_valid() {
                        let def = u.definition.negate();
                        self.add_label(node, def, &dep)?;
                    }
                }
                Ok(())
            }
            (true, DagEntry::IName(ind)) => self.apply_nominal(node, ind, &dep),
            (false, DagEntry::IName(ind)) => {
                if let Some(other) = self.live_nominal(ind) {
                    let (other, odep) = self.graph.resolve(other);
                    if other == node {
                        let entry_dep = dep.union(&odep);
                        return Err(entry_dep);
                    }
                    self.graph.add_inequality(node, other, &dep.union(&odep));
                }
                Ok(())
            }
            (true, DagEntry::Proj { role, concept, proj_role }) => {
                self.apply_proj(node, role, concept, proj_role, &dep)
            }
            (false, DagEntry::Proj { .. }) => Ok(()),
            (_, DagEntry::DataType(_))
            | (_, DagEntry::DataValue(_))
            | (_, DagEntry::DataExpr { .. }) => self.check_data_node(node),
        }
    }

    /// ⊔-rule over the negated conjuncts of `¬(C₁ ⊓ … ⊓ Cₙ)`
    ///
    /// Boolean constraint propagation first: satisfied disjunctions are
    /// skipped, a single open disjunct is added deterministically.
    fn apply_or(&mut self, node: NodeId, children: &[Bp], dep: &DepSet) -> Result<(), DepSet> {
        let choices: Vec<Bp> = children.iter().map(|c| c.negate()).collect();
        if choices.iter().any(|c| self.graph.node(node).has_label(*c)) {
            return Ok(());
        }
        let mut viable = Vec::new();
        let mut refuted_dep = dep.clone();
        for c in &choices {
            match self.graph.node(node).find_label(c.negate()) {
                Some(e) => refuted_dep.union_with(&e.dep),
                None => viable.push(*c),
            }
        }
        match viable.len() {
            0 => Err(refuted_dep),
            1 => self.add_label(node, viable[0], &refuted_dep),
            _ => self.create_branch(
                BranchKind::Or { node, choices: viable, watch: None },
                dep.clone(),
            ),
        }
    }

    /// ∀-rule driven by the role automaton
    fn apply_forall(
        &mut self,
        node: NodeId,
        role: RoleId,
        state: u32,
        concept: Bp,
        dep: &DepSet,
    ) -> Result<(), DepSet> {
        let role = self.roles.resolve(role);
        let automaton = self.roles.role(role).automaton.clone();
        // a reflexive role sees the node as its own successor
        if state == RoleAutomaton::INITIAL && self.roles.role(role).reflexive {
            self.add_label(node, concept, dep)?;
        }
        // ε-closure stays on this node
        for q in automaton.epsilon_closure(state) {
            if q != state {
                let forall = self.dag.make_forall(role, q, concept);
                self.add_label(node, forall, dep)?;
            }
            if q == RoleAutomaton::FINAL && state != RoleAutomaton::FINAL {
                self.add_label(node, concept, dep)?;
            }
        }
        // labelled transitions walk the edges
        for arc_id in self.graph.neighbour_arcs(node) {
            let arc = self.graph.arc(arc_id);
            let (end, edge_role, edge_dep) = (arc.end, arc.role, arc.dep.clone());
            if self.graph.node(end).is_pblocked() {
                continue;
            }
            for t in automaton.from_state(state) {
                let label = match t.label {
                    Some(l) => l,
                    None => continue,
                };
                if !self.roles.is_sub_role(edge_role, label) {
                    continue;
                }
                let to_state = t.to;
                let step_dep = dep.union(&edge_dep);
                let forall = self.dag.make_forall(role, to_state, concept);
                self.add_label(end, forall, &step_dep)?;
                if to_state == RoleAutomaton::FINAL {
                    self.add_label(end, concept, &step_dep)?;
                }
            }
        }
        Ok(())
    }

    /// ∃-rule: `¬∀R.C` needs an R-successor satisfying `¬C`
    fn apply_exists(
        &mut self,
        node: NodeId,
        bp: Bp,
        role: RoleId,
        witness_concept: Bp,
        dep: &DepSet,
    ) -> Result<(), DepSet> {
        let role = self.roles.resolve(role);
        let has_witness = self
            .graph
            .successors_by_role(node, role, self.roles)
            .iter()
            .any(|a| {
                let end = self.graph.arc(*a).end;
                self.graph.node(end).has_label(witness_concept) || witness_concept == Bp::TOP
            });
        if has_witness {
            return Ok(());
        }
        if self.graph.is_blocked(node) {
            self.backlog.push((node, bp));
            return Ok(());
        }
        let fresh = self.graph.create_node(NodeKind::Blockable);
        self.add_edge(node, fresh, role, dep)?;
        self.add_label(fresh, witness_concept, dep)?;
        self.add_gci(fresh, dep)?;
        Ok(())
    }

    /// ≥-rule: ensure n distinct successors; fresh witnesses are pairwise ≠
    fn apply_at_least(
        &mut self,
        node: NodeId,
        bp: Bp,
        n: u32,
        role: RoleId,
        concept: Bp,
        dep: &DepSet,
    ) -> Result<(), DepSet> {
        let role = self.roles.resolve(role);
        let mut witnesses: Vec<NodeId> = Vec::new();
        for a in self.graph.successors_by_role(node, role, self.roles) {
            let end = self.graph.arc(a).end;
            if !witnesses.contains(&end)
                && (concept == Bp::TOP || self.graph.node(end).has_label(concept))
            {
                witnesses.push(end);
            }
        }
        if witnesses.len() >= n as usize {
            return Ok(());
        }
        if self.graph.is_blocked(node) {
            self.backlog.push((node, bp));
            return Ok(());
        }
        let missing = n as usize - witnesses.len();
        let mut fresh_nodes = Vec::new();
        for _ in 0..missing {
            let fresh = self.graph.create_node(NodeKind::Blockable);
            self.add_edge(node, fresh, role, dep)?;
            self.add_label(fresh, concept, dep)?;
            self.add_gci(fresh, dep)?;
            fresh_nodes.push(fresh);
        }
        for i in 0..fresh_nodes.len() {
            for j in i + 1..fresh_nodes.len() {
                self.graph.add_inequality(fresh_nodes[i], fresh_nodes[j], dep);
            }
        }
        Ok(())
    }

    /// ≤-rule with the choose-rule folded in
    fn apply_at_most(
        &mut self,
        node: NodeId,
        limit: u32,
        role: RoleId,
        concept: Bp,
        dep: &DepSet,
    ) -> Result<(), DepSet> {
        let role = self.roles.resolve(role);
        // choose-rule: every successor must commit to C or ¬C
        if concept != Bp::TOP {
            for a in self.graph.successors_by_role(node, role, self.roles) {
                let arc = self.graph.arc(a);
                let (end, edge_dep) = (arc.end, arc.dep.clone());
                let committed = self.graph.node(end).has_label(concept)
                    || self.graph.node(end).has_label(concept.negate());
                if !committed {
                    return self.create_branch(
                        BranchKind::Or {
                            node: end,
                            choices: vec![concept, concept.negate()],
                            watch: Some(node),
                        },
                        dep.union(&edge_dep),
                    );
                }
            }
        }
        // count committed successors
        let mut candidates: Vec<(NodeId, DepSet)> = Vec::new();
        for a in self.graph.successors_by_role(node, role, self.roles) {
            let arc = self.graph.arc(a);
            let (end, edge_dep) = (arc.end, arc.dep.clone());
            if candidates.iter().any(|(c, _)| *c == end) {
                continue;
            }
            if concept == Bp::TOP {
                candidates.push((end, edge_dep));
            } else if let Some(e) = self.graph.node(end).find_label(concept) {
                candidates.push((end, edge_dep.union(&e.dep)));
            }
        }
        if candidates.len() <= limit as usize {
            return Ok(());
        }
        // over the limit: some pair has to merge
        let mut full_dep = dep.clone();
        for (_, d) in &candidates {
            full_dep.union_with(d);
        }
        let mut pairs = Vec::new();
        for i in 0..candidates.len() {
            for j in i + 1..candidates.len() {
                pairs.push((candidates[i].0, candidates[j].0));
            }
        }
        if pairs.is_empty() {
            // a ≤0 restriction with a witness: nothing to merge, plain clash
            return Err(full_dep);
        }
        self.create_branch(BranchKind::Merge { pairs }, full_dep)
    }

    /// Functionality: at most one successor of the flagged role
    fn apply_functional(&mut self, node: NodeId, role: RoleId, dep: &DepSet) -> Result<(), DepSet> {
        let role = self.roles.resolve(role);
        loop {
            let mut ends: Vec<(NodeId, DepSet)> = Vec::new();
            for a in self.graph.successors_by_role(node, role, self.roles) {
                let arc = self.graph.arc(a);
                if !ends.iter().any(|(e, _)| *e == arc.end) {
                    ends.push((arc.end, arc.dep.clone()));
                }
            }
            if ends.len() < 2 {
                return Ok(());
            }
            // merging two successors of a functional role is deterministic
            let (a, da) = ends[0].clone();
            let (b, db) = ends[1].clone();
            let merge_dep = dep.union(&da).union(&db);
            let (from, to) = self.merge_direction(a, b);
            self.merge_nodes(from, to, &merge_dep)?;
        }
    }

    /// Nominal rule: a blockable node carrying `{a}` collapses into the
    /// nominal's permanent node
    fn apply_nominal(&mut self, node: NodeId, ind: IndividualId, dep: &DepSet) -> Result<(), DepSet> {
        let target = self.nominal_node(ind);
        let (target, tdep) = self.graph.resolve(target);
        if target == node {
            return Ok(());
        }
        let full_dep = dep.union(&tdep);
        let (from, to) = self.merge_direction(node, target);
        self.merge_nodes(from, to, &full_dep)
    }

    /// Projection: an R-successor in `C` is also a proj-role successor
    fn apply_proj(
        &mut self,
        node: NodeId,
        role: RoleId,
        concept: Bp,
        proj_role: RoleId,
        dep: &DepSet,
    ) -> Result<(), DepSet> {
        let role = self.roles.resolve(role);
        let proj_role = self.roles.resolve(proj_role);
        for a in self.graph.successors_by_role(node, role, self.roles) {
            let end = self.graph.arc(a).end;
            let edge_dep = self.graph.arc(a).dep.clone();
            let centry = match self.graph.node(end).find_label(concept) {
                Some(e) => e.dep.clone(),
                None => continue,
            };
            let exists = self
                .graph
                .successors_by_role(node, proj_role, self.roles)
                .iter()
                .any(|p| self.graph.arc(*p).end == end);
            if !exists {
                let proj_dep = dep.union(&edge_dep).union(&centry);
                self.add_edge(node, end, proj_role, &proj_dep)?;
            }
        }
        Ok(())
    }

    /// Batch-check all concrete-domain labels of a node
    fn check_data_node(&mut self, node: NodeId) -> Result<(), DepSet> {
        self.dtr.clear();
        let labels = self.graph.node(node).label.clone();
        for entry in labels {
            let decoded = match self.dag.entry(entry.bp) {
                DagEntry::DataType(dt) => DataEntry::Type(*dt),
                DagEntry::DataValue(v) => DataEntry::Value(v.clone()),
                DagEntry::DataExpr { datatype, facets } => {
                    DataEntry::Expr(*datatype, facets.clone())
                }
                _ => continue,
            };
            self.dtr.add_data_entry(entry.bp.is_positive(), &decoded, &entry.dep);
        }
        match self.dtr.check_clash() {
            Some(clash) => Err(clash),
            None => Ok(()),
        }
    }

    // merging

    /// Prefer merging into nominal and older nodes
    fn merge_direction(&self, a: NodeId, b: NodeId) -> (NodeId, NodeId) {
        let an = self.graph.node(a).is_nominal();
        let bn = self.graph.node(b).is_nominal();
        match (an, bn) {
            (true, false) => (b, a),
            (false, true) => (a, b),
            _ => {
                if a.0 <= b.0 {
                    (b, a)
                } else {
                    (a, b)
                }
            }
        }
    }

    /// Merge `from` into `to`: labels first (with clash detection), then
    /// edges, inequalities and the purge
    fn merge_nodes(&mut self, from: NodeId, to: NodeId, dep: &DepSet) -> Result<(), DepSet> {
        if let Some(d) = self.graph.inequality(from, to) {
            return Err(d.union(dep));
        }
        let labels = self.graph.node(from).label.clone();
        for entry in labels {
            self.add_label(to, entry.bp, &entry.dep.union(dep))?;
        }
        let mut out = Vec::new();
        self.graph.merge(from, to, dep, self.roles, &mut out);
        for arc in out {
            let arc_dep = self.graph.arc(arc).dep.clone();
            self.fire_edge(arc, &arc_dep)?;
        }
        self.requeue_node(to);
        Ok(())
    }

    // branching

    fn create_branch(&mut self, kind: BranchKind, base_dep: DepSet) -> Result<(), DepSet> {
        let level = self.graph.save();
        debug_assert_eq!(level, self.branches.len() + 1);
        let mut ctx = BranchContext {
            level,
            kind,
            base_dep,
            next: 0,
            branch_dep: DepSet::empty(),
        };
        trace!(level, options = ctx.total(), "branch point");
        let result = self.apply_alternative(&mut ctx);
        self.branches.push(ctx);
        result
    }

    fn apply_alternative(&mut self, ctx: &mut BranchContext) -> Result<(), DepSet> {
        let idx = ctx.next;
        ctx.next += 1;
        let mut dep = ctx.base_dep.clone();
        dep.add_level(ctx.level);
        if !ctx.has_next() {
            // the last alternative carries the blame for all failed ones
            dep.union_with(&ctx.branch_dep);
        }
        match ctx.kind.clone() {
            BranchKind::Or { node, choices, watch } => {
                self.add_label(node, choices[idx], &dep)?;
                if let Some(w) = watch {
                    self.requeue_node(w);
                }
                Ok(())
            }
            BranchKind::Merge { pairs } => {
                let (a, b) = pairs[idx];
                let (a, adep) = self.graph.resolve(a);
                let (b, bdep) = self.graph.resolve(b);
                let dep = dep.union(&adep).union(&bdep);
                if a == b {
                    return Ok(());
                }
                let (from, to) = self.merge_direction(a, b);
                self.merge_nodes(from, to, &dep)
            }
        }
    }

    /// Dependency-directed backtracking; false means the clash is
    /// unconditional and the whole query is unsatisfiable
    fn backjump(&mut self, mut clash: DepSet) -> bool {
        loop {
            let level = match clash.max() {
                Some(l) if l >= 1 => l,
                _ => return false,
            };
            // branch points deeper than the blamed level are irrelevant
            while self.branches.len() > level {
                self.branches.pop();
            }
            if self.branches.len() < level {
                return false;
            }
            let mut ctx = self.branches.pop().expect("context for the blamed level");
            debug_assert_eq!(ctx.level, level);
            self.graph.restore(level);
            clash.delete(level);
            ctx.branch_dep.union_with(&clash);
            if ctx.has_next() {
                let reopened = self.graph.save();
                debug_assert_eq!(reopened, level);
                self.reset_todo();
                trace!(level, alternative = ctx.next, "flipping branch");
                match self.apply_alternative(&mut ctx) {
                    Ok(()) => {
                        self.branches.push(ctx);
                        return true;
                    }
                    Err(new_clash) => {
                        self.branches.push(ctx);
                        clash = new_clash;
                    }
                }
            } else {
                // exhausted: propagate the accumulated justification outward
                clash = ctx.base_dep.union(&ctx.branch_dep);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strix_core::Expr;

    struct Fixture {
        dag: TermDag,
        roles: RoleBox,
        unfolding: HashMap<ConceptId, Unfolding>,
    }

    fn fixture(n_roles: usize) -> Fixture {
        let mut roles = RoleBox::new();
        for i in 0..n_roles {
            roles.add_role(&format!("r{}", i));
        }
        roles.finalize().unwrap();
        Fixture { dag: TermDag::new(), roles, unfolding: HashMap::new() }
    }

    fn sat(fx: &mut Fixture, expr: Expr) -> Outcome {
        let bp = fx.dag.intern(&expr);
        let flag = Arc::new(AtomicBool::new(false));
        let mut engine =
            TableauEngine::new(&mut fx.dag, &fx.roles, &fx.unfolding, Bp::TOP, flag);
        match engine.init_root(&[bp]) {
            Ok(_) => engine.run(),
            // a clash while seeding is an unconditional contradiction
            Err(_) => Outcome::Unsat,
        }
    }

    fn c(n: usize) -> Expr {
        Expr::Concept(ConceptId(n))
    }

    fn r(n: usize) -> RoleId {
        RoleId(2 * n)
    }

    #[test]
    fn test_atomic_satisfiable() {
        let mut fx = fixture(0);
        assert_eq!(sat(&mut fx, c(0)), Outcome::Sat);
    }

    #[test]
    fn test_direct_contradiction() {
        let mut fx = fixture(0);
        let e = Expr::snf_and(vec![c(0), Expr::snf_not(c(0))]);
        // normalization already collapses this to ⊥
        assert_eq!(sat(&mut fx, e), Outcome::Unsat);
    }

    #[test]
    fn test_disjunction_explores_both_branches() {
        let mut fx = fixture(0);
        // (A ⊔ B) ⊓ ¬A is satisfiable through the B branch
        let e = Expr::snf_and(vec![
            Expr::snf_or(vec![c(0), c(1)]),
            Expr::snf_not(c(0)),
        ]);
        assert_eq!(sat(&mut fx, e), Outcome::Sat);
        // (A ⊔ B) ⊓ ¬A ⊓ ¬B clashes on every branch
        let e = Expr::snf_and(vec![
            Expr::snf_or(vec![c(0), c(1)]),
            Expr::snf_not(c(0)),
            Expr::snf_not(c(1)),
        ]);
        assert_eq!(sat(&mut fx, e), Outcome::Unsat);
    }

    #[test]
    fn test_exists_forall_interaction() {
        let mut fx = fixture(1);
        // ∃r.A ⊓ ∀r.¬A is unsatisfiable
        let e = Expr::snf_and(vec![
            Expr::snf_exists(r(0), c(0)),
            Expr::snf_forall(r(0), Expr::snf_not(c(0))),
        ]);
        assert_eq!(sat(&mut fx, e), Outcome::Unsat);
        // ∃r.A ⊓ ∀r.B is satisfiable
        let e = Expr::snf_and(vec![
            Expr::snf_exists(r(0), c(0)),
            Expr::snf_forall(r(0), c(1)),
        ]);
        assert_eq!(sat(&mut fx, e), Outcome::Sat);
    }

    #[test]
    fn test_at_least_against_at_most() {
        let mut fx = fixture(1);
        // ≥2 r.A ⊓ ≤1 r.A is unsatisfiable: the fresh witnesses are ≠
        let e = Expr::snf_and(vec![
            Expr::snf_ge(2, r(0), c(0)),
            Expr::snf_le(1, r(0), c(0)),
        ]);
        assert_eq!(sat(&mut fx, e), Outcome::Unsat);
        // ≥2 r.A ⊓ ≤2 r.A is fine
        let e = Expr::snf_and(vec![
            Expr::snf_ge(2, r(0), c(0)),
            Expr::snf_le(2, r(0), c(0)),
        ]);
        assert_eq!(sat(&mut fx, e), Outcome::Sat);
    }

    #[test]
    fn test_blocking_terminates_infinite_chain() {
        let mut fx = fixture(1);
        // A ⊓ ∃r.A with a GCI forcing ∃r.A everywhere would loop without
        // blocking; here the existential alone suffices: each witness
        // carries the same label as its parent and gets blocked
        let loop_expr = Expr::snf_and(vec![c(0), Expr::snf_exists(r(0), c(0))]);
        let bp = fx.dag.intern(&loop_expr);
        let gci_expr = Expr::snf_or(vec![Expr::snf_not(c(0)), Expr::snf_exists(r(0), c(0))]);
        let gci = fx.dag.intern(&gci_expr);
        let flag = Arc::new(AtomicBool::new(false));
        let mut engine = TableauEngine::new(&mut fx.dag, &fx.roles, &fx.unfolding, gci, flag);
        engine.init_root(&[bp]).unwrap();
        assert_eq!(engine.run(), Outcome::Sat);
    }

    #[test]
    fn test_transitive_role_propagates_forall() {
        let mut fx = fixture(0);
        let mut roles = RoleBox::new();
        let t = roles.add_role("t");
        roles.set_transitive(t).unwrap();
        roles.finalize().unwrap();
        fx.roles = roles;
        // ∀t.¬A ⊓ ∃t.(∃t.A) clashes because ∀ propagates over the chain
        let e = Expr::snf_and(vec![
            Expr::snf_forall(t, Expr::snf_not(c(0))),
            Expr::snf_exists(t, Expr::snf_exists(t, c(0))),
        ]);
        assert_eq!(sat(&mut fx, e), Outcome::Unsat);
    }

    #[test]
    fn test_role_chain_via_automaton() {
        let mut fx = fixture(0);
        let mut roles = RoleBox::new();
        let r0 = roles.add_role("r0");
        let s0 = roles.add_role("s0");
        let t0 = roles.add_role("t0");
        roles.add_composition(&[r0, s0], t0).unwrap();
        roles.finalize().unwrap();
        fx.roles = roles;
        // ∀t.¬A ⊓ ∃r.(∃s.A) is unsatisfiable under r∘s ⊑ t
        let e = Expr::snf_and(vec![
            Expr::snf_forall(t0, Expr::snf_not(c(0))),
            Expr::snf_exists(r0, Expr::snf_exists(s0, c(0))),
        ]);
        assert_eq!(sat(&mut fx, e), Outcome::Unsat);
    }

    #[test]
    fn test_at_most_one_merges_successors() {
        let mut fx = fixture(0);
        let mut roles = RoleBox::new();
        let f = roles.add_role("f");
        roles.finalize().unwrap();
        fx.roles = roles;
        // ∃f.A ⊓ ∃f.B ⊓ ∀f.¬(A ⊓ B) alone is satisfiable
        let e = Expr::snf_and(vec![
            Expr::snf_exists(f, c(0)),
            Expr::snf_exists(f, c(1)),
            Expr::snf_forall(f, Expr::snf_not(Expr::snf_and(vec![c(0), c(1)]))),
        ]);
        assert_eq!(sat(&mut fx, e), Outcome::Sat);
        // but ≤1 f ⊤ forces the two witnesses together
        let e = Expr::snf_and(vec![
            Expr::snf_exists(f, c(0)),
            Expr::snf_exists(f, c(1)),
            Expr::snf_le(1, f, Expr::Top),
            Expr::snf_forall(f, Expr::snf_not(Expr::snf_and(vec![c(0), c(1)]))),
        ]);
        assert_eq!(sat(&mut fx, e), Outcome::Unsat);
    }

    #[test]
    fn test_functional_vertex_merges_successors() {
        let mut fx = fixture(0);
        let mut roles = RoleBox::new();
        let f = roles.add_role("f");
        roles.set_functional(f);
        roles.finalize().unwrap();
        // wire the functional vertex the way the kernel does
        let fbp = fx.dag.functional_vertex(f);
        roles.set_functional_vertex(f, fbp);
        fx.roles = roles;
        // two f-successors carrying incompatible labels must merge and clash
        let e = Expr::snf_and(vec![
            Expr::snf_exists(f, c(0)),
            Expr::snf_exists(f, Expr::snf_not(c(0))),
        ]);
        assert_eq!(sat(&mut fx, e), Outcome::Unsat);
        // a single successor is fine
        let e = Expr::snf_exists(f, c(0));
        assert_eq!(sat(&mut fx, e), Outcome::Sat);
    }

    #[test]
    fn test_nominal_merge() {
        let mut fx = fixture(1);
        let a = IndividualId(0);
        let bp_nom = fx.dag.intern(&Expr::Individual(a));
        let bp_c = fx.dag.intern(&c(0));
        let flag = Arc::new(AtomicBool::new(false));
        let mut engine =
            TableauEngine::new(&mut fx.dag, &fx.roles, &fx.unfolding, Bp::TOP, flag);
        // root carries {a} so it merges into a's nominal node
        let root = engine.init_root(&[bp_nom, bp_c]).unwrap();
        assert_eq!(engine.run(), Outcome::Sat);
        let (resolved, _) = engine.graph().resolve(root);
        let nominal = engine.nominal_nodes[&a];
        let (nominal_resolved, _) = engine.graph().resolve(nominal);
        assert_eq!(resolved, nominal_resolved);
        // the nominal node inherited the concept label
        assert!(engine.graph().node(nominal_resolved).has_label(bp_c));
    }

    #[test]
    fn test_different_individuals_clash_when_forced_equal() {
        let mut fx = fixture(1);
        let a = IndividualId(0);
        let b = IndividualId(1);
        let nom_b = fx.dag.intern(&Expr::Individual(b));
        let flag = Arc::new(AtomicBool::new(false));
        let mut engine =
            TableauEngine::new(&mut fx.dag, &fx.roles, &fx.unfolding, Bp::TOP, flag);
        engine.init_nominal(a, &[nom_b]).unwrap();
        engine.assert_different(a, b);
        // a carries {b} but a ≠ b: the nominal merge must clash
        assert_eq!(engine.run(), Outcome::Unsat);
    }

    #[test]
    fn test_interrupt_flag_cancels() {
        let mut fx = fixture(0);
        let bp = fx.dag.intern(&c(0));
        let flag = Arc::new(AtomicBool::new(true));
        let mut engine =
            TableauEngine::new(&mut fx.dag, &fx.roles, &fx.unfolding, Bp::TOP, flag);
        engine.init_root(&[bp]).unwrap();
        assert_eq!(engine.run(), Outcome::Cancelled);
    }

    #[test]
    fn test_backjump_target_is_clash_max() {
        let mut fx = fixture(0);
        // ((A ⊔ B)) ⊓ ((C ⊔ D)) ⊓ ¬A ⊓ ¬B: the clash never involves the
        // C/D branch, so backtracking must skip over it and exhaust A/B
        let e = Expr::snf_and(vec![
            Expr::snf_or(vec![c(0), c(1)]),
            Expr::snf_or(vec![c(2), c(3)]),
            Expr::snf_not(c(0)),
            Expr::snf_not(c(1)),
        ]);
        assert_eq!(sat(&mut fx, e), Outcome::Unsat);
    }
}
