//! The reasoning kernel
//!
//! Lifecycle and status machine, the tell/ask API, preprocessing
//! (absorption, told subsumers, GCI internalization, DAG wiring, sort
//! labels), and the classification/realization drivers.

use crate::tbox::{Concept, Individual};
use crate::KernelError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use strix_core::{
    Bp, ConceptId, DagEntry, DataValue, Datatype, EntryId, Expr, IndividualId, NamedCollection,
    NamedItem, RoleId, TermDag,
};
use strix_roles::RoleBox;
use strix_tableau::{Outcome, TableauEngine, Unfolding};
use strix_taxonomy::{ActorKind, Classifier, Taxonomy, TaxonomyActor, TaxonomyBuilder};
use tracing::{debug, info};

/// Sentinel entries anchoring the taxonomy
const TOP_ENTRY: EntryId = EntryId::Concept(ConceptId(usize::MAX));
const BOTTOM_ENTRY: EntryId = EntryId::Concept(ConceptId(usize::MAX - 1));

/// KB lifecycle states, strictly ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KbStatus {
    Empty,
    Loading,
    CChecked,
    Classified,
    Realised,
}

impl KbStatus {
    pub fn code(self) -> u32 {
        match self {
            KbStatus::Empty => 0,
            KbStatus::Loading => 1,
            KbStatus::CChecked => 2,
            KbStatus::Classified => 3,
            KbStatus::Realised => 4,
        }
    }

    pub fn from_code(code: u32) -> Option<KbStatus> {
        match code {
            0 => Some(KbStatus::Empty),
            1 => Some(KbStatus::Loading),
            2 => Some(KbStatus::CChecked),
            3 => Some(KbStatus::Classified),
            4 => Some(KbStatus::Realised),
            _ => None,
        }
    }
}

/// Collaborator-provided configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelOptions {
    /// take the completely-defined shortcut during classification
    pub use_completely_defined: bool,
    /// split subsumption tests over non-interacting signatures
    pub use_sorted_reasoning: bool,
}

impl Default for KernelOptions {
    fn default() -> Self {
        KernelOptions { use_completely_defined: true, use_sorted_reasoning: true }
    }
}

/// Interned ABox facts, seeded into every nominal-aware tableau run
#[derive(Debug, Clone, Default)]
pub(crate) struct AboxFacts {
    pub types: Vec<(IndividualId, Bp)>,
    pub related: Vec<(IndividualId, RoleId, IndividualId)>,
    pub data: Vec<(IndividualId, RoleId, Bp)>,
    pub different: Vec<(IndividualId, IndividualId)>,
    pub individuals: Vec<IndividualId>,
}

fn seed_abox(engine: &mut TableauEngine<'_>, abox: &AboxFacts) -> bool {
    for &ind in &abox.individuals {
        if engine.init_nominal(ind, &[]).is_err() {
            return false;
        }
    }
    for &(ind, bp) in &abox.types {
        if engine.init_nominal(ind, &[bp]).is_err() {
            return false;
        }
    }
    for &(a, r, b) in &abox.related {
        if engine.assert_related(a, r, b).is_err() {
            return false;
        }
    }
    for &(a, r, bp) in &abox.data {
        if engine.assert_data(a, r, bp).is_err() {
            return false;
        }
    }
    for &(a, b) in &abox.different {
        engine.assert_different(a, b);
    }
    true
}

/// The KB facade
pub struct ReasoningKernel {
    pub(crate) options: KernelOptions,
    pub(crate) interrupt: Arc<AtomicBool>,
    pub(crate) status: KbStatus,
    pub(crate) dag: TermDag,
    pub(crate) roles: RoleBox,
    pub(crate) concepts: NamedCollection<Concept>,
    pub(crate) individuals: NamedCollection<Individual>,
    /// general axioms that absorption could not place on a name
    pub(crate) gcis: Vec<(Expr, Expr)>,
    /// ABox, as told
    pub(crate) instance_of: Vec<(IndividualId, Expr)>,
    pub(crate) related: Vec<(IndividualId, RoleId, IndividualId)>,
    pub(crate) data_assertions: Vec<(IndividualId, RoleId, DataValue)>,
    pub(crate) different: Vec<(IndividualId, IndividualId)>,
    // derived state, rebuilt by `prepare`
    pub(crate) prepared: bool,
    pub(crate) unfolding: HashMap<ConceptId, Unfolding>,
    pub(crate) gci_bp: Bp,
    pub(crate) abox_facts: Option<AboxFacts>,
    pub(crate) cd_safe: bool,
    pub(crate) sorted_upto: usize,
    pub(crate) consistent: Option<bool>,
    pub(crate) taxonomy: Option<Taxonomy>,
    pub(crate) realised: bool,
}

impl Default for ReasoningKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl ReasoningKernel {
    pub fn new() -> ReasoningKernel {
        ReasoningKernel::with_options(KernelOptions::default())
    }

    pub fn with_options(options: KernelOptions) -> ReasoningKernel {
        ReasoningKernel {
            options,
            interrupt: Arc::new(AtomicBool::new(false)),
            status: KbStatus::Empty,
            dag: TermDag::new(),
            roles: RoleBox::new(),
            concepts: NamedCollection::new(),
            individuals: NamedCollection::new(),
            gcis: Vec::new(),
            instance_of: Vec::new(),
            related: Vec::new(),
            data_assertions: Vec::new(),
            different: Vec::new(),
            prepared: false,
            unfolding: HashMap::new(),
            gci_bp: Bp::TOP,
            abox_facts: None,
            cd_safe: false,
            sorted_upto: 0,
            consistent: None,
            taxonomy: None,
            realised: false,
        }
    }

    // lifecycle

    pub fn status(&self) -> KbStatus {
        self.status
    }

    pub fn options(&self) -> &KernelOptions {
        &self.options
    }

    /// Flag polled at every tableau rule application; setting it aborts the
    /// running query with `Cancelled`
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    /// Empty the KB, keeping options and the interrupt flag
    pub fn clear_kb(&mut self) {
        let options = self.options.clone();
        let interrupt = self.interrupt.clone();
        *self = ReasoningKernel::with_options(options);
        self.interrupt = interrupt;
    }

    /// Drop everything, options included
    pub fn release_kb(&mut self) {
        *self = ReasoningKernel::new();
    }

    fn invalidate(&mut self) {
        self.status = KbStatus::Loading;
        self.prepared = false;
        self.consistent = None;
        self.taxonomy = None;
        self.abox_facts = None;
        self.realised = false;
    }

    // naming

    pub fn concept(&mut self, name: &str) -> ConceptId {
        self.invalidate_if_new(self.concepts.find(name).is_none());
        ConceptId(self.concepts.get_or_create(name))
    }

    pub fn individual(&mut self, name: &str) -> IndividualId {
        self.invalidate_if_new(self.individuals.find(name).is_none());
        IndividualId(self.individuals.get_or_create(name))
    }

    pub fn role(&mut self, name: &str) -> RoleId {
        self.invalidate_if_new(self.roles.find(name).is_none());
        self.roles.add_role(name)
    }

    pub fn data_role(&mut self, name: &str) -> RoleId {
        self.invalidate_if_new(self.roles.find(name).is_none());
        self.roles.add_data_role(name)
    }

    fn invalidate_if_new(&mut self, is_new: bool) {
        if is_new {
            self.invalidate();
        }
    }

    pub fn datatype(&self, name: &str) -> Result<Datatype, KernelError> {
        match name {
            "string" => Ok(Datatype::String),
            "integer" => Ok(Datatype::Integer),
            "boolean" => Ok(Datatype::Boolean),
            other => Err(KernelError::UndefinedName(other.to_string())),
        }
    }

    pub fn find_concept(&self, name: &str) -> Result<ConceptId, KernelError> {
        self.concepts
            .find(name)
            .map(ConceptId)
            .ok_or_else(|| KernelError::UndefinedName(name.to_string()))
    }

    pub fn find_individual(&self, name: &str) -> Result<IndividualId, KernelError> {
        self.individuals
            .find(name)
            .map(IndividualId)
            .ok_or_else(|| KernelError::UndefinedName(name.to_string()))
    }

    pub fn find_role(&self, name: &str) -> Result<RoleId, KernelError> {
        self.roles.find(name).ok_or_else(|| KernelError::UndefinedName(name.to_string()))
    }

    pub fn concept_name(&self, id: ConceptId) -> &str {
        self.concepts.get(id.0).name()
    }

    pub fn individual_name(&self, id: IndividualId) -> &str {
        self.individuals.get(id.0).name()
    }

    // tell interface; a failed tell leaves the KB untouched because every
    // validation happens before the first mutation

    /// `C ⊑ D`; absorbed onto the name when C is one
    pub fn tell_implies(&mut self, c: Expr, d: Expr) {
        self.invalidate();
        if let Expr::Concept(id) = c {
            if self.concepts.get(id.0).is_primitive() {
                self.concepts.get_mut(id.0).add_desc(d);
                return;
            }
        }
        self.gcis.push((c, d));
    }

    /// `C ≡ D`; a name without prior definition absorbs it exactly
    pub fn tell_equivalent(&mut self, c: Expr, d: Expr) {
        self.invalidate();
        if let Expr::Concept(id) = c {
            let concept = self.concepts.get_mut(id.0);
            if concept.definition.is_none() {
                concept.definition = Some(d);
                concept.named_mut().primitive = false;
                return;
            }
        }
        self.gcis.push((c.clone(), d.clone()));
        self.gcis.push((d, c));
    }

    /// Pairwise disjointness of the given concepts
    pub fn tell_disjoint(&mut self, exprs: &[Expr]) {
        self.invalidate();
        for i in 0..exprs.len() {
            for j in i + 1..exprs.len() {
                self.tell_implies(exprs[i].clone(), Expr::snf_not(exprs[j].clone()));
            }
        }
    }

    pub fn tell_sub_role(&mut self, r: RoleId, s: RoleId) {
        self.invalidate();
        self.roles.add_sub_role(r, s);
    }

    pub fn tell_equiv_roles(&mut self, r: RoleId, s: RoleId) {
        self.invalidate();
        self.roles.add_sub_role(r, s);
        self.roles.add_sub_role(s, r);
    }

    pub fn tell_inverse_roles(&mut self, r: RoleId, s: RoleId) -> Result<(), KernelError> {
        self.roles.set_inverse(r, s)?;
        self.invalidate();
        Ok(())
    }

    pub fn tell_transitive(&mut self, r: RoleId) -> Result<(), KernelError> {
        self.roles.set_transitive(r)?;
        self.invalidate();
        Ok(())
    }

    pub fn tell_reflexive(&mut self, r: RoleId) {
        self.invalidate();
        self.roles.set_reflexive(r);
    }

    pub fn tell_functional(&mut self, r: RoleId) {
        self.invalidate();
        self.roles.set_functional(r);
    }

    pub fn tell_disjoint_roles(&mut self, r: RoleId, s: RoleId) {
        self.invalidate();
        self.roles.add_disjoint(r, s);
    }

    pub fn tell_domain(&mut self, r: RoleId, c: Expr) {
        self.invalidate();
        self.roles.set_domain(r, c);
    }

    pub fn tell_range(&mut self, r: RoleId, c: Expr) {
        self.invalidate();
        self.roles.set_range(r, c);
    }

    /// `R₁∘…∘Rₙ ⊑ S`
    pub fn tell_role_chain(&mut self, chain: &[RoleId], s: RoleId) -> Result<(), KernelError> {
        self.roles.add_composition(chain, s)?;
        self.invalidate();
        Ok(())
    }

    pub fn tell_instance_of(&mut self, a: IndividualId, c: Expr) {
        self.invalidate();
        self.individuals.get_mut(a.0).types.push(c.clone());
        self.instance_of.push((a, c));
    }

    pub fn tell_related(&mut self, a: IndividualId, r: RoleId, b: IndividualId) {
        self.invalidate();
        self.related.push((a, r, b));
    }

    pub fn tell_data_value(&mut self, a: IndividualId, r: RoleId, v: DataValue) {
        self.invalidate();
        self.data_assertions.push((a, r, v));
    }

    pub fn tell_different(&mut self, a: IndividualId, b: IndividualId) {
        self.invalidate();
        self.different.push((a, b));
    }

    /// Facet interval over a datatype, validated for mixed bounds
    pub fn data_interval(
        &self,
        dt: Datatype,
        min: Option<(DataValue, bool)>,
        max: Option<(DataValue, bool)>,
    ) -> Result<Expr, KernelError> {
        let mut interval = strix_core::DataInterval::unbounded();
        if let Some((v, excl)) = min {
            if v.datatype() != dt {
                return Err(strix_data::DataTypeError::MixedFacetDatatype(dt.name().into()).into());
            }
            interval.update_min(&v, excl);
        }
        if let Some((v, excl)) = max {
            if v.datatype() != dt {
                return Err(strix_data::DataTypeError::MixedFacetDatatype(dt.name().into()).into());
            }
            interval.update_max(&v, excl);
        }
        Ok(Expr::DataExpr(dt, interval))
    }

    // preprocessing

    /// Close the role box, build the DAG wiring and the derived tables
    fn prepare(&mut self) -> Result<(), KernelError> {
        if self.prepared {
            return Ok(());
        }
        self.roles.finalize()?;

        // told subsumers off the absorbed definitions
        for i in 0..self.concepts.len() {
            let told: Vec<EntryId> = self
                .concepts
                .get(i)
                .told_from_definition()
                .into_iter()
                .filter(|t| t.0 != i)
                .map(EntryId::Concept)
                .collect();
            self.concepts.get_mut(i).named_mut().told = told;
        }
        for i in 0..self.individuals.len() {
            let told = self.individuals.get(i).told_types();
            self.individuals.get_mut(i).named_mut().told = told;
        }

        // lazy unfolding table
        self.unfolding.clear();
        for i in 0..self.concepts.len() {
            let concept = self.concepts.get(i);
            let cd = concept.is_primitive() && concept.has_named_definition();
            if let Some(def) = concept.definition.clone() {
                let primitive = concept.is_primitive();
                let bp = self.dag.intern(&def);
                self.unfolding.insert(ConceptId(i), Unfolding { primitive, definition: bp });
            }
            let bp = self.dag.intern(&Expr::Concept(ConceptId(i)));
            let entry = self.concepts.get_mut(i).named_mut();
            entry.bp = bp;
            entry.completely_defined = cd;
        }

        // general axioms become one universal conjunct
        let mut uc = Vec::new();
        for (c, d) in self.gcis.clone() {
            uc.push(Expr::snf_or(vec![Expr::snf_not(c), d]));
        }
        self.gci_bp = if uc.is_empty() { Bp::TOP } else { self.dag.intern(&Expr::snf_and(uc)) };

        // role DAG wiring: domains are collected from the super-roles so an
        // edge fires every applicable domain through its own role
        let primaries: Vec<RoleId> = self.roles.primary_ids().collect();
        for &r in &primaries {
            let mut parts: Vec<Expr> = Vec::new();
            if let Some(d) = self.roles.role(r).domain.clone() {
                parts.push(d);
            }
            for a in self.roles.role(r).ancestors.clone() {
                if let Some(d) = self.roles.role(a).domain.clone() {
                    parts.push(d);
                }
            }
            let bp = if parts.is_empty() {
                Bp::TOP
            } else {
                self.dag.intern(&Expr::snf_and(parts))
            };
            self.roles.set_bp_domain(r, bp);
        }
        for &r in &primaries {
            if self.roles.role(r).top_func.contains(&r) {
                let bp = self.dag.functional_vertex(r);
                self.roles.set_functional_vertex(r, bp);
            }
        }

        // ABox interning
        let mut abox = AboxFacts::default();
        for i in 0..self.individuals.len() {
            abox.individuals.push(IndividualId(i));
        }
        for (a, c) in self.instance_of.clone() {
            let bp = self.dag.intern(&c);
            abox.types.push((a, bp));
        }
        for &(a, r, b) in &self.related {
            abox.related.push((a, r, b));
        }
        for (a, r, v) in self.data_assertions.clone() {
            let bp = self.dag.intern(&Expr::DataValue(v));
            abox.data.push((a, r, bp));
        }
        abox.different = self.different.clone();
        let has_individuals = !abox.individuals.is_empty();
        self.abox_facts = if has_individuals { Some(abox) } else { None };

        // sort keys for the roles, merged along the hierarchy
        for &r in &primaries {
            if self.roles.role(r).dom_sort.is_none() {
                let key = self.dag.new_sort_key();
                self.roles.set_dom_sort(r, key);
            }
        }
        for &r in &primaries {
            let key = self.roles.role(r).dom_sort.expect("assigned above");
            for a in self.roles.role(r).ancestors.clone() {
                if let Some(akey) = self.roles.role(a).dom_sort {
                    self.dag.merge_sorts(key, akey);
                }
            }
            let dom = self.roles.role(r).bp_domain;
            if dom.is_valid() {
                self.dag.merge_vertex_sort_with(dom, key);
            }
            // composition participants interact with the defined role
            for chain in self.roles.role(r).compositions.clone() {
                for part in chain {
                    let part = self.roles.resolve(part);
                    if let Some(pkey) = self.roles.role(part).dom_sort {
                        self.dag.merge_sorts(key, pkey);
                    }
                    let pinv = self.roles.resolve(part.inverse());
                    if let Some(pkey) = self.roles.role(pinv).dom_sort {
                        self.dag.merge_sorts(key, pkey);
                    }
                }
            }
        }
        self.sorted_upto = 0;
        self.sync_sorts();

        // the completely-defined shortcut is exact only on a purely
        // primitive, GCI-free, ABox-free KB
        self.cd_safe = self.gci_bp == Bp::TOP
            && !has_individuals
            && self.concepts.iter().all(|c| c.is_primitive());

        self.prepared = true;
        debug!(
            concepts = self.concepts.len(),
            individuals = self.individuals.len(),
            dag = self.dag.len(),
            "kernel prepared"
        );
        Ok(())
    }

    /// Merge sort labels for DAG vertices added since the last pass
    fn sync_sorts(&mut self) {
        let upto = self.dag.len();
        for i in self.sorted_upto.max(2)..upto {
            let bp = Bp::pos(i);
            match self.dag.entry(bp).clone() {
                DagEntry::And(children) => {
                    for c in children {
                        self.dag.merge_vertex_sorts(bp, c);
                    }
                }
                DagEntry::Forall { role, concept, .. } | DagEntry::AtLeast { role, concept, .. } => {
                    let role = self.roles.resolve(role);
                    if let Some(key) = self.roles.role(role).dom_sort {
                        self.dag.merge_vertex_sort_with(bp, key);
                    }
                    let inv = self.roles.resolve(role.inverse());
                    if let Some(key) = self.roles.role(inv).dom_sort {
                        if concept.is_valid() {
                            self.dag.merge_vertex_sort_with(concept, key);
                        }
                    }
                }
                DagEntry::Proj { role, concept, proj_role } => {
                    let role = self.roles.resolve(role);
                    let proj = self.roles.resolve(proj_role);
                    if let (Some(a), Some(b)) =
                        (self.roles.role(role).dom_sort, self.roles.role(proj).dom_sort)
                    {
                        self.dag.merge_sorts(a, b);
                        self.dag.merge_vertex_sort_with(bp, a);
                    }
                    let inv = self.roles.resolve(role.inverse());
                    if let Some(key) = self.roles.role(inv).dom_sort {
                        self.dag.merge_vertex_sort_with(concept, key);
                    }
                }
                DagEntry::CName(id) => {
                    if let Some(u) = self.unfolding.get(&id) {
                        if u.definition.is_valid() {
                            self.dag.merge_vertex_sorts(bp, u.definition);
                        }
                    }
                }
                _ => {}
            }
        }
        self.sorted_upto = upto;
    }

    /// Run one tableau over the given root labels, with the ABox seeded
    fn run_sat(&mut self, bps: &[Bp]) -> Result<bool, KernelError> {
        let mut engine = TableauEngine::new(
            &mut self.dag,
            &self.roles,
            &self.unfolding,
            self.gci_bp,
            self.interrupt.clone(),
        );
        if let Some(abox) = &self.abox_facts {
            if !seed_abox(&mut engine, abox) {
                return Ok(false);
            }
        }
        if engine.init_root(bps).is_err() {
            return Ok(false);
        }
        match engine.run() {
            Outcome::Sat => Ok(true),
            Outcome::Unsat => Ok(false),
            Outcome::Cancelled => Err(KernelError::Cancelled),
        }
    }

    // ask interface

    /// ABox (and TBox) consistency; elevates the status
    pub fn is_consistent(&mut self) -> Result<bool, KernelError> {
        self.prepare()?;
        if let Some(c) = self.consistent {
            return Ok(c);
        }
        info!("running consistency check");
        let consistent = self.run_sat(&[])?;
        self.consistent = Some(consistent);
        if self.status < KbStatus::CChecked {
            self.status = KbStatus::CChecked;
        }
        Ok(consistent)
    }

    fn ensure_consistent(&mut self) -> Result<(), KernelError> {
        if !self.is_consistent()? {
            return Err(KernelError::Inconsistent);
        }
        Ok(())
    }

    /// Satisfiability of an arbitrary expression w.r.t. the KB
    pub fn is_satisfiable(&mut self, c: &Expr) -> Result<bool, KernelError> {
        self.prepare()?;
        if self.consistent == Some(false) {
            return Ok(false);
        }
        let bp = self.dag.intern(c);
        self.run_sat(&[bp])
    }

    /// `C ⊑ D` w.r.t. the KB
    pub fn is_subsumed_by(&mut self, c: &Expr, d: &Expr) -> Result<bool, KernelError> {
        self.prepare()?;
        if self.consistent == Some(false) {
            return Ok(true);
        }
        let cb = self.dag.intern(c);
        let db = self.dag.intern(d);
        if cb == db || db == Bp::TOP || cb == Bp::BOTTOM {
            return Ok(true);
        }
        // sorted split: signatures that cannot interact make the joint test
        // a pair of independent ones
        if self.options.use_sorted_reasoning
            && self.gci_bp == Bp::TOP
            && self.abox_facts.is_none()
        {
            self.sync_sorts();
            if !self.dag.same_sort(cb, db) {
                if !self.run_sat(&[cb])? {
                    return Ok(true);
                }
                if !self.run_sat(&[db.negate()])? {
                    return Ok(true);
                }
                return Ok(false);
            }
        }
        Ok(!self.run_sat(&[cb, db.negate()])?)
    }

    pub fn is_equivalent(&mut self, c: &Expr, d: &Expr) -> Result<bool, KernelError> {
        Ok(self.is_subsumed_by(c, d)? && self.is_subsumed_by(d, c)?)
    }

    /// KB ⊨ R(a,b): asserting `a : ∀R.¬{b}` must be inconsistent
    pub fn ask_related(
        &mut self,
        a: IndividualId,
        r: RoleId,
        b: IndividualId,
    ) -> Result<bool, KernelError> {
        self.ensure_consistent()?;
        let refutation = Expr::snf_forall(r, Expr::snf_not(Expr::Individual(b)));
        let bp = self.dag.intern(&refutation);
        let mut engine = TableauEngine::new(
            &mut self.dag,
            &self.roles,
            &self.unfolding,
            self.gci_bp,
            self.interrupt.clone(),
        );
        let seeded = match &self.abox_facts {
            Some(abox) => seed_abox(&mut engine, abox),
            None => true,
        };
        if !seeded || engine.init_nominal(a, &[bp]).is_err() {
            return Ok(true);
        }
        match engine.run() {
            Outcome::Sat => Ok(false),
            Outcome::Unsat => Ok(true),
            Outcome::Cancelled => Err(KernelError::Cancelled),
        }
    }

    // classification and realization

    /// Classify every named concept into the taxonomy
    pub fn classify_kb(&mut self) -> Result<(), KernelError> {
        if self.taxonomy.is_some() {
            return Ok(());
        }
        self.ensure_consistent()?;
        info!(concepts = self.concepts.len(), "classifying KB");
        let mut taxonomy = Taxonomy::new(TOP_ENTRY, BOTTOM_ENTRY);
        let entries: Vec<EntryId> =
            (0..self.concepts.len()).map(|i| EntryId::Concept(ConceptId(i))).collect();
        self.classify_entries(&mut taxonomy, &entries)?;
        self.taxonomy = Some(taxonomy);
        if self.status < KbStatus::Classified {
            self.status = KbStatus::Classified;
        }
        Ok(())
    }

    /// Classify every individual (as its nominal) into the taxonomy
    pub fn realise_kb(&mut self) -> Result<(), KernelError> {
        self.classify_kb()?;
        if self.realised {
            return Ok(());
        }
        info!(individuals = self.individuals.len(), "realising KB");
        let mut taxonomy = self.taxonomy.take().ok_or(KernelError::NotClassified)?;
        let entries: Vec<EntryId> =
            (0..self.individuals.len()).map(|i| EntryId::Individual(IndividualId(i))).collect();
        let result = self.classify_entries(&mut taxonomy, &entries);
        self.taxonomy = Some(taxonomy);
        result?;
        self.realised = true;
        if self.status < KbStatus::Realised {
            self.status = KbStatus::Realised;
        }
        Ok(())
    }

    fn classify_entries(
        &mut self,
        taxonomy: &mut Taxonomy,
        entries: &[EntryId],
    ) -> Result<(), KernelError> {
        let mut checker = Checker {
            dag: &mut self.dag,
            roles: &self.roles,
            unfolding: &self.unfolding,
            gci: self.gci_bp,
            abox: self.abox_facts.as_ref(),
            concepts: &self.concepts,
            individuals: &self.individuals,
            interrupt: self.interrupt.clone(),
            cancelled: false,
            use_cd: self.options.use_completely_defined && self.cd_safe,
            synonyms: Vec::new(),
        };
        {
            let mut builder = TaxonomyBuilder::new(taxonomy, &mut checker);
            for &e in entries {
                builder.classify_entry(e);
            }
        }
        let cancelled = checker.cancelled;
        let synonyms = checker.synonyms;
        if cancelled {
            return Err(KernelError::Cancelled);
        }
        for (e, of) in synonyms {
            if let EntryId::Concept(id) = e {
                if id.0 < self.concepts.len() {
                    self.concepts.get_mut(id.0).named_mut().synonym = Some(of);
                }
            }
            if let EntryId::Individual(id) = e {
                self.individuals.get_mut(id.0).named_mut().synonym = Some(of);
            }
        }
        // back-links and flags
        for &e in entries {
            if let Some(v) = taxonomy.vertex_of(e) {
                match e {
                    EntryId::Concept(id) => {
                        let entry = self.concepts.get_mut(id.0).named_mut();
                        entry.tax_vertex = Some(v);
                        entry.classified = true;
                    }
                    EntryId::Individual(id) => {
                        let entry = self.individuals.get_mut(id.0).named_mut();
                        entry.tax_vertex = Some(v);
                        entry.classified = true;
                    }
                    EntryId::Role(_) => {}
                }
            }
        }
        Ok(())
    }

    // taxonomy queries

    fn taxonomy(&self) -> Result<&Taxonomy, KernelError> {
        self.taxonomy.as_ref().ok_or(KernelError::NotClassified)
    }

    fn concept_vertex(&self, name: &str) -> Result<strix_core::TaxVertexId, KernelError> {
        let id = self.find_concept(name)?;
        self.taxonomy()?
            .vertex_of(EntryId::Concept(id))
            .ok_or(KernelError::NotClassified)
    }

    fn entry_names(&self, entries: &[EntryId]) -> Vec<String> {
        entries
            .iter()
            .map(|e| match e {
                EntryId::Concept(id) if *id == ConceptId(usize::MAX) => "TOP".to_string(),
                EntryId::Concept(id) if *id == ConceptId(usize::MAX - 1) => "BOTTOM".to_string(),
                EntryId::Concept(id) => self.concepts.get(id.0).name().to_string(),
                EntryId::Individual(id) => self.individuals.get(id.0).name().to_string(),
                EntryId::Role(id) => self.roles.role(*id).name().to_string(),
            })
            .collect()
    }

    /// Direct super-concepts; implicitly classifies
    pub fn get_parents(&mut self, name: &str) -> Result<Vec<String>, KernelError> {
        self.classify_kb()?;
        let v = self.concept_vertex(name)?;
        let taxonomy = self.taxonomy()?;
        let mut actor = TaxonomyActor::new(ActorKind::Concepts);
        for &p in &taxonomy.vertex(v).parents {
            taxonomy.apply_actor(p, &mut actor);
        }
        Ok(self.entry_names(&actor.found))
    }

    /// Direct sub-concepts; implicitly classifies
    pub fn get_children(&mut self, name: &str) -> Result<Vec<String>, KernelError> {
        self.classify_kb()?;
        let v = self.concept_vertex(name)?;
        let taxonomy = self.taxonomy()?;
        let mut actor = TaxonomyActor::new(ActorKind::Concepts);
        for &c in &taxonomy.vertex(v).children {
            taxonomy.apply_actor(c, &mut actor);
        }
        Ok(self.entry_names(&actor.found))
    }

    /// Concepts sharing the vertex, the queried name excluded
    pub fn get_equivalents(&mut self, name: &str) -> Result<Vec<String>, KernelError> {
        self.classify_kb()?;
        let id = self.find_concept(name)?;
        let v = self.concept_vertex(name)?;
        let taxonomy = self.taxonomy()?;
        let mut actor = TaxonomyActor::new(ActorKind::Concepts);
        taxonomy.apply_actor(v, &mut actor);
        let own = EntryId::Concept(id);
        let found: Vec<EntryId> = actor.found.into_iter().filter(|e| *e != own).collect();
        Ok(self.entry_names(&found))
    }

    /// Individuals at or below the concept; implicitly realises
    pub fn get_instances(&mut self, name: &str) -> Result<Vec<String>, KernelError> {
        self.realise_kb()?;
        let v = self.concept_vertex(name)?;
        let taxonomy = self.taxonomy()?;
        let mut actor = TaxonomyActor::new(ActorKind::Individuals);
        for d in taxonomy.descendants_of(v) {
            taxonomy.apply_actor(d, &mut actor);
        }
        Ok(self.entry_names(&actor.found))
    }

    /// Render the classified taxonomy; implicitly classifies
    pub fn print_taxonomy(&mut self) -> Result<String, KernelError> {
        self.classify_kb()?;
        let taxonomy = self.taxonomy()?;
        let mut out = String::new();
        out.push_str(&format!("Taxonomy consists of {} entries\n", taxonomy.len()));
        out.push_str("All entries are in format:\n\"entry\" {n: parents} {m: children}\n\n");
        for (_, v) in taxonomy.iter() {
            let name = self.entry_names(std::slice::from_ref(&v.primer)).remove(0);
            let parents: Vec<String> = v
                .parents
                .iter()
                .map(|p| self.entry_names(std::slice::from_ref(&taxonomy.vertex(*p).primer)).remove(0))
                .collect();
            let children: Vec<String> = v
                .children
                .iter()
                .map(|c| self.entry_names(std::slice::from_ref(&taxonomy.vertex(*c).primer)).remove(0))
                .collect();
            out.push_str(&format!(
                "\"{}\" {{{}: {}}} {{{}: {}}}\n",
                name,
                parents.len(),
                parents.join(" "),
                children.len(),
                children.join(" ")
            ));
        }
        Ok(out)
    }

    /// Types of an individual; direct parents only or the full ancestry
    pub fn get_types(&mut self, name: &str, direct: bool) -> Result<Vec<String>, KernelError> {
        self.realise_kb()?;
        let id = self.find_individual(name)?;
        let taxonomy = self.taxonomy()?;
        let v = taxonomy
            .vertex_of(EntryId::Individual(id))
            .ok_or(KernelError::NotClassified)?;
        let mut actor = TaxonomyActor::new(ActorKind::Concepts);
        if direct {
            // the individual's own vertex may be primed by a concept
            taxonomy.apply_actor(v, &mut actor);
            if actor.found.is_empty() {
                for &p in &taxonomy.vertex(v).parents {
                    taxonomy.apply_actor(p, &mut actor);
                }
            }
        } else {
            for a in taxonomy.ancestors_of(v) {
                taxonomy.apply_actor(a, &mut actor);
            }
        }
        let found: Vec<EntryId> =
            actor.found.into_iter().filter(|e| *e != TOP_ENTRY && *e != BOTTOM_ENTRY).collect();
        Ok(self.entry_names(&found))
    }

}

/// Subsumption oracle handed to the taxonomy builder
struct Checker<'a> {
    dag: &'a mut TermDag,
    roles: &'a RoleBox,
    unfolding: &'a HashMap<ConceptId, Unfolding>,
    gci: Bp,
    abox: Option<&'a AboxFacts>,
    concepts: &'a NamedCollection<Concept>,
    individuals: &'a NamedCollection<Individual>,
    interrupt: Arc<AtomicBool>,
    cancelled: bool,
    use_cd: bool,
    synonyms: Vec<(EntryId, EntryId)>,
}

impl<'a> Checker<'a> {
    fn entry_bp(&mut self, e: EntryId) -> Bp {
        match e {
            EntryId::Concept(id) if id == ConceptId(usize::MAX) => Bp::TOP,
            EntryId::Concept(id) if id == ConceptId(usize::MAX - 1) => Bp::BOTTOM,
            EntryId::Concept(id) => {
                let bp = self.concepts.get(id.0).named().bp;
                if bp.is_valid() {
                    bp
                } else {
                    self.dag.intern(&Expr::Concept(id))
                }
            }
            EntryId::Individual(id) => self.dag.intern(&Expr::Individual(id)),
            EntryId::Role(_) => Bp::TOP,
        }
    }

    fn sat(&mut self, bps: &[Bp]) -> bool {
        let mut engine = TableauEngine::new(
            &mut *self.dag,
            self.roles,
            self.unfolding,
            self.gci,
            self.interrupt.clone(),
        );
        if let Some(abox) = self.abox {
            if !seed_abox(&mut engine, abox) {
                return false;
            }
        }
        if engine.init_root(bps).is_err() {
            return false;
        }
        match engine.run() {
            Outcome::Sat => true,
            Outcome::Unsat => false,
            Outcome::Cancelled => {
                self.cancelled = true;
                false
            }
        }
    }
}

impl<'a> Classifier for Checker<'a> {
    fn subsumes(&mut self, sup: EntryId, sub: EntryId) -> bool {
        if self.cancelled {
            return false;
        }
        if sup == TOP_ENTRY || sub == BOTTOM_ENTRY {
            return true;
        }
        let sub_bp = self.entry_bp(sub);
        let sup_bp = self.entry_bp(sup);
        !self.sat(&[sub_bp, sup_bp.negate()])
    }

    fn told_subsumers(&mut self, e: EntryId) -> Vec<EntryId> {
        match e {
            EntryId::Concept(id) if id.0 < self.concepts.len() => {
                self.concepts.get(id.0).named().told.clone()
            }
            EntryId::Individual(id) => self.individuals.get(id.0).named().told.clone(),
            _ => Vec::new(),
        }
    }

    fn completely_defined(&mut self, e: EntryId) -> bool {
        if !self.use_cd {
            return false;
        }
        match e {
            EntryId::Concept(id) if id.0 < self.concepts.len() => {
                self.concepts.get(id.0).named().completely_defined
            }
            _ => false,
        }
    }

    fn set_synonym(&mut self, e: EntryId, of: EntryId) {
        self.synonyms.push((e, of));
    }
}
