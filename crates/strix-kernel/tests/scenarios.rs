// Integration tests for the reasoning kernel
// These exercise the full tell/ask cycle across all subsystems

use strix_core::{DataValue, Datatype, Expr};
use strix_kernel::{KbStatus, ReasoningKernel};

#[test]
fn test_subsumption_chain() {
    // A ⊑ B, B ⊑ C entails A ⊑ C, and B is the only direct parent of A
    let mut k = ReasoningKernel::new();
    let a = k.concept("A");
    let b = k.concept("B");
    let c = k.concept("C");
    k.tell_implies(Expr::Concept(a), Expr::Concept(b));
    k.tell_implies(Expr::Concept(b), Expr::Concept(c));

    assert!(k.is_subsumed_by(&Expr::Concept(a), &Expr::Concept(c)).unwrap());
    assert_eq!(k.get_parents("A").unwrap(), vec!["B".to_string()]);
}

#[test]
fn test_nominal_merge_forced_by_cardinality() {
    // {a} ⊑ ∃R.{b} and (≤1 R)(a); adding R(a,c) forces c = b
    let mut k = ReasoningKernel::new();
    let r = k.role("R");
    let a = k.individual("a");
    let b = k.individual("b");
    let c = k.individual("c");
    k.tell_instance_of(a, Expr::snf_exists(r, Expr::Individual(b)));
    k.tell_instance_of(a, Expr::snf_le(1, r, Expr::Top));
    k.tell_related(a, r, c);

    assert!(k.is_consistent().unwrap());
    assert!(k.is_equivalent(&Expr::Individual(b), &Expr::Individual(c)).unwrap());
}

#[test]
fn test_role_chain() {
    // R ∘ S ⊑ T with R(a,b), S(b,c) entails T(a,c)
    let mut k = ReasoningKernel::new();
    let r = k.role("R");
    let s = k.role("S");
    let t = k.role("T");
    k.tell_role_chain(&[r, s], t).unwrap();
    let a = k.individual("a");
    let b = k.individual("b");
    let c = k.individual("c");
    k.tell_related(a, r, b);
    k.tell_related(b, s, c);

    assert!(k.ask_related(a, t, c).unwrap());
    assert!(!k.ask_related(c, t, a).unwrap());
}

#[test]
fn test_datatype_interval_inconsistency() {
    // C ⊑ ∃age.[18..) with a functional age, age(a,10) and C(a) clash
    let mut k = ReasoningKernel::new();
    let c = k.concept("C");
    let age = k.data_role("age");
    k.tell_functional(age);
    let adult_age = k
        .data_interval(Datatype::Integer, Some((DataValue::Int(18), false)), None)
        .unwrap();
    k.tell_implies(Expr::Concept(c), Expr::snf_exists(age, adult_age));
    let a = k.individual("a");
    k.tell_instance_of(a, Expr::Concept(c));
    k.tell_data_value(a, age, DataValue::Int(10));

    assert!(!k.is_consistent().unwrap());
}

#[test]
fn test_cyclic_told_subsumers_share_vertex() {
    // A ⊑ B, B ⊑ A: one taxonomy vertex for both
    let mut k = ReasoningKernel::new();
    let a = k.concept("A");
    let b = k.concept("B");
    k.tell_implies(Expr::Concept(a), Expr::Concept(b));
    k.tell_implies(Expr::Concept(b), Expr::Concept(a));
    k.classify_kb().unwrap();

    assert_eq!(k.get_equivalents("A").unwrap(), vec!["B".to_string()]);
    assert_eq!(k.get_equivalents("B").unwrap(), vec!["A".to_string()]);
}

#[test]
fn test_functional_role_identifies_fillers() {
    // functional(R), R(a,b), R(a,c) entails b = c
    let mut k = ReasoningKernel::new();
    let r = k.role("R");
    k.tell_functional(r);
    let a = k.individual("a");
    let b = k.individual("b");
    let c = k.individual("c");
    k.tell_related(a, r, b);
    k.tell_related(a, r, c);

    assert!(k.is_consistent().unwrap());
    assert!(k.is_equivalent(&Expr::Individual(b), &Expr::Individual(c)).unwrap());
}

#[test]
fn test_status_elevation_through_queries() {
    let mut k = ReasoningKernel::new();
    let a = k.concept("A");
    let x = k.individual("x");
    k.tell_instance_of(x, Expr::Concept(a));
    assert_eq!(k.status(), KbStatus::Loading);
    // an instance query elevates through consistency, classification and
    // realization in one go
    assert_eq!(k.get_instances("A").unwrap(), vec!["x".to_string()]);
    assert_eq!(k.status(), KbStatus::Realised);
}

#[test]
fn test_save_load_indistinguishable_by_asks() {
    let mut k = ReasoningKernel::new();
    let person = k.concept("Person");
    let parent = k.concept("Parent");
    let r = k.role("hasChild");
    k.tell_implies(Expr::Concept(parent), Expr::Concept(person));
    k.tell_domain(r, Expr::Concept(parent));
    let alice = k.individual("alice");
    let bob = k.individual("bob");
    k.tell_related(alice, r, bob);
    k.classify_kb().unwrap();

    let dump = k.save_to_string().unwrap();
    let mut k2 = ReasoningKernel::new();
    k2.load_from_string(&dump).unwrap();

    assert_eq!(
        k.is_consistent().unwrap(),
        k2.is_consistent().unwrap()
    );
    assert_eq!(
        k.get_parents("Parent").unwrap(),
        k2.get_parents("Parent").unwrap()
    );
    let mut i1 = k.get_instances("Parent").unwrap();
    let mut i2 = k2.get_instances("Parent").unwrap();
    i1.sort();
    i2.sort();
    assert_eq!(i1, i2);
    assert_eq!(
        k.get_types("alice", false).unwrap().len(),
        k2.get_types("alice", false).unwrap().len()
    );
}

#[test]
fn test_inverse_role_range_interaction() {
    // hasParent ≡ hasChild⁻; an edge a→b over hasChild is seen from b
    let mut k = ReasoningKernel::new();
    let has_child = k.role("hasChild");
    let has_parent = k.role("hasParent");
    k.tell_inverse_roles(has_child, has_parent).unwrap();
    let person = k.concept("Person");
    k.tell_domain(has_parent, Expr::Concept(person));
    let a = k.individual("a");
    let b = k.individual("b");
    k.tell_related(a, has_child, b);

    // b has a hasParent edge back to a, so b is a Person
    let types = k.get_types("b", false).unwrap();
    assert!(types.contains(&"Person".to_string()));
}
