// Integration tests for Strix components
// These tests verify end-to-end functionality across multiple crates

use strix::prelude::*;

#[test]
fn test_end_to_end_family_ontology() {
    let mut kernel = ReasoningKernel::new();

    let person = kernel.concept("Person");
    let parent = kernel.concept("Parent");
    let grandparent = kernel.concept("Grandparent");
    let has_child = kernel.role("hasChild");
    let has_grandchild = kernel.role("hasGrandchild");

    kernel.tell_implies(Expr::Concept(person), Expr::Top);
    kernel.tell_equivalent(
        Expr::Concept(parent),
        Expr::snf_and(vec![
            Expr::Concept(person),
            Expr::snf_exists(has_child, Expr::Concept(person)),
        ]),
    );
    kernel.tell_equivalent(
        Expr::Concept(grandparent),
        Expr::snf_and(vec![
            Expr::Concept(person),
            Expr::snf_exists(has_child, Expr::Concept(parent)),
        ]),
    );
    kernel
        .tell_role_chain(&[has_child, has_child], has_grandchild)
        .unwrap();

    let alice = kernel.individual("alice");
    let bob = kernel.individual("bob");
    let carol = kernel.individual("carol");
    kernel.tell_instance_of(alice, Expr::Concept(person));
    kernel.tell_instance_of(bob, Expr::Concept(person));
    kernel.tell_instance_of(carol, Expr::Concept(person));
    kernel.tell_related(alice, has_child, bob);
    kernel.tell_related(bob, has_child, carol);

    assert!(kernel.is_consistent().unwrap());

    // a grandparent is a parent
    assert!(kernel
        .is_subsumed_by(&Expr::Concept(grandparent), &Expr::Concept(parent))
        .unwrap());

    // alice reaches carol through the chain
    assert!(kernel.ask_related(alice, has_grandchild, carol).unwrap());

    // realization finds alice as a parent instance
    let mut parents = kernel.get_instances("Parent").unwrap();
    parents.sort();
    assert!(parents.contains(&"alice".to_string()));
    assert!(parents.contains(&"bob".to_string()));
    assert!(!parents.contains(&"carol".to_string()));

    // the KB survives a dump/load cycle with identical answers
    let dump = kernel.save_to_string().unwrap();
    let mut copy = ReasoningKernel::new();
    copy.load_from_string(&dump).unwrap();
    assert!(copy
        .is_subsumed_by(&Expr::Concept(grandparent), &Expr::Concept(parent))
        .unwrap());
    let mut copied = copy.get_instances("Parent").unwrap();
    copied.sort();
    assert_eq!(parents, copied);
}

#[test]
fn test_cancellation_is_clean() {
    use std::sync::atomic::Ordering;

    let mut kernel = ReasoningKernel::new();
    let a = kernel.concept("A");
    let b = kernel.concept("B");
    kernel.tell_implies(Expr::Concept(a), Expr::Concept(b));

    let flag = kernel.interrupt_flag();
    flag.store(true, Ordering::Relaxed);
    assert!(matches!(kernel.is_consistent(), Err(KernelError::Cancelled)));
    // status is unchanged by a cancelled query
    assert_eq!(kernel.status(), KbStatus::Loading);

    flag.store(false, Ordering::Relaxed);
    assert!(kernel.is_consistent().unwrap());
    assert_eq!(kernel.status(), KbStatus::CChecked);
}
