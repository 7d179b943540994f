//! Role automata for complex role inclusions
//!
//! A complex inclusion `R₁∘…∘Rₙ ⊑ S` is realised as a non-deterministic
//! automaton attached to `S`; the tableau's universal-restriction rule walks
//! this automaton instead of matching edges directly. States 0 and 1 are
//! reserved as the initial and final state.

use serde::{Deserialize, Serialize};
use strix_core::RoleId;

/// One automaton transition; `label == None` is an ε-transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: u32,
    pub to: u32,
    pub label: Option<RoleId>,
}

/// Where a composition chain is anchored in the automaton
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainKind {
    /// `R₁∘…∘Rₙ ⊑ S`: a path from the initial to the final state
    Full,
    /// `S∘R₂∘…∘Rₙ ⊑ S`: a loop on the final state
    AfterSelf,
    /// `R₁∘…∘Rₙ₋₁∘S ⊑ S`: a loop on the initial state
    BeforeSelf,
}

/// Non-deterministic role automaton
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAutomaton {
    n_states: u32,
    transitions: Vec<Transition>,
}

impl RoleAutomaton {
    pub const INITIAL: u32 = 0;
    pub const FINAL: u32 = 1;

    /// Automaton with the single transition `initial → final` labelled `role`
    pub fn trivial(role: RoleId) -> RoleAutomaton {
        RoleAutomaton {
            n_states: 2,
            transitions: vec![Transition {
                from: Self::INITIAL,
                to: Self::FINAL,
                label: Some(role),
            }],
        }
    }

    pub fn n_states(&self) -> u32 {
        self.n_states
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// An automaton is trivial when it only carries its defining transition
    pub fn is_trivial(&self) -> bool {
        self.n_states == 2 && self.transitions.len() == 1
    }

    fn add_state(&mut self) -> u32 {
        let s = self.n_states;
        self.n_states += 1;
        s
    }

    pub fn add_transition(&mut self, from: u32, to: u32, label: Option<RoleId>) {
        let t = Transition { from, to, label };
        if !self.transitions.contains(&t) {
            self.transitions.push(t);
        }
    }

    /// Wire a composition chain into the automaton
    pub fn add_chain(&mut self, chain: &[RoleId], kind: ChainKind) {
        let (start, end) = match kind {
            ChainKind::Full => (Self::INITIAL, Self::FINAL),
            ChainKind::AfterSelf => (Self::FINAL, Self::FINAL),
            ChainKind::BeforeSelf => (Self::INITIAL, Self::INITIAL),
        };
        let mut from = start;
        for (i, role) in chain.iter().enumerate() {
            let to = if i + 1 == chain.len() { end } else { self.add_state() };
            self.add_transition(from, to, Some(*role));
            from = to;
        }
    }

    /// Embed a sub-role's automaton so its chain structure is inherited
    ///
    /// The embedded copy is bridged by ε-transitions from this automaton's
    /// initial state and into its final state.
    pub fn embed(&mut self, other: &RoleAutomaton) {
        let offset = self.n_states;
        self.n_states += other.n_states;
        for t in &other.transitions {
            self.transitions.push(Transition {
                from: t.from + offset,
                to: t.to + offset,
                label: t.label,
            });
        }
        self.add_transition(Self::INITIAL, Self::INITIAL + offset, None);
        self.add_transition(Self::FINAL + offset, Self::FINAL, None);
    }

    /// Transitions leaving `state`
    pub fn from_state(&self, state: u32) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().filter(move |t| t.from == state)
    }

    /// ε-closure of a state
    pub fn epsilon_closure(&self, state: u32) -> Vec<u32> {
        let mut seen = vec![state];
        let mut stack = vec![state];
        while let Some(s) = stack.pop() {
            for t in self.from_state(s) {
                if t.label.is_none() && !seen.contains(&t.to) {
                    seen.push(t.to);
                    stack.push(t.to);
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trivial_automaton() {
        let a = RoleAutomaton::trivial(RoleId(0));
        assert!(a.is_trivial());
        assert_eq!(a.from_state(RoleAutomaton::INITIAL).count(), 1);
    }

    #[test]
    fn test_full_chain_introduces_intermediate_states() {
        let mut a = RoleAutomaton::trivial(RoleId(4));
        a.add_chain(&[RoleId(0), RoleId(2)], ChainKind::Full);
        assert_eq!(a.n_states(), 3);
        // initial has the trivial transition plus the chain start
        assert_eq!(a.from_state(RoleAutomaton::INITIAL).count(), 2);
    }

    #[test]
    fn test_transitivity_loops_on_final() {
        let mut a = RoleAutomaton::trivial(RoleId(0));
        a.add_chain(&[RoleId(0)], ChainKind::AfterSelf);
        let loops: Vec<_> = a
            .from_state(RoleAutomaton::FINAL)
            .filter(|t| t.to == RoleAutomaton::FINAL)
            .collect();
        assert_eq!(loops.len(), 1);
    }

    #[test]
    fn test_embed_bridges_with_epsilon() {
        let mut outer = RoleAutomaton::trivial(RoleId(0));
        let mut inner = RoleAutomaton::trivial(RoleId(2));
        inner.add_chain(&[RoleId(2)], ChainKind::AfterSelf);
        outer.embed(&inner);
        let closure = outer.epsilon_closure(RoleAutomaton::INITIAL);
        // initial reaches the embedded copy's initial state
        assert!(closure.len() > 1);
    }
}
