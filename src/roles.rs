//! Semantic roles for graph variables
//!
//! A role says what a variable *is* in a model: an input, a cost, a
//! parameter, a buffer owned by a training algorithm, and so on. Some roles
//! are more specific versions of others ([`FILTERS`] is a kind of
//! [`WEIGHTS`], which is a kind of [`PARAMETER`]); a variable keeps only
//! the most specific role of each chain.
//!
//! # Example
//!
//! ```
//! use pasos::graph::SharedVariable;
//! use pasos::roles::{add_role, has_roles, roles, PARAMETER, WEIGHTS};
//!
//! let w = SharedVariable::from_vec(vec![1.0, 2.0], "W");
//! add_role(&w, PARAMETER);
//! add_role(&w, WEIGHTS);
//! add_role(&w, PARAMETER);
//!
//! assert_eq!(roles(&w), vec![WEIGHTS]);
//! assert!(has_roles(&w, &[PARAMETER], false));
//! ```

use std::cell::RefCell;
use std::fmt;

/// Tag describing what a graph variable represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableRole {
    /// The input of a model component
    Input,
    /// The output of a model component
    Output,
    /// A scalar cost that can be used to train or regularize
    Cost,
    /// A parameter of the model
    Parameter,
    /// The weight matrices of linear transformations
    Weights,
    /// Biases of linear transformations
    Biases,
    /// The filters (kernels) of a convolution operation
    Filters,
    /// Variables added to the graph as annotations
    Auxiliary,
    /// Inputs with applied dropout
    Dropout,
    /// State allocated by a step rule (running averages, counters)
    AlgorithmBuffer,
    /// Tunable constant of a step rule kept in a shared variable
    AlgorithmHyperparameter,
}

pub const INPUT: VariableRole = VariableRole::Input;
pub const OUTPUT: VariableRole = VariableRole::Output;
pub const COST: VariableRole = VariableRole::Cost;
pub const PARAMETER: VariableRole = VariableRole::Parameter;
pub const WEIGHTS: VariableRole = VariableRole::Weights;
pub const BIASES: VariableRole = VariableRole::Biases;
pub const FILTERS: VariableRole = VariableRole::Filters;
pub const AUXILIARY: VariableRole = VariableRole::Auxiliary;
pub const DROPOUT: VariableRole = VariableRole::Dropout;
pub const ALGORITHM_BUFFER: VariableRole = VariableRole::AlgorithmBuffer;
pub const ALGORITHM_HYPERPARAMETER: VariableRole = VariableRole::AlgorithmHyperparameter;

impl VariableRole {
    /// Every role, roots before their subroles
    pub const ALL: [VariableRole; 11] = [
        VariableRole::Input,
        VariableRole::Output,
        VariableRole::Cost,
        VariableRole::Parameter,
        VariableRole::Weights,
        VariableRole::Biases,
        VariableRole::Filters,
        VariableRole::Auxiliary,
        VariableRole::Dropout,
        VariableRole::AlgorithmBuffer,
        VariableRole::AlgorithmHyperparameter,
    ];

    /// The role this one refines, if any
    pub fn parent(self) -> Option<VariableRole> {
        match self {
            VariableRole::Weights | VariableRole::Biases => Some(VariableRole::Parameter),
            VariableRole::Filters => Some(VariableRole::Weights),
            _ => None,
        }
    }

    /// True if `self` equals `other` or refines it, directly or transitively
    pub fn is_subrole_of(self, other: VariableRole) -> bool {
        let mut current = Some(self);
        while let Some(role) = current {
            if role == other {
                return true;
            }
            current = role.parent();
        }
        false
    }

    /// Upper-case name, e.g. `ALGORITHM_BUFFER`
    pub fn name(self) -> &'static str {
        match self {
            VariableRole::Input => "INPUT",
            VariableRole::Output => "OUTPUT",
            VariableRole::Cost => "COST",
            VariableRole::Parameter => "PARAMETER",
            VariableRole::Weights => "WEIGHTS",
            VariableRole::Biases => "BIASES",
            VariableRole::Filters => "FILTERS",
            VariableRole::Auxiliary => "AUXILIARY",
            VariableRole::Dropout => "DROPOUT",
            VariableRole::AlgorithmBuffer => "ALGORITHM_BUFFER",
            VariableRole::AlgorithmHyperparameter => "ALGORITHM_HYPERPARAMETER",
        }
    }
}

impl fmt::Display for VariableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role list attached to a variable
#[derive(Debug, Default)]
pub struct RoleTag {
    roles: RefCell<Vec<VariableRole>>,
}

impl RoleTag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the attached roles, in the order they were added
    pub fn roles(&self) -> Vec<VariableRole> {
        self.roles.borrow().clone()
    }
}

/// Anything that can carry roles
pub trait Annotated {
    fn role_tag(&self) -> &RoleTag;
}

/// Add a role to a variable
///
/// Existing roles that `role` refines (or equals) are dropped first. If a
/// role at least as specific as `role` is still attached afterwards, the
/// call does nothing: replacing `WEIGHTS` by `PARAMETER` has to be done by
/// hand.
pub fn add_role<V: Annotated + ?Sized>(var: &V, role: VariableRole) {
    let mut attached = var.role_tag().roles.borrow_mut();
    attached.retain(|old| !role.is_subrole_of(*old));
    if !attached.iter().any(|old| old.is_subrole_of(role)) {
        attached.push(role);
    }
}

/// Test whether a variable has the given roles, taking subroles into account
///
/// With `match_all` every requested role must match; otherwise one match
/// is enough.
pub fn has_roles<V: Annotated + ?Sized>(var: &V, roles: &[VariableRole], match_all: bool) -> bool {
    let attached = var.role_tag().roles.borrow();
    let mut matches = roles
        .iter()
        .map(|wanted| attached.iter().any(|role| role.is_subrole_of(*wanted)));

    if match_all {
        matches.all(|matched| matched)
    } else {
        matches.any(|matched| matched)
    }
}

/// Roles currently attached to a variable
pub fn roles<V: Annotated + ?Sized>(var: &V) -> Vec<VariableRole> {
    var.role_tag().roles()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Default)]
    struct Var {
        tag: RoleTag,
    }

    impl Annotated for Var {
        fn role_tag(&self) -> &RoleTag {
            &self.tag
        }
    }

    #[test]
    fn test_hierarchy() {
        assert!(FILTERS.is_subrole_of(WEIGHTS));
        assert!(FILTERS.is_subrole_of(PARAMETER));
        assert!(BIASES.is_subrole_of(PARAMETER));
        assert!(!BIASES.is_subrole_of(WEIGHTS));
        assert!(!PARAMETER.is_subrole_of(WEIGHTS));
        assert!(COST.is_subrole_of(COST));
        assert_eq!(ALGORITHM_BUFFER.parent(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(PARAMETER.to_string(), "PARAMETER");
        assert_eq!(ALGORITHM_HYPERPARAMETER.to_string(), "ALGORITHM_HYPERPARAMETER");
    }

    #[test]
    fn test_more_specific_role_replaces_parent() {
        let w = Var::default();
        add_role(&w, PARAMETER);
        assert_eq!(roles(&w), vec![PARAMETER]);

        add_role(&w, WEIGHTS);
        assert_eq!(roles(&w), vec![WEIGHTS]);

        add_role(&w, PARAMETER);
        assert_eq!(roles(&w), vec![WEIGHTS]);
    }

    #[test]
    fn test_unrelated_roles_accumulate() {
        let v = Var::default();
        add_role(&v, INPUT);
        add_role(&v, DROPOUT);
        add_role(&v, BIASES);
        assert_eq!(roles(&v), vec![INPUT, DROPOUT, BIASES]);
    }

    #[test]
    fn test_siblings_are_not_merged() {
        let v = Var::default();
        add_role(&v, WEIGHTS);
        add_role(&v, BIASES);
        assert_eq!(roles(&v), vec![WEIGHTS, BIASES]);

        add_role(&v, FILTERS);
        assert_eq!(roles(&v), vec![BIASES, FILTERS]);
    }

    #[test]
    fn test_has_roles() {
        let v = Var::default();
        add_role(&v, FILTERS);
        add_role(&v, AUXILIARY);

        assert!(has_roles(&v, &[PARAMETER], false));
        assert!(has_roles(&v, &[WEIGHTS, AUXILIARY], true));
        assert!(has_roles(&v, &[COST, AUXILIARY], false));
        assert!(!has_roles(&v, &[COST, AUXILIARY], true));
        assert!(!has_roles(&v, &[BIASES], false));
        assert!(!has_roles(&v, &[], false));
        assert!(has_roles(&v, &[], true));
    }

    #[test]
    fn test_fresh_variable_has_no_roles() {
        let v = Var::default();
        assert!(roles(&v).is_empty());
        assert!(!has_roles(&v, &[INPUT], false));
    }

    fn arb_role() -> impl Strategy<Value = VariableRole> {
        (0..VariableRole::ALL.len()).prop_map(|i| VariableRole::ALL[i])
    }

    proptest! {
        #[test]
        fn prop_roles_never_subsume_each_other(sequence in prop::collection::vec(arb_role(), 0..20)) {
            let v = Var::default();
            for role in &sequence {
                add_role(&v, *role);
            }

            let attached = roles(&v);
            for (i, a) in attached.iter().enumerate() {
                for (j, b) in attached.iter().enumerate() {
                    if i != j {
                        prop_assert!(!a.is_subrole_of(*b), "{} subsumed by {}", a, b);
                    }
                }
            }
        }

        #[test]
        fn prop_every_added_role_is_still_matched(sequence in prop::collection::vec(arb_role(), 0..20)) {
            let v = Var::default();
            for role in &sequence {
                add_role(&v, *role);
            }
            for role in &sequence {
                prop_assert!(has_roles(&v, &[*role], false));
            }
        }

        #[test]
        fn prop_add_role_is_idempotent(
            sequence in prop::collection::vec(arb_role(), 0..10),
            role in arb_role(),
        ) {
            let v = Var::default();
            for r in &sequence {
                add_role(&v, *r);
            }
            add_role(&v, role);
            let once = roles(&v);
            add_role(&v, role);
            prop_assert_eq!(once, roles(&v));
        }

        #[test]
        fn prop_match_all_is_conjunction(
            attached in prop::collection::vec(arb_role(), 0..6),
            wanted in prop::collection::vec(arb_role(), 0..6),
        ) {
            let v = Var::default();
            for r in &attached {
                add_role(&v, *r);
            }
            let each: Vec<bool> = wanted.iter().map(|r| has_roles(&v, &[*r], false)).collect();
            prop_assert_eq!(has_roles(&v, &wanted, true), each.iter().all(|m| *m));
            prop_assert_eq!(has_roles(&v, &wanted, false), each.iter().any(|m| *m));
        }
    }
}
