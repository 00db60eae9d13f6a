//! The transition table: the single source of truth for which stage moves
//! are ever legal, and for whom.
//!
//! A table is built once from a literal list of [`Transition`]s, validated,
//! and precomputed into keyed lookups. It exposes no mutating operation, so
//! a table shared behind an `Arc` can never change under a running engine.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::stage::{ActorRole, Stage};

/// Ownership rule attached to a single transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentRule {
    /// No ownership coupling.
    #[default]
    None,
    /// The transition assigns the order to the requesting actor. Rejected
    /// if another actor already holds the assignment.
    Claim,
    /// Only the actor already assigned to the order may request it.
    AssigneeOnly,
}

/// A declared-legal `(from, to, role)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transition {
    pub from: Stage,
    pub to: Stage,
    pub role: ActorRole,
    #[serde(default)]
    pub assignment: AssignmentRule,
}

impl Transition {
    pub const fn new(from: Stage, to: Stage, role: ActorRole) -> Self {
        Transition {
            from,
            to,
            role,
            assignment: AssignmentRule::None,
        }
    }

    pub const fn with_assignment(mut self, assignment: AssignmentRule) -> Self {
        self.assignment = assignment;
        self
    }

    fn key(&self) -> TransitionKey {
        TransitionKey {
            from: self.from,
            to: self.to,
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TransitionKey {
    from: Stage,
    to: Stage,
    role: ActorRole,
}

/// The food-delivery workflow: 7 stages, 9 triples.
const STANDARD_TRANSITIONS: [Transition; 9] = [
    Transition::new(Stage::Placed, Stage::Confirmed, ActorRole::Restaurant),
    Transition::new(Stage::Placed, Stage::Cancelled, ActorRole::Restaurant),
    Transition::new(Stage::Placed, Stage::Cancelled, ActorRole::Customer),
    Transition::new(Stage::Confirmed, Stage::Preparing, ActorRole::Restaurant),
    Transition::new(Stage::Confirmed, Stage::Cancelled, ActorRole::Restaurant),
    Transition::new(Stage::Confirmed, Stage::Cancelled, ActorRole::Customer),
    Transition::new(Stage::Preparing, Stage::ReadyForPickup, ActorRole::Restaurant),
    Transition::new(Stage::ReadyForPickup, Stage::PickedUp, ActorRole::Driver)
        .with_assignment(AssignmentRule::Claim),
    Transition::new(Stage::PickedUp, Stage::Delivered, ActorRole::Driver)
        .with_assignment(AssignmentRule::AssigneeOnly),
];

/// Immutable, precomputed set of legal transitions.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    stages: BTreeSet<Stage>,
    transitions: Vec<Transition>,
    rules: HashMap<TransitionKey, AssignmentRule>,
    next: BTreeMap<Stage, BTreeSet<Stage>>,
    claim_targets: HashSet<(Stage, ActorRole)>,
}

impl TransitionTable {
    /// Build and validate a table over the given stage set.
    pub fn new(
        stages: impl IntoIterator<Item = Stage>,
        transitions: impl IntoIterator<Item = Transition>,
    ) -> Result<Self, TableError> {
        let stages: BTreeSet<Stage> = stages.into_iter().collect();
        if !stages.contains(&Stage::INITIAL) {
            return Err(TableError::MissingInitialStage(Stage::INITIAL));
        }

        let transitions: Vec<Transition> = transitions.into_iter().collect();
        let mut rules = HashMap::with_capacity(transitions.len());
        let mut next: BTreeMap<Stage, BTreeSet<Stage>> =
            stages.iter().map(|s| (*s, BTreeSet::new())).collect();
        let mut claim_targets = HashSet::new();

        for t in &transitions {
            for stage in [t.from, t.to] {
                if !stages.contains(&stage) {
                    return Err(TableError::UndeclaredStage {
                        stage,
                        from: t.from,
                        to: t.to,
                        role: t.role,
                    });
                }
            }
            if t.from == t.to {
                return Err(TableError::SelfTransition {
                    stage: t.from,
                    role: t.role,
                });
            }
            if rules.insert(t.key(), t.assignment).is_some() {
                return Err(TableError::DuplicateTransition {
                    from: t.from,
                    to: t.to,
                    role: t.role,
                });
            }
            next.entry(t.from).or_default().insert(t.to);
            if t.assignment == AssignmentRule::Claim {
                claim_targets.insert((t.to, t.role));
            }
        }

        for role in ActorRole::ALL {
            check_acyclic(role, &transitions)?;
        }

        Ok(TransitionTable {
            stages,
            transitions,
            rules,
            next,
            claim_targets,
        })
    }

    /// The standard order workflow over all seven stages.
    pub fn standard() -> Self {
        match Self::new(Stage::ALL, STANDARD_TRANSITIONS) {
            Ok(table) => table,
            Err(e) => unreachable!("standard transition table is invalid: {e}"),
        }
    }

    /// True iff the exact triple is declared.
    pub fn is_allowed(&self, from: Stage, to: Stage, role: ActorRole) -> bool {
        self.rules.contains_key(&TransitionKey { from, to, role })
    }

    /// Assignment rule of a declared triple, `None` if the triple is not declared.
    pub fn rule_for(&self, from: Stage, to: Stage, role: ActorRole) -> Option<AssignmentRule> {
        self.rules.get(&TransitionKey { from, to, role }).copied()
    }

    /// Union of target stages reachable from `from` in one step, across all
    /// roles. Does not disclose which role may take each step.
    pub fn legal_next_stages(&self, from: Stage) -> BTreeSet<Stage> {
        self.next.get(&from).cloned().unwrap_or_default()
    }

    pub fn is_terminal(&self, stage: Stage) -> bool {
        self.next.get(&stage).map_or(true, BTreeSet::is_empty)
    }

    /// Whether `role` moving into `to` is a claiming transition from some stage.
    pub fn is_claim_target(&self, to: Stage, role: ActorRole) -> bool {
        self.claim_targets.contains(&(to, role))
    }

    /// Declared transitions, in declaration order.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.stages.iter().copied()
    }

    pub fn terminal_stages(&self) -> BTreeSet<Stage> {
        self.stages
            .iter()
            .copied()
            .filter(|s| self.is_terminal(*s))
            .collect()
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Depth-first search for a back edge in the sub-graph of one role.
fn check_acyclic(role: ActorRole, transitions: &[Transition]) -> Result<(), TableError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    let mut edges: BTreeMap<Stage, Vec<Stage>> = BTreeMap::new();
    for t in transitions.iter().filter(|t| t.role == role) {
        edges.entry(t.from).or_default().push(t.to);
    }

    let mut marks: HashMap<Stage, Mark> = HashMap::new();
    for start in edges.keys().copied() {
        if marks.contains_key(&start) {
            continue;
        }
        let mut stack = vec![(start, 0usize)];
        marks.insert(start, Mark::Visiting);
        while let Some((stage, idx)) = stack.pop() {
            let succs = edges.get(&stage).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(&succ) = succs.get(idx) {
                stack.push((stage, idx + 1));
                match marks.get(&succ) {
                    Some(Mark::Visiting) => {
                        return Err(TableError::CyclicTransitions { role, stage: succ })
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(succ, Mark::Visiting);
                        stack.push((succ, 0));
                    }
                }
            } else {
                marks.insert(stage, Mark::Done);
            }
        }
    }
    Ok(())
}
