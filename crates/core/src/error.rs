use crate::stage::{ActorRole, Stage};

/// A transition table that failed construction-time validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// A triple references a stage that is not in the declared stage set.
    #[error("transition {from} -> {to} ({role}) references undeclared stage {stage}")]
    UndeclaredStage {
        stage: Stage,
        from: Stage,
        to: Stage,
        role: ActorRole,
    },

    /// The same (from, to, role) triple is declared twice.
    #[error("transition {from} -> {to} is declared twice for role '{role}'")]
    DuplicateTransition {
        from: Stage,
        to: Stage,
        role: ActorRole,
    },

    /// A triple moves a stage onto itself.
    #[error("transition {stage} -> {stage} ({role}) does not change the stage")]
    SelfTransition { stage: Stage, role: ActorRole },

    /// The declared stage set does not include the initial stage.
    #[error("initial stage {0} is not declared")]
    MissingInitialStage(Stage),

    /// The transitions available to one role contain a cycle.
    #[error("transitions for role '{role}' contain a cycle through {stage}")]
    CyclicTransitions { role: ActorRole, stage: Stage },
}
