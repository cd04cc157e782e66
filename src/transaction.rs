use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpliceError};
use crate::operations::{Operation, Target};
use crate::selector::{Anchor, Scope, Selector};

/// What to do when a selector matches more than one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Use the node picked by the selector's ordinal and say nothing.
    Ignore,
    /// Use the picked node, log a warning and report the ambiguity.
    #[default]
    Warn,
    /// Abort the whole transaction.
    FailFast,
}

impl AmbiguityPolicy {
    /// Maps a `warn_on_ambiguity` flag onto a policy.
    pub fn warn(enabled: bool) -> Self {
        if enabled {
            AmbiguityPolicy::Warn
        } else {
            AmbiguityPolicy::Ignore
        }
    }
}

/// A selector that qualified more than one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ambiguity {
    pub operation_index: usize,
    pub selector: String,
    pub candidates: usize,
    pub chosen: usize,
}

impl Display for Ambiguity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "selector `{}` in operation #{} matched multiple nodes ({} candidates); using match #{}",
            self.selector,
            self.operation_index + 1,
            self.candidates,
            self.chosen
        )
    }
}

/// Outcome of a successful apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, fieldwork::Fieldwork)]
#[fieldwork(get)]
pub struct ApplyReport {
    /// Ambiguities observed under [`AmbiguityPolicy::Warn`].
    ambiguities: Vec<Ambiguity>,
    #[fieldwork(get(copy))]
    applied: usize,
}

impl ApplyReport {
    pub fn into_ambiguities(self) -> Vec<Ambiguity> {
        self.ambiguities
    }
}

/// Named selectors defined by an operation list.
///
/// The table is built and checked before the first mutation, so an
/// undefined or duplicated alias never leaves a document half edited.
/// A reference may only name an alias defined earlier in the list.
#[derive(Debug, Clone, Default)]
pub struct SelectorTable {
    aliases: HashMap<String, Selector>,
}

impl SelectorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_operations(operations: &[Operation]) -> Result<Self> {
        let mut table = Self::new();
        for operation in operations {
            let (target, until) = operation.targets();
            for target in [target, until].into_iter().flatten() {
                match target {
                    Target::Selector(selector) => table.register(selector)?,
                    Target::Ref(alias) => {
                        table.get(alias)?;
                    }
                }
            }
        }
        Ok(table)
    }

    /// Registers the selector's alias along with any aliases nested in its scope.
    pub fn register(&mut self, selector: &Selector) -> Result<()> {
        match selector.scope() {
            Some(Scope::After(anchor) | Scope::Within(anchor)) => match anchor {
                Anchor::Selector(inner) => self.register(inner)?,
                Anchor::Ref(alias) => {
                    self.get(alias)?;
                }
            },
            None => {}
        }

        if let Some(alias) = selector.alias() {
            self.define(alias, selector.clone())?;
        }
        Ok(())
    }

    pub fn define(&mut self, alias: &str, selector: Selector) -> Result<()> {
        if self.aliases.contains_key(alias) {
            return Err(SpliceError::SelectorAliasAlreadyDefined(alias.to_string()));
        }
        self.aliases.insert(alias.to_string(), selector);
        Ok(())
    }

    pub fn get(&self, alias: &str) -> Result<&Selector> {
        self.aliases
            .get(alias)
            .ok_or_else(|| SpliceError::SelectorAliasNotDefined(alias.to_string()))
    }

    pub fn resolve<'a>(&'a self, target: &'a Target) -> Result<&'a Selector> {
        match target {
            Target::Selector(selector) => Ok(selector),
            Target::Ref(alias) => self.get(alias),
        }
    }

    pub fn resolve_anchor<'a>(&'a self, anchor: &'a Anchor) -> Result<&'a Selector> {
        match anchor {
            Anchor::Selector(selector) => Ok(selector),
            Anchor::Ref(alias) => self.get(alias),
        }
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Collects ambiguity signals for one operation according to a policy.
#[derive(Debug)]
pub struct AmbiguitySink {
    policy: AmbiguityPolicy,
    operation_index: usize,
    observed: Vec<Ambiguity>,
}

impl AmbiguitySink {
    pub fn new(policy: AmbiguityPolicy) -> Self {
        Self {
            policy,
            operation_index: 0,
            observed: vec![],
        }
    }

    /// Called by the engine whenever `selector` had `candidates` matches.
    pub fn observe(&mut self, selector: &Selector, candidates: usize) -> Result<()> {
        if candidates < 2 {
            return Ok(());
        }

        let ambiguity = Ambiguity {
            operation_index: self.operation_index,
            selector: selector.to_string(),
            candidates,
            chosen: selector.ordinal(),
        };

        match self.policy {
            AmbiguityPolicy::Ignore => Ok(()),
            AmbiguityPolicy::Warn => {
                log::warn!("{ambiguity}");
                self.observed.push(ambiguity);
                Ok(())
            }
            AmbiguityPolicy::FailFast => Err(SpliceError::Ambiguity(ambiguity)),
        }
    }
}

/// Runs `operations` in order against a working copy of `state`.
///
/// The copy only replaces `state` once every operation succeeded. The first
/// failure is returned as [`SpliceError::OperationFailed`] and `state` is left
/// exactly as it was.
pub fn execute<S, F>(
    state: &mut S,
    operations: &[Operation],
    policy: AmbiguityPolicy,
    mut step: F,
) -> Result<ApplyReport>
where
    S: Clone,
    F: FnMut(&mut S, &Operation, &SelectorTable, &mut AmbiguitySink) -> Result<()>,
{
    let table = SelectorTable::from_operations(operations)?;
    let mut working_copy = state.clone();
    let mut sink = AmbiguitySink::new(policy);

    for (index, operation) in operations.iter().enumerate() {
        log::trace!("applying operation #{}: {operation}", index + 1);
        sink.operation_index = index;
        step(&mut working_copy, operation, &table, &mut sink)
            .map_err(|source| SpliceError::failed_at(index, source))?;
    }

    *state = working_copy;
    Ok(ApplyReport {
        ambiguities: sink.observed,
        applied: operations.len(),
    })
}
