use std::collections::HashMap;

use tracing::{debug, trace};

use crate::errors::{ProtoGraphError, Result};
use crate::registry::Registry;
use crate::types::*;

/// Outcome of resolving one type reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A built-in scalar; never produces an edge.
    Scalar,
    /// Qualified name of the bound entity (possibly a missing placeholder).
    Entity(String),
}

impl Resolution {
    pub fn qualified_name(&self) -> Option<&str> {
        match self {
            Resolution::Scalar => None,
            Resolution::Entity(name) => Some(name),
        }
    }
}

/// Resolves raw type references in a scope against the registry.
///
/// Every successful binding is memoized per (scope, reference) and is never
/// reconsidered, even if later declarations change the candidate set.
pub struct ReferenceResolver {
    show_missing_types: bool,
    /// scope -> raw reference -> qualified name.
    resolutions: HashMap<String, HashMap<String, String>>,
}

impl ReferenceResolver {
    /// Creates a resolver. With `show_missing_types` unresolved references
    /// bind to placeholder entities instead of failing.
    pub fn new(show_missing_types: bool) -> Self {
        Self {
            show_missing_types,
            resolutions: HashMap::new(),
        }
    }

    /// Resolves `reference` as written inside `scope`.
    ///
    /// Policy, in order:
    /// 1. Scalars short-circuit.
    /// 2. Memoized bindings are returned as is.
    /// 3. A leading `.` marks a fully qualified name, bound directly when declared.
    /// 4. A single candidate sharing the last component is taken.
    /// 5. Dotted references keep candidates that end with the reference and whose
    ///    remaining prefix encloses the scope; the longest qualified name wins.
    /// 6. Bare names keep candidates whose namespace encloses the scope; the
    ///    longest namespace wins.
    /// 7. Otherwise a placeholder is synthesized, or `UnresolvedReference` returned.
    pub fn resolve(
        &mut self,
        registry: &mut Registry,
        scope: &str,
        reference: &str,
    ) -> Result<Resolution> {
        if is_scalar_type(reference) {
            return Ok(Resolution::Scalar);
        }

        if let Some(bound) = self.lookup(scope, reference) {
            return Ok(Resolution::Entity(bound.to_string()));
        }

        match self.bind(registry, scope, reference)? {
            Some(qualified_name) => {
                debug!(scope, reference, target = %qualified_name, "resolved");
                self.resolutions
                    .entry(scope.to_string())
                    .or_default()
                    .insert(reference.to_string(), qualified_name.clone());
                Ok(Resolution::Entity(qualified_name))
            }
            None => self.unresolved(registry, scope, reference),
        }
    }

    /// Returns the memoized binding for the pair, if any.
    pub fn lookup(&self, scope: &str, reference: &str) -> Option<&str> {
        self.resolutions
            .get(scope)
            .and_then(|table| table.get(reference))
            .map(String::as_str)
    }

    /// Number of memoized (scope, reference) bindings.
    pub fn binding_count(&self) -> usize {
        self.resolutions.values().map(HashMap::len).sum()
    }

    // ------------------------------------------------------------------
    // Private helpers
    // ------------------------------------------------------------------

    fn bind(&self, registry: &Registry, scope: &str, reference: &str) -> Result<Option<String>> {
        let absolute = reference.strip_prefix('.');
        let reference = absolute.unwrap_or(reference);

        if absolute.is_some() {
            if let Some(entity) = registry.get(reference).filter(|e| e.kind.is_type()) {
                return Ok(Some(entity.qualified_name.clone()));
            }
        }

        let short = reference.rsplit('.').next().unwrap_or(reference);
        let candidates: Vec<&Entity> = registry
            .candidates_for_short_name(short)
            .iter()
            .filter_map(|name| registry.get(name))
            .filter(|e| e.kind.is_type())
            .collect();

        match candidates.len() {
            0 => return Ok(None),
            1 => return Ok(Some(candidates[0].qualified_name.clone())),
            _ => {}
        }

        if reference.contains('.') {
            let survivors: Vec<&str> = candidates
                .iter()
                .map(|e| e.qualified_name.as_str())
                .filter(|name| has_component_suffix(name, reference))
                .filter(|name| is_scope_prefix(namespace_of(name, reference), scope))
                .collect();
            trace!(scope, reference, ?survivors, "qualified candidates");
            self.longest(scope, reference, survivors, |name| name.len())
        } else {
            let survivors: Vec<&str> = candidates
                .iter()
                .filter(|e| is_scope_prefix(e.namespace(), scope))
                .map(|e| e.qualified_name.as_str())
                .collect();
            trace!(scope, reference, ?survivors, "scoped candidates");
            self.longest(scope, reference, survivors, |name| {
                namespace_of(name, reference).len()
            })
        }
    }

    /// Picks the survivor with the greatest `weight`; equal weights are ambiguous.
    fn longest(
        &self,
        scope: &str,
        reference: &str,
        mut survivors: Vec<&str>,
        weight: impl Fn(&str) -> usize,
    ) -> Result<Option<String>> {
        survivors.sort_by(|a, b| weight(b).cmp(&weight(a)).then_with(|| a.cmp(b)));
        survivors.dedup();
        match survivors.as_slice() {
            [] => Ok(None),
            [first, second, ..] if weight(first) == weight(second) => {
                let best = weight(first);
                Err(ProtoGraphError::AmbiguousReference {
                    scope: scope.to_string(),
                    reference: reference.to_string(),
                    candidates: survivors
                        .iter()
                        .filter(|name| weight(name) == best)
                        .map(|name| name.to_string())
                        .collect(),
                })
            }
            [first, ..] => Ok(Some(first.to_string())),
        }
    }

    fn unresolved(
        &mut self,
        registry: &mut Registry,
        scope: &str,
        reference: &str,
    ) -> Result<Resolution> {
        if !self.show_missing_types {
            return Err(ProtoGraphError::UnresolvedReference {
                scope: scope.to_string(),
                reference: reference.to_string(),
            });
        }

        let (owner_alias, source) = match registry.get(scope) {
            Some(owner) => (owner.alias.clone(), owner.source.clone()),
            None => (scope.to_string(), String::new()),
        };
        let placeholder = registry.missing_placeholder(&owner_alias, reference, &source);
        debug!(scope, reference, placeholder = %placeholder.alias, "missing type");
        Ok(Resolution::Entity(placeholder.qualified_name.clone()))
    }
}
