use std::collections::HashMap;

use tracing::trace;

use crate::errors::{ProtoGraphError, Result};
use crate::types::{Entity, EntityKind};

/// First value handed out by the alias counter.
const FIRST_ALIAS: u32 = 100;

/// Global symbol table for one run.
///
/// Stores every declared entity keyed by qualified name, an index from short
/// name to all qualified names sharing it, and the alias table. It carries no
/// resolution logic of its own.
#[derive(Debug)]
pub struct Registry {
    entities: HashMap<String, Entity>,
    /// Qualified names grouped by short name, in declaration order.
    short_names: HashMap<String, Vec<String>>,
    /// (short name, qualified name) -> alias.
    aliases: HashMap<(String, String), String>,
    /// alias -> qualified name.
    alias_targets: HashMap<String, String>,
    next_alias: u32,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            short_names: HashMap::new(),
            aliases: HashMap::new(),
            alias_targets: HashMap::new(),
            next_alias: FIRST_ALIAS,
        }
    }

    /// Inserts a new entity.
    ///
    /// Fails with `DuplicateDeclaration` if the qualified name is taken; the
    /// existing entity is left untouched. Placeholders are stored but never
    /// indexed by short name.
    pub fn declare(&mut self, entity: Entity) -> Result<()> {
        if let Some(existing) = self.entities.get(&entity.qualified_name) {
            return Err(ProtoGraphError::DuplicateDeclaration {
                qualified_name: entity.qualified_name.clone(),
                path: existing.source.clone(),
            });
        }

        if entity.kind != EntityKind::Missing {
            self.short_names
                .entry(entity.name.clone())
                .or_default()
                .push(entity.qualified_name.clone());
        }
        trace!(name = %entity.qualified_name, alias = %entity.alias, "declared");
        self.entities.insert(entity.qualified_name.clone(), entity);
        Ok(())
    }

    /// Looks up an entity by its qualified name.
    pub fn get(&self, qualified_name: &str) -> Option<&Entity> {
        self.entities.get(qualified_name)
    }

    /// Returns every qualified name declared under `short_name`.
    pub fn candidates_for_short_name(&self, short_name: &str) -> &[String] {
        self.short_names
            .get(short_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the stable alias for the pair, allocating one on first request.
    ///
    /// Aliases are `<short>_<n>` where `n` is unique per alias, so distinct
    /// pairs never collide regardless of their short names.
    pub fn get_or_create_alias(&mut self, short_name: &str, qualified_name: &str) -> String {
        let key = (short_name.to_string(), qualified_name.to_string());
        if let Some(alias) = self.aliases.get(&key) {
            return alias.clone();
        }

        let alias = format!("{}_{}", sanitize_alias(short_name), self.next_alias);
        self.next_alias += 1;
        self.alias_targets
            .insert(alias.clone(), qualified_name.to_string());
        self.aliases.insert(key, alias.clone());
        alias
    }

    /// Maps an alias back to its qualified name.
    pub fn qualified_name_for_alias(&self, alias: &str) -> Option<&str> {
        self.alias_targets.get(alias).map(String::as_str)
    }

    /// Looks up an entity by alias.
    pub fn entity_by_alias(&self, alias: &str) -> Option<&Entity> {
        self.qualified_name_for_alias(alias)
            .and_then(|name| self.entities.get(name))
    }

    /// Returns the placeholder standing in for `reference` as used by `owner_alias`,
    /// creating it on first request.
    ///
    /// Placeholders are keyed by (owner alias, reference), so repeated uses of
    /// one unresolved name from one owner share a single entity.
    pub fn missing_placeholder(&mut self, owner_alias: &str, reference: &str, source: &str) -> &Entity {
        let qualified_name = format!("missing.{owner_alias}.{reference}");
        if !self.entities.contains_key(&qualified_name) {
            let alias = self.get_or_create_alias(reference, &qualified_name);
            let entity = Entity {
                qualified_name: qualified_name.clone(),
                name: reference.to_string(),
                kind: EntityKind::Missing,
                alias,
                source: source.to_string(),
                parent: None,
                artifact: None,
                rpc: None,
            };
            self.entities.insert(qualified_name.clone(), entity);
        }
        &self.entities[&qualified_name]
    }

    /// Attaches a rendered fragment to an entity.
    pub fn set_artifact(&mut self, qualified_name: &str, artifact: String) {
        if let Some(entity) = self.entities.get_mut(qualified_name) {
            entity.artifact = Some(artifact);
        }
    }

    /// All entities, sorted by qualified name.
    pub fn entities(&self) -> Vec<&Entity> {
        let mut all: Vec<&Entity> = self.entities.values().collect();
        all.sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name));
        all
    }

    /// Number of stored entities, placeholders included.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Replaces characters that are not valid in a Graphviz identifier.
fn sanitize_alias(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
