// SPDX-License-Identifier: Apache-2.0

//! Native type catalogs
//!
//! Each engine declares its native types as a Rust enum implementing
//! [`NativeType`] plus a static table of [`TypeDescriptor`]s. Building a
//! [`DatabaseTypes`] validates the table (every item described exactly once,
//! unique synonyms, alias targets known, alias graph acyclic) and resolves
//! every alias chain to its canonical name up front, so lookups never fail.

mod cache;

pub use cache::TypeCatalogCache;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use crate::error::{EngineError, EngineResult};
use crate::types::{DbType, HostType};

/// An engine's enumeration of native types.
pub trait NativeType: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Logical engine identifier, e.g. "oracle".
    const ENGINE: &'static str;

    /// Every item of the enumeration, in declaration order.
    fn variants() -> &'static [Self];

    fn descriptors() -> Vec<TypeDescriptor<Self>>;

    fn item_name(self) -> &'static str;

    /// Stable numeric value of the item.
    fn native_value(self) -> i32;
}

/// Static description of one native type.
#[derive(Debug, Clone)]
pub struct TypeDescriptor<E> {
    pub item: E,
    pub db_type: DbType,
    pub host_type: HostType,
    /// Synonyms accepted by the engine; the first one is the display name.
    pub names: &'static [&'static str],
    pub alias_for: Option<E>,
}

impl<E> TypeDescriptor<E> {
    pub fn new(item: E, db_type: DbType, host_type: HostType) -> Self {
        Self {
            item,
            db_type,
            host_type,
            names: &[],
            alias_for: None,
        }
    }

    pub fn names(mut self, names: &'static [&'static str]) -> Self {
        self.names = names;
        self
    }

    pub fn alias_for(mut self, target: E) -> Self {
        self.alias_for = Some(target);
        self
    }
}

/// A validated native type with its alias chain already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseType {
    engine: &'static str,
    item: &'static str,
    native_value: i32,
    db_type: DbType,
    host_type: HostType,
    names: Vec<&'static str>,
    alias_for: Option<&'static str>,
    type_name: &'static str,
    alias_depth: usize,
}

impl DatabaseType {
    pub fn engine(&self) -> &'static str {
        self.engine
    }

    pub fn item(&self) -> &'static str {
        self.item
    }

    pub fn native_value(&self) -> i32 {
        self.native_value
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }

    pub fn host_type(&self) -> HostType {
        self.host_type
    }

    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    /// Item this type is a direct alias of.
    pub fn alias_for(&self) -> Option<&'static str> {
        self.alias_for
    }

    pub fn is_alias(&self) -> bool {
        self.alias_for.is_some()
    }

    /// Display name of the non-alias type at the end of the alias chain.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Number of alias hops to the canonical type; zero for non-aliases.
    pub fn alias_depth(&self) -> usize {
        self.alias_depth
    }
}

/// One engine's validated type catalog.
#[derive(Debug)]
pub struct DatabaseTypes {
    engine: &'static str,
    types: Vec<DatabaseType>,
    by_value: HashMap<i32, usize>,
    by_item: HashMap<&'static str, usize>,
    by_name: HashMap<String, usize>,
}

impl DatabaseTypes {
    /// Builds and validates the catalog for `E`.
    pub fn build<E: NativeType>() -> EngineResult<Self> {
        Self::from_descriptors(E::variants(), E::descriptors())
    }

    /// Builds a catalog from an explicit item list and descriptor table.
    pub fn from_descriptors<E: NativeType>(
        variants: &[E],
        descriptors: Vec<TypeDescriptor<E>>,
    ) -> EngineResult<Self> {
        let engine = E::ENGINE;

        let mut described: HashMap<E, TypeDescriptor<E>> = HashMap::new();
        for descriptor in descriptors {
            let item = descriptor.item;
            if described.insert(item, descriptor).is_some() {
                return Err(EngineError::DuplicateTypeDescriptor {
                    engine: engine.to_string(),
                    item: item.item_name().to_string(),
                });
            }
        }

        let mut ordered = Vec::with_capacity(variants.len());
        for item in variants {
            let descriptor = described.get(item).ok_or_else(|| EngineError::MissingTypeDescriptor {
                engine: engine.to_string(),
                item: item.item_name().to_string(),
            })?;
            ordered.push(descriptor);
        }

        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (index, descriptor) in ordered.iter().copied().enumerate() {
            for name in synonyms(descriptor) {
                let key = fold(name);
                match by_name.get(&key) {
                    Some(&existing) if existing != index => {
                        return Err(EngineError::DuplicateTypeName {
                            engine: engine.to_string(),
                            name: name.to_string(),
                            first: ordered[existing].item.item_name().to_string(),
                            second: descriptor.item.item_name().to_string(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        by_name.insert(key, index);
                    }
                }
            }
        }

        let known: HashSet<E> = variants.iter().copied().collect();
        for descriptor in &ordered {
            if let Some(target) = descriptor.alias_for {
                if !known.contains(&target) {
                    return Err(EngineError::UnknownAliasTarget {
                        engine: engine.to_string(),
                        item: descriptor.item.item_name().to_string(),
                        target: target.item_name().to_string(),
                    });
                }
            }
        }

        let mut types = Vec::with_capacity(ordered.len());
        let mut by_value = HashMap::with_capacity(ordered.len());
        let mut by_item = HashMap::with_capacity(ordered.len());
        for (index, descriptor) in ordered.iter().copied().enumerate() {
            let (canonical, alias_depth) = resolve_alias(engine, descriptor, &described)?;
            let item = descriptor.item;
            by_value.insert(item.native_value(), index);
            by_item.insert(item.item_name(), index);
            types.push(DatabaseType {
                engine,
                item: item.item_name(),
                native_value: item.native_value(),
                db_type: descriptor.db_type,
                host_type: descriptor.host_type,
                names: synonyms(descriptor),
                alias_for: descriptor.alias_for.map(E::item_name),
                type_name: synonyms(canonical)[0],
                alias_depth,
            });
        }

        tracing::debug!(engine, types = types.len(), "Built type catalog");

        Ok(Self {
            engine,
            types,
            by_value,
            by_item,
            by_name,
        })
    }

    pub fn engine(&self) -> &'static str {
        self.engine
    }

    pub fn get<E: NativeType>(&self, item: E) -> Option<&DatabaseType> {
        if E::ENGINE != self.engine {
            return None;
        }
        self.by_item.get(item.item_name()).map(|&i| &self.types[i])
    }

    pub fn by_value(&self, value: i32) -> Option<&DatabaseType> {
        self.by_value.get(&value).map(|&i| &self.types[i])
    }

    /// Case-insensitive lookup by any synonym.
    ///
    /// Length, precision and scale decorations are ignored, so
    /// `VARCHAR2(50 CHAR)` finds `VARCHAR2` and `TIMESTAMP(6) WITH TIME ZONE`
    /// finds `TIMESTAMP WITH TIME ZONE`. As a last resort the first word of
    /// the name is tried (`int unsigned` finds `int` when no unsigned
    /// synonym exists), after dropping modifiers such as `zerofill`.
    pub fn lookup(&self, name: &str) -> Option<&DatabaseType> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Some(&i) = self.by_name.get(&fold(trimmed)) {
            return Some(&self.types[i]);
        }
        let mut normalized = normalize_type_name(trimmed);
        if let Some(&i) = self.by_name.get(&normalized) {
            return Some(&self.types[i]);
        }
        while let Some(rest) = TRAILING_MODIFIERS
            .iter()
            .find_map(|m| normalized.strip_suffix(m).and_then(|r| r.strip_suffix(' ')))
        {
            normalized = rest.to_string();
            if let Some(&i) = self.by_name.get(&normalized) {
                return Some(&self.types[i]);
            }
        }
        normalized
            .split(' ')
            .next()
            .and_then(|first| self.by_name.get(first))
            .map(|&i| &self.types[i])
    }

    /// Portable tag for a native type name, `DbType::String` when unknown.
    pub fn db_type_or_default(&self, name: &str) -> DbType {
        self.lookup(name)
            .map(DatabaseType::db_type)
            .unwrap_or(DbType::String)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DatabaseType> {
        self.types.iter()
    }
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

fn synonyms<E: NativeType>(descriptor: &TypeDescriptor<E>) -> Vec<&'static str> {
    if descriptor.names.is_empty() {
        vec![descriptor.item.item_name()]
    } else {
        descriptor.names.to_vec()
    }
}

/// Walks the alias chain from `descriptor` to its non-alias end.
fn resolve_alias<'a, E: NativeType>(
    engine: &str,
    descriptor: &'a TypeDescriptor<E>,
    described: &'a HashMap<E, TypeDescriptor<E>>,
) -> EngineResult<(&'a TypeDescriptor<E>, usize)> {
    let mut visited = HashSet::from([descriptor.item]);
    let mut chain = vec![descriptor.item];
    let mut current = descriptor;

    while let Some(target) = current.alias_for {
        chain.push(target);
        if !visited.insert(target) {
            return Err(EngineError::CircularAliasReference {
                engine: engine.to_string(),
                chain: chain.iter().map(|item| item.item_name().to_string()).collect(),
            });
        }
        current = described.get(&target).ok_or_else(|| EngineError::UnknownAliasTarget {
            engine: engine.to_string(),
            item: current.item.item_name().to_string(),
            target: target.item_name().to_string(),
        })?;
    }

    Ok((current, chain.len() - 1))
}

/// Lowercases, drops parenthesised parts and collapses whitespace.
/// Display-only modifiers that never change which native type a name means.
const TRAILING_MODIFIERS: &[&str] = &["zerofill"];

fn normalize_type_name(name: &str) -> String {
    let mut stripped = String::with_capacity(name.len());
    let mut depth = 0usize;
    for c in name.chars() {
        match c {
            '(' => {
                depth += 1;
                stripped.push(' ');
            }
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(c),
            _ => {}
        }
    }
    fold(&stripped.split_whitespace().collect::<Vec<_>>().join(" "))
}
