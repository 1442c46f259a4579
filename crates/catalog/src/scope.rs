use crate::Map;
use common::{QueryError, QueryResult};
use types::FieldType;

/// A name visible at some pipeline position.
#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub field_type: FieldType,
    /// For aliases, the source column the name maps back to.
    pub source_column: Option<String>,
}

/// A chain of symbol tables. Commands that reset the visible columns
/// (`stats`, `top`, `rare`, ...) install a child level; lookups search
/// the current level first, then ancestors.
///
/// Invariant: operations on the current level never mutate ancestors.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    symbols: Map<String, Symbol>,
    order: Vec<String>,
    parent: Option<Box<Scope>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume this scope as the parent of a fresh child level.
    pub fn new_child(self) -> Self {
        Self {
            symbols: Map::default(),
            order: Vec::new(),
            parent: Some(Box::new(self)),
        }
    }

    /// Define a name in the current level. Fails if the name is already
    /// present at this level; shadowing an ancestor is fine.
    pub fn define(&mut self, name: &str, field_type: FieldType) -> QueryResult<()> {
        self.define_symbol(Symbol {
            name: name.to_string(),
            field_type,
            source_column: None,
        })
    }

    /// Define an alias carrying a back-reference to its source column.
    pub fn define_alias(
        &mut self,
        name: &str,
        field_type: FieldType,
        source_column: &str,
    ) -> QueryResult<()> {
        self.define_symbol(Symbol {
            name: name.to_string(),
            field_type,
            source_column: Some(source_column.to_string()),
        })
    }

    fn define_symbol(&mut self, symbol: Symbol) -> QueryResult<()> {
        if self.symbols.contains_key(&symbol.name) {
            return Err(QueryError::Semantic(format!(
                "'{}' is already defined",
                symbol.name
            )));
        }
        self.order.push(symbol.name.clone());
        self.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Overwrite or create a name in the current level without touching
    /// ancestors.
    pub fn update(&mut self, name: &str, field_type: FieldType) {
        if !self.symbols.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.symbols.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                field_type,
                source_column: None,
            },
        );
    }

    /// Like `update`, but carrying an alias back-reference.
    pub fn update_alias(&mut self, name: &str, field_type: FieldType, source_column: &str) {
        if !self.symbols.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.symbols.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                field_type,
                source_column: Some(source_column.to_string()),
            },
        );
    }

    /// Search the current level, then ancestors.
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        match self.symbols.get(name) {
            Some(symbol) => Some(symbol),
            None => self.parent.as_deref().and_then(|p| p.resolve(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Map an alias back to its source column; names without a
    /// back-reference map to themselves. Unknown names resolve to None.
    pub fn resolve_field_name(&self, name: &str) -> Option<String> {
        let symbol = self.resolve(name)?;
        Some(
            symbol
                .source_column
                .clone()
                .unwrap_or_else(|| symbol.name.clone()),
        )
    }

    /// Flatten the chain, inner levels shadowing outer ones. Within a
    /// level, symbols appear in definition order.
    pub fn all_symbols(&self) -> Vec<&Symbol> {
        let mut out: Vec<&Symbol> = Vec::new();
        let mut seen: Map<&str, ()> = Map::default();
        let mut level = Some(self);
        while let Some(scope) = level {
            for name in &scope.order {
                if seen.contains_key(name.as_str()) {
                    continue;
                }
                if let Some(symbol) = scope.symbols.get(name) {
                    seen.insert(name.as_str(), ());
                    out.push(symbol);
                }
            }
            level = scope.parent.as_deref();
        }
        out
    }

    /// Number of symbols in the current level only.
    pub fn level_len(&self) -> usize {
        self.symbols.len()
    }
}
