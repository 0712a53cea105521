use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::function::Function;

/// Name-keyed function registry, built once and shared by every calculator
/// of an engine. Lookups are case-insensitive.
#[derive(Default, Clone)]
pub struct FunctionLibrary {
    functions: FxHashMap<String, Arc<dyn Function>>,
    aliases: FxHashMap<String, String>,
}

fn key(name: &str) -> String {
    name.to_ascii_uppercase()
}

impl FunctionLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in function plus the math-host extensions.
    pub fn with_builtins() -> Self {
        let mut library = Self::new();
        crate::builtins::register_builtins(&mut library);
        library
    }

    /// Adds a function unless the name is taken. Returns whether it was
    /// added.
    pub fn register(&mut self, function: Arc<dyn Function>) -> bool {
        let name = key(function.name());
        if self.contains(&name) {
            return false;
        }
        self.functions.insert(name, function);
        true
    }

    /// Makes `alias` resolve to the function registered as `target`.
    pub fn alias(&mut self, alias: &str, target: &str) -> bool {
        let (alias, target) = (key(alias), key(target));
        if self.contains(&alias) || !self.functions.contains_key(&target) {
            return false;
        }
        self.aliases.insert(alias, target);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Function>> {
        let name = key(name);
        match self.aliases.get(&name) {
            Some(target) => self.functions.get(target),
            None => self.functions.get(&name),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = key(name);
        self.functions.contains_key(&name) || self.aliases.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Registered names, aliases included, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .functions
            .keys()
            .chain(self.aliases.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for FunctionLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionLibrary")
            .field("functions", &self.functions.len())
            .field("aliases", &self.aliases.len())
            .finish()
    }
}
