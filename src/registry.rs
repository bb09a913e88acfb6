/// Name -> candidate-signature registry for distributions and functions.
///
/// Populated once at construction from the builtin tables; later
/// registrations are allowed (user-added generators) but nothing is ever
/// removed. Several signatures may share one display name; the matcher
/// picks among them.
use crate::builtins;
use crate::error::EvalError;
use crate::generator::{GeneratorKind, GeneratorSpec};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct Registry {
    distributions: BTreeMap<&'static str, Vec<&'static GeneratorSpec>>,
    functions: BTreeMap<&'static str, Vec<&'static GeneratorSpec>>,
}

impl Registry {
    /// A registry holding every builtin distribution and function.
    pub fn standard() -> Registry {
        let mut registry = Registry::default();
        for spec in builtins::DISTRIBUTIONS {
            registry.register(spec);
        }
        for spec in builtins::FUNCTIONS {
            registry.register(spec);
        }
        registry
    }

    pub fn register(&mut self, spec: &'static GeneratorSpec) {
        let table = match spec.kind {
            GeneratorKind::Stochastic => &mut self.distributions,
            GeneratorKind::Deterministic => &mut self.functions,
        };
        table.entry(spec.name).or_default().push(spec);
    }

    pub fn lookup_distribution(
        &self,
        name: &str,
    ) -> Result<&[&'static GeneratorSpec], EvalError> {
        self.distributions
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| EvalError::UnknownGenerator {
                name: name.to_string(),
            })
    }

    pub fn lookup_function(&self, name: &str) -> Result<&[&'static GeneratorSpec], EvalError> {
        self.functions
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| EvalError::UnknownFunction {
                name: name.to_string(),
            })
    }

    /// Whether `name` names a registered deterministic function. The line
    /// front-end uses this to classify the right-hand side of `=`.
    pub fn is_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn is_distribution(&self, name: &str) -> bool {
        self.distributions.contains_key(name)
    }

    pub fn distribution_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.distributions.keys().copied()
    }

    pub fn function_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }

    /// Every name an editor or autocomplete layer might care about:
    /// generator and function names plus their parameter names, sorted
    /// and deduplicated.
    pub fn keywords(&self) -> Vec<&'static str> {
        let mut keywords: Vec<&'static str> = Vec::new();
        for specs in self.distributions.values().chain(self.functions.values()) {
            for spec in specs {
                keywords.push(spec.name);
                keywords.extend(spec.params.iter().map(|p| p.name));
            }
        }
        keywords.sort_unstable();
        keywords.dedup();
        keywords
    }
}
