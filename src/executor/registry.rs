//! Strategy executor registry

use super::{
    DockerfileExecutor, ExecutorContext, FlakeExecutor, GoExecutor, NixpacksExecutor,
    NodeExecutor, PythonExecutor, RustExecutor, StrategyExecutor,
};
use crate::detection::Strategy;
use std::sync::Arc;
use thiserror::Error;

/// Strategies every production registry must serve
pub const REQUIRED_STRATEGIES: &[Strategy] = &[
    Strategy::Flake,
    Strategy::AutoGo,
    Strategy::AutoNode,
    Strategy::AutoRust,
    Strategy::AutoPython,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no executor found for strategy: {0}")]
    StrategyNotFound(Strategy),

    #[error("missing executors for strategies: {}", .0.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "))]
    MissingExecutors(Vec<Strategy>),
}

/// Ordered executor list; the first executor supporting a strategy wins
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: Vec<Arc<dyn StrategyExecutor>>,
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("strategies", &self.registered_strategies())
            .finish()
    }
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in executor sharing `context`
    pub fn with_defaults(context: Arc<ExecutorContext>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FlakeExecutor::new(context.clone())));
        registry.register(Arc::new(GoExecutor::new(context.clone())));
        registry.register(Arc::new(NodeExecutor::new(context.clone())));
        registry.register(Arc::new(RustExecutor::new(context.clone())));
        registry.register(Arc::new(PythonExecutor::new(context.clone())));
        registry.register(Arc::new(DockerfileExecutor::new(context.clone())));
        registry.register(Arc::new(NixpacksExecutor::new(context)));
        registry
    }

    pub fn register(&mut self, executor: Arc<dyn StrategyExecutor>) {
        self.executors.push(executor);
    }

    pub fn resolve(&self, strategy: &Strategy) -> Result<Arc<dyn StrategyExecutor>, RegistryError> {
        self.executors
            .iter()
            .find(|e| e.supports(strategy))
            .cloned()
            .ok_or_else(|| RegistryError::StrategyNotFound(strategy.clone()))
    }

    /// Fails listing every required strategy with no executor, in the given order
    pub fn verify_completeness(&self, required: &[Strategy]) -> Result<(), RegistryError> {
        let missing: Vec<Strategy> = required
            .iter()
            .filter(|s| !self.executors.iter().any(|e| e.supports(s)))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::MissingExecutors(missing))
        }
    }

    /// Strategies in registration order
    pub fn registered_strategies(&self) -> Vec<Strategy> {
        self.executors.iter().map(|e| e.strategy()).collect()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Arc<ExecutorContext> {
        Arc::new(ExecutorContext::for_tests())
    }

    #[test]
    fn test_with_defaults_is_complete() {
        let registry = ExecutorRegistry::with_defaults(context());
        assert!(registry.verify_completeness(REQUIRED_STRATEGIES).is_ok());
        assert_eq!(registry.len(), 7);
        assert_eq!(
            registry.registered_strategies(),
            vec![
                Strategy::Flake,
                Strategy::AutoGo,
                Strategy::AutoNode,
                Strategy::AutoRust,
                Strategy::AutoPython,
                Strategy::Dockerfile,
                Strategy::Nixpacks,
            ]
        );
    }

    #[test]
    fn test_resolve() {
        let registry = ExecutorRegistry::with_defaults(context());
        let executor = registry.resolve(&Strategy::AutoPython).unwrap();
        assert_eq!(executor.strategy(), Strategy::AutoPython);

        let Err(err) = registry.resolve(&Strategy::Auto) else {
            panic!("auto has no executor");
        };
        assert_eq!(err.to_string(), "no executor found for strategy: auto");
    }

    #[test]
    fn test_first_registration_wins() {
        let ctx = context();
        let mut registry = ExecutorRegistry::new();
        let first: Arc<dyn StrategyExecutor> = Arc::new(GoExecutor::new(ctx.clone()));
        registry.register(first.clone());
        registry.register(Arc::new(GoExecutor::new(ctx)));

        let resolved = registry.resolve(&Strategy::AutoGo).unwrap();
        assert!(Arc::ptr_eq(&resolved, &first));
    }

    #[test]
    fn test_missing_executors_listed_in_order() {
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(GoExecutor::new(context())));

        let err = registry.verify_completeness(REQUIRED_STRATEGIES).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing executors for strategies: flake, auto-node, auto-rust, auto-python"
        );
        assert!(ExecutorRegistry::new().is_empty());
    }
}
