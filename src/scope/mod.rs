// Scope model - lifetime classification of heap objects
#![allow(dead_code)]

mod propagation;

pub use propagation::ScopePropagator;

use serde::{Deserialize, Serialize};

/// Named lifetime classification for an object or class.
///
/// Scopes form a total order supplied by the [`ScopeDetector`], narrowest
/// first. An object reachable only from a singleton is effectively
/// singleton-scoped even if nothing declared it so.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope(String);

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Scope(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Narrowest scope: one plain object instance.
    pub fn instance() -> Self {
        Scope::new("instance")
    }

    pub fn request() -> Self {
        Scope::new("request")
    }

    pub fn session() -> Self {
        Scope::new("session")
    }

    pub fn singleton() -> Self {
        Scope::new("singleton")
    }

    /// Broadest scope: class (static) lifetime.
    pub fn statics() -> Self {
        Scope::new("static")
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Total order over scope names, narrowest first.
///
/// Built from [`ScopeDetector::scope_order`] once per scan; unknown scopes
/// rank below every known one so they never widen anything.
#[derive(Debug, Clone)]
pub struct ScopeOrder {
    names: Vec<String>,
}

impl ScopeOrder {
    pub fn new(scopes: Vec<Scope>) -> Self {
        Self {
            names: scopes.into_iter().map(|s| s.0).collect(),
        }
    }

    /// The default order: instance < request < session < singleton < static.
    pub fn standard() -> Self {
        Self::new(vec![
            Scope::instance(),
            Scope::request(),
            Scope::session(),
            Scope::singleton(),
            Scope::statics(),
        ])
    }

    pub fn rank(&self, scope: &Scope) -> Option<usize> {
        self.names.iter().position(|n| n == scope.name())
    }

    /// True when `candidate` is strictly broader than `current`.
    pub fn is_broader(&self, candidate: &Scope, current: &Scope) -> bool {
        match (self.rank(candidate), self.rank(current)) {
            (Some(c), Some(cur)) => c > cur,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// True when `scope` ranks at or above `floor` (e.g. "shared" scopes).
    pub fn at_least(&self, scope: &Scope, floor: &Scope) -> bool {
        match (self.rank(scope), self.rank(floor)) {
            (Some(s), Some(f)) => s >= f,
            _ => false,
        }
    }
}

/// Capability seam for environment-specific scope detection.
///
/// Concrete strategies (framework integrations, container probes) live
/// outside the core; the walker only sees this trait, memoized per class.
pub trait ScopeDetector: Send + Sync {
    /// Detect the declared scope of a class, if the environment knows one.
    fn detect_scope(&self, class: &str) -> Option<Scope>;

    /// Scope names in ascending breadth order.
    fn scope_order(&self) -> Vec<Scope>;

    /// Whether propagation should replace `current` with `candidate`.
    fn should_widen(&self, current: Option<&Scope>, candidate: &Scope) -> bool {
        let order = ScopeOrder::new(self.scope_order());
        match current {
            None => true,
            Some(cur) => order.is_broader(candidate, cur),
        }
    }
}

/// Scope detector backed by an explicit class-to-scope table.
///
/// The default detector for hosts without a framework probe, and the one
/// every test fixture uses.
#[derive(Debug, Default)]
pub struct MapScopeDetector {
    scopes: std::collections::HashMap<String, Scope>,
    order: Vec<Scope>,
}

impl MapScopeDetector {
    pub fn new() -> Self {
        Self {
            scopes: Default::default(),
            order: vec![
                Scope::instance(),
                Scope::request(),
                Scope::session(),
                Scope::singleton(),
                Scope::statics(),
            ],
        }
    }

    pub fn with_order(mut self, order: Vec<Scope>) -> Self {
        self.order = order;
        self
    }

    pub fn assign(&mut self, class: impl Into<String>, scope: Scope) {
        self.scopes.insert(class.into(), scope);
    }

    pub fn with_scope(mut self, class: impl Into<String>, scope: Scope) -> Self {
        self.assign(class, scope);
        self
    }
}

impl ScopeDetector for MapScopeDetector {
    fn detect_scope(&self, class: &str) -> Option<Scope> {
        self.scopes.get(class).cloned()
    }

    fn scope_order(&self) -> Vec<Scope> {
        self.order.clone()
    }
}
