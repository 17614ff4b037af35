//! Request-scoped propagation context
//!
//! A [`Context`] is an immutable chain of type-keyed values. Deriving a new
//! context with [`Context::with_value`] pushes a node on top of the chain and
//! leaves the parent untouched, so a context captured earlier in a call chain
//! keeps resolving the same values no matter what downstream code attaches.
//!
//! The database handle is one such value (see [`crate::attach`]), but callers
//! may carry their own request-scoped data the same way.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

struct Node {
    parent: Option<Arc<Node>>,
    key: TypeId,
    value: Arc<dyn Any + Send + Sync>,
}

/// Immutable, cheaply clonable carrier for request-scoped values.
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Node>>,
}

impl Context {
    /// An empty root context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a context that carries `value`, shadowing any value of the same
    /// type bound further up the chain.
    pub fn with_value<T>(&self, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            head: Some(Arc::new(Node {
                parent: self.head.clone(),
                key: TypeId::of::<T>(),
                value: Arc::new(value),
            })),
        }
    }

    /// Nearest value of type `T`, walking from this context towards the root.
    pub fn value<T>(&self) -> Option<&T>
    where
        T: Any + Send + Sync,
    {
        let key = TypeId::of::<T>();
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            if n.key == key {
                return (*n.value).downcast_ref::<T>();
            }
            node = n.parent.as_deref();
        }
        None
    }

    /// Number of values bound along the chain, shadowed ones included.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            depth += 1;
            node = n.parent.as_deref();
        }
        depth
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("depth", &self.depth()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct RequestId(u64);

    #[derive(Debug, PartialEq)]
    struct Tenant(&'static str);

    #[test]
    fn test_empty_context_has_no_values() {
        let ctx = Context::new();
        assert_eq!(ctx.value::<RequestId>(), None);
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_with_value_does_not_mutate_parent() {
        let root = Context::new();
        let child = root.with_value(RequestId(1));

        assert_eq!(root.value::<RequestId>(), None);
        assert_eq!(child.value::<RequestId>(), Some(&RequestId(1)));
    }

    #[test]
    fn test_nearest_binding_shadows_outer() {
        let outer = Context::new().with_value(RequestId(1));
        let inner = outer.with_value(Tenant("acme")).with_value(RequestId(2));

        assert_eq!(inner.value::<RequestId>(), Some(&RequestId(2)));
        assert_eq!(inner.value::<Tenant>(), Some(&Tenant("acme")));
        assert_eq!(outer.value::<RequestId>(), Some(&RequestId(1)));
        assert_eq!(outer.value::<Tenant>(), None);
        assert_eq!(inner.depth(), 3);
    }

    #[test]
    fn test_clones_share_the_chain() {
        let ctx = Context::new().with_value(Tenant("acme"));
        let copy = ctx.clone();
        let _derived = copy.with_value(Tenant("other"));

        assert_eq!(ctx.value::<Tenant>(), Some(&Tenant("acme")));
        assert_eq!(copy.value::<Tenant>(), Some(&Tenant("acme")));
    }
}
