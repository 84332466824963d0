//! Policies and expression trees.

use autonym_core::{BoxError, Meta, RequestView, ResponseView};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Future returned by [`Policy::check`].
pub type PolicyFuture<'a> = BoxFuture<'a, Result<(), BoxError>>;

/// An asynchronous authorization check.
///
/// A policy passes by resolving to `Ok(())` and denies by failing. The
/// failure becomes the reason reported to the caller, normalized through
/// [`AutonymError::from_error`](autonym_core::AutonymError::from_error).
/// Policies receive the live views and shared context, so they may read or
/// rewrite the working record and pass data to later stages through `meta`.
pub trait Policy: Send + Sync {
    /// Run the check.
    ///
    /// # Arguments
    ///
    /// * `req` - The request in flight.
    /// * `res` - The response, populated from `postStore` on.
    /// * `meta` - The shared context of this call.
    fn check<'a>(
        &'a self,
        req: &'a mut RequestView,
        res: &'a mut ResponseView,
        meta: &'a mut Meta,
    ) -> PolicyFuture<'a>;

    /// Get the name of this policy, used in logs.
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// A policy backed by an asynchronous closure.
///
/// The closure returns a boxed future borrowing its arguments:
///
/// ```
/// use autonym_core::BoxError;
/// use autonym_policy::FnPolicy;
///
/// let owner_only = FnPolicy::new(|req, _res, meta| {
///     Box::pin(async move {
///         let user = meta.get("userId").cloned();
///         let owner = req.data().and_then(|data| data.get("ownerId")).cloned();
///         if user.is_some() && user == owner {
///             Ok(())
///         } else {
///             Err(BoxError::from("not the owner"))
///         }
///     })
/// });
/// ```
pub struct FnPolicy<F> {
    name: String,
    f: F,
}

impl<F> FnPolicy<F>
where
    F: for<'a> Fn(&'a mut RequestView, &'a mut ResponseView, &'a mut Meta) -> PolicyFuture<'a>
        + Send
        + Sync,
{
    /// Wrap a closure as an anonymous policy.
    pub fn new(f: F) -> Self {
        Self {
            name: "anonymous".to_string(),
            f,
        }
    }

    /// Give this policy a name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<F> Policy for FnPolicy<F>
where
    F: for<'a> Fn(&'a mut RequestView, &'a mut ResponseView, &'a mut Meta) -> PolicyFuture<'a>
        + Send
        + Sync,
{
    fn check<'a>(
        &'a self,
        req: &'a mut RequestView,
        res: &'a mut ResponseView,
        meta: &'a mut Meta,
    ) -> PolicyFuture<'a> {
        (self.f)(req, res, meta)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A policy backed by a synchronous closure.
pub struct SyncFnPolicy<F> {
    name: String,
    f: F,
}

impl<F> SyncFnPolicy<F>
where
    F: Fn(&mut RequestView, &mut ResponseView, &mut Meta) -> Result<(), BoxError> + Send + Sync,
{
    /// Wrap a closure as an anonymous policy.
    pub fn new(f: F) -> Self {
        Self {
            name: "anonymous".to_string(),
            f,
        }
    }

    /// Give this policy a name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<F> Policy for SyncFnPolicy<F>
where
    F: Fn(&mut RequestView, &mut ResponseView, &mut Meta) -> Result<(), BoxError> + Send + Sync,
{
    fn check<'a>(
        &'a self,
        req: &'a mut RequestView,
        res: &'a mut ResponseView,
        meta: &'a mut Meta,
    ) -> PolicyFuture<'a> {
        let result = (self.f)(req, res, meta);
        Box::pin(futures::future::ready(result))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A boolean authorization expression.
///
/// Expressions are built once at configuration time and never mutated.
/// Cloning is cheap: policies are shared behind `Arc`.
#[derive(Clone)]
pub enum Expression {
    /// Always satisfied (`true`) or always denied (`false`).
    Literal(bool),

    /// A single policy check.
    Policy(Arc<dyn Policy>),

    /// Satisfied when every operand is satisfied, evaluated in order.
    And(Vec<Expression>),

    /// Satisfied when any operand is satisfied, evaluated in order.
    Or(Vec<Expression>),

    /// Satisfied when the operand is not.
    Not(Box<Expression>),
}

impl Expression {
    /// An expression that always passes.
    pub fn allow() -> Self {
        Self::Literal(true)
    }

    /// An expression that always denies with the generic forbidden error.
    pub fn deny() -> Self {
        Self::Literal(false)
    }

    /// Wrap a policy.
    pub fn policy(policy: impl Policy + 'static) -> Self {
        Self::Policy(Arc::new(policy))
    }

    /// Wrap an asynchronous closure. See [`FnPolicy`].
    pub fn from_fn<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestView, &'a mut ResponseView, &'a mut Meta) -> PolicyFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        Self::policy(FnPolicy::new(f))
    }

    /// Wrap a synchronous closure. See [`SyncFnPolicy`].
    pub fn from_sync_fn<F>(f: F) -> Self
    where
        F: Fn(&mut RequestView, &mut ResponseView, &mut Meta) -> Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self::policy(SyncFnPolicy::new(f))
    }

    /// Conjunction of the given operands.
    pub fn and(operands: impl IntoIterator<Item = Expression>) -> Self {
        Self::And(operands.into_iter().collect())
    }

    /// Disjunction of the given operands.
    pub fn or(operands: impl IntoIterator<Item = Expression>) -> Self {
        Self::Or(operands.into_iter().collect())
    }

    /// Negation of the given operand.
    pub fn not(operand: Expression) -> Self {
        Self::Not(Box::new(operand))
    }
}

impl Default for Expression {
    fn default() -> Self {
        Self::allow()
    }
}

impl From<bool> for Expression {
    fn from(value: bool) -> Self {
        Self::Literal(value)
    }
}

impl From<Arc<dyn Policy>> for Expression {
    fn from(policy: Arc<dyn Policy>) -> Self {
        Self::Policy(policy)
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{}", value),
            Self::Policy(policy) => write!(f, "Policy({})", policy.name()),
            Self::And(operands) => f.debug_tuple("And").field(operands).finish(),
            Self::Or(operands) => f.debug_tuple("Or").field(operands).finish(),
            Self::Not(operand) => f.debug_tuple("Not").field(operand).finish(),
        }
    }
}
