//! Expression evaluation.
//!
//! Evaluation walks an [`Expression`] tree in order, awaiting each policy
//! before moving on. `and` stops at the first denial and `or` at the first
//! success, so operands after the deciding one never run.
//!
//! Every operand yields an [`Outcome`]. A denial remembers the error that
//! explains it:
//!
//! * a literal `false` remembers the generic forbidden error;
//! * a failing policy remembers its own error, which may be absent;
//! * `and` remembers the error of the first operand that failed;
//! * `or` remembers the error of the last operand it evaluated;
//! * `not` swallows the inner error. A satisfied operand turns into a
//!   denial with the generic forbidden error, and a denied operand turns
//!   into a success with nothing remembered.

use crate::model::{Expression, PolicyTable};
use autonym_core::{AutonymError, BoxError, Meta, RequestView, ResponseView, Stage};
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, trace};

/// Result of evaluating an expression.
#[derive(Debug)]
pub enum Outcome {
    /// The expression passed.
    Satisfied,

    /// The expression denied, with the error that explains why, if any.
    Unsatisfied(Option<BoxError>),
}

impl Outcome {
    /// A denial carrying the generic forbidden error.
    pub fn forbidden() -> Self {
        Self::Unsatisfied(Some(Box::new(AutonymError::forbidden())))
    }

    /// Check if the expression passed.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }

    /// Convert into a result, normalizing the remembered error.
    ///
    /// A denial without a remembered error becomes the generic forbidden
    /// error.
    pub fn into_result(self) -> Result<(), AutonymError> {
        match self {
            Self::Satisfied => Ok(()),
            Self::Unsatisfied(Some(err)) => Err(AutonymError::from_error(err)),
            Self::Unsatisfied(None) => Err(AutonymError::forbidden()),
        }
    }
}

/// Evaluate an expression against the live views and shared context.
///
/// This never fails by itself; a denial is reported through the returned
/// [`Outcome`].
pub fn evaluate<'a>(
    expression: &'a Expression,
    req: &'a mut RequestView,
    res: &'a mut ResponseView,
    meta: &'a mut Meta,
) -> BoxFuture<'a, Outcome> {
    async move {
        match expression {
            Expression::Literal(true) => Outcome::Satisfied,
            Expression::Literal(false) => Outcome::forbidden(),
            Expression::Policy(policy) => match policy.check(req, res, meta).await {
                Ok(()) => {
                    trace!("Policy {} passed", policy.name());
                    Outcome::Satisfied
                }
                Err(err) => {
                    debug!("Policy {} denied: {}", policy.name(), err);
                    Outcome::Unsatisfied(Some(err))
                }
            },
            Expression::And(operands) => {
                for operand in operands {
                    let outcome = evaluate(operand, req, res, meta).await;
                    if !outcome.is_satisfied() {
                        return outcome;
                    }
                }
                Outcome::Satisfied
            }
            Expression::Or(operands) => {
                let mut last = Outcome::forbidden();
                for operand in operands {
                    let outcome = evaluate(operand, req, res, meta).await;
                    if outcome.is_satisfied() {
                        return outcome;
                    }
                    last = outcome;
                }
                last
            }
            Expression::Not(operand) => match evaluate(operand, req, res, meta).await {
                Outcome::Satisfied => Outcome::forbidden(),
                Outcome::Unsatisfied(_) => Outcome::Satisfied,
            },
        }
    }
    .boxed()
}

/// Evaluate an expression and fail with the remembered error on denial.
///
/// # Errors
///
/// Returns the normalized remembered error, or the generic forbidden error
/// when the denial carries none.
pub async fn enforce(
    expression: &Expression,
    req: &mut RequestView,
    res: &mut ResponseView,
    meta: &mut Meta,
) -> Result<(), AutonymError> {
    evaluate(expression, req, res, meta).await.into_result()
}

/// Policy evaluation engine.
///
/// Looks up the expression configured for a stage and the request's method
/// and enforces it.
#[derive(Debug, Clone, Copy)]
pub struct PolicyEvaluator<'t> {
    /// The policy table.
    table: &'t PolicyTable,
}

impl<'t> PolicyEvaluator<'t> {
    /// Create a new policy evaluator.
    ///
    /// # Arguments
    ///
    /// * `table` - The policy table of the resource being called.
    pub fn new(table: &'t PolicyTable) -> Self {
        Self { table }
    }

    /// Enforce the expression configured for a stage.
    ///
    /// # Arguments
    ///
    /// * `stage` - The stage being entered.
    /// * `req` - The request in flight. Its method selects the expression.
    /// * `res` - The response.
    /// * `meta` - The shared context of this call.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The stage may proceed.
    /// * `Err` - The normalized denial.
    pub async fn authorize(
        &self,
        stage: Stage,
        req: &mut RequestView,
        res: &mut ResponseView,
        meta: &mut Meta,
    ) -> Result<(), AutonymError> {
        let expression = self.table.get(stage, req.method());
        trace!("Authorizing {} {}: {:?}", stage, req.method(), expression);
        enforce(expression, req, res, meta).await
    }
}
