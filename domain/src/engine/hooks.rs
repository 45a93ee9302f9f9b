//! Injectable strategies consulted by the engine.
//!
//! | Hook | Default | Consulted when |
//! |------|---------|----------------|
//! | [`ArgsNormalizer`] | [`CanonicalArgsNormalizer`] | every proposal |
//! | [`ErrorClassifier`] | [`CodeListClassifier`] | an error is reported |
//! | [`RewriteAdvisor`] | [`NoRewrite`] | a read-only call is denied |

use crate::breaker::{CodeListClassifier, ErrorClassifier};
use crate::ledger::{ArgsNormalizer, CanonicalArgsNormalizer};
use crate::policy::{PolicyConfig, ReasonCode};
use serde_json::Value;
use std::sync::Arc;

/// What the advisor knows about a denied call.
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    pub tool_name: &'a str,
    pub args: &'a Value,
    pub reason: ReasonCode,
    /// Executed calls of this tool so far in the run.
    pub executed_calls: u32,
}

/// Suggests adjusted arguments for a call that would otherwise be denied.
pub trait RewriteAdvisor: Send + Sync {
    fn suggest(&self, ctx: &RewriteContext<'_>) -> Option<Value>;
}

/// Never rewrites.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRewrite;

impl RewriteAdvisor for NoRewrite {
    fn suggest(&self, _ctx: &RewriteContext<'_>) -> Option<Value> {
        None
    }
}

#[derive(Clone)]
pub struct PolicyHooks {
    pub normalizer: Arc<dyn ArgsNormalizer>,
    pub classifier: Arc<dyn ErrorClassifier>,
    pub rewrite: Arc<dyn RewriteAdvisor>,
}

impl std::fmt::Debug for PolicyHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyHooks").finish_non_exhaustive()
    }
}

impl PolicyHooks {
    /// Default hooks configured from `policy`.
    pub fn from_policy(policy: &PolicyConfig) -> Self {
        Self {
            normalizer: Arc::new(
                CanonicalArgsNormalizer::new()
                    .with_ignored_fields(policy.idempotency_ignored_args.iter().cloned()),
            ),
            classifier: Arc::new(CodeListClassifier::new(&policy.non_qualifying_error_codes)),
            rewrite: Arc::new(NoRewrite),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn ArgsNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_rewrite_advisor(mut self, advisor: Arc<dyn RewriteAdvisor>) -> Self {
        self.rewrite = advisor;
        self
    }
}
