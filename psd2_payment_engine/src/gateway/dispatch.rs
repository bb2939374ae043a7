use std::collections::HashMap;

use futures_util::future::BoxFuture;
use log::*;

use crate::gateway::{
    errors::ProcessingError,
    idempotency::{Fingerprint, IdempotencyCache},
    objects::{CallerContext, ProcessingRequest, ProcessingResponse},
};

pub type HandlerResult = Result<ProcessingResponse, ProcessingError>;

/// The contract every operation handler satisfies: one validated request in, one response document
/// (or error) out. Handlers carry their own state; the dispatcher knows nothing about them beyond
/// this trait.
pub trait ProcessCall: Send + Sync {
    fn process<'a>(&'a self, ctx: &'a CallerContext, request: &'a ProcessingRequest) -> BoxFuture<'a, HandlerResult>;
}

/// Routes validated processing requests to the handler registered for the operation.
///
/// The dispatcher performs no business logic. Its fixed contract: the request has already passed
/// envelope validation; on success the handler's document is returned as-is; on failure the error
/// propagates untouched, to be translated exactly once by the HTTP error responder. Duplicate
/// requests are absorbed by the idempotency cache before a handler ever runs.
pub struct ProcessingApi {
    handlers: HashMap<String, Box<dyn ProcessCall>>,
    cache: IdempotencyCache,
}

impl ProcessingApi {
    pub fn new(cache: IdempotencyCache) -> Self {
        Self { handlers: HashMap::new(), cache }
    }

    /// Registers a handler for an operation identifier. Builder-style so server setup reads as a
    /// routing table.
    pub fn register<H: ProcessCall + 'static>(mut self, operation: &str, handler: H) -> Self {
        self.handlers.insert(operation.to_string(), Box::new(handler));
        self
    }

    pub async fn process(
        &self,
        ctx: &CallerContext,
        operation: &str,
        request: ProcessingRequest,
    ) -> HandlerResult {
        let handler = self
            .handlers
            .get(operation)
            .ok_or_else(|| ProcessingError::UnknownOperation(operation.to_string()))?;
        let fingerprint = Fingerprint::of(ctx, operation, &request);
        trace!("🔄️ Dispatching '{operation}' call from {} [{fingerprint}]", ctx.caller_address);
        self.cache.get_or_run(fingerprint, handler.process(ctx, &request)).await
    }

    pub fn cache(&self) -> &IdempotencyCache {
        &self.cache
    }
}
