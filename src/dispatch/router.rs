//! Batch and single-key dispatch

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::registry::{Handler, HandlerRegistry};
use crate::cooldown::{Clock, CooldownGate, SystemClock};
use crate::types::UpdateBatch;

/// Invokes registered handlers for incoming batches
pub struct DispatchRouter {
    registry: HandlerRegistry,
    gate: Arc<CooldownGate>,
    clock: Arc<dyn Clock>,
}

impl DispatchRouter {
    /// Router with its own gate (throttling disabled) and the system clock
    pub fn new(registry: HandlerRegistry) -> Self {
        Self::with_parts(registry, Arc::new(CooldownGate::new()), Arc::new(SystemClock))
    }

    /// Router over an injected gate and clock.
    ///
    /// Routers sharing one gate share their cooldown state.
    pub fn with_parts(
        registry: HandlerRegistry,
        gate: Arc<CooldownGate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            gate,
            clock,
        }
    }

    /// Set the cooldown window; zero disables throttling
    pub fn set_reload_cooldown(&self, window: Duration) {
        self.gate.set_window(window);
    }

    pub fn gate(&self) -> &Arc<CooldownGate> {
        &self.gate
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Dispatch every registered key present in `batch`.
    ///
    /// Handlers run in registration order, whatever order the batch arrived
    /// in. Returns how many handlers ran.
    pub fn apply_batch(&mut self, batch: &UpdateBatch, forced: bool) -> usize {
        self.apply_batch_with(batch, |_| forced)
    }

    /// Like [`apply_batch`](Self::apply_batch), deciding `forced` per key.
    ///
    /// `forced` is asked once for each registered key present in the batch,
    /// in registration order.
    pub fn apply_batch_with<F>(&mut self, batch: &UpdateBatch, mut forced: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let mut applied = 0;
        for (key, handler) in self.registry.iter_mut() {
            let Some(payload) = batch.get(key) else {
                continue;
            };
            let forced = forced(key);
            if dispatch(&self.gate, self.clock.as_ref(), key, handler, payload, forced) {
                applied += 1;
            }
        }

        let ignored = batch.keys().filter(|k| !self.registry.contains(k)).count();
        if ignored > 0 {
            tracing::debug!(ignored, "Batch carried keys with no handler");
        }
        applied
    }

    /// Dispatch a single key. Returns whether the handler ran.
    pub fn apply_single(&mut self, key: &str, payload: &Value, forced: bool) -> bool {
        let Some(handler) = self.registry.handler_mut(key) else {
            tracing::debug!(key, "No handler registered");
            return false;
        };
        dispatch(&self.gate, self.clock.as_ref(), key, handler, payload, forced)
    }
}

impl std::fmt::Debug for DispatchRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchRouter")
            .field("registry", &self.registry)
            .field("gate", &self.gate)
            .finish()
    }
}

fn dispatch(
    gate: &CooldownGate,
    clock: &dyn Clock,
    key: &str,
    handler: &mut Handler,
    payload: &Value,
    forced: bool,
) -> bool {
    let now = clock.now();
    if !gate.should_apply(key, now, forced) {
        tracing::trace!(key, "Dispatch suppressed by cooldown");
        return false;
    }

    // A failing handler must not keep later keys from running
    if panic::catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
        tracing::error!(key, "Update handler panicked");
    }
    gate.record_applied(key, now);
    true
}
