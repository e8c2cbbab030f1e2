//! Periodic background passes over pending work: aging and expiry.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::core::executor::panic_message;
use crate::core::scheduler::SchedulerInner;
use crate::core::task::{QueuedTask, TaskId};

impl<T: Send + 'static> SchedulerInner<T> {
    /// Spawn the aging and expiry timers. Both stop on dispose or when the
    /// scheduler is dropped.
    pub(crate) fn start_sweeps(self: &Arc<Self>) {
        self.spawn_periodic("aging", self.priority_check_interval, |inner| {
            inner.run_aging_sweep();
        });
        self.spawn_periodic("expiry", self.cleanup_interval, |inner| {
            inner.run_expiry_sweep();
        });
    }

    fn spawn_periodic<F>(self: &Arc<Self>, name: &'static str, period: Duration, sweep: F)
    where
        F: Fn(&Arc<Self>) + Send + 'static,
    {
        let weak = Arc::downgrade(self);
        let mut shutdown = self.shutdown_tx.subscribe();
        self.spawner.spawn(Box::pin(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }
                if *shutdown.borrow() {
                    break;
                }
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                sweep(&inner);
            }
            tracing::debug!(sweep = name, "periodic sweep stopped");
        }));
    }

    /// Recompute effective priorities and move tasks whose tier changed.
    ///
    /// Every heap is rebuilt with fresh keys, so ordering inside a tier also
    /// reflects the elapsed decay. New keys are computed before any heap is
    /// touched; if the decay curve panics the pass is abandoned and every
    /// pending task stays where it was.
    pub(crate) fn run_aging_sweep(self: &Arc<Self>) -> usize {
        let now = self.clock.now_ms();
        let migrated = {
            let mut state = self.state.lock();
            if state.disposed {
                return 0;
            }

            let planned = catch_unwind(AssertUnwindSafe(|| {
                let mut plan: HashMap<TaskId, (usize, f64)> = HashMap::new();
                for tier in &state.tiers {
                    for (task, _) in tier.heap.iter() {
                        let effective = self.decay.effective_priority(
                            task.base_priority,
                            task.submitted_at_ms,
                            now,
                        );
                        plan.insert(task.id, (self.table.tier_for(effective), effective));
                    }
                }
                plan
            }));
            let plan = match planned {
                Ok(plan) => plan,
                Err(panic) => {
                    tracing::error!(
                        panic = panic_message(panic.as_ref()),
                        "decay curve panicked; aging sweep skipped"
                    );
                    return 0;
                }
            };

            let mut requeue: Vec<(usize, f64, QueuedTask<T>)> = Vec::with_capacity(plan.len());
            let mut migrated = 0;
            for (index, tier) in state.tiers.iter_mut().enumerate() {
                for task in tier.heap.drain() {
                    let (target, effective) = plan
                        .get(&task.id)
                        .copied()
                        .unwrap_or((index, task.base_priority));
                    if target != index {
                        migrated += 1;
                        tracing::debug!(
                            task_id = task.id,
                            from = index,
                            to = target,
                            effective,
                            "task migrated between tiers"
                        );
                    }
                    requeue.push((target, effective, task));
                }
            }
            for (target, effective, task) in requeue {
                state.tiers[target].heap.push(task, effective);
            }
            migrated
        };

        if migrated > 0 {
            tracing::info!(migrated, "aging sweep promoted pending tasks");
            self.dispatch();
        }
        migrated
    }

    /// Cancel pending tasks that have waited at least the configured TTL.
    pub(crate) fn run_expiry_sweep(self: &Arc<Self>) -> usize {
        let now = self.clock.now_ms();
        let ttl = self.task_ttl_ms;
        let expired: Vec<QueuedTask<T>> = {
            let mut state = self.state.lock();
            if state.disposed {
                return 0;
            }
            state
                .tiers
                .iter_mut()
                .flat_map(|tier| {
                    tier.heap
                        .extract_if(move |task| now.saturating_sub(task.submitted_at_ms) >= ttl)
                })
                .collect()
        };

        let count = expired.len();
        if count > 0 {
            tracing::warn!(expired = count, ttl_ms = ttl, "expired pending tasks");
            self.finish_cancelled(expired);
            // Fewer pending tasks can change the remaining tiers' quotas.
            self.dispatch();
        }
        count
    }
}
