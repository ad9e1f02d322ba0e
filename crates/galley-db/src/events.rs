//! # Domain Event Bus
//!
//! In-process publish/subscribe for [`DomainEvent`]s.
//!
//! ## Delivery Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Unit of work ── COMMIT ──► bus.publish(event)                         │
//! │                                  │                                      │
//! │                      tokio broadcast channel                            │
//! │                      ┌───────────┼───────────┐                          │
//! │                      ▼           ▼           ▼                          │
//! │               CostRecalculator  Alerter   (tests, dashboards)          │
//! │                                                                         │
//! │  • Publishing happens after commit and never fails the caller          │
//! │  • Each handler call is bounded by `handler_timeout`                   │
//! │  • Handler errors and timeouts are logged, never retried               │
//! │  • A lagging subscriber skips the events it missed                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::DbResult;
use galley_core::DomainEvent;

/// Something that reacts to domain events.
pub trait EventHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    fn handle(&self, event: DomainEvent) -> impl Future<Output = DbResult<()>> + Send;
}

/// Broadcast bus shared by the engine services.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
    handler_timeout: Duration,
}

impl EventBus {
    pub fn new(capacity: usize, handler_timeout: Duration) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        EventBus { tx, handler_timeout }
    }

    /// Publishes an event. Best-effort: having no subscribers is not an error.
    pub fn publish(&self, event: DomainEvent) {
        if let Ok(payload) = serde_json::to_string(&event) {
            debug!(event = event.name(), %payload, "Publishing domain event");
        }

        if self.tx.send(event).is_err() {
            debug!("No event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Runs `handler` on its own task for every event published from now on.
    ///
    /// The task ends when every bus clone has been dropped.
    pub fn spawn_handler<H>(&self, handler: H) -> JoinHandle<()>
    where
        H: EventHandler + 'static,
    {
        let mut rx = self.tx.subscribe();
        let handler_timeout = self.handler_timeout;

        tokio::spawn(async move {
            info!(handler = handler.name(), "Event handler started");

            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let name = event.name();
                        match tokio::time::timeout(handler_timeout, handler.handle(event)).await {
                            Ok(Ok(())) => {
                                debug!(handler = handler.name(), event = name, "Event handled");
                            }
                            Ok(Err(e)) => {
                                error!(handler = handler.name(), event = name, error = %e, "Event handler failed");
                            }
                            Err(_) => {
                                warn!(
                                    handler = handler.name(),
                                    event = name,
                                    timeout_ms = handler_timeout.as_millis() as u64,
                                    "Event handler timed out"
                                );
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(handler = handler.name(), skipped, "Event handler lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            info!(handler = handler.name(), "Event handler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sale_event(n: usize) -> DomainEvent {
        DomainEvent::SaleRegistered {
            tenant_id: "t1".into(),
            sale_id: format!("s{}", n),
            recipe_id: "r1".into(),
            quantity: 1.0,
            total_cents: 500,
            ingredient_ids: vec![],
        }
    }

    struct Counter {
        seen: Arc<AtomicUsize>,
        fail_first: bool,
    }

    impl EventHandler for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        async fn handle(&self, _event: DomainEvent) -> DbResult<()> {
            let n = self.seen.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(DbError::Internal("boom".into()));
            }
            Ok(())
        }
    }

    struct Sleeper;

    impl EventHandler for Sleeper {
        fn name(&self) -> &'static str {
            "sleeper"
        }

        async fn handle(&self, _event: DomainEvent) -> DbResult<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(8, Duration::from_millis(100));
        bus.publish(sale_event(1));
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new(8, Duration::from_millis(100));
        let mut rx = bus.subscribe();

        bus.publish(sale_event(1));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "sale.registered");
    }

    #[tokio::test]
    async fn test_handler_failure_does_not_stop_handler() {
        let bus = EventBus::new(8, Duration::from_millis(500));
        let seen = Arc::new(AtomicUsize::new(0));
        let task = bus.spawn_handler(Counter {
            seen: seen.clone(),
            fail_first: true,
        });
        tokio::task::yield_now().await;

        bus.publish(sale_event(1));
        bus.publish(sale_event(2));
        drop(bus);

        task.await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_handler_times_out() {
        let bus = EventBus::new(8, Duration::from_millis(20));
        let task = bus.spawn_handler(Sleeper);
        tokio::task::yield_now().await;

        bus.publish(sale_event(1));
        drop(bus);

        // Finishes once the single call has been cut off by the timeout
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }
}
