use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use vp_core::processor::Operator;

/// Reclaim TTL-expired state of `operator` every `interval` until cancelled.
///
/// Reads already treat expired entries as absent; the sweep only frees them.
/// `swept` is notified whenever a sweep removed anything.
#[tracing::instrument(name = "sweeper", skip_all)]
pub async fn run_sweeper(
    operator: Arc<dyn Operator>,
    metrics: Arc<crate::metrics::EngineMetrics>,
    interval: Duration,
    swept: Arc<Notify>,
    cancel: CancellationToken,
) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = tick.tick() => {
                match operator.state_store().sweep().await {
                    Ok(0) => {}
                    Ok(n) => {
                        metrics.add_swept(n);
                        vp_debug!(state, swept = n, "expired state swept");
                        swept.notify_one();
                    }
                    Err(e) => vp_warn!(state, error = %e, "state sweep failed"),
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use vp_core::clock::ManualClock;
    use vp_core::function::RunningCountFunction;
    use vp_core::partition::PartitionKey;
    use vp_core::processor::PtfOperator;
    use vp_core::row::{Element, Row, RowSchema, Value};
    use vp_core::state::MemoryBackend;

    use super::*;
    use crate::metrics::EngineMetrics;

    #[tokio::test(start_paused = true)]
    async fn sweeps_expired_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let input = RowSchema::parse_decl("region:str").unwrap();
        let operator: Arc<dyn Operator> = Arc::new(
            PtfOperator::new(
                Arc::new(RunningCountFunction::with_ttl(input, "1s").unwrap()),
                "input",
                &["region"],
                Arc::new(MemoryBackend::new()),
                clock.clone(),
            )
            .unwrap(),
        );
        let key = PartitionKey::from("east");
        let mut p = operator.create_processor(key.clone());
        p.on_element(Element::new(0, Row::single(Some(Value::Str("east".into())))))
            .await
            .unwrap();
        clock.advance(5_000);

        let metrics = Arc::new(EngineMetrics::new());
        let cancel = CancellationToken::new();
        let swept = Arc::new(Notify::new());
        let task = tokio::spawn(run_sweeper(
            Arc::clone(&operator),
            Arc::clone(&metrics),
            Duration::from_secs(1),
            Arc::clone(&swept),
            cancel.clone(),
        ));
        swept.notified().await;
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(metrics.snapshot().swept, 1);
        assert!(!operator.state_store().has_entries(&key).await.unwrap());
    }
}
