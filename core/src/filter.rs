//! Correlation tracing filter.
//!
//! The filter intercepts every inbound envelope before it reaches the
//! matching consumer. It derives the delivery attempt's [`TraceContext`]
//! from the envelope's correlation identity, opens a consumer-kind span
//! carrying the messaging tags, and runs the downstream consumer inside
//! that span.
//!
//! # Guarantees
//!
//! - Exactly one span is opened and exactly one is closed per delivery
//!   attempt. Closure is tied to dropping the span handle, so it holds on
//!   every exit path: normal return, propagated failure, and cancellation
//!   (the instrumented future being dropped drops the span with it). A
//!   cancelled attempt records a cancellation status on its span before
//!   the span closes.
//! - The filter never swallows or reinterprets a downstream failure. It
//!   records the failure status on the span and re-propagates the error
//!   unchanged.
//! - Trace derivation is total (see [`crate::trace`]); there is no filter
//!   failure mode that could drop a message before the consumer runs.

use crate::consumer::ConsumeReport;
use crate::envelope::Envelope;
use crate::error::ConsumeError;
use crate::message::Message;
use crate::trace::TraceContext;
use std::future::Future;
use tracing::{Instrument, field};

/// Intercepts envelopes and wraps consumer execution in an observable span.
///
/// One filter value serves every message type; `intercept` is generic over
/// the payload. The filter is stateless and holds no locks, so a single
/// instance is safely shared across concurrent deliveries.
#[derive(Clone, Copy, Debug, Default)]
pub struct CorrelationTracingFilter;

/// Marks the consume span as cancelled if the attempt is dropped before it
/// resolves.
///
/// Declared before the awaited consumer future, so on cancellation it
/// drops after the instrumented future but while its own span handle still
/// keeps the span alive; the recorded status lands before the span closes.
struct CancellationMark {
    span: tracing::Span,
    armed: bool,
}

impl CancellationMark {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancellationMark {
    fn drop(&mut self) {
        if self.armed {
            self.span.record("otel.status_code", "CANCELLED");
        }
    }
}

impl CorrelationTracingFilter {
    /// Create a filter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Run `next` inside a span correlated to the envelope's identity.
    ///
    /// Resolves the trace anchor (`correlation_id ?? message_id`), derives
    /// the deterministic trace id and a fresh span id, opens the span, and
    /// invokes the downstream consumer with the derived context as an
    /// explicit parameter.
    ///
    /// # Errors
    ///
    /// Propagates the downstream [`ConsumeError`] unchanged, after
    /// recording failure status on the span.
    pub async fn intercept<M, F, Fut>(
        &self,
        envelope: &Envelope<M>,
        next: F,
    ) -> Result<ConsumeReport, ConsumeError>
    where
        M: Message,
        F: FnOnce(TraceContext) -> Fut,
        Fut: Future<Output = Result<ConsumeReport, ConsumeError>>,
    {
        let context = TraceContext::derive(envelope.correlation_id, Some(envelope.message_id));

        let span = tracing::info_span!(
            "consume",
            otel.kind = "consumer",
            messaging.system = "kafka",
            messaging.message_type = M::message_type(),
            messaging.message_id = %envelope.message_id,
            messaging.correlation_id = field::Empty,
            messaging.conversation_id = field::Empty,
            trace_id = %context.trace_id,
            span_id = %context.span_id,
            otel.status_code = field::Empty,
            error.message = field::Empty,
        );

        // Raw identifiers are recorded only when present; absent ones stay
        // unset rather than carrying placeholder values.
        if let Some(correlation_id) = envelope.correlation_id {
            span.record("messaging.correlation_id", field::display(correlation_id));
        }
        if let Some(conversation_id) = envelope.conversation_id {
            span.record("messaging.conversation_id", field::display(conversation_id));
        }

        let mut cancellation = CancellationMark {
            span: span.clone(),
            armed: true,
        };
        let result = next(context).instrument(span.clone()).await;
        cancellation.disarm();

        if let Err(error) = &result {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", field::display(error));
        }

        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::consumer::{ConsumeReport, Stage, StageReporter};
    use crate::envelope::CorrelationId;
    use crate::trace::TraceId;
    use serde::{Deserialize, Serialize};
    use std::sync::{Arc, Mutex};
    use tracing::Subscriber;
    use tracing_subscriber::{Layer, layer::SubscriberExt, registry::LookupSpan};

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Probe {
        value: u32,
    }

    impl Message for Probe {
        fn message_type() -> &'static str {
            "Probe"
        }
    }

    /// Counts span opens and closes, and captures late-recorded fields, so
    /// tests can assert the closure invariant and the recorded statuses
    /// without a tracing backend.
    #[derive(Clone, Default)]
    struct SpanCounter {
        opened: Arc<Mutex<usize>>,
        closed: Arc<Mutex<usize>>,
        recorded: Arc<Mutex<Vec<String>>>,
    }

    impl SpanCounter {
        fn counts(&self) -> (usize, usize) {
            (
                *self.opened.lock().unwrap(),
                *self.closed.lock().unwrap(),
            )
        }

        fn recorded(&self) -> Vec<String> {
            self.recorded.lock().unwrap().clone()
        }
    }

    struct FieldCollector<'a>(&'a mut Vec<String>);

    impl tracing::field::Visit for FieldCollector<'_> {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.0.push(format!("{}={value:?}", field.name()));
        }
    }

    impl<S: Subscriber + for<'a> LookupSpan<'a>> Layer<S> for SpanCounter {
        fn on_new_span(
            &self,
            _attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            *self.opened.lock().unwrap() += 1;
        }

        fn on_record(
            &self,
            _id: &tracing::span::Id,
            values: &tracing::span::Record<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut fields = self.recorded.lock().unwrap();
            values.record(&mut FieldCollector(&mut fields));
        }

        fn on_close(
            &self,
            _id: tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            *self.closed.lock().unwrap() += 1;
        }
    }

    fn probe_envelope() -> Envelope<Probe> {
        Envelope::new(Probe { value: 7 })
    }

    #[tokio::test]
    async fn passes_derived_context_to_the_consumer() {
        let correlation = CorrelationId::generate();
        let envelope = probe_envelope().with_correlation_id(correlation);
        let filter = CorrelationTracingFilter::new();

        let seen = Arc::new(Mutex::new(None));
        let seen_inner = Arc::clone(&seen);

        filter
            .intercept(&envelope, |context| {
                let seen = Arc::clone(&seen_inner);
                async move {
                    *seen.lock().unwrap() = Some(context);
                    Ok(ConsumeReport::default())
                }
            })
            .await
            .unwrap();

        let context = seen.lock().unwrap().expect("consumer saw a context");
        assert_eq!(
            context.trace_id,
            TraceId::from_anchor(correlation.as_uuid())
        );
        assert!(context.sampled);
    }

    #[tokio::test]
    async fn opens_and_closes_exactly_one_span_on_success() {
        let counter = SpanCounter::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let filter = CorrelationTracingFilter::new();
        filter
            .intercept(&probe_envelope(), |_context| async {
                Ok(ConsumeReport::default())
            })
            .await
            .unwrap();

        assert_eq!(counter.counts(), (1, 1));
    }

    #[tokio::test]
    async fn closes_the_span_when_the_consumer_fails() {
        let counter = SpanCounter::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let filter = CorrelationTracingFilter::new();
        let result = filter
            .intercept(&probe_envelope(), |_context| async {
                Err(ConsumeError::Downstream("injected fault".to_string()))
            })
            .await;

        assert!(matches!(
            result,
            Err(ConsumeError::Downstream(reason)) if reason == "injected fault"
        ));
        assert_eq!(counter.counts(), (1, 1));
    }

    #[tokio::test]
    async fn a_dropped_attempt_closes_its_span_with_cancellation_status() {
        let counter = SpanCounter::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let filter = CorrelationTracingFilter::new();
        let envelope = probe_envelope();
        {
            let fut = filter.intercept(&envelope, |_context| async {
                // A consumer that never resolves; the attempt only ends by
                // being dropped.
                std::future::pending::<()>().await;
                Ok(ConsumeReport::default())
            });
            tokio::pin!(fut);
            assert!(futures::poll!(fut.as_mut()).is_pending());
        }

        assert_eq!(counter.counts(), (1, 1));
        assert!(
            counter
                .recorded()
                .iter()
                .any(|field| field.contains("otel.status_code") && field.contains("CANCELLED")),
            "cancelled attempt must record a cancellation status, got {:?}",
            counter.recorded()
        );
    }

    #[tokio::test]
    async fn a_completed_attempt_carries_no_cancellation_status() {
        let counter = SpanCounter::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let filter = CorrelationTracingFilter::new();
        filter
            .intercept(&probe_envelope(), |_context| async {
                Ok(ConsumeReport::default())
            })
            .await
            .unwrap();

        assert!(
            !counter
                .recorded()
                .iter()
                .any(|field| field.contains("CANCELLED"))
        );
    }

    #[tokio::test]
    async fn propagates_the_error_unchanged() {
        let filter = CorrelationTracingFilter::new();
        let result = filter
            .intercept(&probe_envelope(), |_context| async {
                Err(ConsumeError::MissingField {
                    field: "vin",
                    reason: "absent".to_string(),
                })
            })
            .await;

        match result {
            Err(ConsumeError::MissingField { field, reason }) => {
                assert_eq!(field, "vin");
                assert_eq!(reason, "absent");
            }
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retries_share_a_trace_but_not_a_span() {
        let correlation = CorrelationId::generate();
        let first = probe_envelope().with_correlation_id(correlation);
        let second = probe_envelope().with_correlation_id(correlation);
        let filter = CorrelationTracingFilter::new();

        let contexts = Arc::new(Mutex::new(Vec::new()));
        for envelope in [&first, &second] {
            let contexts_inner = Arc::clone(&contexts);
            filter
                .intercept(envelope, |context| {
                    let contexts = Arc::clone(&contexts_inner);
                    async move {
                        contexts.lock().unwrap().push(context);
                        Ok(ConsumeReport::default())
                    }
                })
                .await
                .unwrap();
        }

        let contexts = contexts.lock().unwrap();
        assert_eq!(contexts[0].trace_id, contexts[1].trace_id);
        assert_ne!(contexts[0].span_id, contexts[1].span_id);
    }

    #[tokio::test]
    async fn report_from_the_consumer_flows_through() {
        let filter = CorrelationTracingFilter::new();
        let report = filter
            .intercept(&probe_envelope(), |_context| async {
                let mut reporter = StageReporter::new("Probe", "probe-1");
                reporter.info(Stage::Receipt, "accepted");
                reporter.info(Stage::Completion, "done");
                Ok(reporter.finish())
            })
            .await
            .unwrap();

        assert_eq!(report.stages(), vec![Stage::Receipt, Stage::Completion]);
    }
}
