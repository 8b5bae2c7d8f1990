#[cfg(test)]
mod observability_tests {
    use crate::observability::{self, REQUESTS_TOTAL, REQUEST_FAILURES_TOTAL, REQUEST_LATENCY_MS};
    use std::time::Duration;
    use tracing::info;

    #[test]
    fn test_metric_names_are_namespaced() {
        for name in [REQUEST_LATENCY_MS, REQUESTS_TOTAL, REQUEST_FAILURES_TOTAL] {
            assert!(name.starts_with("kclassify_"));
        }
    }

    #[test]
    fn test_record_request_without_recorder() {
        // No recorder is installed, so the facade discards these
        observability::record_request("resnet", Duration::from_millis(12), true);
        observability::record_request("resnet", Duration::from_millis(40), false);
    }

    #[test]
    fn test_tracing_setup() {
        // Only the first install in the test binary succeeds
        let first = observability::init_tracing(false);
        let second = observability::init_tracing(true);
        assert!(!(first && second));
        info!("Tracing initialized for test");
    }

    #[tokio::test]
    async fn test_record_request_from_async_context() {
        observability::record_request("densenet", Duration::from_micros(850), true);
    }
}
