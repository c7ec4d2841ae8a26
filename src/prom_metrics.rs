//! # Prometheus Metrics
//!
//! Operational metrics in the OpenMetrics text format, scraped from `/metrics`.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `ai_tutor_http_request_duration_seconds` | Histogram | `method`, `path` | Request latency by route template |
//! | `ai_tutor_admin_logins_total` | Counter | `outcome` | Admin login attempts (`success` / `failure`) |
//! | `ai_tutor_admin_mutations_total` | Counter | `entity`, `operation` | Writes through the admin gateway |
//! | `ai_tutor_admin_denied_total` | Counter | `reason` | Gated requests rejected (`session` / `capability`) |

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabel {
    pub method: String,
    pub path: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabel {
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct MutationLabel {
    pub entity: String,
    pub operation: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReasonLabel {
    pub reason: String,
}

fn latency_histogram() -> Histogram {
    // 5ms .. ~20s
    Histogram::new(exponential_buckets(0.005, 2.0, 12))
}

/// Registry plus handles to every metric. All handles are cheap clones over
/// atomics and can be updated from any task.
pub struct Metrics {
    pub registry: Registry,
    pub http_request_duration: Family<HttpLabel, Histogram, fn() -> Histogram>,
    pub admin_logins: Family<OutcomeLabel, Counter>,
    pub admin_mutations: Family<MutationLabel, Counter>,
    pub admin_denied: Family<ReasonLabel, Counter>,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_request_duration =
            Family::<HttpLabel, Histogram, fn() -> Histogram>::new_with_constructor(latency_histogram);
        registry.register(
            "ai_tutor_http_request_duration_seconds",
            "HTTP request latency by method and route template",
            http_request_duration.clone(),
        );

        let admin_logins = Family::<OutcomeLabel, Counter>::default();
        registry.register(
            "ai_tutor_admin_logins",
            "Admin login attempts by outcome",
            admin_logins.clone(),
        );

        let admin_mutations = Family::<MutationLabel, Counter>::default();
        registry.register(
            "ai_tutor_admin_mutations",
            "Writes performed through the admin gateway",
            admin_mutations.clone(),
        );

        let admin_denied = Family::<ReasonLabel, Counter>::default();
        registry.register(
            "ai_tutor_admin_denied",
            "Gated admin requests rejected by reason",
            admin_denied.clone(),
        );

        Self {
            registry,
            http_request_duration,
            admin_logins,
            admin_mutations,
            admin_denied,
        }
    }

    pub fn record_login(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.admin_logins
            .get_or_create(&OutcomeLabel {
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn record_mutation(&self, entity: &str, operation: &str, count: u64) {
        self.admin_mutations
            .get_or_create(&MutationLabel {
                entity: entity.to_string(),
                operation: operation.to_string(),
            })
            .inc_by(count);
    }

    pub fn record_denied(&self, reason: &str) {
        self.admin_denied
            .get_or_create(&ReasonLabel {
                reason: reason.to_string(),
            })
            .inc();
    }

    /// Render all metrics in the text exposition format.
    pub fn encode(&self) -> String {
        let mut buf = String::new();
        if let Err(e) = encode(&mut buf, &self.registry) {
            tracing::error!(error = %e, "failed to encode metrics");
        }
        buf
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_registered_families() {
        let m = Metrics::new();
        m.record_login(true);
        m.record_login(false);
        m.record_mutation("students", "create", 1);
        m.http_request_duration
            .get_or_create(&HttpLabel {
                method: "GET".into(),
                path: "/admin/api/{entity}/{id}".into(),
            })
            .observe(0.012);

        let output = m.encode();
        assert!(output.contains("ai_tutor_admin_logins_total"));
        assert!(output.contains("outcome=\"failure\""));
        assert!(output.contains("ai_tutor_admin_mutations_total"));
        assert!(output.contains("entity=\"students\""));
        assert!(output.contains("ai_tutor_http_request_duration_seconds_bucket"));
        assert!(output.contains("/admin/api/{entity}/{id}"));
    }

    #[test]
    fn counters_are_independent_per_label() {
        let m = Metrics::new();
        m.record_mutation("programs", "delete", 3);
        m.record_mutation("programs", "bulk_delete", 7);
        let deletes = m
            .admin_mutations
            .get_or_create(&MutationLabel {
                entity: "programs".into(),
                operation: "delete".into(),
            })
            .get();
        assert_eq!(deletes, 3);
    }
}
