//! Tracing, trace-context propagation and the Prometheus recorder.
//!
//! Everything is driven by [`ControlPlaneConfig`]: the log filter, the
//! optional OTLP collector endpoint and the instance id reported on spans.
//! The federation counters (identities, tokens, credentials, trust
//! rejections, evaluations, access denials, stack applies) are rendered by
//! the handle returned from [`init_observability`].
//!
//! Initialization runs once per process; later calls only return the
//! recorder handle.
use crate::config::ControlPlaneConfig;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::propagation::Extractor;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const SERVICE_NAME: &str = "guestflag-controlplane";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static TRACING_INIT: OnceLock<()> = OnceLock::new();
static PROPAGATOR_INIT: OnceLock<()> = OnceLock::new();

pub fn init_observability(config: &ControlPlaneConfig) -> PrometheusHandle {
    TRACING_INIT.get_or_init(|| {
        install_propagator();
        let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer());
        match config.otlp_endpoint.as_deref().map(|endpoint| tracer_provider(endpoint, config)) {
            Some(Ok(provider)) => {
                let tracer = provider.tracer(SERVICE_NAME);
                let _ = registry
                    .with(tracing_opentelemetry::layer().with_tracer(tracer))
                    .try_init();
            }
            Some(Err(err)) => {
                let _ = registry.try_init();
                tracing::warn!(error = %err, "otlp exporter unavailable, spans stay local");
            }
            None => {
                let _ = registry.try_init();
            }
        }
    });
    install_metrics_recorder()
}

fn tracer_provider(
    endpoint: &str,
    config: &ControlPlaneConfig,
) -> Result<SdkTracerProvider, opentelemetry::trace::TraceError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let resource = Resource::builder_empty()
        .with_attributes(resource_attributes(config))
        .build();
    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

fn resource_attributes(config: &ControlPlaneConfig) -> Vec<KeyValue> {
    let mut attrs = vec![
        KeyValue::new("service.name", SERVICE_NAME),
        KeyValue::new("cloud.region", config.region.to_string()),
        KeyValue::new("cloud.account.id", config.account_id.to_string()),
    ];
    if let Some(instance) = &config.instance_id {
        attrs.push(KeyValue::new("service.instance.id", instance.clone()));
    }
    attrs
}

fn install_propagator() {
    PROPAGATOR_INIT.get_or_init(|| {
        global::set_text_map_propagator(TraceContextPropagator::new());
    });
}

/// W3C trace context carried by an incoming request, if any.
pub fn trace_context_from_headers(headers: &axum::http::HeaderMap) -> opentelemetry::Context {
    install_propagator();
    global::get_text_map_propagator(|prop| prop.extract(&HeaderMapExtractor(headers)))
}

struct HeaderMapExtractor<'a>(&'a axum::http::HeaderMap);

impl Extractor for HeaderMapExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

pub async fn serve_metrics(handle: PrometheusHandle, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics listening");
    serve_metrics_on(handle, listener, std::future::pending()).await
}

async fn serve_metrics_on<F>(
    handle: PrometheusHandle,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = axum::Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    );
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}

fn install_metrics_recorder() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if let Err(err) = metrics::set_global_recorder(recorder) {
                tracing::warn!(error = %err, "metrics recorder already installed");
            }
            handle
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{TraceContextExt, TraceId};
    use serial_test::serial;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::oneshot;

    const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    fn attributes(config: &ControlPlaneConfig) -> HashMap<String, String> {
        resource_attributes(config)
            .into_iter()
            .map(|attr| (attr.key.as_str().to_string(), attr.value.to_string()))
            .collect()
    }

    #[test]
    fn resource_attributes_come_from_config() {
        let config = ControlPlaneConfig {
            instance_id: Some("cp-1".to_string()),
            ..ControlPlaneConfig::default()
        };
        let found = attributes(&config);
        assert_eq!(found["service.name"], SERVICE_NAME);
        assert_eq!(found["cloud.region"], "local-1");
        assert_eq!(found["cloud.account.id"], "000000000000");
        assert_eq!(found["service.instance.id"], "cp-1");

        let found = attributes(&ControlPlaneConfig::default());
        assert!(!found.contains_key("service.instance.id"));
    }

    #[test]
    fn header_extractor_skips_non_utf8_values() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("traceparent", TRACEPARENT.parse().expect("header"));
        headers.insert(
            "tracestate",
            axum::http::HeaderValue::from_bytes(b"\xFF").expect("header"),
        );
        let extractor = HeaderMapExtractor(&headers);
        assert_eq!(extractor.get("traceparent"), Some(TRACEPARENT));
        assert!(extractor.get("tracestate").is_none());
        assert_eq!(extractor.keys().len(), 2);
    }

    #[test]
    fn trace_context_is_parented_on_traceparent() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("traceparent", TRACEPARENT.parse().expect("header"));
        let context = trace_context_from_headers(&headers);
        let span = context.span();
        let span_ctx = span.span_context();
        assert!(span_ctx.is_valid());
        assert_eq!(
            span_ctx.trace_id(),
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").expect("trace id")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn federation_counters_are_served_on_metrics() {
        let handle = init_observability(&ControlPlaneConfig::default());
        let again = init_observability(&ControlPlaneConfig::default());
        metrics::counter!("guestflag_trust_rejections_total").increment(1);
        metrics::counter!("guestflag_evaluations_total", "variation" => "FeatureEnabled")
            .increment(1);
        assert!(again.render().contains("guestflag_trust_rejections_total"));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_metrics_on(handle, listener, async move {
            let _ = shutdown_rx.await;
        }));

        let body = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .no_proxy()
            .build()
            .expect("client")
            .get(format!("http://{addr}/metrics"))
            .send()
            .await
            .expect("scrape")
            .error_for_status()
            .expect("status")
            .text()
            .await
            .expect("body");
        assert!(body.contains("variation=\"FeatureEnabled\""));

        let _ = shutdown_tx.send(());
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("shutdown")
            .expect("join")
            .expect("serve");
    }
}
