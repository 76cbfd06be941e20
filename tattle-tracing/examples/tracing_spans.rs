//! Span chains and log telemetry on tattle items.
//!
//! This example routes `tracing` events into the telemetry buffer and
//! attaches the active span chain to every item. A transport that prints what
//! it receives stands in for a real delivery backend.
//!
//! If you currently use `tracing_subscriber::fmt::init()`, this shows how to
//! expand that setup to add `TattleLayer`.

use std::sync::Arc;

use serde_json::json;
use tattle::{Item, Method, Transport, args};
use tattle_tracing::{SpanTransform, TattleLayer};
use tracing::instrument;
use tracing_subscriber::{Registry, layer::SubscriberExt};

#[derive(Debug, thiserror::Error)]
#[error("permission denied")]
struct PermissionError;

struct PrintTransport;

impl Transport for PrintTransport {
    fn send(&self, method: Method, item: Item) {
        println!("[{method}] {}", item.message.as_deref().unwrap_or_default());
        println!("  spans: {}", item.custom.get("span").cloned().unwrap_or_default());
        for event in &item.telemetry {
            println!("  telemetry: {} {}", event.level, json!(event.body));
        }
    }
}

#[instrument]
fn check_user_permission(user_id: u64, role: &str) {
    tracing::info!("looking up permissions");
    tattle::error(args![
        PermissionError,
        format!("{role} check failed"),
        json!({"user": user_id}),
    ]);
}

#[instrument]
fn handle_api_request(request_id: &str, endpoint: &str) {
    tracing::debug!(%endpoint, "routing request");
    check_user_permission(12345, "admin");
}

fn main() {
    // Set up tracing subscriber with TattleLayer
    // This replaces `tracing_subscriber::fmt::init()` to feed tattle
    let subscriber = Registry::default()
        .with(TattleLayer::new())
        .with(tracing_subscriber::fmt::layer());

    tracing::subscriber::set_global_default(subscriber).expect("failed to set default subscriber");

    let notifier = tattle::init(json!({}), Some(Arc::new(PrintTransport)));
    notifier.add_transform(SpanTransform::new());

    handle_api_request("req-abc-123", "/api/admin/users");

    println!();
    println!("The item lists the active spans from innermost to outermost,");
    println!("followed by the log lines recorded before it was sent.");
}
