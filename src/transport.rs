//! The hand-off point to delivery.
//!
//! A [`Transport`] receives every item that made it through the pipeline,
//! together with the [`Method`] it was sent through. Delivery, queuing and
//! retries are entirely the transport's business; it reports the outcome by
//! invoking the item's callback, if any.

use serde_json::{Map, Value};

use crate::{
    item::Item,
    level::{Level, Method},
    options::Options,
};

/// Receives finished items.
pub trait Transport: 'static + Send + Sync {
    /// Delivers `item`, which was sent through `method`.
    ///
    /// Implementations must not block on network delivery. Once delivery
    /// resolves they should invoke `item.callback`, if set.
    fn send(&self, method: Method, item: Item);

    /// Called with the merged options on every configuration change.
    ///
    /// `payload_data` is the extra payload passed alongside the options, if
    /// any.
    fn configure(&self, options: &Options, payload_data: Option<&Map<String, Value>>) {
        let _ = (options, payload_data);
    }
}

/// Transport that records each item as a [`tracing`] event and immediately
/// resolves its callback as delivered.
///
/// Used when no transport is supplied. Events are emitted with the
/// `tattle::transport` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTransport;

impl Transport for TracingTransport {
    fn send(&self, method: Method, item: Item) {
        let message = item
            .message
            .as_deref()
            .or_else(|| item.err.as_ref().map(|err| err.name()))
            .unwrap_or_default();
        let err = item.err.as_ref().map(ToString::to_string);
        let custom = Value::Object(item.custom.clone());

        match item.level.unwrap_or(Level::Debug) {
            Level::Debug => {
                tracing::debug!(target: "tattle::transport", uuid = %item.uuid, %method, ?err, %custom, "{message}")
            }
            Level::Info => {
                tracing::info!(target: "tattle::transport", uuid = %item.uuid, %method, ?err, %custom, "{message}")
            }
            Level::Warning => {
                tracing::warn!(target: "tattle::transport", uuid = %item.uuid, %method, ?err, %custom, "{message}")
            }
            Level::Error | Level::Critical => {
                tracing::error!(target: "tattle::transport", uuid = %item.uuid, %method, ?err, %custom, "{message}")
            }
        }

        if let Some(callback) = &item.callback {
            callback.call(&Ok(item.uuid));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{create_item, item::Delivery};

    #[test]
    fn test_tracing_transport_resolves_callback() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let item = create_item(args!["hello", move |d: &Delivery| {
            *sink.lock().unwrap() = Some(d.clone());
        }]);
        let uuid = item.uuid;

        TracingTransport.send(Method::Info, item);
        assert_eq!(*seen.lock().unwrap(), Some(Ok(uuid)));
    }

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tracing_transport_logs_at_item_level() {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::TRACE)
            .finish();

        let mut item = create_item(args!["disk full", serde_json::json!({"volume": "/var"})]);
        item.level = Some(Level::Error);
        tracing::subscriber::with_default(subscriber, || {
            TracingTransport.send(Method::Critical, item);
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("ERROR"));
        assert!(output.contains("disk full"));
        assert!(output.contains("method=critical"));
        assert!(output.contains("tattle::transport"));
    }
}
