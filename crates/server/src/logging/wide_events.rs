//! WideEvent - one span per resolved flow, with attributes filled in as the
//! flow progresses.
//!
//! Usage:
//!
//! ```rust,ignore
//! let evt = env.logger.flow("login");
//! evt.add("challenge", challenge);
//! evt.add_opt("client_id", request.client_id());
//! evt.info("challenge resolved");
//! ```
//!
//! `tracing` only records values for fields declared when the span is created,
//! so every attribute a flow may set is declared up front in [`WideEvent::new`].
//! Recording an undeclared key is a silent no-op.

use std::fmt::Display;
use tracing::{Level, Span, field};

#[derive(Clone, Debug)]
pub struct WideEvent {
    span: Span,
}

impl WideEvent {
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(
            "flow",
            flow = %name,
            challenge = field::Empty,
            client_id = field::Empty,
            subject = field::Empty,
            requested_scope = field::Empty,
            granted_scope = field::Empty,
            skip = field::Empty,
            decision = field::Empty,
            outcome = field::Empty,
            error = field::Empty,
        );
        WideEvent { span }
    }

    pub fn add<V: Display>(&self, key: &'static str, value: V) {
        self.span.record(key, field::display(value));
    }

    pub fn add_opt<V: Display>(&self, key: &'static str, value: Option<V>) {
        if let Some(v) = value {
            self.add(key, v);
        }
    }

    /// Emit an event at the given level inside this span.
    pub fn emit(&self, message: &str, level: Level) {
        self.span.in_scope(|| match level {
            Level::ERROR => tracing::event!(Level::ERROR, message = %message),
            Level::WARN => tracing::event!(Level::WARN, message = %message),
            Level::INFO => tracing::event!(Level::INFO, message = %message),
            Level::DEBUG => tracing::event!(Level::DEBUG, message = %message),
            Level::TRACE => tracing::event!(Level::TRACE, message = %message),
        });
    }

    pub fn info(&self, message: &str) {
        self.emit(message, Level::INFO)
    }
    pub fn warn(&self, message: &str) {
        self.emit(message, Level::WARN)
    }
    pub fn debug(&self, message: &str) {
        self.emit(message, Level::DEBUG)
    }
}

/// Logger handle carried in the [`Environment`](crate::Environment).
///
/// Holding it in the context instead of reaching for a global lets tests and
/// embedders decide the parent span flows are attached to.
#[derive(Clone, Debug)]
pub struct FlowLogger {
    parent: Span,
}

impl FlowLogger {
    pub fn new(parent: Span) -> Self {
        Self { parent }
    }

    /// Start a flow event as a child of this logger's parent span.
    pub fn flow(&self, name: &'static str) -> WideEvent {
        let _guard = self.parent.enter();
        WideEvent::new(name)
    }
}

impl Default for FlowLogger {
    fn default() -> Self {
        Self::new(Span::none())
    }
}

#[macro_export]
macro_rules! wide_debug {
    ($evt:expr, $($arg:tt)+) => {
        $evt.emit(&format!($($arg)+), tracing::Level::DEBUG)
    };
}
