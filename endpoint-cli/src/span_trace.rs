//! An eyre handler that appends the active [`SpanTrace`] to debug-formatted reports.

use std::error::Error;
use std::fmt::{self, Formatter};
use std::panic::Location;

use eyre::{DefaultHandler, EyreHandler};
use tracing_error::{SpanTrace, SpanTraceStatus};

/// Wraps [`DefaultHandler`], capturing the spans entered when the report was created.
///
/// Needs [`tracing_error::ErrorLayer`] on the global subscriber, without it nothing is captured.
pub struct SpanTraceHandler {
    inner: Box<dyn EyreHandler>,
    spans: SpanTrace,
}

impl SpanTraceHandler {
    /// Hook for [`eyre::set_hook`].
    pub fn hook(error: &(dyn Error + 'static)) -> Box<dyn EyreHandler> {
        Box::new(Self {
            inner: DefaultHandler::default_with(error),
            spans: SpanTrace::capture(),
        })
    }
}

impl EyreHandler for SpanTraceHandler {
    fn debug(&self, error: &(dyn Error + 'static), f: &mut Formatter<'_>) -> fmt::Result {
        self.inner.debug(error, f)?;
        if self.spans.status() == SpanTraceStatus::CAPTURED {
            write!(f, "\n\nSpans:\n{}", self.spans)?;
        }
        Ok(())
    }

    fn display(&self, error: &(dyn Error + 'static), f: &mut Formatter<'_>) -> fmt::Result {
        self.inner.display(error, f)
    }

    fn track_caller(&mut self, location: &'static Location<'static>) {
        self.inner.track_caller(location);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::error::Error;
    use std::fmt::{self, Debug, Formatter};

    use eyre::EyreHandler;
    use tracing_error::ErrorLayer;
    use tracing_subscriber::layer::SubscriberExt;

    use super::SpanTraceHandler;

    struct Rendered<'a> {
        handler: &'a dyn EyreHandler,
        error: &'a (dyn Error + 'static),
    }

    impl Debug for Rendered<'_> {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            self.handler.debug(self.error, f)
        }
    }

    fn render(error: &(dyn Error + 'static)) -> String {
        let handler = SpanTraceHandler::hook(error);
        format!(
            "{:?}",
            Rendered {
                handler: handler.as_ref(),
                error,
            }
        )
    }

    #[test]
    fn debug_lists_entered_spans() {
        let error = std::io::Error::other("address in use");
        let subscriber = tracing_subscriber::registry().with(ErrorLayer::default());

        let output = tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("serve", port = 9000);
            let _guard = span.enter();
            render(&error)
        });

        assert!(output.starts_with("address in use"), "{output}");
        assert!(output.contains("Spans:"), "{output}");
        assert!(output.contains("serve"), "{output}");
        assert!(output.contains("port=9000"), "{output}");
    }

    #[test]
    fn debug_without_spans_is_the_default_report() {
        let error = std::io::Error::other("address in use");
        let subscriber = tracing_subscriber::registry().with(ErrorLayer::default());

        let output = tracing::subscriber::with_default(subscriber, || render(&error));

        assert!(output.starts_with("address in use"), "{output}");
        assert!(!output.contains("Spans:"), "{output}");
    }
}
