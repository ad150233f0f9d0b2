//! Stream stages between raw value changes and rule dispatch.
//!
//! Order per emission: debounce, drop empty snapshots, drop snapshots whose
//! trigger keys did not change, stop on teardown. Teardown is checked at
//! every boundary so a pending debounce timer never delivers after it.

use std::time::Duration;

use futures::stream::{BoxStream, Stream, StreamExt};
use log::trace;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::distinct::DistinctUntilKeysChanged;
use crate::form::ValueChanges;
use crate::value::FormValue;

/// What woke the debounce loop.
enum Step<T> {
    Cancelled,
    Quiet,
    Item(T),
    End,
}

/// Emit the latest item once `window` has passed without a newer one.
///
/// A pending item is flushed when the source ends. Once `cancel` fires
/// nothing more is emitted, including an item waiting on its timer.
pub fn debounce<S>(
    source: S,
    window: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = S::Item> + Send + 'static
where
    S: Stream + Send + Unpin + 'static,
    S::Item: Send + 'static,
{
    async_stream::stream! {
        let mut source = source;
        let mut pending: Option<S::Item> = None;
        let mut deadline = Instant::now();

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                _ = sleep_until(deadline), if pending.is_some() => Step::Quiet,
                next = source.next() => match next {
                    Some(item) => Step::Item(item),
                    None => Step::End,
                },
            };

            match step {
                Step::Cancelled => break,
                Step::Quiet => {
                    if let Some(item) = pending.take() {
                        yield item;
                    }
                }
                Step::Item(item) => {
                    if pending.is_some() {
                        trace!("[debounce] superseded pending value");
                    }
                    pending = Some(item);
                    deadline = Instant::now() + window;
                }
                Step::End => {
                    if let Some(item) = pending.take() {
                        yield item;
                    }
                    break;
                }
            }
        }
    }
}

/// Accepted snapshots for one `validate` call.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use formwatch::{FormValue, pipeline::Pipeline};
/// use futures::StreamExt;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let changes = futures::stream::iter(vec![
///     FormValue::new(),
///     FormValue::new().with("a", 1i64),
/// ])
/// .boxed();
///
/// let mut pipeline = Pipeline::new(changes, Duration::ZERO, vec!["a".to_string()], CancellationToken::new());
/// assert_eq!(pipeline.next().await, Some(FormValue::new().with("a", 1i64)));
/// assert_eq!(pipeline.next().await, None);
/// # }
/// ```
pub struct Pipeline {
    source: BoxStream<'static, FormValue>,
    distinct: DistinctUntilKeysChanged,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Build the stages over a value-change stream.
    ///
    /// `keys` are the trigger fields deduplication compares; an empty list
    /// compares whole snapshots.
    pub fn new(
        changes: ValueChanges,
        window: Duration,
        keys: Vec<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source: debounce(changes, window, cancel.clone()).boxed(),
            distinct: DistinctUntilKeysChanged::new(keys),
            cancel,
        }
    }

    /// Wait for the next accepted snapshot.
    ///
    /// Returns `None` once torn down or once the form stops emitting.
    pub async fn next(&mut self) -> Option<FormValue> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                next = self.source.next() => next,
            };
            let value = next?;

            if value.is_empty() {
                trace!("[pipeline] dropping empty value");
                continue;
            }
            if !self.distinct.accept(&value) {
                continue;
            }
            if self.cancel.is_cancelled() {
                return None;
            }
            return Some(value);
        }
    }

    /// The trigger keys compared by deduplication.
    pub fn keys(&self) -> &[String] {
        self.distinct.keys()
    }
}
