//! Bounded consumption of row streams.

use futures_util::{Stream, TryStreamExt};

/// Items taken from a stream, at most `cap` of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capped<T> {
    pub items: Vec<T>,
    /// True if the stream produced more than `cap` items
    pub truncated: bool,
}

/// Pull at most `cap + 1` items from `stream`, keeping the first `cap`.
///
/// The extra item only proves that more rows exist; it is discarded. The
/// stream is not polled again once the cap is exceeded, so dropping it
/// afterwards stops the producer.
pub async fn collect_capped<S, T, E>(mut stream: S, cap: usize) -> Result<Capped<T>, E>
where
    S: Stream<Item = Result<T, E>> + Unpin,
{
    let mut items = Vec::with_capacity(cap.min(1024));
    while let Some(item) = stream.try_next().await? {
        if items.len() == cap {
            return Ok(Capped {
                items,
                truncated: true,
            });
        }
        items.push(item);
    }
    Ok(Capped {
        items,
        truncated: false,
    })
}
