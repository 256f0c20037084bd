//! Paced reads for media downloads.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::Sleep;

/// Time it takes to move `bytes` at `rate_bps` bits per second.
pub fn pace(bytes: usize, rate_bps: u64) -> Duration {
    if rate_bps == 0 || bytes == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(bytes as f64 * 8.0 / rate_bps as f64)
}

/// Wraps a chunked byte stream and holds back every chunk for the time the
/// target rate allows, so sustained throughput converges to `rate_bps`.
///
/// At most one chunk is held at a time. A rate of zero passes chunks through
/// untouched. One instance per download; it is not meant to be shared.
pub struct ThrottledStream<S> {
    inner: S,
    rate_bps: u64,
    held: Option<Vec<u8>>,
    delay: Option<Pin<Box<Sleep>>>,
}

impl<S> ThrottledStream<S>
where
    S: Stream<Item = io::Result<Vec<u8>>> + Unpin,
{
    pub fn new(inner: S, rate_bps: u64) -> Self {
        Self {
            inner,
            rate_bps,
            held: None,
            delay: None,
        }
    }

    /// Drain the stream into memory.
    pub async fn read_to_end(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf)
    }
}

impl<S> Stream for ThrottledStream<S>
where
    S: Stream<Item = io::Result<Vec<u8>>> + Unpin,
{
    type Item = io::Result<Vec<u8>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(delay) = this.delay.as_mut() {
                ready!(delay.as_mut().poll(cx));
                this.delay = None;
                return Poll::Ready(this.held.take().map(Ok));
            }

            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(chunk)) => {
                    let wait = pace(chunk.len(), this.rate_bps);
                    if wait.is_zero() {
                        return Poll::Ready(Some(Ok(chunk)));
                    }
                    this.held = Some(chunk);
                    this.delay = Some(Box::pin(tokio::time::sleep(wait)));
                }
                other => return Poll::Ready(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tokio::time::Instant;

    fn chunks(count: usize, size: usize) -> impl Stream<Item = io::Result<Vec<u8>>> + Unpin {
        stream::iter((0..count).map(move |i| Ok(vec![i as u8; size])))
    }

    #[test]
    fn test_pace() {
        assert_eq!(pace(1000, 8000), Duration::from_secs(1));
        assert_eq!(pace(500, 8000), Duration::from_millis(500));
        assert_eq!(pace(1000, 0), Duration::ZERO);
        assert_eq!(pace(0, 8000), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throughput_converges_to_rate() {
        let start = Instant::now();
        let data = ThrottledStream::new(chunks(3, 1000), 8000)
            .read_to_end()
            .await
            .unwrap();

        assert_eq!(data.len(), 3000);
        assert_eq!(&data[..1000], &[0u8; 1000][..]);
        assert_eq!(&data[2000..], &[2u8; 1000][..]);
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_rate_disables_pacing() {
        let start = Instant::now();
        let data = ThrottledStream::new(chunks(5, 1000), 0)
            .read_to_end()
            .await
            .unwrap();

        assert_eq!(data.len(), 5000);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_pass_through() {
        let inner = stream::iter(vec![
            Ok(vec![1u8; 10]),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "cut")),
        ]);
        let err = ThrottledStream::new(inner, 8000).read_to_end().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
