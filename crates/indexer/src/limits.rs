use std::sync::Arc;
use std::sync::OnceLock;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const EMBED_CONCURRENCY_ENV: &str = "GREPPY_EMBED_CONCURRENCY";
pub const DEFAULT_EMBED_CONCURRENCY: usize = 4;
const MAX_EMBED_CONCURRENCY: usize = 32;

fn parse_embed_concurrency(raw: Option<&str>, default_value: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(1, MAX_EMBED_CONCURRENCY)
}

/// Process-wide bound on in-flight embedding batches
pub fn embed_concurrency() -> usize {
    static LIMIT: OnceLock<usize> = OnceLock::new();
    *LIMIT.get_or_init(|| {
        let raw = std::env::var(EMBED_CONCURRENCY_ENV).ok();
        parse_embed_concurrency(raw.as_deref(), DEFAULT_EMBED_CONCURRENCY)
    })
}

fn semaphore() -> Arc<Semaphore> {
    static SEM: OnceLock<Arc<Semaphore>> = OnceLock::new();
    SEM.get_or_init(|| Arc::new(Semaphore::new(embed_concurrency())))
        .clone()
}

pub(crate) async fn acquire_embed_permit() -> OwnedSemaphorePermit {
    // The semaphore is never closed.
    semaphore()
        .acquire_owned()
        .await
        .unwrap_or_else(|_| unreachable!("embed concurrency semaphore closed"))
}

/// Reads and hashes run in groups of this size
pub(crate) fn read_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(2, 16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_embed_concurrency_defaults_and_clamps() {
        let default_value = DEFAULT_EMBED_CONCURRENCY;
        assert_eq!(parse_embed_concurrency(None, default_value), default_value);
        assert_eq!(parse_embed_concurrency(Some(""), default_value), default_value);
        assert_eq!(parse_embed_concurrency(Some("   "), default_value), default_value);
        assert_eq!(parse_embed_concurrency(Some("2"), default_value), 2);
        assert_eq!(parse_embed_concurrency(Some("0"), default_value), 1);
        assert_eq!(
            parse_embed_concurrency(Some("999"), default_value),
            MAX_EMBED_CONCURRENCY
        );
        assert_eq!(parse_embed_concurrency(Some("abc"), default_value), default_value);
        assert_eq!(parse_embed_concurrency(Some(" 5 "), default_value), 5);
    }
}
