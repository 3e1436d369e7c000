use async_trait::async_trait;
use std::future::Future;

/// Visibility control for whatever UI the embedding application owns. The
/// loop hides it around every dispatch and capture so the agent's own
/// window never ends up in a screenshot or under a click.
#[async_trait]
pub trait WindowHost: Send + Sync {
    async fn hide(&self);
    async fn show(&self);
}

/// Host with no window to hide, used by the CLI binary and tests.
pub struct NoopHost;

#[async_trait]
impl WindowHost for NoopHost {
    async fn hide(&self) {}
    async fn show(&self) {}
}

/// Hides the host UI, awaits the operation, then restores visibility.
/// Visibility is restored on the error path too; only a panic skips it.
pub async fn with_window_hidden<H, F, T, E>(host: &H, fut: F) -> Result<T, E>
where
    H: WindowHost + ?Sized,
    F: Future<Output = Result<T, E>>,
{
    host.hide().await;
    let result = fut.await;
    host.show().await;
    result
}
