use crate::cache::CacheStore;
use crate::error::AppError;
use crate::node::Origin;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serves the proxy router until stopped
pub struct ProxyServer {
    listen_addr: SocketAddr,
    router: Router,
    cancel: CancellationToken,
}

impl ProxyServer {
    pub fn new(
        listen_addr: SocketAddr,
        cache: Arc<CacheStore>,
        origin: Arc<dyn Origin>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            listen_addr,
            router: super::router(cache, origin),
            cancel,
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub async fn run(&self) -> Result<(), AppError> {
        let listener = TcpListener::bind(self.listen_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener; in-flight requests finish after `stop()`
    pub async fn serve(&self, listener: TcpListener) -> Result<(), AppError> {
        let local_addr = listener.local_addr()?;
        tracing::info!("🌐 Proxy listening on http://{}", local_addr);

        let cancel = self.cancel.clone();
        axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;

        tracing::info!("🛑 Proxy on {} stopped", local_addr);
        Ok(())
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}
