//! HTTP server implementation

use crate::handlers::handle_request;
use accountd_core::AccountService;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::future::Future;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

type ConnectionError = Box<dyn std::error::Error + Send + Sync>;

pub struct AccountServer {
    service: AccountService,
}

impl AccountServer {
    pub fn new(service: AccountService) -> Self {
        Self { service }
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn serve(self, listener: TcpListener, shutdown: impl Future<Output = ()>) -> std::io::Result<()> {
        info!("accountd listening on {}", listener.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };
                    debug!("New connection from {}", remote_addr);

                    let service = self.service.clone();
                    tokio::spawn(async move {
                        if let Err(err) = Self::handle_connection(stream, service).await {
                            debug!("Connection error from {}: {}", remote_addr, err);
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }
            }
        }
    }

    async fn handle_connection(stream: TcpStream, service: AccountService) -> Result<(), ConnectionError> {
        let io = TokioIo::new(stream);

        let svc = service_fn(move |req| {
            let service = service.clone();
            async move { handle_request(req, service).await }
        });

        auto::Builder::new(TokioExecutor::new()).serve_connection(io, svc).await
    }
}
