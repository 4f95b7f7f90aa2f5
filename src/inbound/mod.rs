//! Inbound adapters (listeners)

use crate::common::net::configure_tcp_stream;
use crate::proxy::ProxyEngine;
use crate::Result;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Trait for inbound listeners
#[async_trait]
pub trait InboundListener: Send + Sync {
    /// Get listener name
    fn name(&self) -> &str;

    /// Start the listener
    async fn start(&self) -> Result<()>;

    /// Stop the listener
    async fn stop(&self) -> Result<()>;

    /// Check if listener is running
    fn is_running(&self) -> bool;
}

/// HTTP proxy listener: accepts connections and hands each one to the engine
pub struct HttpListener {
    listen: SocketAddr,
    engine: Arc<ProxyEngine>,
    running: AtomicBool,
}

impl HttpListener {
    pub fn new(listen: SocketAddr, engine: Arc<ProxyEngine>) -> Self {
        HttpListener {
            listen,
            engine,
            running: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl InboundListener for HttpListener {
    fn name(&self) -> &str {
        "HTTP"
    }

    async fn start(&self) -> Result<()> {
        let listener = TcpListener::bind(self.listen).await?;
        let addr = listener.local_addr()?;
        info!("HTTP proxy listening on {}", addr);

        self.running.store(true, Ordering::SeqCst);

        while self.running.load(Ordering::SeqCst) {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    configure_tcp_stream(&stream);
                    let engine = self.engine.clone();
                    tokio::spawn(async move {
                        if let Err(e) = engine.serve_connection(stream).await {
                            debug!("connection from {} ended: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    if self.running.load(Ordering::SeqCst) {
                        error!("accept error: {}", e);
                    }
                }
            }
        }

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
