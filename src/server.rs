use std::{
    convert::Infallible,
    future::Future,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use hyper::{body::Incoming, server::conn::http1, service::service_fn, Request};
use hyper_util::rt::TokioIo;
use rustls::pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
    sync::watch,
};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::{config::TlsPaths, model::error::ProxyError, proxy::StorageProxy};

/// Builds a TLS acceptor from a PEM certificate chain and private key.
pub fn load_tls(paths: &TlsPaths) -> Result<TlsAcceptor, ProxyError> {
    let certs = CertificateDer::pem_file_iter(&paths.cert)
        .and_then(|certs| certs.collect::<Result<Vec<_>, _>>())
        .map_err(|err| {
            ProxyError::Tls(format!("failed to read certificates: {}, {:?}", paths.cert.display(), err))
        })?;

    if certs.is_empty() {
        return Err(ProxyError::Tls(format!(
            "no certificates found in: {}",
            paths.cert.display()
        )));
    }

    let key = PrivateKeyDer::from_pem_file(&paths.key).map_err(|err| {
        ProxyError::Tls(format!("failed to read private key: {}, {:?}", paths.key.display(), err))
    })?;

    let _ = rustls::crypto::ring::default_provider().install_default();
    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|err| ProxyError::Tls(err.to_string()))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Accept loop: one task per connection, one `StorageProxy::handle` per request.
pub struct Server {
    listener: TcpListener,
    proxy: Arc<StorageProxy>,
    tls: Option<TlsAcceptor>,
    shutdown_timeout: Duration,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    pub async fn bind(addr: SocketAddr, proxy: Arc<StorageProxy>) -> Result<Self, ProxyError> {
        let listener = TcpListener::bind(addr).await?;

        Ok(Self {
            listener,
            proxy,
            tls: None,
            shutdown_timeout: Duration::from_secs(5),
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn with_tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.tls = Some(acceptor);
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ProxyError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until `shutdown` resolves, then drains open connections for up
    /// to the shutdown timeout.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ProxyError>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!(addr=%addr, tls=self.tls.is_some(), "listening");

        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Err(err) => {
                            error!(error_message=%err, error_group="accept");
                            continue;
                        }
                        Ok(accepted) => accepted,
                    };
                    debug!(peer=%peer, "connection accepted");

                    if let Err(err) = stream.set_nodelay(true) {
                        warn!(error_message=%err, error_group="set_nodelay", peer=%peer);
                    }

                    let proxy = Arc::clone(&self.proxy);
                    let tls = self.tls.clone();
                    let stop_rx = stop_rx.clone();
                    let active = Arc::clone(&self.active_connections);
                    active.fetch_add(1, Ordering::SeqCst);

                    tokio::spawn(async move {
                        match tls {
                            None => serve_connection(stream, peer, proxy, stop_rx).await,
                            Some(acceptor) => match acceptor.accept(stream).await {
                                Err(err) => {
                                    warn!(error_message=%err, error_group="tls_handshake", peer=%peer);
                                }
                                Ok(stream) => serve_connection(stream, peer, proxy, stop_rx).await,
                            },
                        }
                        active.fetch_sub(1, Ordering::SeqCst);
                    });
                }
                _ = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }

        let _ = stop_tx.send(true);
        self.drain().await;

        Ok(())
    }

    async fn drain(&self) {
        let started = Instant::now();
        let active = self.active_connections.load(Ordering::SeqCst);
        if active > 0 {
            info!(active = active, timeout_secs = self.shutdown_timeout.as_secs(), "draining connections");
        }

        while self.active_connections.load(Ordering::SeqCst) > 0 && started.elapsed() < self.shutdown_timeout {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let remaining = self.active_connections.load(Ordering::SeqCst);
        match remaining {
            0 => info!("server shutdown OK"),
            _ => warn!(remaining = remaining, "server shutdown with connections still open"),
        }
    }
}

async fn serve_connection<I>(io: I, peer: SocketAddr, proxy: Arc<StorageProxy>, mut stop: watch::Receiver<bool>)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |req: Request<Incoming>| {
        let proxy = Arc::clone(&proxy);
        async move { Ok::<_, Infallible>(proxy.handle(req).await) }
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(io), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = stop.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(err) = result {
        if err.is_incomplete_message() || err.is_canceled() || err.is_closed() {
            debug!(error_message=%err, peer=%peer, "client disconnected");
        } else {
            error!(error_message=%err, error_group="serve_connection", peer=%peer);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
        sync::oneshot,
    };

    use super::*;
    use crate::{adapters::mock::MockClient, errors::ErrorCatalog};

    async fn request(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let req = format!("GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", path);
        stream.write_all(req.as_bytes()).await.unwrap();

        let mut resp = String::new();
        stream.read_to_string(&mut resp).await.unwrap();
        resp
    }

    #[tokio::test]
    async fn test_serve_and_shutdown() {
        let client = MockClient::new()
            .with_bucket("alpha")
            .with_object("beta", "report.csv", b"x,y\n1,2\n");
        let proxy = Arc::new(StorageProxy::new(Arc::new(client), ErrorCatalog::new().unwrap()));

        let server = Server::bind("127.0.0.1:0".parse().unwrap(), proxy)
            .await
            .unwrap()
            .with_shutdown_timeout(Duration::from_secs(1));
        let addr = server.local_addr().unwrap();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(async {
            let _ = stop_rx.await;
        }));

        let cases = vec![
            ("/", "200 OK", "[\n\t\"alpha\",\n\t\"beta\"\n]"),
            ("/beta/report.csv", "200 OK", "x,y\n1,2\n"),
            ("/gamma", "404 Not Found", "\"message\": \"bucket not found\""),
        ];

        for (path, status, body) in cases {
            let resp = request(addr, path).await;
            let (head, payload) = resp.split_once("\r\n\r\n").unwrap();
            assert!(head.starts_with(&format!("HTTP/1.1 {}", status)), "failed status for case: {}", path);
            assert!(payload.contains(body), "failed body for case: {}", path);
        }

        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[test]
    fn test_load_tls_missing_files() {
        let paths = TlsPaths {
            cert: PathBuf::from("/nonexistent/cert.pem"),
            key: PathBuf::from("/nonexistent/key.pem"),
        };

        assert!(matches!(load_tls(&paths), Err(ProxyError::Tls(_))));
    }
}
