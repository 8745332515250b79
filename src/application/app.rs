use crate::auth::{build_provider, AuthorizationService};
use crate::config::Settings;
use crate::infrastructure::log_messages::application as messages;
use crate::infrastructure::shutdown_signal;
use crate::proxy::{ForwardLimits, GatewayService};
use crate::{routes, Error, Result};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tracing::{info, instrument};

/// Main application struct that coordinates all components
pub struct Application {
    settings: Settings,
    router: Router,
}

impl Application {
    /// Build every component; key and route errors are fatal here, before serving
    #[instrument(skip_all)]
    pub fn new(settings: Settings) -> Result<Self> {
        let provider = build_provider(&settings.paseto)?;
        let authorizer = AuthorizationService::new(provider, settings.paseto.expiration());
        let forwarder = GatewayService::new(ForwardLimits::from(&settings.server));
        let router = routes::register(&settings.runners, &authorizer, &forwarder)?;

        info!(
            runners = settings.runners.len(),
            version = %authorizer.version(),
            "{}",
            messages::ROUTES_REGISTERED
        );

        Ok(Self { settings, router })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until SIGINT or SIGTERM, over TLS when certificate and key are configured
    #[instrument(skip(self), fields(address = %self.settings.server.address))]
    pub async fn run(self) -> Result<()> {
        let tls = self
            .settings
            .server
            .tls_paths()
            .map(|(certificate, key)| (certificate.to_path_buf(), key.to_path_buf()));

        match tls {
            Some((certificate, key)) => self.serve_tls(&certificate, &key).await,
            None => {
                let listener = TcpListener::bind(&self.settings.server.address).await?;
                self.serve(listener, shutdown_signal()).await
            }
        }
    }

    /// Serve plain HTTP on a bound listener, draining in-flight requests once `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(address = %listener.local_addr()?, "{}", messages::LISTENING);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("{}", messages::STOPPED);
        Ok(())
    }

    async fn serve_tls(self, certificate: &Path, key: &Path) -> Result<()> {
        let address: SocketAddr = self.settings.server.address.parse().map_err(|e| {
            Error::application(format!(
                "invalid server address {}: {e}",
                self.settings.server.address
            ))
        })?;
        let tls = RustlsConfig::from_pem_file(certificate, key).await?;

        let handle = axum_server::Handle::new();
        let draining = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            draining.graceful_shutdown(None);
        });

        info!(
            address = %address,
            certificate = %certificate.display(),
            "{}",
            messages::LISTENING_TLS
        );

        axum_server::bind_rustls(address, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        info!("{}", messages::STOPPED);
        Ok(())
    }
}
