use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use std::{net::SocketAddr, time::Duration};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::{CorsOrigins, TlsSettings};

/// Create CORS layer based on configured origins
pub fn create_cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match origins {
        // Credentials cannot be combined with a wildcard origin.
        CorsOrigins::Any => layer.allow_origin(AllowOrigin::any()),
        CorsOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => {
                        log::info!("CORS: Added origin '{}'", origin);
                        Some(value)
                    }
                    Err(_) => {
                        log::warn!("CORS: Ignoring invalid origin '{}'", origin);
                        None
                    }
                })
                .collect();

            layer.allow_origin(values).allow_credentials(true)
        }
    }
}

/// Load the certificate chain and key from disk, appending the CA bundle to the chain
pub async fn load_rustls_config(tls: &TlsSettings) -> std::io::Result<RustlsConfig> {
    let mut chain = tokio::fs::read(&tls.cert_path).await?;

    if let Some(ca_path) = &tls.ca_path {
        let ca = tokio::fs::read(ca_path).await?;
        if !chain.ends_with(b"\n") {
            chain.push(b'\n');
        }
        chain.extend_from_slice(&ca);
    }

    let key = tokio::fs::read(&tls.key_path).await?;
    RustlsConfig::from_pem(chain, key).await
}

/// Start HTTP server
pub async fn start_http_server(
    app: Router,
    port: u16,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("HTTP server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

/// Start HTTPS server with the configured certificate
pub async fn start_https_server(
    app: Router,
    port: u16,
    tls: &TlsSettings,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let tls_config = load_rustls_config(tls).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("HTTPS server starting on {}", addr);

    let handle = Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            shutdown.cancelled().await;
            handle.graceful_shutdown(Some(Duration::from_secs(10)));
        }
    });

    axum_server::bind_rustls(addr, tls_config)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    fn app(origins: &CorsOrigins) -> Router {
        Router::new()
            .route("/api/birthdays/:key", get(|| async { "ok" }))
            .layer(create_cors_layer(origins))
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/birthdays/f1")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_preflight_with_any_origin() {
        let response = app(&CorsOrigins::Any)
            .oneshot(preflight("https://anywhere.example"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        let methods = response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(methods.contains("DELETE"));
        assert!(methods.contains("PUT"));
    }

    #[tokio::test]
    async fn test_preflight_with_listed_origin() {
        let origins = CorsOrigins::List(vec!["https://app.example".to_string()]);
        let response = app(&origins)
            .oneshot(preflight("https://app.example"))
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://app.example"
        );
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn test_unlisted_origin_gets_no_allow_header() {
        let origins = CorsOrigins::List(vec!["https://app.example".to_string()]);
        let response = app(&origins)
            .oneshot(preflight("https://evil.example"))
            .await
            .unwrap();

        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_missing_certificate_is_an_error() {
        let tls = TlsSettings {
            key_path: "/nonexistent/key.pem".into(),
            cert_path: "/nonexistent/cert.pem".into(),
            ca_path: None,
        };
        assert!(load_rustls_config(&tls).await.is_err());
    }
}
