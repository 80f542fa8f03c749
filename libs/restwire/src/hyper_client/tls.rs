//! Root certificates and the HTTPS connector.

use std::sync::{Arc, OnceLock};

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls::crypto::CryptoProvider;
use rustls_pki_types::CertificateDer;

use super::TransportBuildError;
use crate::config::{TlsRootConfig, TransportSecurity};

/// OS store contents, read once per process. Empty when nothing loaded.
static NATIVE_ROOTS: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

#[cfg(test)]
static NATIVE_LOADS: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

fn load_native_roots() -> Vec<CertificateDer<'static>> {
    #[cfg(test)]
    NATIVE_LOADS.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

    let loaded = rustls_native_certs::load_native_certs();
    for err in &loaded.errors {
        tracing::warn!(error = %err, "failed to read a native root certificate");
    }
    if loaded.certs.is_empty() {
        tracing::warn!("OS certificate store is empty");
    } else {
        tracing::debug!(count = loaded.certs.len(), "loaded native root certificates");
    }
    loaded.certs
}

fn native_roots() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS.get_or_init(load_native_roots)
}

/// The process-wide default provider if one is installed, else aws-lc-rs.
/// Never installs a global default.
fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Client config trusting the OS store
///
/// Fails when the store yields no usable certificate, so a broken trust
/// store surfaces when the transport is built instead of on first handshake.
fn native_client_config() -> Result<rustls::ClientConfig, TransportBuildError> {
    let certs = native_roots();
    if certs.is_empty() {
        return Err(TransportBuildError::Tls(
            "no root certificates in the OS certificate store".to_owned(),
        ));
    }

    let mut store = rustls::RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(certs.iter().cloned());
    if ignored > 0 {
        tracing::warn!(added, ignored, "skipped unparsable native root certificates");
    }
    if added == 0 {
        return Err(TransportBuildError::Tls(format!(
            "none of the {} native root certificates could be parsed",
            certs.len()
        )));
    }

    Ok(
        rustls::ClientConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()
            .map_err(|e| TransportBuildError::Tls(e.to_string()))?
            .with_root_certificates(store)
            .with_no_client_auth(),
    )
}

/// HTTP/1.1 and HTTP/2 connector over rustls
///
/// `TlsOnly` rejects plain `http://` at the connector as well; the transport
/// checks the scheme first so callers get `UnsupportedUrl`.
pub(super) fn https_connector(
    roots: TlsRootConfig,
    security: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, TransportBuildError> {
    let builder = match roots {
        TlsRootConfig::WebPki => HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(crypto_provider())
            .map_err(|e| TransportBuildError::Tls(e.to_string()))?,
        TlsRootConfig::Native => {
            HttpsConnectorBuilder::new().with_tls_config(native_client_config()?)
        }
    };

    let connector = match security {
        TransportSecurity::AllowInsecureHttp => {
            tracing::warn!(
                target: "restwire::security",
                "plain HTTP enabled; traffic will not be encrypted"
            );
            builder.https_or_http().enable_all_versions().build()
        }
        TransportSecurity::TlsOnly => builder.https_only().enable_all_versions().build(),
    };
    Ok(connector)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_native_roots_load_once() {
        let before = NATIVE_LOADS.load(Ordering::SeqCst);
        let first = native_roots();
        let second = native_roots();

        // Another test may already have filled the cache.
        assert!(NATIVE_LOADS.load(Ordering::SeqCst) <= before + 1);
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_webpki_connector_builds() {
        assert!(https_connector(TlsRootConfig::WebPki, TransportSecurity::TlsOnly).is_ok());
        assert!(
            https_connector(TlsRootConfig::WebPki, TransportSecurity::AllowInsecureHttp).is_ok()
        );
    }

    #[test]
    fn test_native_connector_matches_store() {
        // Minimal containers ship without an OS trust store.
        let result = https_connector(TlsRootConfig::Native, TransportSecurity::TlsOnly);
        if native_roots().is_empty() {
            assert!(matches!(result, Err(TransportBuildError::Tls(_))));
        }
    }
}
