//! Fleet Control Plane Server Binary
//!
//! Runs the control plane HTTP server for device provisioning and OTA dispatch.

use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use fleet_bridge::backends::{
    HttpBroker, HttpIssuer, HttpTrustAnchorSource, MemoryBlobStore, MemoryBroker, MemoryIssuer,
};
use fleet_bridge::{BlobStore, CertificateIssuer, MessageBroker, TrustAnchorSource};
use fleet_core::{AccessPolicy, UrlSigner};
use fleet_plane::{
    create_router, AppState, CredentialStore, FirmwareLocation, LifecycleManager, MemoryStore,
    OtaDispatcher, PlaneConfig,
};

#[tokio::main]
async fn main() {
    let config = PlaneConfig::from_env().expect("Invalid configuration");

    // Initialize logging
    let log_level = config.log_level.parse().unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    // Capability URL signer
    let kid = format!("fleet-plane-{}", uuid::Uuid::new_v4());
    let signer = match &config.url_signing_key {
        Some(bytes) => UrlSigner::from_bytes(&kid, bytes),
        None => {
            warn!("FLEET_URL_SIGNING_KEY not set, firmware URLs will not survive a restart");
            UrlSigner::generate(&kid)
        }
    };

    // Storage
    let store: Arc<dyn CredentialStore> = match &config.database_url {
        #[cfg(feature = "postgres")]
        Some(url) => Arc::new(
            fleet_plane::storage::PostgresStore::new(url)
                .await
                .expect("Failed to connect to PostgreSQL"),
        ),
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            warn!("FLEET_DATABASE_URL set but the postgres feature is disabled, using memory store");
            Arc::new(MemoryStore::new())
        }
        None => Arc::new(MemoryStore::new()),
    };

    // Collaborators
    let issuer: Arc<dyn CertificateIssuer> = match &config.issuer_endpoint {
        Some(endpoint) => {
            let mut issuer = HttpIssuer::new(endpoint).expect("Invalid FLEET_ISSUER_ENDPOINT");
            if let Some(token) = &config.issuer_token {
                issuer = issuer.with_token(token);
            }
            Arc::new(issuer)
        }
        None => {
            warn!(
                "FLEET_ISSUER_ENDPOINT not set, using the in-memory issuer. It hands devices \
                 placeholder key material that is NOT X.509 and cannot authenticate to a broker"
            );
            Arc::new(MemoryIssuer::new(&config.region, &config.account_id))
        }
    };

    let blobs = MemoryBlobStore::new(config.firmware_endpoint(), signer);
    if let Some(path) = &config.firmware_path {
        let data = std::fs::read(path).expect("Failed to read FLEET_FIRMWARE_PATH");
        blobs.put_object(&config.firmware_bucket, &config.firmware_key, data);
    }
    let blob_store: Arc<dyn BlobStore> = Arc::new(blobs);

    let broker: Arc<dyn MessageBroker> = match &config.broker_endpoint {
        Some(endpoint) => {
            let mut broker = HttpBroker::new(endpoint).expect("Invalid FLEET_BROKER_ENDPOINT");
            if let Some(token) = &config.broker_token {
                broker = broker.with_token(token);
            }
            Arc::new(broker)
        }
        None => Arc::new(MemoryBroker::new()),
    };

    let trust_anchor: Arc<dyn TrustAnchorSource> = Arc::new(
        HttpTrustAnchorSource::new(&config.root_ca_url).expect("Failed to build HTTP client"),
    );

    info!(
        kid = %kid,
        issuer = issuer.description(),
        store = ?store,
        blob_store = blob_store.description(),
        broker = broker.description(),
        trust_anchor = trust_anchor.description(),
        port = config.port,
        "Starting fleet control plane"
    );

    // Create application state
    let policy = AccessPolicy::new(&config.policy_name, &config.region, &config.account_id);
    let lifecycle = LifecycleManager::new(issuer, store.clone(), trust_anchor, policy);
    let dispatcher = OtaDispatcher::new(
        blob_store.clone(),
        broker,
        FirmwareLocation::new(&config.firmware_bucket, &config.firmware_key),
        &config.command_topic_base,
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState {
        lifecycle,
        dispatcher,
        store,
        blob_store,
        config,
    });

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!(addr = %addr, "Fleet control plane listening");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
