//! Shared fixtures for the end-to-end tests: a throwaway PKI and an in-process
//! service bound to an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::tls::IdentityMaterial;
use productinfo_client::{BearerToken, Endpoint, ProductInfoClient};
use productinfo_service::interceptor::{InterceptorChain, RecordingSink, StaticToken};
use productinfo_service::server::{router, state::AppState};
use productinfo_service::Server;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose,
};
use tokio::sync::oneshot;
use tonic::transport::Channel;

pub const TOKEN: &str = "blablatok-tokblabla-blablatok";
pub const SERVER_NAME: &str = "localhost";

/// A certificate authority able to issue leaf certificates.
pub struct Pki {
    ca: Certificate,
    ca_key: KeyPair,
}

/// A leaf certificate and its private key, PEM-encoded.
pub struct Leaf {
    pub cert_pem: String,
    pub key_pem: String,
}

impl Pki {
    pub fn new(name: &str) -> Self {
        let ca_key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        let ca = params.self_signed(&ca_key).unwrap();
        Self { ca, ca_key }
    }

    pub fn ca_pem(&self) -> String {
        self.ca.pem()
    }

    pub fn issue(&self, dns_name: &str) -> Leaf {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec![dns_name.to_owned()]).unwrap();
        params.distinguished_name.push(DnType::CommonName, dns_name);
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        let cert = params.signed_by(&key, &self.ca, &self.ca_key).unwrap();
        Leaf {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
        }
    }

    /// Identity for a peer holding `leaf` and trusting this CA.
    pub fn identity(&self, leaf: &Leaf) -> IdentityMaterial {
        self.identity_trusting(leaf, &self.ca_pem())
    }

    /// Identity for a peer holding `leaf` and trusting `ca_pem`.
    pub fn identity_trusting(&self, leaf: &Leaf, ca_pem: &str) -> IdentityMaterial {
        IdentityMaterial::from_pem(
            leaf.cert_pem.as_bytes(),
            leaf.key_pem.as_bytes(),
            ca_pem.as_bytes(),
        )
        .unwrap()
    }
}

/// A running service. Stops accepting when dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub sink: Arc<RecordingSink>,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    /// Start the service with the production chain.
    pub async fn start(pki: &Pki) -> Self {
        let sink = Arc::new(RecordingSink::new());
        let state = AppState::new(Arc::new(StaticToken::new(TOKEN)))
            .with_observation_sink(sink.clone());
        let chain = router::build(&state);
        Self::start_with_chain(pki, state, sink, chain).await
    }

    /// Start the service with a custom chain.
    pub async fn start_with_chain(
        pki: &Pki,
        state: AppState,
        sink: Arc<RecordingSink>,
        chain: InterceptorChain,
    ) -> Self {
        let identity = pki.identity(&pki.issue(SERVER_NAME));
        let server = Server::bind(
            "127.0.0.1:0",
            identity.server_tls_config(),
            chain,
            state.limits,
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();

        let (shutdown, stop) = oneshot::channel::<()>();
        tokio::spawn(server.serve_with_shutdown(async {
            stop.await.ok();
        }));

        Self {
            addr,
            state,
            sink,
            _shutdown: shutdown,
        }
    }

    /// Endpoint for a well-behaved client of this server's PKI.
    pub fn endpoint(&self, pki: &Pki) -> Endpoint {
        let identity = pki.identity(&pki.issue("client.productinfo.test"));
        Endpoint::new(
            self.addr.to_string(),
            identity.client_tls_config(SERVER_NAME).unwrap(),
        )
        .timeout(Duration::from_secs(5))
    }

    /// [`TestServer::endpoint`] with the right bearer token attached.
    pub fn authed_endpoint(&self, pki: &Pki) -> Endpoint {
        self.endpoint(pki).credentials(BearerToken::new(TOKEN))
    }

    /// A bare mTLS channel to this server, for sending hand-built messages.
    pub async fn channel(&self, pki: &Pki) -> Channel {
        let identity = pki.identity(&pki.issue("client.productinfo.test"));
        Channel::from_shared(format!("https://{}", self.addr))
            .unwrap()
            .tls_config(identity.client_tls_config(SERVER_NAME).unwrap())
            .unwrap()
            .connect()
            .await
            .unwrap()
    }

    /// Authenticated client sharing `channel`.
    pub fn client_on(&self, channel: Channel) -> ProductInfoClient {
        ProductInfoClient::new(
            channel,
            Some(Arc::new(BearerToken::new(TOKEN))),
            Duration::from_secs(5),
        )
    }
}
