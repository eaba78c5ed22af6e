//! Connection-level phase reporting
//!
//! reqwest resolves, connects and negotiates TLS inside its connector, out of
//! sight of the request future. Three hooks feed one shared [`PhaseRecorder`]:
//!
//! - [`TimingResolver`] wraps DNS lookups
//! - [`ConnectTimingLayer`] wraps the connector service
//! - a rustls session store notices when a ClientHello is being built
//!
//! The crawler issues one request at a time and connections are not pooled,
//! so everything the recorder holds between two `take` calls belongs to the
//! request in flight.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Instant;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{
    ClientSessionMemoryCache, ClientSessionStore, Resumption, Tls12ClientSessionValue,
    Tls13ClientSessionValue,
};
use rustls::crypto::{self, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, NamedGroup, RootCertStore, SignatureScheme};
use tower::{Layer, Service};

use crate::crawler::timing::{PhaseEvent, PhaseMark};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// TLS sessions remembered across connections
const SESSION_CACHE_SIZE: usize = 256;

/// Shared buffer of phase marks reported by the transport hooks
#[derive(Debug, Clone, Default)]
pub struct PhaseRecorder {
    marks: Arc<Mutex<Vec<PhaseMark>>>,
}

impl PhaseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: PhaseEvent) {
        self.lock().push(PhaseMark::now(event));
    }

    /// Drains the marks recorded since the last call, oldest first
    pub fn take(&self) -> Vec<PhaseMark> {
        let mut marks = std::mem::take(&mut *self.lock());
        marks.sort_by_key(|mark| mark.at);
        marks
    }

    /// Closes a connection attempt that began at `started`
    ///
    /// The connector resolves the host before connecting, so the connect
    /// phase starts at the last DNS completion inside the attempt. When a
    /// TLS handshake began during the attempt, the connect phase ends there
    /// and the handshake ends now.
    pub fn connected(&self, started: Instant) {
        let now = Instant::now();
        let mut marks = self.lock();

        let latest = |event: PhaseEvent| {
            marks
                .iter()
                .filter(|mark| mark.event == event && mark.at >= started)
                .map(|mark| mark.at)
                .max()
        };
        let connect_start = latest(PhaseEvent::DnsDone).unwrap_or(started);
        let tls_start = latest(PhaseEvent::TlsStart);

        marks.push(PhaseMark::new(PhaseEvent::ConnectStart, connect_start));
        match tls_start {
            Some(at) => {
                marks.push(PhaseMark::new(PhaseEvent::ConnectDone, at));
                marks.push(PhaseMark::new(PhaseEvent::TlsDone, now));
            }
            None => marks.push(PhaseMark::new(PhaseEvent::ConnectDone, now)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PhaseMark>> {
        self.marks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// DNS resolver that records when each lookup starts and finishes
#[derive(Debug, Clone)]
pub struct TimingResolver {
    recorder: PhaseRecorder,
}

impl TimingResolver {
    pub fn new(recorder: PhaseRecorder) -> Self {
        Self { recorder }
    }
}

impl Resolve for TimingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let recorder = self.recorder.clone();
        let host = name.as_str().to_string();

        Box::pin(async move {
            recorder.record(PhaseEvent::DnsStart);
            let resolved = tokio::net::lookup_host((host.as_str(), 0)).await;
            recorder.record(PhaseEvent::DnsDone);

            let addrs: Vec<SocketAddr> = resolved.map_err(BoxError::from)?.collect();
            Ok::<Addrs, BoxError>(Box::new(addrs.into_iter()))
        })
    }
}

/// Connector layer reporting connect and TLS phases
#[derive(Debug, Clone)]
pub struct ConnectTimingLayer {
    recorder: PhaseRecorder,
}

impl ConnectTimingLayer {
    pub fn new(recorder: PhaseRecorder) -> Self {
        Self { recorder }
    }
}

impl<S> Layer<S> for ConnectTimingLayer {
    type Service = ConnectTiming<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ConnectTiming {
            inner,
            recorder: self.recorder.clone(),
        }
    }
}

/// Connector service wrapped by [`ConnectTimingLayer`]
#[derive(Debug, Clone)]
pub struct ConnectTiming<S> {
    inner: S,
    recorder: PhaseRecorder,
}

impl<S, Req> Service<Req> for ConnectTiming<S>
where
    S: Service<Req>,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let recorder = self.recorder.clone();
        let started = Instant::now();
        let connecting = self.inner.call(req);

        Box::pin(async move {
            let conn = connecting.await?;
            recorder.connected(started);
            Ok(conn)
        })
    }
}

/// Session store that marks the start of every handshake
///
/// rustls asks the store for a key-exchange hint while it builds the
/// ClientHello, which is the first step of the handshake.
struct HandshakeTimingStore {
    sessions: ClientSessionMemoryCache,
    recorder: PhaseRecorder,
}

impl fmt::Debug for HandshakeTimingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeTimingStore").finish_non_exhaustive()
    }
}

impl ClientSessionStore for HandshakeTimingStore {
    fn set_kx_hint(&self, server_name: ServerName<'static>, group: NamedGroup) {
        self.sessions.set_kx_hint(server_name, group);
    }

    fn kx_hint(&self, server_name: &ServerName<'_>) -> Option<NamedGroup> {
        self.recorder.record(PhaseEvent::TlsStart);
        self.sessions.kx_hint(server_name)
    }

    fn set_tls12_session(&self, server_name: ServerName<'static>, value: Tls12ClientSessionValue) {
        self.sessions.set_tls12_session(server_name, value);
    }

    fn tls12_session(&self, server_name: &ServerName<'_>) -> Option<Tls12ClientSessionValue> {
        self.sessions.tls12_session(server_name)
    }

    fn remove_tls12_session(&self, server_name: &ServerName<'static>) {
        self.sessions.remove_tls12_session(server_name);
    }

    fn insert_tls13_ticket(&self, server_name: ServerName<'static>, value: Tls13ClientSessionValue) {
        self.sessions.insert_tls13_ticket(server_name, value);
    }

    fn take_tls13_ticket(&self, server_name: &ServerName<'static>) -> Option<Tls13ClientSessionValue> {
        self.sessions.take_tls13_ticket(server_name)
    }
}

/// Builds the rustls configuration handed to reqwest
///
/// Trust roots are the bundled Mozilla set. With `insecure` set, server
/// certificates are accepted without verification.
pub fn tls_config(recorder: PhaseRecorder, insecure: bool) -> Result<ClientConfig, rustls::Error> {
    let provider = Arc::new(crypto::ring::default_provider());
    let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let mut config = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();

    config.resumption = Resumption::store(Arc::new(HandshakeTimingStore {
        sessions: ClientSessionMemoryCache::new(SESSION_CACHE_SIZE),
        recorder,
    }));
    if insecure {
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }));
    }

    Ok(config)
}

/// Verifier used with `insecure`: any certificate, valid signatures only
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}
