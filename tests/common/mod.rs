//! Shared utilities for integration tests
//!
//! Builds secured SOAP envelopes the way a sender would: content is sealed
//! with AES-GCM, the content key is wrapped with RSA, and the header carries
//! the tokens and references needed to undo it.

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use wssec_stream::crypto::algorithms::{AES128_GCM, RSA_OAEP_MGF1P};
use wssec_stream::crypto::{AlgorithmKind, CipherCapability, algorithm_mapping};
use wssec_stream::{
    Certificate, CredentialCallback, CredentialUsage, CryptoError, CryptoProvider,
    InMemoryKeyStore, Key, KeyStore, PrivateKey, PublicKey, RustCryptoProvider, SecretKey,
};

pub const SOAP11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
pub const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
pub const XENC_NS: &str = "http://www.w3.org/2001/04/xmlenc#";
pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const APP_NS: &str = "urn:example:orders";

pub const X509_V3: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-x509-token-profile-1.0#X509v3";

/// RSA key pair in the shapes the crate and the sender need
pub struct RsaIdentity {
    pub rsa: RsaPrivateKey,
    pub public: PublicKey,
    pub private: PrivateKey,
}

impl RsaIdentity {
    pub fn generate(bits: usize) -> Self {
        let rsa = RsaPrivateKey::new(&mut aes_gcm::aead::OsRng, bits).unwrap();
        let public = PublicKey::from_rsa(&rsa.to_public_key()).unwrap();
        let private = PrivateKey::from_pkcs8_der(rsa.to_pkcs8_der().unwrap().as_bytes().to_vec());
        Self {
            rsa,
            public,
            private,
        }
    }

    pub fn rsa_public(&self) -> RsaPublicKey {
        self.rsa.to_public_key()
    }
}

/// Fresh 1024-bit identity (fast enough to create per test)
pub fn rsa_identity() -> RsaIdentity {
    RsaIdentity::generate(1024)
}

/// 1024-bit identity shared by all tests of one binary
pub fn shared_identity() -> &'static RsaIdentity {
    static IDENTITY: OnceLock<RsaIdentity> = OnceLock::new();
    IDENTITY.get_or_init(rsa_identity)
}

/// Shared 2048-bit identity, large enough to sign certificates with
pub fn rsa_2048() -> &'static RsaIdentity {
    static IDENTITY: OnceLock<RsaIdentity> = OnceLock::new();
    IDENTITY.get_or_init(|| RsaIdentity::generate(2048))
}

/// Self-signed certificate for an RSA identity
pub fn rsa_certificate(identity: &RsaIdentity, cn: &str) -> Certificate {
    let pem = identity.rsa.to_pkcs8_pem(LineEnding::LF).unwrap();
    let key = KeyPair::from_pem(&pem).unwrap();
    let mut params = CertificateParams::new(vec![]).unwrap();
    params.distinguished_name.push(DnType::CommonName, cn);
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_after = rcgen::date_time_ymd(2045, 1, 1);
    let cert = params.self_signed(&key).unwrap();
    Certificate::from_der(cert.der()).unwrap()
}

/// Certificate authority with its signing key
pub struct Authority {
    pub cert: rcgen::Certificate,
    pub key: KeyPair,
}

impl Authority {
    pub fn new(cn: &str, not_after_year: i32) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec![]).unwrap();
        params.distinguished_name.push(DnType::CommonName, cn);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.not_before = rcgen::date_time_ymd(2020, 1, 1);
        params.not_after = rcgen::date_time_ymd(not_after_year, 1, 1);
        let cert = params.self_signed(&key).unwrap();
        Self { cert, key }
    }

    pub fn certificate(&self) -> Certificate {
        Certificate::from_der(self.cert.der()).unwrap()
    }

    /// Issue an ECDSA end-entity certificate, returning it with its key
    pub fn issue(&self, cn: &str) -> (Certificate, KeyPair) {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec![]).unwrap();
        params.distinguished_name.push(DnType::CommonName, cn);
        params.not_before = rcgen::date_time_ymd(2020, 1, 1);
        params.not_after = rcgen::date_time_ymd(2045, 1, 1);
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
        (Certificate::from_der(cert.der()).unwrap(), key)
    }
}

pub fn b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn capability(uri: &str) -> &'static CipherCapability {
    algorithm_mapping(uri).unwrap()
}

/// Seal content with AES-GCM the way a sender would
pub fn seal(algorithm: &str, key: &[u8], plaintext: &str) -> Vec<u8> {
    let key = Key::Secret(SecretKey::new("AES", key.to_vec()));
    RustCryptoProvider::new()
        .encrypt(capability(algorithm), &key, plaintext.as_bytes())
        .unwrap()
}

/// Wrap a content key for a recipient public key
pub fn wrap(algorithm: &str, recipient: &PublicKey, content_key: &[u8]) -> Vec<u8> {
    RustCryptoProvider::new()
        .encrypt(capability(algorithm), &Key::Public(recipient.clone()), content_key)
        .unwrap()
}

/// `ds:KeyInfo` holding a direct token reference
pub fn token_reference(id: &str) -> String {
    format!(
        r##"<ds:KeyInfo><wsse:SecurityTokenReference><wsse:Reference URI="#{}"/></wsse:SecurityTokenReference></ds:KeyInfo>"##,
        id
    )
}

/// `ds:KeyInfo` holding an RSA key value
pub fn key_value_info(public: &RsaPublicKey) -> String {
    format!("<ds:KeyInfo>{}</ds:KeyInfo>", rsa_key_value(None, public))
}

pub fn rsa_key_value(id: Option<&str>, public: &RsaPublicKey) -> String {
    let id = id
        .map(|id| format!(r#" wsu:Id="{}""#, id))
        .unwrap_or_default();
    format!(
        "<ds:KeyValue{}><ds:RSAKeyValue><ds:Modulus>{}</ds:Modulus><ds:Exponent>{}</ds:Exponent></ds:RSAKeyValue></ds:KeyValue>",
        id,
        b64(&public.n().to_bytes_be()),
        b64(&public.e().to_bytes_be())
    )
}

pub fn binary_security_token(id: &str, certificate: &Certificate) -> String {
    format!(
        r#"<wsse:BinarySecurityToken wsu:Id="{}" ValueType="{}">{}</wsse:BinarySecurityToken>"#,
        id,
        X509_V3,
        b64(certificate.der())
    )
}

pub fn reference_list(references: &[&str]) -> String {
    let refs: String = references
        .iter()
        .map(|r| format!(r##"<xenc:DataReference URI="#{}"/>"##, r))
        .collect();
    format!("<xenc:ReferenceList>{}</xenc:ReferenceList>", refs)
}

/// `xenc:EncryptedKey` with an optional identifier and reference list
pub fn encrypted_key(
    id: Option<&str>,
    algorithm: &str,
    key_info: &str,
    wrapped: &[u8],
    references: &[&str],
) -> String {
    let id = id.map(|id| format!(r#" Id="{}""#, id)).unwrap_or_default();
    let list = if references.is_empty() {
        String::new()
    } else {
        reference_list(references)
    };
    format!(
        r#"<xenc:EncryptedKey{}><xenc:EncryptionMethod Algorithm="{}"/>{}<xenc:CipherData><xenc:CipherValue>{}</xenc:CipherValue></xenc:CipherData>{}</xenc:EncryptedKey>"#,
        id,
        algorithm,
        key_info,
        b64(wrapped),
        list
    )
}

/// `xenc:EncryptedData` with an optional `ds:KeyInfo`
pub fn encrypted_data(id: &str, algorithm: &str, key_info: &str, ciphertext: &[u8]) -> String {
    format!(
        r#"<xenc:EncryptedData Id="{}" Type="http://www.w3.org/2001/04/xmlenc#Element"><xenc:EncryptionMethod Algorithm="{}"/>{}<xenc:CipherData><xenc:CipherValue>{}</xenc:CipherValue></xenc:CipherData></xenc:EncryptedData>"#,
        id,
        algorithm,
        key_info,
        b64(ciphertext)
    )
}

/// SOAP 1.1 envelope with a `wsse:Security` header
pub fn envelope(header: &str, body: &str) -> String {
    format!(
        r#"<soap:Envelope xmlns:soap="{}" xmlns:wsse="{}" xmlns:wsu="{}" xmlns:xenc="{}" xmlns:ds="{}" xmlns:app="{}"><soap:Header><wsse:Security>{}</wsse:Security></soap:Header><soap:Body>{}</soap:Body></soap:Envelope>"#,
        SOAP11_NS, WSSE_NS, WSU_NS, XENC_NS, DSIG_NS, APP_NS, header, body
    )
}

/// One encrypted element
pub struct Part {
    pub id: String,
    pub plaintext: String,
}

impl Part {
    pub fn new(id: &str, plaintext: &str) -> Self {
        Self {
            id: id.to_string(),
            plaintext: plaintext.to_string(),
        }
    }
}

/// Envelope whose body parts are sealed under one content key wrapped for
/// `recipient`, with the reference list inside the EncryptedKey
pub fn single_key_envelope(recipient: &RsaIdentity, parts: &[Part]) -> String {
    let content_key = [0x42u8; 16];
    let wrapped = wrap(RSA_OAEP_MGF1P, &recipient.public, &content_key);
    let ids: Vec<&str> = parts.iter().map(|p| p.id.as_str()).collect();
    let header = encrypted_key(
        Some("EK-1"),
        RSA_OAEP_MGF1P,
        &key_value_info(&recipient.rsa_public()),
        &wrapped,
        &ids,
    );
    let body: String = parts
        .iter()
        .map(|p| {
            let sealed = seal(AES128_GCM, &content_key, &p.plaintext);
            encrypted_data(&p.id, AES128_GCM, "", &sealed)
        })
        .collect();
    envelope(&header, &body)
}

/// Crypto provider counting decryptions per operation class
#[derive(Debug, Default)]
pub struct CountingProvider {
    inner: RustCryptoProvider,
    key_transport: AtomicUsize,
    block: AtomicUsize,
}

impl CountingProvider {
    pub fn key_transport_calls(&self) -> usize {
        self.key_transport.load(Ordering::SeqCst)
    }

    pub fn block_calls(&self) -> usize {
        self.block.load(Ordering::SeqCst)
    }
}

impl CryptoProvider for CountingProvider {
    fn decrypt(
        &self,
        capability: &CipherCapability,
        key: &Key,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        match capability.kind {
            AlgorithmKind::KeyTransport => self.key_transport.fetch_add(1, Ordering::SeqCst),
            _ => self.block.fetch_add(1, Ordering::SeqCst),
        };
        self.inner.decrypt(capability, key, ciphertext)
    }

    fn encrypt(
        &self,
        capability: &CipherCapability,
        key: &Key,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        self.inner.encrypt(capability, key, plaintext)
    }

    fn verify_signature(
        &self,
        capability: &CipherCapability,
        public_key: &PublicKey,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        self.inner
            .verify_signature(capability, public_key, data, signature)
    }
}

/// Key store counting private key lookups
#[derive(Debug)]
pub struct CountingStore {
    inner: InMemoryKeyStore,
    lookups: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: InMemoryKeyStore) -> Self {
        Self {
            inner,
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl KeyStore for CountingStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn lookup_private_key(
        &self,
        public_key: &PublicKey,
        usage: CredentialUsage,
        callback: Option<&dyn CredentialCallback>,
    ) -> wssec_stream::Result<PrivateKey> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup_private_key(public_key, usage, callback)
    }

    fn certificate_by_issuer_serial(&self, issuer: &str, serial: &str) -> Option<Certificate> {
        self.inner.certificate_by_issuer_serial(issuer, serial)
    }

    fn certificate_by_subject_key_id(&self, ski: &[u8]) -> Option<Certificate> {
        self.inner.certificate_by_subject_key_id(ski)
    }
}
