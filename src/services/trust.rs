//! Trusted root CA store for trans-cell token verification.
//!
//! Trans-cell tokens carry their signing certificate chain in the JWT
//! `x5c` header. The store validates that chain against the roots
//! configured for the deployment and hands the leaf's RSA public key
//! back to the token codec.

use x509_parser::certificate::X509Certificate;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::FromDer;
use x509_parser::time::ASN1Time;

use crate::error::BrokerError;

/// Leaf certificate facts the token codec needs after chain validation.
#[derive(Debug, Clone)]
pub struct ChainLeaf {
    /// Subject CN, compared against the token issuer's host.
    pub subject_common_name: Option<String>,
    /// PKCS#1 RSAPublicKey DER, ready for `DecodingKey::from_rsa_der`.
    pub rsa_public_key_der: Vec<u8>,
}

/// Immutable set of trusted root certificates, loaded once at startup.
#[derive(Debug, Default)]
pub struct TrustStore {
    roots: Vec<Vec<u8>>,
}

impl TrustStore {
    /// Load roots from PEM documents. Each document may hold several
    /// certificates. Registering the same certificate twice is a
    /// configuration fault, not something to silently dedup.
    pub fn from_pem_documents(documents: &[String]) -> Result<Self, BrokerError> {
        let mut roots: Vec<Vec<u8>> = Vec::new();
        for doc in documents {
            let mut remaining = doc.as_bytes();
            while remaining.iter().any(|b| !b.is_ascii_whitespace()) {
                let (rest, pem) = parse_x509_pem(remaining).map_err(|e| {
                    BrokerError::TrustConfiguration(format!("root CA PEM unreadable: {e}"))
                })?;
                X509Certificate::from_der(&pem.contents).map_err(|e| {
                    BrokerError::TrustConfiguration(format!("root CA not a certificate: {e}"))
                })?;
                if roots.iter().any(|r| r == &pem.contents) {
                    return Err(BrokerError::TrustConfiguration(
                        "duplicate root CA certificate registered".to_string(),
                    ));
                }
                roots.push(pem.contents);
                remaining = rest;
            }
        }
        if roots.is_empty() {
            return Err(BrokerError::TrustConfiguration(
                "no root CA certificates configured".to_string(),
            ));
        }
        Ok(Self { roots })
    }

    /// Load roots from PEM files on disk.
    pub fn from_paths(paths: &[String]) -> Result<Self, BrokerError> {
        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let doc = std::fs::read_to_string(path).map_err(|e| {
                BrokerError::TrustConfiguration(format!("root CA {path}: {e}"))
            })?;
            documents.push(doc);
        }
        Self::from_pem_documents(&documents)
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Validate an `x5c` chain (leaf first, each cert signed by the
    /// next) at the given instant. The final link must be signed by, or
    /// be, one of the trusted roots. Every certificate in the chain must
    /// be inside its validity window.
    pub fn verify_chain(
        &self,
        chain_der: &[Vec<u8>],
        now_epoch: i64,
    ) -> Result<ChainLeaf, BrokerError> {
        if chain_der.is_empty() {
            return Err(BrokerError::TokenSignatureInvalid);
        }
        let now =
            ASN1Time::from_timestamp(now_epoch).map_err(|_| BrokerError::TokenSignatureInvalid)?;

        let mut certs = Vec::with_capacity(chain_der.len());
        for der in chain_der {
            let (_, cert) =
                X509Certificate::from_der(der).map_err(|_| BrokerError::TokenSignatureInvalid)?;
            if !cert.validity().is_valid_at(now) {
                return Err(BrokerError::TokenSignatureInvalid);
            }
            certs.push(cert);
        }

        for i in 0..certs.len() - 1 {
            certs[i]
                .verify_signature(Some(certs[i + 1].public_key()))
                .map_err(|_| BrokerError::TokenSignatureInvalid)?;
        }

        let last_idx = certs.len() - 1;
        let anchored = self.is_trusted_root(&chain_der[last_idx])
            || self.signed_by_trusted_root(&certs[last_idx], now)?;
        if !anchored {
            return Err(BrokerError::TokenSignatureInvalid);
        }

        let leaf = &certs[0];
        let subject_common_name = leaf
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);
        let rsa_public_key_der = leaf.public_key().subject_public_key.data.to_vec();
        Ok(ChainLeaf {
            subject_common_name,
            rsa_public_key_der,
        })
    }

    fn is_trusted_root(&self, der: &[u8]) -> bool {
        self.roots.iter().any(|r| r == der)
    }

    fn signed_by_trusted_root(
        &self,
        cert: &X509Certificate<'_>,
        now: ASN1Time,
    ) -> Result<bool, BrokerError> {
        for root_der in &self.roots {
            let (_, root) = X509Certificate::from_der(root_der)
                .map_err(|e| BrokerError::TrustConfiguration(e.to_string()))?;
            if !root.validity().is_valid_at(now) {
                continue;
            }
            if cert.issuer() == root.subject()
                && cert.verify_signature(Some(root.public_key())).is_ok()
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
