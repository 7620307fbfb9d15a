//! Trust validation
//!
//! A presented identity (certificate chain, leaf first, or a bare public
//! key) is checked against a set of trust anchors. Rejections carry a
//! distinguished [`RejectReason`]; a rejection is a normal outcome, not an
//! error, until the caller decides to turn it into one.

use crate::certificate::{self, Certificate};
use crate::error::{Error, Result};
use crate::key::PublicKey;
use std::fmt;
use tracing::{debug, warn};

/// Why an identity was not trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// The identity's proof (certificate signature) does not verify
    SignatureInvalid,
    /// The chain ends outside the anchor set
    NoTrustPath,
    /// The anchor the chain ends at is expired or otherwise invalid
    AnchorInvalid,
    /// The presented certificate is outside its own validity window
    IdentityExpired,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::SignatureInvalid => "signature or integrity check failed",
            RejectReason::NoTrustPath => "no trust path to any anchor",
            RejectReason::AnchorInvalid => "trust anchor expired or otherwise invalid",
            RejectReason::IdentityExpired => "presented identity outside its validity window",
        };
        f.write_str(text)
    }
}

/// Result of trust validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustOutcome {
    /// The identity chains to a valid anchor
    Accepted,
    /// The identity is not trusted
    Rejected(RejectReason),
}

impl TrustOutcome {
    /// Whether the identity was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, TrustOutcome::Accepted)
    }

    /// Convert a rejection into [`Error::TrustRejected`]
    pub fn into_result(self) -> Result<()> {
        match self {
            TrustOutcome::Accepted => Ok(()),
            TrustOutcome::Rejected(reason) => Err(Error::TrustRejected(reason)),
        }
    }
}

/// Set of trust anchor certificates
#[derive(Debug, Clone, Default)]
pub struct TrustAnchors {
    anchors: Vec<Certificate>,
}

impl TrustAnchors {
    /// Create an empty anchor set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a list of DER certificates
    pub fn from_der_list<'a>(ders: impl IntoIterator<Item = &'a [u8]>) -> Result<Self> {
        let anchors = ders
            .into_iter()
            .map(Certificate::from_der)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { anchors })
    }

    /// Add an anchor (builder form)
    pub fn with_anchor(mut self, anchor: Certificate) -> Self {
        self.anchors.push(anchor);
        self
    }

    /// Add an anchor
    pub fn add(&mut self, anchor: Certificate) {
        self.anchors.push(anchor);
    }

    /// Iterate over the anchors
    pub fn iter(&self) -> impl Iterator<Item = &Certificate> {
        self.anchors.iter()
    }

    /// Number of anchors
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Anchor whose public key equals `key`
    pub fn find_by_public_key(&self, key: &PublicKey) -> Option<&Certificate> {
        self.anchors.iter().find(|a| a.public_key() == key)
    }
}

/// Validates identities against trust anchors
#[derive(Debug, Clone, Copy)]
pub struct TrustValidator {
    at: Option<i64>,
    max_depth: usize,
}

impl Default for TrustValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustValidator {
    /// Validator checking validity windows at the current time
    pub fn new() -> Self {
        Self {
            at: None,
            max_depth: 8,
        }
    }

    /// Check validity windows at `timestamp` (Unix seconds) instead of now
    pub fn at(mut self, timestamp: i64) -> Self {
        self.at = Some(timestamp);
        self
    }

    /// Maximum number of certificates walked before giving up
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn time(&self) -> i64 {
        self.at.unwrap_or_else(certificate::now)
    }

    /// Validate a certificate chain, leaf first
    ///
    /// Intermediates may appear anywhere after the leaf. The walk stops at
    /// the first certificate that is an anchor or is issued by one.
    pub fn validate(&self, chain: &[Certificate], anchors: &TrustAnchors) -> TrustOutcome {
        let outcome = self.walk(chain, anchors);
        match outcome {
            TrustOutcome::Accepted => debug!(
                subject = chain.first().map(Certificate::subject).unwrap_or_default(),
                "identity trusted"
            ),
            TrustOutcome::Rejected(reason) => warn!(
                subject = chain.first().map(Certificate::subject).unwrap_or_default(),
                %reason,
                "identity rejected"
            ),
        }
        outcome
    }

    fn walk(&self, chain: &[Certificate], anchors: &TrustAnchors) -> TrustOutcome {
        let now = self.time();
        let Some(leaf) = chain.first() else {
            return TrustOutcome::Rejected(RejectReason::NoTrustPath);
        };

        let presented_is_anchor = anchors.iter().any(|a| a == leaf);
        if !presented_is_anchor && !leaf.is_valid_at(now) {
            return TrustOutcome::Rejected(RejectReason::IdentityExpired);
        }

        let mut current = leaf;
        for _ in 0..self.max_depth {
            if let Some(anchor) = anchors.iter().find(|a| *a == current) {
                return if anchor.is_valid_at(now) {
                    TrustOutcome::Accepted
                } else {
                    TrustOutcome::Rejected(RejectReason::AnchorInvalid)
                };
            }

            let candidates: Vec<&Certificate> = anchors
                .iter()
                .filter(|a| current.is_issued_by_name(a))
                .collect();
            if !candidates.is_empty() {
                let valid: Vec<&Certificate> =
                    candidates.into_iter().filter(|a| a.is_valid_at(now)).collect();
                if valid.is_empty() {
                    return TrustOutcome::Rejected(RejectReason::AnchorInvalid);
                }
                return if valid.iter().any(|a| current.verify_issued_by(a).is_ok()) {
                    TrustOutcome::Accepted
                } else {
                    TrustOutcome::Rejected(RejectReason::SignatureInvalid)
                };
            }

            if current.is_self_issued() {
                // A root outside the anchor set
                return TrustOutcome::Rejected(RejectReason::NoTrustPath);
            }

            let Some(intermediate) = chain
                .iter()
                .find(|c| *c != current && current.is_issued_by_name(c))
            else {
                return TrustOutcome::Rejected(RejectReason::NoTrustPath);
            };
            if current.verify_issued_by(intermediate).is_err() {
                return TrustOutcome::Rejected(RejectReason::SignatureInvalid);
            }
            if !intermediate.is_valid_at(now) {
                return TrustOutcome::Rejected(RejectReason::IdentityExpired);
            }
            current = intermediate;
        }

        TrustOutcome::Rejected(RejectReason::NoTrustPath)
    }

    /// Validate a bare public key
    ///
    /// A key is trusted only when an anchor certifies exactly that key.
    pub fn validate_public_key(&self, key: &PublicKey, anchors: &TrustAnchors) -> TrustOutcome {
        let outcome = match anchors.find_by_public_key(key) {
            Some(anchor) if anchor.is_valid_at(self.time()) => TrustOutcome::Accepted,
            Some(_) => TrustOutcome::Rejected(RejectReason::AnchorInvalid),
            None => TrustOutcome::Rejected(RejectReason::NoTrustPath),
        };
        if let TrustOutcome::Rejected(reason) = outcome {
            warn!(%reason, "public key rejected");
        }
        outcome
    }
}
