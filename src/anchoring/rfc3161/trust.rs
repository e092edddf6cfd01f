//! TSA signer certificate resolution

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use der::asn1::OctetString;
use der::Decode;
use x509_cert::Certificate;

use crate::anchoring::error::AnchorError;
use crate::anchoring::rfc3161::asn1::SignerIdentifier;

/// Resolves the certificate that signed a timestamp token
pub trait TsaTrustProvider: Send + Sync {
    /// Returns the trusted certificate identified by `sid`
    ///
    /// `embedded` holds the certificates carried by the token itself;
    /// `at` is the token's genTime.
    fn resolve_signer(
        &self,
        sid: &SignerIdentifier,
        embedded: &[Certificate],
        at: DateTime<Utc>,
    ) -> Result<Certificate, AnchorError>;
}

/// Trust store pinning the certificates of the configured TSAs
#[derive(Debug, Clone, Default)]
pub struct PinnedTrustStore {
    certs: Vec<Certificate>,
}

impl PinnedTrustStore {
    pub fn new(certs: Vec<Certificate>) -> Self {
        Self { certs }
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self, AnchorError> {
        let certs = Certificate::load_pem_chain(pem)
            .map_err(|e| AnchorError::NotConfigured(format!("invalid TSA certificate PEM: {}", e)))?;
        Ok(Self::new(certs))
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, AnchorError> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|e| {
            AnchorError::NotConfigured(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_pem(&pem)
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }
}

impl TsaTrustProvider for PinnedTrustStore {
    fn resolve_signer(
        &self,
        sid: &SignerIdentifier,
        embedded: &[Certificate],
        at: DateTime<Utc>,
    ) -> Result<Certificate, AnchorError> {
        let pinned = self.certs.iter().find(|c| identifies(sid, c));
        let carried = embedded.iter().find(|c| identifies(sid, c));

        match (pinned, carried) {
            (Some(trusted), Some(carried)) if trusted != carried => Err(AnchorError::UntrustedTsa(
                format!(
                    "embedded certificate of {} differs from the trusted one",
                    carried.tbs_certificate.subject
                ),
            )),
            (Some(trusted), _) => {
                check_validity(trusted, at)?;
                Ok(trusted.clone())
            }
            (None, Some(carried)) => Err(AnchorError::UntrustedTsa(
                carried.tbs_certificate.subject.to_string(),
            )),
            (None, None) => Err(AnchorError::SignerNotFound(describe(sid))),
        }
    }
}

fn identifies(sid: &SignerIdentifier, cert: &Certificate) -> bool {
    let tbs = &cert.tbs_certificate;
    match sid {
        SignerIdentifier::IssuerAndSerialNumber(isn) => {
            tbs.issuer == isn.issuer && tbs.serial_number == isn.serial_number
        }
        SignerIdentifier::SubjectKeyIdentifier(ski) => subject_key_identifier(cert)
            .map(|id| id.as_bytes() == ski.as_bytes())
            .unwrap_or(false),
    }
}

fn subject_key_identifier(cert: &Certificate) -> Option<OctetString> {
    cert.tbs_certificate
        .extensions
        .as_ref()?
        .iter()
        .find(|ext| ext.extn_id == const_oid::db::rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER)
        .and_then(|ext| OctetString::from_der(ext.extn_value.as_bytes()).ok())
}

fn check_validity(cert: &Certificate, at: DateTime<Utc>) -> Result<(), AnchorError> {
    let validity = &cert.tbs_certificate.validity;
    let at = Duration::from_secs(at.timestamp().max(0) as u64);
    if at < validity.not_before.to_unix_duration() || at > validity.not_after.to_unix_duration() {
        return Err(AnchorError::UntrustedTsa(format!(
            "certificate of {} is not valid at genTime",
            cert.tbs_certificate.subject
        )));
    }
    Ok(())
}

fn describe(sid: &SignerIdentifier) -> String {
    match sid {
        SignerIdentifier::IssuerAndSerialNumber(isn) => {
            format!("issuer {} serial {}", isn.issuer, isn.serial_number)
        }
        SignerIdentifier::SubjectKeyIdentifier(ski) => {
            format!("key identifier {}", hex::encode(ski.as_bytes()))
        }
    }
}
