//! TimeStampToken parsing and response validation

use chrono::{DateTime, Utc};
use der::asn1::{ObjectIdentifier, OctetString};
use der::{Decode, Encode, Tag, Tagged};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::attr::Attribute;
use x509_cert::Certificate;

use crate::anchoring::error::AnchorError;
use crate::anchoring::rfc3161::asn1::{
    status_text, to_any, ContentInfo, SignedData, SignerIdentifier, SignerInfo, TimeStampReq,
    TimeStampResp, TstInfo, ID_CT_TST_INFO,
};
use crate::hashchain::DigestAlgorithm;

/// id-messageDigest: 1.2.840.113549.1.9.4
const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

/// Signature families a TSA signer may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignatureKind {
    RsaPkcs1v15,
    EcdsaP256,
}

/// Resolves a SignerInfo signatureAlgorithm, with the digest it implies
fn signature_kind(oid: &ObjectIdentifier) -> Option<(SignatureKind, Option<DigestAlgorithm>)> {
    const KINDS: [(ObjectIdentifier, SignatureKind, Option<DigestAlgorithm>); 8] = [
        (RSA_ENCRYPTION, SignatureKind::RsaPkcs1v15, None),
        (SHA256_WITH_RSA, SignatureKind::RsaPkcs1v15, Some(DigestAlgorithm::Sha256)),
        (SHA384_WITH_RSA, SignatureKind::RsaPkcs1v15, Some(DigestAlgorithm::Sha384)),
        (SHA512_WITH_RSA, SignatureKind::RsaPkcs1v15, Some(DigestAlgorithm::Sha512)),
        (ID_EC_PUBLIC_KEY, SignatureKind::EcdsaP256, None),
        (ECDSA_WITH_SHA256, SignatureKind::EcdsaP256, Some(DigestAlgorithm::Sha256)),
        (ECDSA_WITH_SHA384, SignatureKind::EcdsaP256, Some(DigestAlgorithm::Sha384)),
        (ECDSA_WITH_SHA512, SignatureKind::EcdsaP256, Some(DigestAlgorithm::Sha512)),
    ];
    KINDS
        .iter()
        .find(|(known, _, _)| known == oid)
        .map(|(_, kind, digest)| (*kind, *digest))
}

fn bad_signature() -> AnchorError {
    AnchorError::TokenInvalid("signature does not verify against signer certificate".into())
}

fn verify_rsa(
    spki_der: &[u8],
    algorithm: DigestAlgorithm,
    hashed: &[u8],
    signature: &[u8],
) -> Result<(), AnchorError> {
    let key = RsaPublicKey::from_public_key_der(spki_der)
        .map_err(|e| AnchorError::TokenInvalid(format!("signer key is not RSA: {}", e)))?;
    let scheme = match algorithm {
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    };
    key.verify(scheme, hashed, signature)
        .map_err(|_| bad_signature())
}

fn verify_ecdsa_p256(spki_der: &[u8], hashed: &[u8], signature: &[u8]) -> Result<(), AnchorError> {
    let key = p256::ecdsa::VerifyingKey::from_public_key_der(spki_der)
        .map_err(|e| AnchorError::TokenInvalid(format!("signer key is not P-256: {}", e)))?;
    let signature = p256::ecdsa::Signature::from_der(signature)
        .map_err(|e| AnchorError::TokenInvalid(format!("malformed ECDSA signature: {}", e)))?;
    key.verify_prehash(hashed, &signature)
        .map_err(|_| bad_signature())
}

/// Parsed RFC 3161 TimeStampToken
#[derive(Debug, Clone)]
pub struct TimeStampToken {
    der: Vec<u8>,
    signed_data: SignedData,
    tst_info: TstInfo,
}

impl TimeStampToken {
    pub fn from_der(der: &[u8]) -> Result<Self, AnchorError> {
        let content_info = ContentInfo::from_der(der)
            .map_err(|e| AnchorError::TokenInvalid(format!("not a ContentInfo: {}", e)))?;
        if content_info.content_type != const_oid::db::rfc5911::ID_SIGNED_DATA {
            return Err(AnchorError::TokenInvalid(format!(
                "unexpected content type {}",
                content_info.content_type
            )));
        }

        let signed_data = SignedData::from_der(&content_info.content.to_der()?)
            .map_err(|e| AnchorError::TokenInvalid(format!("not a SignedData: {}", e)))?;

        let encap = &signed_data.encap_content_info;
        if encap.econtent_type != ID_CT_TST_INFO {
            return Err(AnchorError::TokenInvalid(format!(
                "unexpected encapsulated content type {}",
                encap.econtent_type
            )));
        }
        let econtent = encap
            .econtent
            .as_ref()
            .ok_or_else(|| AnchorError::TokenInvalid("TSTInfo content missing".into()))?;
        let tst_info = TstInfo::from_der(econtent.as_bytes())
            .map_err(|e| AnchorError::TokenInvalid(format!("invalid TSTInfo: {}", e)))?;

        Ok(Self {
            der: der.to_vec(),
            signed_data,
            tst_info,
        })
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    pub fn into_der(self) -> Vec<u8> {
        self.der
    }

    pub fn tst_info(&self) -> &TstInfo {
        &self.tst_info
    }

    pub fn gen_time(&self) -> Result<DateTime<Utc>, AnchorError> {
        self.tst_info.gen_time()
    }

    pub fn signer_infos(&self) -> Result<Vec<SignerInfo>, AnchorError> {
        self.signed_data
            .signer_infos
            .iter()
            .map(|any| Ok(SignerInfo::from_der(&any.to_der()?)?))
            .collect()
    }

    /// Identifier of the single signer of the token
    pub fn signer_identifier(&self) -> Result<SignerIdentifier, AnchorError> {
        let mut infos = self.signer_infos()?;
        if infos.len() != 1 {
            return Err(AnchorError::TokenInvalid(format!(
                "expected exactly one signer, found {}",
                infos.len()
            )));
        }
        Ok(infos.remove(0).sid)
    }

    /// Certificates embedded in the SignedData, other certificate choices skipped
    pub fn certificates(&self) -> Result<Vec<Certificate>, AnchorError> {
        let Some(certs) = &self.signed_data.certificates else {
            return Ok(Vec::new());
        };
        certs
            .iter()
            .filter(|any| any.tag() == Tag::Sequence)
            .map(|any| Ok(Certificate::from_der(&any.to_der()?)?))
            .collect()
    }

    /// Checks the signed messageDigest attribute against the TSTInfo content
    pub fn verify_content_digest(&self) -> Result<(), AnchorError> {
        let econtent = self
            .signed_data
            .encap_content_info
            .econtent
            .as_ref()
            .ok_or_else(|| AnchorError::TokenInvalid("TSTInfo content missing".into()))?;

        for info in self.signer_infos()? {
            let algorithm = DigestAlgorithm::from_oid(&info.digest_algorithm.oid).ok_or_else(|| {
                AnchorError::TokenInvalid(format!(
                    "unsupported signer digest algorithm {}",
                    info.digest_algorithm.oid
                ))
            })?;
            let signed_attrs = info
                .signed_attrs
                .as_ref()
                .ok_or_else(|| AnchorError::TokenInvalid("signed attributes missing".into()))?;

            let mut message_digest = None;
            for any in signed_attrs.iter() {
                let attr = Attribute::from_der(&any.to_der()?)?;
                if attr.oid == ID_MESSAGE_DIGEST {
                    let value = attr.values.iter().next().ok_or_else(|| {
                        AnchorError::TokenInvalid("empty messageDigest attribute".into())
                    })?;
                    message_digest = Some(OctetString::from_der(&value.to_der()?)?);
                }
            }

            let message_digest = message_digest.ok_or_else(|| {
                AnchorError::TokenInvalid("messageDigest attribute missing".into())
            })?;
            if message_digest.as_bytes() != algorithm.digest(econtent.as_bytes()).as_slice() {
                return Err(AnchorError::TokenInvalid(
                    "messageDigest does not match TSTInfo".into(),
                ));
            }
        }
        Ok(())
    }

    /// Verifies the SignerInfo signature with the public key of `signer`
    ///
    /// The signature covers the DER of the signed attributes re-tagged as
    /// SET OF, and those attributes carry the messageDigest checked by
    /// [`Self::verify_content_digest`].
    pub fn verify_signature(&self, signer: &Certificate) -> Result<(), AnchorError> {
        let mut infos = self.signer_infos()?;
        if infos.len() != 1 {
            return Err(AnchorError::TokenInvalid(format!(
                "expected exactly one signer, found {}",
                infos.len()
            )));
        }
        let info = infos.remove(0);

        let algorithm = DigestAlgorithm::from_oid(&info.digest_algorithm.oid).ok_or_else(|| {
            AnchorError::TokenInvalid(format!(
                "unsupported signer digest algorithm {}",
                info.digest_algorithm.oid
            ))
        })?;
        let (kind, implied) = signature_kind(&info.signature_algorithm.oid).ok_or_else(|| {
            AnchorError::TokenInvalid(format!(
                "unsupported signature algorithm {}",
                info.signature_algorithm.oid
            ))
        })?;
        if implied.is_some_and(|implied| implied != algorithm) {
            return Err(AnchorError::TokenInvalid(format!(
                "signature algorithm {} disagrees with digest {}",
                info.signature_algorithm.oid,
                algorithm.name()
            )));
        }

        let signed_attrs = info
            .signed_attrs
            .as_ref()
            .ok_or_else(|| AnchorError::TokenInvalid("signed attributes missing".into()))?;
        let hashed = algorithm.digest(&signed_attrs.to_der()?);

        let spki_der = signer.tbs_certificate.subject_public_key_info.to_der()?;
        let signature = info.signature.as_bytes();
        match kind {
            SignatureKind::RsaPkcs1v15 => verify_rsa(&spki_der, algorithm, &hashed, signature),
            SignatureKind::EcdsaP256 => verify_ecdsa_p256(&spki_der, &hashed, signature),
        }
    }

    /// DER of this token with `cert` added to its certificate set
    ///
    /// Returns the original encoding when the certificate is already present.
    pub fn with_certificate(&self, cert: &Certificate) -> Result<Vec<u8>, AnchorError> {
        if self.certificates()?.iter().any(|c| c == cert) {
            return Ok(self.der.clone());
        }

        let mut signed_data = self.signed_data.clone();
        let mut certs = signed_data.certificates.take().unwrap_or_default();
        certs.push(to_any(cert)?);
        signed_data.certificates = Some(certs);

        let content_info = ContentInfo {
            content_type: const_oid::db::rfc5911::ID_SIGNED_DATA,
            content: to_any(&signed_data)?,
        };
        Ok(content_info.to_der()?)
    }
}

/// Checks that `response` answers `request` and extracts its token
///
/// Accepts PKIStatus granted and grantedWithMods only. The token must carry
/// a version 1 TSTInfo whose message imprint and nonce echo the request, and
/// whose signed messageDigest covers the TSTInfo.
pub fn validate_response(
    request: &TimeStampReq,
    response: &TimeStampResp,
) -> Result<TimeStampToken, AnchorError> {
    let status = response.status.status;
    if status > 1 {
        return Err(AnchorError::Rejected {
            status,
            text: status_text(&response.status),
        });
    }

    let token_any = response
        .time_stamp_token
        .as_ref()
        .ok_or_else(|| AnchorError::InvalidResponse("granted response without token".into()))?;
    let token = TimeStampToken::from_der(&token_any.to_der()?)?;
    let tst = token.tst_info();

    if tst.version != 1 {
        return Err(AnchorError::TokenInvalid(format!(
            "unsupported TSTInfo version {}",
            tst.version
        )));
    }

    let requested = &request.message_imprint;
    if tst.message_imprint.hash_algorithm.oid != requested.hash_algorithm.oid {
        return Err(AnchorError::BindingMismatch(format!(
            "digest algorithm {} instead of {}",
            tst.message_imprint.hash_algorithm.oid, requested.hash_algorithm.oid
        )));
    }
    if tst.message_imprint.hashed_message != requested.hashed_message {
        return Err(AnchorError::BindingMismatch("message imprint differs".into()));
    }

    match (&request.nonce, &tst.nonce) {
        (Some(sent), Some(received)) if sent.as_bytes() == received.as_bytes() => {}
        (Some(_), _) => return Err(AnchorError::BindingMismatch("nonce differs".into())),
        (None, _) => {}
    }

    if let Some(policy) = &request.req_policy {
        if &tst.policy != policy {
            return Err(AnchorError::BindingMismatch(format!(
                "policy {} instead of {}",
                tst.policy, policy
            )));
        }
    }

    token.verify_content_digest()?;
    token.gen_time()?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchoring::rfc3161::asn1::{build_timestamp_request, parse_timestamp_response};
    use der::asn1::OctetString;

    const FIXTURE_DATA: &[u8] = b"msglog-timestamper fixture digest";
    const NONCE_WITH_CERT: u64 = 0x550C_B868_70F5_7784;
    const NONCE_WITHOUT_CERT: u64 = 0x76D9_CD6A_08F1_7A6C;

    fn with_cert() -> TimeStampResp {
        parse_timestamp_response(include_bytes!("../../../tests/data/response_with_cert.tsr"))
            .unwrap()
    }

    fn without_cert() -> TimeStampResp {
        parse_timestamp_response(include_bytes!(
            "../../../tests/data/response_without_cert.tsr"
        ))
        .unwrap()
    }

    fn signer_cert() -> Certificate {
        Certificate::load_pem_chain(include_bytes!("../../../tests/data/tsa_signer.pem"))
            .unwrap()
            .remove(0)
    }

    fn other_cert() -> Certificate {
        Certificate::load_pem_chain(include_bytes!("../../../tests/data/other_tsa.pem"))
            .unwrap()
            .remove(0)
    }

    /// Fixture response with the last signature byte flipped
    fn with_cert_bad_signature() -> TimeStampResp {
        let mut der = include_bytes!("../../../tests/data/response_with_cert.tsr").to_vec();
        if let Some(last) = der.last_mut() {
            *last ^= 0x01;
        }
        parse_timestamp_response(&der).unwrap()
    }

    fn request(nonce: u64) -> TimeStampReq {
        build_timestamp_request(DigestAlgorithm::Sha512, FIXTURE_DATA, Some(nonce)).unwrap()
    }

    #[test]
    fn test_validate_fixture_response() {
        let token = validate_response(&request(NONCE_WITH_CERT), &with_cert()).unwrap();
        let tst = token.tst_info();
        assert_eq!(tst.policy.to_string(), "1.2.3.4.1");
        assert!(tst.ordering);
        let accuracy = tst.accuracy.as_ref().unwrap();
        assert_eq!(accuracy.seconds, Some(1));
        assert_eq!(accuracy.millis, Some(500));
        assert_eq!(accuracy.micros, Some(100));
        assert_eq!(token.gen_time().unwrap().timestamp(), 1_792_368_010);
    }

    #[test]
    fn test_embedded_certificate_is_signer() {
        let token = validate_response(&request(NONCE_WITH_CERT), &with_cert()).unwrap();
        let certs = token.certificates().unwrap();
        assert!(certs.contains(&signer_cert()));
        assert!(matches!(
            token.signer_identifier().unwrap(),
            SignerIdentifier::IssuerAndSerialNumber(_)
        ));
    }

    #[test]
    fn test_signature_verifies_with_signer_certificate() {
        let token = validate_response(&request(NONCE_WITH_CERT), &with_cert()).unwrap();
        token.verify_signature(&signer_cert()).unwrap();

        let token = validate_response(&request(NONCE_WITHOUT_CERT), &without_cert()).unwrap();
        token.verify_signature(&signer_cert()).unwrap();
    }

    #[test]
    fn test_flipped_signature_byte_rejected() {
        // structure and messageDigest are intact, only the signature is wrong
        let token =
            validate_response(&request(NONCE_WITH_CERT), &with_cert_bad_signature()).unwrap();
        let err = token.verify_signature(&signer_cert()).unwrap_err();
        assert_eq!(err, bad_signature());
        assert_eq!(err.error_code(), "TSA_TOKEN_INVALID");
    }

    #[test]
    fn test_signature_rejected_for_other_key() {
        let token = validate_response(&request(NONCE_WITH_CERT), &with_cert()).unwrap();
        let err = token.verify_signature(&other_cert()).unwrap_err();
        assert!(matches!(err, AnchorError::TokenInvalid(_)));
    }

    #[test]
    fn test_signature_kind_resolution() {
        assert_eq!(
            signature_kind(&RSA_ENCRYPTION),
            Some((SignatureKind::RsaPkcs1v15, None))
        );
        assert_eq!(
            signature_kind(&ECDSA_WITH_SHA384),
            Some((SignatureKind::EcdsaP256, Some(DigestAlgorithm::Sha384)))
        );
        assert_eq!(signature_kind(&ID_MESSAGE_DIGEST), None);
    }

    #[test]
    fn test_nonce_mismatch_rejected() {
        let err = validate_response(&request(NONCE_WITH_CERT), &without_cert()).unwrap_err();
        assert_eq!(err, AnchorError::BindingMismatch("nonce differs".into()));
    }

    #[test]
    fn test_imprint_mismatch_rejected() {
        let req =
            build_timestamp_request(DigestAlgorithm::Sha512, b"other data", Some(NONCE_WITH_CERT))
                .unwrap();
        let err = validate_response(&req, &with_cert()).unwrap_err();
        assert!(matches!(err, AnchorError::BindingMismatch(_)));
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let req =
            build_timestamp_request(DigestAlgorithm::Sha256, FIXTURE_DATA, Some(NONCE_WITH_CERT))
                .unwrap();
        let err = validate_response(&req, &with_cert()).unwrap_err();
        assert!(matches!(err, AnchorError::BindingMismatch(_)));
    }

    #[test]
    fn test_rejected_status() {
        let mut resp = with_cert();
        resp.status.status = 2;
        resp.status.status_string = Some(vec!["policy not supported".into()]);
        let err = validate_response(&request(NONCE_WITH_CERT), &resp).unwrap_err();
        assert_eq!(
            err,
            AnchorError::Rejected {
                status: 2,
                text: "rejection: policy not supported".into()
            }
        );
    }

    #[test]
    fn test_granted_with_mods_accepted() {
        let mut resp = with_cert();
        resp.status.status = 1;
        assert!(validate_response(&request(NONCE_WITH_CERT), &resp).is_ok());
    }

    #[test]
    fn test_missing_token_rejected() {
        let mut resp = with_cert();
        resp.time_stamp_token = None;
        let err = validate_response(&request(NONCE_WITH_CERT), &resp).unwrap_err();
        assert!(matches!(err, AnchorError::InvalidResponse(_)));
    }

    #[test]
    fn test_tampered_tst_info_fails_digest_check() {
        let token = validate_response(&request(NONCE_WITH_CERT), &with_cert()).unwrap();
        let mut signed_data = token.signed_data.clone();
        let mut tst = token.tst_info().clone();
        tst.ordering = false;
        signed_data.encap_content_info.econtent =
            Some(OctetString::new(tst.to_der().unwrap()).unwrap());
        let content_info = ContentInfo {
            content_type: const_oid::db::rfc5911::ID_SIGNED_DATA,
            content: to_any(&signed_data).unwrap(),
        };
        let tampered = TimeStampToken::from_der(&content_info.to_der().unwrap()).unwrap();
        assert!(matches!(
            tampered.verify_content_digest().unwrap_err(),
            AnchorError::TokenInvalid(_)
        ));
    }

    #[test]
    fn test_with_certificate_embeds_missing_signer() {
        let token = validate_response(&request(NONCE_WITHOUT_CERT), &without_cert()).unwrap();
        assert!(token.certificates().unwrap().is_empty());

        let der = token.with_certificate(&signer_cert()).unwrap();
        let rebuilt = TimeStampToken::from_der(&der).unwrap();
        assert_eq!(rebuilt.certificates().unwrap(), vec![signer_cert()]);
        assert_eq!(rebuilt.tst_info(), token.tst_info());
        rebuilt.verify_content_digest().unwrap();
        rebuilt.verify_signature(&signer_cert()).unwrap();
    }

    #[test]
    fn test_with_certificate_keeps_der_when_present() {
        let token = validate_response(&request(NONCE_WITH_CERT), &with_cert()).unwrap();
        let der = token.with_certificate(&signer_cert()).unwrap();
        assert_eq!(der, token.as_der());
    }

    #[test]
    fn test_not_signed_data_rejected() {
        let content_info = ContentInfo {
            content_type: const_oid::db::rfc5911::ID_DATA,
            content: to_any(&OctetString::new(vec![1]).unwrap()).unwrap(),
        };
        let err = TimeStampToken::from_der(&content_info.to_der().unwrap()).unwrap_err();
        assert!(matches!(err, AnchorError::TokenInvalid(_)));
    }
}
