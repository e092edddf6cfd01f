//! ASN.1 encoding/decoding for RFC 3161

use chrono::{DateTime, NaiveDateTime, Utc};
use der::asn1::{Any, BitString, Int, ObjectIdentifier, OctetString, Uint};
use der::{
    Choice, Decode, DecodeValue, Encode, EncodeValue, FixedTag, Header, Length, Reader, Sequence,
    Tag, Tagged, Writer,
};
use spki::AlgorithmIdentifierOwned;
use x509_cert::ext::Extensions;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::anchoring::error::AnchorError;
use crate::hashchain::DigestAlgorithm;

/// id-ct-TSTInfo: 1.2.840.113549.1.9.16.1.4
pub const ID_CT_TST_INFO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4");

/// SET OF kept in received order
///
/// CMS producers routinely emit certificate and attribute sets that are not
/// DER sorted, or that repeat an element. Decoding must accept those and
/// re-encoding must reproduce the same bytes, since the signature covers
/// the signed attributes exactly as received.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UnorderedSet(pub Vec<Any>);

impl UnorderedSet {
    pub fn iter(&self) -> impl Iterator<Item = &Any> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, item: Any) {
        self.0.push(item);
    }
}

impl<'a> DecodeValue<'a> for UnorderedSet {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> der::Result<Self> {
        reader.read_nested(header.length, |reader| {
            let mut items = Vec::new();
            while !reader.is_finished() {
                items.push(Any::decode(reader)?);
            }
            Ok(Self(items))
        })
    }
}

impl EncodeValue for UnorderedSet {
    fn value_len(&self) -> der::Result<Length> {
        self.0
            .iter()
            .try_fold(Length::ZERO, |len, item| len + item.encoded_len()?)
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        for item in &self.0 {
            item.encode(writer)?;
        }
        Ok(())
    }
}

impl FixedTag for UnorderedSet {
    const TAG: Tag = Tag::Set;
}

/// MessageImprint structure
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct MessageImprint {
    pub hash_algorithm: AlgorithmIdentifierOwned,
    pub hashed_message: OctetString,
}

/// TimeStampReq
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampReq {
    pub version: u8,
    pub message_imprint: MessageImprint,
    pub req_policy: Option<ObjectIdentifier>,
    pub nonce: Option<Uint>,
    #[asn1(default = "Default::default")]
    pub cert_req: bool,
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub extensions: Option<Extensions>,
}

/// PKIStatusInfo structure
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PkiStatusInfo {
    pub status: u8,
    pub status_string: Option<Vec<String>>,
    pub fail_info: Option<BitString>,
}

/// TimeStampResp
///
/// The token is kept as raw `ContentInfo` so that its DER encoding survives
/// untouched until it is re-encoded on purpose.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampResp {
    pub status: PkiStatusInfo,
    pub time_stamp_token: Option<Any>,
}

/// CMS ContentInfo
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct ContentInfo {
    pub content_type: ObjectIdentifier,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT")]
    pub content: Any,
}

/// CMS SignedData
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SignedData {
    pub version: u8,
    pub digest_algorithms: UnorderedSet,
    pub encap_content_info: EncapsulatedContentInfo,
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub certificates: Option<UnorderedSet>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub crls: Option<UnorderedSet>,
    pub signer_infos: UnorderedSet,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct EncapsulatedContentInfo {
    pub econtent_type: ObjectIdentifier,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub econtent: Option<OctetString>,
}

/// CMS SignerInfo
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SignerInfo {
    pub version: u8,
    pub sid: SignerIdentifier,
    pub digest_algorithm: AlgorithmIdentifierOwned,
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub signed_attrs: Option<UnorderedSet>,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    pub signature: OctetString,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub unsigned_attrs: Option<UnorderedSet>,
}

/// Identifies the certificate of the token signer
#[derive(Clone, Debug, Eq, PartialEq, Choice)]
pub enum SignerIdentifier {
    IssuerAndSerialNumber(IssuerAndSerialNumber),
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT")]
    SubjectKeyIdentifier(OctetString),
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct IssuerAndSerialNumber {
    pub issuer: Name,
    pub serial_number: SerialNumber,
}

/// TSTInfo
///
/// `gen_time` is decoded as a raw value: TSAs may emit fractional seconds,
/// which strict DER GeneralizedTime decoding rejects.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TstInfo {
    pub version: u8,
    pub policy: ObjectIdentifier,
    pub message_imprint: MessageImprint,
    pub serial_number: Int,
    pub gen_time: Any,
    pub accuracy: Option<Accuracy>,
    #[asn1(default = "Default::default")]
    pub ordering: bool,
    pub nonce: Option<Uint>,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub tsa: Option<Any>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub extensions: Option<Extensions>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct Accuracy {
    pub seconds: Option<u32>,
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub millis: Option<u16>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub micros: Option<u16>,
}

impl TstInfo {
    /// Parses genTime, accepting optional fractional seconds
    pub fn gen_time(&self) -> Result<DateTime<Utc>, AnchorError> {
        if self.gen_time.tag() != Tag::GeneralizedTime {
            return Err(AnchorError::TokenInvalid(format!(
                "genTime has unexpected tag {}",
                self.gen_time.tag()
            )));
        }
        let text = std::str::from_utf8(self.gen_time.value())
            .map_err(|e| AnchorError::TokenInvalid(format!("genTime is not ASCII: {}", e)))?;
        let naive = NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S%.fZ")
            .map_err(|e| AnchorError::TokenInvalid(format!("invalid genTime {}: {}", text, e)))?;
        Ok(naive.and_utc())
    }
}

/// Build RFC 3161 TimeStampReq over `data`
///
/// The message imprint is `algorithm(data)`.
pub fn build_timestamp_request(
    algorithm: DigestAlgorithm,
    data: &[u8],
    nonce: Option<u64>,
) -> Result<TimeStampReq, AnchorError> {
    let nonce = nonce
        .map(|n| Uint::new(&n.to_be_bytes()))
        .transpose()?;

    Ok(TimeStampReq {
        version: 1,
        message_imprint: MessageImprint {
            hash_algorithm: algorithm.algorithm_identifier(),
            hashed_message: OctetString::new(algorithm.digest(data))?,
        },
        req_policy: None,
        nonce,
        cert_req: true,
        extensions: None,
    })
}

/// Parse RFC 3161 TimeStampResp (DER encoded)
pub fn parse_timestamp_response(der: &[u8]) -> Result<TimeStampResp, AnchorError> {
    TimeStampResp::from_der(der).map_err(|e| AnchorError::InvalidResponse(e.to_string()))
}

/// Human-readable form of a PKIStatusInfo
pub fn status_text(info: &PkiStatusInfo) -> String {
    let name = match info.status {
        0 => "granted",
        1 => "grantedWithMods",
        2 => "rejection",
        3 => "waiting",
        4 => "revocationWarning",
        5 => "revocationNotification",
        _ => "unknown",
    };

    match &info.status_string {
        Some(texts) if !texts.is_empty() => format!("{}: {}", name, texts.join("; ")),
        _ => name.to_string(),
    }
}

/// Re-encodes a DER value as `Any`
pub(crate) fn to_any<T: Encode>(value: &T) -> Result<Any, AnchorError> {
    Ok(Any::from_der(&value.to_der()?)?)
}
