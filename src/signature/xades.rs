//! XAdES signature codec
//!
//! Works on the serialized document without building a DOM: elements are
//! located by local name regardless of namespace prefix, and the timestamp
//! is inserted using the prefix already bound to the XAdES namespace.

use base64::{engine::general_purpose::STANDARD, Engine};

use super::{SignatureCodec, SignatureError};

const SIGNATURE_VALUE: &str = "SignatureValue";
const QUALIFYING_PROPERTIES: &str = "QualifyingProperties";
const UNSIGNED_PROPERTIES: &str = "UnsignedProperties";
const UNSIGNED_SIGNATURE_PROPERTIES: &str = "UnsignedSignatureProperties";
const SIGNATURE_TIMESTAMP: &str = "SignatureTimeStamp";
const ENCAPSULATED_TIMESTAMP: &str = "EncapsulatedTimeStamp";

/// Codec for XAdES signatures
#[derive(Debug, Clone, Copy, Default)]
pub struct XadesSignatureCodec;

impl SignatureCodec for XadesSignatureCodec {
    fn signature_value(&self, signature_xml: &str) -> Result<Vec<u8>, SignatureError> {
        let element = find_element(signature_xml, SIGNATURE_VALUE)?
            .ok_or(SignatureError::MissingElement(SIGNATURE_VALUE))?;
        let value = decode_base64(element.content(signature_xml), SIGNATURE_VALUE)?;
        if value.is_empty() {
            return Err(SignatureError::Malformed("empty SignatureValue".into()));
        }
        Ok(value)
    }

    fn embed_timestamp(
        &self,
        signature_xml: &str,
        token_der: &[u8],
    ) -> Result<String, SignatureError> {
        if find_element(signature_xml, SIGNATURE_TIMESTAMP)?.is_some() {
            return Err(SignatureError::Malformed(
                "signature already carries a timestamp".into(),
            ));
        }

        let encoded = STANDARD.encode(token_der);

        if let Some(usp) = find_element(signature_xml, UNSIGNED_SIGNATURE_PROPERTIES)? {
            let stamp = timestamp_element(usp.prefix(), &encoded);
            return Ok(usp.insert_content(signature_xml, &stamp));
        }

        if let Some(up) = find_element(signature_xml, UNSIGNED_PROPERTIES)? {
            let p = up.prefix();
            let inner = format!(
                "<{p}{usp}>{stamp}</{p}{usp}>",
                usp = UNSIGNED_SIGNATURE_PROPERTIES,
                stamp = timestamp_element(p, &encoded),
            );
            return Ok(up.insert_content(signature_xml, &inner));
        }

        let qp = find_element(signature_xml, QUALIFYING_PROPERTIES)?
            .ok_or(SignatureError::MissingElement(QUALIFYING_PROPERTIES))?;
        let p = qp.prefix();
        let inner = format!(
            "<{p}{up}><{p}{usp}>{stamp}</{p}{usp}></{p}{up}>",
            up = UNSIGNED_PROPERTIES,
            usp = UNSIGNED_SIGNATURE_PROPERTIES,
            stamp = timestamp_element(p, &encoded),
        );
        Ok(qp.insert_content(signature_xml, &inner))
    }

    fn timestamp_token(&self, signature_xml: &str) -> Result<Option<Vec<u8>>, SignatureError> {
        find_element(signature_xml, ENCAPSULATED_TIMESTAMP)?
            .map(|el| decode_base64(el.content(signature_xml), ENCAPSULATED_TIMESTAMP))
            .transpose()
    }
}

fn timestamp_element(prefix: &str, encoded: &str) -> String {
    format!(
        "<{p}{ts}><{p}{ets}>{encoded}</{p}{ets}></{p}{ts}>",
        p = prefix,
        ts = SIGNATURE_TIMESTAMP,
        ets = ENCAPSULATED_TIMESTAMP,
    )
}

fn decode_base64(text: &str, element: &'static str) -> Result<Vec<u8>, SignatureError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| SignatureError::InvalidBase64 {
            element,
            reason: e.to_string(),
        })
}

/// Byte offsets of one element in the document
#[derive(Debug, Clone, Copy)]
struct Element<'a> {
    qname: &'a str,
    start: usize,
    open_end: usize,
    content_end: usize,
    self_closing: bool,
}

impl<'a> Element<'a> {
    /// Namespace prefix including the colon, empty for unprefixed names
    fn prefix(&self) -> &'a str {
        match self.qname.find(':') {
            Some(i) => &self.qname[..=i],
            None => "",
        }
    }

    fn content<'x>(&self, xml: &'x str) -> &'x str {
        &xml[self.open_end..self.content_end]
    }

    /// Copy of `xml` with `inner` appended to the element's content
    fn insert_content(&self, xml: &str, inner: &str) -> String {
        if self.self_closing {
            let open = xml[self.start..self.open_end]
                .trim_end_matches('>')
                .trim_end_matches('/')
                .trim_end();
            format!(
                "{}{}>{}</{}>{}",
                &xml[..self.start],
                open,
                inner,
                self.qname,
                &xml[self.open_end..]
            )
        } else {
            format!(
                "{}{}{}",
                &xml[..self.content_end],
                inner,
                &xml[self.content_end..]
            )
        }
    }
}

/// First element whose local name is `local`
fn find_element<'a>(xml: &'a str, local: &str) -> Result<Option<Element<'a>>, SignatureError> {
    for (start, _) in xml.match_indices('<') {
        let rest = &xml[start + 1..];
        if rest.starts_with(['/', '?', '!']) {
            continue;
        }

        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        let qname = &rest[..name_len];
        let local_name = qname.rsplit(':').next().unwrap_or(qname);
        if local_name != local {
            continue;
        }

        let open_end = xml[start..]
            .find('>')
            .map(|i| start + i + 1)
            .ok_or_else(|| SignatureError::Malformed(format!("unterminated <{}>", qname)))?;

        if xml[..open_end - 1].ends_with('/') {
            return Ok(Some(Element {
                qname,
                start,
                open_end,
                content_end: open_end,
                self_closing: true,
            }));
        }

        let close = format!("</{}>", qname);
        let content_end = xml[open_end..]
            .find(&close)
            .map(|i| open_end + i)
            .ok_or_else(|| SignatureError::Malformed(format!("unclosed <{}>", qname)))?;

        return Ok(Some(Element {
            qname,
            start,
            open_end,
            content_end,
            self_closing: false,
        }));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNATURE: &str = r##"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="signature"><ds:SignedInfo><ds:Reference URI="#message"/></ds:SignedInfo><ds:SignatureValue Id="signature-value">
AQIDBAUG
BwgJ</ds:SignatureValue><ds:Object><xades:QualifyingProperties xmlns:xades="http://uri.etsi.org/01903/v1.3.2#" Target="#signature"><xades:SignedProperties Id="signed-props"/></xades:QualifyingProperties></ds:Object></ds:Signature>"##;

    #[test]
    fn test_signature_value_ignores_line_breaks() {
        let value = XadesSignatureCodec.signature_value(SIGNATURE).unwrap();
        assert_eq!(value, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_signature_value_missing() {
        let err = XadesSignatureCodec
            .signature_value("<ds:Signature/>")
            .unwrap_err();
        assert_eq!(err, SignatureError::MissingElement("SignatureValue"));
    }

    #[test]
    fn test_signature_value_invalid_base64() {
        let err = XadesSignatureCodec
            .signature_value("<SignatureValue>@@@</SignatureValue>")
            .unwrap_err();
        assert!(matches!(err, SignatureError::InvalidBase64 { .. }));
    }

    #[test]
    fn test_embed_creates_unsigned_properties() {
        let token = vec![0x30, 0x03, 0x02, 0x01, 0x01];
        let stamped = XadesSignatureCodec.embed_timestamp(SIGNATURE, &token).unwrap();

        assert!(stamped.contains(
            "<xades:UnsignedProperties><xades:UnsignedSignatureProperties><xades:SignatureTimeStamp>"
        ));
        assert!(stamped.ends_with("</xades:QualifyingProperties></ds:Object></ds:Signature>"));
        assert_eq!(
            XadesSignatureCodec.timestamp_token(&stamped).unwrap(),
            Some(token)
        );
        // the signed part is untouched
        assert_eq!(
            XadesSignatureCodec.signature_value(&stamped).unwrap(),
            XadesSignatureCodec.signature_value(SIGNATURE).unwrap()
        );
    }

    #[test]
    fn test_embed_into_existing_unsigned_signature_properties() {
        let xml = "<QualifyingProperties><UnsignedProperties><UnsignedSignatureProperties><Other/></UnsignedSignatureProperties></UnsignedProperties></QualifyingProperties>";
        let stamped = XadesSignatureCodec.embed_timestamp(xml, &[1, 2]).unwrap();
        assert_eq!(
            stamped,
            "<QualifyingProperties><UnsignedProperties><UnsignedSignatureProperties><Other/><SignatureTimeStamp><EncapsulatedTimeStamp>AQI=</EncapsulatedTimeStamp></SignatureTimeStamp></UnsignedSignatureProperties></UnsignedProperties></QualifyingProperties>"
        );
    }

    #[test]
    fn test_embed_into_self_closing_element() {
        let xml = r#"<x:QualifyingProperties><x:UnsignedProperties Id="u"/></x:QualifyingProperties>"#;
        let stamped = XadesSignatureCodec.embed_timestamp(xml, &[1, 2]).unwrap();
        assert!(stamped.starts_with(
            r#"<x:QualifyingProperties><x:UnsignedProperties Id="u"><x:UnsignedSignatureProperties>"#
        ));
        assert!(stamped.ends_with("</x:UnsignedProperties></x:QualifyingProperties>"));
    }

    #[test]
    fn test_embed_twice_rejected() {
        let stamped = XadesSignatureCodec.embed_timestamp(SIGNATURE, &[1]).unwrap();
        assert!(XadesSignatureCodec.embed_timestamp(&stamped, &[2]).is_err());
    }

    #[test]
    fn test_embed_without_qualifying_properties() {
        let err = XadesSignatureCodec
            .embed_timestamp("<ds:Signature></ds:Signature>", &[1])
            .unwrap_err();
        assert_eq!(err, SignatureError::MissingElement("QualifyingProperties"));
    }

    #[test]
    fn test_no_timestamp_token() {
        assert_eq!(XadesSignatureCodec.timestamp_token(SIGNATURE).unwrap(), None);
    }
}
