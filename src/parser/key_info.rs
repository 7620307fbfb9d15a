//! `ds:KeyInfo`, `ds:KeyValue` and `wsse:BinarySecurityToken`

use super::{XmlElement, local_reference, parse_encrypted_key};
use crate::constants::{BASE64_ENCODING_TYPE, DSIG_NS, WSSE_NS, X509_SKI_TYPE, XENC_NS};
use crate::error::{Error, Result};
use crate::model::{BinarySecurityToken, KeyInfo, KeyValue, RsaKeyValue};

/// Parse a `ds:KeyInfo` element into the first key locator it carries
pub fn parse_key_info(element: &XmlElement) -> Result<KeyInfo> {
    for child in &element.children {
        let name = &child.name;
        if name.is(WSSE_NS, "SecurityTokenReference") {
            return parse_security_token_reference(child);
        } else if name.is(DSIG_NS, "X509Data") {
            return parse_x509_data(child);
        } else if name.is(DSIG_NS, "KeyValue") {
            return Ok(KeyInfo::KeyValue(parse_rsa_key_value(child)?));
        } else if name.is(XENC_NS, "EncryptedKey") {
            return Ok(KeyInfo::EncryptedKey(Box::new(parse_encrypted_key(child)?)));
        }
    }
    Err(Error::structural("KeyInfo", "no supported key reference"))
}

fn parse_security_token_reference(element: &XmlElement) -> Result<KeyInfo> {
    if let Some(reference) = element.child(WSSE_NS, "Reference") {
        return Ok(KeyInfo::DirectReference {
            id: local_reference("Reference", reference.required_attribute("URI")?)?,
            value_type: reference.attribute("ValueType").map(str::to_string),
        });
    }

    if let Some(identifier) = element.child(WSSE_NS, "KeyIdentifier") {
        let value_type = identifier.attribute("ValueType").unwrap_or_default();
        if value_type != X509_SKI_TYPE {
            return Err(Error::structural(
                "KeyIdentifier",
                format!("unsupported key identifier type '{}'", value_type),
            ));
        }
        check_encoding("KeyIdentifier", identifier.attribute("EncodingType"))?;
        return Ok(KeyInfo::SubjectKeyIdentifier(identifier.base64_text()?));
    }

    if let Some(x509) = element.child(DSIG_NS, "X509Data") {
        return parse_x509_data(x509);
    }

    Err(Error::structural(
        "SecurityTokenReference",
        "no Reference, KeyIdentifier or X509Data",
    ))
}

fn parse_x509_data(element: &XmlElement) -> Result<KeyInfo> {
    if let Some(issuer_serial) = element.child(DSIG_NS, "X509IssuerSerial") {
        let issuer = issuer_serial.required_child(DSIG_NS, "X509IssuerName")?.text();
        let serial = issuer_serial.required_child(DSIG_NS, "X509SerialNumber")?.text();
        if serial.is_empty() || !serial.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::structural(
                "X509SerialNumber",
                format!("'{}' is not a decimal serial number", serial),
            ));
        }
        return Ok(KeyInfo::IssuerSerial {
            issuer: issuer.to_string(),
            serial: serial.to_string(),
        });
    }
    if let Some(ski) = element.child(DSIG_NS, "X509SKI") {
        return Ok(KeyInfo::SubjectKeyIdentifier(ski.base64_text()?));
    }
    if let Some(cert) = element.child(DSIG_NS, "X509Certificate") {
        return Ok(KeyInfo::X509Certificate(cert.base64_text()?));
    }
    Err(Error::structural("X509Data", "no supported X.509 reference"))
}

/// Parse the `ds:RSAKeyValue` inside a `ds:KeyValue`
pub fn parse_rsa_key_value(element: &XmlElement) -> Result<RsaKeyValue> {
    let rsa = element.required_child(DSIG_NS, "RSAKeyValue")?;
    let modulus = rsa.required_child(DSIG_NS, "Modulus")?.base64_text()?;
    let exponent = rsa.required_child(DSIG_NS, "Exponent")?.base64_text()?;
    if modulus.is_empty() || exponent.is_empty() {
        return Err(Error::structural("RSAKeyValue", "empty modulus or exponent"));
    }
    Ok(RsaKeyValue { modulus, exponent })
}

/// Parse a `ds:KeyValue` carried directly in the security header
pub fn parse_key_value(element: &XmlElement) -> Result<KeyValue> {
    Ok(KeyValue {
        id: element.id().map(str::to_string),
        rsa: parse_rsa_key_value(element)?,
    })
}

/// Parse a `wsse:BinarySecurityToken`
pub fn parse_binary_security_token(element: &XmlElement) -> Result<BinarySecurityToken> {
    let encoding_type = element.attribute("EncodingType").map(str::to_string);
    check_encoding("BinarySecurityToken", encoding_type.as_deref())?;
    let value = element.base64_text()?;
    if value.is_empty() {
        return Err(Error::structural("BinarySecurityToken", "empty token value"));
    }
    Ok(BinarySecurityToken {
        id: element.id().map(str::to_string),
        value_type: element.attribute("ValueType").map(str::to_string),
        encoding_type,
        value,
    })
}

fn check_encoding(element: &str, encoding_type: Option<&str>) -> Result<()> {
    match encoding_type {
        None => Ok(()),
        Some(t) if t == BASE64_ENCODING_TYPE => Ok(()),
        Some(other) => Err(Error::structural(
            element,
            format!("unsupported encoding type '{}'", other),
        )),
    }
}
