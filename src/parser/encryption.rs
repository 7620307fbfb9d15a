//! `xenc:EncryptedKey`, `xenc:EncryptedData` and `xenc:ReferenceList`

use super::{XmlElement, local_reference, parse_key_info};
use crate::constants::{DSIG_NS, XENC11_NS, XENC_NS};
use crate::error::{Error, Result};
use crate::model::{EncryptedData, EncryptedKey, EncryptionMethod, ReferenceList};

/// Parse an `xenc:EncryptedKey` element
pub fn parse_encrypted_key(element: &XmlElement) -> Result<EncryptedKey> {
    expect_name(element, "EncryptedKey")?;

    let encryption_method = parse_encryption_method(element)?;
    let key_info = element
        .child(DSIG_NS, "KeyInfo")
        .map(parse_key_info)
        .transpose()?;
    let cipher_value = parse_cipher_value(element)?;
    if cipher_value.is_empty() {
        return Err(Error::structural("EncryptedKey", "empty CipherValue"));
    }
    let reference_list = element
        .child(XENC_NS, "ReferenceList")
        .map(parse_reference_list)
        .transpose()?;
    let carried_key_name = element
        .child(XENC_NS, "CarriedKeyName")
        .map(|c| c.text().to_string());

    Ok(EncryptedKey {
        id: element.id().map(str::to_string),
        encryption_method,
        key_info,
        cipher_value,
        reference_list,
        carried_key_name,
    })
}

/// Parse an `xenc:EncryptedData` element
pub fn parse_encrypted_data(element: &XmlElement) -> Result<EncryptedData> {
    expect_name(element, "EncryptedData")?;

    Ok(EncryptedData {
        id: element.id().map(str::to_string),
        data_type: element.attribute("Type").map(str::to_string),
        encryption_method: parse_encryption_method(element)?,
        key_info: element
            .child(DSIG_NS, "KeyInfo")
            .map(parse_key_info)
            .transpose()?,
        cipher_value: parse_cipher_value(element)?,
    })
}

/// Parse an `xenc:ReferenceList` element
///
/// `xenc:KeyReference` entries are skipped; only data references name
/// content this processor decrypts.
pub fn parse_reference_list(element: &XmlElement) -> Result<ReferenceList> {
    expect_name(element, "ReferenceList")?;

    let data_references = element
        .children_named(XENC_NS, "DataReference")
        .map(|r| local_reference("DataReference", r.required_attribute("URI")?))
        .collect::<Result<Vec<_>>>()?;

    if data_references.is_empty()
        && element.child(XENC_NS, "KeyReference").is_none()
    {
        return Err(Error::structural(
            "ReferenceList",
            "must contain at least one DataReference or KeyReference",
        ));
    }
    Ok(ReferenceList { data_references })
}

fn expect_name(element: &XmlElement, local_name: &str) -> Result<()> {
    if element.name.is(XENC_NS, local_name) {
        Ok(())
    } else {
        Err(Error::structural(
            local_name,
            format!("expected xenc:{}, found {}", local_name, element.name),
        ))
    }
}

fn parse_encryption_method(element: &XmlElement) -> Result<EncryptionMethod> {
    let method = element.required_child(XENC_NS, "EncryptionMethod")?;
    Ok(EncryptionMethod {
        algorithm: method.required_attribute("Algorithm")?.to_string(),
        digest_method: method
            .child(DSIG_NS, "DigestMethod")
            .and_then(|d| d.attribute("Algorithm"))
            .map(str::to_string),
        mgf_algorithm: method
            .child(XENC11_NS, "MGF")
            .and_then(|m| m.attribute("Algorithm"))
            .map(str::to_string),
    })
}

fn parse_cipher_value(element: &XmlElement) -> Result<Vec<u8>> {
    let cipher_data = element.required_child(XENC_NS, "CipherData")?;
    if cipher_data.child(XENC_NS, "CipherReference").is_some() {
        return Err(Error::structural(
            "CipherData",
            "CipherReference is not supported, only inline CipherValue",
        ));
    }
    cipher_data.required_child(XENC_NS, "CipherValue")?.base64_text()
}
