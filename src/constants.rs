//! Namespace URIs and token type identifiers recognised by the processor

/// SOAP 1.1 envelope namespace
pub const SOAP11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// SOAP 1.2 envelope namespace
pub const SOAP12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// WS-Security extension namespace (`wsse`)
pub const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";

/// WS-Security utility namespace (`wsu`)
pub const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";

/// XML Encryption namespace (`xenc`)
pub const XENC_NS: &str = "http://www.w3.org/2001/04/xmlenc#";

/// XML Encryption 1.1 namespace (`xenc11`)
pub const XENC11_NS: &str = "http://www.w3.org/2009/xmlenc11#";

/// XML Signature namespace (`ds`)
pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Namespace bound to the reserved `xml` prefix
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Value type of an X.509v3 binary security token
pub const X509_V3_TOKEN_TYPE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-x509-token-profile-1.0#X509v3";

/// Value type of an X.509 subject key identifier
pub const X509_SKI_TYPE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-x509-token-profile-1.0#X509SubjectKeyIdentifier";

/// Base64 encoding type of binary security tokens and key identifiers
pub const BASE64_ENCODING_TYPE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// `EncryptedData` type for an encrypted element
pub const XENC_TYPE_ELEMENT: &str = "http://www.w3.org/2001/04/xmlenc#Element";

/// `EncryptedData` type for encrypted element content
pub const XENC_TYPE_CONTENT: &str = "http://www.w3.org/2001/04/xmlenc#Content";
