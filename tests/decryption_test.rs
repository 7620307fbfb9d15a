//! End-to-end decryption of secured envelopes

mod common;

use common::*;
use proptest::prelude::*;
use std::sync::Arc;
use wssec_stream::crypto::algorithms::{AES128_GCM, AES256_GCM, RSA_OAEP_MGF1P, RSA_V1_5};
use wssec_stream::streaming::read_events;
use wssec_stream::{
    CredentialCallback, CredentialUsage, ErrorKind, InMemoryKeyStore, InboundSecurity,
    SecurityEvent, SecurityProperties, TokenKind, XmlEvent,
};

fn store_for(identity: &RsaIdentity) -> Arc<InMemoryKeyStore> {
    Arc::new(InMemoryKeyStore::new("service").with_private_key(
        "service",
        identity.public.clone(),
        identity.private.clone(),
        None,
    ))
}

/// Key-value tokens look in the signature store first
fn inbound_for(identity: &RsaIdentity) -> InboundSecurity {
    InboundSecurity::new(SecurityProperties::new().with_signature_key_store(store_for(identity)))
}

fn expected(plain_body: &str, header: &str) -> Vec<XmlEvent> {
    read_events(envelope(header, plain_body).as_bytes()).unwrap()
}

#[test]
fn test_round_trip_single_element() {
    let identity = shared_identity();
    let order = "<app:order><app:id>7</app:id><app:total>12.50</app:total></app:order>";
    let message = single_key_envelope(identity, &[Part::new("ED-1", order)]);

    let mut stream = inbound_for(identity).process_bytes(message.as_bytes());
    let events = stream.collect_events().unwrap();

    let header_only = {
        let start = message.find("<xenc:EncryptedKey").unwrap();
        let end = message.find("</wsse:Security>").unwrap();
        message[start..end].to_string()
    };
    assert_eq!(events, expected(order, &header_only));

    let recorded = stream.security_context().events();
    assert_eq!(
        recorded[0],
        SecurityEvent::TokenRegistered {
            id: "EK-1".to_string(),
            kind: TokenKind::UnwrappedSymmetric,
        }
    );
    assert_eq!(
        recorded[1],
        SecurityEvent::ElementDecrypted {
            element_id: "ED-1".to_string(),
            algorithm: AES128_GCM.to_string(),
            token_id: Some("EK-1".to_string()),
        }
    );
}

#[test]
fn test_plaintext_uses_ancestor_namespace_prefix() {
    let identity = shared_identity();
    let message = single_key_envelope(identity, &[Part::new("ED-1", "<app:ping/>")]);

    let events = inbound_for(identity)
        .process_bytes(message.as_bytes())
        .collect_events()
        .unwrap();
    let ping = events
        .iter()
        .filter_map(XmlEvent::as_start)
        .find(|s| s.name.local_name == "ping")
        .unwrap();
    assert_eq!(ping.name.namespace.as_deref(), Some(APP_NS));
    assert!(
        events
            .iter()
            .filter_map(XmlEvent::as_start)
            .all(|s| s.name.local_name != "EncryptedData")
    );
}

#[test]
fn test_several_elements_one_key() {
    let identity = shared_identity();
    let parts = [
        Part::new("ED-a", "<app:line>first</app:line>"),
        Part::new("ED-b", "<app:line>second</app:line>"),
    ];
    let message = single_key_envelope(identity, &parts);

    let xml = inbound_for(identity)
        .decrypt_document(message.as_bytes())
        .unwrap();
    let xml = String::from_utf8(xml).unwrap();
    assert!(xml.contains("<app:line>first</app:line><app:line>second</app:line>"));
    assert!(!xml.contains("xenc:EncryptedData"));
    // The header itself is forwarded unchanged
    assert!(xml.contains("xenc:EncryptedKey"));
}

#[test]
fn test_binary_security_token_with_decryption_store() {
    let identity = rsa_2048();
    let certificate = rsa_certificate(identity, "service");
    let store = InMemoryKeyStore::new("decryption").with_key_pair_certificate(
        "service",
        certificate.clone(),
        identity.private.clone(),
        None,
    );

    let content_key = [9u8; 32];
    let header = format!(
        "{}{}",
        binary_security_token("BST-1", &certificate),
        encrypted_key(
            Some("EK-1"),
            RSA_V1_5,
            &token_reference("BST-1"),
            &wrap(RSA_V1_5, &certificate.public_key().clone(), &content_key),
            &["ED-1"],
        )
    );
    let body = encrypted_data(
        "ED-1",
        AES256_GCM,
        "",
        &seal(AES256_GCM, &content_key, "<app:secret>x</app:secret>"),
    );
    let message = envelope(&header, &body);

    let inbound = InboundSecurity::new(
        SecurityProperties::new().with_decryption_key_store(Arc::new(store)),
    );
    let mut stream = inbound.process_bytes(message.as_bytes());
    let events = stream.collect_events().unwrap();
    assert_eq!(events, expected("<app:secret>x</app:secret>", &header));

    let context = stream.security_context();
    assert!(context.registry().is_resolved("BST-1"));
    let token = context.resolve_token("EK-1").unwrap();
    assert_eq!(token.wrapping_token().unwrap().kind(), TokenKind::X509);
    assert_eq!(token.wrapping_algorithm(), Some(RSA_V1_5));
}

#[test]
fn test_header_key_value_token() {
    let identity = shared_identity();
    let content_key = [3u8; 16];
    let header = format!(
        "{}{}",
        rsa_key_value(Some("KV-1"), &identity.rsa_public()),
        encrypted_key(
            Some("EK-1"),
            RSA_OAEP_MGF1P,
            &token_reference("KV-1"),
            &wrap(RSA_OAEP_MGF1P, &identity.public, &content_key),
            &["ED-1"],
        )
    );
    let body = encrypted_data("ED-1", AES128_GCM, "", &seal(AES128_GCM, &content_key, "<app:v/>"));
    let message = envelope(&header, &body);

    let mut stream = inbound_for(identity).process_bytes(message.as_bytes());
    let events = stream.collect_events().unwrap();
    assert_eq!(events, expected("<app:v/>", &header));
    assert!(stream.security_context().events().contains(&SecurityEvent::TokenRegistered {
        id: "KV-1".to_string(),
        kind: TokenKind::KeyValue,
    }));
}

#[test]
fn test_inline_encrypted_key_with_standalone_reference_list() {
    let identity = shared_identity();
    let content_key = [5u8; 16];
    let inline = format!(
        "<ds:KeyInfo>{}</ds:KeyInfo>",
        encrypted_key(
            None,
            RSA_OAEP_MGF1P,
            &key_value_info(&identity.rsa_public()),
            &wrap(RSA_OAEP_MGF1P, &identity.public, &content_key),
            &[],
        )
    );
    let header = reference_list(&["ED-1"]);
    let body = encrypted_data(
        "ED-1",
        AES128_GCM,
        &inline,
        &seal(AES128_GCM, &content_key, "<app:note>inline</app:note>"),
    );
    let message = envelope(&header, &body);

    let mut stream = inbound_for(identity).process_bytes(message.as_bytes());
    let events = stream.collect_events().unwrap();
    assert_eq!(events, expected("<app:note>inline</app:note>", &header));
    assert!(stream.security_context().events().contains(&SecurityEvent::ElementDecrypted {
        element_id: "ED-1".to_string(),
        algorithm: AES128_GCM.to_string(),
        token_id: None,
    }));
}

#[test]
fn test_reference_list_pointing_at_registered_key() {
    let identity = shared_identity();
    let content_key = [6u8; 16];
    let header = format!(
        "{}{}",
        encrypted_key(
            Some("EK-7"),
            RSA_OAEP_MGF1P,
            &key_value_info(&identity.rsa_public()),
            &wrap(RSA_OAEP_MGF1P, &identity.public, &content_key),
            &[],
        ),
        reference_list(&["ED-1"])
    );
    let body = encrypted_data(
        "ED-1",
        AES128_GCM,
        &token_reference("EK-7"),
        &seal(AES128_GCM, &content_key, "<app:x>1</app:x>"),
    );

    let events = inbound_for(identity)
        .process_bytes(envelope(&header, &body).as_bytes())
        .collect_events()
        .unwrap();
    assert_eq!(events, expected("<app:x>1</app:x>", &header));
}

#[test]
fn test_nested_encrypted_element_inside_plaintext() {
    let identity = shared_identity();
    let content_key = [0x42u8; 16];
    let inner = encrypted_data(
        "ED-inner",
        AES128_GCM,
        "",
        &seal(AES128_GCM, &content_key, "<app:deep>d</app:deep>"),
    );
    let outer_plain = format!(
        r#"<app:wrapper xmlns:xenc="{}">{}</app:wrapper>"#,
        XENC_NS, inner
    );
    let header = encrypted_key(
        Some("EK-1"),
        RSA_OAEP_MGF1P,
        &key_value_info(&identity.rsa_public()),
        &wrap(RSA_OAEP_MGF1P, &identity.public, &content_key),
        &["ED-outer", "ED-inner"],
    );
    let body = encrypted_data(
        "ED-outer",
        AES128_GCM,
        "",
        &seal(AES128_GCM, &content_key, &outer_plain),
    );

    let xml = inbound_for(identity)
        .decrypt_document(envelope(&header, &body).as_bytes())
        .unwrap();
    let xml = String::from_utf8(xml).unwrap();
    assert!(xml.contains("<app:deep>d</app:deep>"));
    assert!(!xml.contains("EncryptedData"));
}

/// Body sealed twice: `ED-outer` decrypts to content holding `ED-inner`,
/// each under its own key
fn super_encrypted(identity: &RsaIdentity, outer_first: bool) -> String {
    let outer_key = [0x0au8; 16];
    let inner_key = [0x0bu8; 16];
    let inner_data = encrypted_data(
        "ED-inner",
        AES128_GCM,
        "",
        &seal(AES128_GCM, &inner_key, "<app:deep>d</app:deep>"),
    );
    let outer_plain = format!(
        r#"<app:wrapper xmlns:xenc="{}">{}</app:wrapper>"#,
        XENC_NS, inner_data
    );
    let body = encrypted_data(
        "ED-outer",
        AES128_GCM,
        "",
        &seal(AES128_GCM, &outer_key, &outer_plain),
    );

    let key = |id: &str, content_key: &[u8], reference: &str| {
        encrypted_key(
            Some(id),
            RSA_OAEP_MGF1P,
            &key_value_info(&identity.rsa_public()),
            &wrap(RSA_OAEP_MGF1P, &identity.public, content_key),
            &[reference],
        )
    };
    let outer = key("EK-outer", &outer_key, "ED-outer");
    let inner = key("EK-inner", &inner_key, "ED-inner");
    // Blocks are prepended, so the last encryption applied comes first
    let header = if outer_first {
        format!("{}{}", outer, inner)
    } else {
        format!("{}{}", inner, outer)
    };
    envelope(&header, &body)
}

#[test]
fn test_super_encryption_in_either_header_order() {
    let identity = shared_identity();
    for outer_first in [true, false] {
        let message = super_encrypted(identity, outer_first);
        let mut stream = inbound_for(identity).process_bytes(message.as_bytes());
        let events = stream.collect_events().unwrap();

        let xml = {
            let mut writer = wssec_stream::EventWriter::new(Vec::new());
            for event in &events {
                writer.write(event).unwrap();
            }
            String::from_utf8(writer.into_inner()).unwrap()
        };
        assert!(xml.contains("<app:deep>d</app:deep></app:wrapper>"), "{}", xml);
        assert!(!xml.contains("EncryptedData"));

        let decrypted: Vec<&str> = stream
            .security_context()
            .events()
            .iter()
            .filter_map(|e| match e {
                SecurityEvent::ElementDecrypted { element_id, .. } => Some(element_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(decrypted, vec!["ED-outer", "ED-inner"]);
    }
}

#[test]
fn test_malformed_cipher_value_is_decryption_error() {
    let identity = shared_identity();
    let message = single_key_envelope(identity, &[Part::new("ED-1", "<app:a/>")]);
    let start = message.find("<xenc:CipherValue>").unwrap();
    let start = message[start + 1..].find("<xenc:CipherValue>").unwrap() + start + 1;
    let value_start = start + "<xenc:CipherValue>".len();
    let value_end = value_start + message[value_start..].find('<').unwrap();
    let message = format!(
        "{}@@not-base64@@{}",
        &message[..value_start],
        &message[value_end..]
    );

    let err = inbound_for(identity)
        .decrypt_document(message.as_bytes())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decryption);
    assert!(err.to_string().contains("ED-1"));
}

fn protected_store() -> InMemoryKeyStore {
    let identity = shared_identity();
    InMemoryKeyStore::new("service").with_private_key(
        "service",
        identity.public.clone(),
        identity.private.clone(),
        Some("s3cret"),
    )
}

#[test]
fn test_password_protected_key() {
    struct Secret;
    impl CredentialCallback for Secret {
        fn password(&self, alias: &str, usage: CredentialUsage) -> Option<String> {
            (alias == "service" && usage == CredentialUsage::Signature)
                .then(|| "s3cret".to_string())
        }
    }

    let message = single_key_envelope(shared_identity(), &[Part::new("ED-1", "<app:p/>")]);

    let locked = InboundSecurity::new(
        SecurityProperties::new()
            .with_signature_key_store(Arc::new(protected_store()))
            .with_key_store_fallback(false),
    );
    let err = locked.decrypt_document(message.as_bytes()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyResolution);
    assert!(err.to_string().contains("service"));

    let unlocked = InboundSecurity::new(
        SecurityProperties::new()
            .with_signature_key_store(Arc::new(protected_store()))
            .with_credential_callback(Arc::new(Secret)),
    );
    assert!(unlocked.decrypt_document(message.as_bytes()).is_ok());
}

#[test]
fn test_unsupported_block_algorithm() {
    let identity = shared_identity();
    let cbc = "http://www.w3.org/2001/04/xmlenc#aes128-cbc";
    let content_key = [1u8; 16];
    let header = encrypted_key(
        Some("EK-1"),
        RSA_OAEP_MGF1P,
        &key_value_info(&identity.rsa_public()),
        &wrap(RSA_OAEP_MGF1P, &identity.public, &content_key),
        &["ED-1"],
    );
    let body = encrypted_data("ED-1", cbc, "", &[0u8; 48]);

    let err = inbound_for(identity)
        .decrypt_document(envelope(&header, &body).as_bytes())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedAlgorithm);
    assert!(err.to_string().contains("aes128-cbc"));
}

#[test]
fn test_tampered_ciphertext_is_decryption_error() {
    let identity = shared_identity();
    let content_key = [0x42u8; 16];
    let mut sealed = seal(AES128_GCM, &content_key, "<app:a/>");
    let last = sealed.len() - 1;
    sealed[last] ^= 0x01;

    let header = encrypted_key(
        Some("EK-1"),
        RSA_OAEP_MGF1P,
        &key_value_info(&identity.rsa_public()),
        &wrap(RSA_OAEP_MGF1P, &identity.public, &content_key),
        &["ED-1"],
    );
    let body = encrypted_data("ED-1", AES128_GCM, "", &sealed);

    let err = inbound_for(identity)
        .decrypt_document(envelope(&header, &body).as_bytes())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decryption);
    assert!(err.to_string().contains("ED-1"));
}

#[test]
fn test_key_for_other_recipient() {
    let intended = shared_identity();
    let other = rsa_identity();
    let message = single_key_envelope(intended, &[Part::new("ED-1", "<app:a/>")]);

    let err = inbound_for(&other)
        .decrypt_document(message.as_bytes())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyResolution);
}

#[test]
fn test_dangling_reference_reported_at_end_of_stream() {
    let identity = shared_identity();
    let header = encrypted_key(
        Some("EK-1"),
        RSA_OAEP_MGF1P,
        &key_value_info(&identity.rsa_public()),
        &wrap(RSA_OAEP_MGF1P, &identity.public, &[0u8; 16]),
        &["ED-missing"],
    );
    let message = envelope(&header, "<app:plain/>");

    let mut stream = inbound_for(identity).process_bytes(message.as_bytes());
    let mut delivered = 0;
    let mut failure = None;
    for event in stream.by_ref() {
        match event {
            Ok(_) => delivered += 1,
            Err(e) => failure = Some(e),
        }
    }
    let err = failure.unwrap();
    assert_eq!(err.kind(), ErrorKind::DanglingReference);
    assert!(err.to_string().contains("ED-missing"));
    // Everything before the end was streamed out
    assert_eq!(delivered, read_events(message.as_bytes()).unwrap().len());
    // The key was never needed, so it was never unwrapped
    assert!(!stream.security_context().registry().is_resolved("EK-1"));
}

#[test]
fn test_unreferenced_encrypted_data_left_alone() {
    let identity = shared_identity();
    let sealed = seal(AES128_GCM, &[0u8; 16], "<app:a/>");
    let body = encrypted_data("ED-other", AES128_GCM, "", &sealed);
    let message = envelope("", &body);

    let events = inbound_for(identity)
        .process_bytes(message.as_bytes())
        .collect_events()
        .unwrap();
    assert_eq!(events, read_events(message.as_bytes()).unwrap());
}

#[test]
fn test_truncated_message_is_structural() {
    let identity = shared_identity();
    let message = single_key_envelope(identity, &[Part::new("ED-1", "<app:a/>")]);
    let cut = message.find("<soap:Body>").unwrap() + 20;

    let err = inbound_for(identity)
        .decrypt_document(&message.as_bytes()[..cut])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StructuralParse);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_decrypted_stream_matches_plain_message(
        texts in prop::collection::vec("[a-zA-Z0-9 ]{0,40}", 1..4)
    ) {
        let identity = shared_identity();
        let parts: Vec<Part> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Part::new(&format!("ED-{}", i), &format!(r#"<app:item n="{}">{}</app:item>"#, i, t)))
            .collect();
        let message = single_key_envelope(identity, &parts);
        let header = {
            let start = message.find("<xenc:EncryptedKey").unwrap();
            let end = message.find("</wsse:Security>").unwrap();
            message[start..end].to_string()
        };
        let plain: String = parts.iter().map(|p| p.plaintext.as_str()).collect();

        let events = inbound_for(identity)
            .process_bytes(message.as_bytes())
            .collect_events()
            .unwrap();
        prop_assert_eq!(events, expected(&plain, &header));
    }
}
