//! End-to-end sign → embed → extract → validate flows

use proptest::prelude::*;
use std::sync::OnceLock;

use sigil_crypto::{
    test_signer, LocalTimestampAuthority, SignOptions, TimestampPolicy, TrustAnchors,
};
use sigil_manifest::{
    labels, Builder, DocValue, Error, IngredientDescriptor, Reader, Relationship,
    ValidationCode,
};

fn restriction_doc() -> DocValue {
    let json: serde_json::Value = serde_json::from_str(
        r#"{"entries": {"c2pa.ai_training": {"use": "notAllowed"}}}"#,
    )
    .unwrap();
    DocValue::from_json(&json).unwrap()
}

#[tokio::test]
async fn scenario_one_assertion_one_resource() {
    let asset = vec![0x11u8; 1000];
    let mut builder = Builder::new("sigil-test/0.1.0");
    builder
        .add_assertion(labels::TRAINING_MINING, restriction_doc())
        .unwrap();
    builder
        .add_resource("thumb", "image/jpeg", vec![9u8; 10])
        .unwrap();

    let (signer, anchors) = test_signer("scenario", [11u8; 32]);
    let out = builder
        .sign(
            &signer,
            None,
            &SignOptions::default(),
            &asset,
            "application/octet-stream",
        )
        .await
        .unwrap();

    // Output grows by at least the manifest box size
    assert!(out.asset.len() >= asset.len() + out.manifest_bytes.len());
    assert!(builder.signed_bytes().is_some());

    let reader = Reader::from_bytes(&out.asset, "application/octet-stream").unwrap();
    let active = reader.active_manifest().unwrap();
    assert_eq!(active.assertions.len(), 1);
    assert_eq!(active.assertions[0].label, labels::TRAINING_MINING);

    let mut streamed = Vec::new();
    let n = reader.resource_to_stream("thumb", &mut streamed).unwrap();
    assert_eq!(n, 10);
    assert_eq!(streamed, vec![9u8; 10]);

    let report = reader.validate(&anchors);
    assert_eq!(report.count(ValidationCode::HashMismatch), 0);
    assert_eq!(report.count(ValidationCode::SignatureInvalid), 0);
    assert!(report.is_clean());
    assert_eq!(report.active_manifest.as_deref(), Some(reader.active_label()));
}

/// Signed 1000-byte asset shared across tamper cases; signing once keeps the
/// property run fast
fn tamper_fixture() -> &'static (Vec<u8>, TrustAnchors) {
    static FIXTURE: OnceLock<(Vec<u8>, TrustAnchors)> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let mut builder = Builder::new("sigil-test/0.1.0");
            builder
                .add_assertion(labels::ACTIONS, DocValue::map())
                .unwrap();
            let (signer, anchors) = test_signer("tamper", [12u8; 32]);
            let out = builder
                .sign(
                    &signer,
                    None,
                    &SignOptions::default(),
                    &vec![0x22u8; 1000],
                    "application/octet-stream",
                )
                .await
                .unwrap();
            (out.asset, anchors)
        })
    })
}

proptest! {
    // Flipping any byte of the covered region breaks the binding, and only
    // the binding: the claim signature stays intact
    #[test]
    fn mutating_covered_bytes_yields_hash_mismatch(offset in 0usize..1000) {
        let (asset, anchors) = tamper_fixture();
        let mut tampered = asset.clone();
        tampered[offset] ^= 0xFF;
        let reader = Reader::from_bytes(&tampered, "application/octet-stream").unwrap();
        let report = reader.validate(anchors);
        prop_assert_eq!(report.count(ValidationCode::HashMismatch), 1);
        prop_assert_eq!(report.count(ValidationCode::SignatureInvalid), 0);
    }
}

#[tokio::test]
async fn unknown_signer_is_untrusted_not_invalid() {
    let asset = vec![0x33u8; 256];
    let mut builder = Builder::new("sigil-test/0.1.0");
    builder
        .add_assertion(labels::ACTIONS, DocValue::map())
        .unwrap();

    let (signer, _their_anchors) = test_signer("stranger", [13u8; 32]);
    let out = builder
        .sign(
            &signer,
            None,
            &SignOptions::default(),
            &asset,
            "application/octet-stream",
        )
        .await
        .unwrap();

    let reader = Reader::from_bytes(&out.asset, "application/octet-stream").unwrap();
    let report = reader.validate(&sigil_crypto::TrustAnchors::new());
    assert_eq!(report.count(ValidationCode::UntrustedSigner), 1);
    assert_eq!(report.count(ValidationCode::SignatureInvalid), 0);
    assert_eq!(report.count(ValidationCode::HashMismatch), 0);
}

#[tokio::test]
async fn timestamped_signature_validates() {
    let asset = vec![0x44u8; 512];
    let mut builder = Builder::new("sigil-test/0.1.0");
    builder
        .add_assertion(labels::ACTIONS, DocValue::map())
        .unwrap();

    let (signer, anchors) = test_signer("tsa-user", [14u8; 32]);
    let tsa = LocalTimestampAuthority::new(
        "local-tsa",
        ed25519_dalek::SigningKey::from_bytes(&[15u8; 32]),
    );
    let options = SignOptions {
        timestamp_policy: TimestampPolicy::Required,
        ..SignOptions::default()
    };
    let out = builder
        .sign(&signer, Some(&tsa), &options, &asset, "application/octet-stream")
        .await
        .unwrap();
    assert!(out.warnings.is_empty());

    let reader = Reader::from_bytes(&out.asset, "application/octet-stream").unwrap();
    let report = reader.validate(&anchors);
    assert!(report.is_clean());
    assert_eq!(report.count(ValidationCode::TimestampMissing), 0);
    assert_eq!(report.count(ValidationCode::TimestampInvalid), 0);
}

#[tokio::test]
async fn re_signing_a_signed_builder_fails() {
    let asset = vec![0x55u8; 128];
    let mut builder = Builder::new("sigil-test/0.1.0");
    builder
        .add_assertion(labels::ACTIONS, DocValue::map())
        .unwrap();

    let (signer, _) = test_signer("once", [16u8; 32]);
    builder
        .sign(
            &signer,
            None,
            &SignOptions::default(),
            &asset,
            "application/octet-stream",
        )
        .await
        .unwrap();

    let err = builder
        .sign(
            &signer,
            None,
            &SignOptions::default(),
            &asset,
            "application/octet-stream",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadySigned));

    // Mutation is rejected too
    assert!(matches!(
        builder.add_assertion(labels::ACTIONS, DocValue::map()),
        Err(Error::InvalidState { .. })
    ));
}

#[tokio::test]
async fn unresolved_resource_reference_fails_before_signing() {
    let asset = vec![0x66u8; 128];
    let mut builder = Builder::new("sigil-test/0.1.0");
    builder
        .add_assertion_with_resource(labels::THUMBNAIL, DocValue::Null, "missing-thumb")
        .unwrap();

    let (signer, _) = test_signer("unresolved", [17u8; 32]);
    let err = builder
        .sign(
            &signer,
            None,
            &SignOptions::default(),
            &asset,
            "application/octet-stream",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnresolvedResourceReference { .. }));
    // Failed build leaves the builder usable
    builder
        .add_resource("missing-thumb", "image/jpeg", vec![1, 2, 3])
        .unwrap();
    builder
        .sign(
            &signer,
            None,
            &SignOptions::default(),
            &asset,
            "application/octet-stream",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn ingredient_thumbnail_reference_is_checked() {
    let asset = vec![0x77u8; 128];
    let source = vec![0x78u8; 64];
    let mut builder = Builder::new("sigil-test/0.1.0");
    builder
        .add_ingredient(
            IngredientDescriptor::new("source.raw", Relationship::ParentOf)
                .with_thumbnail("ghost-thumb"),
            &source,
            "application/octet-stream",
        )
        .unwrap();

    let (signer, _) = test_signer("ingredient-thumb", [18u8; 32]);
    let err = builder
        .sign(
            &signer,
            None,
            &SignOptions::default(),
            &asset,
            "application/octet-stream",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnresolvedResourceReference { .. }));
}
