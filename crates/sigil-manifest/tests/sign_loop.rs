//! Sign-loop edge behavior: cancellation and box-size convergence

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sigil_codec::{CodecRegistry, ContainerCodec};
use sigil_core::{ByteRange, Result};
use sigil_crypto::{
    test_signer, CertificateChain, Ed25519Signer, SignOptions, Signer, SigningAlg,
};
use sigil_manifest::{labels, Builder, BuilderState, DocValue, Error, MAX_BOX_RETRIES};

const CT: &str = "application/octet-stream";

struct StalledSigner(Ed25519Signer);

#[async_trait]
impl Signer for StalledSigner {
    fn alg(&self) -> SigningAlg {
        self.0.alg()
    }
    fn cert_chain(&self) -> &CertificateChain {
        self.0.cert_chain()
    }
    async fn sign(&self, _data: &[u8]) -> Result<Vec<u8>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        unreachable!("the in-flight sign should have been dropped")
    }
}

#[tokio::test(start_paused = true)]
async fn dropped_sign_future_leaves_the_builder_populated() {
    let asset = vec![0x5Au8; 300];
    let mut builder = Builder::new("sigil-test/0.1.0");
    builder
        .add_assertion(labels::ACTIONS, DocValue::map())
        .unwrap();

    let (inner, _) = test_signer("stalled", [51u8; 32]);
    let stalled = StalledSigner(inner);
    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        builder.sign(&stalled, None, &SignOptions::default(), &asset, CT),
    )
    .await;
    assert!(abandoned.is_err());

    // No partial state: still populated, archivable, and signable
    assert_eq!(builder.state(), BuilderState::Populated);
    assert!(builder.signed_bytes().is_none());
    let archive = builder.to_archive().unwrap();
    assert_eq!(archive.label, builder.label());

    let (signer, _) = test_signer("retry", [52u8; 32]);
    builder
        .sign(&signer, None, &SignOptions::default(), &asset, CT)
        .await
        .unwrap();
    assert_eq!(builder.state(), BuilderState::Signed);
}

/// A codec whose size report drifts on every call, so no estimate can hold
struct DriftingCodec {
    calls: AtomicU64,
}

impl ContainerCodec for DriftingCodec {
    fn content_types(&self) -> &[&'static str] {
        &["application/x-drift"]
    }
    fn locate(&self, _asset: &[u8]) -> Result<Option<ByteRange>> {
        Ok(None)
    }
    fn extract(&self, _asset: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
    fn embed(&self, _asset: &[u8], _manifest_bytes: &[u8]) -> Result<Vec<u8>> {
        unreachable!("a non-converging estimate must never reach embed")
    }
    fn strip(&self, asset: &[u8]) -> Result<Vec<u8>> {
        Ok(asset.to_vec())
    }
    fn box_size(&self, payload_len: u64) -> u64 {
        // The 64-byte step dwarfs any CBOR length-encoding shift, so
        // successive calls can never agree
        payload_len + 64 * self.calls.fetch_add(1, Ordering::Relaxed)
    }
}

#[tokio::test]
async fn non_converging_box_size_is_a_bounded_failure() {
    let mut registry = CodecRegistry::with_defaults();
    registry.register(Arc::new(DriftingCodec {
        calls: AtomicU64::new(0),
    }));
    let mut builder = Builder::new("sigil-test/0.1.0").with_registry(registry);
    builder
        .add_assertion(labels::ACTIONS, DocValue::map())
        .unwrap();

    let (signer, _) = test_signer("drift", [53u8; 32]);
    let err = builder
        .sign(
            &signer,
            None,
            &SignOptions::default(),
            &[0u8; 100],
            "application/x-drift",
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::BoxSizeDiverged { attempts, .. } if attempts == MAX_BOX_RETRIES + 1)
    );

    // The failed build left no trace; the builder signs fine elsewhere
    assert_eq!(builder.state(), BuilderState::Populated);
    assert!(builder.signed_bytes().is_none());
    builder
        .sign(&signer, None, &SignOptions::default(), &[0u8; 100], CT)
        .await
        .unwrap();
}
