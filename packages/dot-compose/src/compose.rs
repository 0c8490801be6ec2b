//! Offline transaction composition
//!
//! Round 1 builds the signing payload for a call and parks its signing
//! options in a session. Round 2 takes the externally produced signature,
//! rebuilds the call with the same options and returns the signed
//! extrinsic. Nothing in here ever sees a private key.

use crate::chain::ChainClient;
use crate::config::ComposeConfig;
use crate::error::{ComposeError, DotError, CREATE_TRANSACTION_FAILED, SIGN_REQUEST_FAILED};
use crate::session::{session_key, Session, SessionStore};
use crate::signature::{Signature, SignedPayload};
use crate::signer::OfflineSigner;
use crate::types::{ComposeRequest, ComposeResult, Era, SigningOptions, UnsignedPayload};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Compose orchestrator; the only writer of its session store
pub struct ComposeService<C> {
    chain: C,
    sessions: SessionStore,
    config: ComposeConfig,
    clock: Clock,
}

impl<C: ChainClient> ComposeService<C> {
    pub fn new(chain: C, config: ComposeConfig) -> Self {
        ComposeService {
            chain,
            sessions: SessionStore::new(),
            config,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, e.g. to exercise session expiry
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Snapshot of a pending session, if it is still stored
    pub fn session(&self, key: &str) -> Option<Session> {
        self.sessions.get(key)
    }

    /// Number of stored sessions, expired ones included until swept
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Validate a compose request and run the round it asks for
    ///
    /// Requests without a signature start round 1, requests with one
    /// finalize.
    pub async fn compose(&self, request: ComposeRequest) -> Result<ComposeResult, ComposeError> {
        let account = request
            .account
            .filter(|account| !account.is_empty())
            .ok_or_else(|| ComposeError::missing_field("account"))?;
        let target = request
            .target
            .filter(|target| !target.is_empty())
            .ok_or_else(|| ComposeError::missing_field("target"))?;
        let params = request
            .params
            .ok_or_else(|| ComposeError::missing_field("params"))?;

        match request.signature {
            Some(signature) => self.finalize(&account, &target, &params, signature).await,
            None => self.build_unsigned(&account, &target, &params).await,
        }
    }

    /// Round 1: build the payload to sign and open a session for it
    pub async fn build_unsigned(
        &self,
        account: &str,
        target: &str,
        params: &[String],
    ) -> Result<ComposeResult, ComposeError> {
        let payload = self
            .prepare_unsigned(account, target, params)
            .await
            .map_err(|cause| {
                warn!(account, target, %cause, "failed to build unsigned payload");
                ComposeError::compose(SIGN_REQUEST_FAILED, cause)
            })?;

        info!(account, target, session = %payload.session, "signature required");
        Ok(ComposeResult::signature_required(payload))
    }

    /// Round 2: inject the signature and return the signed extrinsic
    ///
    /// An unknown or expired session does not fail the request; the call
    /// is signed with freshly derived options instead.
    pub async fn finalize(
        &self,
        account: &str,
        target: &str,
        params: &[String],
        signed: SignedPayload,
    ) -> Result<ComposeResult, ComposeError> {
        let SignedPayload { signature, session } = signed;
        let stored = self.sessions.take(&session, (self.clock)());

        let options = stored.as_ref().map(|s| &s.context);
        let result = self
            .sign_transaction(account, target, params, signature, options)
            .await;

        match result {
            Ok(tx) => {
                info!(account, target, session = %session, "transaction ready");
                Ok(ComposeResult::transaction_ready(tx))
            }
            Err(cause) => {
                warn!(account, target, %cause, "failed to create transaction");
                if let Some(stored) = stored {
                    self.sessions.reinstate(session, stored);
                }
                Err(ComposeError::compose(CREATE_TRANSACTION_FAILED, cause))
            }
        }
    }

    async fn prepare_unsigned(
        &self,
        account: &str,
        target: &str,
        params: &[String],
    ) -> Result<UnsignedPayload, DotError> {
        let (module, call) = split_target(target)?;
        let options = self.signing_options(account).await?;

        let signer = OfflineSigner::unsigned();
        let mut tx = self.chain.build_call(module, call, params).await?;
        tx.sign(account, &options, &signer).await?;

        // only reached once signing succeeded, so failures leave no session
        let now = (self.clock)();
        let session = session_key(now, account, target, params, &options);
        self.sessions
            .put(session.clone(), options, now, self.config.session_ttl());

        Ok(UnsignedPayload {
            unsigned: signer.unsigned_payload(),
            session,
            signing_payload: signer.signing_payload(),
        })
    }

    async fn sign_transaction(
        &self,
        account: &str,
        target: &str,
        params: &[String],
        signature: Signature,
        stored: Option<&SigningOptions>,
    ) -> Result<String, DotError> {
        let (module, call) = split_target(target)?;
        let options = match stored {
            Some(options) => options.clone(),
            None => {
                warn!(account, "unknown or expired session, using default signing options");
                self.signing_options(account).await?
            }
        };

        let signer = OfflineSigner::with_signature(signature);
        let mut tx = self.chain.build_call(module, call, params).await?;
        tx.sign(account, &options, &signer).await?;
        Ok(tx.to_hex())
    }

    /// Signing options anchored at the current head of the chain
    async fn signing_options(&self, account: &str) -> Result<SigningOptions, DotError> {
        let (block, nonce) = tokio::try_join!(
            self.chain.current_block(),
            self.chain.account_nonce(account)
        )?;

        Ok(SigningOptions {
            block_hash: block.hash,
            era: Era::mortal(block.number, self.config.era_period),
            nonce,
            tip: self.config.tip,
        })
    }
}

/// Split `module.call` into its two parts
pub fn split_target(target: &str) -> Result<(&str, &str), DotError> {
    match target.split_once('.') {
        Some((module, call)) if !module.is_empty() && !call.is_empty() && !call.contains('.') => {
            Ok((module, call))
        }
        _ => Err(DotError::InvalidTarget(format!(
            "expected `module.call`, got `{}`",
            target
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{MockChainClient, SignableCall};
    use crate::extrinsic::Extrinsic;
    use crate::signature::{self, SignatureType};
    use crate::types::{BlockInfo, ComposePhase, Material};
    use assert_matches::assert_matches;
    use chrono::Duration;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

    fn material() -> Material {
        Material {
            genesis_hash: format!("0x{}", "e1".repeat(32)),
            spec_version: 9430,
            tx_version: 22,
        }
    }

    fn params() -> Vec<String> {
        vec![BOB.to_string(), "1000000000000".to_string()]
    }

    fn call_of(len: usize) -> Box<dyn SignableCall> {
        Box::new(Extrinsic::new(vec![0x04; len], material()))
    }

    /// Mock chain whose head advances by one block per lookup
    fn chain(call_len: usize) -> MockChainClient {
        let height = Arc::new(AtomicU64::new(1000));
        let mut chain = MockChainClient::new();
        chain.expect_current_block().returning(move || {
            let number = height.fetch_add(1, Ordering::SeqCst);
            Ok(BlockInfo {
                hash: format!("0x{:064x}", number),
                number,
            })
        });
        chain.expect_account_nonce().returning(|_| Ok(7));
        chain
            .expect_build_call()
            .returning(move |_, _, _| Ok(call_of(call_len)));
        chain
    }

    fn signed(session: &str, value: &str) -> SignedPayload {
        SignedPayload {
            signature: Signature {
                signature_type: SignatureType::Sr25519,
                value: value.to_string(),
            },
            session: session.to_string(),
        }
    }

    fn good_signature() -> String {
        format!("0x{}", "11".repeat(64))
    }

    fn signed_parts(tx: &str) -> crate::extrinsic::SignedParts {
        let bytes = hex::decode(tx.trim_start_matches("0x")).unwrap();
        Extrinsic::parse(&bytes).unwrap().0.expect("signed extrinsic")
    }

    #[tokio::test]
    async fn test_missing_fields_fail_before_chain_access() {
        // no expectations: any chain call panics
        let service = ComposeService::new(MockChainClient::new(), ComposeConfig::default());

        let err = service.compose(ComposeRequest::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing field `account` on request body.");

        let err = service
            .compose(ComposeRequest {
                account: Some(ALICE.to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing field `target` on request body.");

        let err = service
            .compose(ComposeRequest {
                account: Some(ALICE.to_string()),
                target: Some("balances.transfer".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_matches!(err, ComposeError::Validation(ref msg) if msg.contains("`params`"));
    }

    #[tokio::test]
    async fn test_malformed_target() {
        let service = ComposeService::new(MockChainClient::new(), ComposeConfig::default());
        for target in ["balances", ".transfer", "balances.", "a.b.c"] {
            let err = service
                .build_unsigned(ALICE, target, &params())
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), SIGN_REQUEST_FAILED);
            assert_matches!(err.cause(), Some(DotError::InvalidTarget(_)));
        }
    }

    #[tokio::test]
    async fn test_build_unsigned_short_payload() {
        let service = ComposeService::new(chain(40), ComposeConfig::default());
        let result = service
            .build_unsigned(ALICE, "balances.transfer", &params())
            .await
            .unwrap();

        assert_eq!(result.phase, ComposePhase::SignatureRequired);
        let payload = result.payload.unwrap();
        assert_eq!(
            payload.unsigned,
            format!("0x{}", hex::encode(signature::placeholder()))
        );
        assert_eq!(payload.session.len(), 66);

        let session = service.session(&payload.session).unwrap();
        assert_eq!(session.context.nonce, 7);
        assert_eq!(session.context.era, Era::mortal(1000, 50));
    }

    #[tokio::test]
    async fn test_oversized_era_period_is_capped() {
        let config = ComposeConfig {
            era_period: u64::MAX,
            ..ComposeConfig::default()
        };
        let service = ComposeService::new(chain(40), config);
        let key = service
            .build_unsigned(ALICE, "balances.transfer", &params())
            .await
            .unwrap()
            .payload
            .unwrap()
            .session;

        assert_eq!(
            service.session(&key).unwrap().context.era,
            Era::Mortal {
                period: 1 << 16,
                phase: 1000
            }
        );

        let result = service
            .finalize(ALICE, "balances.transfer", &params(), signed("0x00", &good_signature()))
            .await
            .unwrap();
        assert_eq!(result.phase, ComposePhase::TransactionReady);
    }

    #[tokio::test]
    async fn test_session_snapshot_does_not_touch_store() {
        let service = ComposeService::new(chain(40), ComposeConfig::default());
        let key = service
            .build_unsigned(ALICE, "balances.transfer", &params())
            .await
            .unwrap()
            .payload
            .unwrap()
            .session;

        let mut snapshot = service.session(&key).unwrap();
        snapshot.context.nonce = 99;

        assert_eq!(service.session(&key).unwrap().context.nonce, 7);
        assert_eq!(service.session_count(), 1);
    }

    #[tokio::test]
    async fn test_build_unsigned_long_payload_is_hashed() {
        let service = ComposeService::new(chain(300), ComposeConfig::default());
        let payload = service
            .build_unsigned(ALICE, "balances.transfer", &params())
            .await
            .unwrap()
            .payload
            .unwrap();

        assert_eq!(payload.unsigned.len(), 66);
        let raw = hex::decode(payload.signing_payload.trim_start_matches("0x")).unwrap();
        assert_eq!(
            payload.unsigned,
            format!("0x{}", hex::encode(crate::extrinsic::blake2_256(&raw)))
        );
    }

    #[tokio::test]
    async fn test_signing_failure_stores_no_session() {
        let service = ComposeService::new(chain(40), ComposeConfig::default());
        let err = service
            .build_unsigned("not-an-account", "balances.transfer", &params())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), SIGN_REQUEST_FAILED);
        assert_matches!(err.cause(), Some(DotError::InvalidAddress(_)));
        assert_eq!(service.session_count(), 0);
    }

    #[tokio::test]
    async fn test_chain_failure_is_wrapped() {
        let mut chain = MockChainClient::new();
        chain
            .expect_current_block()
            .returning(|| Err(DotError::ChainUnavailable("connection refused".to_string())));
        chain.expect_account_nonce().returning(|_| Ok(0));

        let service = ComposeService::new(chain, ComposeConfig::default());
        let err = service
            .build_unsigned(ALICE, "balances.transfer", &params())
            .await
            .unwrap_err();

        let response = err.to_response();
        assert_eq!(response.error, SIGN_REQUEST_FAILED);
        assert_eq!(
            response.cause.as_deref(),
            Some("Chain unavailable: connection refused")
        );
    }

    #[tokio::test]
    async fn test_finalize_consumes_session() {
        let service = ComposeService::new(chain(40), ComposeConfig::default());
        let session = service
            .build_unsigned(ALICE, "balances.transfer", &params())
            .await
            .unwrap()
            .payload
            .unwrap()
            .session;

        let result = service
            .finalize(
                ALICE,
                "balances.transfer",
                &params(),
                signed(&session, &good_signature()),
            )
            .await
            .unwrap();

        assert_eq!(result.phase, ComposePhase::TransactionReady);
        let parts = signed_parts(&result.tx.unwrap());
        assert_eq!(parts.era, Era::mortal(1000, 50));
        assert_eq!(parts.nonce, 7);
        assert_eq!(parts.signature[0], 0x01);
        assert_eq!(&parts.signature[1..], &[0x11u8; 64][..]);
        assert!(service.session(&session).is_none());

        // the second attempt cannot reuse the consumed context
        let again = service
            .finalize(
                ALICE,
                "balances.transfer",
                &params(),
                signed(&session, &good_signature()),
            )
            .await
            .unwrap();
        assert_ne!(signed_parts(&again.tx.unwrap()).era, Era::mortal(1000, 50));
    }

    #[tokio::test]
    async fn test_finalize_unknown_session_uses_defaults() {
        let service = ComposeService::new(chain(40), ComposeConfig::default());
        let result = service
            .finalize(
                ALICE,
                "balances.transfer",
                &params(),
                signed("0xdeadbeef", &good_signature()),
            )
            .await
            .unwrap();
        assert_eq!(result.phase, ComposePhase::TransactionReady);
    }

    #[tokio::test]
    async fn test_expired_session_is_not_consumed() {
        let now = Arc::new(Mutex::new(Utc::now()));
        let clock = now.clone();
        let service = ComposeService::new(chain(40), ComposeConfig::default())
            .with_clock(move || *clock.lock().unwrap());

        let session = service
            .build_unsigned(ALICE, "balances.transfer", &params())
            .await
            .unwrap()
            .payload
            .unwrap()
            .session;

        *now.lock().unwrap() += Duration::hours(24) + Duration::seconds(1);

        let result = service
            .finalize(
                ALICE,
                "balances.transfer",
                &params(),
                signed(&session, &good_signature()),
            )
            .await
            .unwrap();
        assert_ne!(signed_parts(&result.tx.unwrap()).era, Era::mortal(1000, 50));
    }

    #[tokio::test]
    async fn test_next_build_sweeps_expired_sessions() {
        let now = Arc::new(Mutex::new(Utc::now()));
        let clock = now.clone();
        let service = ComposeService::new(chain(40), ComposeConfig::default())
            .with_clock(move || *clock.lock().unwrap());

        let first = service
            .build_unsigned(ALICE, "balances.transfer", &params())
            .await
            .unwrap()
            .payload
            .unwrap()
            .session;

        *now.lock().unwrap() += Duration::hours(25);
        service
            .build_unsigned(ALICE, "balances.transfer", &params())
            .await
            .unwrap();

        assert!(service.session(&first).is_none());
        assert_eq!(service.session_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_finalize_keeps_session() {
        let service = ComposeService::new(chain(40), ComposeConfig::default());
        let session = service
            .build_unsigned(ALICE, "balances.transfer", &params())
            .await
            .unwrap()
            .payload
            .unwrap()
            .session;

        let err = service
            .finalize(ALICE, "balances.transfer", &params(), signed(&session, "0xzz"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), CREATE_TRANSACTION_FAILED);
        assert_matches!(err.cause(), Some(DotError::InvalidSignature(_)));
        assert!(service.session(&session).is_some());
    }

    #[tokio::test]
    async fn test_compose_dispatches_on_signature() {
        let service = ComposeService::new(chain(40), ComposeConfig::default());
        let request = ComposeRequest {
            account: Some(ALICE.to_string()),
            target: Some("balances.transfer".to_string()),
            params: Some(params()),
            signature: None,
        };

        let first = service.compose(request.clone()).await.unwrap();
        assert_eq!(first.phase, ComposePhase::SignatureRequired);
        let session = first.payload.unwrap().session;

        let second = service
            .compose(ComposeRequest {
                signature: Some(signed(&session, &good_signature())),
                ..request
            })
            .await
            .unwrap();
        assert_eq!(second.phase, ComposePhase::TransactionReady);
    }

    #[test]
    fn test_split_target() {
        assert_eq!(
            split_target("balances.transferKeepAlive").unwrap(),
            ("balances", "transferKeepAlive")
        );
        assert!(split_target("balances").is_err());
    }
}
