#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use themis_kernel_contracts::attribute::SealedAttribute;
use themis_kernel_contracts::disclosure::{DisclosureProof, OracleRequestId};
use themis_kernel_contracts::ContractViolation;

use crate::sealer::{AttributeSealer, SealerError};

const GATEWAY_MAC_SECRET_LEN: usize = 32;

#[derive(Debug)]
pub enum GatewayError {
    EmptyHandleList,
    EmptyCallbackRef,
    UnknownRequest(u128),
    Seal(SealerError),
    Contract(ContractViolation),
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyHandleList => write!(f, "decryption request carries no handles"),
            Self::EmptyCallbackRef => write!(f, "decryption request carries no callback ref"),
            Self::UnknownRequest(id) => write!(f, "unknown decryption request: {id}"),
            Self::Seal(err) => write!(f, "sealing error: {err}"),
            Self::Contract(v) => write!(f, "contract violation: {v:?}"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<SealerError> for GatewayError {
    fn from(value: SealerError) -> Self {
        Self::Seal(value)
    }
}

impl From<ContractViolation> for GatewayError {
    fn from(value: ContractViolation) -> Self {
        Self::Contract(value)
    }
}

/// The decryption-oracle capability. The registry core calls through
/// this boundary only; any compliant backend can stand behind it.
pub trait DecryptionGateway {
    /// Registers a decryption request over an ordered handle list and
    /// returns the correlation id the eventual callback will carry.
    /// Non-blocking: fulfilment arrives as a later, independent call
    /// into the registry.
    fn request_decryption(
        &mut self,
        handles: &[SealedAttribute],
        callback_ref: &str,
    ) -> Result<OracleRequestId, GatewayError>;

    /// Checks the gateway's proof over (correlation id, cleartexts).
    fn verify_response(
        &self,
        request_id: OracleRequestId,
        cleartexts: &[u64],
        proof: &DisclosureProof,
    ) -> bool;
}

#[derive(Debug, Clone)]
struct PendingDecryption {
    handles: Vec<SealedAttribute>,
}

/// Deterministic local gateway: decrypts with the sealing key it was
/// constructed with and proves responses with a keyed sha256 MAC.
/// Stands in for the external oracle in tests and local wiring.
#[derive(Debug, Clone)]
pub struct InProcessDecryptionGateway {
    sealer: AttributeSealer,
    mac_secret: [u8; GATEWAY_MAC_SECRET_LEN],
    next_request_id: u128,
    pending: BTreeMap<OracleRequestId, PendingDecryption>,
}

impl InProcessDecryptionGateway {
    pub fn new(sealer: AttributeSealer) -> Self {
        let mut mac_secret = [0u8; GATEWAY_MAC_SECRET_LEN];
        OsRng.fill_bytes(&mut mac_secret);
        Self::with_mac_secret(sealer, mac_secret)
    }

    pub fn with_mac_secret(
        sealer: AttributeSealer,
        mac_secret: [u8; GATEWAY_MAC_SECRET_LEN],
    ) -> Self {
        Self {
            sealer,
            mac_secret,
            next_request_id: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Produces the oracle's side of the protocol for a pending request:
    /// the cleartext words in handle order plus the proof over them.
    /// Kept replayable so callers can exercise the registry's replay guard.
    pub fn fulfil(
        &self,
        request_id: OracleRequestId,
    ) -> Result<(Vec<u64>, DisclosureProof), GatewayError> {
        let pending = self
            .pending
            .get(&request_id)
            .ok_or(GatewayError::UnknownRequest(request_id.0))?;
        let mut cleartexts = Vec::with_capacity(pending.handles.len());
        for handle in &pending.handles {
            cleartexts.push(self.sealer.unseal_u64(handle)?);
        }
        let mac = self.response_mac(request_id, &cleartexts);
        let proof = DisclosureProof::new(mac.to_vec())?;
        Ok((cleartexts, proof))
    }

    fn response_mac(&self, request_id: OracleRequestId, cleartexts: &[u64]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.mac_secret);
        hasher.update(request_id.0.to_be_bytes());
        hasher.update((cleartexts.len() as u64).to_be_bytes());
        for word in cleartexts {
            hasher.update(word.to_be_bytes());
        }
        hasher.finalize().into()
    }
}

impl DecryptionGateway for InProcessDecryptionGateway {
    fn request_decryption(
        &mut self,
        handles: &[SealedAttribute],
        callback_ref: &str,
    ) -> Result<OracleRequestId, GatewayError> {
        if handles.is_empty() {
            return Err(GatewayError::EmptyHandleList);
        }
        if callback_ref.trim().is_empty() {
            return Err(GatewayError::EmptyCallbackRef);
        }
        self.next_request_id += 1;
        let request_id = OracleRequestId(self.next_request_id);
        self.pending.insert(
            request_id,
            PendingDecryption {
                handles: handles.to_vec(),
            },
        );
        Ok(request_id)
    }

    fn verify_response(
        &self,
        request_id: OracleRequestId,
        cleartexts: &[u64],
        proof: &DisclosureProof,
    ) -> bool {
        if !self.pending.contains_key(&request_id) {
            return false;
        }
        let expected = self.response_mac(request_id, cleartexts);
        proof.as_bytes() == expected
    }
}
