// Copyright (C) 2022-2024 Webb Technologies Inc.
//
// Tangle is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Tangle is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should receive a copy of the GNU General Public License
// If not, see <http://www.gnu.org/licenses/>.

use ethers::types::H256;
use ethers::utils::keccak256;
use webb_relayer_types::WormholeChainId;
use webb_relayer_utils::{Error, Result};

use crate::reader::Reader;

/// Size of one guardian signature entry: index (1) + r (32) + s (32) + v (1).
pub const SIGNATURE_LEN: usize = 66;

/// A signed cross-chain attestation (VAA).
///
/// The guardian signatures are kept opaque, signature verification is done by
/// the guardian network client and the destination contracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vaa {
    /// Envelope version.
    pub version: u8,
    /// The guardian set that signed this attestation.
    pub guardian_set_index: u32,
    /// Raw signature entries.
    pub signatures: Vec<[u8; SIGNATURE_LEN]>,
    /// Observation time, in seconds.
    pub timestamp: u32,
    /// Groups attestations emitted by one source transaction.
    pub nonce: u32,
    /// The chain this attestation was emitted on.
    pub emitter_chain: WormholeChainId,
    /// The emitter contract, in its 32 bytes form.
    pub emitter_address: H256,
    /// The per-emitter sequence.
    pub sequence: u64,
    /// Finality the emitter asked for.
    pub consistency_level: u8,
    /// The application payload.
    pub payload: Vec<u8>,
    /// `keccak256(keccak256(body))`, used as a global dedup key.
    pub hash: H256,
}

impl Vaa {
    /// Parses the full signed wire form.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let version = reader.u8("vaa version")?;
        let guardian_set_index = reader.u32("guardian set index")?;
        let len_signers = reader.u8("signature count")?;
        let mut signatures = Vec::with_capacity(usize::from(len_signers));
        for _ in 0..len_signers {
            let mut sig = [0u8; SIGNATURE_LEN];
            sig.copy_from_slice(reader.take(SIGNATURE_LEN, "signature")?);
            signatures.push(sig);
        }
        let body_start = reader.offset();
        let timestamp = reader.u32("timestamp")?;
        let nonce = reader.u32("nonce")?;
        let emitter_chain = reader.u16("emitter chain")?;
        let emitter_address = reader.bytes32("emitter address")?;
        let sequence = reader.u64("sequence")?;
        let consistency_level = reader.u8("consistency level")?;
        let payload = reader.rest().to_vec();
        let hash = body_hash(&bytes[body_start..]);
        Ok(Self {
            version,
            guardian_set_index,
            signatures,
            timestamp,
            nonce,
            emitter_chain,
            emitter_address,
            sequence,
            consistency_level,
            payload,
            hash,
        })
    }

    /// Serializes the attestation back into its signed wire form.
    ///
    /// Fails when there are more signatures than the one byte count allows.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let len_signers = u8::try_from(self.signatures.len()).map_err(|_| {
            Error::malformed(format!(
                "{} signatures do not fit the signature count",
                self.signatures.len()
            ))
        })?;
        let mut out = Vec::with_capacity(
            6 + self.signatures.len() * SIGNATURE_LEN + 51 + self.payload.len(),
        );
        out.push(self.version);
        out.extend_from_slice(&self.guardian_set_index.to_be_bytes());
        out.push(len_signers);
        for sig in &self.signatures {
            out.extend_from_slice(sig);
        }
        out.extend_from_slice(&self.body());
        Ok(out)
    }

    /// The signed body bytes.
    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(51 + self.payload.len());
        body.extend_from_slice(&self.timestamp.to_be_bytes());
        body.extend_from_slice(&self.nonce.to_be_bytes());
        body.extend_from_slice(&self.emitter_chain.to_be_bytes());
        body.extend_from_slice(self.emitter_address.as_bytes());
        body.extend_from_slice(&self.sequence.to_be_bytes());
        body.push(self.consistency_level);
        body.extend_from_slice(&self.payload);
        body
    }

    /// Builds an attestation without guardian signatures.
    ///
    /// The hash is computed from the body, so the result parses back to
    /// itself. Useful for fixtures and local tooling.
    pub fn unsigned(
        emitter_chain: WormholeChainId,
        emitter_address: H256,
        sequence: u64,
        nonce: u32,
        payload: Vec<u8>,
    ) -> Self {
        let mut vaa = Self {
            version: 1,
            guardian_set_index: 0,
            signatures: Vec::new(),
            timestamp: 0,
            nonce,
            emitter_chain,
            emitter_address,
            sequence,
            consistency_level: 1,
            payload,
            hash: H256::zero(),
        };
        vaa.hash = body_hash(&vaa.body());
        vaa
    }
}

/// The attestation hash of a body.
pub fn body_hash(body: &[u8]) -> H256 {
    H256::from(keccak256(keccak256(body)))
}

/// Converts a 20 bytes EVM address into the 32 bytes emitter form.
pub fn evm_address_to_emitter(address: ethers::types::Address) -> H256 {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(address.as_bytes());
    H256::from(out)
}

/// Takes the low 20 bytes of a 32 bytes address as an EVM address.
pub fn emitter_to_evm_address(emitter: H256) -> ethers::types::Address {
    ethers::types::Address::from_slice(&emitter.as_bytes()[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vaa {
        let payload = vec![0xde, 0xad, 0xbe, 0xef];
        let mut vaa = Vaa {
            version: 1,
            guardian_set_index: 3,
            signatures: vec![[7u8; SIGNATURE_LEN]],
            timestamp: 1_680_000_000,
            nonce: 42,
            emitter_chain: 6,
            emitter_address: H256::repeat_byte(0x11),
            sequence: 9,
            consistency_level: 15,
            payload,
            hash: H256::zero(),
        };
        vaa.hash = body_hash(&vaa.body());
        vaa
    }

    #[test]
    fn parses_signed_attestation() {
        let vaa = sample();
        let bytes = vaa.encode().unwrap();
        // 6 header + 66 signature + 51 body header + 4 payload.
        assert_eq!(bytes.len(), 127);
        let parsed = Vaa::parse(&bytes).unwrap();
        assert_eq!(parsed, vaa);
        assert_eq!(parsed.hash, body_hash(&bytes[72..]));
    }

    #[test]
    fn truncated_body_is_malformed() {
        let bytes = sample().encode().unwrap();
        let err = Vaa::parse(&bytes[..80]).unwrap_err();
        assert!(matches!(err, Error::MalformedPayload { .. }));
    }

    #[test]
    fn missing_signatures_are_malformed() {
        let mut bytes = sample().encode().unwrap();
        // claim two signatures while only one is present.
        bytes[5] = 2;
        bytes.truncate(6 + SIGNATURE_LEN + 10);
        assert!(Vaa::parse(&bytes).is_err());
    }

    #[test]
    fn too_many_signatures_do_not_encode() {
        let mut vaa = sample();
        vaa.signatures = vec![[1u8; SIGNATURE_LEN]; 255];
        let bytes = vaa.encode().unwrap();
        assert_eq!(bytes[5], 255);
        assert_eq!(Vaa::parse(&bytes).unwrap().signatures.len(), 255);

        vaa.signatures.push([2u8; SIGNATURE_LEN]);
        assert!(matches!(
            vaa.encode(),
            Err(Error::MalformedPayload { reason }) if reason.contains("256")
        ));
    }

    #[test]
    fn evm_emitter_conversion() {
        let address = ethers::types::Address::repeat_byte(0xab);
        let emitter = evm_address_to_emitter(address);
        assert_eq!(&emitter.as_bytes()[..12], &[0u8; 12]);
        assert_eq!(emitter_to_evm_address(emitter), address);
    }

    #[test]
    fn unsigned_attestation_parses_back() {
        let vaa = Vaa::unsigned(6, H256::repeat_byte(3), 11, 42, vec![1, 0]);
        assert!(vaa.signatures.is_empty());
        assert_eq!(Vaa::parse(&vaa.encode().unwrap()).unwrap(), vaa);
        let other = Vaa::unsigned(6, H256::repeat_byte(3), 12, 42, vec![1, 0]);
        assert_ne!(vaa.hash, other.hash);
    }
}
