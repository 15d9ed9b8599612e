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

#![warn(missing_docs)]
//! # Relayer Utils Module 🕸️
//!
//! Shared error type, retry policies and logging helpers used across the
//! generic relayer crates.

use ethers::core::k256::ecdsa::SigningKey;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Provider, RetryClient};
use ethers::signers::Wallet;

/// Clickable terminal links for explorer URLs.
pub mod clickable_link;
/// A module used for debugging relayer lifecycle, sync state, or other relayer state.
pub mod probe;
/// Retry functionality
pub mod retry;

/// The read-only EVM client, retrying rate limited requests.
pub type EvmProvider = Provider<RetryClient<Http>>;

/// The signing client used to submit transactions on EVM chains.
pub type EvmSignerClient = SignerMiddleware<EvmProvider, Wallet<SigningKey>>;

/// An enum of all possible errors that could be encountered during the execution of the
/// Generic Relayer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while iterating over a glob pattern.
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    /// Error from Glob Iterator.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// Hex decoding error.
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
    /// Base64 decoding error.
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    /// Elliptic Curve error.
    #[error(transparent)]
    EllipticCurve(#[from] ethers::core::k256::elliptic_curve::Error),
    /// Error in Http Provider (ethers client).
    #[error(transparent)]
    EthersProvider(#[from] ethers::providers::ProviderError),
    /// ABI encoding or log decoding error.
    #[error(transparent)]
    EthersAbi(#[from] ethers::core::abi::Error),
    /// Smart contract error.
    #[error(transparent)]
    EthersContractCall(#[from] ethers::contract::ContractError<EvmProvider>),
    /// Smart contract error.
    #[error(transparent)]
    EthersContractCallWithSigner(
        #[from] ethers::contract::ContractError<EvmSignerClient>,
    ),
    /// Ether wallet errors.
    #[error(transparent)]
    EtherWalletError(#[from] ethers::signers::WalletError),
    /// Sled database error.
    #[error(transparent)]
    Sled(#[from] sled::Error),
    /// Sled transaction error.
    #[error(transparent)]
    SledTransaction(
        #[from] sled::transaction::TransactionError<std::io::Error>,
    ),
    /// Reqwest error
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
    /// Error while parsing the config files.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// EVM Chain not found.
    #[error("Chain Not Found: {}", chain_id)]
    ChainNotFound {
        /// The chain id of the chain.
        chain_id: String,
    },
    /// Two enabled chains share one wormhole chain id.
    #[error("Duplicate wormhole chain id {} in the config", _0)]
    DuplicateChainId(u16),
    /// Missing Secrets in the config, the private key in most cases.
    #[error("Missing required private-key in the config")]
    MissingSecrets,
    /// The payload bytes do not match the expected wire layout.
    #[error("Malformed payload: {}", reason)]
    MalformedPayload {
        /// What went wrong while decoding.
        reason: String,
    },
    /// An attestation is not (yet) available from the guardian network.
    #[error(
        "Attestation {}/{}/{} is not available",
        emitter_chain,
        hex::encode(emitter_address),
        sequence
    )]
    DependencyUnavailable {
        /// The chain the attestation was emitted on.
        emitter_chain: u16,
        /// The 32 bytes emitter address.
        emitter_address: [u8; 32],
        /// The emitter sequence.
        sequence: u64,
    },
    /// The relayer signer is not approved by the relay provider on the target chain.
    #[error("Sender {:?} is not approved on chain {}", sender, chain_id)]
    SenderNotApproved {
        /// The target chain.
        chain_id: u16,
        /// Our signer address.
        sender: ethers::types::Address,
    },
    /// The delivery request did not carry enough value for its targets.
    #[error("Delivery request is not sufficiently funded")]
    InsufficientFunding,
    /// The on-chain delivery call reverted or could not be sent.
    #[error("Submission failed on chain {}: {}", chain_id, reason)]
    SubmissionFailed {
        /// The target chain.
        chain_id: u16,
        /// Why the submission failed.
        reason: String,
    },
    /// The source transaction has no logs from the core bridge contract.
    #[error("No core contract interactions found for this transaction")]
    NoCoreBridgeLogs,
    /// The source transaction has no message emitted by the relay contract.
    #[error("No relay contract message found for this transaction")]
    RelayLogNotFound,
    /// The requested relay message index is larger than the number of relay messages.
    #[error("Relay message index {} is out of range ({} found)", index, len)]
    LogIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// How many relay messages were found.
        len: usize,
    },
    /// The source transaction was not found or is not mined yet.
    #[error("Transaction {:?} has not been mined", _0)]
    TransactionNotFound(ethers::types::H256),
}

/// A type alias for the result for webb relayer, that uses the `Error` enum.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for building a [`Error::MalformedPayload`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same operation later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Reqwest(_)
                | Self::EthersProvider(_)
                | Self::DependencyUnavailable { .. }
                | Self::TransactionNotFound(_)
        )
    }
}
