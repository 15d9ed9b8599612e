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

use std::time::Duration;

use base64::Engine;
use ethers::types::{Bytes, H256};
use serde::Deserialize;
use webb_relayer_types::WormholeChainId;
use webb_relayer_utils::Result;

use crate::AttestationFetcher;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedVaaResponse {
    vaa_bytes: String,
}

/// Fetches signed attestations from a guardian REST endpoint.
#[derive(Debug, Clone)]
pub struct GuardianRpcClient {
    client: reqwest::Client,
    base_url: url::Url,
}

impl GuardianRpcClient {
    /// Creates a client for `base_url`, every request gives up after `timeout`.
    pub fn new(base_url: url::Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    fn signed_vaa_url(
        &self,
        chain_id: WormholeChainId,
        emitter: H256,
        sequence: u64,
    ) -> Result<url::Url> {
        let path = format!(
            "v1/signed_vaa/{chain_id}/{}/{sequence}",
            hex::encode(emitter.as_bytes())
        );
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        Ok(base.join(&path)?)
    }
}

#[async_trait::async_trait]
impl AttestationFetcher for GuardianRpcClient {
    #[tracing::instrument(skip(self), fields(emitter = %hex::encode(emitter)))]
    async fn fetch_by_emitter_sequence(
        &self,
        chain_id: WormholeChainId,
        emitter: H256,
        sequence: u64,
    ) -> Result<Option<Bytes>> {
        let url = self.signed_vaa_url(chain_id, emitter, sequence)?;
        let response = self.client.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::trace!("attestation not signed yet");
            return Ok(None);
        }
        let body: SignedVaaResponse =
            response.error_for_status()?.json().await?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(body.vaa_bytes)?;
        Ok(Some(Bytes::from(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EMITTER: &str =
        "00000000000000000000000053855d4b64e9a3cf59a84bc768ada716b5536bc5";

    fn emitter() -> H256 {
        H256::from_slice(&hex::decode(EMITTER).unwrap())
    }

    async fn client(server: &MockServer) -> GuardianRpcClient {
        GuardianRpcClient::new(
            server.uri().parse().unwrap(),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn fetches_and_decodes_signed_vaa() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/signed_vaa/2/{EMITTER}/7")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "vaaBytes": "AQID" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).await;
        let bytes = client
            .fetch_by_emitter_sequence(2, emitter(), 7)
            .await
            .unwrap();
        assert_eq!(bytes, Some(Bytes::from(vec![1, 2, 3])));
    }

    #[tokio::test]
    async fn not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let bytes = client
            .fetch_by_emitter_sequence(2, emitter(), 8)
            .await
            .unwrap();
        assert_eq!(bytes, None);
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let err = client
            .fetch_by_emitter_sequence(2, emitter(), 9)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn keeps_the_base_path() {
        let client = GuardianRpcClient::new(
            "http://guardian.local/api".parse().unwrap(),
            Duration::from_secs(1),
        )
        .unwrap();
        let url = client.signed_vaa_url(6, emitter(), 1).unwrap();
        assert_eq!(
            url.as_str(),
            format!("http://guardian.local/api/v1/signed_vaa/6/{EMITTER}/1")
        );
    }
}
