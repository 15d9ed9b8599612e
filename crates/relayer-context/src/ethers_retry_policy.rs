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

use ethers::providers::{HttpClientError, JsonRpcError, RetryPolicy};

/// Implements [RetryPolicy] that will retry requests that errored with
/// status code 429 i.e. TOO_MANY_REQUESTS
///
/// Infura often fails with a `"header not found"` rpc error which is apparently linked to load
/// balancing, which are retried as well.
#[derive(Debug)]
pub struct WebbHttpRetryPolicy {
    err_regex: regex::Regex,
}

impl Default for WebbHttpRetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl WebbHttpRetryPolicy {
    /// Creates the policy.
    pub fn new() -> Self {
        Self {
            err_regex: regex::Regex::new(
                r"(?mixU)\b(?:rate|limit|429|Too \s Many \s Requests)\b",
            )
            .expect("Valid Regex"),
        }
    }

    /// The policy, boxed for [`ethers::providers::RetryClientBuilder::build`].
    pub fn boxed() -> Box<Self> {
        Box::new(Self::new())
    }
}

fn should_retry_json_rpc_error(err: &JsonRpcError) -> bool {
    let JsonRpcError { code, message, .. } = err;
    // alchemy throws it this way
    if *code == 429 {
        return true;
    }

    // This is an infura error code for `exceeded project rate limit`
    if *code == -32005 {
        return true;
    }

    // alternative alchemy error for specific IPs
    if *code == -32016 && message.contains("rate limit") {
        return true;
    }

    match message.as_str() {
        // this is commonly thrown by infura and is apparently a load balancer issue, see also <https://github.com/MetaMask/metamask-extension/issues/7234>
        "header not found" => true,
        // also thrown by infura if out of budget for the day and ratelimited
        "daily request count exceeded, request rate limited" => true,
        _ => false,
    }
}

// check json rpc error in an undecodable response body
fn should_retry_response_text(text: &str, err_regex: &regex::Regex) -> bool {
    // some providers send invalid JSON RPC in the error case (no `id:u64`), but the
    // text should be a `JsonRpcError`
    #[derive(serde::Deserialize)]
    struct Resp {
        error: JsonRpcError,
    }

    if let Ok(resp) = serde_json::from_str::<Resp>(text) {
        return should_retry_json_rpc_error(&resp.error);
    }

    let err_text = text.to_lowercase();
    // last resort, check if we have the word "rate", or "limit" in the
    // response text.
    let should_retry = err_regex.is_match(&err_text) || err_text.is_empty();

    tracing::event!(
        target: webb_relayer_utils::probe::TARGET,
        tracing::Level::DEBUG,
        kind = %webb_relayer_utils::probe::Kind::Retry,
        should_retry = should_retry,
        error = %err_text,
    );
    should_retry
}

impl RetryPolicy<HttpClientError> for WebbHttpRetryPolicy {
    fn should_retry(&self, error: &HttpClientError) -> bool {
        tracing::debug!("should_retry: {:?}", error);
        match error {
            HttpClientError::ReqwestError(err) => {
                err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS)
                    || err.is_timeout()
                    || err.is_connect()
            }
            HttpClientError::JsonRpcError(err) => {
                should_retry_json_rpc_error(err)
            }
            HttpClientError::SerdeJson { text, .. } => {
                should_retry_response_text(text, &self.err_regex)
            }
        }
    }

    fn backoff_hint(&self, error: &HttpClientError) -> Option<Duration> {
        const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

        if let HttpClientError::JsonRpcError(json_rpc_error) = error {
            if let Some(data) = &json_rpc_error.data {
                // if daily rate limit exceeded, infura returns the requested backoff in the error
                // response
                let Some(backoff_seconds) =
                    data.get("rate").and_then(|v| v.get("backoff_seconds"))
                else {
                    return Some(DEFAULT_BACKOFF);
                };
                // infura rate limit error
                if let Some(seconds) = backoff_seconds.as_u64() {
                    return Some(Duration::from_secs(seconds));
                }
                if let Some(seconds) = backoff_seconds.as_f64() {
                    return Some(Duration::from_secs(seconds as u64 + 1));
                }
            }
        }

        // A default value of 5s
        Some(DEFAULT_BACKOFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc_error(code: i64, message: &str) -> HttpClientError {
        HttpClientError::JsonRpcError(JsonRpcError {
            code,
            message: message.to_string(),
            data: None,
        })
    }

    #[test]
    fn retries_rate_limits() {
        let policy = WebbHttpRetryPolicy::new();
        assert!(policy.should_retry(&rpc_error(429, "slow down")));
        assert!(policy.should_retry(&rpc_error(-32005, "limit")));
        assert!(policy.should_retry(&rpc_error(-32000, "header not found")));
        assert!(!policy.should_retry(&rpc_error(-32000, "execution reverted")));
    }

    #[test]
    fn retries_rate_limited_bodies() {
        let policy = WebbHttpRetryPolicy::new();
        let err = serde_json::from_str::<u8>("x").unwrap_err();
        let limited = HttpClientError::SerdeJson {
            err,
            text: "Too Many Requests".to_string(),
        };
        assert!(policy.should_retry(&limited));

        let err = serde_json::from_str::<u8>("x").unwrap_err();
        let wrapped = HttpClientError::SerdeJson {
            err,
            text: r#"{"error":{"code":-32000,"message":"header not found"}}"#
                .to_string(),
        };
        assert!(policy.should_retry(&wrapped));
    }

    #[test]
    fn backoff_hint_reads_infura_payload() {
        let policy = WebbHttpRetryPolicy::new();
        let err = HttpClientError::JsonRpcError(JsonRpcError {
            code: -32005,
            message: "daily request count exceeded, request rate limited"
                .to_string(),
            data: Some(serde_json::json!({ "rate": { "backoff_seconds": 30 } })),
        });
        assert_eq!(policy.backoff_hint(&err), Some(Duration::from_secs(30)));
        assert_eq!(
            policy.backoff_hint(&rpc_error(1, "x")),
            Some(Duration::from_secs(5))
        );
    }
}
