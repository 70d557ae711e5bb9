use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};
use zk_primitives::PublicInputs;

use crate::{CircuitInputs, Error, Result};

/// A spend proof and the public inputs it proves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    pub bytes: Vec<u8>,
    pub public_inputs: PublicInputs,
}

/// Turns circuit inputs into a proof
///
/// Proving can take tens of seconds. Implementations must be safe to cancel by dropping the
/// future.
#[async_trait]
pub trait Prover: Send + Sync {
    async fn prove(&self, inputs: &CircuitInputs) -> Result<Proof>;
}

#[async_trait]
impl<P: Prover + ?Sized> Prover for Arc<P> {
    async fn prove(&self, inputs: &CircuitInputs) -> Result<Proof> {
        (**self).prove(inputs).await
    }
}

/// A [`Prover`] backed by a prove server
///
/// Posts the inputs as JSON to `{url}/api/prove`. The server answers with
/// `{ "proof": "0x…", "publicInputs": ["0x…", …] }`, or `{ "error": "…" }` with a non-success
/// status.
#[derive(Debug, Clone)]
pub struct HttpProver {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProveResponse {
    Proof {
        proof: String,
        #[serde(rename = "publicInputs")]
        public_inputs: Vec<String>,
    },
    Error {
        error: String,
    },
}

impl HttpProver {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/prove", base_url.trim_end_matches('/')),
            timeout,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn parse_response(status: StatusCode, body: &[u8]) -> Result<Proof> {
        let response: ProveResponse = serde_json::from_slice(body).map_err(|err| {
            Error::MalformedProverResponse(format!("status {status}: {err}"))
        })?;

        match response {
            ProveResponse::Error { error } => Err(Error::Prover(error)),
            ProveResponse::Proof { .. } if !status.is_success() => Err(Error::Prover(format!(
                "prove server returned status {status}"
            ))),
            ProveResponse::Proof {
                proof,
                public_inputs,
            } => {
                if public_inputs.len() != PublicInputs::LEN {
                    return Err(Error::MalformedProverResponse(format!(
                        "expected {} public inputs, got {}",
                        PublicInputs::LEN,
                        public_inputs.len()
                    )));
                }

                let public_inputs = PublicInputs::from_hex_words(&public_inputs)
                    .map_err(|err| Error::MalformedProverResponse(err.to_string()))?;
                let bytes = hex::decode(proof.trim_start_matches("0x"))
                    .map_err(|err| Error::MalformedProverResponse(format!("proof: {err}")))?;

                Ok(Proof {
                    bytes,
                    public_inputs,
                })
            }
        }
    }
}

#[async_trait]
impl Prover for HttpProver {
    #[tracing::instrument(err, skip_all, fields(endpoint = %self.endpoint))]
    async fn prove(&self, inputs: &CircuitInputs) -> Result<Proof> {
        let request = self.client.post(&self.endpoint).json(inputs).send();

        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(response) => response?,
            Err(_) => {
                warn!(timeout = ?self.timeout, "prove request timed out");
                return Err(Error::ProverTimeout(self.timeout));
            }
        };

        let status = response.status();
        let body = match tokio::time::timeout(self.timeout, response.bytes()).await {
            Ok(body) => body?,
            Err(_) => return Err(Error::ProverTimeout(self.timeout)),
        };

        let proof = Self::parse_response(status, &body)?;
        debug!(proof_len = proof.bytes.len(), "proof received");

        Ok(proof)
    }
}
