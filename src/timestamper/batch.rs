use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};

use super::strategy::{SealingMaterial, TimestampStrategy};
use super::task::TimestampTask;
use crate::error::{MessageLogError, MessageLogResult};
use crate::hashchain::{BuiltHashChain, DigestAlgorithm, HashChainBuilder};

/// Timestamps many records under one token
///
/// With more than one record the TSA stamps the JSON form of the hash chain
/// result; each record later proves membership through its own chain. A task
/// of one record stamps the decoded signature hash directly.
pub struct BatchTimestampRequest {
    task: TimestampTask,
    algorithm: DigestAlgorithm,
    built: Option<BuiltHashChain>,
    result_json: Option<String>,
}

impl BatchTimestampRequest {
    pub fn new(task: TimestampTask, algorithm: DigestAlgorithm) -> Self {
        Self {
            task,
            algorithm,
            built: None,
            result_json: None,
        }
    }

    fn decoded_hashes(&self) -> MessageLogResult<Vec<Vec<u8>>> {
        self.task
            .signature_hashes()
            .iter()
            .map(|h| STANDARD.decode(h).map_err(MessageLogError::from))
            .collect()
    }
}

#[async_trait]
impl TimestampStrategy for BatchTimestampRequest {
    fn task(&self) -> &TimestampTask {
        &self.task
    }

    async fn data_to_stamp(&mut self) -> MessageLogResult<Vec<u8>> {
        let mut hashes = self.decoded_hashes()?;
        if hashes.len() == 1 {
            return Ok(hashes.remove(0));
        }

        let built = HashChainBuilder::build(self.algorithm, hashes)?;
        let result_json = built.result.to_json()?;
        let data = result_json.clone().into_bytes();

        tracing::debug!(
            records = self.task.len(),
            "Hash chain built for batch timestamp"
        );

        self.built = Some(built);
        self.result_json = Some(result_json);
        Ok(data)
    }

    async fn on_success(&mut self, _token_der: &[u8]) -> MessageLogResult<SealingMaterial> {
        let Some(built) = &self.built else {
            return Ok(SealingMaterial::default());
        };

        let hash_chains = built
            .chains
            .iter()
            .map(|chain| chain.to_json())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SealingMaterial {
            hash_chain_result: self.result_json.clone(),
            hash_chains: Some(hash_chains),
            signature: None,
        })
    }
}
