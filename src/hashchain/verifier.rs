//! Hash chain verification

use super::digest_list::concat_digests;
use super::error::HashChainError;
use super::types::{HashChain, HashChainResult, StepValue};

/// Checks that `input` is bound to `result` through `chain`
///
/// The first step of the chain is resolved recursively (step references
/// must point to later steps), its digest list is hashed and compared with
/// the result. The input has to appear as the chain's data reference.
pub fn verify(
    result: &HashChainResult,
    chain: &HashChain,
    input: &[u8],
) -> Result<(), HashChainError> {
    if result.digest_method != chain.digest_method {
        return Err(HashChainError::AlgorithmMismatch);
    }

    if chain.steps.is_empty() {
        return if result.digest_value == input {
            Ok(())
        } else {
            Err(HashChainError::ResultMismatch)
        };
    }

    let mut verifier = Verifier {
        chain,
        input,
        input_used: false,
    };

    let top = verifier.resolve_step(0)?;
    let digest = chain.digest_method.digest(&top);
    if digest != result.digest_value {
        return Err(HashChainError::ResultMismatch);
    }

    if !verifier.input_used {
        return Err(HashChainError::InputNotReferenced);
    }

    Ok(())
}

struct Verifier<'a> {
    chain: &'a HashChain,
    input: &'a [u8],
    input_used: bool,
}

impl Verifier<'_> {
    /// DER digest list of step `index`
    fn resolve_step(&mut self, index: usize) -> Result<Vec<u8>, HashChainError> {
        let step = self.chain.steps.get(index).ok_or_else(|| {
            HashChainError::Malformed(format!("step {} does not exist", index))
        })?;

        let left = self.resolve_value(index, &step.left)?;
        let right = self.resolve_value(index, &step.right)?;
        concat_digests(self.chain.digest_method, &[&left, &right])
    }

    fn resolve_value(&mut self, index: usize, value: &StepValue) -> Result<Vec<u8>, HashChainError> {
        match value {
            StepValue::HashValue { digest } => Ok(digest.clone()),
            StepValue::StepRef { step } => {
                if *step <= index || *step >= self.chain.steps.len() {
                    return Err(HashChainError::InvalidStepReference {
                        step: index,
                        reference: *step,
                    });
                }
                let resolved = self.resolve_step(*step)?;
                Ok(self.chain.digest_method.digest(&resolved))
            }
            StepValue::DataRef { digest } => {
                if digest.as_slice() != self.input {
                    return Err(HashChainError::InputMismatch);
                }
                self.input_used = true;
                Ok(digest.clone())
            }
        }
    }
}
