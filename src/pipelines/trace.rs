//! # Tracing of the masked language model adapter
//!
//! The adapter is executed once on synthetic inputs and its computation captured as a
//! TorchScript graph. Inputs of the traced graph are `int32` tensors (the element type mobile
//! runtimes feed), cast to `int64` inside the graph before the embedding lookups. The single
//! output is the `float32` prediction score tensor.
use crate::common::error::MlmExportError;
use crate::pipelines::masked_language::MaskedLanguageOption;
use tch::{no_grad, CModule, Device, IValue, Kind, Tensor};

/// Name of the traced method
pub const TRACED_METHOD: &str = "forward";

/// # Fixed-shape synthetic inputs used to trigger tracing
/// Token ids are drawn uniformly from the vocabulary and every position is attended to. The
/// values are never inspected.
pub struct ExampleInputs {
    /// Token ids, `int32` tensor of shape (*batch size*, *sequence_length*)
    pub input_ids: Tensor,
    /// Attention mask, `int32` tensor of ones of shape (*batch size*, *sequence_length*)
    pub attention_mask: Tensor,
}

impl ExampleInputs {
    pub fn new(
        vocab_size: i64,
        batch_size: i64,
        sequence_length: i64,
        device: Device,
    ) -> Result<ExampleInputs, MlmExportError> {
        if vocab_size <= 0 || batch_size <= 0 || sequence_length <= 0 {
            return Err(MlmExportError::ValueError(format!(
                "Invalid example input dimensions: vocabulary size {vocab_size}, batch size {batch_size}, sequence length {sequence_length}"
            )));
        }
        let input_ids = Tensor::randint(
            vocab_size,
            [batch_size, sequence_length],
            (Kind::Int64, device),
        )
        .to_kind(Kind::Int);
        let attention_mask = Tensor::ones([batch_size, sequence_length], (Kind::Int, device));
        Ok(ExampleInputs {
            input_ids,
            attention_mask,
        })
    }

    pub fn shape(&self) -> Vec<i64> {
        self.input_ids.size()
    }

    fn as_ivalues(&self) -> [IValue; 2] {
        [
            IValue::Tensor(self.input_ids.shallow_clone()),
            IValue::Tensor(self.attention_mask.shallow_clone()),
        ]
    }
}

/// Traces the forward pass of `model` against `inputs`. The model variables must be loaded (and
/// frozen) before tracing: they are captured as constants of the returned module.
///
/// # Arguments
///
/// * `model` - `MaskedLanguageOption` adapter to trace
/// * `inputs` - `ExampleInputs` defining the (fixed) input shapes of the traced graph
/// * `module_name` - Name given to the TorchScript module
pub fn trace_masked_lm(
    model: &MaskedLanguageOption,
    inputs: &ExampleInputs,
    module_name: &str,
) -> Result<CModule, MlmExportError> {
    let mut forward_error = None;
    let mut forward = |inputs: &[Tensor]| -> Vec<Tensor> {
        let input_ids = inputs[0].to_kind(Kind::Int64);
        let attention_mask = inputs[1].to_kind(Kind::Int64);
        match model.forward(&input_ids, &attention_mask) {
            Ok(prediction_scores) => vec![prediction_scores.to_kind(Kind::Float)],
            Err(error) => {
                forward_error = Some(error);
                vec![input_ids]
            }
        }
    };

    let traced = no_grad(|| {
        CModule::create_by_tracing(
            module_name,
            TRACED_METHOD,
            &[
                inputs.input_ids.shallow_clone(),
                inputs.attention_mask.shallow_clone(),
            ],
            &mut forward,
        )
    });
    if let Some(error) = forward_error {
        return Err(error);
    }
    let mut traced = traced?;
    traced.set_eval();
    Ok(traced)
}

/// Runs the traced module once on `inputs` and checks the shape and type of its output.
///
/// # Returns
///
/// * `Vec<i64>` shape of the prediction scores, equal to `expected_shape`
pub fn verify_traced_module(
    module: &CModule,
    inputs: &ExampleInputs,
    expected_shape: &[i64],
) -> Result<Vec<i64>, MlmExportError> {
    let output = no_grad(|| module.method_is(TRACED_METHOD, &inputs.as_ivalues()))?;
    let prediction_scores = match output {
        IValue::Tensor(tensor) => tensor,
        IValue::Tuple(mut values) if values.len() == 1 => match values.remove(0) {
            IValue::Tensor(tensor) => tensor,
            other => {
                return Err(MlmExportError::ValueError(format!(
                    "Traced module returned a non-tensor output: {other:?}"
                )))
            }
        },
        other => {
            return Err(MlmExportError::ValueError(format!(
                "Traced module returned an unexpected output: {other:?}"
            )))
        }
    };

    let output_shape = prediction_scores.size();
    if output_shape != expected_shape {
        return Err(MlmExportError::ValueError(format!(
            "Traced output shape {output_shape:?} does not match the expected shape {expected_shape:?}"
        )));
    }
    if prediction_scores.kind() != Kind::Float {
        return Err(MlmExportError::ValueError(format!(
            "Traced output has type {:?}, expected Float",
            prediction_scores.kind()
        )));
    }
    log::debug!("traced module output shape: {output_shape:?}");
    Ok(output_shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_inputs_have_fixed_shape_and_int32_type() -> Result<(), MlmExportError> {
        let inputs = ExampleInputs::new(30, 1, 128, Device::Cpu)?;

        assert_eq!(inputs.shape(), vec![1, 128]);
        assert_eq!(inputs.input_ids.kind(), Kind::Int);
        assert_eq!(inputs.attention_mask.kind(), Kind::Int);
        assert_eq!(inputs.attention_mask.sum(Kind::Int64).int64_value(&[]), 128);
        assert!(inputs.input_ids.max().int64_value(&[]) < 30);
        assert!(inputs.input_ids.min().int64_value(&[]) >= 0);
        Ok(())
    }

    #[test]
    fn empty_vocabulary_is_rejected() {
        assert!(ExampleInputs::new(0, 1, 128, Device::Cpu).is_err());
    }
}
