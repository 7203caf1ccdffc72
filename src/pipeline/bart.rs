//! BART encoder and decoder operations.

use ndarray::{Array1, Array2, Array3, Array4};
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};

/// Encoder output `(batch, text tokens, embed)`.
pub type EncoderState = Array3<f32>;

/// Decoder key/value cache `(layers, 4 * samples, image tokens, embed)`.
pub type AttentionState = Array4<f32>;

/// Encode text token rows.
///
/// # Arguments
///
/// * `encoder` - ONNX session for the BART encoder
/// * `text_tokens` - Token rows `(batch, 64)`, unconditioned rows first
///
/// # Errors
///
/// Returns an error if inference fails.
pub fn encode(encoder: &mut Session, text_tokens: &Array2<i64>) -> Result<EncoderState> {
    let input_value =
        Tensor::from_array(text_tokens.clone()).map_err(|source| Error::Inference { source })?;

    let outputs = encoder
        .run(ort::inputs!["text_tokens" => input_value])
        .map_err(|source| Error::Inference { source })?;

    let output = outputs
        .values()
        .next()
        .ok_or_else(|| Error::ShapeMismatch {
            expected: "encoder_state output".to_string(),
            actual: "no output".to_string(),
        })?;

    let (dims, data) = extract(&output)?;
    if dims.len() != 3 {
        return Err(Error::ShapeMismatch {
            expected: "3D encoder state".to_string(),
            actual: format!("{}D tensor", dims.len()),
        });
    }

    Array3::from_shape_vec((dims[0], dims[1], dims[2]), data).map_err(|_| {
        Error::ShapeMismatch {
            expected: format!("{dims:?}"),
            actual: "reshape failed".to_string(),
        }
    })
}

/// Inputs for one decoder step.
pub struct DecodeStep<'a> {
    pub attention_mask: &'a Array2<i64>,
    pub encoder_state: &'a EncoderState,
    pub attention_state: AttentionState,
    pub prev_tokens: &'a Array1<i64>,
    pub token_index: i64,
}

/// Run one decoder step.
///
/// Returns the logits `(batch, vocab)` and the updated attention state.
///
/// # Errors
///
/// Returns an error if inference fails or the outputs have the wrong shape.
pub fn decode_step(
    decoder: &mut Session,
    step: DecodeStep<'_>,
) -> Result<(Array2<f32>, AttentionState)> {
    let mask_value = Tensor::from_array(step.attention_mask.clone())
        .map_err(|source| Error::Inference { source })?;
    let encoder_value = Tensor::from_array(step.encoder_state.clone())
        .map_err(|source| Error::Inference { source })?;
    let state_shape = step.attention_state.dim();
    let state_value =
        Tensor::from_array(step.attention_state).map_err(|source| Error::Inference { source })?;
    let prev_value = Tensor::from_array(step.prev_tokens.clone())
        .map_err(|source| Error::Inference { source })?;
    let index_value = Tensor::from_array(Array1::from_vec(vec![step.token_index]))
        .map_err(|source| Error::Inference { source })?;

    let outputs = decoder
        .run(ort::inputs![
            "attention_mask" => mask_value,
            "encoder_state" => encoder_value,
            "attention_state" => state_value,
            "prev_tokens" => prev_value,
            "token_index" => index_value,
        ])
        .map_err(|source| Error::Inference { source })?;

    let mut values = outputs.values();
    let logits = values.next().ok_or_else(|| Error::ShapeMismatch {
        expected: "logits output".to_string(),
        actual: "no output".to_string(),
    })?;
    let state = values.next().ok_or_else(|| Error::ShapeMismatch {
        expected: "attention_state output".to_string(),
        actual: "one output".to_string(),
    })?;

    // Logits arrive as (batch, 1, vocab); the middle axis is dropped.
    let (dims, data) = extract(&logits)?;
    let batch = dims.first().copied().unwrap_or(0);
    let vocab = dims.last().copied().unwrap_or(0);
    if batch == 0 || batch * vocab != data.len() {
        return Err(Error::ShapeMismatch {
            expected: "(batch, 1, vocab) logits".to_string(),
            actual: format!("{dims:?}"),
        });
    }
    let logits = Array2::from_shape_vec((batch, vocab), data).map_err(|_| {
        Error::ShapeMismatch {
            expected: format!("{dims:?}"),
            actual: "reshape failed".to_string(),
        }
    })?;

    let (_, data) = extract(&state)?;
    let state = Array4::from_shape_vec(state_shape, data).map_err(|_| Error::ShapeMismatch {
        expected: format!("{state_shape:?}"),
        actual: "attention state of a different size".to_string(),
    })?;

    Ok((logits, state))
}

/// Extract a flat f32 tensor and its dimensions from an ONNX value.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub(super) fn extract(value: &ort::value::ValueRef<'_>) -> Result<(Vec<usize>, Vec<f32>)> {
    let (shape_info, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|source| Error::Inference { source })?;

    // Safe: tensor dimensions are always non-negative and within bounds
    let dims: Vec<usize> = shape_info.iter().map(|&x| x as usize).collect();

    Ok((dims, data.to_vec()))
}
