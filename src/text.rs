use crate::config::{OnnxModelConfig, OpenClipConfig};
use crate::encoder::TextEncoder;
use crate::error::{Result, SearchError};
use crate::onnx::OnnxSession;
use crate::utils::normalize;
use ndarray::Array1;
use ort::value::Tensor;
use std::path::Path;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// CLIP text tower exported to ONNX, paired with its HF tokenizer.
pub struct ClipTextEncoder {
    session: OnnxSession,
    tokenizer: Tokenizer,
    model_config: OnnxModelConfig,
    context_length: usize,
    embed_dim: usize,
    id_name: String,
    mask_name: Option<String>,
}

impl ClipTextEncoder {
    /// Load `text.onnx`, `tokenizer.json`, `open_clip_config.json` and
    /// `model_config.json` from `model_dir`.
    ///
    /// With `truncate` off, queries longer than the context length fail with
    /// [`SearchError::Encoding`] instead of being cut.
    pub fn new(model_dir: &Path, truncate: bool) -> Result<Self> {
        let session = OnnxSession::new(model_dir.join("text.onnx"))?;
        let config = OpenClipConfig::from_file(model_dir.join("open_clip_config.json"))?;
        let model_config = OnnxModelConfig::from_file(model_dir.join("model_config.json"))?;
        let mut tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| SearchError::Config(format!("tokenizer: {e}")))?;

        let context_length = config.model_cfg.text_cfg.context_length;
        configure_tokenizer(&mut tokenizer, context_length, model_config.pad_id, truncate)?;

        let id_name = session
            .find_input(&["input_ids", "text"])
            .ok_or_else(|| SearchError::Config("Could not find text input node".into()))?;
        let mask_name = session.find_input(&["attention_mask"]);

        Ok(Self {
            session,
            tokenizer,
            model_config,
            context_length,
            embed_dim: config.model_cfg.embed_dim,
            id_name,
            mask_name,
        })
    }

    /// Width of the vectors this encoder produces.
    #[must_use]
    pub const fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    /// Token ids and attention mask, both `context_length` long.
    pub fn tokenize(&self, text: &str) -> Result<(Vec<i64>, Vec<i64>)> {
        if self.model_config.tokenizer_needs_lowercase {
            encode_ids(&self.tokenizer, &text.to_lowercase(), self.context_length)
        } else {
            encode_ids(&self.tokenizer, text, self.context_length)
        }
    }
}

/// Pad every encoding to `context_length`. The pad id comes from `pad_id`,
/// else the `<pad>` vocab entry, else 0. Long inputs are only cut when
/// `truncate` is set.
pub fn configure_tokenizer(
    tokenizer: &mut Tokenizer,
    context_length: usize,
    pad_id: Option<u32>,
    truncate: bool,
) -> Result<()> {
    let pad_id = pad_id
        .or_else(|| tokenizer.get_vocab(true).get("<pad>").copied())
        .unwrap_or(0);
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::Fixed(context_length),
        pad_id,
        ..Default::default()
    }));
    let truncation = truncate.then(|| TruncationParams {
        max_length: context_length,
        ..Default::default()
    });
    tokenizer
        .with_truncation(truncation)
        .map_err(|e| SearchError::Config(format!("tokenizer: {e}")))?;
    Ok(())
}

/// Encode `text` into ids and attention mask. Fails with
/// [`SearchError::Encoding`] when the tokens do not fit `context_length`.
pub fn encode_ids(
    tokenizer: &Tokenizer,
    text: &str,
    context_length: usize,
) -> Result<(Vec<i64>, Vec<i64>)> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| SearchError::Encoding(e.to_string()))?;

    let token_count = encoding.get_ids().len();
    if token_count > context_length {
        return Err(SearchError::Encoding(format!(
            "query is {token_count} tokens, the model accepts at most {context_length}"
        )));
    }

    let ids = encoding.get_ids().iter().map(|&x| i64::from(x)).collect();
    let mask = encoding
        .get_attention_mask()
        .iter()
        .map(|&x| i64::from(x))
        .collect();
    Ok((ids, mask))
}

impl TextEncoder for ClipTextEncoder {
    fn encode(&self, text: &str) -> Result<Array1<f32>> {
        let (ids, mask) = self.tokenize(text)?;
        let shape = [1, self.context_length];

        let ids = Tensor::from_array((shape, ids))?;
        let embeddings = if let Some(mask_name) = &self.mask_name {
            let mask = Tensor::from_array((shape, mask))?;
            self.session
                .run_embeddings(ort::inputs![&self.id_name => ids, mask_name => mask])?
        } else {
            self.session
                .run_embeddings(ort::inputs![&self.id_name => ids])?
        };

        let row = embeddings
            .outer_iter()
            .next()
            .ok_or_else(|| SearchError::Inference("text model returned no rows".into()))?
            .to_owned();
        Ok(normalize(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTEXT: usize = 6;

    // word-level vocab split on whitespace, the same JSON layout as an exported tokenizer.json
    fn tokenizer(truncate: bool) -> Tokenizer {
        let json = r#"{
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": { "[UNK]": 0, "a": 1, "red": 2, "car": 3, "on": 4, "bridge": 5, "<pad>": 9 },
                "unk_token": "[UNK]"
            }
        }"#;
        let mut tokenizer: Tokenizer = json.parse().unwrap();
        configure_tokenizer(&mut tokenizer, CONTEXT, None, truncate).unwrap();
        tokenizer
    }

    #[test]
    fn short_query_is_padded_to_the_context() {
        let (ids, mask) = encode_ids(&tokenizer(false), "a red car", CONTEXT).unwrap();
        assert_eq!(ids, vec![1, 2, 3, 9, 9, 9]);
        assert_eq!(mask, vec![1, 1, 1, 0, 0, 0]);
    }

    #[test]
    fn long_query_is_an_encoding_error() {
        let err = encode_ids(
            &tokenizer(false),
            "a red car on a red bridge",
            CONTEXT,
        )
        .unwrap_err();
        assert!(matches!(err, SearchError::Encoding(_)));
    }

    #[test]
    fn truncation_cuts_long_queries_when_enabled() {
        let (ids, mask) =
            encode_ids(&tokenizer(true), "a red car on a red bridge", CONTEXT).unwrap();
        assert_eq!(ids, vec![1, 2, 3, 4, 1, 2]);
        assert_eq!(mask, vec![1; CONTEXT]);
    }

    #[test]
    fn explicit_pad_id_wins_over_the_vocab() {
        let mut tokenizer = tokenizer(false);
        configure_tokenizer(&mut tokenizer, CONTEXT, Some(7), false).unwrap();
        let (ids, _) = encode_ids(&tokenizer, "car", CONTEXT).unwrap();
        assert_eq!(ids, vec![3, 7, 7, 7, 7, 7]);
    }
}
