//! Structural trees for known model families.
//!
//! Mirrors each family's module hierarchy and naming closely enough for
//! classification: child order, class names, and which leaves are
//! projections or norms. Anything irrelevant to the planner (dropouts,
//! activations) appears as an ordinary leaf.

use shardplan::Module;

fn linear() -> Module {
    Module::linear("Linear")
}

fn embedding() -> Module {
    Module::other("Embedding")
}

fn repeated_list(block: impl Fn() -> Module, count: usize) -> Module {
    let mut list = Module::repeated("ModuleList");
    for i in 0..count {
        list.push_child(i.to_string(), block());
    }
    list
}

/// Llama-family decoder (`LlamaForCausalLM`): pre-norm blocks with
/// separate Q/K/V/O and gated MLP projections.
#[must_use]
pub fn llama(num_layers: usize) -> Module {
    let decoder_layer = || {
        Module::other("LlamaDecoderLayer")
            .with_child(
                "self_attn",
                Module::other("LlamaAttention")
                    .with_child("q_proj", linear())
                    .with_child("k_proj", linear())
                    .with_child("v_proj", linear())
                    .with_child("o_proj", linear()),
            )
            .with_child(
                "mlp",
                Module::other("LlamaMLP")
                    .with_child("gate_proj", linear())
                    .with_child("up_proj", linear())
                    .with_child("down_proj", linear()),
            )
            .with_child("input_layernorm", Module::norm("LlamaRMSNorm"))
            .with_child("post_attention_layernorm", Module::norm("LlamaRMSNorm"))
    };

    Module::other("LlamaForCausalLM")
        .with_child(
            "model",
            Module::other("LlamaModel")
                .with_child("embed_tokens", embedding())
                .with_child("layers", repeated_list(decoder_layer, num_layers))
                .with_child("norm", Module::norm("LlamaRMSNorm"))
                .with_child("rotary_emb", Module::other("LlamaRotaryEmbedding")),
        )
        .with_child("lm_head", linear())
}

/// OPT-family decoder (`OPTForCausalLM`): post-norm blocks with
/// `out_proj` attention output and plain `fc1`/`fc2` MLP.
#[must_use]
pub fn opt(num_layers: usize) -> Module {
    let decoder_layer = || {
        Module::other("OPTDecoderLayer")
            .with_child(
                "self_attn",
                Module::other("OPTAttention")
                    .with_child("k_proj", linear())
                    .with_child("v_proj", linear())
                    .with_child("q_proj", linear())
                    .with_child("out_proj", linear()),
            )
            .with_child("activation_fn", Module::other("ReLU"))
            .with_child("self_attn_layer_norm", Module::norm("LayerNorm"))
            .with_child("fc1", linear())
            .with_child("fc2", linear())
            .with_child("final_layer_norm", Module::norm("LayerNorm"))
    };

    Module::other("OPTForCausalLM")
        .with_child(
            "model",
            Module::other("OPTModel").with_child(
                "decoder",
                Module::other("OPTDecoder")
                    .with_child("embed_tokens", embedding())
                    .with_child("embed_positions", Module::other("OPTLearnedPositionalEmbedding"))
                    .with_child("final_layer_norm", Module::norm("LayerNorm"))
                    .with_child("layers", repeated_list(decoder_layer, num_layers)),
            ),
        )
        .with_child("lm_head", linear())
}

/// T5 encoder-decoder (`T5ForConditionalGeneration`). The family name
/// resolves through the `Stack` fallback, and the block's own sub-layers
/// sit inside a nested repetition container.
#[must_use]
pub fn t5(num_layers: usize) -> Module {
    let self_attention = || {
        Module::other("T5LayerSelfAttention")
            .with_child(
                "SelfAttention",
                Module::other("T5Attention")
                    .with_child("q", linear())
                    .with_child("k", linear())
                    .with_child("v", linear())
                    .with_child("o", linear()),
            )
            .with_child("layer_norm", Module::other("T5LayerNorm"))
            .with_child("dropout", Module::other("Dropout"))
    };
    let feed_forward = || {
        Module::other("T5LayerFF")
            .with_child(
                "DenseReluDense",
                Module::other("T5DenseActDense")
                    .with_child("wi", linear())
                    .with_child("wo", linear())
                    .with_child("dropout", Module::other("Dropout"))
                    .with_child("act", Module::other("ReLU")),
            )
            .with_child("layer_norm", Module::other("T5LayerNorm"))
            .with_child("dropout", Module::other("Dropout"))
    };
    let block = move || {
        let mut sub_layers = Module::repeated("ModuleList");
        sub_layers.push_child("0", self_attention());
        sub_layers.push_child("1", feed_forward());
        Module::other("T5Block").with_child("layer", sub_layers)
    };
    let stack = |count: usize| {
        Module::other("T5Stack")
            .with_child("embed_tokens", embedding())
            .with_child("block", repeated_list(&block, count))
            .with_child("final_layer_norm", Module::other("T5LayerNorm"))
            .with_child("dropout", Module::other("Dropout"))
    };

    Module::other("T5ForConditionalGeneration")
        .with_child("shared", embedding())
        .with_child("encoder", stack(num_layers))
        .with_child("decoder", stack(num_layers))
        .with_child("lm_head", linear())
}

/// GPT-2 (`GPT2LMHeadModel`): fused QKV in `Conv1D` modules, which the
/// classifier cannot split — the family is deny-listed and inference on
/// this tree fails accordingly.
#[must_use]
pub fn gpt2(num_layers: usize) -> Module {
    let block = || {
        Module::other("GPT2Block")
            .with_child("ln_1", Module::norm("LayerNorm"))
            .with_child(
                "attn",
                Module::other("GPT2Attention")
                    .with_child("c_attn", Module::other("Conv1D"))
                    .with_child("c_proj", Module::other("Conv1D")),
            )
            .with_child("ln_2", Module::norm("LayerNorm"))
            .with_child(
                "mlp",
                Module::other("GPT2MLP")
                    .with_child("c_fc", Module::other("Conv1D"))
                    .with_child("c_proj", Module::other("Conv1D"))
                    .with_child("act", Module::other("NewGELUActivation")),
            )
    };

    Module::other("GPT2LMHeadModel")
        .with_child(
            "transformer",
            Module::other("GPT2Model")
                .with_child("wte", embedding())
                .with_child("wpe", embedding())
                .with_child("drop", Module::other("Dropout"))
                .with_child("h", repeated_list(block, num_layers))
                .with_child("ln_f", Module::norm("LayerNorm")),
        )
        .with_child("lm_head", linear())
}
