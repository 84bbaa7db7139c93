//! Integration tests for model loading and writing.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use vocab_transplant::model::check_architecture;
use vocab_transplant::{
    BosHandling, DecayFactor, DonorTokenizer, DonorWeights, Error, HfConfig, ModelFiles, ModelTokenizer,
    ModelWriter, VocabTransplant,
};

fn word_level_tokenizer(vocab: &[(&str, u32)]) -> String {
    let vocab: serde_json::Map<String, serde_json::Value> = vocab
        .iter()
        .map(|(piece, id)| (piece.to_string(), serde_json::Value::from(*id)))
        .collect();
    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {"type": "WordLevel", "vocab": vocab, "unk_token": "<unk>"}
    })
    .to_string()
}

fn write_donor(dir: &Path) {
    std::fs::write(
        dir.join("config.json"),
        r#"{"vocab_size": 4, "hidden_size": 2, "tie_word_embeddings": true,
            "eos_token_id": 1, "pad_token_id": 1}"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("tokenizer.json"),
        word_level_tokenizer(&[("<unk>", 0), ("</s>", 1), ("hello", 2), ("world", 3)]),
    )
    .unwrap();
    std::fs::write(
        dir.join("generation_config.json"),
        r#"{"do_sample": false, "eos_token_id": 1, "pad_token_id": 1}"#,
    )
    .unwrap();

    let device = Device::Cpu;
    let embed = Tensor::new(&[[0.0f32, 0.5], [1.0, 1.5], [2.0, 2.5], [3.0, 3.5]], &device).unwrap();
    let norm = Tensor::new(&[1.0f32, 1.0], &device).unwrap();
    let tensors: HashMap<&str, Tensor> =
        HashMap::from([("model.embed_tokens.weight", embed), ("model.norm.weight", norm)]);
    candle_core::safetensors::save(&tensors, dir.join("model.safetensors")).unwrap();
}

fn write_target(dir: &Path) {
    std::fs::write(
        dir.join("config.json"),
        r#"{"vocab_size": 6, "hidden_size": 2}"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("tokenizer.json"),
        word_level_tokenizer(&[
            ("</s>", 0),
            ("world", 1),
            ("hello", 2),
            ("<unk>", 3),
            ("foo", 4),
        ]),
    )
    .unwrap();
    std::fs::write(
        dir.join("tokenizer_config.json"),
        r#"{"eos_token": "</s>", "add_bos_token": false}"#,
    )
    .unwrap();
}

/// Target that prepends `<s>` and names it in its chat template.
fn write_bos_target(dir: &Path) {
    std::fs::write(
        dir.join("config.json"),
        r#"{"vocab_size": 6, "hidden_size": 2, "bos_token_id": 5}"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("tokenizer.json"),
        word_level_tokenizer(&[
            ("</s>", 0),
            ("world", 1),
            ("hello", 2),
            ("<unk>", 3),
            ("foo", 4),
            ("<s>", 5),
        ]),
    )
    .unwrap();
    std::fs::write(
        dir.join("tokenizer_config.json"),
        r#"{"bos_token": "<s>", "eos_token": "</s>", "add_bos_token": true,
            "chat_template": "{{ bos_token }}{% for m in messages %}{{ m.content }}{% endfor %}"}"#,
    )
    .unwrap();
}

#[test]
fn test_missing_config_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = ModelFiles::from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, Error::ModelLoad(_)));
}

#[test]
fn test_load_donor_files() {
    let dir = tempfile::tempdir().unwrap();
    write_donor(dir.path());

    let files = ModelFiles::from_dir(dir.path()).unwrap();
    assert_eq!(files.weights, vec![dir.path().join("model.safetensors")]);
    assert!(files.tokenizer_config.is_none());
    assert!(files.generation_config.is_some());

    let config = HfConfig::load(&files.config).unwrap();
    let tokenizer = ModelTokenizer::load(&files, &config).unwrap();
    assert_eq!(tokenizer.special.eos, Some(1));
    assert_eq!(tokenizer.special.pad, Some(1));
    assert_eq!(tokenizer.special.bos, None);
    assert_eq!(tokenizer.tokenizer.unknown_token_id(), Some(0));
    assert_eq!(tokenizer.tokenizer.tokenize("hello world").unwrap(), vec![2, 3]);

    let weights = DonorWeights::open(&files.weights).unwrap();
    assert_eq!(weights.embed_name(), "model.embed_tokens.weight");
    assert_eq!(weights.head_name(), "lm_head.weight");

    let device = Device::Cpu;
    let embed = weights.embedding(None, &device).unwrap();
    let head = weights.head(true, None, &device).unwrap();
    assert_eq!(embed.dims(), &[4, 2]);
    check_architecture(&config, &embed, &head).unwrap();
}

#[test]
fn test_end_to_end_write() {
    let donor_dir = tempfile::tempdir().unwrap();
    let target_dir = tempfile::tempdir().unwrap();
    let out_root = tempfile::tempdir().unwrap();
    write_donor(donor_dir.path());
    write_target(target_dir.path());
    let output = out_root.path().join("transplanted");

    let donor_files = ModelFiles::from_dir(donor_dir.path()).unwrap();
    let target_files = ModelFiles::from_dir(target_dir.path()).unwrap();
    let donor_config = HfConfig::load(&donor_files.config).unwrap();
    let target_config = HfConfig::load(&target_files.config).unwrap();
    let donor_tokenizer = ModelTokenizer::load(&donor_files, &donor_config).unwrap();
    let target_tokenizer = ModelTokenizer::load(&target_files, &target_config).unwrap();
    let target_vocab = target_tokenizer.vocabulary().unwrap();
    assert_eq!(target_vocab.len(), 5);

    let device = Device::Cpu;
    let weights = DonorWeights::open(&donor_files.weights).unwrap();
    let embed = weights.embedding(Some(DType::F32), &device).unwrap();
    let head = weights
        .head(donor_config.tie_word_embeddings(), Some(DType::F32), &device)
        .unwrap();

    let out = VocabTransplant::new(&target_vocab, &donor_tokenizer.tokenizer)
        .special_tokens(donor_tokenizer.special, target_tokenizer.special)
        .decay(DecayFactor::new(0.5).unwrap())
        .run(&embed, &head, target_config.vocab_size().unwrap())
        .unwrap();

    assert_eq!(out.mapping.donor_ids(0), Some(&[1][..]));
    assert_eq!(out.mapping.donor_ids(1), Some(&[3][..]));
    assert_eq!(out.mapping.donor_ids(2), Some(&[2][..]));
    assert_eq!(out.report.special.bos, BosHandling::Unchanged);

    let writer = ModelWriter {
        donor_weights: &weights,
        donor_config: &donor_config,
        donor_generation_config: donor_files.generation_config.as_deref(),
        target_tokenizer_files: &target_files.tokenizer_files,
        target_special: target_tokenizer.special,
        dtype: Some(DType::F32),
        device: &device,
    };
    writer
        .write(&output, &out.embeddings, out.report.special.bos, false)
        .unwrap();

    let written = candle_core::safetensors::load(output.join("model.safetensors"), &device).unwrap();
    assert_eq!(written.len(), 3);
    let embed_out = &written["model.embed_tokens.weight"];
    let head_out = &written["lm_head.weight"];
    assert_eq!(embed_out.dims(), &[6, 2]);
    assert_eq!(head_out.dims(), &[6, 2]);
    let embed_rows: Vec<Vec<f32>> = embed_out.to_vec2().unwrap();
    assert_eq!(embed_rows[1], vec![3.0, 3.5]);
    assert_eq!(embed_rows[5], vec![0.0, 0.0]);

    let config: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("config.json")).unwrap())
            .unwrap();
    assert_eq!(config["vocab_size"], 6);
    assert_eq!(config["tie_word_embeddings"], false);
    assert_eq!(config["eos_token_id"], 0);
    assert_eq!(config["pad_token_id"], 0);
    assert_eq!(config["hidden_size"], 2);

    assert!(output.join("tokenizer.json").is_file());
    assert!(output.join("tokenizer_config.json").is_file());
    let generation: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(output.join("generation_config.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(generation["eos_token_id"], 0);
    assert_eq!(generation["pad_token_id"], 0);
    assert_eq!(generation["do_sample"], false);
    assert!(generation.get("bos_token_id").is_none());
    assert!(!out_root.path().join("transplanted.partial").exists());

    // A second write without overwrite is refused.
    let again = writer.write(&output, &out.embeddings, out.report.special.bos, false);
    assert!(matches!(again, Err(Error::OutputExists(_))));
}

#[test]
fn test_write_disables_target_bos() {
    let donor_dir = tempfile::tempdir().unwrap();
    let target_dir = tempfile::tempdir().unwrap();
    let out_root = tempfile::tempdir().unwrap();
    write_donor(donor_dir.path());
    write_bos_target(target_dir.path());
    let output = out_root.path().join("no-bos");

    let donor_files = ModelFiles::from_dir(donor_dir.path()).unwrap();
    let target_files = ModelFiles::from_dir(target_dir.path()).unwrap();
    let donor_config = HfConfig::load(&donor_files.config).unwrap();
    let target_config = HfConfig::load(&target_files.config).unwrap();
    let donor_tokenizer = ModelTokenizer::load(&donor_files, &donor_config).unwrap();
    let target_tokenizer = ModelTokenizer::load(&target_files, &target_config).unwrap();
    assert_eq!(donor_tokenizer.special.bos, None);
    assert_eq!(target_tokenizer.special.bos, Some(5));
    assert!(target_tokenizer.special.add_bos);
    let target_vocab = target_tokenizer.vocabulary().unwrap();

    let device = Device::Cpu;
    let weights = DonorWeights::open(&donor_files.weights).unwrap();
    let embed = weights.embedding(Some(DType::F32), &device).unwrap();
    let head = weights.head(true, Some(DType::F32), &device).unwrap();

    let out = VocabTransplant::new(&target_vocab, &donor_tokenizer.tokenizer)
        .special_tokens(donor_tokenizer.special, target_tokenizer.special)
        .run(&embed, &head, target_config.vocab_size().unwrap())
        .unwrap();
    assert_eq!(out.report.special.bos, BosHandling::DisableTargetBos);

    let writer = ModelWriter {
        donor_weights: &weights,
        donor_config: &donor_config,
        donor_generation_config: donor_files.generation_config.as_deref(),
        target_tokenizer_files: &target_files.tokenizer_files,
        target_special: target_tokenizer.special,
        dtype: Some(DType::F32),
        device: &device,
    };
    writer
        .write(&output, &out.embeddings, out.report.special.bos, false)
        .unwrap();

    let patched = std::fs::read_to_string(output.join("tokenizer_config.json")).unwrap();
    assert!(patched.contains(r#""add_bos_token": false"#));
    assert!(!patched.contains("bos_token }}"));
    assert!(patched.contains("{% for m in messages %}"));

    // The target's own tokenizer directory is left alone.
    let original =
        std::fs::read_to_string(target_dir.path().join("tokenizer_config.json")).unwrap();
    assert!(original.contains(r#""add_bos_token": true"#));

    let config: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("config.json")).unwrap())
            .unwrap();
    assert_eq!(config["bos_token_id"], 5);
}
