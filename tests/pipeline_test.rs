//! Integration tests for the full transplant pipeline.

mod common;

use common::{assert_row_close, row, row_coded_matrix, FakeTokenizer};
use vocab_transplant::{
    DecayFactor, Error, MappingSource, Outcome, SpecialRole, SpecialTokenIds, TokenOverride,
    VocabTransplant, Vocabulary,
};

// Donor ids:         0       1        2     3     4    5     6
const DONOR: [&str; 7] = ["<unk>", "</s>", "he", "llo", "w", "or", "ld"];

fn donor() -> FakeTokenizer {
    FakeTokenizer::new(&DONOR).with_unknown("<unk>")
}

fn target() -> Vocabulary {
    // Target ids:          0      1        2        3      4
    Vocabulary::from_pieces(["<eos>", "hello", "world", "llo", "∅"]).unwrap()
}

fn specials() -> (SpecialTokenIds, SpecialTokenIds) {
    let donor = SpecialTokenIds {
        eos: Some(1),
        ..Default::default()
    };
    let target = SpecialTokenIds {
        eos: Some(0),
        ..Default::default()
    };
    (donor, target)
}

#[test]
fn test_align_stages_in_order() {
    let (donor_special, target_special) = specials();
    let target = target();
    let donor = donor();

    let aligned = VocabTransplant::new(&target, &donor)
        .special_tokens(donor_special, target_special)
        .overrides(vec![TokenOverride::new("world", "wor")])
        .align()
        .unwrap();

    let m = &aligned.mapping;
    assert_eq!(m.donor_ids(0), Some(&[1][..]));
    assert_eq!(m.get(0).unwrap().source(), MappingSource::Special(SpecialRole::Eos));
    assert_eq!(m.donor_ids(1), Some(&[2, 3][..]));
    assert_eq!(m.donor_ids(2), Some(&[4, 5][..]));
    assert_eq!(m.get(2).unwrap().source(), MappingSource::Override);
    assert_eq!(m.donor_ids(3), Some(&[3][..]));
    assert_eq!(m.get(3).unwrap().source(), MappingSource::Exact);
    assert_eq!(m.donor_ids(4), Some(&[0][..]));
    assert_eq!(m.get(4).unwrap().source(), MappingSource::Fallback);
}

#[test]
fn test_run_pads_and_reports() {
    let (donor_special, target_special) = specials();
    let target = target();
    let donor = donor();
    let embed = row_coded_matrix(DONOR.len(), 4);
    let head = row_coded_matrix(DONOR.len(), 4);

    let out = VocabTransplant::new(&target, &donor)
        .special_tokens(donor_special, target_special)
        .decay(DecayFactor::new(1.0).unwrap())
        .run(&embed, &head, 8)
        .unwrap();

    assert_eq!(out.embeddings.input_embedding.dims(), &[8, 4]);
    assert_eq!(out.embeddings.output_head.dims(), &[8, 4]);

    // "hello" → [he, llo]: input from "llo", head is the mean of both.
    assert_eq!(row(&out.embeddings.input_embedding, 1), row(&embed, 3));
    assert_row_close(&row(&out.embeddings.output_head, 1), &[25.0, 26.0, 27.0, 28.0]);
    assert_eq!(row(&out.embeddings.output_head, 6), vec![0.0; 4]);

    let stats = &out.report.stats;
    assert_eq!(stats.head_copies, 3);
    assert_eq!(stats.head_means, 2);
    assert_eq!(stats.zero_rows, 3);
    assert_eq!(stats.total_rows(), 8);
    assert_eq!(stats.sequence_lengths.get(&1), Some(&3));
    assert_eq!(stats.sequence_lengths.get(&3), Some(&1));

    let record = &out.report.tokens[1];
    assert_eq!(record.target_text, "hello");
    assert_eq!(record.donor_text, "hello");
    assert_eq!(record.target_piece, "hello");
    assert_eq!(record.donor_pieces, vec!["he", "llo"]);
    assert_eq!(out.report.tokens[4].outcome, Outcome::Fallback);
    assert_eq!(out.report.problems().len(), 1);

    let rendered = out.report.to_string();
    assert!(rendered.contains("✔ eos_token_id : 0"));
    assert!(rendered.contains("2 to 1"));
    assert!(!rendered.contains("Transplanted tokens"));

    let mut verbose = out.report.clone();
    verbose.verbose = true;
    let rendered = verbose.to_string();
    assert!(rendered.contains(r#"-      1 : "hello" → ["he", "llo"] [2, 3]"#));
}

#[test]
fn test_run_is_reproducible() {
    let (donor_special, target_special) = specials();
    let target = target();
    let donor = donor();
    let embed = row_coded_matrix(DONOR.len(), 3);
    let head = row_coded_matrix(DONOR.len(), 3).affine(0.5, -1.0).unwrap();

    let pipeline = VocabTransplant::new(&target, &donor)
        .special_tokens(donor_special, target_special)
        .overrides(vec![TokenOverride::new("hello", "world")]);

    let a = pipeline.run(&embed, &head, 5).unwrap();
    let b = pipeline.run(&embed, &head, 5).unwrap();

    assert_eq!(a.mapping, b.mapping);
    let a_head: Vec<Vec<f32>> = a.embeddings.output_head.to_vec2().unwrap();
    let b_head: Vec<Vec<f32>> = b.embeddings.output_head.to_vec2().unwrap();
    assert_eq!(a_head, b_head);
}

#[test]
fn test_unknown_override_aborts() {
    let target = target();
    let donor = donor();
    let embed = row_coded_matrix(DONOR.len(), 2);

    let result = VocabTransplant::new(&target, &donor)
        .overrides(vec![TokenOverride::new("nope", "he")])
        .run(&embed, &embed, 5);

    assert!(matches!(result, Err(Error::UnknownTargetToken(_))));
}

#[test]
fn test_donor_matrix_too_small() {
    let target = target();
    let donor = donor();
    let embed = row_coded_matrix(3, 2);

    let result = VocabTransplant::new(&target, &donor).run(&embed, &embed, 5);

    assert!(matches!(result, Err(Error::DonorIdOutOfRange { .. })));
}
