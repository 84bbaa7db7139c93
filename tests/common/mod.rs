//! Shared test helpers.

#![allow(dead_code)]

use std::collections::HashMap;

use candle_core::{Device, Tensor};
use vocab_transplant::{DonorTokenizer, Result};

/// Deterministic greedy longest-match tokenizer over a fixed piece list.
///
/// Characters no piece covers are dropped, so text made only of such
/// characters tokenizes to nothing.
pub struct FakeTokenizer {
    pieces: Vec<String>,
    ids: HashMap<String, u32>,
    unknown: Option<u32>,
}

impl FakeTokenizer {
    pub fn new(pieces: &[&str]) -> Self {
        let pieces: Vec<String> = pieces.iter().map(|p| p.to_string()).collect();
        let ids = pieces
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), i as u32))
            .collect();
        Self {
            pieces,
            ids,
            unknown: None,
        }
    }

    pub fn with_unknown(mut self, piece: &str) -> Self {
        self.unknown = self.ids.get(piece).copied();
        self
    }
}

impl DonorTokenizer for FakeTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        let mut rest = text;
        while !rest.is_empty() {
            let best = self
                .pieces
                .iter()
                .enumerate()
                .filter(|(_, p)| !p.is_empty() && rest.starts_with(p.as_str()))
                .max_by_key(|(i, p)| (p.len(), std::cmp::Reverse(*i)));
            match best {
                Some((id, piece)) => {
                    out.push(id as u32);
                    rest = &rest[piece.len()..];
                }
                None => {
                    let skip = rest.chars().next().map_or(1, char::len_utf8);
                    rest = &rest[skip..];
                }
            }
        }
        Ok(out)
    }

    fn token_to_id(&self, piece: &str) -> Option<u32> {
        self.ids.get(piece).copied()
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.pieces.get(id as usize).cloned()
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        Ok(ids
            .iter()
            .filter_map(|&id| self.pieces.get(id as usize))
            .map(String::as_str)
            .collect())
    }

    fn unknown_token_id(&self) -> Option<u32> {
        self.unknown
    }
}

/// [rows, hidden] matrix whose row `r` is `[r*10 + 0, r*10 + 1, ...]`.
pub fn row_coded_matrix(rows: usize, hidden: usize) -> Tensor {
    let data: Vec<f32> = (0..rows)
        .flat_map(|r| (0..hidden).map(move |c| (r * 10 + c) as f32))
        .collect();
    Tensor::from_vec(data, (rows, hidden), &Device::Cpu).unwrap()
}

/// Row `r` of a 2-D f32 tensor.
pub fn row(t: &Tensor, r: usize) -> Vec<f32> {
    t.get(r).unwrap().to_vec1().unwrap()
}

pub fn assert_row_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-4, "{actual:?} != {expected:?}");
    }
}
