use crate::common::{VoterError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENCODING_DIMENSIONS: usize = 128;
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

pub type FaceEncoding = Vec<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaceComparison {
    pub similarity_score: f64,
    pub is_match: bool,
    pub threshold: f64,
    pub face_distance: f64,
}

// Encodings arrive either bare or wrapped the way the encoding endpoint returns them
#[derive(Deserialize)]
#[serde(untagged)]
enum EncodingFile {
    Bare(FaceEncoding),
    Wrapped { encoding: FaceEncoding },
    Response { data: EncodingData },
}

#[derive(Deserialize)]
struct EncodingData {
    encoding: FaceEncoding,
}

/// Euclidean distance between two encodings of equal length.
pub fn face_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

pub fn compare_encodings(first: &[f64], second: &[f64], threshold: f64) -> Result<FaceComparison> {
    if first.len() != ENCODING_DIMENSIONS || second.len() != ENCODING_DIMENSIONS {
        return Err(VoterError::InvalidEncoding(format!(
            "expected {} dimensions, got {} and {}",
            ENCODING_DIMENSIONS, first.len(), second.len()
        )));
    }
    if first.iter().chain(second).any(|v| !v.is_finite()) {
        return Err(VoterError::InvalidEncoding("encoding contains non-finite values".into()));
    }
    if !(0.0..=1.0).contains(&threshold) {
        return Err(VoterError::InvalidEncoding(format!(
            "threshold must be between 0.0 and 1.0, got {}", threshold
        )));
    }

    let distance = face_distance(first, second);
    // Lower distance is a better match; report it as a similarity
    let similarity_score = 1.0 - distance;

    Ok(FaceComparison {
        similarity_score,
        is_match: similarity_score >= threshold,
        threshold,
        face_distance: distance,
    })
}

pub fn parse_encoding(json: &str) -> Result<FaceEncoding> {
    let file: EncodingFile = serde_json::from_str(json)
        .map_err(|e| VoterError::InvalidEncoding(format!("not an encoding array: {}", e)))?;

    Ok(match file {
        EncodingFile::Bare(encoding) => encoding,
        EncodingFile::Wrapped { encoding } => encoding,
        EncodingFile::Response { data } => data.encoding,
    })
}

pub fn load_encoding(path: &Path) -> Result<FaceEncoding> {
    let contents = std::fs::read_to_string(path)?;
    parse_encoding(&contents)
}
