//! Artifact encodings.
//!
//! Binary artifacts start with the 4-byte magic `HJVB` followed by an rkyv
//! archive, checked with bytecheck before anything is deserialized. Any other
//! content is parsed as JSON. Both paths reject truncated input as a whole;
//! there is no partial decode.

use std::path::Path;

use rkyv::rancor;
use rkyv::util::AlignedVec;

use super::ModelArtifact;
use crate::error::LoadError;

/// Prefix identifying the binary encoding.
pub const BINARY_MAGIC: &[u8; 4] = b"HJVB";

/// Decode an artifact from raw bytes, sniffing the encoding.
pub fn decode(bytes: &[u8]) -> Result<ModelArtifact, LoadError> {
    if let Some(payload) = bytes.strip_prefix(&BINARY_MAGIC[..]) {
        // rkyv needs the archive at its natural alignment
        let mut aligned = AlignedVec::<16>::with_capacity(payload.len());
        aligned.extend_from_slice(payload);
        return rkyv::from_bytes::<ModelArtifact, rancor::Error>(&aligned)
            .map_err(|e| LoadError::MalformedArtifact(format!("binary artifact: {}", e)));
    }
    serde_json::from_slice(bytes)
        .map_err(|e| LoadError::MalformedArtifact(format!("json artifact: {}", e)))
}

/// Read and decode an artifact file. Does not validate it; see
/// [`loader::load`](crate::loader::load).
pub fn read(path: &Path) -> Result<ModelArtifact, LoadError> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

/// Pretty-printed JSON encoding.
pub fn encode_json(artifact: &ModelArtifact) -> std::io::Result<Vec<u8>> {
    serde_json::to_vec_pretty(artifact).map_err(std::io::Error::other)
}

/// `HJVB` + rkyv encoding.
pub fn encode_binary(artifact: &ModelArtifact) -> std::io::Result<Vec<u8>> {
    let archived = rkyv::to_bytes::<rancor::Error>(artifact)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let mut out = Vec::with_capacity(BINARY_MAGIC.len() + archived.len());
    out.extend_from_slice(BINARY_MAGIC);
    out.extend_from_slice(&archived);
    Ok(out)
}

pub fn write_json(artifact: &ModelArtifact, path: &Path) -> std::io::Result<()> {
    write_bytes(path, &encode_json(artifact)?)
}

pub fn write_binary(artifact: &ModelArtifact, path: &Path) -> std::io::Result<()> {
    write_bytes(path, &encode_binary(artifact)?)
}

fn write_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    // Write-then-rename so a concurrent reader never sees half a file.
    let tmp = path.with_extension("partial");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::fixtures;
    use crate::artifact::{Activation, Architecture};

    #[test]
    fn json_and_binary_agree() {
        let a = fixtures::tiny_grid();
        let from_json = decode(&encode_json(&a).unwrap()).unwrap();
        let from_bin = decode(&encode_binary(&a).unwrap()).unwrap();
        assert_eq!(from_json, a);
        assert_eq!(from_bin, a);
        assert_eq!(from_bin.id(), a.id());
    }

    #[test]
    fn parses_handwritten_json() {
        let json = r#"{
            "format_version": 1,
            "architecture": { "kind": "mlp", "activation": "sine" },
            "parameters": [
                { "shape": [1, 1], "data": [2.0] },
                { "shape": [1], "data": [0.0] }
            ],
            "input_dim": 1,
            "input_bounds": { "min": [-1.0], "max": [1.0] },
            "output_scale": { "scale": 1.0, "offset": 0.0 }
        }"#;
        let a = decode(json.as_bytes()).unwrap();
        assert_eq!(
            a.architecture,
            Architecture::Mlp {
                activation: Activation::Sine
            }
        );
        assert!(a.input_normalization.is_none());
        assert!(a.planner.is_none());
        assert_eq!(a.description, "");
    }

    #[test]
    fn truncated_json_is_malformed() {
        let bytes = encode_json(&fixtures::tiny_mlp()).unwrap();
        let err = decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, LoadError::MalformedArtifact(_)), "{err}");
    }

    #[test]
    fn truncated_binary_is_malformed() {
        let bytes = encode_binary(&fixtures::tiny_mlp()).unwrap();
        let err = decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, LoadError::MalformedArtifact(_)), "{err}");
    }

    #[test]
    fn empty_input_is_malformed() {
        assert!(matches!(
            decode(&[]),
            Err(LoadError::MalformedArtifact(_))
        ));
        assert!(matches!(
            decode(BINARY_MAGIC),
            Err(LoadError::MalformedArtifact(_))
        ));
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.hjvb");
        write_binary(&fixtures::tiny_mlp(), &path).unwrap();
        assert_eq!(read(&path).unwrap(), fixtures::tiny_mlp());
        assert!(!path.with_extension("partial").exists());
    }

    #[test]
    fn missing_file_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = read(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, LoadError::IOFailure(_)));
    }
}
