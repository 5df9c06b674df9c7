//! Checksum computation for verify-after-copy.
//!
//! This module provides:
//! - The supported algorithms (SHA-256, BLAKE3)
//! - Streaming file checksums
//! - Source/destination comparison used by the copy engine

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUFFER_SIZE: usize = 64 * 1024;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    /// SHA-256 (cryptographic, 256-bit)
    Sha256,
    /// BLAKE3 (modern, fast, 256-bit)
    Blake3,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

impl ChecksumAlgorithm {
    /// Parse algorithm from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sha256" => Some(Self::Sha256),
            "blake3" => Some(Self::Blake3),
            _ => None,
        }
    }
}

/// A computed checksum value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumValue {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl ChecksumValue {
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for ChecksumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

enum Hasher {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            ChecksumAlgorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha256(h) => h.update(data),
            Hasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize(self, algorithm: ChecksumAlgorithm) -> ChecksumValue {
        let hex = match self {
            Hasher::Sha256(h) => h
                .finalize()
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect(),
            Hasher::Blake3(h) => h.finalize().to_hex().to_string(),
        };
        ChecksumValue { algorithm, hex }
    }
}

/// Compute the checksum of a file by streaming its contents.
pub fn compute_file_checksum(path: &Path, algorithm: ChecksumAlgorithm) -> io::Result<ChecksumValue> {
    let mut file = File::open(path)?;
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize(algorithm))
}

/// True when both files have the same checksum under `algorithm`.
pub fn files_match(a: &Path, b: &Path, algorithm: ChecksumAlgorithm) -> io::Result<bool> {
    Ok(compute_file_checksum(a, algorithm)? == compute_file_checksum(b, algorithm)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!(ChecksumAlgorithm::from_str("SHA256"), Some(ChecksumAlgorithm::Sha256));
        assert_eq!(ChecksumAlgorithm::from_str("blake3"), Some(ChecksumAlgorithm::Blake3));
        assert_eq!(ChecksumAlgorithm::from_str("md5"), None);
    }

    #[test]
    fn test_sha256_known_value() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("abc.bin");
        fs::write(&path, b"abc").expect("Failed to write file");

        let value = compute_file_checksum(&path, ChecksumAlgorithm::Sha256).expect("Failed to hash");
        assert_eq!(
            value.hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_files_match() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let a = temp_dir.path().join("a.bin");
        let b = temp_dir.path().join("b.bin");
        let c = temp_dir.path().join("c.bin");
        fs::write(&a, b"same bytes").expect("Failed to write a");
        fs::write(&b, b"same bytes").expect("Failed to write b");
        fs::write(&c, b"other bytes").expect("Failed to write c");

        for algorithm in [ChecksumAlgorithm::Sha256, ChecksumAlgorithm::Blake3] {
            assert!(files_match(&a, &b, algorithm).expect("Failed to compare"));
            assert!(!files_match(&a, &c, algorithm).expect("Failed to compare"));
        }
    }
}
