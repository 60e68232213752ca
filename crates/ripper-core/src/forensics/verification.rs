/// Hash calculation for extracted files
///
/// Every file pulled out of an image is fingerprinted so the database and
/// report can be matched against known-file sets later on.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUFFER_SIZE: usize = 64 * 1024;

/// Supported hash algorithms
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    MD5,
    SHA256,
}

impl HashAlgorithm {
    /// Get algorithm name
    pub fn name(&self) -> &'static str {
        match self {
            Self::MD5 => "MD5",
            Self::SHA256 => "SHA256",
        }
    }
}

/// Digests of a single file, computed in one read pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDigests {
    pub md5: String,
    pub sha256: String,
    pub file_size: u64,
}

impl FileDigests {
    pub fn get(&self, algorithm: HashAlgorithm) -> &str {
        match algorithm {
            HashAlgorithm::MD5 => &self.md5,
            HashAlgorithm::SHA256 => &self.sha256,
        }
    }
}

/// Hash a file with every supported algorithm
pub fn calculate_file_digests(path: impl AsRef<Path>) -> io::Result<FileDigests> {
    let mut file = File::open(path.as_ref())?;
    let mut md5 = md5::Context::new();
    let mut sha256 = Sha256::new();
    let mut file_size = 0u64;

    let mut buffer = vec![0; BUFFER_SIZE];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        md5.consume(&buffer[..n]);
        sha256.update(&buffer[..n]);
        file_size += n as u64;
    }

    Ok(FileDigests {
        md5: format!("{:x}", md5.compute()),
        sha256: format!("{:x}", sha256.finalize()),
        file_size,
    })
}

/// Calculate hash from byte slice
pub fn calculate_hash(data: &[u8], algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::MD5 => format!("{:x}", md5::compute(data)),
        HashAlgorithm::SHA256 => {
            let mut hasher = Sha256::new();
            hasher.update(data);
            format!("{:x}", hasher.finalize())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_known_digests() {
        assert_eq!(
            calculate_hash(b"", HashAlgorithm::MD5),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            calculate_hash(b"abc", HashAlgorithm::SHA256),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_file_digests_match_in_memory_hashes() {
        // Larger than one read buffer
        let data: Vec<u8> = (0..BUFFER_SIZE * 2 + 17).map(|i| (i % 251) as u8).collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();

        let digests = calculate_file_digests(file.path()).unwrap();
        assert_eq!(digests.file_size, data.len() as u64);
        assert_eq!(digests.get(HashAlgorithm::MD5), calculate_hash(&data, HashAlgorithm::MD5));
        assert_eq!(
            digests.get(HashAlgorithm::SHA256),
            calculate_hash(&data, HashAlgorithm::SHA256)
        );
    }
}
