//! Content hashing for downloaded originals.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::{
    fs::File,
    io::{self, AsyncReadExt},
};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Bytes of the SHA-256 digest kept in the content hash
const HASH_LEN: usize = 16;

/// Read block size for a file of `len` bytes
pub fn block_size_for(len: u64) -> usize {
    let block = if len < MIB {
        4 * KIB
    } else if len < 64 * MIB {
        64 * KIB
    } else if len < GIB {
        MIB
    } else {
        8 * MIB
    };
    block as usize
}

/// SHA-256 of the file truncated to 128 bits, as 32 lowercase hex characters
pub async fn content_hash(path: impl AsRef<Path>) -> Result<String, io::Error> {
    let mut reader = File::open(path).await?;
    let len = reader.metadata().await?.len();
    let mut context = Sha256::new();
    let mut buffer = vec![0; block_size_for(len)].into_boxed_slice();
    loop {
        let read_count = reader.read(&mut buffer).await?;
        if read_count == 0 {
            break;
        }
        context.update(&buffer[..read_count]);
    }
    let digest = context.finalize();

    Ok(hex::encode(&digest[..HASH_LEN]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_block_size_thresholds() {
        assert_eq!(block_size_for(0), 4 * 1024);
        assert_eq!(block_size_for(MIB - 1), 4 * 1024);
        assert_eq!(block_size_for(MIB), 64 * 1024);
        assert_eq!(block_size_for(64 * MIB), 1024 * 1024);
        assert_eq!(block_size_for(GIB), 8 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_hash_of_known_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        tokio::fs::write(&path, b"abc").await.unwrap();

        // SHA-256("abc") = ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad
        assert_eq!(
            content_hash(&path).await.unwrap(),
            "ba7816bf8f01cfea414140de5dae2223"
        );
    }

    #[tokio::test]
    async fn test_hash_spanning_several_blocks_matches_one_shot_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let data: Vec<u8> = (0..(MIB as usize + 12_345)).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&path, &data).await.unwrap();

        let expected = hex::encode(&Sha256::digest(&data)[..HASH_LEN]);
        let hash = content_hash(&path).await.unwrap();
        assert_eq!(hash, expected);
        assert_eq!(hash.len(), 32);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(content_hash(dir.path().join("missing")).await.is_err());
    }
}
