//! AES-128-CBC segment decryption
//!
//! Each segment decrypts on its own: the IV is either the key's explicit `IV`
//! attribute or the segment's media sequence number, so segments can be
//! decrypted in whatever order they arrive.

use crate::error::{Error, Result};
use crate::fetch::{ByteRequest, Fetcher, OnceMap};
use crate::playlist::{EncryptionKey, KeyMethod};
use aes::Aes128;
use bytes::Bytes;
use cbc::{
    Decryptor,
    cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7},
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// AES block and key size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// Raw AES-128 key
pub type KeyBytes = [u8; AES_BLOCK_SIZE];

/// Initialization vector
pub type Iv = [u8; AES_BLOCK_SIZE];

/// Decode an `IV` attribute
///
/// Accepts an optional `0x`/`0X` prefix, ignores non-hex characters, and
/// left-pads to 16 bytes.
pub fn parse_iv_hex(value: &str) -> Result<Iv> {
    let trimmed = value.trim();
    let without_prefix = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let mut digits: String = without_prefix
        .chars()
        .filter(char::is_ascii_hexdigit)
        .collect();
    if digits.is_empty() {
        return Err(Error::MalformedPlaylist(format!("empty IV: {value:?}")));
    }
    if digits.len() % 2 == 1 {
        digits.insert(0, '0');
    }

    let bytes = hex::decode(&digits)
        .map_err(|e| Error::MalformedPlaylist(format!("invalid IV {value:?}: {e}")))?;
    if bytes.len() > AES_BLOCK_SIZE {
        return Err(Error::MalformedPlaylist(format!(
            "IV longer than 16 bytes: {value:?}"
        )));
    }

    let mut iv = [0u8; AES_BLOCK_SIZE];
    iv[AES_BLOCK_SIZE - bytes.len()..].copy_from_slice(&bytes);
    Ok(iv)
}

/// IV for a key without an explicit `IV`: the segment's sequence number,
/// truncated to 32 bits, big-endian in the last four bytes
pub fn iv_from_sequence(media_sequence: u64, index: usize) -> Iv {
    let sequence = media_sequence.wrapping_add(index as u64) as u32;
    let mut iv = [0u8; AES_BLOCK_SIZE];
    iv[12..].copy_from_slice(&sequence.to_be_bytes());
    iv
}

/// IV for the segment at `index`
pub fn segment_iv(key: &EncryptionKey, media_sequence: u64, index: usize) -> Result<Iv> {
    match &key.iv_hex {
        Some(hex) => parse_iv_hex(hex),
        None => Ok(iv_from_sequence(media_sequence, index)),
    }
}

/// Decrypt one AES-128-CBC payload and strip PKCS#7 padding
pub fn decrypt_aes128_cbc(ciphertext: &[u8], key: &KeyBytes, iv: &Iv) -> Result<Bytes> {
    if ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(Error::Decrypt(format!(
            "ciphertext length {} is not a multiple of {AES_BLOCK_SIZE}",
            ciphertext.len()
        )));
    }

    let mut buf = ciphertext.to_vec();
    let plaintext_len = Decryptor::<Aes128>::new(key.into(), iv.into())
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|e| Error::Decrypt(format!("PKCS7 unpad failed: {e}")))?
        .len();
    buf.truncate(plaintext_len);
    Ok(Bytes::from(buf))
}

/// Reject keys this crate cannot decrypt
pub fn ensure_supported(key: &EncryptionKey) -> Result<()> {
    match key.method {
        KeyMethod::Aes128 if key.uri.is_some() => Ok(()),
        KeyMethod::Aes128 => Err(Error::MalformedPlaylist(
            "AES-128 key without URI".to_string(),
        )),
        _ => Err(Error::UnsupportedEncryption {
            method: key.method.as_str().to_string(),
        }),
    }
}

/// Session-scoped key cache: each key URI is fetched at most once
#[derive(Debug, Default)]
pub struct KeyStore {
    keys: OnceMap<String, KeyBytes>,
}

impl KeyStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Key bytes for `uri`, fetching on first use
    pub async fn key(
        &self,
        fetcher: &dyn Fetcher,
        uri: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<KeyBytes> {
        self.keys
            .get_or_try_init(uri.to_string(), || async {
                debug!(url = %uri, "fetching decryption key");
                let request = ByteRequest::new(uri, timeout, cancel.clone());
                let bytes = fetcher.get_bytes(request).await?;
                KeyBytes::try_from(bytes.as_ref()).map_err(|_| Error::InvalidKey {
                    uri: uri.to_string(),
                    len: bytes.len(),
                })
            })
            .await
    }

    /// Decrypt a segment encrypted with `key` under `iv`
    pub async fn decrypt_segment(
        &self,
        fetcher: &dyn Fetcher,
        key: &EncryptionKey,
        iv: &Iv,
        ciphertext: &[u8],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        ensure_supported(key)?;
        let uri = key.uri.as_deref().unwrap_or_default();
        let key_bytes = self.key(fetcher, uri, timeout, cancel).await?;
        decrypt_aes128_cbc(ciphertext, &key_bytes, iv)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ResourceMeta;
    use async_trait::async_trait;
    use cbc::Encryptor;
    use cbc::cipher::BlockEncryptMut;
    use cbc::cipher::block_padding::NoPadding;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const KEY: KeyBytes = *b"0123456789abcdef";

    fn encrypt(plaintext: &[u8], key: &KeyBytes, iv: &Iv) -> Vec<u8> {
        Encryptor::<Aes128>::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    struct KeyServer {
        key: Vec<u8>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for KeyServer {
        async fn get_text(&self, url: &str) -> Result<String> {
            Err(Error::Http {
                status: 404,
                url: url.to_string(),
            })
        }

        async fn get_bytes(&self, _request: ByteRequest) -> Result<Bytes> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from(self.key.clone()))
        }

        async fn head(&self, _url: &str) -> Result<ResourceMeta> {
            Ok(ResourceMeta::default())
        }
    }

    fn aes_key(uri: &str, iv: Option<&str>) -> EncryptionKey {
        EncryptionKey {
            method: KeyMethod::Aes128,
            uri: Some(uri.to_string()),
            iv_hex: iv.map(str::to_string),
        }
    }

    #[test]
    fn iv_hex_variants() {
        let mut expected = [0u8; 16];
        expected[15] = 0x0a;
        assert_eq!(parse_iv_hex("0x0A").unwrap(), expected);
        assert_eq!(parse_iv_hex("0XA").unwrap(), expected);
        assert_eq!(parse_iv_hex("a").unwrap(), expected);

        let full = parse_iv_hex("0x000102030405060708090a0b0c0d0e0f").unwrap();
        let counting: Iv = core::array::from_fn(|i| i as u8);
        assert_eq!(full, counting);

        // separators are ignored
        let spaced = parse_iv_hex("0x00:01:02:03:04:05:06:07:08:09:0a:0b:0c:0d:0e:0f").unwrap();
        assert_eq!(spaced, full);
    }

    #[test]
    fn iv_hex_rejects_empty_and_oversized() {
        assert!(parse_iv_hex("0x").is_err());
        assert!(parse_iv_hex(&format!("0x{}", "ff".repeat(17))).is_err());
    }

    #[test]
    fn sequence_iv_is_big_endian_low_word() {
        let iv = iv_from_sequence(0x0102_0300, 4);
        assert_eq!(&iv[..12], &[0u8; 12]);
        assert_eq!(&iv[12..], &[0x01, 0x02, 0x03, 0x04]);

        // truncated to 32 bits
        let iv = iv_from_sequence(u64::from(u32::MAX) + 2, 0);
        assert_eq!(&iv[12..], &[0, 0, 0, 1]);
    }

    #[test]
    fn decrypt_round_trip() {
        let iv = iv_from_sequence(7, 0);
        let plaintext = b"transport stream payload that spans several blocks";
        let ciphertext = encrypt(plaintext, &KEY, &iv);

        let decrypted = decrypt_aes128_cbc(&ciphertext, &KEY, &iv).unwrap();
        assert_eq!(decrypted.as_ref(), plaintext);
    }

    #[test]
    fn decrypt_rejects_bad_input() {
        let iv = [0u8; 16];
        assert!(matches!(
            decrypt_aes128_cbc(&[0u8; 15], &KEY, &iv),
            Err(Error::Decrypt(_))
        ));

        // a block whose plaintext ends in 0x00 never carries valid padding
        let unpadded = Encryptor::<Aes128>::new((&KEY).into(), (&iv).into())
            .encrypt_padded_vec_mut::<NoPadding>(&[0u8; 16]);
        assert!(matches!(
            decrypt_aes128_cbc(&unpadded, &KEY, &iv),
            Err(Error::Decrypt(_))
        ));
    }

    #[test]
    fn unsupported_methods_are_rejected() {
        let key = EncryptionKey {
            method: KeyMethod::SampleAes,
            uri: Some("skd://x".to_string()),
            iv_hex: None,
        };
        assert!(matches!(
            ensure_supported(&key),
            Err(Error::UnsupportedEncryption { method }) if method == "SAMPLE-AES"
        ));
    }

    #[tokio::test]
    async fn key_fetched_once_for_repeated_decrypts() {
        let server = KeyServer {
            key: KEY.to_vec(),
            fetches: AtomicUsize::new(0),
        };
        let store = KeyStore::new();
        let cancel = CancellationToken::new();
        let key = aes_key("https://keys.example.com/k1", Some("0x1"));
        let iv = parse_iv_hex("0x1").unwrap();
        let ciphertext = encrypt(b"segment bytes", &KEY, &iv);

        for _ in 0..2 {
            let plain = store
                .decrypt_segment(
                    &server,
                    &key,
                    &segment_iv(&key, 0, 3).unwrap(),
                    &ciphertext,
                    Duration::from_secs(1),
                    &cancel,
                )
                .await
                .unwrap();
            assert_eq!(plain.as_ref(), b"segment bytes");
        }
        assert_eq!(server.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_key_is_invalid() {
        let server = KeyServer {
            key: vec![1, 2, 3],
            fetches: AtomicUsize::new(0),
        };
        let store = KeyStore::new();
        let result = store
            .key(
                &server,
                "https://keys.example.com/short",
                Duration::from_secs(1),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(Error::InvalidKey { len: 3, .. })));
    }
}
