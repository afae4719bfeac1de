#![forbid(unsafe_code)]

//! Key derivation, MAC and bag decryption for PKCS#12.
//!
//! The PKCS#12 KDF (RFC 7292 appendix B) derives the MAC key and the
//! legacy 3DES key/IV. PBES2 bags use PBKDF2 instead.

use cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use sigill_core::Error;

type Des3CbcDec = cbc::Decryptor<des::TdesEde3>;

pub const ID_KEY: u8 = 1;
pub const ID_IV: u8 = 2;
pub const ID_MAC: u8 = 3;

/// Hash underlying the PKCS#12 KDF, the MAC, or a PBKDF2 PRF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    Sha1,
    Sha256,
}

impl HashKind {
    pub fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }
}

/// PKCS#12 KDF. `password` is already BMP-encoded.
pub fn pkcs12_kdf(
    hash: HashKind,
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Vec<u8> {
    match hash {
        HashKind::Sha1 => kdf_with::<Sha1>(id, password, salt, iterations, output_len),
        HashKind::Sha256 => kdf_with::<Sha256>(id, password, salt, iterations, output_len),
    }
}

fn kdf_with<D>(id: u8, password: &[u8], salt: &[u8], iterations: u32, output_len: usize) -> Vec<u8>
where
    D: Digest + sha2::digest::FixedOutputReset,
{
    // Both SHA-1 and SHA-256 use a 64-byte block.
    const V: usize = 64;
    let u = <D as Digest>::output_size();

    let diversifier = [id; V];
    let mut i_block = fill_to_block(salt, V);
    i_block.extend_from_slice(&fill_to_block(password, V));

    let rounds = output_len.div_ceil(u);
    let mut out = Vec::with_capacity(rounds * u);
    let mut hasher = D::new();

    for round in 0..rounds {
        Digest::update(&mut hasher, diversifier);
        Digest::update(&mut hasher, &i_block);
        let mut a = hasher.finalize_reset();
        for _ in 1..iterations {
            Digest::update(&mut hasher, &a);
            a = hasher.finalize_reset();
        }
        out.extend_from_slice(&a);

        if round + 1 < rounds {
            let b = fill_to_block(&a, V);
            for chunk in i_block.chunks_mut(V) {
                add_with_carry(chunk, &b);
            }
        }
    }

    out.truncate(output_len);
    out
}

/// Repeat `data` up to the next multiple of `v` bytes. Empty input stays empty.
fn fill_to_block(data: &[u8], v: usize) -> Vec<u8> {
    let len = data.len().div_ceil(v) * v;
    data.iter().copied().cycle().take(len).collect()
}

/// `block = (block + b + 1) mod 2^(8 * block.len())`
fn add_with_carry(block: &mut [u8], b: &[u8]) {
    let mut carry: u16 = 1;
    for (x, y) in block.iter_mut().zip(b).rev() {
        let sum = *x as u16 + *y as u16 + carry;
        *x = sum as u8;
        carry = sum >> 8;
    }
}

/// BMP (UTF-16BE) encoding with the two-byte terminator.
pub fn password_to_bmp(password: &str) -> Vec<u8> {
    let mut bmp: Vec<u8> = password.encode_utf16().flat_map(u16::to_be_bytes).collect();
    bmp.extend_from_slice(&[0, 0]);
    bmp
}

/// BMP encodings worth trying for `password`.
///
/// OpenSSL encodes the empty password as the bare terminator, while some
/// other producers hand the KDF zero bytes, so both are candidates.
pub fn bmp_candidates(password: &str) -> Vec<Vec<u8>> {
    if password.is_empty() {
        vec![vec![0, 0], Vec::new()]
    } else {
        vec![password_to_bmp(password)]
    }
}

pub fn hmac(hash: HashKind, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    macro_rules! mac {
        ($d:ty) => {{
            let mut mac = Hmac::<$d>::new_from_slice(key)
                .map_err(|e| Error::Certificate(format!("HMAC init failed: {e}")))?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }};
    }
    match hash {
        HashKind::Sha1 => mac!(Sha1),
        HashKind::Sha256 => mac!(Sha256),
    }
}

/// pbeWithSHAAnd3-KeyTripleDES-CBC.
pub fn decrypt_pbe_sha1_3des(
    ciphertext: &[u8],
    bmp_password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<Vec<u8>, Error> {
    let key = pkcs12_kdf(HashKind::Sha1, ID_KEY, bmp_password, salt, iterations, 24);
    let iv = pkcs12_kdf(HashKind::Sha1, ID_IV, bmp_password, salt, iterations, 8);

    let decryptor = Des3CbcDec::new_from_slices(&key, &iv)
        .map_err(|e| Error::Certificate(format!("3DES-CBC init failed: {e}")))?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Certificate("3DES-CBC decryption failed (wrong password?)".into()))
}

/// PBES2 with PBKDF2 and AES-CBC. The AES variant follows `key_len`.
pub fn decrypt_pbes2(
    ciphertext: &[u8],
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    prf: HashKind,
    key_len: usize,
    iv: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut key = vec![0u8; key_len];
    match prf {
        HashKind::Sha1 => pbkdf2::pbkdf2_hmac::<Sha1>(password, salt, iterations, &mut key),
        HashKind::Sha256 => pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key),
    }

    macro_rules! aes_cbc {
        ($cipher:ty) => {{
            cbc::Decryptor::<$cipher>::new_from_slices(&key, iv)
                .map_err(|e| Error::Certificate(format!("AES-CBC init failed: {e}")))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| Error::Certificate("AES-CBC decryption failed (wrong password?)".into()))
        }};
    }
    match key_len {
        16 => aes_cbc!(aes::Aes128),
        24 => aes_cbc!(aes::Aes192),
        32 => aes_cbc!(aes::Aes256),
        n => Err(Error::Certificate(format!("unsupported AES key length {n}"))),
    }
}
