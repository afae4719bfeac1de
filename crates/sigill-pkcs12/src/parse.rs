#![forbid(unsafe_code)]

//! BER parsing of PFX structures (RFC 7292).
//!
//! PKCS#12 files are BER, not strict DER, so everything goes through
//! `yasna::parse_ber`.

use sigill_core::Error;
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, Tag};

use crate::kdf::{self, HashKind};
use crate::Pkcs12Contents;

const OID_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];
const OID_ENCRYPTED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 6];

const OID_PKCS8_SHROUDED_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 2];
const OID_CERT_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 3];
const OID_X509_CERTIFICATE: &[u64] = &[1, 2, 840, 113549, 1, 9, 22, 1];

const OID_PBE_SHA1_3DES: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 3];
const OID_PBES2: &[u64] = &[1, 2, 840, 113549, 1, 5, 13];
const OID_PBKDF2: &[u64] = &[1, 2, 840, 113549, 1, 5, 12];

const OID_AES_128_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 2];
const OID_AES_192_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 22];
const OID_AES_256_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 42];

const OID_SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
const OID_SHA256: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];
const OID_HMAC_SHA1: &[u64] = &[1, 2, 840, 113549, 2, 7];
const OID_HMAC_SHA256: &[u64] = &[1, 2, 840, 113549, 2, 9];

fn oid(components: &[u64]) -> ObjectIdentifier {
    ObjectIdentifier::from_slice(components)
}

fn invalid() -> ASN1Error {
    ASN1Error::new(ASN1ErrorKind::Invalid)
}

#[derive(Debug)]
enum Encryption {
    PbeSha1And3Des {
        salt: Vec<u8>,
        iterations: u32,
    },
    Pbes2 {
        salt: Vec<u8>,
        iterations: u32,
        prf: HashKind,
        key_len: usize,
        iv: Vec<u8>,
    },
}

struct MacData {
    hash: HashKind,
    digest: Vec<u8>,
    salt: Vec<u8>,
    iterations: u32,
}

enum ContentInfo {
    Data(Vec<u8>),
    Encrypted { algorithm: Encryption, ciphertext: Vec<u8> },
}

enum SafeBag {
    ShroudedKey { algorithm: Encryption, ciphertext: Vec<u8> },
    Cert(Vec<u8>),
    Other,
}

pub fn parse_pfx(data: &[u8], password: &str) -> Result<Pkcs12Contents, Error> {
    let (auth_safe, mac_data) = yasna::parse_ber(data, |r| {
        r.read_sequence(|r| {
            if r.next().read_u32()? != 3 {
                return Err(invalid());
            }
            let auth_safe = read_data_content_info(r.next())?;
            let mac_data = r.read_optional(read_mac_data)?;
            Ok((auth_safe, mac_data))
        })
    })
    .map_err(|e| Error::Certificate(format!("failed to parse PKCS#12 PFX: {e}")))?;

    let bmp_password = select_password(mac_data.as_ref(), &auth_safe, password)?;

    let content_infos = yasna::parse_ber(&auth_safe, |r| r.collect_sequence_of(read_content_info))
        .map_err(|e| Error::Certificate(format!("failed to parse authSafe contents: {e}")))?;

    let mut contents = Pkcs12Contents::default();
    for ci in content_infos {
        let bags_data = match ci {
            ContentInfo::Data(data) => data,
            ContentInfo::Encrypted { algorithm, ciphertext } => {
                decrypt(&algorithm, &ciphertext, password, &bmp_password)?
            }
        };

        let bags = yasna::parse_ber(&bags_data, |r| r.collect_sequence_of(read_safe_bag))
            .map_err(|e| Error::Certificate(format!("failed to parse SafeBags: {e}")))?;

        for bag in bags {
            match bag {
                SafeBag::ShroudedKey { algorithm, ciphertext } => {
                    let pkcs8 = decrypt(&algorithm, &ciphertext, password, &bmp_password)?;
                    contents.private_keys.push(pkcs8);
                }
                SafeBag::Cert(der) => contents.certificates.push(der),
                SafeBag::Other => {}
            }
        }
    }

    tracing::debug!(
        keys = contents.private_keys.len(),
        certificates = contents.certificates.len(),
        "parsed PKCS#12 bundle"
    );
    Ok(contents)
}

/// Pick the BMP password encoding that satisfies the MAC.
fn select_password(mac: Option<&MacData>, auth_safe: &[u8], password: &str) -> Result<Vec<u8>, Error> {
    let candidates = kdf::bmp_candidates(password);
    let Some(mac) = mac else {
        return Ok(candidates.into_iter().next().unwrap_or_default());
    };
    for bmp in candidates {
        let key = kdf::pkcs12_kdf(mac.hash, kdf::ID_MAC, &bmp, &mac.salt, mac.iterations, mac.hash.output_len());
        if kdf::hmac(mac.hash, &key, auth_safe)? == mac.digest {
            return Ok(bmp);
        }
    }
    Err(Error::Certificate(
        "PKCS#12 MAC verification failed (wrong password?)".into(),
    ))
}

fn decrypt(algorithm: &Encryption, ciphertext: &[u8], password: &str, bmp_password: &[u8]) -> Result<Vec<u8>, Error> {
    match algorithm {
        Encryption::PbeSha1And3Des { salt, iterations } => {
            kdf::decrypt_pbe_sha1_3des(ciphertext, bmp_password, salt, *iterations)
        }
        Encryption::Pbes2 { salt, iterations, prf, key_len, iv } => {
            kdf::decrypt_pbes2(ciphertext, password.as_bytes(), salt, *iterations, *prf, *key_len, iv)
        }
    }
}

// ── ContentInfo ──────────────────────────────────────────────────────

/// The outer authSafe ContentInfo: `data` wrapping an OCTET STRING.
fn read_data_content_info(r: BERReader) -> Result<Vec<u8>, ASN1Error> {
    r.read_sequence(|r| {
        if r.next().read_oid()? != oid(OID_DATA) {
            return Err(invalid());
        }
        r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
    })
}

fn read_content_info(r: BERReader) -> Result<ContentInfo, ASN1Error> {
    r.read_sequence(|r| {
        let content_type = r.next().read_oid()?;
        if content_type == oid(OID_DATA) {
            let data = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
            return Ok(ContentInfo::Data(data));
        }
        if content_type != oid(OID_ENCRYPTED_DATA) {
            return Err(invalid());
        }
        r.next().read_tagged(Tag::context(0), |r| {
            r.read_sequence(|r| {
                let _version = r.next().read_u32()?;
                r.next().read_sequence(|r| {
                    let _content_type = r.next().read_oid()?;
                    let algorithm = read_encryption_algorithm(r.next())?;
                    let ciphertext = r
                        .next()
                        .read_tagged_implicit(Tag::context(0), |r| r.read_bytes())?;
                    Ok(ContentInfo::Encrypted { algorithm, ciphertext })
                })
            })
        })
    })
}

// ── SafeBag ──────────────────────────────────────────────────────────

fn skip_bag_attributes(r: &mut yasna::BERReaderSeq) -> Result<(), ASN1Error> {
    r.read_optional(|r| {
        r.read_set_of(|r| {
            r.read_sequence(|r| {
                let _oid = r.next().read_oid()?;
                r.next().read_set_of(|r| r.read_der().map(drop))
            })
        })
    })?;
    Ok(())
}

fn read_safe_bag(r: BERReader) -> Result<SafeBag, ASN1Error> {
    r.read_sequence(|r| {
        let bag_type = r.next().read_oid()?;
        let bag = if bag_type == oid(OID_PKCS8_SHROUDED_KEY_BAG) {
            r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let algorithm = read_encryption_algorithm(r.next())?;
                    let ciphertext = r.next().read_bytes()?;
                    Ok(SafeBag::ShroudedKey { algorithm, ciphertext })
                })
            })?
        } else if bag_type == oid(OID_CERT_BAG) {
            r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    if r.next().read_oid()? != oid(OID_X509_CERTIFICATE) {
                        return Err(invalid());
                    }
                    let der = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
                    Ok(SafeBag::Cert(der))
                })
            })?
        } else {
            r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
            SafeBag::Other
        };
        skip_bag_attributes(r)?;
        Ok(bag)
    })
}

// ── AlgorithmIdentifier ──────────────────────────────────────────────

fn read_encryption_algorithm(r: BERReader) -> Result<Encryption, ASN1Error> {
    r.read_sequence(|r| {
        let alg = r.next().read_oid()?;
        if alg == oid(OID_PBE_SHA1_3DES) {
            return r.next().read_sequence(|r| {
                let salt = r.next().read_bytes()?;
                let iterations = r.next().read_u32()?;
                Ok(Encryption::PbeSha1And3Des { salt, iterations })
            });
        }
        if alg != oid(OID_PBES2) {
            return Err(invalid());
        }
        r.next().read_sequence(|r| {
            let (salt, iterations, prf) = r.next().read_sequence(|r| {
                if r.next().read_oid()? != oid(OID_PBKDF2) {
                    return Err(invalid());
                }
                read_pbkdf2_params(r.next())
            })?;
            let (key_len, iv) = r.next().read_sequence(|r| {
                let cipher = r.next().read_oid()?;
                let key_len = if cipher == oid(OID_AES_128_CBC) {
                    16
                } else if cipher == oid(OID_AES_192_CBC) {
                    24
                } else if cipher == oid(OID_AES_256_CBC) {
                    32
                } else {
                    return Err(invalid());
                };
                Ok((key_len, r.next().read_bytes()?))
            })?;
            Ok(Encryption::Pbes2 { salt, iterations, prf, key_len, iv })
        })
    })
}

/// `PBKDF2-params ::= SEQUENCE { salt, iterationCount, keyLength OPTIONAL, prf DEFAULT hmacWithSHA1 }`
fn read_pbkdf2_params(r: BERReader) -> Result<(Vec<u8>, u32, HashKind), ASN1Error> {
    r.read_sequence(|r| {
        let salt = r.next().read_bytes()?;
        let iterations = r.next().read_u32()?;
        let mut prf = HashKind::Sha1;

        if let Some(der) = r.read_optional(|r| r.read_der())? {
            // 0x30 is the PRF SEQUENCE, anything else is keyLength.
            if der.first() == Some(&0x30) {
                prf = read_prf(&der)?;
            } else if let Some(der) = r.read_optional(|r| r.read_der())? {
                prf = read_prf(&der)?;
            }
        }
        Ok((salt, iterations, prf))
    })
}

fn read_prf(der: &[u8]) -> Result<HashKind, ASN1Error> {
    yasna::parse_der(der, |r| {
        r.read_sequence(|r| {
            let prf = r.next().read_oid()?;
            r.read_optional(|r| r.read_null())?;
            if prf == oid(OID_HMAC_SHA256) {
                Ok(HashKind::Sha256)
            } else if prf == oid(OID_HMAC_SHA1) {
                Ok(HashKind::Sha1)
            } else {
                Err(invalid())
            }
        })
    })
}

// ── MacData ──────────────────────────────────────────────────────────

fn read_mac_data(r: BERReader) -> Result<MacData, ASN1Error> {
    r.read_sequence(|r| {
        let (hash, digest) = r.next().read_sequence(|r| {
            let hash = r.next().read_sequence(|r| {
                let alg = r.next().read_oid()?;
                r.read_optional(|r| r.read_null())?;
                if alg == oid(OID_SHA256) {
                    Ok(HashKind::Sha256)
                } else if alg == oid(OID_SHA1) {
                    Ok(HashKind::Sha1)
                } else {
                    Err(invalid())
                }
            })?;
            Ok((hash, r.next().read_bytes()?))
        })?;
        let salt = r.next().read_bytes()?;
        let iterations = r.read_optional(|r| r.read_u32())?.unwrap_or(1);
        Ok(MacData { hash, digest, salt, iterations })
    })
}
