//! Encryption type handling: the list written to the keytab and the
//! `msDS-supportedEncryptionTypes` bitmask stored in the directory.

use kerberos_constants::etypes::{AES128_CTS_HMAC_SHA1_96, AES256_CTS_HMAC_SHA1_96, RC4_HMAC};
use kerberos_crypto::{aes_hmac_sha1, rc4_hmac_md5, AesSizes};

/// Legacy enctype ids kept for masks written by old domains.
pub const DES_CBC_CRC: i32 = 1;
pub const DES_CBC_MD5: i32 = 3;
pub const DES3_CBC_SHA1: i32 = 16;

/// Default keytab enctypes, strongest first.
pub const DEFAULT_ENCTYPES: &[i32] = &[
    AES256_CTS_HMAC_SHA1_96,
    AES128_CTS_HMAC_SHA1_96,
    DES3_CBC_SHA1,
    RC4_HMAC,
    DES_CBC_MD5,
    DES_CBC_CRC,
];

/// Bits of the msDS-supportedEncryptionTypes mask, weakest first. DES3 has
/// no bit; Active Directory cannot represent it.
const MASK_BITS: &[(u32, i32)] = &[
    (0x00000001, DES_CBC_CRC),
    (0x00000002, DES_CBC_MD5),
    (0x00000004, RC4_HMAC),
    (0x00000008, AES128_CTS_HMAC_SHA1_96),
    (0x00000010, AES256_CTS_HMAC_SHA1_96),
];

/// Decode a decimal mask value into an enctype list, strongest first.
/// Unknown bits are ignored; a value with no known bits yields `None`.
pub fn parse_enctypes(value: &str) -> Option<Vec<i32>> {
    let mask: u32 = value.trim().parse().ok()?;
    let enctypes: Vec<i32> = MASK_BITS
        .iter()
        .rev()
        .filter(|&&(bit, _)| mask & bit != 0)
        .map(|&(_, etype)| etype)
        .collect();
    if enctypes.is_empty() {
        None
    } else {
        Some(enctypes)
    }
}

/// Encode an enctype list as the decimal mask the directory stores.
/// Enctypes without a mask bit are dropped; an empty mask yields `None`.
pub fn format_enctypes(enctypes: &[i32]) -> Option<String> {
    let mut mask = 0u32;
    for &etype in enctypes {
        if let Some(&(bit, _)) = MASK_BITS.iter().find(|&&(_, known)| known == etype) {
            mask |= bit;
        }
    }
    if mask == 0 {
        None
    } else {
        Some(mask.to_string())
    }
}

/// True when the crypto backend can derive a key for `etype`.
pub fn is_derivable(etype: i32) -> bool {
    matches!(
        etype,
        AES256_CTS_HMAC_SHA1_96 | AES128_CTS_HMAC_SHA1_96 | RC4_HMAC
    )
}

/// True when `etype`'s string-to-key actually consumes the salt. RC4 keys
/// are salt independent, which makes them useless for salt discovery.
pub fn uses_salt(etype: i32) -> bool {
    matches!(etype, AES256_CTS_HMAC_SHA1_96 | AES128_CTS_HMAC_SHA1_96)
}

/// Derive the long-term key for `etype` from a password and salt. `None`
/// for enctypes the crypto backend has no string-to-key for.
pub fn derive_key(etype: i32, password: &str, salt: &[u8]) -> Option<Vec<u8>> {
    match etype {
        AES256_CTS_HMAC_SHA1_96 => Some(
            aes_hmac_sha1::generate_key_from_string(password, salt, &AesSizes::Aes256).to_vec(),
        ),
        AES128_CTS_HMAC_SHA1_96 => Some(
            aes_hmac_sha1::generate_key_from_string(password, salt, &AesSizes::Aes128).to_vec(),
        ),
        RC4_HMAC => Some(rc4_hmac_md5::generate_key_from_string(password).to_vec()),
        _ => None,
    }
}
