use std::io::{self, Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};

use super::{Keyblock, Keytab, KeytabEntry};
use crate::principal::Principal;

const KEYTAB_V2: u16 = 0x0502;

#[derive(Debug)]
pub enum ParseError {
    Io(io::Error),
    InvalidFormat(String),
    UnsupportedVersion(u16),
}

impl From<io::Error> for ParseError {
    fn from(err: io::Error) -> Self {
        ParseError::Io(err)
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Io(e) => write!(f, "IO error: {}", e),
            ParseError::InvalidFormat(s) => write!(f, "Invalid format: {}", s),
            ParseError::UnsupportedVersion(v) => write!(f, "Unsupported version: 0x{:04x}", v),
        }
    }
}

impl std::error::Error for ParseError {}

pub fn parse_keytab_bytes(data: &[u8]) -> Result<Keytab, ParseError> {
    let mut cursor = Cursor::new(data);

    let version = cursor.read_u16::<BigEndian>()?;
    if version != KEYTAB_V2 {
        return Err(ParseError::UnsupportedVersion(version));
    }

    let mut entries = Vec::new();
    while (cursor.position() as usize) < data.len() {
        let length = match cursor.read_i32::<BigEndian>() {
            Ok(length) => length,
            Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if length == 0 {
            break;
        }
        if length < 0 {
            // A negative length is a hole left behind by a deleted entry;
            // skip over it.
            cursor.set_position(cursor.position() + length.unsigned_abs() as u64);
            continue;
        }
        let start = cursor.position() as usize;
        let end = start + length as usize;
        if end > data.len() {
            return Err(ParseError::InvalidFormat(
                "record length runs past end of file".to_string(),
            ));
        }
        let mut record = Cursor::new(&data[start..end]);
        entries.push(parse_entry(&mut record)?);
        cursor.set_position(end as u64);
    }

    Ok(Keytab { entries })
}

fn parse_entry(cursor: &mut Cursor<&[u8]>) -> Result<KeytabEntry, ParseError> {
    let count = cursor.read_u16::<BigEndian>()?;
    let realm = parse_counted_string(cursor)?;

    let mut components = Vec::with_capacity(count as usize);
    for _ in 0..count {
        components.push(parse_counted_string(cursor)?);
    }

    let name_type = cursor.read_u32::<BigEndian>()?;
    let timestamp = cursor.read_u32::<BigEndian>()?;
    let vno8 = cursor.read_u8()?;

    let keytype = cursor.read_u16::<BigEndian>()?;
    let keyvalue = parse_counted_data(cursor)?;

    // The 32 bit key version tail only exists in keytabs written by krb5
    // 1.14 and later.
    let remaining = cursor.get_ref().len() as u64 - cursor.position();
    let vno = if remaining >= 4 {
        Some(cursor.read_u32::<BigEndian>()?)
    } else {
        None
    };

    Ok(KeytabEntry {
        principal: Principal {
            name_type: name_type as i32,
            components,
            realm,
        },
        timestamp,
        vno8,
        key: Keyblock { keytype, keyvalue },
        vno,
    })
}

fn parse_counted_string(cursor: &mut Cursor<&[u8]>) -> Result<String, ParseError> {
    let data = parse_counted_data(cursor)?;
    String::from_utf8(data).map_err(|e| ParseError::InvalidFormat(format!("Invalid UTF-8: {}", e)))
}

fn parse_counted_data(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u8>, ParseError> {
    let length = cursor.read_u16::<BigEndian>()?;
    let mut data = vec![0u8; length as usize];
    cursor.read_exact(&mut data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::super::writer::write_keytab_bytes;
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    fn sample_entry(kvno: u32) -> KeytabEntry {
        KeytabEntry {
            principal: Principal::parse("HOST/host1.example.com", "EXAMPLE.COM").unwrap(),
            timestamp: 1_700_000_000,
            vno8: (kvno & 0xff) as u8,
            key: Keyblock {
                keytype: 18,
                keyvalue: vec![0xab; 32],
            },
            vno: Some(kvno),
        }
    }

    #[test]
    fn test_round_trip() {
        let mut keytab = Keytab::default();
        keytab.push(sample_entry(2));
        keytab.push(sample_entry(300));

        let bytes = write_keytab_bytes(&keytab).unwrap();
        let parsed = parse_keytab_bytes(&bytes).unwrap();
        assert_eq!(parsed, keytab);
        assert_eq!(parsed.entries[1].kvno(), 300);
    }

    #[test]
    fn test_skips_holes() {
        let mut keytab = Keytab::default();
        keytab.push(sample_entry(2));
        let mut bytes = write_keytab_bytes(&keytab).unwrap();

        // Splice a 6 byte hole between the header and the record.
        let mut with_hole = Vec::new();
        with_hole.extend_from_slice(&bytes[..2]);
        with_hole.write_i32::<BigEndian>(-6).unwrap();
        with_hole.write_all(&[0u8; 6]).unwrap();
        with_hole.extend_from_slice(&bytes[2..]);
        bytes = with_hole;

        let parsed = parse_keytab_bytes(&bytes).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0], sample_entry(2));
    }

    #[test]
    fn test_reads_pre_1_14_records() {
        // Hand-built record without the trailing 32 bit kvno.
        let mut bytes = Vec::new();
        bytes.write_u16::<BigEndian>(0x0502).unwrap();
        let mut record = Vec::new();
        record.write_u16::<BigEndian>(1).unwrap();
        record.write_u16::<BigEndian>(11).unwrap();
        record.write_all(b"EXAMPLE.COM").unwrap();
        record.write_u16::<BigEndian>(6).unwrap();
        record.write_all(b"HOST1$").unwrap();
        record.write_u32::<BigEndian>(1).unwrap(); // name type
        record.write_u32::<BigEndian>(1_700_000_000).unwrap();
        record.write_u8(7).unwrap(); // vno8 only
        record.write_u16::<BigEndian>(23).unwrap();
        record.write_u16::<BigEndian>(16).unwrap();
        record.write_all(&[0xcd; 16]).unwrap();
        bytes.write_i32::<BigEndian>(record.len() as i32).unwrap();
        bytes.write_all(&record).unwrap();

        let parsed = parse_keytab_bytes(&bytes).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        let entry = &parsed.entries[0];
        assert_eq!(entry.vno, None);
        assert_eq!(entry.kvno(), 7);
        assert_eq!(entry.principal.to_string(), "HOST1$@EXAMPLE.COM");
        assert_eq!(entry.key.keytype, 23);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut bytes = Vec::new();
        bytes.write_u16::<BigEndian>(0x0501).unwrap();
        assert!(matches!(
            parse_keytab_bytes(&bytes),
            Err(ParseError::UnsupportedVersion(0x0501))
        ));
    }

    #[test]
    fn test_rejects_truncated_record() {
        let mut bytes = Vec::new();
        bytes.write_u16::<BigEndian>(0x0502).unwrap();
        bytes.write_i32::<BigEndian>(100).unwrap();
        bytes.write_all(&[0u8; 10]).unwrap();
        assert!(matches!(
            parse_keytab_bytes(&bytes),
            Err(ParseError::InvalidFormat(_))
        ));
    }
}
