use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};

use super::{Keytab, KeytabEntry};

const KEYTAB_V2: u16 = 0x0502;

pub fn write_keytab_bytes(keytab: &Keytab) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();

    buf.write_u16::<BigEndian>(KEYTAB_V2)?;

    for entry in &keytab.entries {
        write_entry(&mut buf, entry)?;
    }

    Ok(buf)
}

fn write_entry(buf: &mut Vec<u8>, entry: &KeytabEntry) -> io::Result<()> {
    // Records are length prefixed, so build the body first.
    let mut record = Vec::new();

    record.write_u16::<BigEndian>(entry.principal.components.len() as u16)?;
    write_counted_string(&mut record, &entry.principal.realm)?;
    for component in &entry.principal.components {
        write_counted_string(&mut record, component)?;
    }
    record.write_u32::<BigEndian>(entry.principal.name_type as u32)?;

    record.write_u32::<BigEndian>(entry.timestamp)?;
    record.write_u8(entry.vno8)?;

    record.write_u16::<BigEndian>(entry.key.keytype)?;
    write_counted_data(&mut record, &entry.key.keyvalue)?;

    if let Some(vno) = entry.vno {
        record.write_u32::<BigEndian>(vno)?;
    }

    buf.write_i32::<BigEndian>(record.len() as i32)?;
    buf.write_all(&record)?;

    Ok(())
}

fn write_counted_string(buf: &mut Vec<u8>, s: &str) -> io::Result<()> {
    write_counted_data(buf, s.as_bytes())
}

fn write_counted_data(buf: &mut Vec<u8>, data: &[u8]) -> io::Result<()> {
    buf.write_u16::<BigEndian>(data.len() as u16)?;
    buf.write_all(data)?;
    Ok(())
}
