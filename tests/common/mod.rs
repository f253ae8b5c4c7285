#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};

pub enum Method {
    Stored,
    Deflated,
    /// Any other method id; the data is written as is.
    Other(u16),
}

pub struct Member<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
    pub method: Method,
    pub flags: u16,
    /// Uncompressed size recorded through a ZIP64 extra field instead of
    /// the real one.
    pub declared_size: Option<u64>,
}

impl Member<'_> {
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }
}

pub fn stored<'a>(name: &'a str, data: &'a [u8]) -> Member<'a> {
    Member {
        name,
        data,
        method: Method::Stored,
        flags: 0,
        declared_size: None,
    }
}

pub fn deflated<'a>(name: &'a str, data: &'a [u8]) -> Member<'a> {
    Member {
        name,
        data,
        method: Method::Deflated,
        flags: 0,
        declared_size: None,
    }
}

/// Minimal ZIP writer: local headers, central directory, end record.
pub fn zip_bytes(members: &[Member]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();

    for member in members {
        let offset = out.len() as u32;
        let mut crc = flate2::Crc::new();
        crc.update(member.data);

        let (method, payload) = match member.method {
            Method::Stored => (0u16, member.data.to_vec()),
            Method::Deflated => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(member.data).unwrap();
                (8u16, encoder.finish().unwrap())
            }
            Method::Other(id) => (id, member.data.to_vec()),
        };

        out.write_all(b"PK\x03\x04").unwrap();
        out.write_u16::<LittleEndian>(20).unwrap();
        out.write_u16::<LittleEndian>(member.flags).unwrap();
        out.write_u16::<LittleEndian>(method).unwrap();
        out.write_u16::<LittleEndian>(0x6000).unwrap();
        out.write_u16::<LittleEndian>(0x5321).unwrap();
        out.write_u32::<LittleEndian>(crc.sum()).unwrap();
        out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(member.data.len() as u32).unwrap();
        out.write_u16::<LittleEndian>(member.name.len() as u16).unwrap();
        // A local extra field the central directory does not repeat
        out.write_u16::<LittleEndian>(8).unwrap();
        out.write_all(member.name.as_bytes()).unwrap();
        out.write_u16::<LittleEndian>(0xCAFE).unwrap();
        out.write_u16::<LittleEndian>(4).unwrap();
        out.write_all(&[1, 2, 3, 4]).unwrap();
        out.write_all(&payload).unwrap();

        central.write_all(b"PK\x01\x02").unwrap();
        central.write_u16::<LittleEndian>(0x031E).unwrap();
        central.write_u16::<LittleEndian>(20).unwrap();
        central.write_u16::<LittleEndian>(member.flags).unwrap();
        central.write_u16::<LittleEndian>(method).unwrap();
        central.write_u16::<LittleEndian>(0x6000).unwrap();
        central.write_u16::<LittleEndian>(0x5321).unwrap();
        central.write_u32::<LittleEndian>(crc.sum()).unwrap();
        central.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
        match member.declared_size {
            Some(_) => central.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap(),
            None => central.write_u32::<LittleEndian>(member.data.len() as u32).unwrap(),
        }
        central.write_u16::<LittleEndian>(member.name.len() as u16).unwrap();
        let extra_len = if member.declared_size.is_some() { 12 } else { 0 };
        central.write_u16::<LittleEndian>(extra_len).unwrap();
        central.write_u16::<LittleEndian>(0).unwrap(); // comment
        central.write_u16::<LittleEndian>(0).unwrap(); // disk
        central.write_u16::<LittleEndian>(0).unwrap(); // internal attrs
        central.write_u32::<LittleEndian>(0).unwrap(); // external attrs
        central.write_u32::<LittleEndian>(offset).unwrap();
        central.write_all(member.name.as_bytes()).unwrap();
        if let Some(size) = member.declared_size {
            central.write_u16::<LittleEndian>(0x0001).unwrap();
            central.write_u16::<LittleEndian>(8).unwrap();
            central.write_u64::<LittleEndian>(size).unwrap();
        }
    }

    let cd_offset = out.len() as u32;
    out.extend_from_slice(&central);
    out.write_all(b"PK\x05\x06").unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out.write_u16::<LittleEndian>(members.len() as u16).unwrap();
    out.write_u16::<LittleEndian>(members.len() as u16).unwrap();
    out.write_u32::<LittleEndian>(central.len() as u32).unwrap();
    out.write_u32::<LittleEndian>(cd_offset).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out
}

pub fn write_zip(dir: &Path, file_name: &str, members: &[Member]) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, zip_bytes(members)).unwrap();
    path
}

/// Deterministic, non-repeating payload of `len` bytes.
pub fn payload(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u32).wrapping_mul(31).wrapping_add(seed as u32) as u8)
        .collect()
}
