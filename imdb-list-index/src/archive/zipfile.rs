use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};

use crate::error::{Error, Result};

// Record signatures.
const LOCAL_SIG: u32 = 0x0403_4b50;
const CENTRAL_SIG: u32 = 0x0201_4b50;
const EOCD_SIG: u32 = 0x0605_4b50;

// Sizes of the fixed portions of each record.
const LOCAL_LEN: u64 = 30;
const EOCD_LEN: usize = 22;

const METHOD_DEFLATE: u16 = 8;

/// Metadata for one member of a zip container.
#[derive(Clone, Debug)]
pub struct Member {
    /// The member name, decoded as ISO-8859-1.
    pub name: String,
    /// Offset of the member's local file header within the container.
    local_offset: u64,
    /// Compressed size of the member data.
    comp_size: u64,
    /// Decompressed size of the member data.
    pub size: u64,
    /// Compression method. Only DEFLATE and stored are supported.
    method: u16,
    crc: u32,
}

/// A read-only zip container.
///
/// This is a deliberately small implementation: it reads the end-of-central-
/// directory record, walks the central directory into a member list, and
/// inflates members on demand. Nothing else (zip64, encryption, multi-disk
/// spans, data descriptors) is recognized, because the writer half below
/// never produces it.
#[derive(Debug)]
pub struct ZipReader {
    file: File,
    members: Vec<Member>,
}

impl ZipReader {
    /// Open a zip container for reading. Fails with `ArchiveInvalid` if the
    /// file has no end-of-central-directory record.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ZipReader> {
        let path = path.as_ref();
        let mut file =
            File::open(path).map_err(|e| Error::io_path(e, path))?;
        let (_, members) = read_central_directory(&mut file)?;
        Ok(ZipReader { file, members })
    }

    /// Return the member list, in central directory order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Read and decompress the member at the given index in `members()`.
    pub fn read(&mut self, index: usize) -> Result<Vec<u8>> {
        let member = self.members[index].clone();
        self.file
            .seek(SeekFrom::Start(member.local_offset))
            .map_err(Error::io)?;
        let mut header = [0u8; LOCAL_LEN as usize];
        self.file.read_exact(&mut header).map_err(Error::io)?;
        let mut rdr = &header[..];
        if rdr.read_u32::<LittleEndian>().map_err(Error::io)? != LOCAL_SIG {
            return Err(Error::archive_invalid(format!(
                "bad local header for member {}",
                member.name
            )));
        }
        // The local name and extra field lengths may differ from the central
        // directory's copy, so skip based on the local values.
        let name_len = u16::from_le_bytes([header[26], header[27]]) as u64;
        let extra_len = u16::from_le_bytes([header[28], header[29]]) as u64;
        self.file
            .seek(SeekFrom::Start(
                member.local_offset + LOCAL_LEN + name_len + extra_len,
            ))
            .map_err(Error::io)?;

        let mut comp = vec![0u8; member.comp_size as usize];
        self.file.read_exact(&mut comp).map_err(Error::io)?;
        let data = match member.method {
            0 => comp,
            METHOD_DEFLATE => {
                let mut out = Vec::with_capacity(member.size as usize);
                DeflateDecoder::new(&comp[..])
                    .read_to_end(&mut out)
                    .map_err(Error::io)?;
                out
            }
            m => {
                return Err(Error::archive_invalid(format!(
                    "member {} uses unsupported compression method {}",
                    member.name, m
                )))
            }
        };
        if data.len() as u64 != member.size {
            return Err(Error::archive_invalid(format!(
                "member {} inflated to {} bytes, expected {}",
                member.name,
                data.len(),
                member.size
            )));
        }
        Ok(data)
    }
}

/// A zip container writer supporting creation and append.
///
/// Appending re-reads the existing central directory and then overwrites it
/// with new member data; the directory (including the carried-over members)
/// is rewritten at `finish` time. This matches how the archive treats a zip:
/// a log of members plus a directory at the tail.
#[derive(Debug)]
pub struct ZipWriter {
    file: File,
    members: Vec<Member>,
    /// Offset at which the next local header will be written.
    pos: u64,
}

impl ZipWriter {
    /// Create a new, empty zip container, truncating any existing file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<ZipWriter> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::io_path(e, path))?;
        Ok(ZipWriter { file, members: vec![], pos: 0 })
    }

    /// Open a zip container for appending, creating it if absent. Existing
    /// members are preserved.
    pub fn append<P: AsRef<Path>>(path: P) -> Result<ZipWriter> {
        let path = path.as_ref();
        let mut file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => {
                return Ok(ZipWriter { file, members: vec![], pos: 0 })
            }
            Err(ref e) if e.kind() == io::ErrorKind::AlreadyExists => {
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .map_err(|e| Error::io_path(e, path))?
            }
            Err(e) => return Err(Error::io_path(e, path)),
        };
        if file.metadata().map_err(Error::io)?.len() == 0 {
            return Ok(ZipWriter { file, members: vec![], pos: 0 });
        }
        let mut magic = [0u8; 2];
        file.read_exact(&mut magic).map_err(Error::io)?;
        if magic == [0x1f, 0x8b] {
            return Err(Error::unsupported(format!(
                "{} is a gzip stream, which is read-only",
                path.display()
            )));
        }
        let (cd_offset, members) = read_central_directory(&mut file)?;
        // New members overwrite the old central directory; it is rewritten
        // after them by `finish`.
        file.seek(SeekFrom::Start(cd_offset)).map_err(Error::io)?;
        Ok(ZipWriter { file, members, pos: cd_offset })
    }

    /// Return the member list: carried-over members first, then additions.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Compress `data` and append it as a new member called `name`.
    pub fn add(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let mut crc = Crc::new();
        crc.update(data);
        let mut enc = DeflateEncoder::new(
            Vec::with_capacity(data.len() / 2 + 64),
            Compression::default(),
        );
        enc.write_all(data).map_err(Error::io)?;
        let comp = enc.finish().map_err(Error::io)?;

        let member = Member {
            name: name.to_string(),
            local_offset: self.pos,
            comp_size: comp.len() as u64,
            size: data.len() as u64,
            method: METHOD_DEFLATE,
            crc: crc.sum(),
        };
        check_u32(member.comp_size)?;
        check_u32(member.size)?;
        check_u32(member.local_offset)?;

        let mut header = Vec::with_capacity(LOCAL_LEN as usize + name.len());
        header.write_u32::<LittleEndian>(LOCAL_SIG).map_err(Error::io)?;
        header.write_u16::<LittleEndian>(20).map_err(Error::io)?; // version
        header.write_u16::<LittleEndian>(0).map_err(Error::io)?; // flags
        header.write_u16::<LittleEndian>(member.method).map_err(Error::io)?;
        header.write_u16::<LittleEndian>(0).map_err(Error::io)?; // mod time
        header.write_u16::<LittleEndian>(0).map_err(Error::io)?; // mod date
        header.write_u32::<LittleEndian>(member.crc).map_err(Error::io)?;
        header
            .write_u32::<LittleEndian>(member.comp_size as u32)
            .map_err(Error::io)?;
        header
            .write_u32::<LittleEndian>(member.size as u32)
            .map_err(Error::io)?;
        header
            .write_u16::<LittleEndian>(name.len() as u16)
            .map_err(Error::io)?;
        header.write_u16::<LittleEndian>(0).map_err(Error::io)?; // extra len
        header.extend_from_slice(name.as_bytes());

        self.file.write_all(&header).map_err(Error::io)?;
        self.file.write_all(&comp).map_err(Error::io)?;
        self.pos += header.len() as u64 + comp.len() as u64;
        self.members.push(member);
        Ok(())
    }

    /// Write the central directory and end record, then close the container.
    pub fn finish(mut self) -> Result<()> {
        let cd_offset = self.pos;
        let count = self.members.len();
        if count > u16::MAX as usize {
            return Err(Error::bug("too many members for a zip directory"));
        }

        let mut dir = Vec::new();
        for member in &self.members {
            dir.write_u32::<LittleEndian>(CENTRAL_SIG).map_err(Error::io)?;
            dir.write_u16::<LittleEndian>(20).map_err(Error::io)?; // made by
            dir.write_u16::<LittleEndian>(20).map_err(Error::io)?; // needed
            dir.write_u16::<LittleEndian>(0).map_err(Error::io)?; // flags
            dir.write_u16::<LittleEndian>(member.method).map_err(Error::io)?;
            dir.write_u16::<LittleEndian>(0).map_err(Error::io)?; // mod time
            dir.write_u16::<LittleEndian>(0).map_err(Error::io)?; // mod date
            dir.write_u32::<LittleEndian>(member.crc).map_err(Error::io)?;
            dir.write_u32::<LittleEndian>(member.comp_size as u32)
                .map_err(Error::io)?;
            dir.write_u32::<LittleEndian>(member.size as u32)
                .map_err(Error::io)?;
            dir.write_u16::<LittleEndian>(member.name.len() as u16)
                .map_err(Error::io)?;
            dir.write_u16::<LittleEndian>(0).map_err(Error::io)?; // extra
            dir.write_u16::<LittleEndian>(0).map_err(Error::io)?; // comment
            dir.write_u16::<LittleEndian>(0).map_err(Error::io)?; // disk no
            dir.write_u16::<LittleEndian>(0).map_err(Error::io)?; // int attrs
            dir.write_u32::<LittleEndian>(0).map_err(Error::io)?; // ext attrs
            dir.write_u32::<LittleEndian>(member.local_offset as u32)
                .map_err(Error::io)?;
            dir.extend_from_slice(member.name.as_bytes());
        }
        let cd_size = dir.len() as u64;
        check_u32(cd_size)?;
        check_u32(cd_offset)?;

        dir.write_u32::<LittleEndian>(EOCD_SIG).map_err(Error::io)?;
        dir.write_u16::<LittleEndian>(0).map_err(Error::io)?; // disk no
        dir.write_u16::<LittleEndian>(0).map_err(Error::io)?; // cd disk
        dir.write_u16::<LittleEndian>(count as u16).map_err(Error::io)?;
        dir.write_u16::<LittleEndian>(count as u16).map_err(Error::io)?;
        dir.write_u32::<LittleEndian>(cd_size as u32).map_err(Error::io)?;
        dir.write_u32::<LittleEndian>(cd_offset as u32).map_err(Error::io)?;
        dir.write_u16::<LittleEndian>(0).map_err(Error::io)?; // comment len

        self.file.write_all(&dir).map_err(Error::io)?;
        let end = self.pos + dir.len() as u64;
        self.file.set_len(end).map_err(Error::io)?;
        self.file.flush().map_err(Error::io)?;
        Ok(())
    }
}

fn check_u32(n: u64) -> Result<()> {
    if n > u32::MAX as u64 {
        return Err(Error::bug("zip member exceeds 4 GiB limit"));
    }
    Ok(())
}

/// Locate and parse the central directory. Returns its offset and members.
fn read_central_directory(file: &mut File) -> Result<(u64, Vec<Member>)> {
    let len = file.metadata().map_err(Error::io)?.len();
    let tail_len = len.min((EOCD_LEN + u16::MAX as usize) as u64);
    file.seek(SeekFrom::Start(len - tail_len)).map_err(Error::io)?;
    let mut tail = vec![0u8; tail_len as usize];
    file.read_exact(&mut tail).map_err(Error::io)?;

    if tail.len() < EOCD_LEN {
        return Err(Error::archive_invalid("no end-of-directory record"));
    }
    let mut at = None;
    let mut i = tail.len() - EOCD_LEN;
    loop {
        if tail[i..i + 4] == EOCD_SIG.to_le_bytes() {
            at = Some(i);
            break;
        }
        if i == 0 {
            break;
        }
        i -= 1;
    }
    let at = match at {
        None => {
            return Err(Error::archive_invalid("no end-of-directory record"))
        }
        Some(at) => at,
    };
    let eocd = &tail[at..];
    let count = u16::from_le_bytes([eocd[10], eocd[11]]) as usize;
    let cd_size =
        u32::from_le_bytes([eocd[12], eocd[13], eocd[14], eocd[15]]) as u64;
    let cd_offset =
        u32::from_le_bytes([eocd[16], eocd[17], eocd[18], eocd[19]]) as u64;
    if cd_offset + cd_size > len {
        return Err(Error::archive_invalid("directory extends past EOF"));
    }

    file.seek(SeekFrom::Start(cd_offset)).map_err(Error::io)?;
    let mut dir = vec![0u8; cd_size as usize];
    file.read_exact(&mut dir).map_err(Error::io)?;

    let mut members = Vec::with_capacity(count);
    let mut rdr = io::Cursor::new(&dir);
    for _ in 0..count {
        if rdr.read_u32::<LittleEndian>().map_err(Error::io)? != CENTRAL_SIG {
            return Err(Error::archive_invalid("bad directory record"));
        }
        let mut fixed = [0u8; 42];
        rdr.read_exact(&mut fixed).map_err(Error::io)?;
        let method = u16::from_le_bytes([fixed[6], fixed[7]]);
        let crc = u32::from_le_bytes([
            fixed[12], fixed[13], fixed[14], fixed[15],
        ]);
        let comp_size = u32::from_le_bytes([
            fixed[16], fixed[17], fixed[18], fixed[19],
        ]) as u64;
        let size = u32::from_le_bytes([
            fixed[20], fixed[21], fixed[22], fixed[23],
        ]) as u64;
        let name_len = u16::from_le_bytes([fixed[24], fixed[25]]) as usize;
        let extra_len = u16::from_le_bytes([fixed[26], fixed[27]]) as usize;
        let comment_len = u16::from_le_bytes([fixed[28], fixed[29]]) as usize;
        let local_offset = u32::from_le_bytes([
            fixed[38], fixed[39], fixed[40], fixed[41],
        ]) as u64;

        let mut name = vec![0u8; name_len];
        rdr.read_exact(&mut name).map_err(Error::io)?;
        let mut skip = vec![0u8; extra_len + comment_len];
        rdr.read_exact(&mut skip).map_err(Error::io)?;

        members.push(Member {
            name: crate::util::latin1(&name),
            local_offset,
            comp_size,
            size,
            method,
            crc,
        });
    }
    Ok((cd_offset, members))
}
