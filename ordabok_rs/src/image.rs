use std::fs::File;
use std::path::Path;

use memmap2::{Mmap, MmapOptions};

use crate::error::{Error, Result};

/// First eight bytes of every morphology image.
pub const IMAGE_MARKER: &[u8; 8] = b"Greynir ";

/// Format version tuple occupying bytes 8..16 of the signature. Bumped
/// whenever the binary layout changes; images carrying any other version are
/// rejected at construction time.
pub const IMAGE_VERSION: &[u8; 8] = b"04.00.00";

/// Total signature length: marker followed by the version tuple.
pub const SIGNATURE_LEN: usize = 16;

/// Signature plus the eight little-endian `u32` section offsets.
pub const HEADER_LEN: usize = SIGNATURE_LEN + 8 * 4;

/// Backing storage of a [ByteImage]: either a private read-only mapping of a
/// file, or an owned buffer handed in by the embedder.
enum Buffer {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Buffer {
    #[inline(always)]
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mapped(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
        }
    }
}

/// A read-only byte image with bounds-checked little-endian accessors.
///
/// This is the lowest layer of the engine: every other component reads the
/// mapped morphology image exclusively through it. All accessors take a byte
/// offset from the start of the image and return [None] instead of faulting
/// when the read would cross the end of the buffer, so corrupt offsets
/// degrade to "not found" higher up instead of aborting the process.
///
/// The mapping is private (copy-on-write) and never written through; the
/// underlying file descriptor is closed as soon as the mapping exists.
pub struct ByteImage {
    buf: Buffer,
}

impl ByteImage {
    /// Memory-maps `path` read-only.
    pub fn open(path: &Path) -> Result<ByteImage> {
        let file = File::open(path).map_err(|source| Error::ImageOpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        // Private mapping: the engine never writes, and stray writes by a
        // misbehaving host would not reach the file.
        let map = unsafe { MmapOptions::new().map_copy_read_only(&file) }.map_err(|source| {
            Error::ImageOpenFailed {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(ByteImage {
            buf: Buffer::Mapped(map),
        })
    }

    /// Wraps an owned buffer, for embedders that ship the image inside
    /// another container (and for tests).
    pub fn from_bytes(bytes: Vec<u8>) -> ByteImage {
        ByteImage {
            buf: Buffer::Owned(bytes),
        }
    }

    /// Wraps an existing mapping.
    pub(crate) fn from_mmap(map: Mmap) -> ByteImage {
        ByteImage {
            buf: Buffer::Mapped(map),
        }
    }

    /// Total image length in bytes.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.buf.as_slice().len()
    }

    /// True if the image holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads one byte.
    #[inline(always)]
    pub fn u8(&self, off: u32) -> Option<u8> {
        self.buf.as_slice().get(off as usize).copied()
    }

    /// Reads a little-endian `u16`.
    #[inline(always)]
    pub fn u16le(&self, off: u32) -> Option<u16> {
        let b = self.bytes(off, 2)?;
        Some(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Reads a little-endian `u32`.
    #[inline(always)]
    pub fn u32le(&self, off: u32) -> Option<u32> {
        let b = self.bytes(off, 4)?;
        Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Borrows `n` bytes starting at `off`.
    #[inline(always)]
    pub fn bytes(&self, off: u32, n: usize) -> Option<&[u8]> {
        let start = off as usize;
        self.buf.as_slice().get(start..start.checked_add(n)?)
    }

    /// Borrows the zero-terminated byte string starting at `off`, without
    /// the terminator. Unterminated tails return [None].
    pub fn cstr(&self, off: u32) -> Option<&[u8]> {
        let tail = self.buf.as_slice().get(off as usize..)?;
        let end = tail.iter().position(|&b| b == 0)?;
        Some(&tail[..end])
    }

    /// Borrows the length-prefixed byte string at `off` (`{length: u8,
    /// bytes: [length]}`), the layout used by the lemma, subcategory,
    /// template and ksnid string pools.
    pub fn lpstr(&self, off: u32) -> Option<&[u8]> {
        let len = self.u8(off)? as usize;
        self.bytes(off.checked_add(1)?, len)
    }
}

/// Parsed image header: the version tuple and the eight section offsets, in
/// the order they appear on disk.
///
/// Every offset is a byte offset from the start of the image. The sections
/// are self-describing past their start; the only cross-section constraint
/// is that `templates` immediately follows the fixed-stride lemma array and
/// therefore doubles as its end sentinel.
pub(crate) struct Header {
    pub version: String,
    pub mappings: u32,
    pub forms: u32,
    pub lemmas: u32,
    pub templates: u32,
    pub meanings: u32,
    pub alphabet: u32,
    pub subcats: u32,
    pub ksnid: u32,
}

impl Header {
    /// Validates the signature and section offsets of `image`.
    pub fn read(image: &ByteImage) -> Result<Header> {
        if image.len() < HEADER_LEN {
            return Err(Error::ImageTooSmall);
        }
        let sig = image.bytes(0, SIGNATURE_LEN).ok_or(Error::ImageTooSmall)?;
        if &sig[..8] != IMAGE_MARKER || &sig[8..] != IMAGE_VERSION {
            return Err(Error::ImageBadSignature);
        }
        let version = String::from_utf8_lossy(&sig[8..]).into_owned();

        let mut offsets = [0u32; 8];
        for (i, off) in offsets.iter_mut().enumerate() {
            // Cannot fail: HEADER_LEN was checked above.
            *off = image.u32le((SIGNATURE_LEN + i * 4) as u32).unwrap_or(0);
        }
        let [mappings, forms, lemmas, templates, meanings, alphabet, subcats, ksnid] = offsets;

        let len = image.len() as u64;
        if offsets.iter().any(|&off| off as u64 > len) {
            return Err(Error::ImageBadSections);
        }
        // The lemma array runs from `lemmas` to `templates` in whole
        // 16-byte records.
        if templates < lemmas || (templates - lemmas) % 16 != 0 {
            return Err(Error::ImageBadSections);
        }

        Ok(Header {
            version,
            mappings,
            forms,
            lemmas,
            templates,
            meanings,
            alphabet,
            subcats,
            ksnid,
        })
    }
}
