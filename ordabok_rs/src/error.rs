use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while constructing an engine or opening one of its
/// memory-mapped files.
///
/// Construction is the only fallible stage of the engine's life: once an
/// [Ordabok](crate::Ordabok) instance exists, every query returns plain
/// (possibly empty) result lists. A word that is not in the database, a
/// record offset that points outside the image, or a packed sequence that
/// violates a format invariant all degrade to "no entries" at query time,
/// never to an error.
///
/// # Variants
///
/// * `ImageOpenFailed` / `DawgOpenFailed` - the file could not be opened or
///   mapped; carries the path and the underlying [io::Error].
/// * `ImageTooSmall` / `DawgTooSmall` - the file is shorter than its fixed
///   header.
/// * `ImageBadSignature` / `DawgBadSignature` - the signature or format
///   version does not match what this crate reads.
/// * `ImageBadSections` - the eight section offsets of the image header are
///   mutually inconsistent (an offset beyond the end of the file, or a lemma
///   section whose size is not a whole number of records).
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open image {path}: {source}")]
    ImageOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("image is too small to hold a header")]
    ImageTooSmall,
    #[error("image signature mismatch (not a supported \"Greynir\" image)")]
    ImageBadSignature,
    #[error("image section offsets are inconsistent")]
    ImageBadSections,
    #[error("failed to open word graph {path}: {source}")]
    DawgOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("word graph is too small to hold a header")]
    DawgTooSmall,
    #[error("word graph signature or version mismatch")]
    DawgBadSignature,
}

/// Convenience alias used by the constructors of this crate.
pub type Result<T> = std::result::Result<T, Error>;
