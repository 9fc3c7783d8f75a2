//! A read-only, memory-resident lookup engine for the Database of
//! Icelandic Morphology (BÍN).
//!
//! The engine memory-maps a packed binary image of the database plus two
//! optional word graphs for compound analysis and answers inflectional
//! queries: given a surface form, which lemmas, word classes, grammatical
//! tags and alternative inflected forms does it belong to? See [Ordabok]
//! for the query surface and [OrdabokConfig] for construction.

mod error;
pub use error::{Error, Result};

mod image;
pub use image::{ByteImage, HEADER_LEN, IMAGE_MARKER, IMAGE_VERSION, SIGNATURE_LEN};

mod tables;

mod trie;

mod meanings;

mod dawg;
pub use dawg::{Dawg, DAWG_MAGIC, DAWG_VERSION};

mod compound;

mod entry;
pub use entry::{BinEntry, KsnidEntry};

mod ordabok;
pub use ordabok::{LookupOptions, Ordabok, OrdabokConfig};

mod variants;

mod util;
