//! Run digest output.

pub mod generator;

pub use generator::{
    generate_json_digest, generate_markdown_digest, write_digest, DigestMetadata, RunDigest,
};
