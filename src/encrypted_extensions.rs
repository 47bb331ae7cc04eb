//! EncryptedExtensions body (RFC 8446 §4.3.1): just an extensions block.

use tracing::debug;

use crate::error::{Error, Result};
use crate::extensions::{check_unique, encode_block, Extension, ExtensionRegistry};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptedExtensions {
    pub extensions: Vec<Extension>,
}

impl EncryptedExtensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_extension(&mut self, extension: Extension) {
        debug!(extension_type = ?extension.extension_type(), "adding encrypted extension");
        self.extensions.push(extension);
    }

    pub fn parse(body: &[u8]) -> Result<Self> {
        Self::parse_with(body, ExtensionRegistry::global())
    }

    /// Unlike the Hello messages, the block is mandatory here.
    pub fn parse_with(body: &[u8], registry: &ExtensionRegistry) -> Result<Self> {
        let (extensions, rest) = registry.decode_block(body)?;
        if !rest.is_empty() {
            return Err(Error::Malformed("trailing bytes after encrypted_extensions"));
        }
        Ok(Self { extensions })
    }

    pub fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        encode_block(&self.extensions, out)
    }

    pub fn validate(&self) -> Result<()> {
        check_unique(&self.extensions)
    }
}
