//! NewSessionTicket body (RFC 8446 §4.6.1).

use crate::codec::{read_length_prefixed, read_u32, write_length_prefixed, write_u32, LengthPrefix};
use crate::error::{Error, Result};
use crate::extensions::{check_unique, encode_block, Extension, ExtensionRegistry};

/// Tickets may not be advertised for longer than seven days.
pub const MAX_TICKET_LIFETIME: u32 = 604_800;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionTicket {
    pub ticket_lifetime: u32,
    pub ticket_age_add: u32,
    pub ticket_nonce: Vec<u8>,
    pub ticket: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl NewSessionTicket {
    pub fn parse(body: &[u8]) -> Result<Self> {
        Self::parse_with(body, ExtensionRegistry::global())
    }

    pub fn parse_with(body: &[u8], registry: &ExtensionRegistry) -> Result<Self> {
        let (ticket_lifetime, rest) = read_u32(body)?;
        let (ticket_age_add, rest) = read_u32(rest)?;
        let (ticket_nonce, rest) = read_length_prefixed(rest, LengthPrefix::U8)?;
        let (ticket, rest) = read_length_prefixed(rest, LengthPrefix::U16)?;
        let (extensions, rest) = registry.decode_block(rest)?;
        if !rest.is_empty() {
            return Err(Error::Malformed("trailing bytes after new_session_ticket"));
        }

        Ok(Self {
            ticket_lifetime,
            ticket_age_add,
            ticket_nonce: ticket_nonce.to_vec(),
            ticket: ticket.to_vec(),
            extensions,
        })
    }

    pub fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u32(out, self.ticket_lifetime);
        write_u32(out, self.ticket_age_add);
        write_length_prefixed(out, LengthPrefix::U8, &self.ticket_nonce)?;
        write_length_prefixed(out, LengthPrefix::U16, &self.ticket)?;
        encode_block(&self.extensions, out)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ticket_lifetime > MAX_TICKET_LIFETIME {
            return Err(Error::Validation(format!(
                "ticket_lifetime {} exceeds seven days",
                self.ticket_lifetime
            )));
        }
        if self.ticket.is_empty() {
            return Err(Error::Validation("empty ticket".into()));
        }
        check_unique(&self.extensions)
    }
}
