//! Identifier syntax
//!
//! Identifiers are the building blocks of qualified names and container
//! names: a letter or underscore followed by letters, digits or underscores,
//! at most [`MAX_IDENT_LEN`] bytes.

use crate::consts::MAX_IDENT_LEN;
use crate::error::{Error, Result};

/// Checks that `ident` is a valid identifier.
pub fn validate_ident(ident: &str) -> Result<()> {
    if ident.is_empty() {
        return Err(Error::InvalidName("identifier is empty".to_string()));
    }
    if ident.len() > MAX_IDENT_LEN {
        return Err(Error::InvalidName(format!(
            "identifier «{}…» is longer than {} bytes",
            &ident[..ident.char_indices().nth(16).map_or(ident.len(), |(i, _)| i)],
            MAX_IDENT_LEN
        )));
    }
    for (pos, c) in ident.char_indices() {
        let ok = c.is_ascii_alphabetic() || c == '_' || (pos > 0 && c.is_ascii_digit());
        if !ok {
            return Err(Error::InvalidName(format!(
                "char «{}» at pos {} of «{}» is not valid",
                c.escape_default(),
                pos,
                ident.escape_default()
            )));
        }
    }
    Ok(())
}

/// Returns true if `ident` is a valid identifier.
pub fn is_valid_ident(ident: &str) -> bool {
    validate_ident(ident).is_ok()
}
