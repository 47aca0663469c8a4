//! JAN (EAN-13) code format rules.
//!
//! Only the write path checks formats. Lookups query whatever string the
//! caller supplied and let the store decide whether it exists.

use crate::error::CoreError;

/// Number of characters in a JAN code.
pub const JAN_CODE_LEN: usize = 13;

/// Validate that `code` is exactly [`JAN_CODE_LEN`] ASCII digits.
///
/// The GS1 check digit is not verified. Catalogue data
/// contains codes whose final digit does not match the computed one, and
/// those still have to be storable.
pub fn validate_jan_code(code: &str) -> Result<(), CoreError> {
    if code.len() != JAN_CODE_LEN {
        return Err(CoreError::Validation(format!(
            "JAN code must be {JAN_CODE_LEN} digits, got {} characters",
            code.chars().count()
        )));
    }
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::Validation(format!(
            "JAN code '{code}' must contain only digits"
        )));
    }
    Ok(())
}
