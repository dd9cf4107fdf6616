//! PII encryption-at-rest primitives.
//!
//! Two layers of symmetric encryption protect every sensitive field (phone
//! numbers, license numbers, license plates):
//!
//! 1. A fresh data key + IV is generated per field instance and encrypts
//!    that one value ([`field_encryption`]).
//! 2. The data key itself is wrapped under the process-wide master key and
//!    stored in the `encryption_keys` table ([`key_management`]).
//!
//! Rotating the master key only requires re-wrapping key rows, never
//! re-encrypting field data.

pub mod field_encryption;
pub mod key_management;
