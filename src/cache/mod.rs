//! Content fingerprinting used to detect a stale example database entry
//! when the schema document it was recorded against has changed.

pub mod fingerprint;
