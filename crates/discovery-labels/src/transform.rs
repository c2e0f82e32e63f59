//! C3's transform chain and the label-key/label-value grammar (spec §4.3/§4.4).

use crate::error::LabelError;
use discovery_core::invocation::{HashAlg, ValueTransform};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Applies a chain of `ValueTransform`s in order, as `Transform(value, [op…])`.
pub fn apply_transforms(mut value: String, ops: &[ValueTransform]) -> Result<String, LabelError> {
    for op in ops {
        value = apply_one(&value, op)?;
    }
    Ok(value)
}

fn apply_one(value: &str, op: &ValueTransform) -> Result<String, LabelError> {
    match op {
        ValueTransform::Lowercase => Ok(value.to_lowercase()),
        ValueTransform::Uppercase => Ok(value.to_uppercase()),
        ValueTransform::Prefix { value: literal } => {
            validate_label_value(literal)?;
            Ok(format!("{literal}{value}"))
        }
        ValueTransform::Suffix { value: literal } => {
            validate_label_value(literal)?;
            Ok(format!("{value}{literal}"))
        }
        ValueTransform::Replace { old, new } => Ok(value.replace(old.as_str(), new)),
        ValueTransform::Truncate { len } => {
            if !(1..=63).contains(len) {
                return Err(LabelError::InvalidTransform(format!(
                    "truncate length {len} out of range 1..=63"
                )));
            }
            Ok(truncate_bytes(value, *len))
        }
        ValueTransform::Hash { alg, len } => {
            if !(4..=64).contains(len) {
                return Err(LabelError::InvalidTransform(format!(
                    "hash length {len} out of range 4..=64"
                )));
            }
            let digest = hex_digest(alg, value.as_bytes());
            Ok(truncate_bytes(&digest, *len))
        }
    }
}

fn hex_digest(alg: &HashAlg, data: &[u8]) -> String {
    match alg {
        HashAlg::Md5 => hex::encode(Md5::digest(data)),
        HashAlg::Sha1 => hex::encode(Sha1::digest(data)),
        HashAlg::Sha256 => hex::encode(Sha256::digest(data)),
    }
}

fn truncate_bytes(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// `InvalidLabelValue` check (spec §4.3): ≤ 63 bytes, `{A-Za-z0-9._-}`, must
/// not begin or end with `.`, `-`, or `_`.
pub fn validate_label_value(value: &str) -> Result<(), LabelError> {
    if value.is_empty() {
        return Ok(());
    }
    if value.len() > 63 {
        return Err(LabelError::InvalidLabelValue(format!("{value:?} exceeds 63 bytes")));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')) {
        return Err(LabelError::InvalidLabelValue(format!(
            "{value:?} contains characters outside [A-Za-z0-9._-]"
        )));
    }
    let first = value.chars().next().unwrap();
    let last = value.chars().last().unwrap();
    if matches!(first, '.' | '-' | '_') || matches!(last, '.' | '-' | '_') {
        return Err(LabelError::InvalidLabelValue(format!(
            "{value:?} must not begin or end with '.', '-', or '_'"
        )));
    }
    Ok(())
}

/// Label **key** grammar (spec §4.4): an optional DNS-subdomain prefix
/// followed by `/`, then `[A-Za-z0-9]([A-Za-z0-9._-]{0,61}[A-Za-z0-9])?`.
pub fn validate_label_key(key: &str) -> Result<(), LabelError> {
    let name = match key.rsplit_once('/') {
        Some((prefix, name)) => {
            validate_dns_subdomain(prefix, key)?;
            name
        }
        None => key,
    };
    validate_key_name(name, key)
}

fn validate_key_name(name: &str, full_key: &str) -> Result<(), LabelError> {
    if name.is_empty() || name.len() > 63 {
        return Err(LabelError::InvalidLabelKey(format!(
            "{full_key:?}: name segment must be 1..=63 characters"
        )));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap();
    if !first.is_ascii_alphanumeric() {
        return Err(LabelError::InvalidLabelKey(format!(
            "{full_key:?}: must start with an alphanumeric character"
        )));
    }
    if name.len() == 1 {
        return Ok(());
    }
    let last = name.chars().last().unwrap();
    if !last.is_ascii_alphanumeric() {
        return Err(LabelError::InvalidLabelKey(format!(
            "{full_key:?}: must end with an alphanumeric character"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')) {
        return Err(LabelError::InvalidLabelKey(format!(
            "{full_key:?}: name segment contains disallowed characters"
        )));
    }
    Ok(())
}

fn validate_dns_subdomain(prefix: &str, full_key: &str) -> Result<(), LabelError> {
    if prefix.is_empty() || prefix.len() > 253 {
        return Err(LabelError::InvalidLabelKey(format!(
            "{full_key:?}: prefix must be 1..=253 characters"
        )));
    }
    for label in prefix.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(LabelError::InvalidLabelKey(format!(
                "{full_key:?}: prefix DNS label {label:?} invalid length"
            )));
        }
        let first_ok = label.chars().next().map(|c| c.is_ascii_alphanumeric()).unwrap_or(false);
        let last_ok = label.chars().last().map(|c| c.is_ascii_alphanumeric()).unwrap_or(false);
        let body_ok = label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !(first_ok && last_ok && body_ok) {
            return Err(LabelError::InvalidLabelKey(format!(
                "{full_key:?}: prefix DNS label {label:?} malformed"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_then_truncate() {
        let ops = vec![ValueTransform::Lowercase, ValueTransform::Truncate { len: 4 }];
        assert_eq!(apply_transforms("PROD-CLUSTER".into(), &ops).unwrap(), "prod");
    }

    #[test]
    fn hash_truncates_hex_digest() {
        let ops = vec![ValueTransform::Hash { alg: HashAlg::Sha256, len: 8 }];
        let out = apply_transforms("demo-cluster".into(), &ops).unwrap();
        assert_eq!(out.len(), 8);
        assert!(out.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn replace_is_global() {
        let ops = vec![ValueTransform::Replace { old: "-".into(), new: "_".into() }];
        assert_eq!(apply_transforms("a-b-c".into(), &ops).unwrap(), "a_b_c");
    }

    #[test]
    fn label_value_rejects_leading_dash() {
        assert!(validate_label_value("-abc").is_err());
    }

    #[test]
    fn label_value_rejects_over_63_bytes() {
        let long = "a".repeat(64);
        assert!(validate_label_value(&long).is_err());
    }

    #[test]
    fn label_key_accepts_prefixed_form() {
        assert!(validate_label_key("kubecore.io/namespace").is_ok());
    }

    #[test]
    fn label_key_rejects_bad_prefix() {
        assert!(validate_label_key("-bad-.io/namespace").is_err());
    }

    #[test]
    fn label_key_without_prefix_is_valid() {
        assert!(validate_label_key("env").is_ok());
    }
}
