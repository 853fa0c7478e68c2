//! Namespace constants and rule file naming.
//!
//! A rule named `N` appears as `escape(N) + RULE_SUFFIX` inside the
//! [`COLLECTION`] directory. The only reserved character is
//! [`NAME_DELIMITER`], which is written as [`ESCAPED_DELIMITER`]. Rule names
//! cannot contain the escape token, so the mapping is a bijection.

use zxfs_core::domain::{RuleName, ESCAPED_DELIMITER, NAME_DELIMITER};

/// URI scheme of the namespace
pub const SCHEME: &str = "zxtm";

/// Name of the one directory under each host root
pub const COLLECTION: &str = "Rules";

/// Suffix carried by every rule file
pub const RULE_SUFFIX: &str = ".zts";

/// Replaces every [`NAME_DELIMITER`] with [`ESCAPED_DELIMITER`].
pub fn escape(name: &str) -> String {
    name.replace(NAME_DELIMITER, ESCAPED_DELIMITER)
}

/// Inverse of [`escape`] for any name that does not contain the escape token.
pub fn unescape(escaped: &str) -> String {
    escaped.replace(ESCAPED_DELIMITER, &NAME_DELIMITER.to_string())
}

/// File name under which `name` is listed.
pub fn rule_file_name(name: &RuleName) -> String {
    format!("{}{}", escape(name.as_str()), RULE_SUFFIX)
}

/// Recovers the rule name from a file name in the collection directory.
///
/// Returns `None` when the segment lacks the suffix, does not decode to a
/// valid rule name, or is not the canonical spelling of that name (a raw
/// delimiter would otherwise alias the escaped form).
pub fn parse_rule_file_name(segment: &str) -> Option<RuleName> {
    let stem = segment.strip_suffix(RULE_SUFFIX)?;
    if stem.contains(NAME_DELIMITER) {
        return None;
    }
    RuleName::new(unescape(stem)).ok()
}
