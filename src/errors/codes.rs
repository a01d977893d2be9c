//! Error definitions and the reserved code space.
//!
//! Codes are 12-bit identifiers with reserved bitmasks: `0x80` marks group
//! errors (the error carries child errors), `0x60` marks errors raised in
//! the normalization phase, `0x90` marks errors emitted by a logical
//! (`*of`) rule. User-defined errors must use codes at `0x100` and above.

/// Mask for group errors.
pub const GROUP_MASK: u16 = 0x80;
/// Mask for normalization-phase errors.
pub const NORMALIZATION_MASK: u16 = 0x60;
/// Mask for logical-rule errors.
pub const LOGICAL_MASK: u16 = 0x90;
/// First code available to user-defined errors.
pub const CUSTOM_BASE: u16 = 0x100;

/// A code/rule pair identifying one kind of validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorDefinition {
    /// Numeric identifier; see the module docs for the reserved bits.
    pub code: u16,
    /// The rule that emits this error, if any.
    pub rule: Option<&'static str>,
}

impl ErrorDefinition {
    const fn new(code: u16, rule: Option<&'static str>) -> Self {
        Self { code, rule }
    }

    /// `true` when errors of this kind carry child errors.
    pub fn is_group(&self) -> bool {
        self.code & GROUP_MASK != 0
    }

    /// `true` when this kind is emitted during normalization.
    pub fn is_normalization(&self) -> bool {
        self.code & NORMALIZATION_MASK == NORMALIZATION_MASK
    }

    /// `true` when this kind is emitted by an `*of`-rule.
    pub fn is_logical(&self) -> bool {
        self.code & LOGICAL_MASK == LOGICAL_MASK
    }
}

pub const CUSTOM: ErrorDefinition = ErrorDefinition::new(0x00, None);
pub const DOCUMENT_MISSING: ErrorDefinition = ErrorDefinition::new(0x01, None);
pub const REQUIRED_FIELD: ErrorDefinition = ErrorDefinition::new(0x02, Some("required"));
pub const UNKNOWN_FIELD: ErrorDefinition = ErrorDefinition::new(0x03, None);
pub const DEPENDENCIES_FIELD: ErrorDefinition = ErrorDefinition::new(0x04, Some("dependencies"));
pub const DEPENDENCIES_FIELD_VALUE: ErrorDefinition =
    ErrorDefinition::new(0x05, Some("dependencies"));
pub const EXCLUDES_FIELD: ErrorDefinition = ErrorDefinition::new(0x06, Some("excludes"));

pub const DOCUMENT_FORMAT: ErrorDefinition = ErrorDefinition::new(0x21, None);
pub const EMPTY_NOT_ALLOWED: ErrorDefinition = ErrorDefinition::new(0x22, Some("empty"));
pub const NOT_NULLABLE: ErrorDefinition = ErrorDefinition::new(0x23, Some("nullable"));
pub const BAD_TYPE: ErrorDefinition = ErrorDefinition::new(0x24, Some("type"));
pub const ITEMS_LENGTH: ErrorDefinition = ErrorDefinition::new(0x26, Some("items"));
pub const MIN_LENGTH: ErrorDefinition = ErrorDefinition::new(0x27, Some("minlength"));
pub const MAX_LENGTH: ErrorDefinition = ErrorDefinition::new(0x28, Some("maxlength"));

pub const REGEX_MISMATCH: ErrorDefinition = ErrorDefinition::new(0x41, Some("regex"));
pub const MIN_VALUE: ErrorDefinition = ErrorDefinition::new(0x42, Some("min"));
pub const MAX_VALUE: ErrorDefinition = ErrorDefinition::new(0x43, Some("max"));
pub const UNALLOWED_VALUE: ErrorDefinition = ErrorDefinition::new(0x44, Some("allowed"));
pub const UNALLOWED_VALUES: ErrorDefinition = ErrorDefinition::new(0x45, Some("allowed"));
pub const FORBIDDEN_VALUE: ErrorDefinition = ErrorDefinition::new(0x46, Some("forbidden"));
pub const FORBIDDEN_VALUES: ErrorDefinition = ErrorDefinition::new(0x47, Some("forbidden"));
pub const MISSING_MEMBERS: ErrorDefinition = ErrorDefinition::new(0x48, Some("contains"));

pub const NORMALIZATION: ErrorDefinition = ErrorDefinition::new(0x60, None);
pub const COERCION_FAILED: ErrorDefinition = ErrorDefinition::new(0x61, Some("coerce"));
pub const RENAMING_FAILED: ErrorDefinition = ErrorDefinition::new(0x62, Some("rename_handler"));
pub const READONLY_FIELD: ErrorDefinition = ErrorDefinition::new(0x63, Some("readonly"));
pub const SETTING_DEFAULT_FAILED: ErrorDefinition =
    ErrorDefinition::new(0x64, Some("default_setter"));

pub const ERROR_GROUP: ErrorDefinition = ErrorDefinition::new(0x80, None);
pub const MAPPING_SCHEMA: ErrorDefinition = ErrorDefinition::new(0x81, Some("schema"));
pub const SEQUENCE_SCHEMA: ErrorDefinition = ErrorDefinition::new(0x82, Some("schema"));
pub const KEYSRULES: ErrorDefinition = ErrorDefinition::new(0x83, Some("keysrules"));
pub const VALUESRULES: ErrorDefinition = ErrorDefinition::new(0x84, Some("valuesrules"));
pub const BAD_ITEMS: ErrorDefinition = ErrorDefinition::new(0x8F, Some("items"));

pub const LOGICAL: ErrorDefinition = ErrorDefinition::new(0x90, None);
pub const NONEOF: ErrorDefinition = ErrorDefinition::new(0x91, Some("noneof"));
pub const ONEOF: ErrorDefinition = ErrorDefinition::new(0x92, Some("oneof"));
pub const ANYOF: ErrorDefinition = ErrorDefinition::new(0x93, Some("anyof"));
pub const ALLOF: ErrorDefinition = ErrorDefinition::new(0x94, Some("allof"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_bit() {
        assert!(MAPPING_SCHEMA.is_group());
        assert!(ANYOF.is_group());
        assert!(!BAD_TYPE.is_group());
        assert!(!COERCION_FAILED.is_group());
    }

    #[test]
    fn test_normalization_bits() {
        assert!(COERCION_FAILED.is_normalization());
        assert!(SETTING_DEFAULT_FAILED.is_normalization());
        // Membership errors share bit 6 but not bit 5.
        assert!(!MISSING_MEMBERS.is_normalization());
        assert!(!REGEX_MISMATCH.is_normalization());
    }

    #[test]
    fn test_logical_bits() {
        assert!(ANYOF.is_logical());
        assert!(ONEOF.is_logical());
        assert!(!BAD_ITEMS.is_logical());
        assert!(!MAPPING_SCHEMA.is_logical());
    }
}
