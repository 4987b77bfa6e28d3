//! Tag-bag key constants (§6). Tags ride along on records and match
//! configurations as an untyped `HashMap<String, String>`; these constants
//! exist so call sites never typo a key.

pub const MDM_TYPE: &str = "$mdm.type";
pub const MDM_PROCESSED: &str = "$mdm.processed";
pub const MDM_RESOURCE: &str = "$mdm.resource";
pub const MDM_ROT: &str = "$mdm.rot";
pub const MDM_RELATIONSHIP_CLASS: &str = "$mdm.relationship.class";
pub const MDM_AUTO_LINK: &str = "$mdm.auto-link";
pub const GENERATED: &str = "$generated";
pub const MATCH_SCORE: &str = "$match.score";

/// Values taken on by the [`MDM_TYPE`] tag.
pub mod mdm_type_value {
    pub const LOCAL: &str = "L";
    pub const MASTER: &str = "M";
    pub const TRUTH: &str = "T";
}
