//! Bit-stable identifiers from the well-known-identifiers table. These must
//! match across implementations: external systems key off the literal UUIDs,
//! not off whatever enum discriminant a given language happens to assign.

use std::sync::OnceLock;

use uuid::Uuid;

macro_rules! well_known_uuid {
    ($fn_name:ident, $literal:literal) => {
        #[must_use]
        pub fn $fn_name() -> Uuid {
            static CELL: OnceLock<Uuid> = OnceLock::new();
            *CELL.get_or_init(|| {
                Uuid::parse_str($literal)
                    .expect("well-known identifier literal is a valid UUID")
            })
        }
    };
}

well_known_uuid!(master_record, "97730a52-7e30-4dcd-94cd-fd532d111578");
well_known_uuid!(candidate, "56cfb115-8207-4f89-b52e-d20dbad8f8cc");
well_known_uuid!(ignore_candidate, "decfb115-8207-4f89-b52e-d20dbad8f8cc");
well_known_uuid!(master_record_of_truth, "1c778948-2cb6-4696-bc04-4a6eca140c20");
well_known_uuid!(original_master, "a2837281-7e30-4dcd-94cd-fd532d111578");
well_known_uuid!(master_record_classification, "49328452-7e30-4dcd-94cd-fd532d111578");
well_known_uuid!(record_of_truth_determiner, "6b1d6764-12be-42dc-a5dc-52fc275c4935");
well_known_uuid!(automagic_classification, "4311e243-fcdf-43d0-9905-41fd231b1b51");
well_known_uuid!(verified_classification, "3b9365ba-c229-44c4-95ae-6489809a33f0");
well_known_uuid!(system_classification, "253bed89-1c83-4723-af14-71cd83f4b249");

/// Identity match configuration id (`$identity`), not a UUID.
pub const IDENTITY_CONFIGURATION_ID: &str = "$identity";
