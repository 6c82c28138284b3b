//! Error classification codes.
//!
//! Codes are PostgreSQL SQLSTATEs packed into a `u32`, six bits per
//! character, first character in the lowest bits. The packing is the same
//! one the server uses internally, so codes taken from a live server can be
//! compared directly against the catalogue.

use std::fmt;

/// Packed SQLSTATE classification code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorCode(u32);

/// Display label of the fallback category.
pub const NOT_KNOWN_ERROR_NAME: &str = "not_known_error";

impl ErrorCode {
    /// Reserved code for events whose classification is not in the catalogue.
    /// No valid SQLSTATE packs to this value.
    pub const NOT_KNOWN: Self = Self(u32::MAX);

    /// Pack a five-character SQLSTATE. Characters are not validated.
    pub const fn pack(s: &[u8; 5]) -> Self {
        let mut packed = 0u32;
        let mut i = 0;
        while i < 5 {
            packed |= (((s[i].wrapping_sub(b'0')) & 0x3F) as u32) << (6 * i);
            i += 1;
        }
        Self(packed)
    }

    /// Parse a SQLSTATE string, accepting only five characters of `[0-9A-Z]`.
    pub fn from_sqlstate(s: &str) -> Option<Self> {
        let bytes: &[u8; 5] = s.as_bytes().try_into().ok()?;
        if !bytes
            .iter()
            .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
        {
            return None;
        }
        Some(Self::pack(bytes))
    }

    /// Wrap a raw packed value as reported by a host.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    fn decode(self) -> Option<[u8; 5]> {
        if self.0 >> 30 != 0 {
            return None;
        }
        let mut out = [0u8; 5];
        for (i, slot) in out.iter_mut().enumerate() {
            let ch = ((self.0 >> (6 * i)) & 0x3F) as u8 + b'0';
            if !(ch.is_ascii_digit() || ch.is_ascii_uppercase()) {
                return None;
            }
            *slot = ch;
        }
        Some(out)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            // Decoded bytes are always ASCII.
            Some(bytes) => f.write_str(std::str::from_utf8(&bytes).map_err(|_| fmt::Error)?),
            None => write!(f, "#{}", self.0),
        }
    }
}

/// Well-known codes the event source needs as defaults.
pub mod well_known {
    use super::ErrorCode;

    pub const SUCCESSFUL_COMPLETION: ErrorCode = ErrorCode::pack(b"00000");
    pub const WARNING: ErrorCode = ErrorCode::pack(b"01000");
    pub const INTERNAL_ERROR: ErrorCode = ErrorCode::pack(b"XX000");
}

macro_rules! catalogue {
    ($( $state:literal => $name:literal ),* $(,)?) => {
        /// Built-in (code, name) catalogue, in registration order.
        pub const ERROR_CODES: &[(ErrorCode, &str)] = &[
            $( (ErrorCode::pack($state), $name), )*
        ];
    };
}

catalogue! {
    // Class 00 - Successful Completion
    b"00000" => "successful_completion",
    // Class 01 - Warning
    b"01000" => "warning",
    b"0100C" => "dynamic_result_sets_returned",
    b"01008" => "implicit_zero_bit_padding",
    b"01003" => "null_value_eliminated_in_set_function",
    b"01007" => "privilege_not_granted",
    b"01006" => "privilege_not_revoked",
    b"01004" => "warning_string_data_right_truncation",
    b"01P01" => "deprecated_feature",
    // Class 02 - No Data
    b"02000" => "no_data",
    b"02001" => "no_additional_dynamic_result_sets_returned",
    // Class 03 - SQL Statement Not Yet Complete
    b"03000" => "sql_statement_not_yet_complete",
    // Class 08 - Connection Exception
    b"08000" => "connection_exception",
    b"08003" => "connection_does_not_exist",
    b"08006" => "connection_failure",
    b"08001" => "sqlclient_unable_to_establish_sqlconnection",
    b"08004" => "sqlserver_rejected_establishment_of_sqlconnection",
    b"08007" => "transaction_resolution_unknown",
    b"08P01" => "protocol_violation",
    // Class 09 - Triggered Action Exception
    b"09000" => "triggered_action_exception",
    // Class 0A - Feature Not Supported
    b"0A000" => "feature_not_supported",
    // Class 0B - Invalid Transaction Initiation
    b"0B000" => "invalid_transaction_initiation",
    // Class 0F - Locator Exception
    b"0F000" => "locator_exception",
    b"0F001" => "invalid_locator_specification",
    // Class 0L - Invalid Grantor
    b"0L000" => "invalid_grantor",
    b"0LP01" => "invalid_grant_operation",
    // Class 0P - Invalid Role Specification
    b"0P000" => "invalid_role_specification",
    // Class 0Z - Diagnostics Exception
    b"0Z000" => "diagnostics_exception",
    b"0Z002" => "stacked_diagnostics_accessed_without_active_handler",
    // Class 20 - Case Not Found
    b"20000" => "case_not_found",
    // Class 21 - Cardinality Violation
    b"21000" => "cardinality_violation",
    // Class 22 - Data Exception
    b"22000" => "data_exception",
    b"2202E" => "array_subscript_error",
    b"22021" => "character_not_in_repertoire",
    b"22008" => "datetime_field_overflow",
    b"22012" => "division_by_zero",
    b"22005" => "error_in_assignment",
    b"2200B" => "escape_character_conflict",
    b"22022" => "indicator_overflow",
    b"22015" => "interval_field_overflow",
    b"2201E" => "invalid_argument_for_logarithm",
    b"22014" => "invalid_argument_for_ntile_function",
    b"22016" => "invalid_argument_for_nth_value_function",
    b"2201F" => "invalid_argument_for_power_function",
    b"2201G" => "invalid_argument_for_width_bucket_function",
    b"22018" => "invalid_character_value_for_cast",
    b"22007" => "invalid_datetime_format",
    b"22019" => "invalid_escape_character",
    b"2200D" => "invalid_escape_octet",
    b"22025" => "invalid_escape_sequence",
    b"22P06" => "nonstandard_use_of_escape_character",
    b"22010" => "invalid_indicator_parameter_value",
    b"22023" => "invalid_parameter_value",
    b"22013" => "invalid_preceding_or_following_size",
    b"2201B" => "invalid_regular_expression",
    b"2201W" => "invalid_row_count_in_limit_clause",
    b"2201X" => "invalid_row_count_in_result_offset_clause",
    b"2202H" => "invalid_tablesample_argument",
    b"2202G" => "invalid_tablesample_repeat",
    b"22009" => "invalid_time_zone_displacement_value",
    b"2200C" => "invalid_use_of_escape_character",
    b"2200G" => "most_specific_type_mismatch",
    b"22004" => "null_value_not_allowed",
    b"22002" => "null_value_no_indicator_parameter",
    b"22003" => "numeric_value_out_of_range",
    b"2200H" => "sequence_generator_limit_exceeded",
    b"22026" => "string_data_length_mismatch",
    b"22001" => "string_data_right_truncation",
    b"22011" => "substring_error",
    b"22027" => "trim_error",
    b"22024" => "unterminated_c_string",
    b"2200F" => "zero_length_character_string",
    b"22P01" => "floating_point_exception",
    b"22P02" => "invalid_text_representation",
    b"22P03" => "invalid_binary_representation",
    b"22P04" => "bad_copy_file_format",
    b"22P05" => "untranslatable_character",
    b"2200L" => "not_an_xml_document",
    b"2200M" => "invalid_xml_document",
    b"2200N" => "invalid_xml_content",
    b"2200S" => "invalid_xml_comment",
    b"2200T" => "invalid_xml_processing_instruction",
    b"22030" => "duplicate_json_object_key_value",
    b"22032" => "invalid_json_text",
    b"22033" => "invalid_sql_json_subscript",
    b"22034" => "more_than_one_sql_json_item",
    b"22035" => "no_sql_json_item",
    b"22036" => "non_numeric_sql_json_item",
    b"22037" => "non_unique_keys_in_a_json_object",
    b"22038" => "singleton_sql_json_item_required",
    b"22039" => "sql_json_array_not_found",
    b"2203A" => "sql_json_member_not_found",
    b"2203B" => "sql_json_number_not_found",
    b"2203C" => "sql_json_object_not_found",
    b"2203D" => "too_many_json_array_elements",
    b"2203E" => "too_many_json_object_members",
    b"2203F" => "sql_json_scalar_required",
    // Class 23 - Integrity Constraint Violation
    b"23000" => "integrity_constraint_violation",
    b"23001" => "restrict_violation",
    b"23502" => "not_null_violation",
    b"23503" => "foreign_key_violation",
    b"23505" => "unique_violation",
    b"23514" => "check_violation",
    b"23P01" => "exclusion_violation",
    // Class 24 - Invalid Cursor State
    b"24000" => "invalid_cursor_state",
    // Class 25 - Invalid Transaction State
    b"25000" => "invalid_transaction_state",
    b"25001" => "active_sql_transaction",
    b"25002" => "branch_transaction_already_active",
    b"25008" => "held_cursor_requires_same_isolation_level",
    b"25003" => "inappropriate_access_mode_for_branch_transaction",
    b"25004" => "inappropriate_isolation_level_for_branch_transaction",
    b"25005" => "no_active_sql_transaction_for_branch_transaction",
    b"25006" => "read_only_sql_transaction",
    b"25007" => "schema_and_data_statement_mixing_not_supported",
    b"25P01" => "no_active_sql_transaction",
    b"25P02" => "in_failed_sql_transaction",
    b"25P03" => "idle_in_transaction_session_timeout",
    // Class 26 - Invalid SQL Statement Name
    b"26000" => "invalid_sql_statement_name",
    // Class 27 - Triggered Data Change Violation
    b"27000" => "triggered_data_change_violation",
    // Class 28 - Invalid Authorization Specification
    b"28000" => "invalid_authorization_specification",
    b"28P01" => "invalid_password",
    // Class 2B - Dependent Privilege Descriptors Still Exist
    b"2B000" => "dependent_privilege_descriptors_still_exist",
    b"2BP01" => "dependent_objects_still_exist",
    // Class 2D - Invalid Transaction Termination
    b"2D000" => "invalid_transaction_termination",
    // Class 2F - SQL Routine Exception
    b"2F000" => "sql_routine_exception",
    b"2F005" => "function_executed_no_return_statement",
    b"2F002" => "modifying_sql_data_not_permitted",
    b"2F003" => "prohibited_sql_statement_attempted",
    b"2F004" => "reading_sql_data_not_permitted",
    // Class 34 - Invalid Cursor Name
    b"34000" => "invalid_cursor_name",
    // Class 38 - External Routine Exception
    b"38000" => "external_routine_exception",
    b"38001" => "containing_sql_not_permitted",
    b"38002" => "external_modifying_sql_data_not_permitted",
    b"38003" => "external_prohibited_sql_statement_attempted",
    b"38004" => "external_reading_sql_data_not_permitted",
    // Class 39 - External Routine Invocation Exception
    b"39000" => "external_routine_invocation_exception",
    b"39001" => "invalid_sqlstate_returned",
    b"39004" => "external_null_value_not_allowed",
    b"39P01" => "trigger_protocol_violated",
    b"39P02" => "srf_protocol_violated",
    b"39P03" => "event_trigger_protocol_violated",
    // Class 3B - Savepoint Exception
    b"3B000" => "savepoint_exception",
    b"3B001" => "invalid_savepoint_specification",
    // Class 3D - Invalid Catalog Name
    b"3D000" => "invalid_catalog_name",
    // Class 3F - Invalid Schema Name
    b"3F000" => "invalid_schema_name",
    // Class 40 - Transaction Rollback
    b"40000" => "transaction_rollback",
    b"40002" => "transaction_integrity_constraint_violation",
    b"40001" => "serialization_failure",
    b"40003" => "statement_completion_unknown",
    b"40P01" => "deadlock_detected",
    // Class 42 - Syntax Error or Access Rule Violation
    b"42000" => "syntax_error_or_access_rule_violation",
    b"42601" => "syntax_error",
    b"42501" => "insufficient_privilege",
    b"42846" => "cannot_coerce",
    b"42803" => "grouping_error",
    b"42P20" => "windowing_error",
    b"42P19" => "invalid_recursion",
    b"42830" => "invalid_foreign_key",
    b"42602" => "invalid_name",
    b"42622" => "name_too_long",
    b"42939" => "reserved_name",
    b"42804" => "datatype_mismatch",
    b"42P18" => "indeterminate_datatype",
    b"42P21" => "collation_mismatch",
    b"42P22" => "indeterminate_collation",
    b"42809" => "wrong_object_type",
    b"428C9" => "generated_always",
    b"42703" => "undefined_column",
    b"42883" => "undefined_function",
    b"42P01" => "undefined_table",
    b"42P02" => "undefined_parameter",
    b"42704" => "undefined_object",
    b"42701" => "duplicate_column",
    b"42P03" => "duplicate_cursor",
    b"42P04" => "duplicate_database",
    b"42723" => "duplicate_function",
    b"42P05" => "duplicate_prepared_statement",
    b"42P06" => "duplicate_schema",
    b"42P07" => "duplicate_table",
    b"42712" => "duplicate_alias",
    b"42710" => "duplicate_object",
    b"42702" => "ambiguous_column",
    b"42725" => "ambiguous_function",
    b"42P08" => "ambiguous_parameter",
    b"42P09" => "ambiguous_alias",
    b"42P10" => "invalid_column_reference",
    b"42611" => "invalid_column_definition",
    b"42P11" => "invalid_cursor_definition",
    b"42P12" => "invalid_database_definition",
    b"42P13" => "invalid_function_definition",
    b"42P14" => "invalid_prepared_statement_definition",
    b"42P15" => "invalid_schema_definition",
    b"42P16" => "invalid_table_definition",
    b"42P17" => "invalid_object_definition",
    // Class 44 - WITH CHECK OPTION Violation
    b"44000" => "with_check_option_violation",
    // Class 53 - Insufficient Resources
    b"53000" => "insufficient_resources",
    b"53100" => "disk_full",
    b"53200" => "out_of_memory",
    b"53300" => "too_many_connections",
    b"53400" => "configuration_limit_exceeded",
    // Class 54 - Program Limit Exceeded
    b"54000" => "program_limit_exceeded",
    b"54001" => "statement_too_complex",
    b"54011" => "too_many_columns",
    b"54023" => "too_many_arguments",
    // Class 55 - Object Not In Prerequisite State
    b"55000" => "object_not_in_prerequisite_state",
    b"55006" => "object_in_use",
    b"55P02" => "cant_change_runtime_param",
    b"55P03" => "lock_not_available",
    b"55P04" => "unsafe_new_enum_value_usage",
    // Class 57 - Operator Intervention
    b"57000" => "operator_intervention",
    b"57014" => "query_canceled",
    b"57P01" => "admin_shutdown",
    b"57P02" => "crash_shutdown",
    b"57P03" => "cannot_connect_now",
    b"57P04" => "database_dropped",
    b"57P05" => "idle_session_timeout",
    // Class 58 - System Error
    b"58000" => "system_error",
    b"58030" => "io_error",
    b"58P01" => "undefined_file",
    b"58P02" => "duplicate_file",
    // Class 72 - Snapshot Failure
    b"72000" => "snapshot_too_old",
    // Class F0 - Configuration File Error
    b"F0000" => "config_file_error",
    b"F0001" => "lock_file_exists",
    // Class HV - Foreign Data Wrapper Error
    b"HV000" => "fdw_error",
    b"HV005" => "fdw_column_name_not_found",
    b"HV002" => "fdw_dynamic_parameter_value_needed",
    b"HV010" => "fdw_function_sequence_error",
    b"HV021" => "fdw_inconsistent_descriptor_information",
    b"HV024" => "fdw_invalid_attribute_value",
    b"HV007" => "fdw_invalid_column_name",
    b"HV008" => "fdw_invalid_column_number",
    b"HV004" => "fdw_invalid_data_type",
    b"HV006" => "fdw_invalid_data_type_descriptors",
    b"HV091" => "fdw_invalid_descriptor_field_identifier",
    b"HV00B" => "fdw_invalid_handle",
    b"HV00C" => "fdw_invalid_option_index",
    b"HV00D" => "fdw_invalid_option_name",
    b"HV090" => "fdw_invalid_string_length_or_buffer_length",
    b"HV00A" => "fdw_invalid_string_format",
    b"HV009" => "fdw_invalid_use_of_null_pointer",
    b"HV014" => "fdw_too_many_handles",
    b"HV001" => "fdw_out_of_memory",
    b"HV00P" => "fdw_no_schemas",
    b"HV00J" => "fdw_option_name_not_found",
    b"HV00K" => "fdw_reply_handle",
    b"HV00Q" => "fdw_schema_not_found",
    b"HV00R" => "fdw_table_not_found",
    b"HV00L" => "fdw_unable_to_create_execution",
    b"HV00M" => "fdw_unable_to_create_reply",
    b"HV00N" => "fdw_unable_to_establish_connection",
    // Class P0 - PL/pgSQL Error
    b"P0000" => "plpgsql_error",
    b"P0001" => "raise_exception",
    b"P0002" => "no_data_found",
    b"P0003" => "too_many_rows",
    b"P0004" => "assert_failure",
    // Class XX - Internal Error
    b"XX000" => "internal_error",
    b"XX001" => "data_corrupted",
    b"XX002" => "index_corrupted",
}
