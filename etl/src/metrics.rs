//! Metrics definitions for sync pass monitoring.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};

static REGISTER: Once = Once::new();

/// Label for table name in metrics.
pub const TABLE_NAME_LABEL: &str = "table_name";

/// Label for the outcome of a table transfer.
pub const OUTCOME_LABEL: &str = "outcome";

/// Counter for rows read from the source.
pub const ETL_ROWS_EXTRACTED_TOTAL: &str = "etl_rows_extracted_total";

/// Counter for rows skipped because they were already written at the page boundary.
pub const ETL_BOUNDARY_ROWS_SKIPPED_TOTAL: &str = "etl_boundary_rows_skipped_total";

/// Counter for sub-batches written to the destination.
pub const ETL_SUB_BATCHES_WRITTEN_TOTAL: &str = "etl_sub_batches_written_total";

/// Histogram for the duration of a sub-batch write.
pub const ETL_SUB_BATCH_WRITE_DURATION_SECONDS: &str = "etl_sub_batch_write_duration_seconds";

/// Counter for finished table transfers, labelled by outcome.
pub const ETL_TABLE_TRANSFERS_TOTAL: &str = "etl_table_transfers_total";

/// Registers metric descriptions. Safe to call multiple times.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        describe_counter!(
            ETL_ROWS_EXTRACTED_TOTAL,
            Unit::Count,
            "Rows read from the source"
        );
        describe_counter!(
            ETL_BOUNDARY_ROWS_SKIPPED_TOTAL,
            Unit::Count,
            "Rows skipped because they were already written in the same pass"
        );
        describe_counter!(
            ETL_SUB_BATCHES_WRITTEN_TOTAL,
            Unit::Count,
            "Sub-batches written to the destination"
        );
        describe_histogram!(
            ETL_SUB_BATCH_WRITE_DURATION_SECONDS,
            Unit::Seconds,
            "Time taken in seconds by a destination sub-batch write"
        );
        describe_counter!(
            ETL_TABLE_TRANSFERS_TOTAL,
            Unit::Count,
            "Finished table transfers by outcome"
        );
    });
}
