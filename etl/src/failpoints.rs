use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

pub const TRANSFER_BEFORE_SUB_BATCH_WRITE: &str = "transfer.before_sub_batch_write";
pub const TRANSFER_AFTER_SUB_BATCH_WRITE: &str = "transfer.after_sub_batch_write";
pub const SYNC_BEFORE_CHECKPOINT: &str = "sync.before_checkpoint";

/// Fails with [`ErrorKind::WithFailpoint`] when the named failpoint is configured to `return`.
pub fn etl_fail_point(name: &str) -> EtlResult<()> {
    fail_point!(name, |parameter| {
        let detail = match parameter {
            Some(parameter) => format!("The failpoint '{name}' returned an error ({parameter})"),
            None => format!("The failpoint '{name}' returned an error"),
        };

        bail!(
            ErrorKind::WithFailpoint,
            "An error occurred in a fail point",
            detail
        );
    });

    Ok(())
}
