//! Per-group element counters shared by the grouped layouts.
//!
//! Counters live in the `count` child of the table bucket, keyed by group
//! name. A missing counter reads as zero and a counter that drops to zero is
//! removed.

use bytes::Bytes;
use tabula_store::{Bucket, BucketMut, ReadTx};
use tracing::warn;

use super::root;
use crate::codec;
use crate::error::TableResult;

/// Child bucket holding the group counters.
pub(crate) const COUNT_BUCKET: &[u8] = b"count";

fn read(counts: &Bucket<'_>, group: &[u8]) -> TableResult<u64> {
    let Some(raw) = counts.get(group)? else {
        return Ok(0);
    };
    match codec::decode_count(Bytes::from(raw)) {
        Ok(n) => Ok(n),
        Err(e) => {
            warn!(group = %String::from_utf8_lossy(group), error = %e, "unreadable group counter, treating as 0");
            Ok(0)
        }
    }
}

/// Returns the counter of `group` in table `name`.
pub(crate) fn get(tx: &dyn ReadTx, name: &[u8], group: &[u8]) -> TableResult<u64> {
    let Some(table) = root(tx, name)? else {
        return Ok(0);
    };
    match table.bucket(COUNT_BUCKET)? {
        Some(counts) => read(&counts, group),
        None => Ok(0),
    }
}

/// Adds one to the counter of `group`.
pub(crate) fn increment(table: &BucketMut<'_, '_>, group: &[u8]) -> TableResult<()> {
    let counts = table.create_bucket_if_not_exists(COUNT_BUCKET)?;
    let n = read(&counts.as_bucket(), group)?;
    counts.put(group, &codec::encode_count(n.saturating_add(1)))?;
    Ok(())
}

/// Subtracts one from the counter of `group`, removing it at zero.
pub(crate) fn decrement(table: &BucketMut<'_, '_>, group: &[u8]) -> TableResult<()> {
    let Some(counts) = table.bucket(COUNT_BUCKET)? else {
        return Ok(());
    };
    match read(&counts.as_bucket(), group)? {
        0 | 1 => {
            counts.delete(group)?;
        }
        n => counts.put(group, &codec::encode_count(n - 1))?,
    }
    Ok(())
}
