/*!
Recoverable error type for live-view contention

Every other failure mode this store can hit (stale handle, double free, add-when-present,
index-space exhaustion) is a programmer error and stays a fatal `assert!`/`debug_assert!`.
[`BorrowError`] exists only for the one condition a caller can reasonably recover from — two
views contending for the same container.
*/

use thiserror::Error;

/// Failure to obtain an exclusive borrow of a component or tag container
#[derive(Error, Debug)]
pub enum BorrowError {
    #[error("component or tag type `{0}` is not registered on this store")]
    NotRegistered(&'static str),
    #[error("container of type `{0}` is already borrowed")]
    AlreadyBorrowed(&'static str),
}
