//! Two-phase native queries.
//!
//! Variable-length native outputs are fetched in two calls: a size query with
//! no output buffer, then a fill call with a buffer of exactly the queried
//! size. A size of zero is a valid empty result. Buffers are owned `Vec`s, so
//! they are released on every exit path.

use crate::status::Status;

/// Allocate an exactly-sized buffer, reporting allocation failure through the
/// status channel.
fn alloc_exact<T: Copy + Default>(len: usize) -> Result<Vec<T>, Status> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Status::OUT_OF_HOST_MEMORY)?;
    buf.resize(len, T::default());
    Ok(buf)
}

/// Enumerate handles with the count-then-fetch pattern.
///
/// `call(buffer, count)` mirrors the native signature: it is invoked once as
/// `(None, Some(&mut count))` and once as `(Some(buffer), None)`. A "not
/// found" status from either call yields an empty list.
pub fn query_handles<T, F>(mut call: F) -> Result<Vec<T>, Status>
where
    T: Copy + Default,
    F: FnMut(Option<&mut [T]>, Option<&mut u32>) -> Status,
{
    let mut count: u32 = 0;
    let status = call(None, Some(&mut count));
    if status.is_not_found() {
        return Ok(Vec::new());
    }
    status.into_result()?;

    if count == 0 {
        return Ok(Vec::new());
    }

    let mut handles = alloc_exact::<T>(count as usize)?;
    let status = call(Some(&mut handles), None);
    if status.is_not_found() {
        return Ok(Vec::new());
    }
    status.into_result()?;

    Ok(handles)
}

/// Fetch a byte value with the size-then-fetch pattern.
///
/// The returned buffer is exactly as long as the size reported by the size query.
pub fn query_bytes<F>(mut call: F) -> Result<Vec<u8>, Status>
where
    F: FnMut(Option<&mut [u8]>, Option<&mut usize>) -> Status,
{
    let mut size: usize = 0;
    call(None, Some(&mut size)).into_result()?;

    if size == 0 {
        return Ok(Vec::new());
    }

    let mut value = alloc_exact::<u8>(size)?;
    call(Some(&mut value), None).into_result()?;

    Ok(value)
}
