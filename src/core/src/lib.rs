pub mod camera;
pub mod input;
pub mod scene;
pub mod visibility;

pub struct DeltaTime(pub f64);

/// # Safety
///
/// This method will convert any value to a byte slice.
/// Use with plain-old-data types such as matrices and vectors of number primitives.
pub unsafe fn byte_slice_from<T: Sized>(data: &T) -> &[u8] {
    let data_ptr = (data as *const T) as *const u8;
    std::slice::from_raw_parts(data_ptr, std::mem::size_of::<T>())
}
