/// Copies the provided slice into $ty using $ty::from_be_bytes and advances the buffer.
macro_rules! from_be_bytes_slice_and_advance_buf {
    ($ty: ty, $slice: expr) => {{
        let mut arr = [0u8; ::core::mem::size_of::<$ty>()];
        let size = ::core::mem::size_of::<$ty>();
        arr.copy_from_slice(&$slice[0..size]);
        *$slice = &$slice[size..];
        <$ty>::from_be_bytes(arr)
    }};
}

pub(crate) use from_be_bytes_slice_and_advance_buf;
