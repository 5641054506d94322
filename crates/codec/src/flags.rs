//! Header flags carried by the first byte of a batch payload.

/// The payload is a zstd-compressed segment stream.
pub const ZSTD_MESSAGE_HEADER_BYTE: u8 = 0x00;

/// The payload authenticates data posted through the parent chain.
pub const L1_AUTHENTICATED_MESSAGE_HEADER_FLAG: u8 = 0x40;

/// The payload is a list of blob versioned hashes.
pub const BLOB_HASHES_HEADER_FLAG: u8 = L1_AUTHENTICATED_MESSAGE_HEADER_FLAG | 0x10;

/// The payload is a data availability committee certificate.
pub const DAS_MESSAGE_HEADER_FLAG: u8 = 0x80;

/// The payload is a certificate for a custom data availability provider.
pub const CUSTOM_DA_MESSAGE_HEADER_FLAG: u8 = 0x88;

/// Returns `true` if the flag marks an inline zstd payload.
pub const fn is_zstd_message_header_byte(flag: u8) -> bool {
    flag == ZSTD_MESSAGE_HEADER_BYTE
}

/// Returns `true` if the flag marks a blob hashes payload.
pub const fn is_blob_hashes_header_byte(flag: u8) -> bool {
    flag == BLOB_HASHES_HEADER_FLAG
}

/// Returns `true` if the flag marks a data availability committee certificate.
pub const fn is_das_message_header_byte(flag: u8) -> bool {
    flag == DAS_MESSAGE_HEADER_FLAG
}

/// Returns `true` if the flag marks a custom data availability certificate.
pub const fn is_custom_da_message_header_byte(flag: u8) -> bool {
    flag == CUSTOM_DA_MESSAGE_HEADER_FLAG
}

/// Returns `true` if the payload needs a data availability reader to be resolved.
pub const fn requires_data_availability_reader(flag: u8) -> bool {
    is_blob_hashes_header_byte(flag) ||
        is_das_message_header_byte(flag) ||
        is_custom_da_message_header_byte(flag)
}
