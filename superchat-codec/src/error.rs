#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("frame length {0} is below the minimum of 3 bytes")]
    InvalidFrameLength(u32),
    #[error("frame of {0} bytes exceeds the 1 MiB limit")]
    FrameTooLarge(usize),
    #[error("compressed payload claims an uncompressed length of {0} bytes, exceeding the 1 MiB limit")]
    InvalidCompressedLen(u32),
    #[error("LZ4 decompression failed: {0}")]
    DecompressionFailed(#[from] lz4_flex::block::DecompressError),
    #[error("unexpected end of input while decoding {0}")]
    UnexpectedEof(&'static str),
    #[error("unknown message type 0x{0:02x}")]
    UnknownMessageType(u8),
}
