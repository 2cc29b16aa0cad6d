mod block_cache;
mod local_file;
mod range_reader;

pub use block_cache::{BlockCache, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY};
pub use local_file::{LocalFile, MemoryReader};
pub use range_reader::{
    read_i32_le, read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le,
    RangeReader, RangeWriter,
};
