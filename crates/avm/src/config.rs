//! §8.6 Config: a zero-sized struct carrying only associated constants,
//! directly the teacher's `avm::global::Config` pattern generalized to
//! this spec's numbers.

pub struct Config;

impl Config {
    pub const STACK_DEPTH_CEILING: u16 = 50;
    pub const MAX_INPUT_LEN: usize = 1024;
    pub const CODE_SIZE_LIMIT: usize = 0x30000;
    pub const ARRAY_HEADER_BYTES: usize = 16;
    pub const MAX_RESULT_SIZE: usize = 256;
}
