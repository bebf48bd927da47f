#![deny(
    rust_2018_idioms,
    unreachable_pub,
    unsafe_code,
    unused_imports,
    unused_mut,
    missing_debug_implementations
)]

pub mod archive;
pub mod cursor;
pub mod dictionary;
pub mod error;
pub mod resource;
pub mod util;
