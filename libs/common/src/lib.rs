pub mod id;

pub use id::hex_id;
