pub mod in_memory;
pub mod postgres;
pub mod r#trait;
