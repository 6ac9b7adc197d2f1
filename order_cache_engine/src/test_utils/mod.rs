pub mod fixtures;
pub mod memory_stream;
pub mod prepare_env;
pub mod queries;
