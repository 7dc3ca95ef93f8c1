pub mod codegen;
pub mod emitter;
pub mod parser;
pub mod simulate;
pub mod store;
