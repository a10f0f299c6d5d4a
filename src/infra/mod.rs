pub mod http_client;
pub mod json_sink;
pub mod memory_sink;

pub use http_client::ReqwestHttp;
pub use json_sink::JsonFileSink;
pub use memory_sink::MemorySink;
