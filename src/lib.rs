pub mod core;
pub mod db;
pub mod llm;
pub mod logging;
pub mod rag;
pub mod server;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
