pub mod format;
pub mod log_buffer;
pub mod monitor;
pub mod sos;
