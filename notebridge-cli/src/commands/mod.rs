pub mod daemon;
pub mod diff;
pub mod init;
pub mod resolve;
pub mod status;
pub mod sync;
