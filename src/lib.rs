pub mod bytes;
pub mod cli;
pub mod compression;
pub mod fincore;
pub mod frm;
pub mod mycnf;
pub mod sieve;
pub mod sqlfmt;
pub mod unpack;
pub mod util;
