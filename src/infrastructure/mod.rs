pub mod drive;
pub mod email;
pub mod storage;
