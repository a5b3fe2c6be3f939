pub mod inspect;
pub mod snapshot;
pub mod tmpdir;
