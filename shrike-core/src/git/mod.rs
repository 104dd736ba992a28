//! Local git repository access

mod repo;

pub use repo::{slug_from_remote, GitFileSource, GitRepo, RemoteInfo};
