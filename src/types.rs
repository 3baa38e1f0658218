//! Core types for the sync engine.

/// ObjectId: 40-character lowercase hex identifier of a remote object
/// (blob, tree or commit)
pub type ObjectId = String;

/// RepoPath: slash-separated path relative to the store root
pub type RepoPath = String;
