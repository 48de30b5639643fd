//! Synchronization variable unit tests
