// Common test utilities and mock infrastructure
//
// This module provides shared functionality for integration tests including:
// - Temporary Python project fixtures
// - Scripted analyzers, cleaners and reporters
// - Shared assertions over results and file trees

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod mock_components;
