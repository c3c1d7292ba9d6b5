//! Benchmark tests for bulk reconciliation arithmetic.
