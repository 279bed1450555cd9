//! Scenario tests against an in-memory account.
