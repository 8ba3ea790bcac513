//! Behavioural coverage for multiplexed SSH sessions.

mod session;
