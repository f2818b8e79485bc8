//! Application layer: the thin Agent-facing transport wired on top of
//! `domain::ports` and `services`. Spec.md §1 treats HTTP route shape as a
//! non-goal — this module is one possible front door, not the only one.

pub mod http;
