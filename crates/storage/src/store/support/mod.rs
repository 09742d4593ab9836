#![forbid(unsafe_code)]

mod access;
mod ledger;
mod rows;
mod schema;

pub(super) use access::*;
pub(super) use ledger::*;
pub(super) use rows::*;
pub(super) use schema::{install_schema, preflight_gate};
