//! Command handlers.

pub(crate) mod auth;
pub(crate) mod objects;
pub(crate) mod records;

#[cfg(test)]
pub(crate) mod testing;
