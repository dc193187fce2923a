//! Pesticide dosage and seasonal pest/disease planning for bonsai.
//!
//! The domain logic ([`dosage`], [`season`], [`treatment`]) is pure and works
//! on in-memory [`records`]; [`api`] loads those records from the remote
//! service or an offline fixture.

pub mod api;
pub mod config;
pub mod dosage;
pub mod output;
pub mod records;
pub mod season;
pub mod server;
pub mod session;
pub mod treatment;
