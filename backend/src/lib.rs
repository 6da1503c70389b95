//! Jersey order management backend.
//!
//! The REST API, domain services and storage layers live under [`backend`].

pub mod backend;
