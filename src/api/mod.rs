//! Reference document store.
//!
//! A minimal npoint-style JSON store: each session code names one document,
//! `GET` returns it as stored and `PUT` (or `POST`) replaces it wholesale.

mod documents;

pub use documents::*;
