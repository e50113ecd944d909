//! Router Module Index
//!
//! `public` holds infrastructure endpoints that sit outside access control;
//! `comments` holds the comments API together with its route-to-roles table.

pub mod comments;
pub mod public;
