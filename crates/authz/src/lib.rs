//! Authentication and authorization for BookCourier.
//!
//! Authentication is delegated to an identity provider through the
//! [`TokenVerifier`] trait. Authorization is a role lookup against the stored
//! user record, checked by a [`Gate`].

pub mod firebase;
pub mod role;
pub mod token;

#[cfg(any(test, feature = "testutils"))]
pub mod testutils;

pub use firebase::FirebaseVerifier;
pub use role::{authorize, stored_role, AuthzError, Gate, Role, USERS_COLLECTION};
pub use token::{bearer_token, AuthError, TokenVerifier, VerifiedToken};
