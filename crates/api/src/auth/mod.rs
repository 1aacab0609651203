//! Access-token handling. Tokens are issued by the account service; this
//! server only validates them to learn the caller's user id.

pub mod jwt;
