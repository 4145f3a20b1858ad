mod helpers;
mod token;

pub use helpers::{Claimant, basic_auth_header, parse_basic_auth};
pub use token::{GeneratedToken, TokenGenerator, generate_build_secret};
