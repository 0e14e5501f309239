//! Client for the external recommendation service ("MCO").
//!
//! # Protocol
//!
//! The storefront POSTs an agent-run request to `MCO_URL/run` carrying the
//! user's cart and the in-stock catalog as a text prompt. The reply is not a
//! stable contract; [`SuggestionDecoder`] accepts every shape observed so far:
//!
//! 1. A flat JSON array of suggestion objects.
//! 2. An array of agent envelopes whose first text part holds that array.
//! 3. The same, with the text wrapped in a markdown code fence.
//!
//! An empty top-level array is rejected before any strategy runs.

mod client;
mod decode;
mod error;
mod types;

pub use client::McoClient;
pub use decode::{
    DecodeStrategy, DirectArray, EnvelopeText, FencedText, SuggestionDecoder, strip_fence,
};
pub use error::McoError;
pub use types::{Content, Envelope, Part, RunRequest, build_prompt};
