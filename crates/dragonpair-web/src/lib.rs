//! dragonpair Web - Embedded pairing page assets
//!
//! This crate embeds the pairing page into the binary.

use rust_embed::Embed;

#[derive(Embed)]
#[folder = "www/"]
pub struct Assets;
