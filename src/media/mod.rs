//! Media URL handling and byte fetching.

mod fetcher;
mod normalize;

pub use fetcher::{FetchedMedia, HttpMediaFetcher, MediaFetcher};
pub use normalize::{canonical_media_url, media_extension};
