//! Deferred-resolution URLs.
//!
//! Fields that still hold an opaque id are rewritten into a callback URL that
//! hands the id back to us when the client actually wants the resource.

use crate::provider::{ResourceKind, SongRecord};

/// Values starting with this are already playable on the client side.
const NATIVE_LINK_MARKER: char = '@';

pub fn template_field(value: &str, kind: ResourceKind, base: &str, server: &str) -> String {
    if value.is_empty() || value.starts_with("http") || value.starts_with(NATIVE_LINK_MARKER) {
        return value.to_string();
    }
    format!("{base}?server={server}&type={kind}&id={value}")
}

/// Apply [`template_field`] to the `url`, `pic` and `lrc` fields.
pub fn template_record(mut rec: SongRecord, base: &str, server: &str) -> SongRecord {
    rec.url = template_field(&rec.url, ResourceKind::Url, base, server);
    rec.pic = template_field(&rec.pic, ResourceKind::Pic, base, server);
    rec.lrc = template_field(&rec.lrc, ResourceKind::Lrc, base, server);
    rec
}
