//! Process-wide debug switches.

use std::sync::atomic::{AtomicBool, Ordering};

static TILE_PARSE_WARNINGS: AtomicBool = AtomicBool::new(false);

/// Enable or disable warnings for style layers whose source layer is
/// missing from a tile. Off by default: missing layers are common and
/// would otherwise flood the log.
pub fn set_tile_parse_warnings(enabled: bool) {
    TILE_PARSE_WARNINGS.store(enabled, Ordering::Relaxed);
}

pub fn tile_parse_warnings() -> bool {
    TILE_PARSE_WARNINGS.load(Ordering::Relaxed)
}
