//! Shared glyph atlas with per-worker reservations.
//!
//! Glyph bitmaps are packed into shelves of a fixed-size atlas. Every slot
//! records which workers use it; when a worker is torn down its
//! reservations are released and slots nobody references are dropped.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

use crate::labels::glyphs::GlyphStore;
use crate::tile::WorkerId;

/// Padding around each glyph bitmap, in pixels.
pub const GLYPH_BUFFER: u32 = 3;

/// Position of a glyph inside the atlas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphPosition {
    /// Pixel rectangle [x, y, w, h] including padding.
    pub rect: [u32; 4],
    /// UV coordinates [u0, v0, u1, v1].
    pub uv: [f32; 4],
}

/// Atlas usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlyphAtlasStats {
    /// Glyph slots currently held by at least one worker.
    pub reserved: usize,
    /// Number of `remove_glyphs` calls served.
    pub releases: u64,
    /// Glyphs that did not fit in the atlas.
    pub overflowed: u64,
}

#[derive(Debug)]
struct GlyphSlot {
    position: GlyphPosition,
    owners: BTreeSet<WorkerId>,
}

#[derive(Debug)]
struct Shelf {
    y: u32,
    height: u32,
    cursor_x: u32,
}

#[derive(Debug)]
struct AtlasState {
    slots: HashMap<(String, u32), GlyphSlot>,
    shelves: Vec<Shelf>,
    next_shelf_y: u32,
    /// Released rectangles [x, y, w, h], reused before new shelf space.
    free: Vec<[u32; 4]>,
    stats: GlyphAtlasStats,
}

/// Glyph atlas shared by all tile workers.
#[derive(Debug)]
pub struct GlyphAtlas {
    width: u32,
    height: u32,
    state: Mutex<AtlasState>,
}

impl GlyphAtlas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            state: Mutex::new(AtlasState {
                slots: HashMap::new(),
                shelves: Vec::new(),
                next_shelf_y: 0,
                free: Vec::new(),
                stats: GlyphAtlasStats::default(),
            }),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reserve slots for `codepoints` of `font_stack` on behalf of `worker`.
    ///
    /// Returns the atlas positions of every glyph that is known to the store
    /// and fits in the atlas. Glyphs already packed for another worker are
    /// shared.
    pub fn add_glyphs(
        &self,
        worker: WorkerId,
        font_stack: &str,
        codepoints: &BTreeSet<u32>,
        store: &GlyphStore,
    ) -> HashMap<u32, GlyphPosition> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut positions = HashMap::with_capacity(codepoints.len());

        for &cp in codepoints {
            let key = (font_stack.to_string(), cp);
            if let Some(slot) = state.slots.get_mut(&key) {
                slot.owners.insert(worker);
                positions.insert(cp, slot.position);
                continue;
            }

            let Some(metrics) = store.glyph(font_stack, cp) else {
                continue;
            };
            let w = metrics.width + GLYPH_BUFFER * 2;
            let h = metrics.height + GLYPH_BUFFER * 2;

            let Some([x, y]) = self.allocate(&mut state, w, h) else {
                state.stats.overflowed += 1;
                log::warn!(
                    "Glyph atlas full; dropping glyph {} of '{}'",
                    cp,
                    font_stack
                );
                continue;
            };

            let position = GlyphPosition {
                rect: [x, y, w, h],
                uv: [
                    x as f32 / self.width as f32,
                    y as f32 / self.height as f32,
                    (x + w) as f32 / self.width as f32,
                    (y + h) as f32 / self.height as f32,
                ],
            };
            state.slots.insert(
                key,
                GlyphSlot {
                    position,
                    owners: BTreeSet::from([worker]),
                },
            );
            positions.insert(cp, position);
        }

        state.stats.reserved = state.slots.len();
        positions
    }

    /// Release every reservation held by `worker`.
    pub fn remove_glyphs(&self, worker: WorkerId) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let AtlasState { slots, free, .. } = &mut *state;
        slots.retain(|_, slot| {
            slot.owners.remove(&worker);
            if slot.owners.is_empty() {
                free.push(slot.position.rect);
                false
            } else {
                true
            }
        });
        if state.slots.is_empty() {
            state.shelves.clear();
            state.next_shelf_y = 0;
            state.free.clear();
        }
        state.stats.reserved = state.slots.len();
        state.stats.releases += 1;
        log::debug!("Released glyphs for {}", worker);
    }

    /// Number of glyph slots `worker` currently holds.
    pub fn reserved_by(&self, worker: WorkerId) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .slots
            .values()
            .filter(|slot| slot.owners.contains(&worker))
            .count()
    }

    pub fn stats(&self) -> GlyphAtlasStats {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats
    }

    fn allocate(&self, state: &mut AtlasState, w: u32, h: u32) -> Option<[u32; 2]> {
        if w > self.width {
            return None;
        }

        // Smallest released rectangle that fits; the unused right part
        // goes back on the free list.
        let reuse = state
            .free
            .iter()
            .enumerate()
            .filter(|(_, r)| w <= r[2] && h <= r[3])
            .min_by_key(|(_, r)| r[2] * r[3])
            .map(|(i, _)| i);
        if let Some(i) = reuse {
            let [x, y, fw, fh] = state.free.swap_remove(i);
            if fw > w {
                state.free.push([x + w, y, fw - w, fh]);
            }
            return Some([x, y]);
        }

        if let Some(shelf) = state
            .shelves
            .iter_mut()
            .find(|shelf| h <= shelf.height && shelf.cursor_x + w <= self.width)
        {
            let x = shelf.cursor_x;
            shelf.cursor_x += w;
            return Some([x, shelf.y]);
        }

        if state.next_shelf_y + h > self.height {
            return None;
        }
        let y = state.next_shelf_y;
        state.next_shelf_y += h;
        state.shelves.push(Shelf {
            y,
            height: h,
            cursor_x: w,
        });
        Some([0, y])
    }
}

impl Default for GlyphAtlas {
    fn default() -> Self {
        Self::new(1024, 1024)
    }
}
