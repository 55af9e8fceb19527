//! Ident encoding and the offscreen picking target.
//!
//! Every pickable element is assigned a stable integer for one ident pass.
//! Displays draw their elements' idents (offset by the running start of the
//! pass) into an RGBA8 target; reading a pixel back and decoding it yields
//! the element under the cursor.

use glow::HasContext;

use crate::error::{Result, ViewError};

/// Encode an ident for the color target. Stored as `ident + 1` so a cleared
/// target (zero) is unambiguous background.
pub fn encode(ident: u32) -> [u8; 4] {
    (ident + 1).to_le_bytes()
}

/// Decode a target pixel back to an ident; `None` is background.
pub fn decode(rgba: [u8; 4]) -> Option<u32> {
    let v = u32::from_le_bytes(rgba);
    if v == 0 {
        None
    } else {
        Some(v - 1)
    }
}

// ── Ident range allocation ───────────────────────────────────

/// Allocates contiguous ident ranges across the displays of one ident pass
/// and decodes a drawn ident back to (tag, local ident).
///
/// Ranges are gapless and non-overlapping by construction: each `step`
/// returns the current offset and advances it by the display's count.
pub struct IdentMap<T> {
    ranges: Vec<(u32, u32, T)>,
    total: u32,
}

impl<T> Default for IdentMap<T> {
    fn default() -> Self {
        Self { ranges: Vec::new(), total: 0 }
    }
}

impl<T> IdentMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
        self.total = 0;
    }

    /// Reserve `count` idents for `tag`, returning the range start
    pub fn step(&mut self, count: u32, tag: T) -> u32 {
        let start = self.total;
        if count > 0 {
            self.ranges.push((start, count, tag));
            self.total += count;
        }
        start
    }

    /// Total idents consumed by the pass so far
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Resolve a decoded ident to its owner and the ident local to it
    pub fn resolve(&self, ident: u32) -> Option<(&T, u32)> {
        if ident >= self.total {
            return None;
        }
        let i = self
            .ranges
            .partition_point(|&(start, _, _)| start <= ident)
            .checked_sub(1)?;
        let (start, count, ref tag) = self.ranges[i];
        debug_assert!(ident < start + count);
        Some((tag, ident - start))
    }
}

// ── Offscreen picking target ─────────────────────────────────

/// RGBA8 color + depth framebuffer the ident pass renders into
pub struct IdentTarget {
    fbo: glow::Framebuffer,
    color: glow::Texture,
    depth: glow::Renderbuffer,
    width: u32,
    height: u32,
}

impl IdentTarget {
    pub fn new(gl: &glow::Context, width: u32, height: u32) -> Result<Self> {
        unsafe {
            let color = gl.create_texture().map_err(ViewError::gl)?;
            gl.bind_texture(glow::TEXTURE_2D, Some(color));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(None),
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::NEAREST as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::NEAREST as i32,
            );
            gl.bind_texture(glow::TEXTURE_2D, None);

            let depth = gl.create_renderbuffer().map_err(ViewError::gl)?;
            gl.bind_renderbuffer(glow::RENDERBUFFER, Some(depth));
            gl.renderbuffer_storage(
                glow::RENDERBUFFER,
                glow::DEPTH_COMPONENT24,
                width as i32,
                height as i32,
            );
            gl.bind_renderbuffer(glow::RENDERBUFFER, None);

            let fbo = gl.create_framebuffer().map_err(ViewError::gl)?;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(color),
                0,
            );
            gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::RENDERBUFFER,
                Some(depth),
            );
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if status != glow::FRAMEBUFFER_COMPLETE {
                let target = Self { fbo, color, depth, width, height };
                target.destroy(gl);
                return Err(ViewError::gl(format!(
                    "ident framebuffer incomplete: {status:#x}"
                )));
            }

            Ok(Self { fbo, color, depth, width, height })
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Recreate storage when the viewport size changed
    pub fn ensure_size(&mut self, gl: &glow::Context, width: u32, height: u32) -> Result<()> {
        if self.width == width && self.height == height {
            return Ok(());
        }
        let replacement = Self::new(gl, width, height)?;
        let old = std::mem::replace(self, replacement);
        old.destroy(gl);
        Ok(())
    }

    /// Bind as the draw target and clear to background
    pub fn bind(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));
            gl.viewport(0, 0, self.width as i32, self.height as i32);
            gl.disable(glow::BLEND);
            gl.enable(glow::DEPTH_TEST);
            gl.clear_color(0.0, 0.0, 0.0, 0.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    pub fn unbind(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    /// Read one pixel back and decode it. Coordinates are in GL convention
    /// (origin bottom-left); window-space callers flip y first.
    pub fn read(&self, gl: &glow::Context, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let mut rgba = [0u8; 4];
        unsafe {
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(self.fbo));
            gl.read_pixels(
                x as i32,
                y as i32,
                1,
                1,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(Some(&mut rgba)),
            );
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, None);
        }
        decode(rgba)
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_framebuffer(self.fbo);
            gl.delete_texture(self.color);
            gl.delete_renderbuffer(self.depth);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        for ident in [0, 1, 255, 256, 65_535, 16_777_215, u32::MAX - 1] {
            assert_eq!(decode(encode(ident)), Some(ident));
        }
        assert_eq!(decode([0, 0, 0, 0]), None);
    }

    #[test]
    fn step_partitions_contiguously() {
        let mut map = IdentMap::new();
        assert_eq!(map.step(3, "a"), 0);
        assert_eq!(map.step(1, "b"), 3);
        assert_eq!(map.step(5, "c"), 4);
        assert_eq!(map.total(), 9);
    }

    #[test]
    fn resolve_covers_range_without_gaps() {
        let mut map = IdentMap::new();
        map.step(3, "a");
        map.step(1, "b");
        map.step(5, "c");

        let mut seen = vec![0usize; 3];
        for ident in 0..map.total() {
            let (tag, local) = map.resolve(ident).expect("gap in ident range");
            let slot = match *tag {
                "a" => 0,
                "b" => 1,
                "c" => 2,
                _ => unreachable!(),
            };
            seen[slot] += 1;
            assert!(local < [3, 1, 5][slot]);
        }
        assert_eq!(seen, vec![3, 1, 5]);
        assert_eq!(map.resolve(9), None);
    }

    #[test]
    fn zero_count_displays_claim_nothing() {
        let mut map = IdentMap::new();
        assert_eq!(map.step(0, "empty"), 0);
        assert_eq!(map.step(2, "real"), 0);
        assert_eq!(map.total(), 2);
        assert_eq!(map.resolve(0).map(|(t, l)| (*t, l)), Some(("real", 0)));
    }
}
