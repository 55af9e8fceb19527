//! Vertex store shared by the sub-displays of one composite.
//!
//! Positions and idents never change after upload; only the selection flags
//! do, so `sync` re-uploads the one byte-per-vertex flag buffer and nothing
//! else. Flags are kept per ident on the CPU (selection always operates on
//! whole ident groups) and gathered out to per-vertex bytes for the GPU.

use glam::Mat4;
use glow::HasContext;

use crate::error::{Result, ViewError};

/// Selection bit in the flag byte
pub const FLAG_SELECTED: u8 = 0b1;

#[derive(Debug)]
pub struct GpuVertices {
    pub positions: glow::Buffer,
    pub idents: glow::Buffer,
    pub flags: glow::Buffer,
}

#[derive(Debug)]
pub struct SharedVertices {
    /// Object pose, composed under the camera view by every sub-display
    pub transform: Mat4,
    positions: Vec<[f32; 3]>,
    idents: Vec<u32>,
    nident: u32,
    /// One flag byte per ident (dense, O(1) lookup)
    flags: Vec<u8>,
    dirty: bool,
    gpu: Option<GpuVertices>,
}

impl SharedVertices {
    /// One ident per vertex; several vertices may share an ident when they
    /// form one logical element (all corners of a face, both ends of an
    /// edge).
    pub fn new(positions: Vec<[f32; 3]>, idents: Vec<u32>, transform: Mat4) -> Result<Self> {
        if positions.len() != idents.len() {
            return Err(ViewError::config(format!(
                "vertex store: {} positions but {} idents",
                positions.len(),
                idents.len()
            )));
        }
        let nident = idents.iter().max().map_or(0, |&m| m + 1);
        Ok(Self {
            transform,
            positions,
            idents,
            flags: vec![0; nident as usize],
            nident,
            dirty: false,
            gpu: None,
        })
    }

    /// Number of distinct idents this store contributes to an ident pass
    pub fn nident(&self) -> u32 {
        self.nident
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn idents(&self) -> &[u32] {
        &self.idents
    }

    /// Set or clear the selection bit for whole ident groups
    pub fn set_selected(&mut self, idents: &[u32], state: bool) {
        for &ident in idents {
            if let Some(flag) = self.flags.get_mut(ident as usize) {
                if state {
                    *flag |= FLAG_SELECTED;
                } else {
                    *flag &= !FLAG_SELECTED;
                }
            }
        }
        self.dirty = true;
    }

    pub fn is_selected(&self, ident: u32) -> bool {
        self.flags
            .get(ident as usize)
            .is_some_and(|&f| f & FLAG_SELECTED != 0)
    }

    pub fn toggle(&mut self, ident: u32) {
        let state = self.is_selected(ident);
        self.set_selected(&[ident], !state);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Pure core of `sync`: when dirty, clear the flag and return the
    /// per-vertex flag bytes gathered through the ident array.
    pub fn take_dirty(&mut self) -> Option<Vec<u8>> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(
            self.idents
                .iter()
                .map(|&ident| self.flags[ident as usize])
                .collect(),
        )
    }

    /// Create the GPU buffers. Positions and idents are uploaded once and
    /// never rewritten; the flag buffer is dynamic.
    pub fn upload(&mut self, gl: &glow::Context) -> Result<()> {
        if self.gpu.is_some() {
            return Ok(());
        }
        unsafe {
            let positions = gl.create_buffer().map_err(ViewError::gl)?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(positions));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&self.positions),
                glow::STATIC_DRAW,
            );

            let idents = gl.create_buffer().map_err(ViewError::gl)?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(idents));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&self.idents),
                glow::STATIC_DRAW,
            );

            let per_vertex: Vec<u8> = self
                .idents
                .iter()
                .map(|&ident| self.flags[ident as usize])
                .collect();
            let flags = gl.create_buffer().map_err(ViewError::gl)?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(flags));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, &per_vertex, glow::DYNAMIC_DRAW);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);

            self.gpu = Some(GpuVertices { positions, idents, flags });
        }
        self.dirty = false;
        Ok(())
    }

    pub fn gpu(&self) -> Option<&GpuVertices> {
        self.gpu.as_ref()
    }

    /// Re-upload the flag buffer if selection changed since the last frame.
    /// Called once per object per frame, before any of its sub-displays
    /// draw.
    pub fn sync(&mut self, gl: &glow::Context) {
        let Some(bytes) = self.take_dirty() else {
            return;
        };
        if let Some(gpu) = &self.gpu {
            unsafe {
                gl.bind_buffer(glow::ARRAY_BUFFER, Some(gpu.flags));
                gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, 0, &bytes);
                gl.bind_buffer(glow::ARRAY_BUFFER, None);
            }
        }
    }

    pub fn destroy(&mut self, gl: &glow::Context) {
        if let Some(gpu) = self.gpu.take() {
            unsafe {
                gl.delete_buffer(gpu.positions);
                gl.delete_buffer(gpu.idents);
                gl.delete_buffer(gpu.flags);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SharedVertices {
        // 6 vertices forming 2 ident groups: 0,0,0 and 1,1,1
        SharedVertices::new(
            vec![[0.0; 3]; 6],
            vec![0, 0, 0, 1, 1, 1],
            Mat4::IDENTITY,
        )
        .unwrap()
    }

    #[test]
    fn nident_is_max_plus_one() {
        let v = store();
        assert_eq!(v.nident(), 2);
        let single = SharedVertices::new(vec![[0.0; 3]], vec![7], Mat4::IDENTITY).unwrap();
        assert_eq!(single.nident(), 8);
        let empty = SharedVertices::new(vec![], vec![], Mat4::IDENTITY).unwrap();
        assert_eq!(empty.nident(), 0);
    }

    #[test]
    fn length_mismatch_is_config_error() {
        let err = SharedVertices::new(vec![[0.0; 3]; 2], vec![0], Mat4::IDENTITY).unwrap_err();
        assert!(matches!(err, ViewError::Config(_)));
    }

    #[test]
    fn selection_applies_to_whole_ident_group() {
        let mut v = store();
        v.set_selected(&[1], true);
        assert!(!v.is_selected(0));
        assert!(v.is_selected(1));

        // every vertex of ident 1 carries the flag, none of ident 0 does
        let bytes = v.take_dirty().unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn bulk_selection() {
        let mut v = store();
        v.set_selected(&[0, 1], true);
        assert!(v.is_selected(0) && v.is_selected(1));
        v.set_selected(&[0], false);
        assert!(!v.is_selected(0) && v.is_selected(1));
    }

    #[test]
    fn take_dirty_is_idempotent() {
        let mut v = store();
        assert!(v.take_dirty().is_none());
        v.set_selected(&[0], true);
        assert!(v.is_dirty());
        assert!(v.take_dirty().is_some());
        assert!(!v.is_dirty());
        assert!(v.take_dirty().is_none());
    }

    #[test]
    fn toggle_flips() {
        let mut v = store();
        v.toggle(1);
        assert!(v.is_selected(1));
        v.toggle(1);
        assert!(!v.is_selected(1));
    }

    #[test]
    fn out_of_range_ident_is_ignored() {
        let mut v = store();
        v.set_selected(&[99], true);
        assert!(!v.is_selected(99));
    }
}
