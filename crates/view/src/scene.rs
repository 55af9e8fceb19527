//! The scene: display list, per-frame state, pass scheduling and picking.
//!
//! The scene never creates a window or GL context; the host hands over an
//! `Arc<glow::Context>` and calls `render` inside its own draw callback.
//! The screen pass runs every frame; the ident pass runs on demand into an
//! offscreen target, and `pick` reads it back.

use std::rc::Rc;
use std::sync::Arc;

use crate::camera::CameraState;
use crate::display::{
    flatten_stack, pass_order, ControlEvent, Display, DisplayHandle, Displayable, Pass, StackEntry,
};
use crate::error::Result;
use crate::ident::{IdentMap, IdentTarget};
use crate::resource::ResourceCache;
use crate::settings::{DisplayOptions, Palette};
use crate::shaders::{AxisPrograms, SchemePrograms, SolidPrograms};

/// Per-frame state every display sees
pub struct Frame {
    pub gl: Arc<glow::Context>,
    pub camera: CameraState,
    pub options: DisplayOptions,
    pub palette: Palette,
}

/// A resolved pick: the display under the cursor and the element within it
pub struct Hit {
    pub target: DisplayHandle,
    /// Index path from the scene roots to the display
    pub scope: Vec<usize>,
    /// Stack entry that drew the hit, passed back through `control`
    pub group: u32,
    /// Ident local to the display
    pub ident: u32,
}

pub struct Scene {
    gl: Arc<glow::Context>,
    cache: ResourceCache,
    pub options: DisplayOptions,
    pub palette: Palette,
    displays: Vec<DisplayHandle>,
    stack: Vec<StackEntry>,
    stale: bool,
    /// Ident ranges of the last ident pass, tagged with stack indices
    ident_map: IdentMap<usize>,
    target: Option<IdentTarget>,
}

impl Scene {
    pub fn new(gl: Arc<glow::Context>) -> Self {
        Self {
            gl,
            cache: ResourceCache::new(),
            options: DisplayOptions::default(),
            palette: Palette::default(),
            displays: Vec::new(),
            stack: Vec::new(),
            stale: false,
            ident_map: IdentMap::new(),
            target: None,
        }
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    pub fn gl_handle(&self) -> Arc<glow::Context> {
        self.gl.clone()
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    // ── Shared programs ──────────────────────────────────────

    pub fn solid_programs(&mut self) -> Result<Rc<SolidPrograms>> {
        let gl = self.gl.clone();
        self.cache
            .get_or_create(SolidPrograms::CACHE_KEY, || SolidPrograms::load(&gl))
    }

    pub fn scheme_programs(&mut self) -> Result<Rc<SchemePrograms>> {
        let gl = self.gl.clone();
        self.cache
            .get_or_create(SchemePrograms::CACHE_KEY, || SchemePrograms::load(&gl))
    }

    pub fn axis_programs(&mut self) -> Result<Rc<AxisPrograms>> {
        let gl = self.gl.clone();
        self.cache
            .get_or_create(AxisPrograms::CACHE_KEY, || AxisPrograms::load(&gl))
    }

    pub fn cache(&mut self) -> &mut ResourceCache {
        &mut self.cache
    }

    // ── Display list ─────────────────────────────────────────

    pub fn add(&mut self, display: DisplayHandle) {
        self.displays.push(display);
        self.stale = true;
    }

    /// Build a displayable against this scene and add it in one step
    pub fn display(&mut self, source: &dyn Displayable) -> Result<DisplayHandle> {
        let handle = source.display(self)?;
        self.add(handle.clone());
        Ok(handle)
    }

    pub fn clear_displays(&mut self) {
        self.displays.clear();
        self.stale = true;
    }

    pub fn displays(&self) -> &[DisplayHandle] {
        &self.displays
    }

    fn restack(&mut self) {
        if self.stale {
            self.stack = flatten_stack(&self.displays);
            self.stale = false;
        }
    }

    /// Snapshot the per-frame state for one draw
    pub fn frame(&self, camera: CameraState) -> Frame {
        Frame {
            gl: self.gl.clone(),
            camera,
            options: self.options,
            palette: self.palette,
        }
    }

    // ── Passes ───────────────────────────────────────────────

    /// Draw the screen pass into whatever framebuffer is bound
    pub fn render(&mut self, frame: &Frame) {
        use glow::HasContext;
        self.restack();
        unsafe {
            self.gl.enable(glow::DEPTH_TEST);
        }
        for i in pass_order(&self.stack, Pass::Screen) {
            let target = self.stack[i].target.clone();
            target.borrow_mut().render(frame);
        }
    }

    /// Draw the ident pass into the offscreen target, threading a running
    /// ident offset through every display and recording the ranges.
    /// Returns the total ident count.
    pub fn identify(&mut self, frame: &Frame) -> Result<u32> {
        use glow::HasContext;
        self.restack();
        let width = (frame.camera.width as u32).max(1);
        let height = (frame.camera.height as u32).max(1);
        match &mut self.target {
            Some(target) => target.ensure_size(&self.gl, width, height)?,
            None => self.target = Some(IdentTarget::new(&self.gl, width, height)?),
        }
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| crate::error::ViewError::invariant("ident target missing"))?;

        // binding the target resizes the viewport; put the caller's back
        // afterwards so a pick mid-frame cannot distort the screen pass
        let mut viewport = [0i32; 4];
        unsafe {
            self.gl.get_parameter_i32_slice(glow::VIEWPORT, &mut viewport);
        }

        target.bind(&self.gl);
        self.ident_map.clear();
        for i in pass_order(&self.stack, Pass::Ident) {
            let start = self.ident_map.total();
            let handle = self.stack[i].target.clone();
            let count = handle.borrow_mut().identify(frame, start);
            self.ident_map.step(count, i);
        }
        target.unbind(&self.gl);
        unsafe {
            self.gl
                .viewport(viewport[0], viewport[1], viewport[2], viewport[3]);
        }
        Ok(self.ident_map.total())
    }

    /// Read the ident under a window-space pixel (origin top-left) from the
    /// last ident pass.
    pub fn pick(&self, x: u32, y: u32) -> Option<Hit> {
        let target = self.target.as_ref()?;
        let (_, height) = target.size();
        if y >= height {
            return None;
        }
        let ident = target.read(&self.gl, x, height - 1 - y)?;
        let (&entry_index, local) = self.ident_map.resolve(ident)?;
        let entry = &self.stack[entry_index];
        Some(Hit {
            target: entry.target.clone(),
            scope: entry.scope.clone(),
            group: entry_index as u32,
            ident: local,
        })
    }

    /// Route an input event to the display under the pixel
    pub fn control(&mut self, frame: &Frame, x: u32, y: u32, event: ControlEvent) {
        if let Some(hit) = self.pick(x, y) {
            hit.target
                .borrow_mut()
                .control(frame, hit.group, hit.ident, event);
        }
    }

    /// Set the selection state of an ident from the last ident pass
    pub fn select(&mut self, ident: u32, state: bool) {
        if let Some((&entry_index, local)) = self.ident_map.resolve(ident) {
            self.stack[entry_index]
                .target
                .borrow_mut()
                .select(&[local], state);
        }
    }

    pub fn selected(&self, ident: u32) -> bool {
        self.ident_map
            .resolve(ident)
            .is_some_and(|(&entry_index, local)| {
                self.stack[entry_index].target.borrow().selected(local)
            })
    }

    /// Release the offscreen target; shared programs die with the cache
    pub fn destroy(&mut self) {
        if let Some(target) = self.target.take() {
            target.destroy(&self.gl);
        }
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::StackSlot;
    use glam::Mat4;
    use std::cell::RefCell;

    struct Probe {
        count: u32,
        starts: Vec<u32>,
        selected: Vec<u32>,
    }

    impl Probe {
        fn handle(count: u32) -> Rc<RefCell<Probe>> {
            Rc::new(RefCell::new(Probe {
                count,
                starts: Vec::new(),
                selected: Vec::new(),
            }))
        }
    }

    impl Display for Probe {
        fn render(&mut self, _frame: &Frame) {}

        fn identify(&mut self, _frame: &Frame, start_ident: u32) -> u32 {
            self.starts.push(start_ident);
            self.count
        }

        fn select(&mut self, idents: &[u32], state: bool) {
            if state {
                self.selected.extend_from_slice(idents);
            }
        }

        fn stack(&self) -> Vec<StackSlot> {
            vec![StackSlot { pass: Pass::Ident, priority: 1 }]
        }

        fn set_world(&mut self, _world: Mat4) {}
    }

    /// A frame over a context with unresolved function pointers; the probes
    /// never issue a GL call.
    fn dummy_frame() -> Frame {
        let gl = unsafe { glow::Context::from_loader_function(|_| std::ptr::null()) };
        Frame {
            gl: Arc::new(gl),
            camera: CameraState {
                view: Mat4::IDENTITY,
                proj: Mat4::IDENTITY,
                width: 100.0,
                height: 100.0,
            },
            options: DisplayOptions::default(),
            palette: Palette::default(),
        }
    }

    /// The ident threading of `identify`, without a real GL context
    fn thread_idents(entries: &[StackEntry], map: &mut IdentMap<usize>) {
        let frame = dummy_frame();
        map.clear();
        for i in pass_order(entries, Pass::Ident) {
            let start = map.total();
            let count = entries[i].target.borrow_mut().identify(&frame, start);
            map.step(count, i);
        }
    }

    #[test]
    fn ident_ranges_are_threaded_in_stack_order() {
        let a = Probe::handle(3);
        let b = Probe::handle(2);
        let displays: Vec<DisplayHandle> = vec![a.clone(), b.clone()];
        let entries = flatten_stack(&displays);

        let mut map = IdentMap::new();
        thread_idents(&entries, &mut map);

        assert_eq!(a.borrow().starts, vec![0]);
        assert_eq!(b.borrow().starts, vec![3]);
        assert_eq!(map.total(), 5);
        // global ident 4 is the second element of the second display
        let (&entry, local) = map.resolve(4).unwrap();
        assert_eq!(entries[entry].scope, vec![1]);
        assert_eq!(local, 1);
    }
}
