//! Scene composition and GPU picking core for an interactive CAD viewer.
//!
//! The library turns kernel geometry snapshots (`shared`) and annotation
//! schemes into displays, schedules them over a screen pass and an
//! offscreen ident pass, and resolves cursor pixels back to the picked
//! element. It owns no window or GL context; the host hands over an
//! `Arc<glow::Context>` and drives `Scene::render` / `Scene::identify`.

pub mod annotate;
pub mod camera;
pub mod display;
pub mod error;
pub mod ident;
pub mod marker;
pub mod prims;
pub mod resource;
pub mod scene;
pub mod scheme;
pub mod settings;
pub mod shaders;
pub mod solid;
pub mod space;
pub mod vertices;

pub use camera::{ArcBallCamera, CameraState};
pub use display::{ControlEvent, Display, DisplayHandle, Displayable};
pub use error::{Result, ViewError};
pub use marker::{AxisDisplay, PointDisplay};
pub use scene::{Frame, Hit, Scene};
pub use scheme::{Scheme, SchemeDisplay};
pub use settings::{DisplayOptions, Palette};
pub use solid::{SolidDisplay, WebDisplay};
pub use space::Space;
