//! Per-frame view state consumed by the level-of-detail pass.
//!
//! A [`RenderContext`] bundles everything a tile needs to decide whether it is
//! detailed enough for the current frame: the globe and its projection, the
//! camera, the viewport and display density, the vertical exaggeration and an
//! optional view frustum for culling.
//!
//! # Frame scoping
//!
//! View-derived values that are expensive or used many times per frame, such
//! as the look-at location, are memoized in a [`FrameMemo`] owned by the
//! context. Changing the camera with [`RenderContext::set_camera`] clears the
//! memo, so nothing leaks from one frame into the next.

mod frustum;
mod memo;

pub use frustum::{Frustum, Plane};
pub use memo::FrameMemo;

use crate::geo::{Location, Position};
use crate::projection::{Globe, Vec3};

/// Default vertical field of view in degrees.
pub const DEFAULT_FIELD_OF_VIEW: f64 = 45.0;

/// Default display density in dots per inch.
pub const DEFAULT_DPI: f64 = 160.0;

/// Displays at or above this density get a doubled detail threshold.
pub const HIGH_DENSITY_DPI: f64 = 320.0;

/// Labels are lifted this many pixels above the terrain at the look-at point.
pub const LABEL_OFFSET_PIXELS: f64 = 10.0;

/// Tilt is capped below the horizon so the look-at point stays finite.
const MAX_TILT_DEGREES: f64 = 89.0;

/// Camera placement: geographic position plus orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Position,
    /// Clockwise from north.
    pub heading: f64,
    /// Zero looks straight down.
    pub tilt: f64,
}

impl Camera {
    /// A nadir-looking camera at `position`.
    pub fn new(position: Position) -> Self {
        Self {
            position,
            heading: 0.0,
            tilt: 0.0,
        }
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = heading;
        self
    }

    pub fn with_tilt(mut self, tilt: f64) -> Self {
        self.tilt = tilt;
        self
    }
}

/// Viewport size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// View state for one frame.
#[derive(Debug)]
pub struct RenderContext {
    globe: Globe,
    camera: Camera,
    camera_point: Vec3,
    viewport: Viewport,
    field_of_view: f64,
    vertical_exaggeration: f64,
    dpi: f64,
    frustum: Option<Frustum>,
    memo: FrameMemo,
}

impl RenderContext {
    /// Create a context with default field of view, unit vertical
    /// exaggeration, standard density and no frustum.
    pub fn new(globe: Globe, camera: Camera, viewport: Viewport) -> Self {
        let camera_point = Self::project_camera(&globe, &camera);
        Self {
            globe,
            camera,
            camera_point,
            viewport,
            field_of_view: DEFAULT_FIELD_OF_VIEW,
            vertical_exaggeration: 1.0,
            dpi: DEFAULT_DPI,
            frustum: None,
            memo: FrameMemo::new(),
        }
    }

    pub fn with_field_of_view(mut self, degrees: f64) -> Self {
        self.field_of_view = degrees;
        self.memo.clear();
        self
    }

    pub fn with_vertical_exaggeration(mut self, exaggeration: f64) -> Self {
        self.vertical_exaggeration = exaggeration;
        self
    }

    pub fn with_dpi(mut self, dpi: f64) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_frustum(mut self, frustum: Frustum) -> Self {
        self.frustum = Some(frustum);
        self
    }

    /// Move the camera for a new frame. Clears the per-frame memo.
    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
        self.camera_point = Self::project_camera(&self.globe, &camera);
        self.memo.clear();
    }

    pub fn set_frustum(&mut self, frustum: Option<Frustum>) {
        self.frustum = frustum;
    }

    pub fn globe(&self) -> &Globe {
        &self.globe
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// The camera position in Cartesian coordinates.
    pub fn camera_point(&self) -> Vec3 {
        self.camera_point
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn field_of_view(&self) -> f64 {
        self.field_of_view
    }

    pub fn vertical_exaggeration(&self) -> f64 {
        self.vertical_exaggeration
    }

    pub fn frustum(&self) -> Option<&Frustum> {
        self.frustum.as_ref()
    }

    /// Multiplier applied to the detail threshold on high density displays,
    /// where each pixel is physically smaller.
    pub fn density_factor(&self) -> f64 {
        if self.dpi >= HIGH_DENSITY_DPI {
            2.0
        } else {
            1.0
        }
    }

    /// Size in meters of one screen pixel at `distance` meters from the eye.
    pub fn pixel_size_at_distance(&self, distance: f64) -> f64 {
        let tan_half_fov = (self.field_of_view * 0.5).to_radians().tan();
        let frustum_height = 2.0 * distance * tan_half_fov;
        frustum_height / self.viewport.height.max(1) as f64
    }

    /// Ground location at the center of the view.
    ///
    /// The camera nadir moved along the heading by `altitude · tan(tilt)`.
    pub fn look_at_location(&self) -> Location {
        self.memo.look_at_location(|| {
            let position = self.camera.position;
            let tilt = self.camera.tilt.clamp(0.0, MAX_TILT_DEGREES).to_radians();
            let ground_distance = position.altitude.max(0.0) * tilt.tan();
            let radians = ground_distance / self.globe.equatorial_radius();
            position.location().destination(self.camera.heading, radians)
        })
    }

    /// Pixel size at the distance between the camera and the look-at location.
    pub fn look_at_pixel_size(&self) -> f64 {
        self.memo.look_at_pixel_size(|| {
            let look_at = self.look_at_location();
            let point = self
                .globe
                .geographic_to_cartesian(look_at.latitude, look_at.longitude, 0.0);
            self.pixel_size_at_distance(self.camera_point.distance_to(&point))
        })
    }

    /// Height in meters that lifts a label [`LABEL_OFFSET_PIXELS`] above the
    /// terrain at the look-at location.
    pub fn label_offset(&self) -> f64 {
        self.memo
            .label_offset(|| self.look_at_pixel_size() * LABEL_OFFSET_PIXELS)
    }

    pub fn memo(&self) -> &FrameMemo {
        &self.memo
    }

    fn project_camera(globe: &Globe, camera: &Camera) -> Vec3 {
        let position = camera.position;
        globe.geographic_to_cartesian(position.latitude, position.longitude, position.altitude)
    }
}
