//! Preview surfaces.
//!
//! Coordinates passed to a [`PreviewSurface`] are CSS pixels relative to the
//! overlay's top-left corner; the surface applies the device pixel ratio.
//!
//! [`RasterSurface`] is a CPU framebuffer with `bytemuck`-castable pixels so
//! a platform layer can blit it without copying.

use bytemuck::{Pod, Zeroable};
use inkboard_core::{Point, StrokeColor};
use thiserror::Error;

/// Largest physical edge a surface may have.
pub const MAX_DIMENSION: u32 = 16_384;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    #[error("surface too large: {width}x{height} physical pixels")]
    TooLarge { width: u32, height: u32 },
    #[error("invalid device pixel ratio: {0}")]
    InvalidScale(f32),
}

/// Logical size of the overlay plus the display's pixel density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: f32,
    pub height: f32,
    pub device_pixel_ratio: f32,
}

impl SurfaceSize {
    pub const fn new(width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }

    /// Backing-store size in physical pixels.
    pub fn physical(&self) -> Result<(u32, u32), SurfaceError> {
        let dpr = self.device_pixel_ratio;
        if !dpr.is_finite() || dpr <= 0.0 {
            return Err(SurfaceError::InvalidScale(dpr));
        }
        let w = (self.width.max(0.0) * dpr).ceil();
        let h = (self.height.max(0.0) * dpr).ceil();
        if w > MAX_DIMENSION as f32 || h > MAX_DIMENSION as f32 {
            return Err(SurfaceError::TooLarge {
                width: w as u32,
                height: h as u32,
            });
        }
        Ok((w as u32, h as u32))
    }
}

/// The overlay the preview paints into.
pub trait PreviewSurface {
    /// Resize the backing store. Clears existing content.
    fn resize(&mut self, size: SurfaceSize) -> Result<(), SurfaceError>;

    /// Filled disc.
    fn fill_dot(&mut self, center: Point, radius: f32, color: StrokeColor);

    /// Straight segment with round caps.
    fn stroke_segment(&mut self, from: Point, to: Point, width: f32, color: StrokeColor);

    fn clear(&mut self);
}

/// Where the host editor's surface lives, once it exists.
pub trait HostMount {
    /// Current bounds of the host surface, or `None` if it is not mounted.
    fn host_bounds(&self) -> Option<SurfaceSize>;
}

// ─── Pixels ──────────────────────────────────────────────────────────

/// One straight-alpha RGBA8 pixel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const TRANSPARENT: Rgba8 = Rgba8 { r: 0, g: 0, b: 0, a: 0 };

    /// Source-over composite of `src` onto `self`.
    #[inline]
    fn blend(self, src: StrokeColor) -> Rgba8 {
        if src.a == 255 {
            return Rgba8 {
                r: src.r,
                g: src.g,
                b: src.b,
                a: 255,
            };
        }
        let sa = src.a as f32 / 255.0;
        let da = self.a as f32 / 255.0;
        let out_a = sa + da * (1.0 - sa);
        if out_a <= 0.0 {
            return Rgba8::TRANSPARENT;
        }
        let mix = |s: u8, d: u8| -> u8 {
            let v = (s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a;
            v.round().clamp(0.0, 255.0) as u8
        };
        Rgba8 {
            r: mix(src.r, self.r),
            g: mix(src.g, self.g),
            b: mix(src.b, self.b),
            a: (out_a * 255.0).round() as u8,
        }
    }
}

impl From<StrokeColor> for Rgba8 {
    fn from(c: StrokeColor) -> Self {
        Rgba8 {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

// ─── RasterSurface ───────────────────────────────────────────────────

/// Software framebuffer. Hard-edged coverage: a pixel is painted when its
/// center lies inside the shape.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    size: SurfaceSize,
    width_px: u32,
    height_px: u32,
    pixels: Vec<Rgba8>,
}

impl RasterSurface {
    /// A zero-sized surface; call [`PreviewSurface::resize`] before painting.
    pub fn empty() -> Self {
        Self {
            size: SurfaceSize::new(0.0, 0.0, 1.0),
            width_px: 0,
            height_px: 0,
            pixels: Vec::new(),
        }
    }

    pub fn new(size: SurfaceSize) -> Result<Self, SurfaceError> {
        let mut surface = Self::empty();
        surface.resize(size)?;
        Ok(surface)
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn physical_size(&self) -> (u32, u32) {
        (self.width_px, self.height_px)
    }

    /// Pixel at physical coordinates.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x >= self.width_px || y >= self.height_px {
            return None;
        }
        self.pixels.get((y * self.width_px + x) as usize).copied()
    }

    pub fn pixels(&self) -> &[Rgba8] {
        &self.pixels
    }

    /// Raw RGBA bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn painted_pixels(&self) -> usize {
        self.pixels.iter().filter(|p| p.a > 0).count()
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|p| p.a == 0)
    }

    /// Paint every pixel whose center is within `radius` of segment `a`–`b`.
    /// Inputs are CSS pixels.
    fn paint_capsule(&mut self, a: Point, b: Point, radius: f32, color: StrokeColor) {
        if self.pixels.is_empty() || !color.is_visible() {
            return;
        }
        let dpr = self.size.device_pixel_ratio;
        let a = Point::new(a.x * dpr, a.y * dpr);
        let b = Point::new(b.x * dpr, b.y * dpr);
        // Wide enough that any point covers at least one pixel center.
        let r = (radius * dpr).max(0.75);

        let x0 = (a.x.min(b.x) - r).floor().max(0.0) as u32;
        let y0 = (a.y.min(b.y) - r).floor().max(0.0) as u32;
        let x1 = ((a.x.max(b.x) + r).ceil().max(0.0) as u32).min(self.width_px);
        let y1 = ((a.y.max(b.y) + r).ceil().max(0.0) as u32).min(self.height_px);

        for py in y0..y1 {
            let row = (py * self.width_px) as usize;
            for px in x0..x1 {
                let center = Point::new(px as f32 + 0.5, py as f32 + 0.5);
                if distance_to_segment(center, a, b) <= r {
                    let idx = row + px as usize;
                    self.pixels[idx] = self.pixels[idx].blend(color);
                }
            }
        }
    }
}

impl Default for RasterSurface {
    fn default() -> Self {
        Self::empty()
    }
}

impl PreviewSurface for RasterSurface {
    fn resize(&mut self, size: SurfaceSize) -> Result<(), SurfaceError> {
        let (w, h) = size.physical()?;
        self.size = size;
        self.width_px = w;
        self.height_px = h;
        self.pixels.clear();
        self.pixels.resize((w as usize) * (h as usize), Rgba8::TRANSPARENT);
        Ok(())
    }

    fn fill_dot(&mut self, center: Point, radius: f32, color: StrokeColor) {
        self.paint_capsule(center, center, radius, color);
    }

    fn stroke_segment(&mut self, from: Point, to: Point, width: f32, color: StrokeColor) {
        self.paint_capsule(from, to, width / 2.0, color);
    }

    fn clear(&mut self) {
        self.pixels.fill(Rgba8::TRANSPARENT);
    }
}

#[inline]
fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len2 = abx * abx + aby * aby;
    if len2 == 0.0 {
        return p.distance(&a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len2).clamp(0.0, 1.0);
    p.distance(&Point::new(a.x + t * abx, a.y + t * aby))
}
