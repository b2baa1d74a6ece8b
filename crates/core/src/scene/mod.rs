use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Bitmap, Color, Drawable, Result};

/// Identity of a drawable inside a [`Scene`], handed out by
/// [`Scene::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeId(u64);

/// Pixel dimensions of a scene canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::new(78, 93)
    }
}

struct SceneEntry {
    id: ShapeId,
    shape: Box<dyn Drawable>,
}

/// Ordered collection of drawables rendered onto a fixed-size canvas.
///
/// Append order is draw order and step order, so the most recently appended
/// shape ends up on top.
pub struct Scene {
    size: CanvasSize,
    background: Color,
    entries: Vec<SceneEntry>,
    next_id: u64,
}

impl Scene {
    pub fn new(size: CanvasSize, background: Color) -> Self {
        Self {
            size,
            background,
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub fn size(&self) -> CanvasSize {
        self.size
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, background: Color) {
        self.background = background;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds `shape` on top of everything appended so far.
    pub fn append(&mut self, shape: impl Drawable + 'static) -> ShapeId {
        self.append_boxed(Box::new(shape))
    }

    pub fn append_boxed(&mut self, shape: Box<dyn Drawable>) -> ShapeId {
        let id = ShapeId(self.next_id);
        self.next_id += 1;
        self.entries.push(SceneEntry { id, shape });
        id
    }

    /// Removes the drawable appended under `id`, preserving the order of the
    /// rest.
    pub fn remove(&mut self, id: ShapeId) -> Option<Box<dyn Drawable>> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(index).shape)
    }

    pub fn ids(&self) -> impl Iterator<Item = ShapeId> + '_ {
        self.entries.iter().map(|entry| entry.id)
    }

    /// Rasterises the scene, or returns `None` when no drawing surface could
    /// be created. Callers skip the frame in that case.
    pub fn render(&self) -> Option<Bitmap> {
        match self.try_render() {
            Ok(bitmap) => Some(bitmap),
            Err(err) => {
                tracing::warn!(%err, "skipping frame");
                None
            }
        }
    }

    pub fn try_render(&self) -> Result<Bitmap> {
        let mut surface = Bitmap::try_new(self.size.width, self.size.height)?;
        surface.fill(self.background);
        for entry in &self.entries {
            entry.shape.draw(&mut surface);
        }
        Ok(surface)
    }

    /// Advances every drawable once, in append order.
    pub fn step(&mut self) {
        for entry in &mut self.entries {
            entry.shape.step();
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(CanvasSize::default(), Color::CLEAR)
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("size", &self.size)
            .field("background", &self.background)
            .field("shapes", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{geometry::Bounds, Rect};

    fn counting_rect(bounds: Bounds, log: Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Rect {
        Rect::new(bounds).with_step_function(move |_| log.lock().unwrap().push(name))
    }

    #[test]
    fn renders_background_then_shapes() {
        let mut scene = Scene::new(CanvasSize::new(6, 6), Color::BLACK);
        scene.append(Rect::new(Bounds::new(0.0, 0.0, 2.0, 2.0)));

        let frame = scene.render().expect("surface should allocate");
        assert_eq!(frame.pixel(0, 0), Some(Color::ORANGE));
        assert_eq!(frame.pixel(5, 5), Some(Color::BLACK));
    }

    #[test]
    fn later_shapes_paint_on_top() {
        let mut scene = Scene::new(CanvasSize::new(6, 6), Color::CLEAR);
        scene.append(Rect::new(Bounds::new(0.0, 0.0, 4.0, 4.0)).with_fill(Color::RED));
        scene.append(Rect::new(Bounds::new(2.0, 2.0, 4.0, 4.0)).with_fill(Color::GREEN));

        let frame = scene.render().unwrap();
        assert_eq!(frame.pixel(1, 1), Some(Color::RED));
        assert_eq!(frame.pixel(3, 3), Some(Color::GREEN));
        assert_eq!(frame.pixel(5, 5), Some(Color::GREEN));
    }

    #[test]
    fn steps_in_append_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scene = Scene::default();
        scene.append(counting_rect(Bounds::default(), log.clone(), "first"));
        scene.append(Rect::new(Bounds::default()));
        scene.append(counting_rect(Bounds::default(), log.clone(), "second"));

        scene.step();
        scene.step();

        assert_eq!(*log.lock().unwrap(), ["first", "second", "first", "second"]);
    }

    #[test]
    fn shared_shape_appended_twice_steps_twice() {
        let shared = Arc::new(Mutex::new(
            Rect::new(Bounds::new(0.0, 0.0, 1.0, 1.0))
                .with_step_function(|state| state.bounds.offset(1.0, 0.0)),
        ));
        let mut scene = Scene::default();
        scene.append(shared.clone());
        scene.append(shared.clone());

        scene.step();

        assert_eq!(scene.len(), 2);
        assert_eq!(shared.lock().unwrap().bounds().origin.x, 2.0);
    }

    #[test]
    fn removes_by_identity() {
        let mut scene = Scene::new(CanvasSize::new(4, 4), Color::CLEAR);
        let red = scene.append(Rect::new(Bounds::new(0.0, 0.0, 4.0, 4.0)).with_fill(Color::RED));
        let green = scene.append(Rect::new(Bounds::new(0.0, 0.0, 4.0, 4.0)).with_fill(Color::GREEN));

        assert!(scene.remove(green).is_some());
        assert!(scene.remove(green).is_none());
        assert_eq!(scene.ids().collect::<Vec<_>>(), vec![red]);
        assert_eq!(scene.render().unwrap().pixel(0, 0), Some(Color::RED));
    }

    #[test]
    fn missing_surface_skips_the_frame() {
        let scene = Scene::new(CanvasSize::new(0, 93), Color::CLEAR);

        assert!(scene.render().is_none());
        assert!(scene.try_render().is_err());
    }
}
