use crate::{
    config::PickerConfig,
    geometry::Bounds,
    scene::CanvasSize,
    Bitmap, Color, Rect, Scene,
};

/// Renders `count` consecutive frames of `scene`, stepping it after each one.
///
/// Frame `n` shows the scene after `n` steps. A frame whose surface could not
/// be created is `None`.
pub fn precompute_frames(scene: &mut Scene, count: usize) -> Vec<Option<Bitmap>> {
    let mut frames = Vec::with_capacity(count);
    for _ in 0..count {
        frames.push(scene.render());
        scene.step();
    }
    tracing::debug!(
        frames = count,
        skipped = frames.iter().filter(|frame| frame.is_none()).count(),
        "precomputed frames"
    );
    frames
}

/// Scene with a paddle that slides from the left edge to the right edge of
/// the canvas over `config.frames` frames.
pub fn paddle_scene(config: &PickerConfig, canvas: CanvasSize, background: Color) -> Scene {
    let travel = (canvas.width as f32 - config.paddle.width).max(0.0);
    let stride = if config.frames > 1 {
        travel / (config.frames - 1) as f32
    } else {
        0.0
    };
    let top = canvas.height as f32 - config.bottom_margin - config.paddle.height;

    let paddle = Rect::new(Bounds::new(0.0, top, config.paddle.width, config.paddle.height))
        .with_fill(config.fill)
        .with_step_function(move |state| state.bounds.offset(stride, 0.0));

    let mut scene = Scene::new(canvas, background);
    scene.append(paddle);
    scene
}

/// One image per picker position.
pub fn paddle_frames(config: &PickerConfig, canvas: CanvasSize, background: Color) -> Vec<Option<Bitmap>> {
    let mut scene = paddle_scene(config, canvas, background);
    precompute_frames(&mut scene, config.frames)
}
