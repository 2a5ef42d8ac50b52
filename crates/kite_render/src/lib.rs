pub mod camera;
pub mod renderer;

pub use camera::{Camera2D, CameraUniform};
pub use renderer::{
    DrawCommand, RecordingRenderer, Renderer, SpriteDraw, TextureHandle, TextureLoader,
};
