pub mod animation;
pub mod math;
pub mod quadtree;
pub mod time;
pub mod transform;
