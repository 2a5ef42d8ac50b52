use kite_core::animation::{Animation, AnimationMode};

use crate::assets::AssetCache;
use crate::component::{Component, ComponentKind};
use crate::entity::Entity;
use crate::sprite::Sprite;

/// Named frame sequences played one at a time, with an optional queued
/// successor that takes over once the active sequence hits its last frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Animator {
    animations: Vec<(String, Animation)>,
    current: String,
    next: Option<String>,
    mode: AnimationMode,
    playing: bool,
    missing_sprite_reported: bool,
}

impl Default for Animator {
    fn default() -> Self {
        Self::new()
    }
}

impl Animator {
    pub fn new() -> Self {
        Self {
            animations: Vec::new(),
            current: String::new(),
            next: None,
            mode: AnimationMode::Loop,
            playing: true,
            missing_sprite_reported: false,
        }
    }

    pub fn add(
        &mut self,
        name: &str,
        image: &str,
        rows: u32,
        columns: u32,
        frame_count: u32,
        fps: f32,
    ) {
        self.add_animation(name, Animation::from_fps(image, rows, columns, frame_count, fps));
    }

    pub fn add_animation(&mut self, name: &str, animation: Animation) {
        self.animations.push((name.to_string(), animation));
        if self.current.is_empty() {
            self.current = name.to_string();
        }
    }

    pub fn animations(&self) -> impl Iterator<Item = (&str, &Animation)> {
        self.animations.iter().map(|(n, a)| (n.as_str(), a))
    }

    /// Switch immediately, or queue the switch for when the active sequence
    /// reaches its final frame.
    pub fn set_animation(&mut self, name: &str, now: bool) {
        if self.animations.is_empty() {
            return;
        }
        if now {
            self.current = name.to_string();
            self.next = None;
            self.playing = true;
        } else if self.current != name {
            self.next = Some(name.to_string());
        }
    }

    pub fn mode(&self) -> AnimationMode {
        self.mode
    }

    /// Changing mode restarts the active sequence.
    pub fn set_mode(&mut self, mode: AnimationMode) {
        self.mode = mode;
        if let Some(anim) = self.current_animation_mut() {
            anim.rewind();
        }
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn stop(&mut self) {
        self.playing = false;
        if let Some(anim) = self.current_animation_mut() {
            anim.current_frame = 0;
            anim.current_time = 0.0;
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_name(&self) -> &str {
        &self.current
    }

    pub fn queued_name(&self) -> Option<&str> {
        self.next.as_deref()
    }

    fn current_index(&self) -> Option<usize> {
        if self.animations.is_empty() {
            return None;
        }
        Some(
            self.animations
                .iter()
                .position(|(n, _)| *n == self.current)
                .unwrap_or(0),
        )
    }

    /// The active sequence; falls back to the first one if the current name
    /// is unknown.
    pub fn current_animation(&self) -> Option<&Animation> {
        self.current_index().map(|i| &self.animations[i].1)
    }

    pub fn current_animation_mut(&mut self) -> Option<&mut Animation> {
        let index = self.current_index()?;
        Some(&mut self.animations[index].1)
    }

    pub fn current_frame(&self) -> u32 {
        self.current_animation().map_or(0, |a| a.current_frame)
    }

    pub fn frame_count(&self) -> u32 {
        self.current_animation().map_or(0, |a| a.frame_count)
    }

    fn advance(&mut self, dt: f32) {
        if !self.playing {
            return;
        }
        let mode = self.mode;
        let Some(anim) = self.current_animation_mut() else {
            return;
        };
        anim.tick(dt, mode);
        let reached_end = anim.is_last_frame();

        if reached_end {
            if let Some(next) = self.next.take() {
                if let Some(anim) = self.current_animation_mut() {
                    anim.current_frame = 0;
                    anim.current_time = 0.0;
                }
                self.current = next;
                self.playing = true;
            }
        }
    }
}

impl Component for Animator {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Animator
    }

    fn on_update(&mut self, _entity: &mut Entity, dt: f32) {
        self.advance(dt);
    }
}

impl Entity {
    /// Push the animator's current frame into the sibling sprite.
    pub(crate) fn sync_animation(&mut self, assets: &AssetCache) {
        let components = &mut self.components;
        let Some(animator) = components.animator.as_mut() else {
            return;
        };
        let Some(sprite) = components.sprite.as_mut() else {
            if !animator.missing_sprite_reported {
                log::warn!("Animator on '{}' has no sprite to drive", self.name);
                animator.missing_sprite_reported = true;
            }
            return;
        };
        let Some(anim) = animator.current_animation() else {
            return;
        };
        apply_frame(sprite, anim, assets);
    }
}

fn apply_frame(sprite: &mut Sprite, anim: &Animation, assets: &AssetCache) {
    if sprite.image != anim.image {
        sprite.image = anim.image.clone();
    }
    match assets.get(&anim.image) {
        Some(record) => sprite.clip = anim.frame_rect(record.width, record.height),
        None => assets.report_missing(&anim.image),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kite_core::math::Rect;

    fn walker() -> Animator {
        let mut a = Animator::new();
        a.add("walk", "walk_sheet", 1, 4, 4, 10.0);
        a.add("jump", "jump_sheet", 1, 2, 2, 10.0);
        a
    }

    #[test]
    fn first_added_sequence_becomes_current() {
        let a = walker();
        assert_eq!(a.current_name(), "walk");
        assert_eq!(a.frame_count(), 4);
    }

    #[test]
    fn queued_sequence_swaps_in_at_last_frame() {
        let mut a = walker();
        a.set_animation("jump", false);
        assert_eq!(a.queued_name(), Some("jump"));

        a.advance(0.1);
        a.advance(0.1);
        assert_eq!(a.current_name(), "walk");
        a.advance(0.1);
        assert_eq!(a.current_name(), "jump");
        assert_eq!(a.queued_name(), None);
        assert_eq!(a.current_frame(), 0);
    }

    #[test]
    fn immediate_switch_clears_queue() {
        let mut a = walker();
        a.set_animation("jump", false);
        a.set_animation("jump", true);
        assert_eq!(a.current_name(), "jump");
        assert_eq!(a.queued_name(), None);
    }

    #[test]
    fn stop_rewinds_and_pause_freezes() {
        let mut a = walker();
        a.advance(0.1);
        a.pause();
        a.advance(0.5);
        assert_eq!(a.current_frame(), 1);
        a.stop();
        assert_eq!(a.current_frame(), 0);
        assert!(!a.is_playing());
    }

    #[test]
    fn set_mode_restarts_sequence() {
        let mut a = walker();
        a.advance(0.2);
        a.set_mode(AnimationMode::PingPong);
        assert_eq!(a.current_frame(), 0);
        assert_eq!(a.mode(), AnimationMode::PingPong);
    }

    #[test]
    fn unknown_current_name_falls_back_to_first() {
        let mut a = walker();
        a.set_animation("missing", true);
        assert_eq!(a.current_animation().map(|x| x.image.as_str()), Some("walk_sheet"));
    }

    #[test]
    fn sync_drives_sprite_image_and_clip() {
        let mut assets = AssetCache::new();
        assets.insert_record("walk_sheet", 64, 16, 1);

        let mut e = Entity::new("hero");
        e.add_component(Sprite::new("placeholder"));
        let animator = e.add_component(Animator::new());
        animator.add("walk", "walk_sheet", 1, 4, 4, 10.0);
        animator.advance(0.2);

        e.sync_animation(&assets);
        let sprite = e.component::<Sprite>().expect("sprite");
        assert_eq!(sprite.image, "walk_sheet");
        assert_eq!(sprite.clip, Rect::new(32.0, 0.0, 16.0, 16.0));
    }
}
