//! Broad-phase collision over world-space shapes.
//!
//! A single tagged [`Shape`] plus one overlap function replaces per-pair
//! collider branches. The pass itself is a plain O(n^2) scan; see
//! [`find_overlaps`] for the pair-skip rules.

use glam::Vec2;
use kite_core::math::{circles_overlap, Rect};

use crate::config::CollisionPolicy;
use crate::entity::EntityId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Rect(Rect),
    Circle { center: Vec2, radius: f32 },
}

impl Shape {
    pub fn contains_point(&self, p: Vec2) -> bool {
        match self {
            Shape::Rect(r) => r.contains_point(p),
            Shape::Circle { center, radius } => center.distance(p) <= *radius,
        }
    }
}

pub fn shapes_overlap(a: &Shape, b: &Shape) -> bool {
    match (a, b) {
        (Shape::Rect(ra), Shape::Rect(rb)) => ra.intersects(rb),
        (Shape::Rect(r), Shape::Circle { center, radius })
        | (Shape::Circle { center, radius }, Shape::Rect(r)) => r.intersects_circle(*center, *radius),
        (
            Shape::Circle {
                center: ca,
                radius: ra,
            },
            Shape::Circle {
                center: cb,
                radius: rb,
            },
        ) => circles_overlap(*ca, *ra, *cb, *rb),
    }
}

/// One participant of the collision pass.
#[derive(Debug, Clone, Copy)]
pub struct Collidable {
    pub id: EntityId,
    pub parent: Option<EntityId>,
    pub shape: Shape,
}

/// Notification recorded for each side of an overlapping pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionEvent {
    pub entity: EntityId,
    pub other: EntityId,
}

/// Overlapping pairs in scan order. Identical entries and direct parent/child
/// pairs are skipped. Under [`CollisionPolicy::FirstPair`] the scan stops at
/// the first hit.
pub fn find_overlaps(candidates: &[Collidable], policy: CollisionPolicy) -> Vec<(EntityId, EntityId)> {
    let mut pairs = Vec::new();
    for (i, a) in candidates.iter().enumerate() {
        for b in &candidates[i + 1..] {
            if a.id == b.id || b.parent == Some(a.id) || a.parent == Some(b.id) {
                continue;
            }
            if shapes_overlap(&a.shape, &b.shape) {
                pairs.push((a.id, b.id));
                if policy == CollisionPolicy::FirstPair {
                    return pairs;
                }
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<EntityId> {
        let mut map: SlotMap<EntityId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    fn boxed(id: EntityId, x: f32, y: f32) -> Collidable {
        Collidable {
            id,
            parent: None,
            shape: Shape::Rect(Rect::new(x, y, 8.0, 8.0)),
        }
    }

    #[test]
    fn every_shape_pair_dispatches() {
        let r = Shape::Rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let inside = Shape::Circle {
            center: Vec2::new(5.0, 5.0),
            radius: 1.0,
        };
        let far = Shape::Circle {
            center: Vec2::new(50.0, 50.0),
            radius: 1.0,
        };
        assert!(shapes_overlap(&r, &inside));
        assert!(shapes_overlap(&inside, &r));
        assert!(!shapes_overlap(&far, &r));
        assert!(!shapes_overlap(&inside, &far));
        assert!(shapes_overlap(&r, &Shape::Rect(Rect::new(5.0, 5.0, 10.0, 10.0))));
    }

    #[test]
    fn first_pair_policy_stops_after_one_hit() {
        let id = ids(4);
        let candidates = vec![
            boxed(id[0], 0.0, 0.0),
            boxed(id[1], 2.0, 0.0),
            boxed(id[2], 100.0, 0.0),
            boxed(id[3], 102.0, 0.0),
        ];
        assert_eq!(
            find_overlaps(&candidates, CollisionPolicy::FirstPair),
            vec![(id[0], id[1])]
        );
        assert_eq!(
            find_overlaps(&candidates, CollisionPolicy::AllPairs),
            vec![(id[0], id[1]), (id[2], id[3])]
        );
    }

    #[test]
    fn direct_parent_child_pairs_are_skipped() {
        let id = ids(2);
        let mut child = boxed(id[1], 1.0, 1.0);
        child.parent = Some(id[0]);
        let candidates = vec![boxed(id[0], 0.0, 0.0), child];
        assert!(find_overlaps(&candidates, CollisionPolicy::AllPairs).is_empty());
    }

    #[test]
    fn shape_point_containment() {
        let c = Shape::Circle {
            center: Vec2::ZERO,
            radius: 2.0,
        };
        assert!(c.contains_point(Vec2::new(1.0, 1.0)));
        assert!(!c.contains_point(Vec2::new(2.0, 2.0)));
    }
}
