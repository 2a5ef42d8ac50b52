//! Quadtree over axis-aligned bounds.
//!
//! The tree references keys, it never owns what they identify. An entry stays
//! at the deepest node whose single quadrant fully contains its bound; entries
//! straddling a midpoint remain at the current level. Removal must be given the
//! same bound that was used at insertion so the lookup follows the same path.

use glam::Vec2;

use crate::math::Rect;

#[derive(Debug, Clone, Copy)]
pub struct QuadtreeConfig {
    /// Entry count above which a leaf splits.
    pub capacity: usize,
    pub max_depth: u32,
}

impl Default for QuadtreeConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            max_depth: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuadtreeNode<K> {
    pub bounds: Rect,
    pub depth: u32,
    pub entries: Vec<(K, Rect)>,
    /// 0 = top-right, 1 = top-left, 2 = bottom-left, 3 = bottom-right.
    pub children: Option<Box<[QuadtreeNode<K>; 4]>>,
}

impl<K: Copy + PartialEq> QuadtreeNode<K> {
    pub fn new(bounds: Rect, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    fn split(&mut self) {
        let w = self.bounds.width * 0.5;
        let h = self.bounds.height * 0.5;
        let (x, y) = (self.bounds.x, self.bounds.y);
        let depth = self.depth + 1;
        self.children = Some(Box::new([
            QuadtreeNode::new(Rect::new(x + w, y, w, h), depth),
            QuadtreeNode::new(Rect::new(x, y, w, h), depth),
            QuadtreeNode::new(Rect::new(x, y + h, w, h), depth),
            QuadtreeNode::new(Rect::new(x + w, y + h, w, h), depth),
        ]));
    }

    /// Quadrant that fully contains `bound`, or `None` if it straddles a midpoint.
    fn quadrant_of(&self, bound: &Rect) -> Option<usize> {
        let mid_x = self.bounds.x + self.bounds.width * 0.5;
        let mid_y = self.bounds.y + self.bounds.height * 0.5;

        let top = bound.y < mid_y && bound.bottom() < mid_y;
        let bottom = bound.y > mid_y;

        if bound.x < mid_x && bound.right() < mid_x {
            if top {
                Some(1)
            } else if bottom {
                Some(2)
            } else {
                None
            }
        } else if bound.x > mid_x {
            if top {
                Some(0)
            } else if bottom {
                Some(3)
            } else {
                None
            }
        } else {
            None
        }
    }

    pub fn insert(&mut self, key: K, bound: Rect, config: &QuadtreeConfig) {
        if let Some(index) = self.quadrant_of(&bound) {
            if let Some(children) = self.children.as_mut() {
                children[index].insert(key, bound, config);
                return;
            }
        }

        self.entries.push((key, bound));

        if self.children.is_none()
            && self.entries.len() > config.capacity
            && self.depth < config.max_depth
        {
            self.split();
            let pending = std::mem::take(&mut self.entries);
            for (k, b) in pending {
                match (self.quadrant_of(&b), self.children.as_mut()) {
                    (Some(index), Some(children)) => children[index].insert(k, b, config),
                    _ => self.entries.push((k, b)),
                }
            }
        }
    }

    /// Returns `true` if the key was found and removed.
    pub fn remove(&mut self, key: K, bound: &Rect, config: &QuadtreeConfig) -> bool {
        let index = self.quadrant_of(bound);
        if let (Some(index), Some(children)) = (index, self.children.as_mut()) {
            let removed = children[index].remove(key, bound, config);
            if removed {
                self.try_collapse(config);
            }
            return removed;
        }

        let removed = match self.entries.iter().position(|(k, _)| *k == key) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        };
        self.try_collapse(config);
        removed
    }

    /// Merge the children back when their own lists hold no more than the
    /// capacity. The whole subtree is drained so nothing is lost below them.
    fn try_collapse(&mut self, config: &QuadtreeConfig) {
        let Some(children) = self.children.as_ref() else {
            return;
        };
        let total: usize = children.iter().map(|c| c.entries.len()).sum();
        if total > config.capacity {
            return;
        }
        if let Some(mut children) = self.children.take() {
            for child in children.iter_mut() {
                child.drain_into(&mut self.entries);
            }
        }
    }

    fn drain_into(&mut self, out: &mut Vec<(K, Rect)>) {
        out.append(&mut self.entries);
        if let Some(mut children) = self.children.take() {
            for child in children.iter_mut() {
                child.drain_into(out);
            }
        }
    }

    /// Every entry stored in a node whose bounds contain `point`.
    pub fn query_point(&self, point: Vec2, out: &mut Vec<K>) {
        if !self.bounds.contains_point(point) {
            return;
        }
        out.extend(self.entries.iter().map(|(k, _)| *k));
        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                child.query_point(point, out);
            }
        }
    }

    pub fn query_rect(&self, query: &Rect, out: &mut Vec<K>) {
        if !self.bounds.intersects(query) {
            return;
        }
        out.extend(
            self.entries
                .iter()
                .filter(|(_, b)| b.intersects(query))
                .map(|(k, _)| *k),
        );
        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                child.query_rect(query, out);
            }
        }
    }

    pub fn query_circle(&self, center: Vec2, radius: f32, out: &mut Vec<K>) {
        if !self.bounds.intersects_circle(center, radius) {
            return;
        }
        out.extend(
            self.entries
                .iter()
                .filter(|(_, b)| b.intersects_circle(center, radius))
                .map(|(k, _)| *k),
        );
        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                child.query_circle(center, radius, out);
            }
        }
    }

    pub fn count(&self) -> usize {
        let below: usize = self
            .children
            .as_ref()
            .map(|c| c.iter().map(QuadtreeNode::count).sum())
            .unwrap_or(0);
        self.entries.len() + below
    }

    pub fn visit<F: FnMut(&QuadtreeNode<K>)>(&self, f: &mut F) {
        f(self);
        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                child.visit(f);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Quadtree<K> {
    root: QuadtreeNode<K>,
    config: QuadtreeConfig,
}

impl<K: Copy + PartialEq> Quadtree<K> {
    pub fn new(bounds: Rect, config: QuadtreeConfig) -> Self {
        Self {
            root: QuadtreeNode::new(bounds, 0),
            config,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.root.bounds
    }

    pub fn root(&self) -> &QuadtreeNode<K> {
        &self.root
    }

    pub fn insert(&mut self, key: K, bound: Rect) {
        self.root.insert(key, bound, &self.config);
    }

    pub fn remove(&mut self, key: K, bound: &Rect) -> bool {
        let removed = self.root.remove(key, bound, &self.config);
        if !removed {
            log::warn!("Quadtree remove missed an entry at {bound:?}");
        }
        removed
    }

    pub fn query_point(&self, point: Vec2) -> Vec<K> {
        let mut out = Vec::new();
        self.root.query_point(point, &mut out);
        out
    }

    pub fn query_rect(&self, query: &Rect) -> Vec<K> {
        let mut out = Vec::new();
        self.root.query_rect(query, &mut out);
        out
    }

    pub fn query_circle(&self, center: Vec2, radius: f32) -> Vec<K> {
        let mut out = Vec::new();
        self.root.query_circle(center, radius, &mut out);
        out
    }

    pub fn count(&self) -> usize {
        self.root.count()
    }

    pub fn clear(&mut self) {
        self.root.entries.clear();
        self.root.children = None;
    }

    /// Node rectangles in depth-first order, for the debug overlay.
    pub fn node_bounds(&self) -> Vec<Rect> {
        let mut out = Vec::new();
        self.root.visit(&mut |node| out.push(node.bounds));
        out
    }
}
