use glam::Mat4;

use crate::scene::Vertex;

pub const POSITION_COMPONENTS: usize = 3;
pub const COLOR_COMPONENTS: usize = 4;
pub const TEXCOORD_COMPONENTS: usize = 2;

/// CPU-side vertex attribute streams, one flat `f32` array per attribute.
///
/// The arrays never grow past the capacity given at construction; callers check
/// [`VertexStreams::remaining`] and flush before appending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexStreams {
    positions: Vec<f32>,
    colors: Vec<f32>,
    texcoords: Vec<f32>,
    capacity: usize,
}

impl VertexStreams {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity * POSITION_COMPONENTS),
            colors: Vec::with_capacity(capacity * COLOR_COMPONENTS),
            texcoords: Vec::with_capacity(capacity * TEXCOORD_COMPONENTS),
            capacity,
        }
    }

    /// Capacity in vertices.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / POSITION_COMPONENTS
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.vertex_count()
    }

    #[inline]
    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    #[inline]
    pub fn colors(&self) -> &[f32] {
        &self.colors
    }

    #[inline]
    pub fn texcoords(&self) -> &[f32] {
        &self.texcoords
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.texcoords.clear();
    }

    /// Appends `vertices` transformed by `world`.
    ///
    /// Returns the first vertex index of the appended run, or `None` (and
    /// appends nothing) if the run does not fit.
    pub fn append(&mut self, vertices: &[Vertex], world: &Mat4) -> Option<usize> {
        if vertices.len() > self.remaining() {
            return None;
        }
        let first = self.vertex_count();
        let identity = *world == Mat4::IDENTITY;
        for v in vertices {
            let p = if identity { v.position } else { world.transform_point3(v.position) };
            self.positions.extend_from_slice(&[p.x, p.y, p.z]);
            self.colors.extend_from_slice(&v.color.to_array());
            self.texcoords.extend_from_slice(&[v.texcoord.x, v.texcoord.y]);
        }
        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Color;
    use crate::scene::quad;
    use glam::Vec3;

    #[test]
    fn append_tracks_float_offsets() {
        let mut s = VertexStreams::with_capacity(12);
        let q = quad(0.0, 0.0, 1.0, 1.0, Color::WHITE);
        assert_eq!(s.append(&q, &Mat4::IDENTITY), Some(0));
        assert_eq!(s.append(&q, &Mat4::IDENTITY), Some(6));
        assert_eq!(s.positions().len(), 12 * POSITION_COMPONENTS);
        assert_eq!(s.colors().len(), 12 * COLOR_COMPONENTS);
        assert_eq!(s.texcoords().len(), 12 * TEXCOORD_COMPONENTS);
        assert_eq!(s.remaining(), 0);
    }

    #[test]
    fn append_refuses_overflow() {
        let mut s = VertexStreams::with_capacity(8);
        let q = quad(0.0, 0.0, 1.0, 1.0, Color::WHITE);
        s.append(&q, &Mat4::IDENTITY);
        assert_eq!(s.append(&q, &Mat4::IDENTITY), None);
        assert_eq!(s.vertex_count(), 6);
    }

    #[test]
    fn append_applies_world_matrix() {
        let mut s = VertexStreams::with_capacity(6);
        let q = quad(0.0, 0.0, 1.0, 1.0, Color::WHITE);
        s.append(&q, &Mat4::from_translation(Vec3::new(10.0, 20.0, 1.0)));
        assert_eq!(&s.positions()[..3], &[10.0, 20.0, 1.0]);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut s = VertexStreams::with_capacity(6);
        s.append(&quad(0.0, 0.0, 1.0, 1.0, Color::WHITE), &Mat4::IDENTITY);
        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.remaining(), 6);
    }
}
