// src/streaming/sink.rs
use glam::Vec3;

use super::height_field::HeightField;
use super::types::{GridOffset, LodEntry};

/// Shader-wide values published by the streaming loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GlobalParam {
    Amplitude(f32),
    HeightExp(f32),
    VertStepSize(f32),
    PartitionLength(f32),
    /// World position of the viewpoint chunk's center.
    ClipmapPosition(Vec3),
}

/// Rendering side of the terrain. One mesh slot per visible grid offset;
/// the controller only hands it fields that are ready.
pub trait MeshSink {
    /// Shows `field` in `slot`, placed at world `position`.
    fn update(&mut self, slot: GridOffset, lod: &LodEntry, field: &HeightField, position: Vec3);

    fn set_visible(&mut self, slot: GridOffset, visible: bool);

    /// Moves a slot without new height data (world offset changed).
    fn set_position(&mut self, _slot: GridOffset, _position: Vec3) {}

    fn set_global(&mut self, _param: GlobalParam) {}
}

/// Discards everything; for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MeshSink for NullSink {
    fn update(&mut self, _slot: GridOffset, _lod: &LodEntry, _field: &HeightField, _position: Vec3) {}
    fn set_visible(&mut self, _slot: GridOffset, _visible: bool) {}
}
