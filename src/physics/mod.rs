// src/physics/mod.rs
pub mod collision;
pub mod world_query;

pub use collision::{CollisionPatch, HeightQuery, RestitchReport};
pub use world_query::NeighborQuery;
