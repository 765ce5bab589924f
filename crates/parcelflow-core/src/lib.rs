//! This is the core crate containing all of `parcelflow`'s functionality.
//! See the `parcelflow` crate's documentation for an introduction.
//!
//! The central type is [`InjectionModel`], which introduces Lagrangian parcels
//! into a tetrahedral carrier mesh once per carrier timestep.
//! It is driven by a pluggable [`InjectionStrategy`]
//! that decides how many parcels to create, where, and with what properties.

#![warn(missing_docs)]

pub mod mesh;
#[doc(inline)]
pub use mesh::{BoundingBox, SolutionDirections, TetMesh, TrackOutcome};

pub mod gmsh;

pub mod parallel;
#[doc(inline)]
pub use parallel::{Communicator, LocalCommunicator, LocalGroup, SerialCommunicator};

pub mod locate;
#[doc(inline)]
pub use locate::{CellLocation, CellLocator, LocateError, Located};

pub mod parcel;
#[doc(inline)]
pub use parcel::Parcel;

pub mod cloud;
#[doc(inline)]
pub use cloud::{Cloud, ConstantProperties, ParcelCloud, TrackingData};

pub mod basis;
#[doc(inline)]
pub use basis::ParcelBasis;

pub mod function;
#[doc(inline)]
pub use function::TimeFunction;

pub mod distribution;
#[doc(inline)]
pub use distribution::SizeDistribution;

pub mod strategy;
#[doc(inline)]
pub use strategy::{InjectionStrategy, StrategyConfig};

pub mod config;
#[doc(inline)]
pub use config::{ConfigError, InjectionConfig, SolutionMode};

pub mod properties;
#[doc(inline)]
pub use properties::{ModelProperties, PropertyStore};

pub mod bookkeeping;
#[doc(inline)]
pub use bookkeeping::{InjectionReport, InjectionTotals};

pub mod injection;
#[doc(inline)]
pub use injection::{InjectionModel, ScheduledStep, SchedulerState};

pub mod error;
#[doc(inline)]
pub use error::InjectionError;

// nalgebra re-exports of common types for convenience

pub use nalgebra as na;
/// Type alias for a 3D `nalgebra` vector.
pub type Vec3 = na::Vector3<f64>;
/// Barycentric coordinates of a point within a tetrahedral cell.
///
/// Component `i` is the weight of the cell's `i`th vertex;
/// the components sum to one.
pub type Barycentric = na::Vector4<f64>;
