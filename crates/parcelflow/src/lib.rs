//! `parcelflow` introduces Lagrangian parcels into a tetrahedral carrier mesh,
//! keeping track of how much mass has been injected
//! across timesteps of any size and across mesh partitions.
//!
//! # Overview
//!
//! An injector is described by an [`InjectionConfig`],
//! typically read from JSON:
//!
//! ```
//! # use parcelflow as pf;
//! let config = pf::InjectionConfig::from_json_str(r#"{
//!     "name": "nozzle",
//!     "massTotal": 1e-3,
//!     "SOI": 0.0,
//!     "parcelBasisType": "mass",
//!     "model": {
//!         "type": "cone",
//!         "position": [0.5, 0.5, 0.1],
//!         "direction": [0.0, 0.0, 1.0],
//!         "Umag": 10.0,
//!         "thetaInner": 0.0,
//!         "thetaOuter": 20.0,
//!         "parcelsPerSecond": 1000.0,
//!         "duration": 0.1,
//!         "flowRateProfile": { "type": "constant", "value": 1.0 },
//!         "sizeDistribution": { "type": "uniform", "min": 1e-4, "max": 2e-4 }
//!     }
//! }"#)?;
//!
//! let mesh = pf::mesh::box_mesh(pf::Vec3::zeros(), pf::Vec3::new(1., 1., 1.), [4, 4, 4]);
//! let mut props = pf::PropertyStore::new();
//! let mut model = pf::InjectionModel::new(
//!     &config,
//!     pf::SolutionMode::Transient,
//!     &mesh,
//!     &props,
//!     0.,
//! )?;
//! let mut cloud = pf::Cloud::new("spray", pf::ConstantProperties::default());
//!
//! // a serial run; see `LocalGroup` for running partitions on threads
//! let comm = pf::SerialCommunicator;
//! let locator = pf::CellLocator::new(&mesh, &comm);
//!
//! let dt = 0.01;
//! for step in 1..=10 {
//!     let td = pf::TrackingData { track_time: dt };
//!     model.step(&mut cloud, &locator, &td, step as f64 * dt)?;
//! }
//! model.info(true, &mut props);
//!
//! assert_eq!(cloud.len(), 100);
//! assert!((cloud.total_mass() - 1e-3).abs() < 1e-12);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The engine itself lives in [`InjectionModel`].
//! Where and how parcels are introduced is up to an [`InjectionStrategy`];
//! the built-in ones are in the [`strategy`] module,
//! and custom ones can be plugged in with [`InjectionModel::with_strategy`].
//!
//! # Parallel runs
//!
//! On a decomposed mesh, every partition holds its own [`TetMesh`]
//! and its own copy of the model,
//! and calls it with the same times.
//! The partitions talk to each other through a [`Communicator`];
//! [`LocalGroup`] runs partitions on threads within one process.

pub use parcelflow_core::*;
