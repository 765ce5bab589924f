//! Manual injection into a mesh split between two partitions,
//! each running on its own thread.

use parcelflow as pf;

const CONFIG: &str = r#"{
    "name": "grid",
    "massTotal": 1e-3,
    "SOI": 0.0,
    "parcelBasisType": "mass",
    "model": {
        "type": "manual",
        "positions": [
            [0.25, 0.25, 0.25], [0.5, 0.25, 0.25], [0.75, 0.25, 0.25],
            [0.25, 0.75, 0.75], [0.5, 0.75, 0.75], [0.75, 0.75, 0.75],
            [1.25, 0.5, 0.5]
        ],
        "U0": [0.0, 0.0, -1.0],
        "sizeDistribution": { "type": "uniform", "min": 5e-5, "max": 1e-4 },
        "seed": 3,
        "ignoreOutOfBounds": true
    }
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = pf::InjectionConfig::from_json_str(CONFIG)?;

    // the unit cube split in half at x = 0.5
    let meshes = [
        pf::mesh::box_mesh(pf::Vec3::zeros(), pf::Vec3::new(0.5, 1., 1.), [4, 8, 8]),
        pf::mesh::box_mesh(pf::Vec3::new(0.5, 0., 0.), pf::Vec3::new(1., 1., 1.), [4, 8, 8]),
    ];
    let comms = pf::LocalGroup::new(meshes.len());

    let results: Vec<Result<(usize, pf::InjectionTotals), pf::InjectionError>> =
        std::thread::scope(|s| {
            let handles: Vec<_> = meshes
                .iter()
                .zip(&comms)
                .map(|(mesh, comm)| {
                    let config = &config;
                    s.spawn(move || -> Result<_, pf::InjectionError> {
                        let props = pf::PropertyStore::new();
                        let mut model = pf::InjectionModel::new(
                            config,
                            pf::SolutionMode::Transient,
                            mesh,
                            &props,
                            0.,
                        )?;
                        let mut cloud = pf::Cloud::new("cloud", pf::ConstantProperties::default());
                        let locator = pf::CellLocator::new(mesh, comm);
                        for step in 1..=3 {
                            let dt = 0.01;
                            let td = pf::TrackingData { track_time: dt };
                            model.step(&mut cloud, &locator, &td, step as f64 * dt)?;
                        }
                        Ok((cloud.len(), *model.totals()))
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("partition thread panicked"))
                .collect()
        });

    for (rank, res) in results.into_iter().enumerate() {
        let (local, totals) = res?;
        println!(
            "partition {rank}: owns {local} parcels, {} injected in total ({:.3e} kg)",
            totals.parcels_added_total, totals.mass_injected
        );
    }

    Ok(())
}
