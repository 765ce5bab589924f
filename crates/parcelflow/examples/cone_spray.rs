//! A cone spray injected into a box over uneven timesteps,
//! with the restart state written out at the end.

use parcelflow as pf;

const CONFIG: &str = r#"{
    "name": "nozzle",
    "massTotal": 2e-4,
    "SOI": 0.005,
    "parcelBasisType": "mass",
    "model": {
        "type": "cone",
        "position": [0.5, 0.5, 0.05],
        "direction": [0.0, 0.0, 1.0],
        "Umag": 20.0,
        "thetaInner": 5.0,
        "thetaOuter": 25.0,
        "parcelsPerSecond": 2000.0,
        "duration": 0.02,
        "flowRateProfile": {
            "type": "table",
            "values": [[0.0, 0.5], [0.005, 1.0], [0.015, 1.0], [0.02, 0.0]]
        },
        "sizeDistribution": {
            "type": "rosinRammler",
            "min": 2e-5,
            "max": 1.5e-4,
            "d": 6e-5,
            "n": 2.5
        },
        "seed": 12
    }
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = pf::InjectionConfig::from_json_str(CONFIG)?;
    let mesh = pf::mesh::box_mesh(pf::Vec3::zeros(), pf::Vec3::new(1., 1., 1.), [5, 5, 5]);

    let mut props = pf::PropertyStore::new();
    let mut model =
        pf::InjectionModel::new(&config, pf::SolutionMode::Transient, &mesh, &props, 0.)?;
    let mut cloud = pf::Cloud::new("spray", pf::ConstantProperties { rho0: 750., t0: 320. });

    let comm = pf::SerialCommunicator;
    let locator = pf::CellLocator::new(&mesh, &comm);

    // alternate short and long steps to show the injection doesn't depend on step size
    let mut time = 0.;
    let mut step = 0;
    while time < model.time_end() + 0.005 {
        let dt = if step % 2 == 0 { 7e-4 } else { 1.3e-3 };
        time += dt;
        step += 1;

        let report = model.step(&mut cloud, &locator, &pf::TrackingData { track_time: dt }, time)?;
        if report.parcels_added > 0 {
            println!(
                "t = {time:.4}: added {:3} parcels, {:.3e} kg",
                report.parcels_added, report.mass_added
            );
        }
    }

    model.info(true, &mut props);
    println!(
        "injected {} parcels carrying {:.6e} kg of the requested {:.6e} kg",
        model.totals().parcels_added_total,
        cloud.total_mass(),
        model.mass_total(),
    );
    println!("restart state:\n{}", props.to_json()?);

    Ok(())
}
