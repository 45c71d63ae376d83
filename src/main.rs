use anyhow::Result;
use relsim::{Scenario, Simulation, SimulationConfig};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    log::info!("Starting relsim...");

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let scenario_file = if args.len() > 1 {
        args[1].clone()
    } else {
        "scenarios/binary_collapse.ron".to_string()
    };

    let steps = if args.len() > 2 {
        args[2].parse::<usize>().unwrap_or(1000)
    } else {
        1000
    };

    log::info!("Using scenario file: {}", scenario_file);
    log::info!("Running {} steps", steps);

    let scenario = Scenario::load(&scenario_file)?;
    let mut simulation = Simulation::from_scenario(&scenario, SimulationConfig::default())?;
    let space_unit = simulation.units().choice().space.clone();
    let time_unit = simulation.units().choice().time.clone();

    for _ in 0..steps {
        let report = simulation.step()?;
        if report.merged > 0 {
            log::info!(
                "t = {:.6e} {}: {} merge(s), {} bodies left",
                report.coordinate_time,
                time_unit,
                report.merged,
                report.live_bodies
            );
        }
    }

    let diagnostics = simulation.diagnostics();
    log::info!(
        "Finished {} steps at t = {:.6e} {} (last step {:.3e})",
        diagnostics.step_count,
        diagnostics.coordinate_time,
        time_unit,
        diagnostics.last_timestep
    );

    for body in simulation.bodies() {
        let position = body.position;
        log::info!(
            "{}: position ({:.6e}, {:.6e}, {:.6e}) {}, proper time {:.6e}{}",
            body.name,
            position.x,
            position.y,
            position.z,
            space_unit,
            body.proper_time,
            if body.is_black_hole { " [black hole]" } else { "" }
        );
    }

    let com = simulation.center_of_mass();
    log::info!("Center of mass: ({:.6e}, {:.6e}, {:.6e})", com.x, com.y, com.z);

    Ok(())
}
