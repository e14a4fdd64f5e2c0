use lbm_flow::config::DomainConfig;
use lbm_flow::{BoundaryPreset, Config, D3Q27, Dimensions, Float, Geometry, LbmError, NodeType, Simulation};
use std::sync::atomic::{AtomicBool, Ordering};

fn config(nx: usize, ny: usize, nz: usize, tau: Float) -> Config {
    let mut config = Config {
        domain: DomainConfig { nx, ny, nz, dx: 1.0 },
        boundary: BoundaryPreset::Periodic,
        ..Default::default()
    };
    config.simulation.tau = Some(tau);
    config
}

fn approx(actual: Float, expected: Float, tolerance: Float) -> bool {
    (actual - expected).abs() <= tolerance
}

#[test]
fn periodic_domain_conserves_mass() {
    let mut config = config(6, 5, 4, 0.7);
    config.simulation.perturbation = 0.05;
    config.simulation.seed = 7;
    config.simulation.validate = true;
    let mut sim = Simulation::new(config).unwrap();

    let initial = sim.total_mass();
    for _ in 0..20 {
        sim.advance().unwrap();
    }
    assert!((sim.total_mass() - initial).abs() < initial * 1e-4);

    let published = sim.current_density_snapshot();
    let sum: f64 = published.iter().map(|&rho| rho as f64).sum();
    assert!((sum - initial).abs() < initial * 1e-4);
}

#[test]
fn density_pulse_relaxes_and_spreads() {
    let mut sim = Simulation::new(config(5, 5, 1, 1.5)).unwrap();
    let w = D3Q27::WEIGHTS;
    sim.set_population(2, 2, 0, 0, w[0] + 99.0).unwrap();
    assert!((sim.total_mass() - 124.0).abs() < 1e-3);

    sim.advance().unwrap();
    let density = sim.current_density_snapshot();
    assert_eq!(density.frame(), 1);
    let sum: f64 = density.iter().map(|&rho| rho as f64).sum();
    assert!((sum - 124.0).abs() < 1e-3);
    assert!(approx(density[12], 100.0, 1e-3));

    // Rest density 100, zero velocity, so every moving slot relaxes to 67·w_i
    for i in 1..D3Q27::Q {
        let excess = (sim.population(2, 2, 0, i).unwrap() - w[i]) / w[i];
        assert!(approx(excess, 66.0, 1e-2), "direction {i}: excess {excess}");
    }
    for x in 0..5 {
        for y in 0..5 {
            if (x, y) != (2, 2) {
                assert!(approx(sim.population(x, y, 0, 1).unwrap(), w[1], 1e-6));
            }
        }
    }

    // The next streaming pass carries the excess to neighbors in proportion to the weights
    sim.advance().unwrap();
    let density = sim.current_density_snapshot();
    let dims = Dimensions::new(5, 5, 1).unwrap();
    let face = 1.0 + 66.0 * (w[1] + w[11] + w[12]);
    let diagonal = 1.0 + 66.0 * (w[7] + w[19] + w[20]);
    assert!(approx(density[dims.linear_index(3, 2, 0)], face, 1e-3));
    assert!(approx(density[dims.linear_index(2, 3, 0)], face, 1e-3));
    assert!(approx(density[dims.linear_index(3, 3, 0)], diagonal, 1e-3));
    assert!(approx(density[dims.linear_index(0, 0, 0)], 1.0, 1e-4));
    assert!((sim.total_mass() - 124.0).abs() < 1e-3);
}

#[test]
fn reflective_node_returns_every_direction() {
    let dims = Dimensions::new(3, 3, 3).unwrap();
    for i in 1..D3Q27::Q {
        let geometry = Geometry::from_predicate(dims, |x, y, z, _| {
            if (x, y, z) == (1, 1, 1) { NodeType::Reflective } else { NodeType::Fluid }
        });
        let mut sim = Simulation::with_geometry(config(3, 3, 3, 0.8), geometry).unwrap();
        sim.fill_populations(0.0);

        let c = D3Q27::VELOCITIES[i];
        let source = |k: usize| (1 - c[k]) as usize;
        sim.set_population(source(0), source(1), source(2), i, 5.0).unwrap();
        sim.advance().unwrap();

        let reflected = D3Q27::OPPOSITE[i];
        for z in 0..3 {
            for y in 0..3 {
                for x in 0..3 {
                    for j in 0..D3Q27::Q {
                        let expected = if (x, y, z, j) == (1, 1, 1, reflected) { 5.0 } else { 0.0 };
                        assert_eq!(sim.population(x, y, z, j).unwrap(), expected, "direction {i}, slot {j} at ({x},{y},{z})");
                    }
                }
            }
        }
        assert!((sim.total_mass() - 5.0).abs() < 1e-6);
    }
}

#[test]
fn every_node_type_runs_side_by_side() {
    let dims = Dimensions::new(4, 4, 4).unwrap();
    let codes: Vec<u32> = (0..dims.node_count()).map(|node| (node % 4) as u32).collect();
    let geometry = Geometry::from_codes(dims, &codes).unwrap();
    for node_type in NodeType::ALL {
        assert_eq!(geometry.count(node_type), 16);
    }

    let mut config = config(4, 4, 4, 0.8);
    config.simulation.validate = true;
    let inlet = config.physics.inlet_velocity;
    let mut sim = Simulation::with_geometry(config, geometry).unwrap();
    for _ in 0..3 {
        sim.advance().unwrap();
    }

    // Nodes 2 and 3 along x are in/out-flow and sink
    let inflow = D3Q27::equilibrium_set(1.0, inlet);
    for i in 0..D3Q27::Q {
        assert!(approx(sim.population(2, 0, 0, i).unwrap(), inflow[i], 1e-7));
        assert_eq!(sim.population(3, 0, 0, i).unwrap(), D3Q27::WEIGHTS[i]);
    }
    assert!(sim.current_snapshot().max_speed() <= D3Q27::CS + 1e-5);
}

#[test]
fn undefined_node_code_is_rejected() {
    let dims = Dimensions::new(2, 2, 2).unwrap();
    let mut codes = vec![0u32; 8];
    codes[5] = 4;
    assert!(matches!(
        Geometry::from_codes(dims, &codes),
        Err(LbmError::UnknownNodeType { code: 4, node: 5 })
    ));

    let mut config = config(2, 2, 2, 0.8);
    config.boundary = BoundaryPreset::TypeCodes { codes };
    assert!(matches!(Simulation::new(config), Err(LbmError::UnknownNodeType { code: 4, .. })));
}

#[test]
fn cylinder_channel_drives_flow_downstream() {
    let mut config = config(32, 1, 16, 0.8);
    config.boundary = BoundaryPreset::CylinderInChannel { radius: 3.0, walls: true };
    config.simulation.validate = true;
    let mut sim = Simulation::new(config).unwrap();

    let geometry = sim.get_geometry().clone();
    assert_eq!(geometry.node_type(0, 0, 8), NodeType::InOutFlow);
    assert_eq!(geometry.node_type(31, 0, 8), NodeType::Sink);
    assert_eq!(geometry.node_type(10, 0, 0), NodeType::Reflective);
    assert_eq!(geometry.node_type(8, 0, 8), NodeType::Reflective);

    for _ in 0..50 {
        sim.advance().unwrap();
    }

    let velocity = sim.current_velocity_snapshot();
    let dims = Dimensions::new(32, 1, 16).unwrap();
    let column: Vec<Float> = (0..16)
        .filter(|&z| geometry.is_fluid(1, 0, z))
        .map(|z| velocity[dims.linear_index(1, 0, z)][0])
        .collect();
    let mean = column.iter().sum::<Float>() / column.len() as Float;
    assert!(mean > 0.0, "mean x velocity behind the inlet: {mean}");
    assert!(velocity.iter().all(|u| u.iter().all(|c| c.is_finite())));
}

#[test]
fn readers_poll_while_frames_advance() {
    let mut sim = Simulation::new(config(8, 8, 8, 0.9)).unwrap();
    let nodes = sim.node_count();
    let done = AtomicBool::new(false);

    // A uniform grid of 27 equal populations v has density 27·v everywhere;
    // refilling before each frame gives every frame its own density.
    let fill = |frame: u64| frame as Float * 0.01;

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let reader = sim.reader();
                let done = &done;
                scope.spawn(move || {
                    let mut last = 0;
                    let mut checked = 0usize;
                    loop {
                        let density = reader.current_density_snapshot();
                        let frame = density.frame();
                        assert!(frame >= last, "frame went backwards: {frame} < {last}");
                        last = frame;
                        assert_eq!(density.len(), nodes);

                        let first = density[0];
                        assert!(
                            density.iter().all(|&rho| rho == first),
                            "density of frame {frame} mixes frames"
                        );
                        if frame > 0 {
                            let expected = 27.0 * fill(frame);
                            assert!(approx(first, expected, expected * 1e-4), "frame {frame}: density {first}");
                        }

                        let velocity = reader.current_velocity_snapshot();
                        assert!(velocity.frame() >= frame);
                        let first = velocity[0];
                        assert!(velocity.iter().all(|u| *u == first));
                        checked += 1;
                        if done.load(Ordering::Acquire) {
                            break;
                        }
                    }
                    checked
                })
            })
            .collect();

        for frame in 1..=30 {
            sim.fill_populations(fill(frame));
            sim.advance().unwrap();
        }
        done.store(true, Ordering::Release);
        for handle in handles {
            assert!(handle.join().unwrap() > 0);
        }
    });

    assert_eq!(sim.current_snapshot().frame(), 30);
}
