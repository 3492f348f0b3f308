//! Stepping-protocol and backend tests for the particle engine.

use superdroplet::config::DrySize;
use superdroplet::{
    factory, AmbientFields, Backend, EngineError, EngineState, FreezingModel, InpType, KernelError,
    Opts, OptsInit, ParticlesProto,
};

const BACKENDS: [Backend; 2] = [Backend::Serial, Backend::MultiCore];

fn monodisperse(sd_count: usize) -> OptsInit {
    OptsInit {
        dry_sizes: vec![DrySize {
            kappa: 0.61,
            rd_m: 0.03e-6,
            conc_per_kg: 1e8,
            sd_count,
        }],
        ..OptsInit::default()
    }
}

fn warm() -> AmbientFields {
    AmbientFields::uniform(1, 290.0, 0.008, 1.2)
}

fn started(backend: Backend, opts_init: OptsInit) -> Box<dyn ParticlesProto> {
    let mut engine = factory(backend, opts_init).unwrap();
    engine.init(&warm()).unwrap();
    engine
}

fn is_precondition<T>(r: Result<T, EngineError>) -> bool {
    matches!(r, Err(EngineError::PreconditionViolation { .. }))
}

// ============================================================================
// Protocol
// ============================================================================

#[test]
fn test_cond_before_sync_rejected_on_every_backend() {
    for backend in BACKENDS {
        let mut engine = started(backend, monodisperse(10));
        let mut a = warm();
        let r = engine.step_cond(&Opts::default(), &mut a.th, &mut a.rv);
        assert!(is_precondition(r), "{backend}");
        // state untouched by the rejected call
        assert_eq!(engine.state(), EngineState::Idle);
    }
}

#[test]
fn test_stepping_before_init_rejected() {
    for backend in BACKENDS {
        let mut engine = factory(backend, monodisperse(10)).unwrap();
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(is_precondition(engine.sync_in(&warm())));
        assert!(is_precondition(engine.step_async(&Opts::default())));
        assert!(is_precondition(engine.diag_all()));
    }
}

#[test]
fn test_full_step_cycle() {
    for backend in BACKENDS {
        let mut engine = started(backend, monodisperse(10));
        let opts = Opts::default();
        for _ in 0..3 {
            let mut a = warm();
            engine.sync_in(&a).unwrap();
            assert_eq!(engine.state(), EngineState::Synced);
            engine.step_cond(&opts, &mut a.th, &mut a.rv).unwrap();
            engine.step_coal(&opts).unwrap();
            engine.step_sedi(&opts).unwrap();
            engine.step_async(&opts).unwrap();
            assert_eq!(engine.state(), EngineState::Idle);
        }
    }
}

#[test]
fn test_each_process_once_per_step() {
    let mut engine = started(Backend::Serial, monodisperse(10));
    let opts = Opts::default();
    let mut a = warm();
    engine.sync_in(&a).unwrap();
    engine.step_cond(&opts, &mut a.th, &mut a.rv).unwrap();
    assert!(is_precondition(engine.step_cond(&opts, &mut a.th, &mut a.rv)));
    engine.step_coal(&opts).unwrap();
    assert!(is_precondition(engine.step_coal(&opts)));
    // no re-sync once processes have run
    assert!(is_precondition(engine.sync_in(&a)));
    engine.step_async(&opts).unwrap();
    assert!(is_precondition(engine.step_async(&opts)));
}

#[test]
fn test_init_twice_rejected() {
    let mut engine = started(Backend::Serial, monodisperse(5));
    assert!(is_precondition(engine.init(&warm())));
}

#[test]
fn test_chem_unsupported() {
    let mut engine = started(Backend::Serial, monodisperse(5));
    engine.sync_in(&warm()).unwrap();
    let opts = Opts {
        chem: true,
        ..Opts::default()
    };
    assert!(matches!(
        engine.step_async(&opts),
        Err(EngineError::UnsupportedConfig(_))
    ));
}

#[test]
fn test_accelerator_unavailable() {
    let err = factory(Backend::Accelerator, monodisperse(5)).err();
    assert_eq!(err, Some(EngineError::BackendUnavailable(Backend::Accelerator)));
}

#[test]
fn test_mismatched_fields_rejected() {
    let mut engine = started(Backend::Serial, monodisperse(5));
    let bad = AmbientFields::uniform(2, 290.0, 0.008, 1.2);
    assert!(matches!(engine.sync_in(&bad), Err(EngineError::InvalidInput(_))));
}

#[test]
fn test_advection_needs_velocity() {
    let oi = OptsInit {
        nz: 2,
        dz_m: 10.0,
        ..monodisperse(4)
    };
    let ambient = AmbientFields::uniform(2, 290.0, 0.008, 1.2);
    let mut engine = factory(Backend::Serial, oi).unwrap();
    engine.init(&ambient).unwrap();
    engine.sync_in(&ambient).unwrap();
    let opts = Opts {
        cond: false,
        coal: false,
        ..Opts::default()
    };
    assert!(matches!(engine.step_sedi(&opts), Err(EngineError::InvalidInput(_))));
}

// ============================================================================
// Kernel errors surface through steps
// ============================================================================

#[test]
fn test_unsupported_inp_fails_time_dependent_step() {
    let oi = OptsInit {
        freezing: FreezingModel::TimeDependent,
        inp_type: InpType::Other("soot".into()),
        ..monodisperse(5)
    };
    let cold = AmbientFields::uniform(1, 250.0, 1e-4, 1.0);
    let mut engine = factory(Backend::Serial, oi).unwrap();
    engine.init(&cold).unwrap();

    let mut a = cold.clone();
    engine.sync_in(&a).unwrap();
    let opts = Opts {
        ice_nucl: true,
        ..Opts::none()
    };
    let err = engine.step_cond(&opts, &mut a.th, &mut a.rv).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Kernel(KernelError::UnsupportedConfig { kernel: "p_freeze", .. })
    ));
}

// ============================================================================
// Reproducibility
// ============================================================================

fn freezing_opts_init() -> OptsInit {
    OptsInit {
        rng_seed: 2024,
        freezing: FreezingModel::Singular,
        rd_insol_m: 0.5e-6,
        ..monodisperse(500)
    }
}

#[test]
fn test_same_seed_same_freezing_temperatures() {
    let a = started(Backend::Serial, freezing_opts_init());
    let b = started(Backend::Serial, freezing_opts_init());
    let ta = a.get_attr("T_freeze").unwrap();
    let tb = b.get_attr("T_freeze").unwrap();
    assert_eq!(ta.len(), 500);
    assert!(ta.iter().zip(&tb).all(|(x, y)| x.to_bits() == y.to_bits()));
    // the draws actually vary
    assert!(ta.iter().any(|&t| t != ta[0]));
}

#[test]
fn test_different_seed_different_freezing_temperatures() {
    let a = started(Backend::Serial, freezing_opts_init());
    let b = started(
        Backend::Serial,
        OptsInit {
            rng_seed: 7,
            ..freezing_opts_init()
        },
    );
    assert_ne!(a.get_attr("T_freeze").unwrap(), b.get_attr("T_freeze").unwrap());
}

#[test]
fn test_backends_agree() {
    let opts = Opts {
        adve: false,
        sedi: false,
        ..Opts::default()
    };
    let mut runs = Vec::new();
    for backend in BACKENDS {
        let mut engine = started(backend, freezing_opts_init());
        for _ in 0..5 {
            let mut a = warm();
            engine.step_sync(&opts, &mut a).unwrap();
            engine.step_async(&opts).unwrap();
        }
        runs.push((
            engine.get_attr("T_freeze").unwrap(),
            engine.get_attr("rw2").unwrap(),
            engine.get_attr("n").unwrap(),
        ));
    }
    assert_eq!(runs[0], runs[1]);
}
