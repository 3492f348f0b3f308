//! Kernel and engine-step benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use superdroplet::common::ice_deposition::capacitance;
use superdroplet::common::ice_nucleation::p_freeze;
use superdroplet::config::DrySize;
use superdroplet::{factory, AmbientFields, Backend, ConstCp, InpType, Opts, OptsInit};

fn bench_capacitance(c: &mut Criterion) {
    c.bench_function("capacitance", |b| {
        b.iter(|| capacitance(black_box(20e-6), black_box(5e-6)))
    });
}

fn bench_p_freeze(c: &mut Criterion) {
    let inp = InpType::Mineral;
    c.bench_function("p_freeze", |b| {
        b.iter(|| p_freeze(&ConstCp, &inp, black_box(0.25e-12), black_box(250.0), 1.0))
    });
}

fn bench_cond_step(c: &mut Criterion) {
    let opts = Opts {
        cond: true,
        ..Opts::none()
    };
    for backend in [Backend::Serial, Backend::MultiCore] {
        let oi = OptsInit {
            dry_sizes: vec![DrySize {
                kappa: 0.61,
                rd_m: 0.05e-6,
                conc_per_kg: 1e8,
                sd_count: 10_000,
            }],
            ..OptsInit::default()
        };
        let ambient = AmbientFields::uniform(1, 290.0, 0.008, 1.2);
        let mut engine = factory(backend, oi).unwrap();
        engine.init(&ambient).unwrap();

        c.bench_function(&format!("cond_step_10k_{backend}"), |b| {
            b.iter(|| {
                let mut a = ambient.clone();
                engine.step_sync(&opts, &mut a).unwrap();
                engine.step_async(&opts).unwrap();
            })
        });
    }
}

criterion_group!(benches, bench_capacitance, bench_p_freeze, bench_cond_step);
criterion_main!(benches);
