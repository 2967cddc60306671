// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fractalbench::{
    transforms, ChaosGame, ChaosSettings, Device, DeviceConfig, Engine, EscapeSettings, EscapeTime,
};

fn fern(points: usize) -> ChaosGame {
    let settings = ChaosSettings {
        num_points: points,
        seed: Some(1),
        ..ChaosSettings::default()
    };
    ChaosGame::new(transforms::named("fern").unwrap(), settings).unwrap()
}

fn julia(width: usize) -> EscapeTime {
    EscapeTime::new(EscapeSettings {
        width,
        height: width,
        ..EscapeSettings::default()
    })
    .unwrap()
}

fn bench_chaos_sequential(c: &mut Criterion) {
    let game = fern(10_000);
    c.bench_function("chaos_sequential_10k", move |b| {
        b.iter(|| black_box(game.sequential().unwrap()))
    });
}

fn bench_chaos_parallel(c: &mut Criterion) {
    let game = fern(10_000);
    let device = Device::new(DeviceConfig::default()).unwrap();
    c.bench_function("chaos_parallel_10k", move |b| {
        b.iter(|| black_box(game.parallel(&device).unwrap()))
    });
}

fn bench_julia_sequential(c: &mut Criterion) {
    let escape = julia(200);
    c.bench_function("julia_sequential_200", move |b| {
        b.iter(|| black_box(escape.sequential().unwrap()))
    });
}

fn bench_julia_parallel(c: &mut Criterion) {
    let escape = julia(200);
    let device = Device::new(DeviceConfig::default()).unwrap();
    c.bench_function("julia_parallel_200", move |b| {
        b.iter(|| black_box(escape.parallel(&device).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_chaos_sequential,
    bench_chaos_parallel,
    bench_julia_sequential,
    bench_julia_parallel
);
criterion_main!(benches);
