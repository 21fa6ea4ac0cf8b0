use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use parking_lot::Mutex;
use tessera::{layout_digest, Coordinate, GridBounds, MoveRule, Occupancy, Placeable, SpatialRegistry};

struct Marker {
    id: u32,
    at: Mutex<Coordinate>,
}

impl Placeable for Marker {
    type Id = u32;

    fn id(&self) -> u32 {
        self.id
    }

    fn coordinate(&self) -> Coordinate {
        *self.at.lock()
    }

    fn relocate(&self, to: Coordinate) {
        *self.at.lock() = to;
    }

    fn occupancy(&self) -> Occupancy {
        Occupancy::Exclusive
    }
}

fn filled_registry(side: u32) -> (SpatialRegistry<Marker>, Vec<Arc<Marker>>) {
    let bounds = GridBounds::new(side, side);
    let registry = SpatialRegistry::new(bounds);
    // Every other cell, so movers always have somewhere to go.
    let markers: Vec<_> = bounds
        .cells()
        .filter(|at| (at.row() + at.col()) % 2 == 0)
        .zip(0u32..)
        .map(|(at, id)| {
            let marker = Arc::new(Marker {
                id,
                at: Mutex::new(at),
            });
            registry.place(&marker);
            marker
        })
        .collect();
    (registry, markers)
}

fn bench_try_move(c: &mut Criterion) {
    let (registry, markers) = filled_registry(32);
    let timeout = Duration::from_millis(1);

    c.bench_function("try_move_back_and_forth", |b| {
        let marker = &markers[markers.len() / 2];
        b.iter(|| {
            let home = marker.coordinate();
            let away = home.offset(0, 1);
            registry.try_move(marker, black_box(away), timeout, MoveRule::VacantOnly);
            registry.try_move(marker, black_box(home), timeout, MoveRule::VacantOnly);
        });
    });
}

fn bench_capture_and_digest(c: &mut Criterion) {
    let (registry, _markers) = filled_registry(32);

    c.bench_function("capture_and_digest", |b| {
        b.iter(|| black_box(layout_digest(&registry.capture())));
    });
}

fn bench_can_enter(c: &mut Criterion) {
    let (registry, _markers) = filled_registry(32);

    c.bench_function("can_enter_scan", |b| {
        b.iter(|| {
            registry
                .bounds()
                .cells()
                .filter(|at| registry.can_enter(*at, u32::MAX))
                .count()
        });
    });
}

criterion_group!(benches, bench_try_move, bench_capture_and_digest, bench_can_enter);
criterion_main!(benches);
