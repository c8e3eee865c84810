//! Screen benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use webtty::core::Screen;
use webtty::Terminal;

fn bench_screen_print(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    group.bench_function("print_chars", |b| {
        b.iter(|| {
            let mut screen = Screen::new(80, 24, 1000);
            for c in "Hello, World! ".chars() {
                screen.print(c);
            }
            black_box(screen)
        })
    });

    group.finish();
}

fn bench_screen_scroll(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    let input: String = (0..100)
        .map(|i| format!("Line {}: Some text content here\r\n", i))
        .collect();
    group.throughput(Throughput::Bytes(input.len() as u64));

    group.bench_function("scroll", |b| {
        b.iter(|| {
            let mut term = Terminal::new(80, 24);
            term.write(black_box(&input));
            black_box(term)
        })
    });

    // Same traffic inside a scroll region, as a pager or editor would produce
    group.bench_function("scroll_region", |b| {
        b.iter(|| {
            let mut term = Terminal::new(80, 24);
            term.write("\x1b[2;23r\x1b[23;1H");
            term.write(black_box(&input));
            black_box(term)
        })
    });

    group.finish();
}

fn bench_screen_csi(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    let input = "\x1b[H\x1b[2J\x1b[1;31mHello\x1b[0m".repeat(100);

    group.bench_function("csi_apply", |b| {
        b.iter(|| {
            let mut term = Terminal::new(80, 24);
            term.write(black_box(&input));
            black_box(term)
        })
    });

    group.finish();
}

fn bench_screen_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    group.bench_function("resize", |b| {
        b.iter(|| {
            let mut term = Terminal::new(80, 24);
            term.write(&"Hello, World!\r\n".repeat(20));
            term.resize(120, 40);
            term.resize(80, 24);
            term.resize(132, 50);
            black_box(term)
        })
    });

    group.finish();
}

fn bench_screen_full_redraw(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    // Simulate a full screen redraw (like vim opening)
    let mut setup_input = String::new();
    for row in 1..=24 {
        setup_input.push_str(&format!("\x1b[{};1H", row));
        setup_input.push_str(&"X".repeat(80));
    }

    group.throughput(Throughput::Bytes(setup_input.len() as u64));

    group.bench_function("full_redraw", |b| {
        b.iter(|| {
            let mut term = Terminal::new(80, 24);
            term.write(black_box(&setup_input));
            black_box(term)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_screen_print,
    bench_screen_scroll,
    bench_screen_csi,
    bench_screen_resize,
    bench_screen_full_redraw
);

criterion_main!(benches);
