use blit::{
    accel::{Dma2d, Dma2dConfig, Mode, SimPort},
    cache::{
        testing::{CacheOp, RecordingCache},
        NoCache,
    },
    soft, Backend, Dispatcher, FlipMode, Pen, PixelFormat, RunStatus, Surface,
};

mod common;

fn dispatcher(port: SimPort) -> Dispatcher<Dma2d<SimPort, RecordingCache>> {
    let config = Dma2dConfig { poll_limit: 16 };
    Dispatcher::new(Dma2d::with_config(port, RecordingCache::default(), config))
}

#[test]
fn fill_run_on_an_8x1_surface() {
    common::try_init_logger_for_default_harness();

    for &use_accelerator in &[false, true] {
        let mut s = Surface::new(8, 1, PixelFormat::Rgb888).unwrap();
        s.use_accelerator = use_accelerator;

        let mut d = dispatcher(SimPort::new());
        let status = d.fill_run(Pen::new(10, 20, 30, 255), &mut s, 1, 5);
        assert_eq!(
            status,
            if use_accelerator {
                RunStatus::Accelerated
            } else {
                RunStatus::Software
            }
        );

        assert_eq!(s.pixel(0, 0), &[0, 0, 0]);
        for x in 1..6 {
            assert_eq!(s.pixel(x, 0), &[10, 20, 30]);
        }
        assert_eq!(s.pixel(6, 0), &[0, 0, 0]);
        assert_eq!(s.pixel(7, 0), &[0, 0, 0]);
    }
}

#[test]
fn backend_selection() {
    let mask = Surface::new(4, 4, PixelFormat::Mask8).unwrap();
    let mut d = dispatcher(SimPort::new());

    let mut s = Surface::new(4, 4, PixelFormat::Rgb888).unwrap();
    assert_eq!(d.select_backend(&s, false), Backend::Software);
    s.use_accelerator = true;
    assert_eq!(d.select_backend(&s, false), Backend::Hardware);
    assert_eq!(d.select_backend(&s, true), Backend::Software);

    d.accelerator_mut().port_mut().set_reachable(false);
    assert_eq!(d.select_backend(&s, false), Backend::Software);
    d.accelerator_mut().port_mut().set_reachable(true);

    s.set_mask(&mask).unwrap();
    assert_eq!(d.fill_run(Pen::new(9, 9, 9, 255), &mut s, 0, 16), RunStatus::Software);
    assert_eq!(d.accelerator().port().transfers(), 0);

    let palette = Box::new([Pen::new(9, 9, 9, 255); 256]);
    let surfaces = vec![
        Surface::new(4, 4, PixelFormat::Rgba8888).unwrap(),
        Surface::new(4, 4, PixelFormat::Mask8).unwrap(),
        Surface::with_palette(vec![3; 16], 4, 4, palette).unwrap(),
    ];
    for mut s in surfaces {
        s.use_accelerator = true;
        assert_eq!(d.select_backend(&s, false), Backend::Software, "{:?}", s.format());
        assert_eq!(d.clear(Pen::new(1, 1, 1, 255), &mut s), RunStatus::Software);
    }
}

#[test]
fn repeated_mode_is_not_reconfigured() {
    let mut s = common::noise_rgb(64, 8, 5);
    s.use_accelerator = true;
    let mut d = dispatcher(SimPort::new());

    let pen = Pen::new(0x11, 0x22, 0xff, 255);
    for y in 0..8 {
        assert_eq!(d.fill_run(pen, &mut s, y * 64, 64), RunStatus::Accelerated);
    }
    assert_eq!(d.accelerator().port().configures(), 1);
    assert_eq!(d.accelerator().mode(), Some(Mode::Fill));

    let translucent = Pen::new(0, 0, 255, 10);
    for y in 0..8 {
        assert_eq!(d.fill_run(translucent, &mut s, y * 64, 64), RunStatus::Accelerated);
    }
    assert_eq!(d.accelerator().port().configures(), 2);

    assert_eq!(d.fill_run(pen, &mut s, 0, 64), RunStatus::Accelerated);
    assert_eq!(d.accelerator().port().configures(), 3);
    assert_eq!(d.accelerator().port().transfers(), 17);
}

#[test]
fn timeout_falls_back_with_identical_result() {
    common::try_init_logger_for_default_harness();

    for &pen in &[Pen::new(200, 100, 50, 255), Pen::new(200, 100, 50, 99)] {
        let mut reference = common::noise_rgb(40, 30, 11);
        let mut s = common::clone_rgb(&reference);
        s.use_accelerator = true;

        // The third transfer stalls
        let mut d = dispatcher(SimPort::new().stall_at(2));
        let offset = 7;
        let count = 1000;

        soft::fill_run(pen, &mut reference, offset, count);
        let mut statuses = Vec::new();
        for chunk in 0..4 {
            statuses.push(d.fill_run(pen, &mut s, offset + chunk * 250, 250));
        }

        assert_eq!(
            statuses,
            [
                RunStatus::Accelerated,
                RunStatus::Accelerated,
                RunStatus::FellBack,
                RunStatus::Accelerated,
            ]
        );
        assert_eq!(s.pixels(), reference.pixels(), "pen = {:?}", pen);
        assert_eq!(d.accelerator().port().aborts(), 1);

        // The fallback doesn't leave the registers in a stale state
        assert_eq!(d.accelerator().port().configures(), 2);
    }
}

#[test]
fn fault_in_a_long_blend_falls_back_after_partial_progress() {
    let pen = Pen::new(7, 77, 177, 100);
    let mut reference = common::noise_rgb(100, 10, 99);
    let mut s = common::clone_rgb(&reference);
    s.use_accelerator = true;

    let mut d = dispatcher(SimPort::new().fault_at(2));
    soft::fill_run(pen, &mut reference, 0, 1000);
    assert_eq!(d.fill_run(pen, &mut s, 0, 1000), RunStatus::FellBack);

    assert_eq!(s.pixels(), reference.pixels());
    // Two chunks were accelerated, the rest was done in software
    assert_eq!(d.accelerator().port().transfers(), 3);
}

#[test]
fn guard_brackets_every_transfer() {
    let mut s = common::noise_rgb(32, 32, 1);
    s.use_accelerator = true;
    let mut d = dispatcher(SimPort::new().stall_at(1));

    let base = s.pixels().as_ptr() as usize;
    let run = |offset: usize, count: usize| (base + offset * 3, count * 3);

    let _ = d.fill_run(Pen::new(1, 2, 3, 255), &mut s, 0, 32);
    let _ = d.fill_run(Pen::new(1, 2, 3, 255), &mut s, 32, 32); // times out
    let _ = d.fill_run(Pen::new(1, 2, 3, 50), &mut s, 64, 32);

    let ops = &d.accelerator().cache().ops;
    let mut expected = Vec::new();
    for &(offset, count) in &[(0, 32), (32, 32), (64, 32)] {
        let (addr, len) = run(offset, count);
        expected.push(CacheOp::CleanInvalidate(addr, len));
        expected.push(CacheOp::Invalidate(addr, len));
    }
    assert_eq!(ops, &expected);

    let ranges: Vec<_> = expected
        .iter()
        .map(|op| match *op {
            CacheOp::CleanInvalidate(a, l) | CacheOp::Invalidate(a, l) => a..a + l,
        })
        .collect();
    assert!(d.accelerator().cache().is_balanced(&ranges));
}

#[test]
fn copy_run_is_always_software() {
    let src = common::noise_rgb(16, 1, 3);
    let mut dest = common::noise_rgb(16, 1, 4);
    dest.use_accelerator = true;

    let mut reference = common::clone_rgb(&dest);
    soft::copy_run(&src, 15, &mut reference, 0, 16, -1);

    let mut d = dispatcher(SimPort::new());
    assert_eq!(d.copy_run(&src, 15, &mut dest, 0, 16, -1), RunStatus::Software);
    assert_eq!(dest.pixels(), reference.pixels());
    assert_eq!(d.accelerator().port().transfers(), 0);
}

#[test]
fn flip_falls_back_on_fault() {
    common::try_init_logger_for_default_harness();

    let mut source = common::noise_rgb(10, 6, 8);
    source.use_accelerator = true;
    let mut panel = Surface::new(20, 12, PixelFormat::Rgb888).unwrap();
    let mut reference = Surface::new(20, 12, PixelFormat::Rgb888).unwrap();
    blit::accel::flip(&source, &mut reference, FlipMode::Half).unwrap();

    let mut d = dispatcher(SimPort::new().fault_at(13));
    assert_eq!(
        d.flip_display(&source, &mut panel, FlipMode::Half),
        RunStatus::FellBack
    );
    assert_eq!(panel.pixels(), reference.pixels());

    let mut d = Dispatcher::new(Dma2d::new(SimPort::new(), NoCache));
    let mut panel = Surface::new(20, 12, PixelFormat::Rgb888).unwrap();
    assert_eq!(
        d.flip_display(&source, &mut panel, FlipMode::Half),
        RunStatus::Accelerated
    );
    assert_eq!(panel.pixels(), reference.pixels());
}
